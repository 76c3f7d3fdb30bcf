use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::chain::FilterChain;
use super::constants::*;
use super::error::ConfigError;
use super::histogram::BinRange;

/// Data-taking period whose archives are processed. Each epoch has its own archive
/// subdirectory and its own output tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Epoch {
    #[serde(rename = "2024")]
    Y2024,
    #[serde(rename = "2025")]
    Y2025,
    #[serde(rename = "2024_25")]
    Y2024To25,
}

impl Epoch {
    pub const ALL: [&'static str; 3] = ["2024", "2025", "2024_25"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Y2024 => "2024",
            Self::Y2025 => "2025",
            Self::Y2024To25 => "2024_25",
        }
    }
}

impl Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Epoch {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2024" => Ok(Self::Y2024),
            "2025" => Ok(Self::Y2025),
            "2024_25" => Ok(Self::Y2024To25),
            _ => Err(ConfigError::BadEpoch(s.to_string())),
        }
    }
}

/// Which slice of the tag-and-probe histograms is integrated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    Tag,
    Fakes,
}

impl Selection {
    pub fn window(&self) -> BinRange {
        match self {
            Self::Tag => BinRange::new(TAG_FIRST_BIN, SELECTION_LAST_BIN),
            Self::Fakes => BinRange::new(FAKES_FIRST_BIN, SELECTION_LAST_BIN),
        }
    }
}

/// Uncertainty model used for every ratio in a derivation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Uncertainty {
    Propagation,
    Bayesian,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Admission {
    pub region: String,
    pub threshold: u64,
}

impl Default for Admission {
    fn default() -> Self {
        Self {
            region: String::from(DEFAULT_ADMISSION_REGION),
            threshold: DEFAULT_ADMISSION_THRESHOLD,
        }
    }
}

/// Structure representing the application configuration. Contains pathing, archive layout
/// and the filter chain.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub epoch: Epoch,
    pub archive_path: PathBuf,
    pub output_path: PathBuf,
    pub web_path: PathBuf,
    pub web_url: String,
    pub site_title: String,
    pub copy_source: Option<PathBuf>,
    pub copy_prefix: String,
    pub copy_min_run: Option<u32>,
    pub unpack_source: Option<PathBuf>,
    pub unpack_min_size: u64,
    pub unpack_min_run: Option<u32>,
    pub file_prefix: String,
    pub file_extension: String,
    pub folder_template: String,
    pub object_prefix: String,
    pub object_suffix: String,
    pub selection: Selection,
    pub uncertainty: Uncertainty,
    pub admission: Admission,
    pub chain: FilterChain,
}

impl Default for Config {
    /// Generate a new Config object. Paths are empty/invalid, the chain is the default one
    fn default() -> Self {
        Self {
            epoch: Epoch::Y2025,
            archive_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            web_path: PathBuf::from("None"),
            web_url: String::from(""),
            site_title: String::from("EGMDQM"),
            copy_source: None,
            copy_prefix: String::from(DEFAULT_COPY_PREFIX),
            copy_min_run: None,
            unpack_source: None,
            unpack_min_size: DEFAULT_UNPACK_MIN_SIZE,
            unpack_min_run: Some(DEFAULT_UNPACK_MIN_RUN),
            file_prefix: String::from(DEFAULT_FILE_PREFIX),
            file_extension: String::from(DEFAULT_FILE_EXTENSION),
            folder_template: String::from(DEFAULT_FOLDER_TEMPLATE),
            object_prefix: String::from(DEFAULT_OBJECT_PREFIX),
            object_suffix: String::from(DEFAULT_OBJECT_SUFFIX),
            selection: Selection::Tag,
            uncertainty: Uncertainty::Propagation,
            admission: Admission::default(),
            chain: FilterChain::default(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check the filter chain and admission settings for consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chain.check().map_err(ConfigError::InvalidChain)?;
        if self.chain.get_region(&self.admission.region).is_none() {
            return Err(ConfigError::InvalidChain(format!(
                "admission region {} is not one of the chain regions",
                self.admission.region
            )));
        }
        Ok(())
    }

    /// Directory holding this epoch's per-run archives
    pub fn get_archive_directory(&self) -> PathBuf {
        self.archive_path.join(self.epoch.as_str())
    }

    /// Path to the run-indexed counts container for this epoch
    pub fn get_container_path(&self) -> PathBuf {
        self.output_path
            .join(self.epoch.as_str())
            .join(CONTAINER_FILE_NAME)
    }

    /// Directory the plots of one region are published to
    pub fn get_plot_directory(&self, region: &str) -> PathBuf {
        self.web_path.join(self.epoch.as_str()).join(region)
    }

    /// Path of a counter's histogram inside a run archive
    pub fn get_object_path(&self, run_number: u32, counter: &str) -> String {
        let folder = self
            .folder_template
            .replace("{run}", &format!("{run_number:0>6}"));
        format!(
            "{}/{}{}{}",
            folder.trim_end_matches('/'),
            self.object_prefix,
            counter,
            self.object_suffix
        )
    }

    pub fn need_copy_files(&self) -> bool {
        self.copy_source.is_some()
    }

    pub fn need_unpack_files(&self) -> bool {
        self.unpack_source.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path() {
        let config = Config::default();
        assert_eq!(
            config.get_object_path(392123, "hltEle32WPTightHEFilter"),
            "DQMData/Run 392123/HLT/Run summary/EGM/TrigObjTnP/stdTag_hltEle32WPTightHEFilter_eta"
        );
        assert_eq!(
            config.get_object_path(1234, "x"),
            "DQMData/Run 001234/HLT/Run summary/EGM/TrigObjTnP/stdTag_x_eta"
        );
    }

    #[test]
    fn test_yaml_round_trip_keeps_epoch_tags() {
        let mut config = Config::default();
        config.epoch = Epoch::Y2024To25;
        config.uncertainty = Uncertainty::Bayesian;
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("uncertainty: bayesian"));
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.epoch, Epoch::Y2024To25);
        assert_eq!(parsed.chain, config.chain);
    }

    #[test]
    fn test_epoch_from_str() {
        assert_eq!(Epoch::from_str("2025").unwrap(), Epoch::Y2025);
        assert!(Epoch::from_str("2023").is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_admission_region() {
        let mut config = Config::default();
        config.admission.region = String::from("HF");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidChain(_))));
    }

    #[test]
    fn test_paths_are_per_epoch() {
        let mut config = Config::default();
        config.archive_path = PathBuf::from("/data");
        config.web_path = PathBuf::from("/www");
        config.epoch = Epoch::Y2024;
        assert_eq!(config.get_archive_directory(), PathBuf::from("/data/2024"));
        assert_eq!(
            config.get_plot_directory("EBplus"),
            PathBuf::from("/www/2024/EBplus")
        );
    }
}
