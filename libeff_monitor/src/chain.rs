use serde::{Deserialize, Serialize};

use super::histogram::BinRange;

/// A detector region, defined by the eta (x-axis) bin ranges it covers.
///
/// Regions spanning several ranges (the full endcap) are the sum of the
/// individual range integrals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub eta_bins: Vec<BinRange>,
}

impl Region {
    pub fn new(name: &str, eta_bins: &[BinRange]) -> Self {
        Self {
            name: name.to_string(),
            eta_bins: eta_bins.to_vec(),
        }
    }
}

/// Text substitution applied to a counter name to make a legend label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRule {
    pub pattern: String,
    pub replacement: String,
}

impl LabelRule {
    pub fn new(pattern: &str, replacement: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        }
    }
}

/// The ordered filter chain and the detector regions it is monitored in.
///
/// Counter i is expected to be a refinement of counter i-1, so the order here is the
/// order in which step efficiencies are formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterChain {
    pub counters: Vec<String>,
    pub regions: Vec<Region>,
    pub label_rules: Vec<LabelRule>,
}

impl Default for FilterChain {
    /// The HLT_Ele32_WPTight chain in barrel/endcap regions
    fn default() -> Self {
        let counters = [
            "hltEG32L1SingleEGOrEtFilter",
            "hltEle32WPTightClusterShapeFilter",
            "hltEle32WPTightHEFilter",
            "hltEle32WPTightEcalIsoFilter",
            "hltEle32WPTightHcalIsoFilter",
            "hltEle32WPTightPixelMatchFilter",
            "hltEle32WPTightPMS2Filter",
            "hltEle32WPTightGsfOneOEMinusOneOPFilter",
            "hltEle32WPTightGsfMissingHitsFilter",
            "hltEle32WPTightGsfDetaFilter",
            "hltEle32WPTightGsfDphiFilter",
            "hltEle32WPTightGsfTrackIsoFilter",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();

        let regions = vec![
            Region::new("EB", &[BinRange::new(2, 3)]),
            Region::new("EBplus", &[BinRange::new(3, 3)]),
            Region::new("EBminus", &[BinRange::new(2, 2)]),
            Region::new("EE", &[BinRange::new(1, 1), BinRange::new(4, 4)]),
            Region::new("EEplus", &[BinRange::new(4, 4)]),
            Region::new("EEminus", &[BinRange::new(1, 1)]),
        ];

        let label_rules = vec![
            LabelRule::new("hltEG32L1SingleEGOrEtFilter", "L1"),
            LabelRule::new("hltEle32WPTight", ""),
            LabelRule::new("Gsf", ""),
            LabelRule::new("Filter", ""),
        ];

        Self {
            counters,
            regions,
            label_rules,
        }
    }
}

impl FilterChain {
    pub fn n_counters(&self) -> usize {
        self.counters.len()
    }

    pub fn get_region(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    pub fn region_index(&self, name: &str) -> Option<usize> {
        self.regions.iter().position(|r| r.name == name)
    }

    /// Apply the label rules, in order, to a counter name
    pub fn short_label(&self, counter: &str) -> String {
        self.label_rules
            .iter()
            .fold(counter.to_string(), |label, rule| {
                label.replace(&rule.pattern, &rule.replacement)
            })
    }

    /// Check that the chain can produce at least one efficiency per region.
    ///
    /// Returns a description of the first problem found.
    pub fn check(&self) -> Result<(), String> {
        if self.counters.len() < 2 {
            return Err(format!(
                "at least 2 counters are required, found {}",
                self.counters.len()
            ));
        }
        if self.regions.is_empty() {
            return Err(String::from("no regions are defined"));
        }
        for region in self.regions.iter() {
            if region.eta_bins.is_empty() {
                return Err(format!("region {} has no eta bins", region.name));
            }
            if let Some(range) = region.eta_bins.iter().find(|r| r.is_empty()) {
                return Err(format!(
                    "region {} has empty eta range [{}, {}]",
                    region.name, range.first, range.last
                ));
            }
        }
        for (idx, name) in self.regions.iter().map(|r| &r.name).enumerate() {
            if self.regions[..idx].iter().any(|r| &r.name == name) {
                return Err(format!("region {name} is defined twice"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_labels() {
        let chain = FilterChain::default();
        assert_eq!(chain.short_label("hltEG32L1SingleEGOrEtFilter"), "L1");
        assert_eq!(chain.short_label("hltEle32WPTightGsfDetaFilter"), "Deta");
        assert_eq!(
            chain.short_label("hltEle32WPTightGsfOneOEMinusOneOPFilter"),
            "OneOEMinusOneOP"
        );
        assert_eq!(chain.short_label("hltEle32WPTightPMS2Filter"), "PMS2");
    }

    #[test]
    fn test_default_chain_is_valid() {
        let chain = FilterChain::default();
        assert_eq!(chain.n_counters(), 12);
        assert_eq!(chain.regions.len(), 6);
        assert!(chain.check().is_ok());
        assert_eq!(chain.region_index("EE"), Some(3));
    }

    #[test]
    fn test_check_rejects_short_chain() {
        let mut chain = FilterChain::default();
        chain.counters.truncate(1);
        assert!(chain.check().is_err());
    }

    #[test]
    fn test_check_rejects_duplicate_region() {
        let mut chain = FilterChain::default();
        chain.regions.push(Region::new("EB", &[BinRange::new(2, 3)]));
        assert!(chain.check().is_err());
    }
}
