#[derive(Debug, Clone, Default)]
pub enum BarColor {
    #[default]
    CYAN,
    MAGENTA,
    RED,
    GREEN,
}

/// Pipeline stage a status message refers to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    Unpack,
    Copy,
    #[default]
    Compute,
    Plot,
    Publish,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpack => "Unpack",
            Self::Copy => "Copy",
            Self::Compute => "Compute",
            Self::Plot => "Plot",
            Self::Publish => "Publish",
        }
    }

    /// Each stage gets its own bar color
    pub fn color(&self) -> BarColor {
        match self {
            Self::Unpack | Self::Copy => BarColor::GREEN,
            Self::Compute => BarColor::CYAN,
            Self::Plot => BarColor::MAGENTA,
            Self::Publish => BarColor::RED,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub stage: Stage,
    pub color: BarColor,
}

impl WorkerStatus {
    pub fn new(progress: f32, stage: Stage) -> Self {
        Self {
            progress,
            stage,
            color: stage.color(),
        }
    }
}
