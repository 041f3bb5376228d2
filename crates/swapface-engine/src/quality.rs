use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("quality level must be 1, 2 or 3, got {0}")]
pub struct InvalidQuality(pub u8);

/// Enhancement quality. Levels are cumulative: each includes every stage
/// of the levels below it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum QualityLevel {
    Basic = 1,
    #[default]
    Hd = 2,
    UltraHd = 3,
}

impl QualityLevel {
    /// Tier label used in output file names.
    pub fn tier(self) -> &'static str {
        match self {
            QualityLevel::Basic => "BASICO",
            QualityLevel::Hd => "HD",
            QualityLevel::UltraHd => "ULTRA_HD",
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for QualityLevel {
    type Error = InvalidQuality;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(QualityLevel::Basic),
            2 => Ok(QualityLevel::Hd),
            3 => Ok(QualityLevel::UltraHd),
            other => Err(InvalidQuality(other)),
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tier())
    }
}
