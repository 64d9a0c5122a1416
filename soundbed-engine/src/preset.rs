//! The nine soundscape identifiers.

use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Preset {
    Rain,
    Fireplace,
    Waves,
    Wind,
    Birds,
    Thunder,
    Cafe,
    Forest,
    WhiteNoise,
}

impl Preset {
    pub const ALL: [Preset; 9] = [
        Preset::Rain,
        Preset::Fireplace,
        Preset::Waves,
        Preset::Wind,
        Preset::Birds,
        Preset::Thunder,
        Preset::Cafe,
        Preset::Forest,
        Preset::WhiteNoise,
    ];

    /// Canonical identifier, as callers spell it.
    pub fn as_str(self) -> &'static str {
        match self {
            Preset::Rain => "rain",
            Preset::Fireplace => "fireplace",
            Preset::Waves => "waves",
            Preset::Wind => "wind",
            Preset::Birds => "birds",
            Preset::Thunder => "thunder",
            Preset::Cafe => "cafe",
            Preset::Forest => "forest",
            Preset::WhiteNoise => "white_noise",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = EngineError;

    /// Case-insensitive; `-` and space are accepted in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c.to_ascii_lowercase() })
            .collect();
        Preset::ALL
            .into_iter()
            .find(|p| p.as_str() == key)
            .ok_or_else(|| EngineError::InvalidPreset(s.to_string()))
    }
}
