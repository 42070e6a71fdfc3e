use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind} level {value} (expected 0..={max})")]
pub struct InvalidLevel {
    pub kind: &'static str,
    pub value: u8,
    pub max: u8,
}

/// How much the service elaborates expressions: 0 prints raw terms, 2 prints named
/// variables and declared notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "u8", into = "u8")]
pub struct ElabLevel(u8);

impl ElabLevel {
    pub const MAX: u8 = 2;

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for ElabLevel {
    fn default() -> Self {
        Self(Self::MAX)
    }
}

impl TryFrom<u8> for ElabLevel {
    type Error = InvalidLevel;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > Self::MAX {
            return Err(InvalidLevel {
                kind: "elaboration",
                value,
                max: Self::MAX,
            });
        }
        Ok(Self(value))
    }
}

impl From<ElabLevel> for u8 {
    fn from(level: ElabLevel) -> Self {
        level.0
    }
}

impl fmt::Display for ElabLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether the service brackets sub-expressions (1) or never does (0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "u8", into = "u8")]
pub struct BracketLevel(u8);

impl BracketLevel {
    pub const MAX: u8 = 1;

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn toggled(self) -> Self {
        Self((self.0 + 1) % (Self::MAX + 1))
    }
}

impl TryFrom<u8> for BracketLevel {
    type Error = InvalidLevel;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > Self::MAX {
            return Err(InvalidLevel {
                kind: "bracket",
                value,
                max: Self::MAX,
            });
        }
        Ok(Self(value))
    }
}

impl From<BracketLevel> for u8 {
    fn from(level: BracketLevel) -> Self {
        level.0
    }
}

impl fmt::Display for BracketLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
