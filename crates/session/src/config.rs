use serde::{Deserialize, Serialize};
use stepper_protocol::{BracketLevel, ElabLevel};

pub const ELAB_LEVEL_ENV: &str = "STEPPER_ELAB_LEVEL";
pub const BRACKET_LEVEL_ENV: &str = "STEPPER_BRACKET_LEVEL";

/// Rendering parameters a new session starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub elab_level: ElabLevel,
    #[serde(default)]
    pub bracket_level: BracketLevel,
}

impl SessionConfig {
    /// Defaults overridden by `STEPPER_ELAB_LEVEL` / `STEPPER_BRACKET_LEVEL`.
    ///
    /// Unparsable or out-of-range values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(level) = read_level::<ElabLevel>(ELAB_LEVEL_ENV) {
            config.elab_level = level;
        }
        if let Some(level) = read_level::<BracketLevel>(BRACKET_LEVEL_ENV) {
            config.bracket_level = level;
        }
        config
    }
}

fn read_level<L>(var: &str) -> Option<L>
where
    L: TryFrom<u8>,
    L::Error: std::fmt::Display,
{
    let raw = std::env::var(var).ok()?;
    let value = match raw.trim().parse::<u8>() {
        Ok(value) => value,
        Err(err) => {
            log::warn!("Ignoring {var}={raw:?}: {err}");
            return None;
        }
    };
    match L::try_from(value) {
        Ok(level) => Some(level),
        Err(err) => {
            log::warn!("Ignoring {var}: {err}");
            None
        }
    }
}

/// Settings for the trace replay service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceServiceConfig {
    /// Records within this many steps of the target are returned with it.
    pub window: usize,
}

impl Default for TraceServiceConfig {
    fn default() -> Self {
        Self { window: 50 }
    }
}
