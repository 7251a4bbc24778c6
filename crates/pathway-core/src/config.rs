use std::env;
use std::time::Duration;

/// Tunables for the synchronization core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Idle time after the last canvas edit before it is saved.
    pub autosave_idle: Duration,
    /// Canvases a single owner may hold.
    pub max_canvases_per_owner: usize,
}

impl SyncConfig {
    pub const DEFAULT_AUTOSAVE_IDLE: Duration = Duration::from_millis(2500);
    pub const DEFAULT_MAX_CANVASES: usize = 3;

    /// Environment variable overriding the autosave idle window, in ms.
    pub const AUTOSAVE_ENV_VAR: &str = "PATHWAY_AUTOSAVE_MS";

    /// Defaults, with `PATHWAY_AUTOSAVE_MS` applied when it parses.
    pub fn from_env() -> Self {
        let autosave_idle = env::var(Self::AUTOSAVE_ENV_VAR)
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map_or(Self::DEFAULT_AUTOSAVE_IDLE, Duration::from_millis);
        Self {
            autosave_idle,
            ..Self::default()
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            autosave_idle: Self::DEFAULT_AUTOSAVE_IDLE,
            max_canvases_per_owner: Self::DEFAULT_MAX_CANVASES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.autosave_idle, Duration::from_millis(2500));
        assert_eq!(cfg.max_canvases_per_owner, 3);
    }
}
