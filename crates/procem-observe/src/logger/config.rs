use std::io::IsTerminal;

use crate::logger::{error::LoggerError, format::LoggerFormat};

/// Selects the output format: `text` (default), `json` or `journald`.
pub const LOG_FORMAT_VAR: &str = "PLATFORM_LOG_FORMAT";
/// `EnvFilter` directive, e.g. `info` or `procem_core=debug,info`.
pub const LOG_LEVEL_VAR: &str = "PLATFORM_LOG_LEVEL";

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive. Default: `info`.
    pub level: String,
    pub with_targets: bool,
    /// ANSI colours in text output. Default: on when stdout is a terminal.
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let use_color = cfg!(test) || std::io::stdout().is_terminal();
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color,
        }
    }
}

impl LoggerConfig {
    /// Reads [`LOG_FORMAT_VAR`] and [`LOG_LEVEL_VAR`]; unset or blank values keep the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LoggerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(format) = lookup(LOG_FORMAT_VAR) {
            cfg.format = format.parse()?;
        }
        if let Some(level) = lookup(LOG_LEVEL_VAR).filter(|l| !l.trim().is_empty()) {
            cfg.level = level.trim().to_string();
        }
        Ok(cfg)
    }
}
