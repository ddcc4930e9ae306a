use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Input serializations the engine accepts. Only the N3 dialect exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    N3,
}

impl FromStr for Format {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n3" | "notation3" | "text/n3" => Ok(Format::N3),
            _ => Err(EngineError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::N3 => write!(f, "n3"),
        }
    }
}

/// Per-engine tracing switches. Events go through `tracing`; these only
/// decide whether the chatty per-binding events are emitted at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub trace_matching: bool,
    pub trace_rules: bool,
    pub trace_builtins: bool,
}

impl LogConfig {
    pub fn verbose() -> Self {
        LogConfig {
            trace_matching: true,
            trace_rules: true,
            trace_builtins: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub format: Format,
    pub log: LogConfig,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!("N3".parse::<Format>().unwrap(), Format::N3);
        assert_eq!("text/n3".parse::<Format>().unwrap(), Format::N3);
        assert!(matches!(
            "turtle".parse::<Format>(),
            Err(EngineError::UnsupportedFormat(f)) if f == "turtle"
        ));
    }

    #[test]
    fn config_from_partial_json() {
        let cfg = EngineConfig::from_json(r#"{ "log": { "trace_rules": true } }"#).unwrap();
        assert_eq!(cfg.format, Format::N3);
        assert!(cfg.log.trace_rules);
        assert!(!cfg.log.trace_matching);
    }

    #[test]
    fn unknown_format_in_json_is_rejected() {
        assert!(EngineConfig::from_json(r#"{ "format": "turtle" }"#).is_err());
    }
}
