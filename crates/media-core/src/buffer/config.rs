//! Jitter buffer configuration
//!
//! Recognized keys, as read from a channel driver's configuration:
//!
//! | key                   | effect                                          |
//! |-----------------------|-------------------------------------------------|
//! | `jb.enable`           | buffer audio toward this channel                |
//! | `jb.force`            | buffer even if the channel has its own jitter handling |
//! | `jb.maxsize`          | maximum buffered audio, ms                      |
//! | `jb.resyncthreshold`  | timestamp jump that triggers a resync, ms       |
//! | `jb.targetextra`      | adaptive: extra latency aimed for; fixed: headroom below `maxsize`, ms |
//! | `jb.impl`             | implementation name (`fixed`, `adaptive`)       |
//! | `jb.log`              | write a frame log file per buffer               |

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Prefix shared by all jitter buffer keys
pub const CONF_PREFIX: &str = "jb.";

/// Default maximum buffer size, ms
pub const DEFAULT_MAX_SIZE: i64 = 200;

/// Default resynchronization threshold, ms
pub const DEFAULT_RESYNC_THRESHOLD: i64 = 1000;

/// Default extra latency of the adaptive buffer, ms
pub const DEFAULT_TARGET_EXTRA: i64 = 40;

/// Implementation used when none or an unknown one is configured
pub const DEFAULT_IMPL: &str = "fixed";

/// Longest accepted implementation name
pub const IMPL_NAME_MAX_LEN: usize = 12;

/// Per-channel jitter buffer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterBufferConfig {
    /// Buffer audio toward this channel
    pub enabled: bool,

    /// Buffer even when the channel claims its own jitter handling
    pub forced: bool,

    /// Maximum buffered audio in ms
    pub max_size: i64,

    /// Timestamp discontinuity in ms that triggers a full resync
    pub resync_threshold: i64,

    /// Extra latency in ms the adaptive buffer keeps above the observed jitter,
    /// and the headroom the fixed buffer leaves between its delay and `max_size`
    pub target_extra: i64,

    /// Implementation name
    #[serde(rename = "impl")]
    pub impl_name: String,

    /// Write a frame log file for each buffer
    pub log: bool,

    /// Directory frame log files are created in
    pub log_dir: PathBuf,
}

impl Default for JitterBufferConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            forced: false,
            max_size: DEFAULT_MAX_SIZE,
            resync_threshold: DEFAULT_RESYNC_THRESHOLD,
            target_extra: DEFAULT_TARGET_EXTRA,
            impl_name: DEFAULT_IMPL.to_string(),
            log: false,
            log_dir: std::env::temp_dir(),
        }
    }
}

impl JitterBufferConfig {
    /// Apply one configuration key
    ///
    /// Keys are matched case-insensitively. A key that is not a jitter buffer
    /// key is returned as [`Error::Config`] so the caller can hand it to
    /// another consumer. A recognized key with a malformed value is logged and
    /// leaves the current setting unchanged.
    pub fn read_conf(&mut self, key: &str, value: &str) -> Result<()> {
        let lower = key.to_ascii_lowercase();
        let name = lower
            .strip_prefix(CONF_PREFIX)
            .ok_or_else(|| Error::config(key, value))?;

        match name {
            "enable" => self.enabled = parse_bool(value),
            "force" => self.forced = parse_bool(value),
            "log" => self.log = parse_bool(value),
            "maxsize" => {
                if let Some(size) = parse_positive(key, value) {
                    self.max_size = size;
                }
            }
            "resyncthreshold" => {
                if let Some(threshold) = parse_positive(key, value) {
                    self.resync_threshold = threshold;
                }
            }
            "targetextra" => match value.trim().parse::<i64>() {
                Ok(extra) => self.target_extra = extra,
                Err(_) => warn!("Ignoring malformed value {:?} for {}", value, key),
            },
            "impl" => {
                let name = value.trim();
                if name.is_empty() {
                    warn!("Ignoring empty value for {}", key);
                } else {
                    self.impl_name = name.chars().take(IMPL_NAME_MAX_LEN).collect();
                }
            }
            _ => return Err(Error::config(key, value)),
        }
        Ok(())
    }

    /// Build a configuration from key/value pairs on top of the defaults
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in pairs {
            config.read_conf(key.as_ref(), value.as_ref())?;
        }
        Ok(config)
    }

    /// Deserialize a configuration from JSON, missing fields taking defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(json)?;
        config.sanitize();
        Ok(config)
    }

    /// Reset out-of-range values to their defaults
    fn sanitize(&mut self) {
        if self.max_size <= 0 {
            warn!("Ignoring non-positive max_size {}", self.max_size);
            self.max_size = DEFAULT_MAX_SIZE;
        }
        if self.resync_threshold <= 0 {
            warn!("Ignoring non-positive resync_threshold {}", self.resync_threshold);
            self.resync_threshold = DEFAULT_RESYNC_THRESHOLD;
        }
        if self.impl_name.trim().is_empty() {
            self.impl_name = DEFAULT_IMPL.to_string();
        } else if self.impl_name.chars().count() > IMPL_NAME_MAX_LEN {
            self.impl_name = self.impl_name.chars().take(IMPL_NAME_MAX_LEN).collect();
        }
    }
}

/// Configuration boolean: yes/true/y/t/1/on are true, anything else false
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "true" | "y" | "t" | "1" | "on"
    )
}

fn parse_positive(key: &str, value: &str) -> Option<i64> {
    match value.trim().parse::<i64>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            warn!("Ignoring malformed value {:?} for {}", value, key);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = JitterBufferConfig::default();
        assert!(!config.enabled);
        assert!(!config.forced);
        assert_eq!(config.max_size, 200);
        assert_eq!(config.resync_threshold, 1000);
        assert_eq!(config.target_extra, 40);
        assert_eq!(config.impl_name, "fixed");
    }

    #[test]
    fn test_read_conf_keys() {
        let config = JitterBufferConfig::from_pairs([
            ("jb.enable", "yes"),
            ("JB.Force", "On"),
            ("jb.maxsize", "300"),
            ("jb.resyncthreshold", "500"),
            ("jb.targetextra", "-5"),
            ("jb.impl", "adaptive"),
            ("jb.log", "0"),
        ])
        .unwrap();

        assert!(config.enabled);
        assert!(config.forced);
        assert_eq!(config.max_size, 300);
        assert_eq!(config.resync_threshold, 500);
        assert_eq!(config.target_extra, -5);
        assert_eq!(config.impl_name, "adaptive");
        assert!(!config.log);
    }

    #[test]
    fn test_malformed_values_are_ignored() {
        let mut config = JitterBufferConfig::default();
        config.read_conf("jb.maxsize", "lots").unwrap();
        config.read_conf("jb.maxsize", "-20").unwrap();
        config.read_conf("jb.resyncthreshold", "0").unwrap();
        config.read_conf("jb.impl", "  ").unwrap();
        assert_eq!(config, JitterBufferConfig::default());

        config.read_conf("jb.impl", "averyveryverylongname").unwrap();
        assert_eq!(config.impl_name, "averyveryver");
    }

    #[test]
    fn test_unknown_keys_are_returned() {
        let mut config = JitterBufferConfig::default();
        assert!(matches!(
            config.read_conf("jb.bogus", "1"),
            Err(Error::Config { .. })
        ));
        assert!(matches!(
            config.read_conf("maxsize", "100"),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_bool_parsing() {
        for value in ["yes", "TRUE", "y", "t", "1", "on", " On "] {
            assert!(parse_bool(value), "{value}");
        }
        for value in ["no", "off", "0", "", "enable"] {
            assert!(!parse_bool(value), "{value}");
        }
    }

    #[test]
    fn test_from_json() {
        let config = JitterBufferConfig::from_json(
            r#"{"enabled": true, "impl": "adaptive", "max_size": -1, "target_extra": 60}"#,
        )
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.impl_name, "adaptive");
        assert_eq!(config.max_size, DEFAULT_MAX_SIZE);
        assert_eq!(config.target_extra, 60);
        assert_eq!(config.resync_threshold, DEFAULT_RESYNC_THRESHOLD);

        assert!(matches!(
            JitterBufferConfig::from_json("{not json"),
            Err(Error::Json(_))
        ));
    }
}
