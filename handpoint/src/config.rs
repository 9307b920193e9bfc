//! Configuration: s-expression plist file plus command-line overrides.
//!
//! A config file is a single plist, e.g.
//!
//! ```text
//! (:click-threshold 40 :smoothing 0.5 :swap-roles nil :screen-width 2560)
//! ```
//!
//! Keys not present keep their defaults.  Unknown keys are logged and
//! ignored; a known key with a value of the wrong type is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lexpr::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::tracking::{ChannelConfig, CursorConfig, MenuConfig, RoleMapping};

// ── Errors ─────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed s-expression: {0}")]
    Parse(String),
    #[error("config must be a plist of :key value pairs")]
    NotPlist,
    #[error("invalid value for :{key}: {value} (expected {expected})")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
    #[error(":{key} {reason}")]
    OutOfRange { key: &'static str, reason: String },
}

// ── Pipeline config ────────────────────────────────────────

/// Loop-level settings shared by both pipelines.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Log a status line every N frames.
    pub status_interval_frames: u64,
    /// Number of samples in the rolling timing window.
    pub timing_window: usize,
    /// Per-frame processing budget in milliseconds.
    pub frame_budget_ms: f64,
    /// Key code that ends the pointer pipeline (ESC).
    pub pointer_exit_key: i32,
    /// Key code that closes the menu ('q').
    pub menu_exit_key: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            status_interval_frames: 300,
            timing_window: 300,
            frame_budget_ms: 33.3,
            pointer_exit_key: 27,
            menu_exit_key: b'q' as i32,
        }
    }
}

// ── Config ─────────────────────────────────────────────────

/// Effective configuration of one run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub mapping: RoleMapping,
    pub cursor: CursorConfig,
    pub channels: ChannelConfig,
    pub menu: MenuConfig,
    pub pipeline: PipelineConfig,
}

/// Values given on the command line; `None` keeps the file/default value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub screen: Option<(u32, u32)>,
    pub swap_roles: bool,
}

impl Config {
    /// Load from an optional file.  No file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("loading config from {}", path.display());
        Self::from_sexp(&text)
    }

    /// Parse a plist on top of the defaults.
    pub fn from_sexp(text: &str) -> Result<Self, ConfigError> {
        let value = lexpr::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();
        for (key, val) in plist_entries(&value)? {
            config.set(&key, &val)?;
        }
        Ok(config)
    }

    fn set(&mut self, key: &str, val: &str) -> Result<(), ConfigError> {
        match key {
            "primary-label" => self.mapping.primary_label = val.to_string(),
            "swap-roles" => self.mapping.swap = parse_bool(key, val)?,

            "margin" => self.cursor.margin_px = parse_f32(key, val)?,
            "smoothing" => self.cursor.smoothing = parse_f32(key, val)?,
            "screen-width" => self.cursor.screen_width = parse_u32(key, val)?,
            "screen-height" => self.cursor.screen_height = parse_u32(key, val)?,

            "click-threshold" => self.channels.click_threshold_px = parse_f32(key, val)?,
            "double-click-ms" => self.channels.double_click_boundary = parse_ms(key, val)?,
            "right-click-cooldown-ms" => {
                self.channels.right_click_cooldown = parse_ms(key, val)?
            }
            "scroll-amount" => self.channels.scroll_amount = parse_i32(key, val)?,

            "activation-threshold" => self.menu.activation.threshold_px = parse_f32(key, val)?,
            "activation-cooldown-ms" => self.menu.activation.cooldown = parse_ms(key, val)?,
            "hover-max-distance" => self.menu.hover.max_distance_px = parse_f32(key, val)?,
            "hover-range" => self.menu.hover.range_px = parse_f32(key, val)?,
            "transition-ms" => self.menu.transition = parse_ms(key, val)?,

            "status-interval" => {
                self.pipeline.status_interval_frames = parse_u32(key, val)? as u64
            }
            "timing-window" => self.pipeline.timing_window = parse_u32(key, val)? as usize,
            "frame-budget-ms" => self.pipeline.frame_budget_ms = parse_f64(key, val)?,
            "pointer-exit-key" => self.pipeline.pointer_exit_key = parse_i32(key, val)?,
            "menu-exit-key" => self.pipeline.menu_exit_key = parse_i32(key, val)?,

            other => warn!("ignoring unknown config key :{}", other),
        }
        Ok(())
    }

    /// Apply command-line values on top of the file.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some((w, h)) = overrides.screen {
            self.cursor.screen_width = w;
            self.cursor.screen_height = h;
        }
        if overrides.swap_roles {
            self.mapping.swap = true;
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("click-threshold", self.channels.click_threshold_px)?;
        positive("activation-threshold", self.menu.activation.threshold_px)?;
        positive("hover-range", self.menu.hover.range_px)?;

        let s = self.cursor.smoothing;
        if !(s > 0.0 && s <= 1.0) {
            return Err(ConfigError::OutOfRange {
                key: "smoothing",
                reason: format!("must be in (0, 1], got {}", s),
            });
        }
        if !(self.cursor.margin_px >= 0.0) {
            return Err(ConfigError::OutOfRange {
                key: "margin",
                reason: format!("must not be negative, got {}", self.cursor.margin_px),
            });
        }
        if self.cursor.screen_width == 0 || self.cursor.screen_height == 0 {
            return Err(ConfigError::OutOfRange {
                key: "screen-width",
                reason: format!(
                    "screen size must be non-zero, got {}x{}",
                    self.cursor.screen_width, self.cursor.screen_height
                ),
            });
        }
        if self.channels.scroll_amount <= 0 {
            return Err(ConfigError::OutOfRange {
                key: "scroll-amount",
                reason: format!("must be positive, got {}", self.channels.scroll_amount),
            });
        }

        let transition = self.menu.transition;
        if transition < Duration::from_millis(1200) || transition > Duration::from_millis(1400) {
            return Err(ConfigError::OutOfRange {
                key: "transition-ms",
                reason: format!("must be within 1200..=1400, got {}", transition.as_millis()),
            });
        }
        if self.pipeline.status_interval_frames == 0 || self.pipeline.timing_window == 0 {
            return Err(ConfigError::OutOfRange {
                key: "status-interval",
                reason: "status interval and timing window must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Effective configuration as a plist, readable by `from_sexp`.
    pub fn config_sexp(&self) -> String {
        format!(
            "(:primary-label {:?} :swap-roles {} \
             :margin {} :smoothing {} :screen-width {} :screen-height {} \
             :click-threshold {} :double-click-ms {} :right-click-cooldown-ms {} :scroll-amount {} \
             :activation-threshold {} :activation-cooldown-ms {} :hover-max-distance {} :hover-range {} :transition-ms {} \
             :status-interval {} :timing-window {} :frame-budget-ms {} :pointer-exit-key {} :menu-exit-key {})",
            self.mapping.primary_label,
            if self.mapping.swap { "t" } else { "nil" },
            self.cursor.margin_px,
            self.cursor.smoothing,
            self.cursor.screen_width,
            self.cursor.screen_height,
            self.channels.click_threshold_px,
            self.channels.double_click_boundary.as_millis(),
            self.channels.right_click_cooldown.as_millis(),
            self.channels.scroll_amount,
            self.menu.activation.threshold_px,
            self.menu.activation.cooldown.as_millis(),
            self.menu.hover.max_distance_px,
            self.menu.hover.range_px,
            self.menu.transition.as_millis(),
            self.pipeline.status_interval_frames,
            self.pipeline.timing_window,
            self.pipeline.frame_budget_ms,
            self.pipeline.pointer_exit_key,
            self.pipeline.menu_exit_key,
        )
    }
}

// ── Plist helpers ──────────────────────────────────────────

/// Walk a plist into (key, value) pairs, values rendered as strings.
fn plist_entries(value: &Value) -> Result<Vec<(String, String)>, ConfigError> {
    let mut entries = Vec::new();
    let mut current = value;
    loop {
        match current {
            Value::Cons(pair) => {
                let key = match pair.car() {
                    Value::Keyword(k) => k.to_string(),
                    Value::Symbol(s) => match s.strip_prefix(':') {
                        Some(k) => k.to_string(),
                        None => return Err(ConfigError::NotPlist),
                    },
                    _ => return Err(ConfigError::NotPlist),
                };
                let Value::Cons(next) = pair.cdr() else {
                    return Err(ConfigError::NotPlist);
                };
                entries.push((key, value_string(next.car())));
                current = next.cdr();
            }
            Value::Null | Value::Nil => break,
            _ => return Err(ConfigError::NotPlist),
        }
    }
    Ok(entries)
}

fn value_string(val: &Value) -> String {
    match val {
        Value::Keyword(v) => v.to_string(),
        Value::Symbol(v) => {
            let s = v.to_string();
            s.strip_prefix(':').unwrap_or(&s).to_string()
        }
        Value::String(v) => v.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "t" } else { "nil" }.to_string(),
        Value::Null | Value::Nil => "nil".to_string(),
        _ => val.to_string(),
    }
}

fn invalid(key: &str, val: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: val.to_string(),
        expected,
    }
}

fn parse_bool(key: &str, val: &str) -> Result<bool, ConfigError> {
    match val {
        "t" => Ok(true),
        "nil" => Ok(false),
        _ => Err(invalid(key, val, "t or nil")),
    }
}

fn parse_f32(key: &str, val: &str) -> Result<f32, ConfigError> {
    val.parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(key, val, "a number"))
}

fn parse_f64(key: &str, val: &str) -> Result<f64, ConfigError> {
    val.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(key, val, "a number"))
}

fn parse_u32(key: &str, val: &str) -> Result<u32, ConfigError> {
    val.parse().map_err(|_| invalid(key, val, "a non-negative integer"))
}

fn parse_i32(key: &str, val: &str) -> Result<i32, ConfigError> {
    val.parse().map_err(|_| invalid(key, val, "an integer"))
}

fn parse_ms(key: &str, val: &str) -> Result<Duration, ConfigError> {
    val.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| invalid(key, val, "milliseconds"))
}

fn positive(key: &'static str, v: f32) -> Result<(), ConfigError> {
    if v > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            key,
            reason: format!("must be positive, got {}", v),
        })
    }
}

/// Parse a `WxH` screen size.
pub fn parse_screen(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got {s:?}"))?;
    let w = w.trim().parse().map_err(|_| format!("bad width in {s:?}"))?;
    let h = h.trim().parse().map_err(|_| format!("bad height in {s:?}"))?;
    Ok((w, h))
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.menu_exit_key, 113);
        assert_eq!(config.channels.scroll_amount, 60);
    }

    #[test]
    fn test_load_none_is_default() {
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }

    #[test]
    fn test_from_sexp_overrides_fields() {
        let config = Config::from_sexp(
            "(:click-threshold 30 :smoothing 0.25 :swap-roles t :double-click-ms 400 :primary-label \"Left\")",
        )
        .unwrap();
        assert_eq!(config.channels.click_threshold_px, 30.0);
        assert_eq!(config.cursor.smoothing, 0.25);
        assert!(config.mapping.swap);
        assert_eq!(config.mapping.primary_label, "Left");
        assert_eq!(config.channels.double_click_boundary, Duration::from_millis(400));
        assert_eq!(config.channels.right_click_cooldown, Duration::from_millis(300));
    }

    #[test]
    fn test_empty_plist() {
        assert_eq!(Config::from_sexp("()").unwrap(), Config::default());
    }

    #[test]
    fn test_unknown_key_ignored() {
        let config = Config::from_sexp("(:voice-model \"base\" :scroll-amount 90)").unwrap();
        assert_eq!(config.channels.scroll_amount, 90);
    }

    #[test]
    fn test_wrong_type_is_error() {
        let err = Config::from_sexp("(:smoothing \"fast\")").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "smoothing"));
        assert!(Config::from_sexp("(:swap-roles 3)").is_err());
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(Config::from_sexp("(:margin"), Err(ConfigError::Parse(_))));
        assert!(matches!(Config::from_sexp("(:margin)"), Err(ConfigError::NotPlist)));
        assert!(matches!(Config::from_sexp("(margin 3)"), Err(ConfigError::NotPlist)));
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = Config::default();
        config.cursor.smoothing = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cursor.smoothing = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.channels.click_threshold_px = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.menu.transition = Duration::from_millis(2000);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cursor.screen_height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply(&Overrides {
            screen: Some((2560, 1440)),
            swap_roles: true,
        });
        assert_eq!(config.cursor.screen_width, 2560);
        assert_eq!(config.cursor.screen_height, 1440);
        assert!(config.mapping.swap);
    }

    #[test]
    fn test_config_sexp_reloads() {
        let mut config = Config::default();
        config.cursor.smoothing = 0.75;
        config.mapping.swap = true;
        config.menu.transition = Duration::from_millis(1300);
        let reloaded = Config::from_sexp(&config.config_sexp()).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(:screen-width 1280 :screen-height 720)").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.cursor.screen_width, 1280);
        assert_eq!(config.cursor.screen_height, 720);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.el"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_parse_screen() {
        assert_eq!(parse_screen("1920x1080"), Ok((1920, 1080)));
        assert_eq!(parse_screen("800X600"), Ok((800, 600)));
        assert!(parse_screen("1920").is_err());
        assert!(parse_screen("ax1").is_err());
    }
}
