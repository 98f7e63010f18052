//! Engine configuration with typed defaults.
//!
//! Values come from, in order: built-in defaults, a JSON document at
//! `AFFINITY_CONFIG_PATH`, then `AFFINITY_<KEY>` environment variables.
//! Every value is parsed leniently; a malformed value falls back to the
//! documented default for its key and never fails startup.

use chrono::Duration;
use chrono_tz::Tz;
use serde_json::Value;

pub const CONFIG_PATH_ENV: &str = "AFFINITY_CONFIG_PATH";
pub const ENV_PREFIX: &str = "AFFINITY_";

/// Upper bound for every cooldown and window, in seconds (one year).
pub const MAX_WINDOW_SECONDS: i64 = 366 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct FavorabilityConfig {
    pub enabled: bool,
    pub reasoning_detection_enabled: bool,
    pub skip_penalty_when_not_talking_to_me: bool,
    pub inject_prompt_enabled: bool,
    pub debug_log_prompt_injection: bool,
    pub debug_log_reasoning_detection: bool,

    pub positive_delta: i32,
    pub positive_bonus_delta: i32,
    pub affectionate_delta: i32,
    pub negative_delta: i32,
    pub mild_negative_delta: i32,
    pub severe_delta: i32,
    pub harassment_delta: i32,
    pub normal_delta: i32,
    pub reasoning_positive_delta: i32,
    pub reasoning_positive_bonus_high: i32,
    pub reasoning_positive_bonus_mid: i32,
    pub reasoning_positive_bonus_low: i32,

    pub harassment_window_seconds: i64,
    pub harassment_threshold: usize,
    pub positive_cooldown_seconds: i64,
    pub negative_cooldown_seconds: i64,
    pub normal_cooldown_seconds: i64,
    pub interaction_cooldown_seconds: i64,
    pub daily_normal_limit: i32,

    pub min_positive_length: usize,
    pub min_normal_length: usize,

    /// Timezone whose calendar date drives the daily normal-gain reset.
    pub timezone: Tz,
}

impl Default for FavorabilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reasoning_detection_enabled: false,
            skip_penalty_when_not_talking_to_me: true,
            inject_prompt_enabled: true,
            debug_log_prompt_injection: false,
            debug_log_reasoning_detection: false,

            positive_delta: 1,
            positive_bonus_delta: 1,
            affectionate_delta: 3,
            negative_delta: -5,
            mild_negative_delta: -1,
            severe_delta: -5,
            harassment_delta: -25,
            normal_delta: 1,
            reasoning_positive_delta: 1,
            reasoning_positive_bonus_high: 2,
            reasoning_positive_bonus_mid: 1,
            reasoning_positive_bonus_low: 1,

            harassment_window_seconds: 300,
            harassment_threshold: 3,
            positive_cooldown_seconds: 120,
            negative_cooldown_seconds: 120,
            normal_cooldown_seconds: 300,
            interaction_cooldown_seconds: 120,
            daily_normal_limit: 10,

            min_positive_length: 4,
            min_normal_length: 6,

            timezone: Tz::UTC,
        }
    }
}

/// A raw configuration value before lenient parsing.
#[derive(Debug, Clone)]
pub enum RawValue {
    Json(Value),
    Text(String),
}

impl FavorabilityConfig {
    /// Defaults, then the JSON file named by `AFFINITY_CONFIG_PATH`, then env overrides.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            match std::fs::read_to_string(&path) {
                Ok(raw) => match serde_json::from_str::<Value>(&raw) {
                    Ok(document) => config.apply_json(&document),
                    Err(err) => tracing::warn!(
                        path = %path,
                        error = %err,
                        "config file is not valid JSON; using defaults"
                    ),
                },
                Err(err) => tracing::warn!(
                    path = %path,
                    error = %err,
                    "config file unreadable; using defaults"
                ),
            }
        }

        config.apply_source(|key| {
            std::env::var(format!("{ENV_PREFIX}{}", key.to_uppercase()))
                .ok()
                .map(RawValue::Text)
        });
        config
    }

    /// Build a config from a JSON document (keys at top level or under `"favorability"`).
    pub fn from_json(document: &Value) -> Self {
        let mut config = Self::default();
        config.apply_json(document);
        config
    }

    pub fn apply_json(&mut self, document: &Value) {
        let section = document.get("favorability").unwrap_or(document);
        self.apply_source(|key| section.get(key).cloned().map(RawValue::Json));
    }

    /// Overlay every key the source knows about onto this config.
    pub fn apply_source<F>(&mut self, source: F)
    where
        F: Fn(&str) -> Option<RawValue>,
    {
        let d = Self::default();

        read_bool(&source, "enabled", &mut self.enabled, d.enabled);
        read_bool(
            &source,
            "reasoning_detection_enabled",
            &mut self.reasoning_detection_enabled,
            d.reasoning_detection_enabled,
        );
        read_bool(
            &source,
            "skip_penalty_when_not_talking_to_me",
            &mut self.skip_penalty_when_not_talking_to_me,
            d.skip_penalty_when_not_talking_to_me,
        );
        read_bool(
            &source,
            "inject_prompt_enabled",
            &mut self.inject_prompt_enabled,
            d.inject_prompt_enabled,
        );
        read_bool(
            &source,
            "debug_log_prompt_injection",
            &mut self.debug_log_prompt_injection,
            d.debug_log_prompt_injection,
        );
        read_bool(
            &source,
            "debug_log_reasoning_detection",
            &mut self.debug_log_reasoning_detection,
            d.debug_log_reasoning_detection,
        );

        read_i32(&source, "positive_delta", &mut self.positive_delta, d.positive_delta);
        read_i32(
            &source,
            "positive_bonus_delta",
            &mut self.positive_bonus_delta,
            d.positive_bonus_delta,
        );
        read_i32(
            &source,
            "affectionate_delta",
            &mut self.affectionate_delta,
            d.affectionate_delta,
        );
        read_i32(&source, "negative_delta", &mut self.negative_delta, d.negative_delta);
        read_i32(
            &source,
            "mild_negative_delta",
            &mut self.mild_negative_delta,
            d.mild_negative_delta,
        );
        read_i32(&source, "severe_delta", &mut self.severe_delta, d.severe_delta);
        read_i32(
            &source,
            "harassment_delta",
            &mut self.harassment_delta,
            d.harassment_delta,
        );
        read_i32(&source, "normal_delta", &mut self.normal_delta, d.normal_delta);
        read_i32(
            &source,
            "reasoning_positive_delta",
            &mut self.reasoning_positive_delta,
            d.reasoning_positive_delta,
        );
        read_i32(
            &source,
            "reasoning_positive_bonus_high",
            &mut self.reasoning_positive_bonus_high,
            d.reasoning_positive_bonus_high,
        );
        read_i32(
            &source,
            "reasoning_positive_bonus_mid",
            &mut self.reasoning_positive_bonus_mid,
            d.reasoning_positive_bonus_mid,
        );
        read_i32(
            &source,
            "reasoning_positive_bonus_low",
            &mut self.reasoning_positive_bonus_low,
            d.reasoning_positive_bonus_low,
        );

        read_seconds(
            &source,
            "harassment_window_seconds",
            &mut self.harassment_window_seconds,
            d.harassment_window_seconds,
        );
        read_count(
            &source,
            "harassment_threshold",
            &mut self.harassment_threshold,
            d.harassment_threshold,
        );
        read_seconds(
            &source,
            "positive_cooldown_seconds",
            &mut self.positive_cooldown_seconds,
            d.positive_cooldown_seconds,
        );
        read_seconds(
            &source,
            "negative_cooldown_seconds",
            &mut self.negative_cooldown_seconds,
            d.negative_cooldown_seconds,
        );
        read_seconds(
            &source,
            "normal_cooldown_seconds",
            &mut self.normal_cooldown_seconds,
            d.normal_cooldown_seconds,
        );
        read_seconds(
            &source,
            "interaction_cooldown_seconds",
            &mut self.interaction_cooldown_seconds,
            d.interaction_cooldown_seconds,
        );
        let mut daily_limit = self.daily_normal_limit as i64;
        read_non_negative(
            &source,
            "daily_normal_limit",
            &mut daily_limit,
            d.daily_normal_limit as i64,
        );
        self.daily_normal_limit = i32::try_from(daily_limit).unwrap_or(d.daily_normal_limit);

        read_count(
            &source,
            "min_positive_length",
            &mut self.min_positive_length,
            d.min_positive_length,
        );
        read_count(
            &source,
            "min_normal_length",
            &mut self.min_normal_length,
            d.min_normal_length,
        );

        if let Some(raw) = source("timezone") {
            let parsed = match &raw {
                RawValue::Json(Value::String(name)) | RawValue::Text(name) => {
                    name.trim().parse::<Tz>().ok()
                }
                RawValue::Json(_) => None,
            };
            self.timezone = parsed.unwrap_or_else(|| {
                tracing::warn!(key = "timezone", value = ?raw, "malformed config value; using default");
                d.timezone
            });
        }
    }

    pub fn positive_cooldown(&self) -> Duration {
        window(self.positive_cooldown_seconds)
    }

    pub fn negative_cooldown(&self) -> Duration {
        window(self.negative_cooldown_seconds)
    }

    pub fn normal_cooldown(&self) -> Duration {
        window(self.normal_cooldown_seconds)
    }

    pub fn interaction_cooldown(&self) -> Duration {
        window(self.interaction_cooldown_seconds)
    }

    pub fn harassment_window(&self) -> Duration {
        window(self.harassment_window_seconds)
    }

    /// Longest window any rate-state entry can still matter for.
    pub fn longest_window(&self) -> Duration {
        let longest = [
            self.positive_cooldown_seconds,
            self.negative_cooldown_seconds,
            self.normal_cooldown_seconds,
            self.interaction_cooldown_seconds,
            self.harassment_window_seconds,
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        window(longest)
    }
}

/// Fields are public, so durations are clamped here as well as at load time.
fn window(seconds: i64) -> Duration {
    Duration::seconds(seconds.clamp(0, MAX_WINDOW_SECONDS))
}

/// Integer from a raw value. Booleans, objects and unparsable strings are rejected;
/// floats truncate toward zero.
pub fn parse_int(raw: &RawValue) -> Option<i64> {
    match raw {
        RawValue::Json(Value::Bool(_)) | RawValue::Json(Value::Null) => None,
        RawValue::Json(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        RawValue::Json(Value::String(text)) | RawValue::Text(text) => text.trim().parse().ok(),
        RawValue::Json(_) => None,
    }
}

pub fn parse_bool(raw: &RawValue) -> Option<bool> {
    match raw {
        RawValue::Json(Value::Bool(flag)) => Some(*flag),
        RawValue::Json(Value::Number(number)) => match number.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        RawValue::Json(Value::String(text)) | RawValue::Text(text) => {
            match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            }
        }
        RawValue::Json(_) => None,
    }
}

fn warn_malformed(key: &str, raw: &RawValue) {
    tracing::warn!(key, value = ?raw, "malformed config value; using default");
}

fn read_bool<F>(source: &F, key: &str, slot: &mut bool, default: bool)
where
    F: Fn(&str) -> Option<RawValue>,
{
    if let Some(raw) = source(key) {
        *slot = parse_bool(&raw).unwrap_or_else(|| {
            warn_malformed(key, &raw);
            default
        });
    }
}

fn read_i32<F>(source: &F, key: &str, slot: &mut i32, default: i32)
where
    F: Fn(&str) -> Option<RawValue>,
{
    if let Some(raw) = source(key) {
        *slot = parse_int(&raw)
            .and_then(|value| i32::try_from(value).ok())
            .unwrap_or_else(|| {
                warn_malformed(key, &raw);
                default
            });
    }
}

fn read_non_negative<F>(source: &F, key: &str, slot: &mut i64, default: i64)
where
    F: Fn(&str) -> Option<RawValue>,
{
    if let Some(raw) = source(key) {
        *slot = parse_int(&raw)
            .filter(|value| *value >= 0)
            .unwrap_or_else(|| {
                warn_malformed(key, &raw);
                default
            });
    }
}

fn read_seconds<F>(source: &F, key: &str, slot: &mut i64, default: i64)
where
    F: Fn(&str) -> Option<RawValue>,
{
    if let Some(raw) = source(key) {
        *slot = parse_int(&raw)
            .filter(|value| (0..=MAX_WINDOW_SECONDS).contains(value))
            .unwrap_or_else(|| {
                warn_malformed(key, &raw);
                default
            });
    }
}

fn read_count<F>(source: &F, key: &str, slot: &mut usize, default: usize)
where
    F: Fn(&str) -> Option<RawValue>,
{
    if let Some(raw) = source(key) {
        *slot = parse_int(&raw)
            .and_then(|value| usize::try_from(value).ok())
            .unwrap_or_else(|| {
                warn_malformed(key, &raw);
                default
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn json_overrides_are_applied() {
        let config = FavorabilityConfig::from_json(&json!({
            "favorability": {
                "positive_delta": 2,
                "harassment_threshold": 5,
                "reasoning_detection_enabled": true,
                "timezone": "Asia/Shanghai"
            }
        }));
        assert_eq!(config.positive_delta, 2);
        assert_eq!(config.harassment_threshold, 5);
        assert!(config.reasoning_detection_enabled);
        assert_eq!(config.timezone, chrono_tz::Asia::Shanghai);
        assert_eq!(config.negative_delta, -5);
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let config = FavorabilityConfig::from_json(&json!({
            "positive_delta": true,
            "negative_delta": "not a number",
            "severe_delta": {"nested": 1},
            "harassment_window_seconds": -10,
            "enabled": "maybe",
            "timezone": "Mars/Olympus_Mons"
        }));
        let defaults = FavorabilityConfig::default();
        assert_eq!(config.positive_delta, defaults.positive_delta);
        assert_eq!(config.negative_delta, defaults.negative_delta);
        assert_eq!(config.severe_delta, defaults.severe_delta);
        assert_eq!(
            config.harassment_window_seconds,
            defaults.harassment_window_seconds
        );
        assert!(config.enabled);
        assert_eq!(config.timezone, Tz::UTC);
    }

    #[test]
    fn numeric_strings_and_floats_are_accepted() {
        let config = FavorabilityConfig::from_json(&json!({
            "affectionate_delta": " 4 ",
            "severe_delta": -7.9,
            "min_normal_length": 8.0
        }));
        assert_eq!(config.affectionate_delta, 4);
        assert_eq!(config.severe_delta, -7);
        assert_eq!(config.min_normal_length, 8);
    }

    #[test]
    fn text_source_parses_like_environment_variables() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("enabled", "off"),
            ("daily_normal_limit", "3"),
            ("positive_cooldown_seconds", "soon"),
        ]);
        let mut config = FavorabilityConfig::default();
        config.positive_cooldown_seconds = 999;
        config.apply_source(|key| vars.get(key).map(|v| RawValue::Text(v.to_string())));
        assert!(!config.enabled);
        assert_eq!(config.daily_normal_limit, 3);
        assert_eq!(config.positive_cooldown_seconds, 120);
    }

    #[test]
    fn longest_window_covers_every_timer() {
        let config = FavorabilityConfig {
            harassment_window_seconds: 900,
            ..FavorabilityConfig::default()
        };
        assert_eq!(config.longest_window(), Duration::seconds(900));
    }

    #[test]
    fn oversized_windows_fall_back_to_defaults() {
        let mut config = FavorabilityConfig::default();
        config.apply_source(|key| match key {
            "harassment_window_seconds" | "normal_cooldown_seconds" => {
                Some(RawValue::Text(i64::MAX.to_string()))
            }
            _ => None,
        });
        let defaults = FavorabilityConfig::default();
        assert_eq!(
            config.harassment_window_seconds,
            defaults.harassment_window_seconds
        );
        assert_eq!(config.normal_cooldown_seconds, defaults.normal_cooldown_seconds);
        assert_eq!(config.harassment_window(), Duration::seconds(300));
    }

    #[test]
    fn durations_clamp_values_set_directly() {
        let config = FavorabilityConfig {
            positive_cooldown_seconds: i64::MAX,
            negative_cooldown_seconds: -5,
            ..FavorabilityConfig::default()
        };
        assert_eq!(
            config.positive_cooldown(),
            Duration::seconds(MAX_WINDOW_SECONDS)
        );
        assert_eq!(config.negative_cooldown(), Duration::zero());
        assert_eq!(config.longest_window(), Duration::seconds(MAX_WINDOW_SECONDS));
    }
}
