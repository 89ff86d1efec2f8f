use log::warn;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// A touch released sooner than this, without moving, is a tap
    pub tap_threshold_ms: u64,
    /// How many candidate slots are presented
    pub top_k: usize,
    /// A fresh session covers today and this many following days
    pub default_range_days: u32,
    /// Longest date range a session accepts
    pub max_range_days: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            tap_threshold_ms: 300,
            top_k: 10,
            default_range_days: 7,
            max_range_days: 31,
        }
    }
}

fn env_override<T: FromStr>(name: &str, target: &mut T) {
    if let Ok(value) = env::var(name) {
        match value.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!("Ignoring {}={:?}, not a valid value", name, value),
        }
    }
}

impl Settings {
    /// Settings from a JSON document; missing fields keep their defaults
    ///
    /// # Examples
    /// ```
    /// use zeitraster_libs::config::Settings;
    ///
    /// let settings = Settings::from_json(r#"{ "topK": 3 }"#).unwrap();
    ///
    /// assert_eq!(settings.top_k, 3);
    /// assert_eq!(settings.tap_threshold_ms, 300);
    /// ```
    pub fn from_json(json: &str) -> Result<Settings, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Overlays `ZEITRASTER_*` environment variables on top of `self`
    pub fn with_env(mut self) -> Settings {
        env_override("ZEITRASTER_TAP_THRESHOLD_MS", &mut self.tap_threshold_ms);
        env_override("ZEITRASTER_TOP_K", &mut self.top_k);
        env_override("ZEITRASTER_DEFAULT_RANGE_DAYS", &mut self.default_range_days);
        env_override("ZEITRASTER_MAX_RANGE_DAYS", &mut self.max_range_days);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_and_ignores_garbage() {
        env::set_var("ZEITRASTER_TOP_K", "5");
        env::set_var("ZEITRASTER_MAX_RANGE_DAYS", "lots");

        let settings = Settings::default().with_env();

        env::remove_var("ZEITRASTER_TOP_K");
        env::remove_var("ZEITRASTER_MAX_RANGE_DAYS");

        assert_eq!(settings.top_k, 5);
        assert_eq!(settings.max_range_days, 31);
    }

    #[test]
    fn missing_fields_default_and_bad_types_fail() {
        assert_eq!(Settings::from_json("{}").unwrap(), Settings::default());
        assert!(Settings::from_json(r#"{ "topK": "ten" }"#).is_err());
    }
}
