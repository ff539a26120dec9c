//! Runtime-toggleable flags shared by the analysis loop and the HTTP surface

use aqua_core::config::AlertConfig;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Flags read on every processed frame. Toggles become visible to the loop
/// within one frame interval.
#[derive(Debug)]
pub struct RuntimeSettings {
    alert_enabled: AtomicBool,
    sms_enabled: AtomicBool,
}

/// Point-in-time copy of the flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsView {
    pub alert_enabled: bool,
    pub sms_enabled: bool,
}

/// Partial update; absent fields keep their value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub alert_enabled: Option<bool>,
    #[serde(default)]
    pub sms_enabled: Option<bool>,
}

impl RuntimeSettings {
    pub fn new(alert_enabled: bool, sms_enabled: bool) -> Self {
        Self {
            alert_enabled: AtomicBool::new(alert_enabled),
            sms_enabled: AtomicBool::new(sms_enabled),
        }
    }

    pub fn from_config(config: &AlertConfig) -> Self {
        Self::new(config.alert_enabled, config.sms_enabled)
    }

    pub fn alert_enabled(&self) -> bool {
        self.alert_enabled.load(Ordering::Acquire)
    }

    pub fn set_alert_enabled(&self, enabled: bool) {
        self.alert_enabled.store(enabled, Ordering::Release);
    }

    pub fn sms_enabled(&self) -> bool {
        self.sms_enabled.load(Ordering::Acquire)
    }

    pub fn set_sms_enabled(&self, enabled: bool) {
        self.sms_enabled.store(enabled, Ordering::Release);
    }

    pub fn view(&self) -> SettingsView {
        SettingsView {
            alert_enabled: self.alert_enabled(),
            sms_enabled: self.sms_enabled(),
        }
    }

    /// Apply a partial update and return the resulting flags
    pub fn apply(&self, update: SettingsUpdate) -> SettingsView {
        if let Some(enabled) = update.alert_enabled {
            self.set_alert_enabled(enabled);
            info!("Geofence alerts {}", if enabled { "enabled" } else { "disabled" });
        }
        if let Some(enabled) = update.sms_enabled {
            self.set_sms_enabled(enabled);
            info!("SMS delivery {}", if enabled { "enabled" } else { "disabled" });
        }
        self.view()
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self::from_config(&AlertConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_defaults_follow_alert_config() {
        let settings = RuntimeSettings::default();
        assert!(!settings.alert_enabled());
        assert!(settings.sms_enabled());
    }

    #[test]
    fn test_partial_update() {
        let settings = RuntimeSettings::new(false, true);
        let view = settings.apply(SettingsUpdate {
            alert_enabled: Some(true),
            sms_enabled: None,
        });
        assert_eq!(view, SettingsView { alert_enabled: true, sms_enabled: true });

        let view = settings.apply(SettingsUpdate { sms_enabled: Some(false), ..Default::default() });
        assert_eq!(view, SettingsView { alert_enabled: true, sms_enabled: false });
    }

    #[test]
    fn test_update_deserializes_missing_fields() {
        let update: SettingsUpdate = serde_json::from_str(r#"{"alert_enabled": true}"#).unwrap();
        assert_eq!(update.alert_enabled, Some(true));
        assert_eq!(update.sms_enabled, None);
    }

    #[test]
    fn test_toggle_visible_across_threads() {
        let settings = Arc::new(RuntimeSettings::new(false, false));
        let writer = settings.clone();
        std::thread::spawn(move || writer.set_alert_enabled(true))
            .join()
            .unwrap();
        assert!(settings.alert_enabled());
    }
}
