use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

pub const DEFAULT_MILEAGE_RATE: f64 = 0.67;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    /// Deduction per business mile.
    pub mileage_rate: f64,
    /// Last user choice for automatic tracking. Remembered, not applied at startup.
    pub auto_tracking_enabled: bool,
    pub debug_mode: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            mileage_rate: DEFAULT_MILEAGE_RATE,
            auto_tracking_enabled: false,
            debug_mode: false,
        }
    }
}

impl UserSettings {
    /// Falls back to the default rate when the stored one is unusable.
    pub fn effective_mileage_rate(&self) -> f64 {
        if self.mileage_rate.is_finite() && self.mileage_rate > 0.0 {
            self.mileage_rate
        } else {
            DEFAULT_MILEAGE_RATE
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring unreadable settings at {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn snapshot(&self) -> UserSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_auto_tracking_enabled(&self, enabled: bool) -> Result<()> {
        self.update(|settings| settings.auto_tracking_enabled = enabled)
    }

    pub fn set_debug_mode(&self, enabled: bool) -> Result<()> {
        self.update(|settings| settings.debug_mode = enabled)
    }

    pub fn set_mileage_rate(&self, rate: f64) -> Result<()> {
        self.update(|settings| settings.mileage_rate = rate)
    }

    fn update(&self, apply: impl FnOnce(&mut UserSettings)) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        apply(&mut guard);
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
