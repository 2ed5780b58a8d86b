use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_THEME: &str = "system";

/// Settings shared between the front end and the completion connector.
pub type SharedSettings = Arc<RwLock<Settings>>;

/// User settings persisted under the settings key.
///
/// Every field is a plain string. Missing fields in stored data fall back to
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: String,
    pub api_key: String,
    /// Base URL of an OpenAI-compatible API. Empty means the public endpoint.
    pub api_endpoint: String,
    pub model: String,
    pub theme: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: String::new(),
            api_key: String::new(),
            api_endpoint: String::new(),
            model: DEFAULT_MODEL.to_string(),
            theme: DEFAULT_THEME.to_string(),
        }
    }
}

impl Settings {
    /// Applies the supplied fields of `update`, leaving the rest untouched.
    pub fn apply(&mut self, update: SettingsUpdate) {
        if let Some(provider) = update.provider {
            self.provider = provider;
        }
        if let Some(api_key) = update.api_key {
            self.api_key = api_key;
        }
        if let Some(api_endpoint) = update.api_endpoint {
            self.api_endpoint = api_endpoint;
        }
        if let Some(model) = update.model {
            self.model = model;
        }
        if let Some(theme) = update.theme {
            self.theme = theme;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Copy safe to print or log.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.has_api_key() {
            copy.api_key = mask_secret(&self.api_key);
        }
        copy
    }
}

/// Partial settings update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.provider.is_none()
            && self.api_key.is_none()
            && self.api_endpoint.is_none()
            && self.model.is_none()
            && self.theme.is_none()
    }
}

fn mask_secret(secret: &str) -> String {
    let tail: Vec<char> = secret.chars().rev().take(4).collect();
    let visible: String = tail.into_iter().rev().collect();
    format!("****{visible}")
}
