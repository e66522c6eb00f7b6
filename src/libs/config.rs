//! Chat configuration.
//!
//! Values come from built-in defaults, then the `app_settings` table, then
//! environment variables, each layer overriding the previous one.

use crate::libs::core::ids::UserId;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_VIP_IDS: [&str; 9] = [
    "00191520", "20202020", "00192621", "00193722", "59200311", "60059500", "52044379",
    "20529519", "50522654",
];

const SETTING_RENDER_DELAY_MS: &str = "render_delay_ms";
const SETTING_MAX_IMAGE_BYTES: &str = "max_image_bytes";

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// SQLite file holding users, groups and messages.
    /// Env: `CHAT_DATABASE_PATH`
    /// Default: `./chat.db`
    pub database_path: String,

    /// Members allowed into the chat.
    /// Env: `CHAT_VIP_IDS` (comma separated)
    pub vip_ids: Vec<UserId>,

    /// How long a listener update waits before it is rendered.
    /// Env: `CHAT_RENDER_DELAY_MS`
    /// Default: 100 ms
    pub render_delay: Duration,

    /// Largest accepted image upload.
    /// Env: `CHAT_MAX_IMAGE_BYTES`
    /// Default: 5 MiB
    pub max_image_bytes: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            database_path: "./chat.db".to_string(),
            vip_ids: DEFAULT_VIP_IDS.iter().map(|id| UserId::from(*id)).collect(),
            render_delay: Duration::from_millis(100),
            max_image_bytes: 5 * 1024 * 1024,
        }
    }
}

impl ChatConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Defaults, overridden by stored settings, overridden by the environment.
    pub fn load(settings: &HashMap<String, String>) -> Self {
        let mut config = Self::default();
        config.apply_settings(settings);
        config.apply_env();
        config
    }

    pub fn is_vip(&self, user_id: &UserId) -> bool {
        self.vip_ids.contains(user_id)
    }

    pub fn apply_settings(&mut self, settings: &HashMap<String, String>) {
        if let Some(value) = settings.get(SETTING_RENDER_DELAY_MS) {
            match value.parse::<u64>() {
                Ok(ms) => self.render_delay = Duration::from_millis(ms),
                Err(_) => tracing::warn!(value = %value, "invalid render_delay_ms setting, ignored"),
            }
        }

        if let Some(value) = settings.get(SETTING_MAX_IMAGE_BYTES) {
            match value.parse::<u64>() {
                Ok(bytes) => self.max_image_bytes = bytes,
                Err(_) => tracing::warn!(value = %value, "invalid max_image_bytes setting, ignored"),
            }
        }
    }

    fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("CHAT_DATABASE_PATH") {
            if !path.is_empty() {
                self.database_path = path;
            }
        }

        if let Ok(ids) = std::env::var("CHAT_VIP_IDS") {
            let parsed = parse_id_list(&ids);
            if parsed.is_empty() {
                tracing::warn!(value = %ids, "CHAT_VIP_IDS holds no ids, using default");
            } else {
                self.vip_ids = parsed;
            }
        }

        if let Ok(value) = std::env::var("CHAT_RENDER_DELAY_MS") {
            match value.parse::<u64>() {
                Ok(ms) => self.render_delay = Duration::from_millis(ms),
                Err(_) => tracing::warn!(value = %value, "invalid CHAT_RENDER_DELAY_MS, using default"),
            }
        }

        if let Ok(value) = std::env::var("CHAT_MAX_IMAGE_BYTES") {
            match value.parse::<u64>() {
                Ok(bytes) => self.max_image_bytes = bytes,
                Err(_) => tracing::warn!(value = %value, "invalid CHAT_MAX_IMAGE_BYTES, using default"),
            }
        }
    }
}

fn parse_id_list(raw: &str) -> Vec<UserId> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(UserId::from)
        .collect()
}
