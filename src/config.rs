use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::i18n;
use crate::session::SessionOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Directory of the file-backed key-value store.
    pub data_dir: PathBuf,
    pub capability_timeout_secs: u64,
    pub default_language: String,
    pub honor_stay_signed_in: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let data_dir = std::env::var("GLUCOSCAN_DATA_DIR")
            .unwrap_or_else(|_| ".glucoscan".into())
            .into();
        let capability_timeout_secs = std::env::var("GLUCOSCAN_AI_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);
        let default_language = std::env::var("GLUCOSCAN_DEFAULT_LANG")
            .unwrap_or_else(|_| i18n::DEFAULT_LANGUAGE.into());
        let honor_stay_signed_in = std::env::var("GLUCOSCAN_HONOR_STAY_SIGNED_IN")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            data_dir,
            capability_timeout_secs,
            default_language,
            honor_stay_signed_in,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            honor_stay_signed_in: self.honor_stay_signed_in,
            capability_timeout: Duration::from_secs(self.capability_timeout_secs),
            default_language: self.default_language.clone(),
        }
    }
}
