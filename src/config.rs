use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::BridgeError;

pub const DEFAULT_WALLET_URL: &str = "http://localhost:3321";
pub const DEFAULT_EXPLORER_URL: &str = "https://api.whatsonchain.com/v1/bsv";
pub const DEFAULT_ORIGINATOR: &str = "mountaintops.local";

/// Endpoints for the wallet and the block explorer. The network is never configured here;
/// it always comes from the wallet.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    pub wallet_url: String,
    pub explorer_url: String,
    pub originator: String,
    pub request_timeout_secs: Option<u64>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            wallet_url: DEFAULT_WALLET_URL.to_string(),
            explorer_url: DEFAULT_EXPLORER_URL.to_string(),
            originator: DEFAULT_ORIGINATOR.to_string(),
            request_timeout_secs: None,
        }
    }
}

impl BridgeConfig {
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let content = fs::read_to_string(path).map_err(|e| {
            log::error!("failed to read config file {:?}", path);
            BridgeError::Io(e)
        })?;
        serde_json::from_str(&content).map_err(|e| BridgeError::ConfigParse {
            file_path: path.to_path_buf(),
            source: e,
        })
    }

    /// `None` leaves requests without a deadline.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
