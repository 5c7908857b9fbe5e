use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to the block explorer.
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse: {0}")]
    Url(#[from] url::ParseError),

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("unexpected payload from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
}

/// Failures talking to the wallet.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse: {0}")]
    Url(#[from] url::ParseError),

    #[error("wallet rejected {method} ({}): {description}", .code.as_deref().unwrap_or("no code"))]
    Rejected {
        method: String,
        code: Option<String>,
        description: String,
    },

    #[error("could not decode {method} response: {reason}")]
    Decode { method: String, reason: String },

    /// The wallet opened a pending action but its response could not be used.
    #[error("could not decode createAction response for pending action {reference}: {reason}")]
    UndecodableSignable { reference: String, reason: String },
}

impl WalletError {
    /// Reference of a pending action the wallet opened before this error, if any.
    pub fn pending_reference(&self) -> Option<&str> {
        match self {
            WalletError::UndecodableSignable { reference, .. } => Some(reference),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error in {file_path:?}: {source}")]
    ConfigParse {
        file_path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("network query failed: {0}")]
    NetworkQuery(#[from] ExplorerError),

    #[error("signing failed for input {input_index}: {reason}")]
    Signing { input_index: usize, reason: String },

    #[error("wallet action failed: {0}")]
    WalletAction(#[from] WalletError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{source}; aborting pending action {reference} also failed: {abort}")]
    AbortFailed {
        #[source]
        source: Box<BridgeError>,
        reference: String,
        abort: WalletError,
    },
}

impl BridgeError {
    pub(crate) fn signing(input_index: usize, reason: impl Into<String>) -> Self {
        BridgeError::Signing {
            input_index,
            reason: reason.into(),
        }
    }
}
