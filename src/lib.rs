pub mod beef;
pub mod bridge;
pub mod config;
pub mod error;
pub mod explorer;
pub mod import;
pub mod keys;
pub mod send;
pub mod sighash;
pub mod types;
pub mod unlock;
pub mod wallet;
pub mod wallet_client;

pub use bridge::Bridge;
pub use error::BridgeError;
pub use types::Network;
pub use wallet::{BRIDGE_KEY, Wallet};
