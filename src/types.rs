use std::fmt;

use bitcoin::{Amount, OutPoint, ScriptBuf, Txid};
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

pub const SATS_PER_BSV: u64 = 100_000_000;

/// Network reported by the wallet.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// Path segment the block explorer uses for this network.
    pub fn explorer_segment(self) -> &'static str {
        match self {
            Network::Mainnet => "main",
            Network::Testnet => "test",
        }
    }

    /// Legacy P2PKH versions match Bitcoin's, so address handling reuses them.
    pub fn address_network(self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => f.write_str("mainnet"),
            Network::Testnet => f.write_str("testnet"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScriptType {
    P2PKH,
}

impl ScriptType {
    pub fn from_script_buf(script: &ScriptBuf, input_index: usize) -> Result<Self, BridgeError> {
        if script.is_p2pkh() {
            Ok(ScriptType::P2PKH)
        } else {
            Err(BridgeError::signing(
                input_index,
                format!("unrecognized previous output script {}", script.to_hex_string()),
            ))
        }
    }
}

/// A spendable output of the bridge address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub transaction_id: Txid,
    pub output_index: u32,
    pub value: Option<u64>,
    pub height: Option<u64>,
}

impl UnspentOutput {
    pub fn out_point(&self) -> OutPoint {
        OutPoint::new(self.transaction_id, self.output_index)
    }
}

/// Explorer balance in satoshis. `unconfirmed` goes negative while a spend sits in the mempool.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Balance {
    pub confirmed: i64,
    pub unconfirmed: i64,
}

impl Balance {
    /// `None` when the two figures do not add up within `i64`.
    pub fn checked_total(&self) -> Option<i64> {
        self.confirmed.checked_add(self.unconfirmed)
    }

    pub fn total_sats(&self) -> i64 {
        self.confirmed.saturating_add(self.unconfirmed)
    }

    pub fn to_bsv(&self) -> f64 {
        self.total_sats() as f64 / SATS_PER_BSV as f64
    }

    pub fn is_empty(&self) -> bool {
        self.total_sats() <= 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInput {
    pub input_index: u32,
    pub unlocking_script: ScriptBuf,
}

/// Local history entry for a completed send.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub txid: Txid,
    pub recipient: String,
    pub amount: Amount,
}
