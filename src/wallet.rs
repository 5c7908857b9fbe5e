use std::collections::BTreeMap;

use bitcoin::secp256k1::PublicKey;
use bitcoin::{OutPoint, ScriptBuf, Transaction, Txid};

use crate::error::WalletError;
use crate::types::{Network, SignedInput};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Counterparty {
    /// The well-known "anyone" key (private key 1). Keys derived against it are public by construction.
    Anyone,
    /// The wallet's own identity key.
    Myself,
}

impl Counterparty {
    pub fn as_str(self) -> &'static str {
        match self {
            Counterparty::Anyone => "anyone",
            Counterparty::Myself => "self",
        }
    }
}

/// A protocol/key pair the wallet derives child keys from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KeyDerivation {
    pub security_level: u8,
    pub protocol: &'static str,
    pub key_id: &'static str,
    pub counterparty: Counterparty,
}

/// The one key the bridge recognizes. Every wallet maps it to exactly one public address.
pub const BRIDGE_KEY: KeyDerivation = KeyDerivation {
    security_level: 1,
    protocol: "mountaintops",
    key_id: "1",
    counterparty: Counterparty::Anyone,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionInput {
    pub outpoint: OutPoint,
    pub unlocking_script_length: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutput {
    pub locking_script: ScriptBuf,
    pub satoshis: u64,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateActionArgs {
    pub description: String,
    /// BEEF carrying the source transactions of `inputs`.
    pub input_beef: Option<Vec<u8>>,
    pub inputs: Vec<ActionInput>,
    pub outputs: Vec<ActionOutput>,
}

/// A pending action: the wallet built `tx` and waits for unlocking scripts under `reference`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignableTransaction {
    pub reference: String,
    pub tx: Transaction,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateActionResult {
    pub txid: Option<Txid>,
    pub signable_transaction: Option<SignableTransaction>,
}

/// Operations the bridge consumes from a wallet. Calls block until the wallet answers.
pub trait Wallet {
    fn get_network(&self) -> Result<Network, WalletError>;

    fn get_public_key(&self, key: &KeyDerivation) -> Result<PublicKey, WalletError>;

    /// Signs a 32-byte digest as-is and returns the DER encoded signature.
    fn create_signature(&self, key: &KeyDerivation, digest: &[u8; 32]) -> Result<Vec<u8>, WalletError>;

    fn create_action(&self, args: &CreateActionArgs) -> Result<CreateActionResult, WalletError>;

    fn sign_action(
        &self,
        reference: &str,
        spends: &BTreeMap<u32, SignedInput>,
    ) -> Result<Option<Txid>, WalletError>;

    fn abort_action(&self, reference: &str) -> Result<(), WalletError>;
}

impl<W: Wallet + ?Sized> Wallet for &W {
    fn get_network(&self) -> Result<Network, WalletError> {
        (**self).get_network()
    }

    fn get_public_key(&self, key: &KeyDerivation) -> Result<PublicKey, WalletError> {
        (**self).get_public_key(key)
    }

    fn create_signature(&self, key: &KeyDerivation, digest: &[u8; 32]) -> Result<Vec<u8>, WalletError> {
        (**self).create_signature(key, digest)
    }

    fn create_action(&self, args: &CreateActionArgs) -> Result<CreateActionResult, WalletError> {
        (**self).create_action(args)
    }

    fn sign_action(
        &self,
        reference: &str,
        spends: &BTreeMap<u32, SignedInput>,
    ) -> Result<Option<Txid>, WalletError> {
        (**self).sign_action(reference, spends)
    }

    fn abort_action(&self, reference: &str) -> Result<(), WalletError> {
        (**self).abort_action(reference)
    }
}
