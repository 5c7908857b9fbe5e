#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use bitcoin::transaction::Version;
use bitcoin::{Address, Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use httpmock::prelude::*;
use serde_json::json;

use mountaintops_bridge::error::WalletError;
use mountaintops_bridge::keys::derive_address;
use mountaintops_bridge::types::{Network, SignedInput};
use mountaintops_bridge::wallet::{
    CreateActionArgs, CreateActionResult, KeyDerivation, SignableTransaction, Wallet,
};

pub const REFERENCE: &str = "ref-1";

/// In-process wallet holding the bridge key directly and recording every call.
pub struct MockWallet {
    pub secret: SecretKey,
    pub network: Network,
    pub fail_public_key: bool,
    /// 1-based `create_signature` call that fails.
    pub fail_signature_on: Option<usize>,
    pub fail_create: bool,
    pub fail_abort: bool,
    pub finish_without_signable: bool,
    /// Opens the pending action but answers with a transaction the client cannot read.
    pub undecodable_signable: bool,
    /// Places the declared inputs in reverse order.
    pub reverse_inputs: bool,
    /// Leaves the last declared input out of the transaction.
    pub drop_declared_input: bool,
    pub signature_calls: Cell<usize>,
    pub create_calls: RefCell<Vec<CreateActionArgs>>,
    pub pending: RefCell<Option<Transaction>>,
    pub sign_calls: RefCell<Vec<(String, BTreeMap<u32, SignedInput>)>>,
    pub abort_calls: RefCell<Vec<String>>,
}

impl MockWallet {
    pub fn new(network: Network) -> Self {
        Self::with_secret(SecretKey::from_slice(&[0x11; 32]).unwrap(), network)
    }

    pub fn with_secret(secret: SecretKey, network: Network) -> Self {
        Self {
            secret,
            network,
            fail_public_key: false,
            fail_signature_on: None,
            fail_create: false,
            fail_abort: false,
            finish_without_signable: false,
            undecodable_signable: false,
            reverse_inputs: false,
            drop_declared_input: false,
            signature_calls: Cell::new(0),
            create_calls: RefCell::new(Vec::new()),
            pending: RefCell::new(None),
            sign_calls: RefCell::new(Vec::new()),
            abort_calls: RefCell::new(Vec::new()),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.secret.public_key(&Secp256k1::new())
    }

    pub fn address(&self) -> Address {
        derive_address(self, self.network).unwrap()
    }

    fn rejected(method: &str) -> WalletError {
        WalletError::Rejected {
            method: method.to_string(),
            code: Some("ERR_TEST".into()),
            description: format!("{method} refused"),
        }
    }
}

impl Wallet for MockWallet {
    fn get_network(&self) -> Result<Network, WalletError> {
        Ok(self.network)
    }

    fn get_public_key(&self, _key: &KeyDerivation) -> Result<PublicKey, WalletError> {
        if self.fail_public_key {
            return Err(Self::rejected("getPublicKey"));
        }
        Ok(self.public_key())
    }

    fn create_signature(&self, _key: &KeyDerivation, digest: &[u8; 32]) -> Result<Vec<u8>, WalletError> {
        let call = self.signature_calls.get() + 1;
        self.signature_calls.set(call);
        if self.fail_signature_on == Some(call) {
            return Err(Self::rejected("createSignature"));
        }
        let sig = Secp256k1::new().sign_ecdsa(&Message::from_digest(*digest), &self.secret);
        Ok(sig.serialize_der().to_vec())
    }

    fn create_action(&self, args: &CreateActionArgs) -> Result<CreateActionResult, WalletError> {
        self.create_calls.borrow_mut().push(args.clone());
        if self.fail_create {
            return Err(Self::rejected("createAction"));
        }
        if args.inputs.is_empty() && (!args.outputs.is_empty() || self.finish_without_signable) {
            return Ok(CreateActionResult {
                txid: Some(Txid::from_byte_array([0x42; 32])),
                signable_transaction: None,
            });
        }

        if self.undecodable_signable {
            return Err(WalletError::UndecodableSignable {
                reference: REFERENCE.to_string(),
                reason: "signable transaction: unexpected end of data at offset 0".into(),
            });
        }

        let mut input: Vec<TxIn> = args.inputs.iter().map(|i| txin(i.outpoint)).collect();
        if self.drop_declared_input {
            input.pop();
        }
        if self.reverse_inputs {
            input.reverse();
        }
        // the wallet's own funding input goes after the caller's
        input.push(txin(OutPoint::new(Txid::from_byte_array([0x99; 32]), 7)));
        let tx = Transaction {
            version: Version(1),
            lock_time: LockTime::ZERO,
            input,
            output: vec![TxOut {
                value: Amount::from_sat(1_000),
                script_pubkey: ScriptBuf::from_bytes(vec![0x51]),
            }],
        };
        *self.pending.borrow_mut() = Some(tx.clone());
        Ok(CreateActionResult {
            txid: None,
            signable_transaction: Some(SignableTransaction {
                reference: REFERENCE.to_string(),
                tx,
            }),
        })
    }

    fn sign_action(
        &self,
        reference: &str,
        spends: &BTreeMap<u32, SignedInput>,
    ) -> Result<Option<Txid>, WalletError> {
        self.sign_calls
            .borrow_mut()
            .push((reference.to_string(), spends.clone()));
        let mut tx = self
            .pending
            .borrow()
            .clone()
            .ok_or_else(|| Self::rejected("signAction"))?;
        for (index, spend) in spends {
            tx.input[*index as usize].script_sig = spend.unlocking_script.clone();
        }
        Ok(Some(tx.compute_txid()))
    }

    fn abort_action(&self, reference: &str) -> Result<(), WalletError> {
        self.abort_calls.borrow_mut().push(reference.to_string());
        if self.fail_abort {
            return Err(Self::rejected("abortAction"));
        }
        Ok(())
    }
}

pub fn txin(previous_output: OutPoint) -> TxIn {
    TxIn {
        previous_output,
        script_sig: ScriptBuf::new(),
        sequence: Sequence::MAX,
        witness: Witness::new(),
    }
}

/// A confirmed-looking parent paying `values` to `script`, made unique by `seed`.
pub fn parent_tx(seed: u8, script: &ScriptBuf, values: &[u64]) -> Transaction {
    Transaction {
        version: Version(1),
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            script_sig: ScriptBuf::from_bytes(vec![0x51]),
            ..txin(OutPoint::new(Txid::from_byte_array([seed; 32]), 0))
        }],
        output: values
            .iter()
            .map(|v| TxOut {
                value: Amount::from_sat(*v),
                script_pubkey: script.clone(),
            })
            .collect(),
    }
}

/// Serves `/unspent` for `address` listing every output of `parents`, plus each parent's hex.
pub fn serve_utxos(server: &MockServer, address: &Address, network: Network, parents: &[Transaction]) {
    let segment = network.explorer_segment();
    let mut entries = Vec::new();
    for parent in parents {
        let txid = parent.compute_txid();
        for (pos, out) in parent.output.iter().enumerate() {
            entries.push(json!({
                "height": 800000,
                "tx_pos": pos,
                "tx_hash": txid.to_string(),
                "value": out.value.to_sat()
            }));
        }
        let hex_tx = bitcoin::consensus::encode::serialize_hex(parent);
        server.mock(|when, then| {
            when.method(GET).path(format!("/{segment}/tx/{txid}/hex"));
            then.status(200).body(hex_tx);
        });
    }
    server.mock(|when, then| {
        when.method(GET).path(format!("/{segment}/address/{address}/unspent"));
        then.status(200).json_body(serde_json::Value::Array(entries));
    });
}

pub fn serve_balance(server: &MockServer, address: &Address, network: Network, confirmed: i64, unconfirmed: i64) {
    let segment = network.explorer_segment();
    server.mock(|when, then| {
        when.method(GET).path(format!("/{segment}/address/{address}/balance"));
        then.status(200)
            .json_body(json!({ "confirmed": confirmed, "unconfirmed": unconfirmed }));
    });
}
