use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, Instruction, PushBytesBuf};
use bitcoin::secp256k1::{Message, Secp256k1, ecdsa::Signature};
use bitcoin::{PublicKey, ScriptBuf, Transaction, TxOut};

use crate::error::BridgeError;
use crate::sighash::{SIGHASH_ALL_FORKID, SIGHASH_FORKID, forkid_signature_hash};
use crate::types::ScriptType;
use crate::wallet::{BRIDGE_KEY, KeyDerivation, Wallet};

/// Upper bound of a P2PKH unlocking script: 73 byte signature push plus 34 byte key push.
pub const P2PKH_UNLOCKING_SCRIPT_LENGTH: u32 = 108;

/// Produces the unlocking script for one input of a transaction.
pub trait UnlockingTemplate {
    /// `prevout` is the output being spent by `tx.input[input_index]`.
    fn sign(&self, tx: &Transaction, input_index: usize, prevout: &TxOut) -> Result<ScriptBuf, BridgeError>;

    fn estimated_length(&self) -> u32;
}

/// Unlocks P2PKH outputs of a wallet-derived key, signing through the wallet.
pub struct P2pkhUnlocker<'a, W: Wallet + ?Sized> {
    wallet: &'a W,
    key: KeyDerivation,
    sighash_type: u32,
}

impl<'a, W: Wallet + ?Sized> P2pkhUnlocker<'a, W> {
    /// Signs with the bridge key using SIGHASH_ALL | FORKID.
    pub fn bridge(wallet: &'a W) -> Self {
        Self {
            wallet,
            key: BRIDGE_KEY,
            sighash_type: SIGHASH_ALL_FORKID,
        }
    }
}

impl<W: Wallet + ?Sized> UnlockingTemplate for P2pkhUnlocker<'_, W> {
    fn sign(&self, tx: &Transaction, input_index: usize, prevout: &TxOut) -> Result<ScriptBuf, BridgeError> {
        ScriptType::from_script_buf(&prevout.script_pubkey, input_index)?;

        let public_key = self
            .wallet
            .get_public_key(&self.key)
            .map(PublicKey::new)
            .map_err(|e| BridgeError::signing(input_index, format!("key derivation failed: {e}")))?;

        if !locks_to(&prevout.script_pubkey, &public_key) {
            return Err(BridgeError::signing(
                input_index,
                "previous output is not locked to the bridge key",
            ));
        }

        let digest = forkid_signature_hash(
            tx,
            input_index,
            &prevout.script_pubkey,
            prevout.value,
            self.sighash_type,
        )?;
        log::debug!("input {} digest {}", input_index, hex::encode(digest));

        let der = self
            .wallet
            .create_signature(&self.key, &digest)
            .map_err(|e| BridgeError::signing(input_index, e.to_string()))?;
        Signature::from_der(&der)
            .map_err(|e| BridgeError::signing(input_index, format!("wallet returned a malformed signature: {e}")))?;

        let mut sig_with_type = der;
        sig_with_type.push(self.sighash_type as u8);
        let sig_push = PushBytesBuf::try_from(sig_with_type)
            .map_err(|_| BridgeError::signing(input_index, "signature too long to push"))?;

        let script = Builder::new()
            .push_slice(sig_push)
            .push_key(&public_key)
            .into_script();

        // the wallet signs blind; check its signature before handing the script out
        let mut check = tx.clone();
        check.input[input_index].script_sig = script.clone();
        verify_p2pkh(&check, input_index, prevout)?;
        Ok(script)
    }

    fn estimated_length(&self) -> u32 {
        P2PKH_UNLOCKING_SCRIPT_LENGTH
    }
}

fn locks_to(script: &ScriptBuf, key: &PublicKey) -> bool {
    script.is_p2pkh() && script.as_bytes()[3..23] == key.pubkey_hash().to_byte_array()[..]
}

/// Evaluates `tx.input[input_index].script_sig` against a P2PKH `prevout`.
pub fn verify_p2pkh(tx: &Transaction, input_index: usize, prevout: &TxOut) -> Result<(), BridgeError> {
    let fail = |reason: &str| BridgeError::signing(input_index, reason.to_string());

    let input = tx
        .input
        .get(input_index)
        .ok_or_else(|| fail("input index out of range"))?;
    if !prevout.script_pubkey.is_p2pkh() {
        return Err(fail("previous output is not P2PKH"));
    }

    let mut pushes = Vec::with_capacity(2);
    for instruction in input.script_sig.instructions() {
        match instruction.map_err(|_| fail("unlocking script does not parse"))? {
            Instruction::PushBytes(bytes) => pushes.push(bytes.as_bytes().to_vec()),
            Instruction::Op(_) => return Err(fail("unlocking script contains opcodes")),
        }
    }
    let [sig_with_type, key_bytes] = pushes.as_slice() else {
        return Err(fail("unlocking script must push a signature and a key"));
    };

    let public_key = PublicKey::from_slice(key_bytes).map_err(|_| fail("invalid public key push"))?;
    if !locks_to(&prevout.script_pubkey, &public_key) {
        return Err(fail("public key does not match the locking script"));
    }

    let (sighash_byte, der) = sig_with_type
        .split_last()
        .ok_or_else(|| fail("empty signature push"))?;
    let sighash_type = u32::from(*sighash_byte);
    if sighash_type & SIGHASH_FORKID == 0 {
        return Err(fail("signature lacks the FORKID flag"));
    }
    let signature = Signature::from_der(der).map_err(|_| fail("signature is not DER"))?;

    let digest = forkid_signature_hash(tx, input_index, &prevout.script_pubkey, prevout.value, sighash_type)?;
    Secp256k1::verification_only()
        .verify_ecdsa(&Message::from_digest(digest), &signature, &public_key.inner)
        .map_err(|_| fail("signature does not verify"))
}
