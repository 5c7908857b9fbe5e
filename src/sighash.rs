use bitcoin::consensus::encode::serialize;
use bitcoin::hashes::{Hash, sha256d};
use bitcoin::{Amount, Script, Transaction};

use crate::error::BridgeError;

pub const SIGHASH_ALL: u32 = 0x01;
pub const SIGHASH_NONE: u32 = 0x02;
pub const SIGHASH_SINGLE: u32 = 0x03;
pub const SIGHASH_FORKID: u32 = 0x40;
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;
pub const SIGHASH_ALL_FORKID: u32 = SIGHASH_ALL | SIGHASH_FORKID;

pub(crate) fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

fn double_sha(data: &[u8]) -> [u8; 32] {
    sha256d::Hash::hash(data).to_byte_array()
}

/// BIP143-layout digest with the FORKID flag that an input's signature commits to. `script_code` is the previous output's locking
/// script and `value` its amount.
pub fn forkid_signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    value: Amount,
    sighash_type: u32,
) -> Result<[u8; 32], BridgeError> {
    let input = tx.input.get(input_index).ok_or_else(|| {
        BridgeError::signing(
            input_index,
            format!("transaction has only {} inputs", tx.input.len()),
        )
    })?;
    if sighash_type & SIGHASH_FORKID == 0 {
        return Err(BridgeError::signing(
            input_index,
            format!("sighash type {sighash_type:#04x} lacks the FORKID flag"),
        ));
    }

    let base = sighash_type & 0x1f;
    let anyone_can_pay = sighash_type & SIGHASH_ANYONECANPAY != 0;

    let hash_prevouts = if anyone_can_pay {
        [0u8; 32]
    } else {
        let mut buf = Vec::with_capacity(tx.input.len() * 36);
        for txin in &tx.input {
            buf.extend_from_slice(&serialize(&txin.previous_output));
        }
        double_sha(&buf)
    };

    let hash_sequence = if anyone_can_pay || base == SIGHASH_SINGLE || base == SIGHASH_NONE {
        [0u8; 32]
    } else {
        let mut buf = Vec::with_capacity(tx.input.len() * 4);
        for txin in &tx.input {
            buf.extend_from_slice(&txin.sequence.0.to_le_bytes());
        }
        double_sha(&buf)
    };

    let hash_outputs = if base != SIGHASH_SINGLE && base != SIGHASH_NONE {
        let mut buf = Vec::new();
        for txout in &tx.output {
            buf.extend_from_slice(&serialize(txout));
        }
        double_sha(&buf)
    } else if base == SIGHASH_SINGLE && input_index < tx.output.len() {
        double_sha(&serialize(&tx.output[input_index]))
    } else {
        [0u8; 32]
    };

    let script_bytes = script_code.as_bytes();
    let mut preimage = Vec::with_capacity(156 + script_bytes.len());
    preimage.extend_from_slice(&tx.version.0.to_le_bytes());
    preimage.extend_from_slice(&hash_prevouts);
    preimage.extend_from_slice(&hash_sequence);
    preimage.extend_from_slice(&serialize(&input.previous_output));
    write_compact_size(&mut preimage, script_bytes.len() as u64);
    preimage.extend_from_slice(script_bytes);
    preimage.extend_from_slice(&value.to_sat().to_le_bytes());
    preimage.extend_from_slice(&input.sequence.0.to_le_bytes());
    preimage.extend_from_slice(&hash_outputs);
    preimage.extend_from_slice(&tx.lock_time.to_consensus_u32().to_le_bytes());
    preimage.extend_from_slice(&sighash_type.to_le_bytes());

    Ok(double_sha(&preimage))
}
