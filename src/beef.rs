use bitcoin::consensus::encode::{deserialize_partial, serialize};
use bitcoin::hashes::Hash;
use bitcoin::{Transaction, Txid};

use crate::sighash::write_compact_size;

const ATOMIC_PREFIX: [u8; 4] = [0x01, 0x01, 0x01, 0x01];
const BEEF_V1: [u8; 4] = [0x01, 0x00, 0xbe, 0xef];
const BEEF_V2: [u8; 4] = [0x02, 0x00, 0xbe, 0xef];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BeefError {
    #[error("unexpected end of data at offset {0}")]
    Truncated(usize),
    #[error("unknown BEEF version {0}")]
    Version(String),
    #[error("invalid transaction at offset {0}")]
    Transaction(usize),
    #[error("unknown V2 transaction format {0}")]
    Format(u8),
    #[error("envelope holds no transactions")]
    Empty,
    #[error("subject transaction {0} is not in the envelope")]
    MissingSubject(Txid),
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], BeefError> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.data.len());
        let end = end.ok_or(BeefError::Truncated(self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, BeefError> {
        Ok(self.take(1)?[0])
    }

    fn compact_size(&mut self) -> Result<u64, BeefError> {
        let n = match self.u8()? {
            0xfd => u16::from_le_bytes([self.u8()?, self.u8()?]) as u64,
            0xfe => {
                let b = self.take(4)?;
                u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as u64
            }
            0xff => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(self.take(8)?);
                u64::from_le_bytes(buf)
            }
            n => n as u64,
        };
        Ok(n)
    }

    fn transaction(&mut self) -> Result<Transaction, BeefError> {
        let start = self.pos;
        let (tx, used) = deserialize_partial::<Transaction>(&self.data[start..])
            .map_err(|_| BeefError::Transaction(start))?;
        self.pos += used;
        Ok(tx)
    }

    fn skip_bump(&mut self) -> Result<(), BeefError> {
        self.compact_size()?; // block height
        let tree_height = self.u8()?;
        for _ in 0..tree_height {
            let leaves = self.compact_size()?;
            for _ in 0..leaves {
                self.compact_size()?; // offset
                let flags = self.u8()?;
                if flags & 0x01 == 0 {
                    self.take(32)?;
                }
            }
        }
        Ok(())
    }
}

/// Transactions of a BEEF or atomic BEEF envelope, plus the atomic subject if present.
fn read_envelope(bytes: &[u8]) -> Result<(Option<Txid>, Vec<Transaction>), BeefError> {
    let mut reader = Reader::new(bytes);
    let mut subject = None;
    if bytes.starts_with(&ATOMIC_PREFIX) {
        reader.take(4)?;
        let mut txid = [0u8; 32];
        txid.copy_from_slice(reader.take(32)?);
        subject = Some(Txid::from_byte_array(txid));
    }

    let version: [u8; 4] = reader.take(4)?.try_into().map_err(|_| BeefError::Truncated(reader.pos))?;
    let v2 = match version {
        BEEF_V1 => false,
        BEEF_V2 => true,
        other => return Err(BeefError::Version(hex::encode(other))),
    };

    for _ in 0..reader.compact_size()? {
        reader.skip_bump()?;
    }

    let count = reader.compact_size()?;
    let mut txs = Vec::new();
    for _ in 0..count {
        if v2 {
            match reader.u8()? {
                0 => txs.push(reader.transaction()?),
                1 => {
                    reader.compact_size()?;
                    txs.push(reader.transaction()?);
                }
                // txid only: the wallet already knows this one
                2 => {
                    reader.take(32)?;
                }
                other => return Err(BeefError::Format(other)),
            }
        } else {
            txs.push(reader.transaction()?);
            if reader.u8()? == 1 {
                reader.compact_size()?;
            }
        }
    }
    Ok((subject, txs))
}

/// The transaction an envelope is about: the atomic subject, else the last one listed. Merkle
/// paths are skipped.
pub fn subject_transaction(bytes: &[u8]) -> Result<Transaction, BeefError> {
    let (subject, mut txs) = read_envelope(bytes)?;
    match subject {
        Some(txid) => txs
            .into_iter()
            .find(|tx| tx.compute_txid() == txid)
            .ok_or(BeefError::MissingSubject(txid)),
        None => txs.pop().ok_or(BeefError::Empty),
    }
}

/// V1 envelope of `parents` without merkle paths.
pub fn from_parents(parents: &[Transaction]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&BEEF_V1);
    write_compact_size(&mut out, 0);
    write_compact_size(&mut out, parents.len() as u64);
    for tx in parents {
        out.extend_from_slice(&serialize(tx));
        out.push(0);
    }
    out
}
