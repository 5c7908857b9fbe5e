use std::str::FromStr;

use bitcoin::address::{AddressType, NetworkUnchecked};
use bitcoin::{Address, Amount, Txid};

use crate::error::{BridgeError, WalletError};
use crate::types::{Network, SATS_PER_BSV};
use crate::wallet::{ActionOutput, CreateActionArgs, Wallet};

const SEND_DESCRIPTION: &str = "Send BSV to a legacy address";
const OUTPUT_DESCRIPTION: &str = "Payment to legacy address";
const MAINNET_PREFIX: char = '1';

/// Rounds a BSV figure to whole satoshis. Anything that does not come out positive is refused.
pub fn bsv_to_sats(amount_bsv: f64) -> Result<Amount, BridgeError> {
    if !amount_bsv.is_finite() || amount_bsv <= 0.0 {
        return Err(BridgeError::Validation(format!(
            "amount must be a positive number of BSV, got {amount_bsv}"
        )));
    }
    let sats = (amount_bsv * SATS_PER_BSV as f64).round();
    if sats < 1.0 || sats > Amount::MAX_MONEY.to_sat() as f64 {
        return Err(BridgeError::Validation(format!(
            "amount {amount_bsv} BSV is outside the payable range"
        )));
    }
    Ok(Amount::from_sat(sats as u64))
}

/// Checks `to` is a P2PKH address of `network` and returns it.
pub fn parse_recipient(to: &str, network: Network) -> Result<Address, BridgeError> {
    let to = to.trim();
    if network == Network::Mainnet && !to.starts_with(MAINNET_PREFIX) {
        return Err(BridgeError::Validation(format!(
            "{to} is not a mainnet legacy address (expected prefix '{MAINNET_PREFIX}')"
        )));
    }
    let unchecked = Address::<NetworkUnchecked>::from_str(to)
        .map_err(|e| BridgeError::Validation(format!("invalid address {to}: {e}")))?;
    let address = unchecked
        .require_network(network.address_network())
        .map_err(|_| BridgeError::Validation(format!("{to} does not belong to {network}")))?;
    if address.address_type() != Some(AddressType::P2pkh) {
        return Err(BridgeError::Validation(format!(
            "{to} is not a legacy pay-to-public-key-hash address"
        )));
    }
    Ok(address)
}

pub struct Sender<'a, W: Wallet + ?Sized> {
    wallet: &'a W,
    network: Network,
}

impl<'a, W: Wallet + ?Sized> Sender<'a, W> {
    pub fn new(wallet: &'a W, network: Network) -> Self {
        Self { wallet, network }
    }

    /// Pays `amount_bsv` to `to` from the wallet. Nothing reaches the wallet unless validation passes.
    pub fn send(&self, to: &str, amount_bsv: f64) -> Result<(Txid, Amount), BridgeError> {
        let amount = bsv_to_sats(amount_bsv)?;
        let recipient = parse_recipient(to, self.network)?;
        log::info!("sending {} to {} on {}", amount, recipient, self.network);

        let args = CreateActionArgs {
            description: SEND_DESCRIPTION.to_string(),
            input_beef: None,
            inputs: Vec::new(),
            outputs: vec![ActionOutput {
                locking_script: recipient.script_pubkey(),
                satoshis: amount.to_sat(),
                description: OUTPUT_DESCRIPTION.to_string(),
            }],
        };
        let created = self.wallet.create_action(&args).map_err(|e| {
            log::error!("send to {} failed: {}", recipient, e);
            BridgeError::WalletAction(e)
        })?;
        let txid = created.txid.ok_or_else(|| {
            BridgeError::WalletAction(WalletError::Decode {
                method: "createAction".into(),
                reason: "no txid returned for the payment".into(),
            })
        })?;
        log::info!("payment broadcast as {}", txid);
        Ok((txid, amount))
    }
}
