use bitcoin::{Address, Txid};

use crate::error::BridgeError;
use crate::explorer::Explorer;
use crate::import::{ImportOutcome, Importer};
use crate::keys::derive_address;
use crate::send::Sender;
use crate::types::{Balance, Network, TransactionRecord};
use crate::wallet::Wallet;

/// A user session: one wallet connection, one explorer, and what has been observed so far.
pub struct Bridge<W: Wallet> {
    wallet: W,
    explorer: Explorer,
    network: Network,
    address: Option<Address>,
    balance: Option<Balance>,
    history: Vec<TransactionRecord>,
}

impl<W: Wallet> Bridge<W> {
    /// Asks the wallet which network it is on; everything else follows from that.
    pub fn connect(wallet: W, explorer: Explorer) -> Result<Self, BridgeError> {
        let network = wallet.get_network()?;
        log::info!("wallet is on {}", network);
        Ok(Self {
            wallet,
            explorer,
            network,
            address: None,
            balance: None,
            history: Vec::new(),
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub fn balance(&self) -> Option<Balance> {
        self.balance
    }

    pub fn history(&self) -> &[TransactionRecord] {
        &self.history
    }

    /// Derives the bridge address afresh.
    pub fn address(&mut self) -> Result<Address, BridgeError> {
        let address = derive_address(&self.wallet, self.network)?;
        self.address = Some(address.clone());
        Ok(address)
    }

    pub fn refresh_balance(&mut self) -> Result<Balance, BridgeError> {
        let address = match self.address.clone() {
            Some(address) => address,
            None => self.address()?,
        };
        let balance = self.explorer.balance(&address, self.network)?;
        self.balance = Some(balance);
        Ok(balance)
    }

    /// Moves everything at the bridge address into the wallet. Needs a derived address and a
    /// non-zero observed balance.
    pub fn import(&mut self) -> Result<ImportOutcome, BridgeError> {
        let address = self
            .address
            .clone()
            .ok_or_else(|| BridgeError::Validation("derive the bridge address before importing".into()))?;
        match self.balance {
            Some(balance) if !balance.is_empty() => {}
            _ => {
                return Err(BridgeError::Validation(format!(
                    "no funds observed at {address}; refresh the balance first"
                )));
            }
        }

        let outcome = Importer::new(&self.wallet, &self.explorer, self.network).run(&address)?;
        self.balance = Some(Balance::default());
        Ok(outcome)
    }

    pub fn send(&mut self, to: &str, amount_bsv: f64) -> Result<Txid, BridgeError> {
        let (txid, amount) = Sender::new(&self.wallet, self.network).send(to, amount_bsv)?;
        self.history.push(TransactionRecord {
            txid,
            recipient: to.trim().to_string(),
            amount,
        });
        Ok(txid)
    }
}
