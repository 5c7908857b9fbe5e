use std::collections::{BTreeMap, HashMap};

use bitcoin::{Address, Transaction, TxOut, Txid};

use crate::beef;
use crate::error::{BridgeError, ExplorerError, WalletError};
use crate::explorer::Explorer;
use crate::types::{Network, SignedInput, UnspentOutput};
use crate::unlock::{P2pkhUnlocker, UnlockingTemplate};
use crate::wallet::{ActionInput, CreateActionArgs, SignableTransaction, Wallet};

const IMPORT_DESCRIPTION: &str = "Import funds from the mountaintops bridge";
const INPUT_DESCRIPTION: &str = "Bridge address output";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportState {
    Idle,
    FetchingUtxos,
    RequestingPendingAction,
    Signing { input: usize, of: usize },
    Submitting,
    Done,
    Aborting,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub txid: Option<Txid>,
    pub signed_inputs: usize,
}

/// One import attempt: spends every UTXO of the bridge address into the wallet.
pub struct Importer<'a, W: Wallet + ?Sized> {
    wallet: &'a W,
    explorer: &'a Explorer,
    network: Network,
    state: ImportState,
}

impl<'a, W: Wallet + ?Sized> Importer<'a, W> {
    pub fn new(wallet: &'a W, explorer: &'a Explorer, network: Network) -> Self {
        Self {
            wallet,
            explorer,
            network,
            state: ImportState::Idle,
        }
    }

    pub fn state(&self) -> &ImportState {
        &self.state
    }

    fn enter(&mut self, state: ImportState) {
        log::debug!("import: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Runs the import with the bridge P2PKH template.
    pub fn run(&mut self, address: &Address) -> Result<ImportOutcome, BridgeError> {
        let wallet = self.wallet;
        self.run_with(address, &P2pkhUnlocker::bridge(wallet))
    }

    /// Runs the import with `template`. Declared inputs are signed in ascending order of their
    /// index in the wallet's transaction; a failure after the wallet issued a reference aborts
    /// that pending action exactly once.
    pub fn run_with<T: UnlockingTemplate + ?Sized>(
        &mut self,
        address: &Address,
        template: &T,
    ) -> Result<ImportOutcome, BridgeError> {
        log::info!("importing funds from {} on {}", address, self.network);

        self.enter(ImportState::FetchingUtxos);
        let (utxos, prevouts, parents) = match self.fetch(address) {
            Ok(fetched) => fetched,
            Err(e) => {
                self.enter(ImportState::Failed);
                return Err(e);
            }
        };

        self.enter(ImportState::RequestingPendingAction);
        let args = CreateActionArgs {
            description: IMPORT_DESCRIPTION.to_string(),
            input_beef: (!parents.is_empty()).then(|| beef::from_parents(&parents)),
            inputs: utxos
                .iter()
                .map(|utxo| ActionInput {
                    outpoint: utxo.out_point(),
                    unlocking_script_length: template.estimated_length(),
                    description: INPUT_DESCRIPTION.to_string(),
                })
                .collect(),
            outputs: Vec::new(),
        };
        let created = match self.wallet.create_action(&args) {
            Ok(created) => created,
            Err(e) => {
                if let Some(reference) = e.pending_reference().map(str::to_string) {
                    return Err(self.abort(reference, e.into()));
                }
                log::error!("wallet refused to create the import action: {}", e);
                self.enter(ImportState::Failed);
                return Err(e.into());
            }
        };

        let Some(signable) = created.signable_transaction else {
            return match created.txid {
                // nothing to sign, the wallet finished the action itself
                Some(txid) if utxos.is_empty() => {
                    self.enter(ImportState::Done);
                    Ok(ImportOutcome {
                        txid: Some(txid),
                        signed_inputs: 0,
                    })
                }
                _ => {
                    self.enter(ImportState::Failed);
                    Err(BridgeError::WalletAction(WalletError::Decode {
                        method: "createAction".into(),
                        reason: "no signable transaction returned for the import".into(),
                    }))
                }
            };
        };

        let reference = signable.reference.clone();
        match self.sign_and_submit(&signable, &utxos, &prevouts, template) {
            Ok(outcome) => {
                self.enter(ImportState::Done);
                log::info!(
                    "import finished, {} inputs signed, txid {:?}",
                    outcome.signed_inputs,
                    outcome.txid
                );
                Ok(outcome)
            }
            Err(original) => Err(self.abort(reference, original)),
        }
    }

    /// Aborts the pending action once and hands back the error to report.
    fn abort(&mut self, reference: String, original: BridgeError) -> BridgeError {
        self.enter(ImportState::Aborting);
        log::warn!("import failed ({}), aborting pending action {}", original, reference);
        let err = match self.wallet.abort_action(&reference) {
            Ok(()) => original,
            Err(abort) => {
                log::error!("abort of pending action {} failed: {}", reference, abort);
                BridgeError::AbortFailed {
                    source: Box::new(original),
                    reference,
                    abort,
                }
            }
        };
        self.enter(ImportState::Failed);
        err
    }

    #[allow(clippy::type_complexity)]
    fn fetch(
        &self,
        address: &Address,
    ) -> Result<(Vec<UnspentOutput>, Vec<TxOut>, Vec<Transaction>), BridgeError> {
        let utxos = self.explorer.unspent(address, self.network)?;
        log::info!("{} unspent outputs at {}", utxos.len(), address);

        let mut parents: Vec<Transaction> = Vec::new();
        let mut by_txid: HashMap<Txid, usize> = HashMap::new();
        let mut prevouts = Vec::with_capacity(utxos.len());
        for utxo in &utxos {
            let slot = match by_txid.get(&utxo.transaction_id) {
                Some(slot) => *slot,
                None => {
                    let tx = self.explorer.raw_transaction(&utxo.transaction_id, self.network)?;
                    parents.push(tx);
                    by_txid.insert(utxo.transaction_id, parents.len() - 1);
                    parents.len() - 1
                }
            };
            let prevout = parents[slot]
                .output
                .get(utxo.output_index as usize)
                .cloned()
                .ok_or_else(|| {
                    BridgeError::NetworkQuery(ExplorerError::Decode {
                        endpoint: format!("tx/{}/hex", utxo.transaction_id),
                        reason: format!("no output {}", utxo.output_index),
                    })
                })?;
            prevouts.push(prevout);
        }
        Ok((utxos, prevouts, parents))
    }

    fn sign_and_submit<T: UnlockingTemplate + ?Sized>(
        &mut self,
        signable: &SignableTransaction,
        utxos: &[UnspentOutput],
        prevouts: &[TxOut],
        template: &T,
    ) -> Result<ImportOutcome, BridgeError> {
        let tx = &signable.tx;
        let declared = utxos.len();

        // transaction input index -> previous output, for every declared outpoint
        let mut located: BTreeMap<usize, &TxOut> = BTreeMap::new();
        for (utxo, prevout) in utxos.iter().zip(prevouts) {
            let outpoint = utxo.out_point();
            let input_index = tx
                .input
                .iter()
                .position(|txin| txin.previous_output == outpoint)
                .ok_or_else(|| {
                    BridgeError::Validation(format!("wallet transaction does not spend {outpoint}"))
                })?;
            if located.insert(input_index, prevout).is_some() {
                return Err(BridgeError::Validation(format!(
                    "{outpoint} is declared more than once"
                )));
            }
        }

        let mut spends = BTreeMap::new();
        for (position, (&input_index, prevout)) in located.iter().enumerate() {
            self.enter(ImportState::Signing {
                input: position,
                of: declared,
            });
            let script = template.sign(tx, input_index, prevout)?;
            log::debug!("input {} ({}) signed", input_index, tx.input[input_index].previous_output);

            spends.insert(
                input_index as u32,
                SignedInput {
                    input_index: input_index as u32,
                    unlocking_script: script,
                },
            );
        }

        if spends.len() != declared {
            return Err(BridgeError::Validation(format!(
                "{} signatures for {} declared inputs",
                spends.len(),
                declared
            )));
        }

        self.enter(ImportState::Submitting);
        let txid = self.wallet.sign_action(&signable.reference, &spends)?;
        Ok(ImportOutcome {
            txid,
            signed_inputs: spends.len(),
        })
    }
}
