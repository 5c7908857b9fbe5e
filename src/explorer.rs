use std::str::FromStr;
use std::time::Duration;

use bitcoin::consensus::encode::deserialize;
use bitcoin::{Address, Transaction, Txid};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::ExplorerError;
use crate::types::{Balance, Network, UnspentOutput};

#[derive(Debug, Deserialize)]
struct UnspentEntry {
    tx_hash: String,
    tx_pos: u32,
    #[serde(default)]
    value: Option<u64>,
    #[serde(default)]
    height: Option<u64>,
}

/// Blocking client for a WhatsOnChain-style explorer. Reads
/// `{base}/{main|test}/address/{address}/balance`, `.../unspent` and `{base}/{main|test}/tx/{txid}/hex`.
#[derive(Clone)]
pub struct Explorer {
    base: Url,
    client: Client,
}

impl Explorer {
    /// `base` like "https://api.whatsonchain.com/v1/bsv". `timeout` of `None` waits indefinitely.
    pub fn new(base: &str, timeout: Option<Duration>) -> Result<Self, ExplorerError> {
        // a trailing slash keeps the last path segment when joining
        let base = if base.ends_with('/') {
            Url::parse(base)?
        } else {
            Url::parse(&format!("{base}/"))?
        };
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }

    fn endpoint(&self, network: Network, path: &str) -> Result<Url, ExplorerError> {
        Ok(self.base.join(&format!("{}/{}", network.explorer_segment(), path))?)
    }

    fn get(&self, url: Url) -> Result<Response, ExplorerError> {
        log::debug!("GET {}", url);
        let resp = self.client.get(url.clone()).send()?;
        if !resp.status().is_success() {
            return Err(ExplorerError::Status {
                endpoint: url.path().to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(resp)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ExplorerError> {
        let endpoint = url.path().to_string();
        let body = self.get(url)?.text()?;
        serde_json::from_str(&body).map_err(|e| ExplorerError::Decode {
            endpoint,
            reason: e.to_string(),
        })
    }

    pub fn balance(&self, address: &Address, network: Network) -> Result<Balance, ExplorerError> {
        let url = self.endpoint(network, &format!("address/{address}/balance"))?;
        let endpoint = url.path().to_string();
        let balance: Balance = self.get_json(url)?;
        if balance.checked_total().is_none() {
            return Err(ExplorerError::Decode {
                endpoint,
                reason: format!(
                    "confirmed {} and unconfirmed {} overflow",
                    balance.confirmed, balance.unconfirmed
                ),
            });
        }
        log::info!(
            "balance of {}: {} confirmed, {} unconfirmed",
            address,
            balance.confirmed,
            balance.unconfirmed
        );
        Ok(balance)
    }

    pub fn unspent(&self, address: &Address, network: Network) -> Result<Vec<UnspentOutput>, ExplorerError> {
        let url = self.endpoint(network, &format!("address/{address}/unspent"))?;
        let endpoint = url.path().to_string();
        let entries: Vec<UnspentEntry> = self.get_json(url)?;
        entries
            .into_iter()
            .map(|entry| {
                let transaction_id = Txid::from_str(&entry.tx_hash).map_err(|e| ExplorerError::Decode {
                    endpoint: endpoint.clone(),
                    reason: format!("tx_hash {}: {e}", entry.tx_hash),
                })?;
                Ok(UnspentOutput {
                    transaction_id,
                    output_index: entry.tx_pos,
                    value: entry.value,
                    height: entry.height,
                })
            })
            .collect()
    }

    pub fn raw_transaction(&self, txid: &Txid, network: Network) -> Result<Transaction, ExplorerError> {
        let url = self.endpoint(network, &format!("tx/{txid}/hex"))?;
        let endpoint = url.path().to_string();
        let body = self.get(url)?.text()?;
        let decode = |reason: String| ExplorerError::Decode {
            endpoint: endpoint.clone(),
            reason,
        };
        let bytes = hex::decode(body.trim()).map_err(|e| decode(e.to_string()))?;
        let tx: Transaction = deserialize(&bytes).map_err(|e| decode(e.to_string()))?;
        if tx.compute_txid() != *txid {
            return Err(decode(format!("served transaction hashes to {}", tx.compute_txid())));
        }
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    const ADDRESS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

    fn address() -> Address {
        Address::from_str(ADDRESS).unwrap().assume_checked()
    }

    #[test]
    fn balance_sums_confirmed_and_unconfirmed() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path(format!("/main/address/{ADDRESS}/balance"));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "confirmed": 150000000, "unconfirmed": 0 }));
        });

        let explorer = Explorer::new(&server.base_url(), None).unwrap();
        let balance = explorer.balance(&address(), Network::Mainnet).unwrap();
        mock.assert();
        assert_eq!(balance.total_sats(), 150_000_000);
        assert_eq!(balance.to_bsv(), 1.5);
    }

    #[test]
    fn negative_unconfirmed_reduces_total() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(format!("/test/address/{ADDRESS}/balance"));
            then.status(200).json_body(json!({ "confirmed": 5000, "unconfirmed": -5000 }));
        });

        let explorer = Explorer::new(&server.base_url(), None).unwrap();
        let balance = explorer.balance(&address(), Network::Testnet).unwrap();
        assert_eq!(balance.total_sats(), 0);
        assert!(balance.is_empty());
    }

    #[test]
    fn overflowing_balance_fails_fast() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(format!("/main/address/{ADDRESS}/balance"));
            then.status(200)
                .json_body(json!({ "confirmed": i64::MAX, "unconfirmed": 1 }));
        });

        let explorer = Explorer::new(&server.base_url(), None).unwrap();
        assert!(matches!(
            explorer.balance(&address(), Network::Mainnet),
            Err(ExplorerError::Decode { .. })
        ));
    }

    #[test]
    fn http_error_becomes_status_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(format!("/main/address/{ADDRESS}/balance"));
            then.status(500).body("boom");
        });

        let explorer = Explorer::new(&server.base_url(), None).unwrap();
        match explorer.balance(&address(), Network::Mainnet).unwrap_err() {
            ExplorerError::Status { status, .. } => assert_eq!(status, 500),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn malformed_balance_fails_fast() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(format!("/main/address/{ADDRESS}/balance"));
            then.status(200).json_body(json!({ "confirmed": "lots" }));
        });

        let explorer = Explorer::new(&server.base_url(), None).unwrap();
        assert!(matches!(
            explorer.balance(&address(), Network::Mainnet),
            Err(ExplorerError::Decode { .. })
        ));
    }

    #[test]
    fn unspent_maps_entries_and_tolerates_extra_fields() {
        let server = MockServer::start();
        let txid = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";
        server.mock(|when, then| {
            when.method(GET).path(format!("/main/address/{ADDRESS}/unspent"));
            then.status(200).json_body(json!([
                { "height": 800000, "tx_pos": 1, "tx_hash": txid, "value": 2500, "isSpentInMempoolTx": false },
                { "tx_pos": 0, "tx_hash": txid }
            ]));
        });

        let explorer = Explorer::new(&server.base_url(), None).unwrap();
        let utxos = explorer.unspent(&address(), Network::Mainnet).unwrap();
        assert_eq!(utxos.len(), 2);
        assert_eq!(utxos[0].transaction_id, Txid::from_str(txid).unwrap());
        assert_eq!(utxos[0].output_index, 1);
        assert_eq!(utxos[0].value, Some(2500));
        assert_eq!(utxos[1].value, None);
    }

    #[test]
    fn empty_unspent_list_is_not_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(format!("/main/address/{ADDRESS}/unspent"));
            then.status(200).json_body(json!([]));
        });

        let explorer = Explorer::new(&server.base_url(), None).unwrap();
        assert!(explorer.unspent(&address(), Network::Mainnet).unwrap().is_empty());
    }

    #[test]
    fn unspent_with_bad_txid_is_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(format!("/main/address/{ADDRESS}/unspent"));
            then.status(200).json_body(json!([{ "tx_pos": 0, "tx_hash": "zz" }]));
        });

        let explorer = Explorer::new(&server.base_url(), None).unwrap();
        assert!(matches!(
            explorer.unspent(&address(), Network::Mainnet),
            Err(ExplorerError::Decode { .. })
        ));
    }

    #[test]
    fn raw_transaction_checks_served_hash() {
        // genesis coinbase
        let hex_tx = "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73ffffffff0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000";
        let genesis = Txid::from_str("4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b").unwrap();
        let other = Txid::from_str("0e3e2357e806b6cdb1f70b54c3a3a17b6714ee1f0e68bebb44a74b1efd512098").unwrap();

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(format!("/main/tx/{genesis}/hex"));
            then.status(200).body(format!("{hex_tx}\n"));
        });
        server.mock(|when, then| {
            when.method(GET).path(format!("/main/tx/{other}/hex"));
            then.status(200).body(hex_tx);
        });

        let explorer = Explorer::new(&server.base_url(), None).unwrap();
        let tx = explorer.raw_transaction(&genesis, Network::Mainnet).unwrap();
        assert_eq!(tx.output.len(), 1);
        assert!(matches!(
            explorer.raw_transaction(&other, Network::Mainnet),
            Err(ExplorerError::Decode { .. })
        ));
    }
}
