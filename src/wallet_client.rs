use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use bitcoin::secp256k1::PublicKey;
use bitcoin::Txid;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::beef;
use crate::error::WalletError;
use crate::types::{Network, SignedInput};
use crate::wallet::{CreateActionArgs, CreateActionResult, KeyDerivation, SignableTransaction, Wallet};

const ORIGINATOR: HeaderName = HeaderName::from_static("originator");

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyArgs<'a> {
    #[serde(rename = "protocolID")]
    protocol_id: (u8, &'a str),
    #[serde(rename = "keyID")]
    key_id: &'a str,
    counterparty: &'a str,
}

impl<'a> From<&'a KeyDerivation> for KeyArgs<'a> {
    fn from(key: &'a KeyDerivation) -> Self {
        Self {
            protocol_id: (key.security_level, key.protocol),
            key_id: key.key_id,
            counterparty: key.counterparty.as_str(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default, alias = "message")]
    description: Option<String>,
}

/// Wallet over HTTP JSON: each call is `POST {base}/{method}` with a JSON body.
#[derive(Clone)]
pub struct WalletClient {
    base: Url,
    client: Client,
}

impl WalletClient {
    /// `base` like "http://localhost:3321"; `originator` names this app to the wallet.
    pub fn new(base: &str, originator: &str, timeout: Option<Duration>) -> Result<Self, WalletError> {
        let base = Url::parse(base)?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let originator = HeaderValue::from_str(originator).map_err(|e| WalletError::Decode {
            method: "originator".into(),
            reason: e.to_string(),
        })?;
        headers.insert(ORIGINATOR, originator);
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { base, client })
    }

    fn call<A, R>(&self, method: &str, args: &A) -> Result<R, WalletError>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let url = self.base.join(&format!("/{method}"))?;
        log::debug!("wallet call {}", method);
        let resp = self.client.post(url).json(args).send()?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            let parsed = serde_json::from_str::<ErrorBody>(&body).ok();
            let code = parsed.as_ref().and_then(|b| b.code.clone());
            let description = parsed
                .and_then(|b| b.description)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(WalletError::Rejected {
                method: method.to_string(),
                code,
                description,
            });
        }
        serde_json::from_str(&body).map_err(|e| WalletError::Decode {
            method: method.to_string(),
            reason: e.to_string(),
        })
    }
}

fn parse_txid(method: &str, hex: Option<String>) -> Result<Option<Txid>, WalletError> {
    hex.map(|h| {
        Txid::from_str(&h).map_err(|e| WalletError::Decode {
            method: method.to_string(),
            reason: format!("txid {h}: {e}"),
        })
    })
    .transpose()
}

impl Wallet for WalletClient {
    fn get_network(&self) -> Result<Network, WalletError> {
        #[derive(Deserialize)]
        struct R {
            network: Network,
        }
        let r: R = self.call("getNetwork", &serde_json::json!({}))?;
        Ok(r.network)
    }

    fn get_public_key(&self, key: &KeyDerivation) -> Result<PublicKey, WalletError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Args<'a> {
            #[serde(flatten)]
            key: KeyArgs<'a>,
            for_self: bool,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct R {
            public_key: String,
        }

        let r: R = self.call(
            "getPublicKey",
            &Args {
                key: key.into(),
                for_self: true,
            },
        )?;
        let bytes = hex::decode(&r.public_key).map_err(|e| WalletError::Decode {
            method: "getPublicKey".into(),
            reason: e.to_string(),
        })?;
        PublicKey::from_slice(&bytes).map_err(|e| WalletError::Decode {
            method: "getPublicKey".into(),
            reason: format!("invalid public key {}: {e}", r.public_key),
        })
    }

    fn create_signature(&self, key: &KeyDerivation, digest: &[u8; 32]) -> Result<Vec<u8>, WalletError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Args<'a> {
            #[serde(flatten)]
            key: KeyArgs<'a>,
            hash_to_directly_sign: &'a [u8],
        }
        #[derive(Deserialize)]
        struct R {
            signature: Vec<u8>,
        }

        let r: R = self.call(
            "createSignature",
            &Args {
                key: key.into(),
                hash_to_directly_sign: digest,
            },
        )?;
        Ok(r.signature)
    }

    fn create_action(&self, args: &CreateActionArgs) -> Result<CreateActionResult, WalletError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Input<'a> {
            outpoint: String,
            unlocking_script_length: u32,
            input_description: &'a str,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Output<'a> {
            locking_script: String,
            satoshis: u64,
            output_description: &'a str,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Options {
            randomize_outputs: bool,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Args<'a> {
            description: &'a str,
            #[serde(rename = "inputBEEF", skip_serializing_if = "Option::is_none")]
            input_beef: Option<&'a [u8]>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            inputs: Vec<Input<'a>>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            outputs: Vec<Output<'a>>,
            options: Options,
        }
        #[derive(Deserialize)]
        struct Signable {
            tx: Vec<u8>,
            reference: String,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct R {
            #[serde(default)]
            txid: Option<String>,
            #[serde(default)]
            signable_transaction: Option<Signable>,
        }

        let wire = Args {
            description: &args.description,
            input_beef: args.input_beef.as_deref(),
            inputs: args
                .inputs
                .iter()
                .map(|i| Input {
                    outpoint: format!("{}.{}", i.outpoint.txid, i.outpoint.vout),
                    unlocking_script_length: i.unlocking_script_length,
                    input_description: &i.description,
                })
                .collect(),
            outputs: args
                .outputs
                .iter()
                .map(|o| Output {
                    locking_script: hex::encode(o.locking_script.as_bytes()),
                    satoshis: o.satoshis,
                    output_description: &o.description,
                })
                .collect(),
            options: Options {
                randomize_outputs: false,
            },
        };

        let r: R = self.call("createAction", &wire)?;
        let Some(signable) = r.signable_transaction else {
            return Ok(CreateActionResult {
                txid: parse_txid("createAction", r.txid)?,
                signable_transaction: None,
            });
        };

        // a reference exists from here on; keep it in every error so the caller can abort
        let undecodable = |reason: String| WalletError::UndecodableSignable {
            reference: signable.reference.clone(),
            reason,
        };
        let tx = beef::subject_transaction(&signable.tx)
            .map_err(|e| undecodable(format!("signable transaction: {e}")))?;
        let txid = parse_txid("createAction", r.txid).map_err(|e| undecodable(e.to_string()))?;
        Ok(CreateActionResult {
            txid,
            signable_transaction: Some(SignableTransaction {
                reference: signable.reference,
                tx,
            }),
        })
    }

    fn sign_action(
        &self,
        reference: &str,
        spends: &BTreeMap<u32, SignedInput>,
    ) -> Result<Option<Txid>, WalletError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Spend {
            unlocking_script: String,
        }
        #[derive(Serialize)]
        struct Args<'a> {
            spends: BTreeMap<String, Spend>,
            reference: &'a str,
        }
        #[derive(Deserialize)]
        struct R {
            #[serde(default)]
            txid: Option<String>,
        }

        let wire = Args {
            spends: spends
                .iter()
                .map(|(index, input)| {
                    (
                        index.to_string(),
                        Spend {
                            unlocking_script: hex::encode(input.unlocking_script.as_bytes()),
                        },
                    )
                })
                .collect(),
            reference,
        };
        let r: R = self.call("signAction", &wire)?;
        parse_txid("signAction", r.txid)
    }

    fn abort_action(&self, reference: &str) -> Result<(), WalletError> {
        #[derive(Serialize)]
        struct Args<'a> {
            reference: &'a str,
        }
        #[derive(Deserialize)]
        struct R {
            aborted: bool,
        }

        let r: R = self.call("abortAction", &Args { reference })?;
        if !r.aborted {
            return Err(WalletError::Rejected {
                method: "abortAction".into(),
                code: None,
                description: format!("pending action {reference} was not aborted"),
            });
        }
        Ok(())
    }
}
