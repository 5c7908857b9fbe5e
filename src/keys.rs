use bitcoin::{Address, PublicKey};

use crate::error::BridgeError;
use crate::types::Network;
use crate::wallet::{BRIDGE_KEY, Wallet};

/// The bridge public key as the wallet derives it for itself.
pub fn derive_public_key<W: Wallet + ?Sized>(wallet: &W) -> Result<PublicKey, BridgeError> {
    let key = wallet
        .get_public_key(&BRIDGE_KEY)
        .map_err(|e| BridgeError::KeyDerivation(e.to_string()))?;
    Ok(PublicKey::new(key))
}

/// P2PKH address of the bridge key on `network`. Same wallet and network, same address.
pub fn derive_address<W: Wallet + ?Sized>(wallet: &W, network: Network) -> Result<Address, BridgeError> {
    let public_key = derive_public_key(wallet)?;
    let address = Address::p2pkh(public_key.pubkey_hash(), network.address_network());
    log::debug!("derived bridge address {} on {}", address, network);
    Ok(address)
}
