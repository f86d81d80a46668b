use blake2::{
    digest::{Update, VariableOutput},
    Blake2bVar,
};
use ed25519_dalek::{Signer, SigningKey};
use vpg_common::Secret;

use crate::{data_objects::AccountBlock, errors::LedgerRpcError};

const ADDRESS_LEN: usize = 55;
const ADDRESS_PREFIX: &str = "vite_";
const BLOCK_HASH_LEN: usize = 32;

/// The gateway's single receiving account: its on-ledger address and the key that seals outgoing blocks.
#[derive(Clone)]
pub struct Wallet {
    address: String,
    signing_key: SigningKey,
}

impl Wallet {
    pub fn from_parts(address: &str, secret_key_hex: &Secret<String>) -> Result<Self, LedgerRpcError> {
        if !address.starts_with(ADDRESS_PREFIX) || address.len() != ADDRESS_LEN {
            return Err(LedgerRpcError::Signing(format!("'{address}' is not a valid account address")));
        }
        // the body must be hex; the checksum suffix is the node's problem
        address_core_bytes(address)?;
        let key_bytes: [u8; 32] = hex::decode(secret_key_hex.reveal())
            .map_err(|e| LedgerRpcError::Signing(format!("Wallet key is not valid hex: {e}")))?
            .try_into()
            .map_err(|_| LedgerRpcError::Signing("Wallet key must be exactly 32 bytes".to_string()))?;
        Ok(Self { address: address.to_string(), signing_key: SigningKey::from_bytes(&key_bytes) })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Computes the block hash and attaches it, the public key, and the signature. Must run after the previous-hash,
    /// height and (optional) nonce are final, since all of them are covered by the hash.
    pub fn seal(&self, block: &mut AccountBlock) -> Result<(), LedgerRpcError> {
        let digest = block_digest(block)?;
        let signature = self.signing_key.sign(&digest);
        block.hash = Some(hex::encode(digest));
        block.public_key = Some(hex::encode(self.signing_key.verifying_key().as_bytes()));
        block.signature = Some(hex::encode(signature.to_bytes()));
        Ok(())
    }
}

fn block_digest(block: &AccountBlock) -> Result<Vec<u8>, LedgerRpcError> {
    let mut hasher = Blake2bVar::new(BLOCK_HASH_LEN)
        .map_err(|e| LedgerRpcError::Signing(format!("Could not construct block hasher: {e}")))?;
    hasher.update(&[block.block_type]);
    let height: u64 =
        block.height.parse().map_err(|e| LedgerRpcError::Signing(format!("Block height is not numeric: {e}")))?;
    hasher.update(&height.to_be_bytes());
    hasher.update(&address_core_bytes(&block.address)?);
    hasher.update(&decode_hash(&block.previous_hash)?);
    hasher.update(&decode_hash(&block.send_block_hash)?);
    if let Some(nonce) = &block.nonce {
        hasher.update(nonce.as_bytes());
    }
    let mut digest = vec![0u8; BLOCK_HASH_LEN];
    hasher
        .finalize_variable(&mut digest)
        .map_err(|e| LedgerRpcError::Signing(format!("Could not finalize block hash: {e}")))?;
    Ok(digest)
}

/// The 20 raw bytes inside a `vite_...` address (the checksum suffix is not part of any hash preimage).
pub(crate) fn address_core_bytes(address: &str) -> Result<Vec<u8>, LedgerRpcError> {
    let body = address
        .get(ADDRESS_PREFIX.len()..ADDRESS_PREFIX.len() + 40)
        .ok_or_else(|| LedgerRpcError::Signing(format!("'{address}' is too short to be an account address")))?;
    hex::decode(body).map_err(|e| LedgerRpcError::Signing(format!("'{address}' has a non-hex body: {e}")))
}

pub(crate) fn decode_hash(hash: &str) -> Result<Vec<u8>, LedgerRpcError> {
    hex::decode(hash).map_err(|e| LedgerRpcError::Signing(format!("'{hash}' is not a valid block hash: {e}")))
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    pub(crate) fn test_wallet() -> Wallet {
        let address = format!("{}{}{}", ADDRESS_PREFIX, "ab".repeat(20), "0123456789");
        let key = Secret::new("11".repeat(32));
        Wallet::from_parts(&address, &key).expect("test wallet should be valid")
    }

    #[test]
    fn malformed_addresses_are_rejected() {
        let key = Secret::new("11".repeat(32));
        assert!(Wallet::from_parts("vite_short", &key).is_err());
        assert!(Wallet::from_parts(&format!("nope_{}{}", "ab".repeat(20), "0123456789"), &key).is_err());
        assert!(Wallet::from_parts(&format!("vite_{}{}", "zz".repeat(20), "0123456789"), &key).is_err());
    }

    #[test]
    fn malformed_keys_are_rejected() {
        let address = format!("{}{}{}", ADDRESS_PREFIX, "ab".repeat(20), "0123456789");
        assert!(Wallet::from_parts(&address, &Secret::new("nothex".to_string())).is_err());
        assert!(Wallet::from_parts(&address, &Secret::new("11".repeat(16))).is_err());
    }

    #[test]
    fn sealing_attaches_hash_key_and_signature() {
        let wallet = test_wallet();
        let mut block = AccountBlock::receive(wallet.address().to_string(), "cd".repeat(32))
            .with_previous("ef".repeat(32), 8);
        wallet.seal(&mut block).unwrap();
        assert_eq!(block.hash.as_ref().unwrap().len(), 64);
        assert_eq!(block.public_key.as_ref().unwrap().len(), 64);
        assert_eq!(block.signature.as_ref().unwrap().len(), 128);
    }

    #[test]
    fn the_nonce_is_covered_by_the_hash() {
        let wallet = test_wallet();
        let mut plain = AccountBlock::receive(wallet.address().to_string(), "cd".repeat(32))
            .with_previous("ef".repeat(32), 8);
        let mut with_nonce = plain.clone();
        with_nonce.nonce = Some("AAAAAAAAAAE=".to_string());
        wallet.seal(&mut plain).unwrap();
        wallet.seal(&mut with_nonce).unwrap();
        assert_ne!(plain.hash, with_nonce.hash);
    }
}
