//! Transaction signing
//!
//! Builds the unlock list for inputs owned by signature-unlockable addresses:
//! the first input owned by an address carries the signature, later inputs of
//! the same address reference it.

use crate::address::{Address, AddressKey, PublicKeyHash};
use crate::transaction::{SignatureUnlock, SignedTransaction, Transaction, Unlock};
use crate::types::Hash;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("no key for address {0}")]
    UnknownAddress(String),

    #[error("{0} addresses cannot be signed for directly")]
    UnsupportedAddress(&'static str),

    #[error("invalid signing message: {0}")]
    InvalidMessage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Produces signature unlocks for the addresses it holds keys for.
pub trait AddressSigner {
    fn sign(&self, address: &Address, message: &Hash) -> Result<SignatureUnlock, SigningError>;
}

/// Signer holding secp256k1 secret keys in memory.
pub struct InMemorySigner {
    secp: Secp256k1<All>,
    keys: HashMap<PublicKeyHash, SecretKey>,
}

impl InMemorySigner {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
            keys: HashMap::new(),
        }
    }

    /// Register a key; returns the hash its secp256k1 address and its
    /// implicit account creation address are built from.
    pub fn add_key(&mut self, secret: SecretKey) -> PublicKeyHash {
        let public_key = PublicKey::from_secret_key(&self.secp, &secret);
        let hash = PublicKeyHash::from_public_key(&public_key.serialize());
        self.keys.insert(hash, secret);
        hash
    }

    pub fn address(&self, hash: PublicKeyHash) -> Address {
        Address::Secp256k1(hash)
    }

    pub fn implicit_account_creation_address(&self, hash: PublicKeyHash) -> Address {
        Address::ImplicitAccountCreation(hash)
    }
}

impl Default for InMemorySigner {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSigner for InMemorySigner {
    fn sign(&self, address: &Address, message: &Hash) -> Result<SignatureUnlock, SigningError> {
        let hash = match address.underlying() {
            Address::Secp256k1(hash) | Address::ImplicitAccountCreation(hash) => hash,
            other => return Err(SigningError::UnsupportedAddress(other.kind_name())),
        };
        let secret = self
            .keys
            .get(hash)
            .ok_or_else(|| SigningError::UnknownAddress(address.to_string()))?;
        let message =
            Message::from_digest_slice(message).map_err(|e| SigningError::InvalidMessage(e.to_string()))?;
        let signature = self.secp.sign_ecdsa(&message, secret);
        Ok(SignatureUnlock {
            public_key: PublicKey::from_secret_key(&self.secp, secret).serialize().to_vec(),
            signature: signature.serialize_compact().to_vec(),
        })
    }
}

/// Sign `transaction` for the given input owners, one owner per input.
///
/// Only signature-unlockable owners are supported; inputs owned by chain or
/// multi addresses need their unlocks assembled by the caller.
pub fn sign_transaction<S: AddressSigner>(
    transaction: Transaction,
    signer: &S,
    owners: &[Address],
) -> Result<SignedTransaction, SigningError> {
    let message = transaction
        .signing_message()
        .map_err(|e| SigningError::Serialization(e.to_string()))?;

    let mut signed_at: HashMap<AddressKey, u16> = HashMap::new();
    let mut unlocks = Vec::with_capacity(owners.len());
    for (index, owner) in owners.iter().enumerate() {
        let key = owner.underlying().key();
        if let Some(&reference) = signed_at.get(&key) {
            unlocks.push(Unlock::Reference(reference));
            continue;
        }
        unlocks.push(Unlock::Signature(signer.sign(owner, &message)?));
        signed_at.insert(key, index as u16);
    }

    tracing::debug!(inputs = owners.len(), signatures = signed_at.len(), "transaction signed");
    Ok(SignedTransaction { transaction, unlocks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolParameters;
    use crate::unlock::verify_signature;

    fn transaction() -> Transaction {
        Transaction {
            network_id: ProtocolParameters::default().network_id,
            creation_slot: 100,
            context_inputs: vec![],
            inputs: vec![],
            allotments: vec![],
            capabilities: Default::default(),
            payload: None,
            outputs: vec![],
        }
    }

    #[test]
    fn test_repeated_owner_gets_reference() {
        let mut signer = InMemorySigner::new();
        let key_a = signer_key(&mut signer, 1);
        let a = signer.address(key_a);
        let key_b = signer_key(&mut signer, 2);
        let b = signer.address(key_b);

        let signed = sign_transaction(transaction(), &signer, &[a.clone(), b, a]).unwrap();
        assert!(matches!(signed.unlocks[0], Unlock::Signature(_)));
        assert!(matches!(signed.unlocks[1], Unlock::Signature(_)));
        assert_eq!(signed.unlocks[2], Unlock::Reference(0));
    }

    #[test]
    fn test_signature_verifies() {
        let mut signer = InMemorySigner::new();
        let key = signer_key(&mut signer, 3);
        let owner = signer.address(key);
        let signed = sign_transaction(transaction(), &signer, &[owner]).unwrap();
        let message = signed.transaction.signing_message().unwrap();

        let Unlock::Signature(unlock) = &signed.unlocks[0] else {
            panic!("expected signature unlock");
        };
        assert!(verify_signature(&Secp256k1::verification_only(), &message, unlock));
    }

    #[test]
    fn test_unknown_and_unsupported_owners() {
        let signer = InMemorySigner::new();
        let stranger = Address::Secp256k1(PublicKeyHash([9u8; 32]));
        assert!(matches!(
            sign_transaction(transaction(), &signer, &[stranger]),
            Err(SigningError::UnknownAddress(_))
        ));

        let account = Address::Account(crate::types::AccountId([1u8; 32]));
        assert_eq!(
            sign_transaction(transaction(), &signer, &[account]).unwrap_err(),
            SigningError::UnsupportedAddress("account")
        );
    }

    fn signer_key(signer: &mut InMemorySigner, seed: u8) -> PublicKeyHash {
        signer.add_key(SecretKey::from_slice(&[seed; 32]).unwrap())
    }
}
