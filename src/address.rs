//! Address kinds, unique address keys and restricted-address capabilities

use crate::types::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 of a compressed secp256k1 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKeyHash(pub Hash);

impl PublicKeyHash {
    pub fn from_public_key(public_key: &[u8]) -> Self {
        Self(Sha256::digest(public_key).into())
    }
}

/// Member of a [`MultiAddress`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedAddress {
    pub address: Address,
    pub weight: u8,
}

/// Weighted threshold set of addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiAddress {
    pub addresses: Vec<WeightedAddress>,
    pub threshold: u16,
}

/// Address plus the capabilities it grants to outputs paying to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictedAddress {
    pub address: Address,
    pub capabilities: AddressCapabilities,
}

/// Capability bitmask of a [`RestrictedAddress`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressCapabilities(pub u16);

impl AddressCapabilities {
    pub const CAN_RECEIVE_NATIVE_TOKENS: u16 = 1 << 0;
    pub const CAN_RECEIVE_MANA: u16 = 1 << 1;
    pub const CAN_RECEIVE_OUTPUTS_WITH_TIMELOCK: u16 = 1 << 2;
    pub const CAN_RECEIVE_OUTPUTS_WITH_EXPIRATION: u16 = 1 << 3;
    pub const CAN_RECEIVE_OUTPUTS_WITH_STORAGE_DEPOSIT_RETURN: u16 = 1 << 4;
    pub const CAN_RECEIVE_ACCOUNT_OUTPUTS: u16 = 1 << 5;
    pub const CAN_RECEIVE_ANCHOR_OUTPUTS: u16 = 1 << 6;
    pub const CAN_RECEIVE_NFT_OUTPUTS: u16 = 1 << 7;
    pub const CAN_RECEIVE_DELEGATION_OUTPUTS: u16 = 1 << 8;

    pub const ALL: Self = Self(0x01ff);
    pub const NONE: Self = Self(0);

    pub fn has(&self, capability: u16) -> bool {
        self.0 & capability == capability
    }

    pub fn with(self, capability: u16) -> Self {
        Self(self.0 | capability)
    }

    /// Human readable name of a single capability bit, for diagnostics.
    pub fn name(capability: u16) -> &'static str {
        match capability {
            Self::CAN_RECEIVE_NATIVE_TOKENS => "native tokens",
            Self::CAN_RECEIVE_MANA => "mana",
            Self::CAN_RECEIVE_OUTPUTS_WITH_TIMELOCK => "timelock",
            Self::CAN_RECEIVE_OUTPUTS_WITH_EXPIRATION => "expiration",
            Self::CAN_RECEIVE_OUTPUTS_WITH_STORAGE_DEPOSIT_RETURN => "storage deposit return",
            Self::CAN_RECEIVE_ACCOUNT_OUTPUTS => "account outputs",
            Self::CAN_RECEIVE_ANCHOR_OUTPUTS => "anchor outputs",
            Self::CAN_RECEIVE_NFT_OUTPUTS => "nft outputs",
            Self::CAN_RECEIVE_DELEGATION_OUTPUTS => "delegation outputs",
            _ => "unknown",
        }
    }
}

/// Address: every kind of owner an output can name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Address {
    /// Unlocked directly by a secp256k1 signature
    Secp256k1(PublicKeyHash),
    Account(AccountId),
    Anchor(AnchorId),
    Nft(NftId),
    /// Signature-unlockable address whose basic outputs act as implicit accounts
    ImplicitAccountCreation(PublicKeyHash),
    Multi(MultiAddress),
    Restricted(Box<RestrictedAddress>),
}

/// Unique key of an address; two addresses share a key iff they are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressKey(Vec<u8>);

impl Address {
    pub const KIND_SECP256K1: u8 = 0;
    pub const KIND_ACCOUNT: u8 = 8;
    pub const KIND_NFT: u8 = 16;
    pub const KIND_ANCHOR: u8 = 24;
    pub const KIND_IMPLICIT_ACCOUNT_CREATION: u8 = 32;
    pub const KIND_MULTI: u8 = 40;
    pub const KIND_RESTRICTED: u8 = 48;

    pub fn kind(&self) -> u8 {
        match self {
            Address::Secp256k1(_) => Self::KIND_SECP256K1,
            Address::Account(_) => Self::KIND_ACCOUNT,
            Address::Nft(_) => Self::KIND_NFT,
            Address::Anchor(_) => Self::KIND_ANCHOR,
            Address::ImplicitAccountCreation(_) => Self::KIND_IMPLICIT_ACCOUNT_CREATION,
            Address::Multi(_) => Self::KIND_MULTI,
            Address::Restricted(_) => Self::KIND_RESTRICTED,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Address::Secp256k1(_) => "secp256k1",
            Address::Account(_) => "account",
            Address::Anchor(_) => "anchor",
            Address::Nft(_) => "nft",
            Address::ImplicitAccountCreation(_) => "implicit account creation",
            Address::Multi(_) => "multi",
            Address::Restricted(_) => "restricted",
        }
    }

    /// The address used for unlocking: restricted addresses unwrap to the
    /// address they restrict.
    pub fn underlying(&self) -> &Address {
        match self {
            Address::Restricted(restricted) => restricted.address.underlying(),
            other => other,
        }
    }

    /// Capabilities granted by this address; only restricted addresses limit them.
    pub fn capabilities(&self) -> AddressCapabilities {
        match self {
            Address::Restricted(restricted) => restricted.capabilities,
            _ => AddressCapabilities::ALL,
        }
    }

    /// Address of an addressable chain (accounts, anchors and NFTs).
    pub fn from_chain_id(chain_id: &ChainId) -> Option<Address> {
        match chain_id {
            ChainId::Account(id) => Some(Address::Account(*id)),
            ChainId::Anchor(id) => Some(Address::Anchor(*id)),
            ChainId::Nft(id) => Some(Address::Nft(*id)),
            ChainId::Foundry(_) | ChainId::Delegation(_) => None,
        }
    }

    pub fn is_implicit_account_creation(&self) -> bool {
        matches!(self.underlying(), Address::ImplicitAccountCreation(_))
    }

    pub fn key(&self) -> AddressKey {
        let mut bytes = vec![self.kind()];
        match self {
            Address::Secp256k1(hash) | Address::ImplicitAccountCreation(hash) => {
                bytes.extend_from_slice(&hash.0)
            }
            Address::Account(id) => bytes.extend_from_slice(&id.0),
            Address::Anchor(id) => bytes.extend_from_slice(&id.0),
            Address::Nft(id) => bytes.extend_from_slice(&id.0),
            Address::Multi(multi) => {
                let mut hasher = Sha256::new();
                for member in &multi.addresses {
                    hasher.update(member.address.key().0);
                    hasher.update([member.weight]);
                }
                hasher.update(multi.threshold.to_le_bytes());
                bytes.extend_from_slice(&hasher.finalize());
            }
            Address::Restricted(restricted) => {
                bytes.extend_from_slice(&restricted.address.key().0);
                bytes.extend_from_slice(&restricted.capabilities.0.to_le_bytes());
            }
        }
        AddressKey(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Secp256k1(hash) => write!(f, "secp256k1:0x{}", hex::encode(hash.0)),
            Address::Account(id) => write!(f, "account:{}", id),
            Address::Anchor(id) => write!(f, "anchor:{}", id),
            Address::Nft(id) => write!(f, "nft:{}", id),
            Address::ImplicitAccountCreation(hash) => {
                write!(f, "implicit:0x{}", hex::encode(hash.0))
            }
            Address::Multi(multi) => write!(
                f,
                "multi({} members, threshold {})",
                multi.addresses.len(),
                multi.threshold
            ),
            Address::Restricted(restricted) => write!(
                f,
                "restricted({}, caps {:#06x})",
                restricted.address, restricted.capabilities.0
            ),
        }
    }
}
