//! Core ledger types: scalars, identifiers and chain IDs

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hash type: 256-bit digest
pub type Hash = [u8; 32];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Slot index: the ledger's smallest unit of time
pub type SlotIndex = u32;

/// Epoch index: a fixed run of `2^slots_per_epoch_exponent` slots
pub type EpochIndex = u32;

/// Base token amount
pub type BaseToken = u64;

/// Mana amount
pub type Mana = u64;

/// Signed block issuance credit balance of an account
pub type BlockIssuanceCredits = i64;

/// Index of an output within the transaction that created it
pub type OutputIndex = u16;

/// Transaction ID: digest of the transaction essence plus its creation slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId {
    pub hash: Hash,
    pub slot: SlotIndex,
}

impl TransactionId {
    pub fn new(hash: Hash, slot: SlotIndex) -> Self {
        Self { hash, slot }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}:{}", hex::encode(self.hash), self.slot)
    }
}

/// OutputID: 𝒪 = TransactionId × ℕ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputId {
    pub transaction_id: TransactionId,
    pub index: OutputIndex,
}

impl OutputId {
    /// Length of the canonical byte form: hash (32) + slot (4) + index (2)
    pub const LENGTH: usize = 38;

    pub fn new(transaction_id: TransactionId, index: OutputIndex) -> Self {
        Self {
            transaction_id,
            index,
        }
    }

    /// Slot in which the output was created.
    pub fn creation_slot(&self) -> SlotIndex {
        self.transaction_id.slot
    }

    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        let mut bytes = [0u8; Self::LENGTH];
        bytes[..32].copy_from_slice(&self.transaction_id.hash);
        bytes[32..36].copy_from_slice(&self.transaction_id.slot.to_le_bytes());
        bytes[36..].copy_from_slice(&self.index.to_le_bytes());
        bytes
    }

    /// Digest every output-derived chain ID is built from.
    fn derived_hash(&self) -> Hash {
        Sha256::digest(self.to_bytes()).into()
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.transaction_id, self.index)
    }
}

macro_rules! output_derived_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Hash);

        impl $name {
            /// The zero value a chain output declares at genesis.
            pub const EMPTY: Self = Self([0u8; 32]);

            pub fn is_empty(&self) -> bool {
                *self == Self::EMPTY
            }

            /// Derive the effective ID from the output that created the chain.
            pub fn from_output_id(output_id: &OutputId) -> Self {
                Self(output_id.derived_hash())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }
    };
}

output_derived_id!(
    /// AccountID: SHA-256 of the OutputID that created the account
    AccountId
);
output_derived_id!(
    /// AnchorID: SHA-256 of the OutputID that created the anchor
    AnchorId
);
output_derived_id!(
    /// NFTID: SHA-256 of the OutputID that created the NFT
    NftId
);
output_derived_id!(
    /// DelegationID: SHA-256 of the OutputID that created the delegation
    DelegationId
);

/// FoundryID: (owning account, serial number, token scheme kind).
///
/// A foundry's ID is fully determined by its content, so it is never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FoundryId {
    pub account_id: AccountId,
    pub serial_number: u32,
    pub token_scheme_kind: u8,
}

impl FoundryId {
    pub fn new(account_id: AccountId, serial_number: u32, token_scheme_kind: u8) -> Self {
        Self {
            account_id,
            serial_number,
            token_scheme_kind,
        }
    }
}

impl fmt::Display for FoundryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.account_id, self.serial_number, self.token_scheme_kind
        )
    }
}

/// A native token is identified by the foundry that controls its supply.
pub type NativeTokenId = FoundryId;

/// Stable per-chain identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChainId {
    Account(AccountId),
    Anchor(AnchorId),
    Foundry(FoundryId),
    Nft(NftId),
    Delegation(DelegationId),
}

impl ChainId {
    /// Whether this is the zero value a genesis output declares.
    pub fn is_empty(&self) -> bool {
        match self {
            ChainId::Account(id) => id.is_empty(),
            ChainId::Anchor(id) => id.is_empty(),
            ChainId::Foundry(_) => false,
            ChainId::Nft(id) => id.is_empty(),
            ChainId::Delegation(id) => id.is_empty(),
        }
    }

    /// The effective chain ID: the declared one, or the one derived from
    /// `output_id` when the declared ID is empty.
    pub fn or_from_output_id(self, output_id: &OutputId) -> Self {
        if !self.is_empty() {
            return self;
        }
        match self {
            ChainId::Account(_) => ChainId::Account(AccountId::from_output_id(output_id)),
            ChainId::Anchor(_) => ChainId::Anchor(AnchorId::from_output_id(output_id)),
            ChainId::Nft(_) => ChainId::Nft(NftId::from_output_id(output_id)),
            ChainId::Delegation(_) => {
                ChainId::Delegation(DelegationId::from_output_id(output_id))
            }
            foundry @ ChainId::Foundry(_) => foundry,
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainId::Account(id) => write!(f, "account {}", id),
            ChainId::Anchor(id) => write!(f, "anchor {}", id),
            ChainId::Foundry(id) => write!(f, "foundry {}", id),
            ChainId::Nft(id) => write!(f, "nft {}", id),
            ChainId::Delegation(id) => write!(f, "delegation {}", id),
        }
    }
}

/// Commitment: an attestation of ledger state at a given slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub slot: SlotIndex,
    pub root: Hash,
}

impl Commitment {
    pub fn new(slot: SlotIndex) -> Self {
        Self {
            slot,
            root: [0u8; 32],
        }
    }
}

/// Transition kind of a chain touched by a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainTransitionType {
    /// Present only on the output side
    Genesis,
    /// Present on both sides
    StateChange,
    /// Present only on the input side
    Destroy,
}
