//! Protocol-level limits of the ledger

use crate::types::SlotIndex;

/// Maximum number of inputs per transaction
pub const MAX_INPUTS: usize = 128;

/// Maximum number of outputs per transaction
pub const MAX_OUTPUTS: usize = 128;

/// Maximum number of mana allotments per transaction
pub const MAX_ALLOTMENTS: usize = 128;

/// Maximum number of context inputs per transaction
pub const MAX_CONTEXT_INPUTS: usize = 128;

/// Largest representable slot; used as "never expires"
pub const MAX_SLOT: SlotIndex = SlotIndex::MAX;

/// Maximum number of members of a multi address
pub const MAX_MULTI_ADDRESS_MEMBERS: usize = 10;

/// Maximum number of keys in a block issuer feature
pub const MAX_BLOCK_ISSUER_KEYS: usize = 128;

/// Length of a compressed secp256k1 public key
pub const PUBLIC_KEY_LENGTH: usize = 33;

/// Length of a compact ECDSA signature
pub const SIGNATURE_LENGTH: usize = 64;
