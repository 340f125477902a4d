//! NFT transitions

use super::{destruction_allowed, immutable_features_unchanged, issuer_unlocked, zeroed_id};
use crate::error::Result;
use crate::output::NftOutput;
use crate::transaction::TransactionCapabilities;
use crate::types::*;
use crate::working_set::WorkingSet;

pub fn genesis(ws: &WorkingSet<'_>, chain_id: ChainId, next: &NftOutput) -> Result<()> {
    zeroed_id(chain_id, next.nft_id.is_empty())?;
    issuer_unlocked(ws, chain_id, &next.immutable_features)
}

/// Issuer and immutable metadata are fixed for the NFT's lifetime.
pub fn state_change(
    _ws: &WorkingSet<'_>,
    chain_id: ChainId,
    current: &NftOutput,
    next: &NftOutput,
) -> Result<()> {
    immutable_features_unchanged(chain_id, &current.immutable_features, &next.immutable_features)
}

pub fn destroy(ws: &WorkingSet<'_>, chain_id: ChainId) -> Result<()> {
    destruction_allowed(ws, chain_id, TransactionCapabilities::CAN_DESTROY_NFT_OUTPUTS)
}
