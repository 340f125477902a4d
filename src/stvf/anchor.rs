//! Anchor transitions
//!
//! An unchanged state index is a governance transition, an index bumped by
//! one is a state transition. Each may only touch its own half of the output.

use super::{destruction_allowed, immutable_features_unchanged, issuer_unlocked, zeroed_id};
use crate::error::{Result, ValidationError};
use crate::output::AnchorOutput;
use crate::transaction::TransactionCapabilities;
use crate::types::*;
use crate::working_set::WorkingSet;

pub fn genesis(ws: &WorkingSet<'_>, chain_id: ChainId, next: &AnchorOutput) -> Result<()> {
    zeroed_id(chain_id, next.anchor_id.is_empty())?;
    issuer_unlocked(ws, chain_id, &next.immutable_features)
}

pub fn state_change(
    _ws: &WorkingSet<'_>,
    chain_id: ChainId,
    current: &AnchorOutput,
    next: &AnchorOutput,
) -> Result<()> {
    immutable_features_unchanged(chain_id, &current.immutable_features, &next.immutable_features)?;

    if current.state_index == next.state_index {
        governance_transition_valid(current, next)
    } else {
        state_transition_valid(current, next)
    }
}

/// Governors may swap controllers and metadata, nothing the state controller owns.
fn governance_transition_valid(current: &AnchorOutput, next: &AnchorOutput) -> Result<()> {
    let invalid = |reason: &'static str| -> Result<()> {
        Err(ValidationError::AnchorInvalidGovernanceTransition {
            anchor_id: next.anchor_id,
            reason,
        }
        .into())
    };
    if current.amount != next.amount {
        return invalid("amount changed");
    }
    if current.mana != next.mana {
        return invalid("mana changed");
    }
    if current.features.state_metadata() != next.features.state_metadata() {
        return invalid("state metadata changed");
    }
    Ok(())
}

/// State controllers may move value and state metadata, nothing the governor owns.
fn state_transition_valid(current: &AnchorOutput, next: &AnchorOutput) -> Result<()> {
    let invalid = |reason: &'static str| -> Result<()> {
        Err(ValidationError::AnchorInvalidStateTransition {
            anchor_id: next.anchor_id,
            reason,
        }
        .into())
    };
    if current.state_index.checked_add(1) != Some(next.state_index) {
        return invalid("state index must increase by one");
    }
    let (current_conditions, next_conditions) = (&current.unlock_conditions, &next.unlock_conditions);
    if current_conditions.state_controller() != next_conditions.state_controller() {
        return invalid("state controller changed");
    }
    if current_conditions.governor() != next_conditions.governor() {
        return invalid("governor changed");
    }
    if current.features.metadata() != next.features.metadata() {
        return invalid("metadata changed");
    }
    Ok(())
}

pub fn destroy(ws: &WorkingSet<'_>, chain_id: ChainId) -> Result<()> {
    destruction_allowed(ws, chain_id, TransactionCapabilities::CAN_DESTROY_ANCHOR_OUTPUTS)
}
