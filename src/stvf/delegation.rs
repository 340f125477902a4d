//! Delegation transitions
//!
//! A delegation is created, transitioned once to fix its end epoch, and
//! destroyed when its rewards are claimed.

use super::zeroed_id;
use crate::error::{Result, ValidationError};
use crate::output::DelegationOutput;
use crate::types::*;
use crate::working_set::WorkingSet;

/// First epoch whose registration is still open at `slot`: the next epoch,
/// or the one after once `slot` is past the registration slot.
fn epoch_after_registration(ws: &WorkingSet<'_>, slot: SlotIndex) -> EpochIndex {
    let epoch = ws.params.epoch_from_slot(slot);
    if slot <= ws.params.registration_slot(epoch) {
        epoch.saturating_add(1)
    } else {
        epoch.saturating_add(2)
    }
}

/// DelegationGenesis: zeroed ID, delegated amount = amount, end epoch 0,
/// start epoch = first epoch open for registration at the past bounded slot.
pub fn genesis(ws: &WorkingSet<'_>, chain_id: ChainId, next: &DelegationOutput) -> Result<()> {
    zeroed_id(chain_id, next.delegation_id.is_empty())?;
    if next.delegated_amount != next.amount {
        return Err(ValidationError::DelegationAmountMismatch {
            amount: next.amount,
            delegated_amount: next.delegated_amount,
        }
        .into());
    }
    if next.end_epoch != 0 {
        return Err(ValidationError::DelegationEndEpochNotZero {
            end_epoch: next.end_epoch,
        }
        .into());
    }

    let past_bounded_slot = ws
        .past_bounded_slot()
        .ok_or(ValidationError::DelegationCommitmentInputMissing { chain_id })?;
    let expected = epoch_after_registration(ws, past_bounded_slot);
    if next.start_epoch != expected {
        return Err(ValidationError::DelegationStartEpochInvalid {
            start_epoch: next.start_epoch,
            expected,
        }
        .into());
    }
    Ok(())
}

/// DelegationStateChange: the single delayed-claiming transition.
///
/// The current output still carries the zeroed ID, only the end epoch is
/// set (to the last epoch the delegation can still count for) and no rewards
/// are claimed.
pub fn state_change(
    ws: &WorkingSet<'_>,
    chain_id: ChainId,
    current: &DelegationOutput,
    next: &DelegationOutput,
) -> Result<()> {
    if !current.delegation_id.is_empty() {
        return Err(ValidationError::DelegationTransitionedTwice { chain_id }.into());
    }
    if current.delegated_amount != next.delegated_amount
        || current.validator_address != next.validator_address
        || current.start_epoch != next.start_epoch
    {
        return Err(ValidationError::DelegationModified { chain_id }.into());
    }

    let future_bounded_slot = ws
        .future_bounded_slot()
        .ok_or(ValidationError::DelegationCommitmentInputMissing { chain_id })?;
    let expected = epoch_after_registration(ws, future_bounded_slot).saturating_sub(1);
    if next.end_epoch != expected {
        return Err(ValidationError::DelegationEndEpochInvalid {
            end_epoch: next.end_epoch,
            expected,
        }
        .into());
    }

    if ws.rewards.contains_key(&chain_id) {
        return Err(ValidationError::DelegationRewardsClaimingInvalid { chain_id }.into());
    }
    Ok(())
}

/// Destruction always claims rewards, even a zero amount.
pub fn destroy(ws: &WorkingSet<'_>, chain_id: ChainId) -> Result<()> {
    if ws.rewards.contains_key(&chain_id) {
        Ok(())
    } else {
        Err(ValidationError::DelegationRewardInputMissing { chain_id }.into())
    }
}
