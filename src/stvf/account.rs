//! Account and implicit account transitions
//!
//! Accounts carry the two time-bound features of the ledger: the block
//! issuer feature (gated by block issuance credits and a mana lock) and the
//! staking feature (locked until its end epoch, rewarded on removal).

use super::{destruction_allowed, immutable_features_unchanged, issuer_unlocked, zeroed_id};
use crate::constants::MAX_SLOT;
use crate::economic::input_mana;
use crate::error::{Result, ValidationError};
use crate::output::{AccountOutput, BasicOutput, BlockIssuerFeature, Output, StakingFeature};
use crate::transaction::TransactionCapabilities;
use crate::types::*;
use crate::working_set::{ChainInput, WorkingSet};

/// What a transition does to an account's staking feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum StakingOutcome {
    /// No feature, a new one, or the current one kept or extended
    Retained,
    /// An expired feature removed, or replaced by a fresh one
    Removed,
}

pub fn genesis(ws: &WorkingSet<'_>, chain_id: ChainId, next: &AccountOutput) -> Result<()> {
    zeroed_id(chain_id, next.account_id.is_empty())?;
    genesis_valid(ws, chain_id, next)
}

/// Features a freshly created account (or a bootstrapped implicit account)
/// may carry.
fn genesis_valid(ws: &WorkingSet<'_>, chain_id: ChainId, next: &AccountOutput) -> Result<()> {
    if let Some(block_issuer) = next.features.block_issuer() {
        let past_bounded_slot = ws
            .past_bounded_slot()
            .ok_or(ValidationError::BlockIssuerCommitmentInputMissing { chain_id })?;
        if block_issuer.expiry_slot < past_bounded_slot {
            return Err(ValidationError::BlockIssuerExpiryTooEarly {
                expiry_slot: block_issuer.expiry_slot,
                past_bounded_slot,
            }
            .into());
        }
    }
    if let Some(staking) = next.features.staking() {
        staking_genesis_valid(ws, chain_id, next, staking)?;
    }
    issuer_unlocked(ws, chain_id, &next.immutable_features)
}

/// A new staking feature starts at the past bounded epoch and lasts at least
/// the unbonding period; it requires a block issuer feature.
fn staking_genesis_valid(
    ws: &WorkingSet<'_>,
    chain_id: ChainId,
    next: &AccountOutput,
    staking: &StakingFeature,
) -> Result<()> {
    let past_bounded_slot = ws
        .past_bounded_slot()
        .ok_or(ValidationError::StakingCommitmentInputMissing { chain_id })?;
    let past_bounded_epoch = ws.params.epoch_from_slot(past_bounded_slot);

    if staking.start_epoch != past_bounded_epoch {
        return Err(ValidationError::StakingStartEpochInvalid {
            start_epoch: staking.start_epoch,
            expected: past_bounded_epoch,
        }
        .into());
    }
    let minimum = past_bounded_epoch.saturating_add(ws.params.staking_unbonding_period);
    if staking.end_epoch < minimum {
        return Err(ValidationError::StakingEndEpochTooEarly {
            end_epoch: staking.end_epoch,
            minimum,
        }
        .into());
    }
    if next.features.block_issuer().is_none() {
        return Err(ValidationError::StakingBlockIssuerFeatureMissing { chain_id }.into());
    }
    Ok(())
}

/// AccountStateChange: (current, next) → {valid, invalid}
///
/// 1. immutable features are unchanged
/// 2. block issuer feature transition and mana lock (see [`block_issuer_state_change`])
/// 3. staking feature transition (see [`staking_state_change`])
/// 4. foundry counter grows by exactly the number of new foundries
/// 5. rewards are claimed iff the staking feature is removed
pub fn state_change(
    ws: &WorkingSet<'_>,
    input: &ChainInput<'_>,
    current: &AccountOutput,
    next: &AccountOutput,
) -> Result<()> {
    let chain_id = input.chain_id;
    let account_id = next.account_id;
    immutable_features_unchanged(chain_id, &current.immutable_features, &next.immutable_features)?;

    block_issuer_state_change(ws, input, account_id, current.features.block_issuer(), next)?;
    let staking = staking_state_change(ws, chain_id, current.features.staking(), next)?;
    foundry_counter_valid(ws, account_id, current.foundry_counter, next.foundry_counter)?;
    rewards_claim_valid(ws, chain_id, staking)
}

/// An implicit account becomes a real account with the ID derived from its
/// output. It is validated as a new account whose current block issuer
/// feature never expires and has no keys.
pub fn implicit_account_state_change(
    ws: &WorkingSet<'_>,
    input: &ChainInput<'_>,
    _current: &BasicOutput,
    next: &AccountOutput,
) -> Result<()> {
    let chain_id = input.chain_id;
    let account_id = next.account_id;
    genesis_valid(ws, chain_id, next)?;

    let virtual_block_issuer = BlockIssuerFeature {
        expiry_slot: MAX_SLOT,
        keys: Vec::new(),
    };
    block_issuer_state_change(ws, input, account_id, Some(&virtual_block_issuer), next)?;
    foundry_counter_valid(ws, account_id, 0, next.foundry_counter)?;
    rewards_claim_valid(ws, chain_id, StakingOutcome::Retained)
}

pub fn destroy(ws: &WorkingSet<'_>, input: &ChainInput<'_>, current: &AccountOutput) -> Result<()> {
    let chain_id = input.chain_id;
    let account_id = if current.account_id.is_empty() {
        AccountId::from_output_id(&input.output_id)
    } else {
        current.account_id
    };
    destruction_allowed(ws, chain_id, TransactionCapabilities::CAN_DESTROY_ACCOUNT_OUTPUTS)?;

    if let Some(block_issuer) = current.features.block_issuer() {
        let commitment = ws
            .commitment
            .ok_or(ValidationError::BlockIssuerCommitmentInputMissing { chain_id })?;
        if block_issuer.expiry_slot >= commitment.slot {
            return Err(ValidationError::BlockIssuerNotExpired {
                chain_id,
                expiry_slot: block_issuer.expiry_slot,
                commitment_slot: commitment.slot,
            }
            .into());
        }
        credits_unlocked(ws, account_id)?;
    }

    let staking = match current.features.staking() {
        Some(staking) => {
            let future_bounded_slot = ws
                .future_bounded_slot()
                .ok_or(ValidationError::StakingCommitmentInputMissing { chain_id })?;
            if ws.params.epoch_from_slot(future_bounded_slot) <= staking.end_epoch {
                return Err(ValidationError::StakingFeatureRemovedBeforeUnbonding { chain_id }.into());
            }
            StakingOutcome::Removed
        }
        None => StakingOutcome::Retained,
    };
    rewards_claim_valid(ws, chain_id, staking)
}

/// The account's block issuance credits must be known and non-negative.
fn credits_unlocked(ws: &WorkingSet<'_>, account_id: AccountId) -> Result<()> {
    let credits = *ws
        .bic
        .get(&account_id)
        .ok_or(ValidationError::BlockIssuanceCreditInputMissing { account_id })?;
    if credits < 0 {
        return Err(ValidationError::AccountLocked {
            account_id,
            credits,
        }
        .into());
    }
    Ok(())
}

/// Block issuer feature transition.
///
/// With a feature on either side the account must be credit-unlocked and a
/// commitment given. A feature not yet expired at the commitment slot may
/// not be removed, and a changed expiry must reach the past bounded slot;
/// a feature added after expiry (or absent before) must reach it as well.
/// Finally no mana may flow off the account (see [`mana_lock_valid`]).
fn block_issuer_state_change(
    ws: &WorkingSet<'_>,
    input: &ChainInput<'_>,
    account_id: AccountId,
    current: Option<&BlockIssuerFeature>,
    next: &AccountOutput,
) -> Result<()> {
    let chain_id = input.chain_id;
    let next_block_issuer = next.features.block_issuer();
    if current.is_none() && next_block_issuer.is_none() {
        return Ok(());
    }

    credits_unlocked(ws, account_id)?;
    let commitment = ws
        .commitment
        .ok_or(ValidationError::BlockIssuerCommitmentInputMissing { chain_id })?;
    let past_bounded_slot = ws.params.past_bounded_slot(commitment.slot);

    match current {
        Some(current) if current.expiry_slot >= commitment.slot => {
            let Some(next_block_issuer) = next_block_issuer else {
                return Err(ValidationError::BlockIssuerNotExpired {
                    chain_id,
                    expiry_slot: current.expiry_slot,
                    commitment_slot: commitment.slot,
                }
                .into());
            };
            if next_block_issuer.expiry_slot != current.expiry_slot
                && next_block_issuer.expiry_slot < past_bounded_slot
            {
                return Err(ValidationError::BlockIssuerExpiryTooEarly {
                    expiry_slot: next_block_issuer.expiry_slot,
                    past_bounded_slot,
                }
                .into());
            }
        }
        _ => {
            if let Some(next_block_issuer) = next_block_issuer {
                if next_block_issuer.expiry_slot < past_bounded_slot {
                    return Err(ValidationError::BlockIssuerExpiryTooEarly {
                        expiry_slot: next_block_issuer.expiry_slot,
                        past_bounded_slot,
                    }
                    .into());
                }
            }
        }
    }

    mana_lock_valid(ws, input, account_id, next, past_bounded_slot)
}

/// ManaLock: mana entering from elsewhere must cover mana leaving to elsewhere.
///
/// (manaIn − mana of this account input) ≥
///     (manaOut − mana of this account output − allotment to this account
///      − mana of outputs locked to this account until at least
///        past_bounded_slot + max_committable_age)
///
/// Every subtraction is checked; underflow rejects the transaction.
fn mana_lock_valid(
    ws: &WorkingSet<'_>,
    input: &ChainInput<'_>,
    account_id: AccountId,
    next: &AccountOutput,
    past_bounded_slot: SlotIndex,
) -> Result<()> {
    let consumed = ws.inputs[input.input_index].output;
    let account_in = input_mana(&input.output_id, consumed, ws.tx.creation_slot, ws.params)?;
    let mana_in = ws
        .total_mana_in
        .checked_sub(account_in)
        .ok_or(ValidationError::ManaUnderflow {
            context: "total mana in minus account input mana",
        })?;

    let lock_slot = past_bounded_slot.saturating_add(ws.params.max_committable_age);
    let mut locked: Mana = 0;
    for output in &ws.tx.outputs {
        if output.unlock_conditions().is_mana_locked_to(&account_id, lock_slot) {
            locked = locked
                .checked_add(Output::mana(output))
                .ok_or(ValidationError::ManaOverflow)?;
        }
    }

    let mana_out = ws
        .total_mana_out
        .checked_sub(next.mana)
        .and_then(|mana| mana.checked_sub(ws.tx.allotment_to(&account_id)))
        .and_then(|mana| mana.checked_sub(locked))
        .ok_or(ValidationError::ManaUnderflow {
            context: "total mana out minus account output, allotment and locked mana",
        })?;

    if mana_in < mana_out {
        return Err(ValidationError::ManaMovedOffBlockIssuerAccount {
            account_id,
            mana_in,
            mana_out,
        }
        .into());
    }
    Ok(())
}

/// Staking feature transition.
///
/// Active (future bounded epoch ≤ end epoch): the feature persists, only its
/// end epoch may change, and then to at least past bounded epoch + unbonding
/// period. Expired: dropping it or replacing it with a new valid feature
/// counts as removal.
pub fn staking_state_change(
    ws: &WorkingSet<'_>,
    chain_id: ChainId,
    current: Option<&StakingFeature>,
    next: &AccountOutput,
) -> Result<StakingOutcome> {
    let next_staking = next.features.staking();
    let Some(current) = current else {
        if let Some(staking) = next_staking {
            staking_genesis_valid(ws, chain_id, next, staking)?;
        }
        return Ok(StakingOutcome::Retained);
    };

    let commitment = ws
        .commitment
        .ok_or(ValidationError::StakingCommitmentInputMissing { chain_id })?;
    let future_bounded_epoch = ws
        .params
        .epoch_from_slot(ws.params.future_bounded_slot(commitment.slot));

    if future_bounded_epoch <= current.end_epoch {
        let Some(next_staking) = next_staking else {
            return Err(ValidationError::StakingFeatureRemovedBeforeUnbonding { chain_id }.into());
        };
        if next_staking.staked_amount != current.staked_amount
            || next_staking.fixed_cost != current.fixed_cost
            || next_staking.start_epoch != current.start_epoch
        {
            return Err(ValidationError::StakingFeatureModifiedBeforeUnbonding { chain_id }.into());
        }
        if next_staking.end_epoch != current.end_epoch {
            let past_bounded_epoch = ws
                .params
                .epoch_from_slot(ws.params.past_bounded_slot(commitment.slot));
            let minimum = past_bounded_epoch.saturating_add(ws.params.staking_unbonding_period);
            if next_staking.end_epoch < minimum {
                return Err(ValidationError::StakingEndEpochTooEarly {
                    end_epoch: next_staking.end_epoch,
                    minimum,
                }
                .into());
            }
        }
        return Ok(StakingOutcome::Retained);
    }

    match next_staking {
        None => Ok(StakingOutcome::Removed),
        Some(next_staking) if next_staking == current => Ok(StakingOutcome::Retained),
        Some(next_staking) => {
            staking_genesis_valid(ws, chain_id, next, next_staking)?;
            Ok(StakingOutcome::Removed)
        }
    }
}

/// Rewards are claimed exactly when the staking feature is removed.
fn rewards_claim_valid(ws: &WorkingSet<'_>, chain_id: ChainId, staking: StakingOutcome) -> Result<()> {
    let claiming = ws.rewards.contains_key(&chain_id);
    match (claiming, staking) {
        (true, StakingOutcome::Retained) => {
            Err(ValidationError::StakingRewardClaimingInvalid { chain_id }.into())
        }
        (false, StakingOutcome::Removed) => {
            Err(ValidationError::StakingRewardInputMissing { chain_id }.into())
        }
        _ => Ok(()),
    }
}

/// The counter grows by exactly the number of foundries this account creates.
fn foundry_counter_valid(ws: &WorkingSet<'_>, account_id: AccountId, current: u32, next: u32) -> Result<()> {
    let created = ws
        .out_chains
        .keys()
        .filter(|chain_id| {
            matches!(chain_id, ChainId::Foundry(foundry_id) if foundry_id.account_id == account_id)
                && !ws.in_chains.contains_key(chain_id)
        })
        .count() as u32;

    if next < current || next - current != created {
        return Err(ValidationError::AccountInvalidFoundryCounter {
            account_id,
            current,
            next,
            created,
        }
        .into());
    }
    Ok(())
}
