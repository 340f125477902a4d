//! Foundry transitions
//!
//! A foundry is born from its owning account's counter and afterwards only
//! mints and melts under its token scheme.

use super::{destruction_allowed, immutable_features_unchanged};
use crate::error::{InvariantViolation, Result, ValidationError};
use crate::output::{ChainOutput, FoundryOutput};
use crate::transaction::TransactionCapabilities;
use crate::types::*;
use crate::working_set::{ChainOutputEntry, WorkingSet};
use primitive_types::U256;

fn foundry_id_of(foundry: &FoundryOutput) -> Result<FoundryId> {
    foundry.foundry_id().ok_or_else(|| {
        InvariantViolation::MissingUnlockCondition {
            output_kind: "foundry",
            condition: "immutable account address",
        }
        .into()
    })
}

/// FoundryGenesis: 𝒪_foundry → {valid, invalid}
///
/// 1. minted tokens equal the output side's holdings of the new token
/// 2. the owning account transitions within the same transaction
/// 3. in.foundry_counter < serial ≤ out.foundry_counter
/// 4. new foundries of the same account appear in ascending serial order
pub fn genesis(ws: &WorkingSet<'_>, entry: &ChainOutputEntry<'_>, next: &FoundryOutput) -> Result<()> {
    let foundry_id = foundry_id_of(next)?;
    next.token_scheme.state_transition(
        ChainTransitionType::Genesis,
        None,
        U256::zero(),
        ws.native_token_out(&foundry_id),
    )?;

    let account_id = foundry_id.account_id;
    let account = ChainId::Account(account_id);
    let (Some(account_in), Some(account_out)) = (ws.in_chains.get(&account), ws.out_chains.get(&account)) else {
        return Err(ValidationError::FoundryTransitionWithoutAccount { foundry_id }.into());
    };

    let start = match account_in.output {
        ChainOutput::Account(account) => account.foundry_counter,
        ChainOutput::ImplicitAccount(_) => 0,
        _ => return Err(InvariantViolation::FoundryOwnerNotAccount { account_id }.into()),
    };
    let end = match account_out.output {
        ChainOutput::Account(account) => account.foundry_counter,
        _ => return Err(InvariantViolation::FoundryOwnerNotAccount { account_id }.into()),
    };

    let serial_number = next.serial_number;
    if serial_number <= start || serial_number > end {
        return Err(ValidationError::FoundrySerialInvalid {
            serial_number,
            start,
            end,
        }
        .into());
    }

    for (chain_id, other) in &ws.out_chains {
        let ChainId::Foundry(other_id) = chain_id else {
            continue;
        };
        if other_id.account_id != account_id
            || ws.in_chains.contains_key(chain_id)
            || other.output_index >= entry.output_index
        {
            continue;
        }
        if other_id.serial_number >= serial_number {
            return Err(ValidationError::FoundrySerialNotAscending {
                serial_number,
                preceding: other_id.serial_number,
            }
            .into());
        }
    }
    Ok(())
}

pub fn state_change(
    ws: &WorkingSet<'_>,
    chain_id: ChainId,
    current: &FoundryOutput,
    next: &FoundryOutput,
) -> Result<()> {
    immutable_features_unchanged(chain_id, &current.immutable_features, &next.immutable_features)?;

    let current_id = foundry_id_of(current)?;
    let next_id = foundry_id_of(next)?;
    if current_id != next_id {
        return Err(InvariantViolation::FoundryIdMismatch {
            current: current_id,
            next: next_id,
        }
        .into());
    }

    current.token_scheme.state_transition(
        ChainTransitionType::StateChange,
        Some(&next.token_scheme),
        ws.native_token_in(&current_id),
        ws.native_token_out(&current_id),
    )
}

pub fn destroy(ws: &WorkingSet<'_>, chain_id: ChainId, current: &FoundryOutput) -> Result<()> {
    destruction_allowed(ws, chain_id, TransactionCapabilities::CAN_DESTROY_FOUNDRY_OUTPUTS)?;
    let foundry_id = foundry_id_of(current)?;
    current.token_scheme.state_transition(
        ChainTransitionType::Destroy,
        None,
        ws.native_token_in(&foundry_id),
        ws.native_token_out(&foundry_id),
    )
}
