//! Execution pipeline: ordered whole-transaction checks over a working set
//!
//! Each step is a pure function of the [`WorkingSet`]; the first failing
//! step rejects the transaction.

use crate::address::{Address, AddressKey};
use crate::error::{Result, ValidationError};
use crate::output::Output;
use crate::stvf::validate_chain_transitions;
use crate::transaction::TransactionCapabilities;
use crate::types::*;
use crate::working_set::WorkingSet;
use std::collections::{BTreeMap, BTreeSet};

/// A single pipeline step.
pub type ExecFunc = fn(&WorkingSet<'_>) -> Result<()>;

/// A named pipeline step.
#[derive(Clone, Copy)]
pub struct ExecStep {
    pub name: &'static str,
    pub func: ExecFunc,
}

impl std::fmt::Debug for ExecStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecStep").field("name", &self.name).finish()
    }
}

/// The ledger's pipeline. Chain transitions run after the totals are known
/// and before the mana balance.
pub const DEFAULT_EXEC_LIST: &[ExecStep] = &[
    ExecStep { name: "timelocks", func: exec_timelocks },
    ExecStep { name: "sender unlocked", func: exec_sender_unlocked },
    ExecStep { name: "balanced base tokens", func: exec_balanced_base_tokens },
    ExecStep { name: "balanced native tokens", func: exec_balanced_native_tokens },
    ExecStep { name: "chain transitions", func: exec_chain_transitions },
    ExecStep { name: "balanced mana", func: exec_balanced_mana },
    ExecStep { name: "implicit account creation addresses", func: exec_single_implicit_account_creation_address },
];

/// Run `steps` in order, stopping at the first failure.
pub fn run_exec_list(ws: &WorkingSet<'_>, steps: &[ExecStep]) -> Result<()> {
    for step in steps {
        tracing::debug!(step = step.name, "running execution step");
        if let Err(err) = (step.func)(ws) {
            tracing::debug!(step = step.name, error = %err, "execution step failed");
            return Err(err);
        }
    }
    Ok(())
}

/// Every timelocked input must be unlockable at the future bounded slot.
pub fn exec_timelocks(ws: &WorkingSet<'_>) -> Result<()> {
    for (input_index, input) in ws.inputs.iter().enumerate() {
        let Some(timelock) = input.output.unlock_conditions().timelock() else {
            continue;
        };
        let future_bounded_slot = ws
            .future_bounded_slot()
            .ok_or(ValidationError::TimelockCommitmentInputMissing { input_index })?;
        if timelock.slot > future_bounded_slot {
            return Err(ValidationError::TimelockNotExpired {
                input_index,
                timelock_slot: timelock.slot,
                future_bounded_slot,
            }
            .into());
        }
    }
    Ok(())
}

/// Every sender feature on an output names an unlocked address.
pub fn exec_sender_unlocked(ws: &WorkingSet<'_>) -> Result<()> {
    for (output_index, output) in ws.tx.outputs.iter().enumerate() {
        if let Some(sender) = output.features().sender() {
            if !ws.unlocked_addresses.contains(sender.underlying()) {
                return Err(ValidationError::SenderFeatureNotUnlocked { output_index }.into());
            }
        }
    }
    Ok(())
}

/// Σ input amounts = Σ output amounts, and every storage deposit return owed
/// to an address that did not sign is paid by plain basic outputs.
pub fn exec_balanced_base_tokens(ws: &WorkingSet<'_>) -> Result<()> {
    let mut input_sum: BaseToken = 0;
    let mut owed: BTreeMap<AddressKey, BaseToken> = BTreeMap::new();
    for input in &ws.inputs {
        input_sum = input_sum
            .checked_add(input.output.amount())
            .ok_or(ValidationError::BaseTokenOverflow)?;

        let Some(sdr) = input.output.unlock_conditions().storage_deposit_return() else {
            continue;
        };
        if ws.unlocked_addresses.contains(sdr.return_address.underlying()) {
            continue;
        }
        let entry = owed.entry(sdr.return_address.key()).or_default();
        *entry = entry
            .checked_add(sdr.amount)
            .ok_or(ValidationError::BaseTokenOverflow)?;
    }

    let mut output_sum: BaseToken = 0;
    let mut returned: BTreeMap<AddressKey, BaseToken> = BTreeMap::new();
    for output in &ws.tx.outputs {
        output_sum = output_sum
            .checked_add(output.amount())
            .ok_or(ValidationError::BaseTokenOverflow)?;

        if let Output::Basic(basic) = output {
            if !basic.is_simple_transfer() {
                continue;
            }
            if let Some(address) = basic.unlock_conditions.address() {
                let entry = returned.entry(address.key()).or_default();
                *entry = entry
                    .checked_add(basic.amount)
                    .ok_or(ValidationError::BaseTokenOverflow)?;
            }
        }
    }

    if input_sum != output_sum {
        return Err(ValidationError::BaseTokenSumUnbalanced {
            input: input_sum,
            output: output_sum,
        }
        .into());
    }

    for (key, required) in &owed {
        let paid = returned.get(key).copied().unwrap_or(0);
        if paid < *required {
            return Err(ValidationError::ReturnAmountNotFulfilled {
                required: *required,
                returned: paid,
            }
            .into());
        }
    }
    Ok(())
}

/// Native tokens balance per ID unless their foundry transitions (its token
/// scheme accounts for the delta) or burning is allowed (out ≤ in).
pub fn exec_balanced_native_tokens(ws: &WorkingSet<'_>) -> Result<()> {
    let can_burn = ws
        .tx
        .has_capability(TransactionCapabilities::CAN_BURN_NATIVE_TOKENS);

    let ids: BTreeSet<&NativeTokenId> = ws
        .in_native_tokens
        .keys()
        .chain(ws.out_native_tokens.keys())
        .collect();

    for id in ids {
        let foundry = ChainId::Foundry(*id);
        if ws.in_chains.contains_key(&foundry) || ws.out_chains.contains_key(&foundry) {
            continue;
        }
        let input = ws.native_token_in(id);
        let output = ws.native_token_out(id);
        let balanced = if can_burn { output <= input } else { output == input };
        if !balanced {
            return Err(ValidationError::NativeTokenSumUnbalanced {
                native_token_id: *id,
                input,
                output,
            }
            .into());
        }
    }
    Ok(())
}

pub fn exec_chain_transitions(ws: &WorkingSet<'_>) -> Result<()> {
    validate_chain_transitions(ws)
}

/// Total mana in equals total mana out, or exceeds it when burning is allowed.
pub fn exec_balanced_mana(ws: &WorkingSet<'_>) -> Result<()> {
    let mana_in = ws.total_mana_in;
    let mana_out = ws.total_mana_out;
    let balanced = if ws.tx.has_capability(TransactionCapabilities::CAN_BURN_MANA) {
        mana_in >= mana_out
    } else {
        mana_in == mana_out
    };
    if !balanced {
        return Err(ValidationError::InputOutputManaMismatch { mana_in, mana_out }.into());
    }
    Ok(())
}

/// Inputs may be owned by at most one distinct implicit account creation address.
pub fn exec_single_implicit_account_creation_address(ws: &WorkingSet<'_>) -> Result<()> {
    let implicit: BTreeSet<AddressKey> = ws
        .inputs
        .iter()
        .filter_map(|input| input.output.unlock_conditions().address())
        .map(Address::underlying)
        .filter(|address| address.is_implicit_account_creation())
        .map(Address::key)
        .collect();
    if implicit.len() > 1 {
        return Err(ValidationError::MultipleImplicitAccountCreationAddresses.into());
    }
    Ok(())
}
