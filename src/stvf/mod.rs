//! Chain state transition validation
//!
//! Every chain touched by a transaction transitions exactly once: Genesis
//! (output side only), StateChange (both sides) or Destroy (input side only).
//! The dispatcher picks the transition from the working set's chain sets and
//! hands the records to the rules of their output kind.

pub mod account;
pub mod anchor;
pub mod delegation;
pub mod foundry;
pub mod nft;

use crate::error::{InvariantViolation, Result, ValidationError};
use crate::output::{ChainOutput, Features};
use crate::types::*;
use crate::working_set::{ChainInput, ChainOutputEntry, WorkingSet};

/// One chain's transition with the records it involves.
#[derive(Debug, Clone, Copy)]
pub enum ChainTransition<'a> {
    Genesis {
        next: ChainOutputEntry<'a>,
    },
    StateChange {
        current: ChainInput<'a>,
        next: ChainOutputEntry<'a>,
    },
    Destroy {
        current: ChainInput<'a>,
    },
}

impl ChainTransition<'_> {
    pub fn transition_type(&self) -> ChainTransitionType {
        match self {
            ChainTransition::Genesis { .. } => ChainTransitionType::Genesis,
            ChainTransition::StateChange { .. } => ChainTransitionType::StateChange,
            ChainTransition::Destroy { .. } => ChainTransitionType::Destroy,
        }
    }
}

/// Validate the transition of every chain in InChains ∪ OutChains.
///
/// Input-side chains are visited first in chain ID order, then chains that
/// only appear on the output side.
pub fn validate_chain_transitions(ws: &WorkingSet<'_>) -> Result<()> {
    for (chain_id, current) in &ws.in_chains {
        let transition = match ws.out_chains.get(chain_id) {
            Some(next) => ChainTransition::StateChange {
                current: *current,
                next: *next,
            },
            None => ChainTransition::Destroy { current: *current },
        };
        validate_chain_transition(ws, *chain_id, transition)?;
    }
    for (chain_id, next) in &ws.out_chains {
        if !ws.in_chains.contains_key(chain_id) {
            validate_chain_transition(ws, *chain_id, ChainTransition::Genesis { next: *next })?;
        }
    }
    Ok(())
}

/// ChainSTVF: dispatch one transition to the rules of its output kind.
pub fn validate_chain_transition(
    ws: &WorkingSet<'_>,
    chain_id: ChainId,
    transition: ChainTransition<'_>,
) -> Result<()> {
    tracing::trace!(
        chain = %chain_id,
        transition = ?transition.transition_type(),
        "validating chain transition"
    );
    let result = dispatch(ws, chain_id, transition);
    if let Err(err) = &result {
        if err.is_fatal() {
            tracing::warn!(chain = %chain_id, error = %err, "invariant violated during chain transition");
        }
    }
    result
}

fn dispatch(ws: &WorkingSet<'_>, chain_id: ChainId, transition: ChainTransition<'_>) -> Result<()> {
    match transition {
        ChainTransition::Genesis { next } => match next.output {
            ChainOutput::Account(next) => account::genesis(ws, chain_id, next),
            ChainOutput::ImplicitAccount(_) => {
                Err(InvariantViolation::ImplicitAccountOnOutputSide { chain_id }.into())
            }
            ChainOutput::Anchor(next) => anchor::genesis(ws, chain_id, next),
            ChainOutput::Foundry(output) => foundry::genesis(ws, &next, output),
            ChainOutput::Nft(next) => nft::genesis(ws, chain_id, next),
            ChainOutput::Delegation(next) => delegation::genesis(ws, chain_id, next),
        },
        ChainTransition::StateChange { current, next } => match (current.output, next.output) {
            (ChainOutput::Account(cur), ChainOutput::Account(nxt)) => {
                account::state_change(ws, &current, cur, nxt)
            }
            (ChainOutput::ImplicitAccount(cur), ChainOutput::Account(nxt)) => {
                account::implicit_account_state_change(ws, &current, cur, nxt)
            }
            (ChainOutput::Anchor(cur), ChainOutput::Anchor(nxt)) => {
                anchor::state_change(ws, chain_id, cur, nxt)
            }
            (ChainOutput::Foundry(cur), ChainOutput::Foundry(nxt)) => {
                foundry::state_change(ws, chain_id, cur, nxt)
            }
            (ChainOutput::Nft(cur), ChainOutput::Nft(nxt)) => nft::state_change(ws, chain_id, cur, nxt),
            (ChainOutput::Delegation(cur), ChainOutput::Delegation(nxt)) => {
                delegation::state_change(ws, chain_id, cur, nxt)
            }
            (_, ChainOutput::ImplicitAccount(_)) => {
                Err(InvariantViolation::ImplicitAccountOnOutputSide { chain_id }.into())
            }
            (cur, nxt) => Err(ValidationError::ChainOutputKindChanged {
                chain_id,
                from: cur.kind_name(),
                to: nxt.kind_name(),
            }
            .into()),
        },
        ChainTransition::Destroy { current } => match current.output {
            ChainOutput::Account(cur) => account::destroy(ws, &current, cur),
            ChainOutput::ImplicitAccount(_) => {
                Err(ValidationError::ImplicitAccountDestructionDisallowed { chain_id }.into())
            }
            ChainOutput::Anchor(_) => anchor::destroy(ws, chain_id),
            ChainOutput::Foundry(cur) => foundry::destroy(ws, chain_id, cur),
            ChainOutput::Nft(_) => nft::destroy(ws, chain_id),
            ChainOutput::Delegation(_) => delegation::destroy(ws, chain_id),
        },
    }
}

/// A declared issuer must have been unlocked by the transaction.
pub(crate) fn issuer_unlocked(ws: &WorkingSet<'_>, chain_id: ChainId, immutable_features: &Features) -> Result<()> {
    match immutable_features.issuer() {
        Some(issuer) if !ws.unlocked_addresses.contains(issuer.underlying()) => {
            Err(ValidationError::IssuerFeatureNotUnlocked { chain_id }.into())
        }
        _ => Ok(()),
    }
}

pub(crate) fn destruction_allowed(ws: &WorkingSet<'_>, chain_id: ChainId, capability: u8) -> Result<()> {
    if ws.tx.has_capability(capability) {
        Ok(())
    } else {
        Err(ValidationError::DestructionNotAllowed { chain_id }.into())
    }
}

pub(crate) fn immutable_features_unchanged(chain_id: ChainId, current: &Features, next: &Features) -> Result<()> {
    if current == next {
        Ok(())
    } else {
        Err(ValidationError::ImmutableFeaturesChanged { chain_id }.into())
    }
}

/// Declared chain ID of a genesis output must be the zero value.
pub(crate) fn zeroed_id(chain_id: ChainId, declared_empty: bool) -> Result<()> {
    if declared_empty {
        Ok(())
    } else {
        Err(ValidationError::NewChainOutputHasNonZeroedId { chain_id }.into())
    }
}
