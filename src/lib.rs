//! # ledger-vm
//!
//! Transaction validation for a UTXO ledger with stateful chain outputs.
//!
//! A transaction consumes outputs and produces new ones. Validating it means
//! proving every consumed output is authorized, that base tokens, native
//! tokens and mana balance, and that every chain (account, anchor, foundry,
//! NFT, delegation) touched by the transaction transitions legally.
//!
//! ## Architecture
//!
//! Validation runs in four stages:
//! - Syntactic check ([`transaction::check_transaction`]): shape and bounds, no ledger state
//! - Working set ([`working_set::WorkingSet`]): inputs resolved, chains and totals derived
//! - Unlock validation ([`unlock::validate_unlocks`]): who signed for what
//! - Execution ([`execution`]): ordered whole-transaction checks, including
//!   the chain state transitions in [`stvf`]
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: validation reads its inputs and returns a verdict, nothing else
//! 2. **Deterministic**: chains are visited in a fixed order, all arithmetic is checked
//! 3. **Exact Version Pinning**: all consensus-critical dependencies pinned to exact versions
//! 4. **Bugs Are Not Rejections**: broken invariants surface as [`InvariantViolation`]
//!
//! ## Usage
//!
//! ```rust
//! use ledger_vm::VirtualMachine;
//! use ledger_vm::config::ProtocolParameters;
//! use ledger_vm::error::ValidationError;
//! use ledger_vm::transaction::{SignedTransaction, Transaction};
//! use ledger_vm::working_set::ResolvedInputs;
//!
//! let vm = VirtualMachine::new(ProtocolParameters::default()).unwrap();
//! let signed = SignedTransaction {
//!     transaction: Transaction {
//!         network_id: vm.params().network_id,
//!         creation_slot: 1000,
//!         context_inputs: vec![],
//!         inputs: vec![],
//!         allotments: vec![],
//!         capabilities: Default::default(),
//!         payload: None,
//!         outputs: vec![],
//!     },
//!     unlocks: vec![],
//! };
//!
//! let err = vm.validate(&signed, &ResolvedInputs::default()).unwrap_err();
//! assert!(matches!(err.validation(), Some(ValidationError::InputCount { count: 0, .. })));
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod config;
pub mod address;
pub mod token_scheme;
pub mod output;
pub mod transaction;
pub mod economic;
pub mod working_set;
pub mod unlock;
pub mod execution;
pub mod stvf;
pub mod signing;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use address::Address;
pub use config::ProtocolParameters;
pub use error::{InvariantViolation, Result, ValidationError, VmError};
pub use execution::{ExecStep, DEFAULT_EXEC_LIST};
pub use output::Output;
pub use transaction::{SignedTransaction, Transaction, Unlock};
pub use working_set::{ResolvedInputs, UnlockedAddresses, WorkingSet};

/// Outcome of a successful validation: what the transaction adds to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTransaction {
    pub transaction_id: TransactionId,
    /// Produced outputs with their IDs, in transaction order
    pub outputs: Vec<(OutputId, Output)>,
    pub unlocked_addresses: UnlockedAddresses,
    pub mana_in: Mana,
    pub mana_out: Mana,
}

/// Transaction validator bound to one set of protocol parameters.
///
/// # Examples
///
/// ```
/// use ledger_vm::{ProtocolParameters, VirtualMachine};
///
/// let vm = VirtualMachine::new(ProtocolParameters::default()).unwrap();
/// assert_eq!(vm.params().min_committable_age, 10);
///
/// let broken = ProtocolParameters {
///     slots_per_epoch_exponent: 32,
///     ..ProtocolParameters::default()
/// };
/// assert!(VirtualMachine::new(broken).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct VirtualMachine {
    params: ProtocolParameters,
}

impl VirtualMachine {
    /// Bind a validator to `params`, which must pass
    /// [`ProtocolParameters::validate`].
    pub fn new(params: ProtocolParameters) -> anyhow::Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ProtocolParameters {
        &self.params
    }

    /// Authorize every input of `ws` (see [`unlock::validate_unlocks`]).
    pub fn validate_unlocks(&self, ws: &WorkingSet<'_>) -> Result<UnlockedAddresses> {
        unlock::validate_unlocks(ws)
    }

    /// Run `steps` over a working set whose unlocks are already validated.
    pub fn execute(&self, ws: &WorkingSet<'_>, steps: &[ExecStep]) -> Result<()> {
        execution::run_exec_list(ws, steps)
    }

    /// Validate a signed transaction against the state resolved for it,
    /// running the default execution pipeline.
    pub fn validate(
        &self,
        signed: &SignedTransaction,
        resolved: &ResolvedInputs,
    ) -> Result<ValidatedTransaction> {
        self.validate_with(signed, resolved, DEFAULT_EXEC_LIST)
    }

    /// Validate with a caller-chosen execution pipeline.
    pub fn validate_with(
        &self,
        signed: &SignedTransaction,
        resolved: &ResolvedInputs,
        steps: &[ExecStep],
    ) -> Result<ValidatedTransaction> {
        let result = self.run(signed, resolved, steps);
        match &result {
            Ok(validated) => tracing::debug!(
                tx = %validated.transaction_id,
                outputs = validated.outputs.len(),
                "transaction accepted"
            ),
            Err(err) if err.is_fatal() => {
                tracing::warn!(error = %err, "transaction validation hit an invariant violation")
            }
            Err(err) => tracing::debug!(error = %err, "transaction rejected"),
        }
        result
    }

    fn run(
        &self,
        signed: &SignedTransaction,
        resolved: &ResolvedInputs,
        steps: &[ExecStep],
    ) -> Result<ValidatedTransaction> {
        let tx = &signed.transaction;
        transaction::check_transaction(tx, &signed.unlocks, &self.params)?;

        let mut ws = WorkingSet::new(&self.params, tx, &signed.unlocks, resolved)?;
        ws.unlocked_addresses = self.validate_unlocks(&ws)?;
        self.execute(&ws, steps)?;

        let outputs = tx
            .outputs
            .iter()
            .enumerate()
            .map(|(index, output)| (OutputId::new(ws.tx_id, index as OutputIndex), output.clone()))
            .collect();
        Ok(ValidatedTransaction {
            transaction_id: ws.tx_id,
            outputs,
            unlocked_addresses: ws.unlocked_addresses,
            mana_in: ws.total_mana_in,
            mana_out: ws.total_mana_out,
        })
    }
}
