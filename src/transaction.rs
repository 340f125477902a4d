//! Transactions, unlocks and syntactic transaction validation

use crate::address::Address;
use crate::config::ProtocolParameters;
use crate::constants::*;
use crate::economic::min_deposit;
use crate::error::{Result, ValidationError, VmError};
use crate::output::Output;
use crate::types::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Capability bits a transaction grants to its own execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCapabilities(pub u8);

impl TransactionCapabilities {
    pub const CAN_BURN_NATIVE_TOKENS: u8 = 1 << 0;
    pub const CAN_BURN_MANA: u8 = 1 << 1;
    pub const CAN_DESTROY_ACCOUNT_OUTPUTS: u8 = 1 << 2;
    pub const CAN_DESTROY_ANCHOR_OUTPUTS: u8 = 1 << 3;
    pub const CAN_DESTROY_FOUNDRY_OUTPUTS: u8 = 1 << 4;
    pub const CAN_DESTROY_NFT_OUTPUTS: u8 = 1 << 5;

    pub const ALL: Self = Self(0x3f);
    pub const NONE: Self = Self(0);

    pub fn has(&self, capability: u8) -> bool {
        self.0 & capability == capability
    }

    pub fn with(self, capability: u8) -> Self {
        Self(self.0 | capability)
    }
}

/// Inputs that are read but not consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextInput {
    Commitment,
    BlockIssuanceCredit { account_id: AccountId },
    /// Claims the rewards of the chain consumed by input `input_index`
    Reward { input_index: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allotment {
    pub account_id: AccountId,
    pub mana: Mana,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedData {
    pub tag: ByteString,
    pub data: ByteString,
}

/// Transaction essence plus the outputs it produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub network_id: u64,
    pub creation_slot: SlotIndex,
    pub context_inputs: Vec<ContextInput>,
    pub inputs: Vec<OutputId>,
    pub allotments: Vec<Allotment>,
    pub capabilities: TransactionCapabilities,
    pub payload: Option<TaggedData>,
    pub outputs: Vec<Output>,
}

impl Transaction {
    /// Message every signature unlock signs: SHA-256 of the canonical JSON form.
    pub fn signing_message(&self) -> Result<Hash> {
        let bytes = serde_json::to_vec(self).map_err(|e| VmError::Serialization(e.to_string()))?;
        Ok(Sha256::digest(&bytes).into())
    }

    pub fn id(&self) -> Result<TransactionId> {
        Ok(TransactionId::new(self.signing_message()?, self.creation_slot))
    }

    pub fn has_capability(&self, capability: u8) -> bool {
        self.capabilities.has(capability)
    }

    pub fn has_commitment_input(&self) -> bool {
        self.context_inputs
            .iter()
            .any(|input| matches!(input, ContextInput::Commitment))
    }

    /// Mana allotted to `account_id`; zero when there is none.
    pub fn allotment_to(&self, account_id: &AccountId) -> Mana {
        self.allotments
            .iter()
            .find(|allotment| allotment.account_id == *account_id)
            .map_or(0, |allotment| allotment.mana)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureUnlock {
    /// Compressed secp256k1 public key
    pub public_key: ByteString,
    /// Compact ECDSA signature
    pub signature: ByteString,
}

/// Proof of authorization for one input. Index-carrying variants point at an
/// earlier input of the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unlock {
    Signature(SignatureUnlock),
    Reference(u16),
    Account(u16),
    Anchor(u16),
    Nft(u16),
    Multi(Vec<Unlock>),
    /// Placeholder for a multi address member that does not sign
    Empty,
}

impl Unlock {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Unlock::Signature(_) => "signature",
            Unlock::Reference(_) => "reference",
            Unlock::Account(_) => "account",
            Unlock::Anchor(_) => "anchor",
            Unlock::Nft(_) => "nft",
            Unlock::Multi(_) => "multi",
            Unlock::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub unlocks: Vec<Unlock>,
}

/// CheckTransaction: 𝒯𝒳 × 𝒰* → {valid, invalid}
///
/// A transaction is syntactically valid if and only if:
/// 1. 1 ≤ |inputs| ≤ MAX_INPUTS ∧ 1 ≤ |outputs| ≤ MAX_OUTPUTS ∧ |allotments| ≤ MAX_ALLOTMENTS
/// 2. inputs are pairwise distinct, allotments name distinct accounts
/// 3. network_id matches and |unlocks| = |inputs|
/// 4. context inputs are well formed (see [`check_context_inputs`])
/// 5. every output is well formed (see [`check_outputs`])
pub fn check_transaction(
    tx: &Transaction,
    unlocks: &[Unlock],
    params: &ProtocolParameters,
) -> Result<()> {
    if tx.inputs.is_empty() || tx.inputs.len() > MAX_INPUTS {
        return Err(ValidationError::InputCount {
            count: tx.inputs.len(),
            max: MAX_INPUTS,
        }
        .into());
    }
    if tx.outputs.is_empty() || tx.outputs.len() > MAX_OUTPUTS {
        return Err(ValidationError::OutputCount {
            count: tx.outputs.len(),
            max: MAX_OUTPUTS,
        }
        .into());
    }
    if tx.allotments.len() > MAX_ALLOTMENTS {
        return Err(ValidationError::AllotmentCount {
            count: tx.allotments.len(),
        }
        .into());
    }

    let mut seen_inputs = HashSet::with_capacity(tx.inputs.len());
    for output_id in &tx.inputs {
        if !seen_inputs.insert(output_id) {
            return Err(ValidationError::DuplicateInput {
                output_id: *output_id,
            }
            .into());
        }
    }

    let mut seen_allotments = HashSet::with_capacity(tx.allotments.len());
    for allotment in &tx.allotments {
        if !seen_allotments.insert(allotment.account_id) {
            return Err(ValidationError::DuplicateAllotment {
                account_id: allotment.account_id,
            }
            .into());
        }
    }

    if tx.network_id != params.network_id {
        return Err(ValidationError::NetworkIdMismatch {
            expected: params.network_id,
            actual: tx.network_id,
        }
        .into());
    }

    if unlocks.len() != tx.inputs.len() {
        return Err(ValidationError::UnlockCountMismatch {
            inputs: tx.inputs.len(),
            unlocks: unlocks.len(),
        }
        .into());
    }

    check_context_inputs(tx)?;
    check_outputs(tx, params)
}

/// At most one commitment; credit and reward inputs only alongside one;
/// reward indices in range and unique; credit accounts unique.
fn check_context_inputs(tx: &Transaction) -> Result<()> {
    if tx.context_inputs.len() > MAX_CONTEXT_INPUTS {
        return Err(ValidationError::ContextInputCount {
            count: tx.context_inputs.len(),
        }
        .into());
    }

    let mut commitments = 0usize;
    let mut needs_commitment = false;
    let mut reward_indices = HashSet::new();
    let mut credit_accounts = HashSet::new();

    for input in &tx.context_inputs {
        match input {
            ContextInput::Commitment => commitments += 1,
            ContextInput::BlockIssuanceCredit { account_id } => {
                needs_commitment = true;
                if !credit_accounts.insert(*account_id) {
                    return Err(ValidationError::DuplicateBlockIssuanceCreditInput {
                        account_id: *account_id,
                    }
                    .into());
                }
            }
            ContextInput::Reward { input_index } => {
                needs_commitment = true;
                if *input_index as usize >= tx.inputs.len() {
                    return Err(ValidationError::RewardInputIndexOutOfRange {
                        index: *input_index,
                        inputs: tx.inputs.len(),
                    }
                    .into());
                }
                if !reward_indices.insert(*input_index) {
                    return Err(ValidationError::DuplicateRewardInput {
                        index: *input_index,
                    }
                    .into());
                }
            }
        }
    }

    if commitments > 1 {
        return Err(ValidationError::MultipleCommitmentInputs.into());
    }
    if needs_commitment && commitments == 0 {
        return Err(ValidationError::CommitmentInputRequired.into());
    }
    Ok(())
}

fn check_outputs(tx: &Transaction, params: &ProtocolParameters) -> Result<()> {
    let mut total: BaseToken = 0;

    for (output_index, output) in tx.outputs.iter().enumerate() {
        let amount = output.amount();
        if amount == 0 {
            return Err(ValidationError::OutputAmountZero { output_index }.into());
        }
        let required = min_deposit(output, params)?;
        if amount < required {
            return Err(ValidationError::StorageDepositNotCovered {
                output_index,
                amount,
                min_deposit: required,
            }
            .into());
        }
        total = total
            .checked_add(amount)
            .filter(|sum| *sum <= params.token_supply)
            .ok_or(ValidationError::TokenSupplyExceeded {
                supply: params.token_supply,
            })?;

        if let Some(native_token) = output.native_token() {
            if native_token.amount.is_zero() {
                return Err(ValidationError::NativeTokenAmountZero { output_index }.into());
            }
        }

        match output {
            Output::Foundry(foundry) => {
                foundry.token_scheme.syntactic_check().map_err(|reason| {
                    ValidationError::TokenSchemeSyntaxInvalid {
                        output_index,
                        reason,
                    }
                })?;
            }
            Output::Account(account) => {
                if let Some(block_issuer) = account.features.block_issuer() {
                    let count = block_issuer.keys.len();
                    if count == 0 || count > MAX_BLOCK_ISSUER_KEYS {
                        return Err(ValidationError::BlockIssuerKeyCount { output_index, count }.into());
                    }
                }
                if let Some(staking) = account.features.staking() {
                    if staking.staked_amount > account.amount {
                        return Err(ValidationError::StakedAmountExceedsAmount {
                            output_index,
                            staked: staking.staked_amount,
                            amount: account.amount,
                        }
                        .into());
                    }
                }
            }
            Output::Delegation(delegation) => {
                if delegation.validator_address.is_empty() {
                    return Err(ValidationError::DelegationValidatorEmpty { output_index }.into());
                }
            }
            Output::Basic(_) | Output::Anchor(_) | Output::Nft(_) => {}
        }

        check_multi_owners(output_index, output)?;
        check_restricted_owners(output_index, output)?;
        check_implicit_account_creation_addresses(output_index, output)?;
    }
    Ok(())
}

/// A multi address needs 1..=MAX_MULTI_ADDRESS_MEMBERS members with
/// non-zero weights and a threshold their total weight can reach.
fn check_multi_owners(output_index: usize, output: &Output) -> Result<()> {
    for owner in output.owning_addresses() {
        let Address::Multi(multi) = owner.underlying() else {
            continue;
        };
        let invalid = |reason: &'static str| -> Result<()> {
            Err(ValidationError::MultiAddressInvalid { output_index, reason }.into())
        };
        if multi.addresses.is_empty() || multi.addresses.len() > MAX_MULTI_ADDRESS_MEMBERS {
            return invalid("member count out of range");
        }
        if multi.addresses.iter().any(|member| member.weight == 0) {
            return invalid("zero weight member");
        }
        let total: u32 = multi.addresses.iter().map(|member| u32::from(member.weight)).sum();
        if multi.threshold == 0 || u32::from(multi.threshold) > total {
            return invalid("threshold unreachable");
        }
    }
    Ok(())
}

/// Capabilities an output requires from a restricted owning address.
fn required_capabilities(output: &Output) -> Vec<u16> {
    use crate::address::AddressCapabilities as Caps;

    let mut required = Vec::new();
    if output.mana() > 0 {
        required.push(Caps::CAN_RECEIVE_MANA);
    }
    if output.native_token().is_some() {
        required.push(Caps::CAN_RECEIVE_NATIVE_TOKENS);
    }
    let conditions = output.unlock_conditions();
    if conditions.timelock().is_some() {
        required.push(Caps::CAN_RECEIVE_OUTPUTS_WITH_TIMELOCK);
    }
    if conditions.expiration().is_some() {
        required.push(Caps::CAN_RECEIVE_OUTPUTS_WITH_EXPIRATION);
    }
    if conditions.storage_deposit_return().is_some() {
        required.push(Caps::CAN_RECEIVE_OUTPUTS_WITH_STORAGE_DEPOSIT_RETURN);
    }
    match output {
        Output::Account(_) => required.push(Caps::CAN_RECEIVE_ACCOUNT_OUTPUTS),
        Output::Anchor(_) => required.push(Caps::CAN_RECEIVE_ANCHOR_OUTPUTS),
        Output::Nft(_) => required.push(Caps::CAN_RECEIVE_NFT_OUTPUTS),
        Output::Delegation(_) => required.push(Caps::CAN_RECEIVE_DELEGATION_OUTPUTS),
        Output::Basic(_) | Output::Foundry(_) => {}
    }
    required
}

fn check_restricted_owners(output_index: usize, output: &Output) -> Result<()> {
    let required = required_capabilities(output);
    for owner in output.owning_addresses() {
        if !matches!(owner, Address::Restricted(_)) {
            continue;
        }
        let capabilities = owner.capabilities();
        if let Some(missing) = required.iter().find(|cap| !capabilities.has(**cap)) {
            return Err(ValidationError::RestrictedAddressCapabilityMissing {
                output_index,
                capability: crate::address::AddressCapabilities::name(*missing),
            }
            .into());
        }
    }
    Ok(())
}

/// Implicit account creation addresses may only own a plain basic output:
/// direct address unlock condition, no timelock, expiration or return.
fn check_implicit_account_creation_addresses(output_index: usize, output: &Output) -> Result<()> {
    let conditions = output.unlock_conditions();
    let invalid = ValidationError::ImplicitAccountCreationAddressInvalid { output_index };

    let return_addresses = conditions
        .storage_deposit_return()
        .map(|sdr| &sdr.return_address)
        .into_iter()
        .chain(conditions.expiration().map(|exp| &exp.return_address));
    let mut others = return_addresses
        .chain(conditions.state_controller())
        .chain(conditions.governor());
    if others.any(Address::is_implicit_account_creation) {
        return Err(invalid.into());
    }

    let Some(address) = conditions.address() else {
        return Ok(());
    };
    if !address.is_implicit_account_creation() {
        return Ok(());
    }
    let plain = matches!(output, Output::Basic(_))
        && matches!(address, Address::ImplicitAccountCreation(_))
        && conditions.timelock().is_none()
        && conditions.expiration().is_none()
        && conditions.storage_deposit_return().is_none();
    if plain {
        Ok(())
    } else {
        Err(invalid.into())
    }
}
