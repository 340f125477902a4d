//! Error types for transaction validation
//!
//! [`ValidationError`] is the closed set of rule violations a transaction can
//! be rejected for. [`InvariantViolation`] covers states that syntactic
//! validation rules out; reaching one is a bug, not bad input.

use crate::types::*;
use primitive_types::U256;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    // ------------------------------------------------------------------
    // syntax
    // ------------------------------------------------------------------
    #[error("input count {count} outside 1..={max}")]
    InputCount { count: usize, max: usize },

    #[error("output count {count} outside 1..={max}")]
    OutputCount { count: usize, max: usize },

    #[error("too many allotments: {count}")]
    AllotmentCount { count: usize },

    #[error("too many context inputs: {count}")]
    ContextInputCount { count: usize },

    #[error("input {output_id} is consumed twice")]
    DuplicateInput { output_id: OutputId },

    #[error("account {account_id} receives more than one allotment")]
    DuplicateAllotment { account_id: AccountId },

    #[error("network id mismatch: expected {expected}, got {actual}")]
    NetworkIdMismatch { expected: u64, actual: u64 },

    #[error("{unlocks} unlocks for {inputs} inputs")]
    UnlockCountMismatch { inputs: usize, unlocks: usize },

    #[error("more than one commitment context input")]
    MultipleCommitmentInputs,

    #[error("block issuance credit and reward inputs require a commitment input")]
    CommitmentInputRequired,

    #[error("reward input references input {index} but there are {inputs} inputs")]
    RewardInputIndexOutOfRange { index: u16, inputs: usize },

    #[error("reward input for input {index} given twice")]
    DuplicateRewardInput { index: u16 },

    #[error("block issuance credit input for {account_id} given twice")]
    DuplicateBlockIssuanceCreditInput { account_id: AccountId },

    #[error("output {output_index} has zero amount")]
    OutputAmountZero { output_index: usize },

    #[error("output {output_index} holds {amount} but needs a deposit of {min_deposit}")]
    StorageDepositNotCovered {
        output_index: usize,
        amount: BaseToken,
        min_deposit: BaseToken,
    },

    #[error("outputs exceed the token supply of {supply}")]
    TokenSupplyExceeded { supply: BaseToken },

    #[error("output {output_index} carries a zero native token amount")]
    NativeTokenAmountZero { output_index: usize },

    #[error("output {output_index} has an invalid token scheme: {reason}")]
    TokenSchemeSyntaxInvalid {
        output_index: usize,
        reason: &'static str,
    },

    #[error("output {output_index} stakes {staked} but only holds {amount}")]
    StakedAmountExceedsAmount {
        output_index: usize,
        staked: BaseToken,
        amount: BaseToken,
    },

    #[error("delegation output {output_index} has an empty validator address")]
    DelegationValidatorEmpty { output_index: usize },

    #[error("output {output_index} is owned by a restricted address lacking the {capability} capability")]
    RestrictedAddressCapabilityMissing {
        output_index: usize,
        capability: &'static str,
    },

    #[error("output {output_index} uses an implicit account creation address where it is not allowed")]
    ImplicitAccountCreationAddressInvalid { output_index: usize },

    #[error("output {output_index} is owned by a malformed multi address: {reason}")]
    MultiAddressInvalid {
        output_index: usize,
        reason: &'static str,
    },

    #[error("output {output_index} has {count} block issuer keys")]
    BlockIssuerKeyCount { output_index: usize, count: usize },

    // ------------------------------------------------------------------
    // working set
    // ------------------------------------------------------------------
    #[error("input {input_index} ({output_id}) was not resolved")]
    InputNotResolved {
        input_index: usize,
        output_id: OutputId,
    },

    #[error("input {input_index} was created in slot {creation_slot}, after the transaction's slot {tx_slot}")]
    InputCreationAfterTxCreation {
        input_index: usize,
        creation_slot: SlotIndex,
        tx_slot: SlotIndex,
    },

    #[error("{chain_id} appears more than once on the output side")]
    DuplicateChainOutput { chain_id: ChainId },

    #[error("reward claimed for {chain_id}, which is not a consumed account or delegation")]
    RewardInputReferenceInvalid { chain_id: ChainId },

    #[error("reward input references input {input_index}, which is not a chain")]
    RewardInputNotChain { input_index: u16 },

    #[error("reward resolved for {chain_id} without a reward context input")]
    RewardNotDeclared { chain_id: ChainId },

    #[error("reward context input for {chain_id} has no resolved reward")]
    RewardUnresolved { chain_id: ChainId },

    #[error("commitment resolved without a commitment context input")]
    CommitmentNotDeclared,

    #[error("commitment context input has no resolved commitment")]
    CommitmentUnresolved,

    #[error("native token sum of {native_token_id} overflows")]
    NativeTokenSumOverflow { native_token_id: NativeTokenId },

    #[error("base token sum overflows")]
    BaseTokenOverflow,

    #[error("mana sum overflows")]
    ManaOverflow,

    #[error("mana arithmetic underflows: {context}")]
    ManaUnderflow { context: &'static str },

    #[error("mana creation slot {creation_slot} is after target slot {target_slot}")]
    ManaDecayCreationAfterTarget {
        creation_slot: SlotIndex,
        target_slot: SlotIndex,
    },

    // ------------------------------------------------------------------
    // unlocks
    // ------------------------------------------------------------------
    #[error("signature of input {input_index} is invalid")]
    InvalidSignature { input_index: usize },

    #[error("public key of input {input_index}'s signature does not match its address")]
    SignatureAddressMismatch { input_index: usize },

    #[error("input {input_index} signs for an address already unlocked by input {unlocked_at}")]
    AddressAlreadyUnlocked {
        input_index: usize,
        unlocked_at: u16,
    },

    #[error("input {input_index} references unlock {reference}, which did not unlock the same address")]
    ReferenceUnlockInvalid { input_index: usize, reference: u16 },

    #[error("input {input_index}'s chain address is not unlocked by input {reference}")]
    ChainAddressNotUnlocked { input_index: usize, reference: u16 },

    #[error("input {input_index} has a {address_kind} address but a {unlock_kind} unlock")]
    UnlockKindMismatch {
        input_index: usize,
        address_kind: &'static str,
        unlock_kind: &'static str,
    },

    #[error("input {input_index}: multi address has {addresses} members but {unlocks} unlocks")]
    MultiAddressLengthMismatch {
        input_index: usize,
        addresses: usize,
        unlocks: usize,
    },

    #[error("input {input_index}: multi address weight {weight} below threshold {threshold}")]
    MultiAddressThresholdNotReached {
        input_index: usize,
        weight: u32,
        threshold: u16,
    },

    #[error("input {input_index} has an expiration but no commitment input is given")]
    ExpirationCommitmentInputMissing { input_index: usize },

    #[error("input {input_index}'s expiration at slot {expiry_slot} cannot be unlocked by either address yet")]
    ExpirationNotUnlockable {
        input_index: usize,
        expiry_slot: SlotIndex,
    },

    // ------------------------------------------------------------------
    // execution pipeline
    // ------------------------------------------------------------------
    #[error("input {input_index} has a timelock but no commitment input is given")]
    TimelockCommitmentInputMissing { input_index: usize },

    #[error("input {input_index} is timelocked until slot {timelock_slot}, future bounded slot is {future_bounded_slot}")]
    TimelockNotExpired {
        input_index: usize,
        timelock_slot: SlotIndex,
        future_bounded_slot: SlotIndex,
    },

    #[error("sender of output {output_index} is not unlocked")]
    SenderFeatureNotUnlocked { output_index: usize },

    #[error("issuer of {chain_id} is not unlocked")]
    IssuerFeatureNotUnlocked { chain_id: ChainId },

    #[error("base tokens unbalanced: {input} in, {output} out")]
    BaseTokenSumUnbalanced { input: BaseToken, output: BaseToken },

    #[error("storage deposit return not fulfilled: {required} owed, {returned} returned")]
    ReturnAmountNotFulfilled {
        required: BaseToken,
        returned: BaseToken,
    },

    #[error("native token {native_token_id} unbalanced: {input} in, {output} out")]
    NativeTokenSumUnbalanced {
        native_token_id: NativeTokenId,
        input: U256,
        output: U256,
    },

    #[error("mana unbalanced: {mana_in} in, {mana_out} out")]
    InputOutputManaMismatch { mana_in: Mana, mana_out: Mana },

    #[error("inputs reference more than one implicit account creation address")]
    MultipleImplicitAccountCreationAddresses,

    // ------------------------------------------------------------------
    // chain transitions
    // ------------------------------------------------------------------
    #[error("{chain_id} changes its output kind from {from} to {to}")]
    ChainOutputKindChanged {
        chain_id: ChainId,
        from: &'static str,
        to: &'static str,
    },

    #[error("new chain output {chain_id} declares a non-zero ID")]
    NewChainOutputHasNonZeroedId { chain_id: ChainId },

    #[error("immutable features of {chain_id} changed")]
    ImmutableFeaturesChanged { chain_id: ChainId },

    #[error("transaction capabilities do not allow destroying {chain_id}")]
    DestructionNotAllowed { chain_id: ChainId },

    #[error("{chain_id} has a block issuer feature but no commitment input is given")]
    BlockIssuerCommitmentInputMissing { chain_id: ChainId },

    #[error("block issuer expiry slot {expiry_slot} is before past bounded slot {past_bounded_slot}")]
    BlockIssuerExpiryTooEarly {
        expiry_slot: SlotIndex,
        past_bounded_slot: SlotIndex,
    },

    #[error("block issuer feature of {chain_id} expires at slot {expiry_slot}, not expired at commitment slot {commitment_slot}")]
    BlockIssuerNotExpired {
        chain_id: ChainId,
        expiry_slot: SlotIndex,
        commitment_slot: SlotIndex,
    },

    #[error("no block issuance credit input for account {account_id}")]
    BlockIssuanceCreditInputMissing { account_id: AccountId },

    #[error("account {account_id} is locked with {credits} block issuance credits")]
    AccountLocked {
        account_id: AccountId,
        credits: BlockIssuanceCredits,
    },

    #[error("mana moved off block issuer account {account_id}: {mana_in} remaining in, {mana_out} remaining out")]
    ManaMovedOffBlockIssuerAccount {
        account_id: AccountId,
        mana_in: Mana,
        mana_out: Mana,
    },

    #[error("account {account_id}: foundry counter {current} -> {next} but {created} foundries created")]
    AccountInvalidFoundryCounter {
        account_id: AccountId,
        current: u32,
        next: u32,
        created: u32,
    },

    #[error("{chain_id} has a staking feature but no commitment input is given")]
    StakingCommitmentInputMissing { chain_id: ChainId },

    #[error("staking start epoch {start_epoch} must be {expected}")]
    StakingStartEpochInvalid {
        start_epoch: EpochIndex,
        expected: EpochIndex,
    },

    #[error("staking end epoch {end_epoch} is before {minimum}")]
    StakingEndEpochTooEarly {
        end_epoch: EpochIndex,
        minimum: EpochIndex,
    },

    #[error("{chain_id} has a staking feature without a block issuer feature")]
    StakingBlockIssuerFeatureMissing { chain_id: ChainId },

    #[error("staking feature of {chain_id} removed before its end epoch")]
    StakingFeatureRemovedBeforeUnbonding { chain_id: ChainId },

    #[error("staking feature of {chain_id} modified before its end epoch")]
    StakingFeatureModifiedBeforeUnbonding { chain_id: ChainId },

    #[error("staking feature of {chain_id} removed without claiming rewards")]
    StakingRewardInputMissing { chain_id: ChainId },

    #[error("{chain_id} claims rewards without removing its staking feature")]
    StakingRewardClaimingInvalid { chain_id: ChainId },

    #[error("implicit account {chain_id} can only transition into an account output")]
    ImplicitAccountDestructionDisallowed { chain_id: ChainId },

    #[error("anchor {anchor_id} governance transition invalid: {reason}")]
    AnchorInvalidGovernanceTransition {
        anchor_id: AnchorId,
        reason: &'static str,
    },

    #[error("anchor {anchor_id} state transition invalid: {reason}")]
    AnchorInvalidStateTransition {
        anchor_id: AnchorId,
        reason: &'static str,
    },

    #[error("foundry {foundry_id} transitions without its account transitioning")]
    FoundryTransitionWithoutAccount { foundry_id: FoundryId },

    #[error("new foundry serial {serial_number} outside ({start}, {end}]")]
    FoundrySerialInvalid {
        serial_number: u32,
        start: u32,
        end: u32,
    },

    #[error("new foundry serial {serial_number} follows serial {preceding} of the same account")]
    FoundrySerialNotAscending { serial_number: u32, preceding: u32 },

    #[error("simple token scheme invalid: {reason}")]
    SimpleTokenSchemeInvalid { reason: &'static str },

    #[error("simple token scheme minting invalid: expected {expected}, got {actual}")]
    SimpleTokenSchemeMintingInvalid { expected: U256, actual: U256 },

    #[error("simple token scheme melting invalid: expected {expected}, got {actual}")]
    SimpleTokenSchemeMeltingInvalid { expected: U256, actual: U256 },

    #[error("simple token scheme maximum supply changed from {current} to {next}")]
    SimpleTokenSchemeMaximumSupplyChanged { current: U256, next: U256 },

    #[error("simple token scheme minted or melted counter decreased")]
    SimpleTokenSchemeMintedMeltedTokenDecrease,

    #[error("{chain_id} is a delegation but no commitment input is given")]
    DelegationCommitmentInputMissing { chain_id: ChainId },

    #[error("delegation start epoch {start_epoch} must be {expected}")]
    DelegationStartEpochInvalid {
        start_epoch: EpochIndex,
        expected: EpochIndex,
    },

    #[error("delegated amount {delegated_amount} differs from amount {amount}")]
    DelegationAmountMismatch {
        amount: BaseToken,
        delegated_amount: BaseToken,
    },

    #[error("new delegation end epoch must be zero, got {end_epoch}")]
    DelegationEndEpochNotZero { end_epoch: EpochIndex },

    #[error("delegation {chain_id} was already transitioned")]
    DelegationTransitionedTwice { chain_id: ChainId },

    #[error("delegation {chain_id} modified delegated amount, validator or start epoch")]
    DelegationModified { chain_id: ChainId },

    #[error("delegation end epoch {end_epoch} must be {expected}")]
    DelegationEndEpochInvalid {
        end_epoch: EpochIndex,
        expected: EpochIndex,
    },

    #[error("delegation {chain_id} claims rewards while transitioning")]
    DelegationRewardsClaimingInvalid { chain_id: ChainId },

    #[error("delegation {chain_id} destroyed without a reward input")]
    DelegationRewardInputMissing { chain_id: ChainId },
}

/// Conditions upstream syntactic checks make impossible.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("{output_kind} output lacks its mandatory {condition} unlock condition")]
    MissingUnlockCondition {
        output_kind: &'static str,
        condition: &'static str,
    },

    #[error("foundry ID changed within a state change: {current} -> {next}")]
    FoundryIdMismatch { current: FoundryId, next: FoundryId },

    #[error("{chain_id} has no {side} record for a {transition:?} transition")]
    ChainRecordMissing {
        chain_id: ChainId,
        side: &'static str,
        transition: ChainTransitionType,
    },

    #[error("implicit account {chain_id} on the output side")]
    ImplicitAccountOnOutputSide { chain_id: ChainId },

    #[error("account {account_id} owning new foundries is not an account output")]
    FoundryOwnerNotAccount { account_id: AccountId },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("transaction rejected: {0}")]
    Rejected(#[from] ValidationError),

    #[error("internal invariant violated: {0}")]
    Fatal(#[from] InvariantViolation),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl VmError {
    /// Whether the error signals a bug rather than an invalid transaction.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VmError::Fatal(_) | VmError::Serialization(_))
    }

    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            VmError::Rejected(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, VmError>;
