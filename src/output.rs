//! Outputs, unlock conditions and features
//!
//! Pure data: the only behavior here is lookup and ID derivation. All rules
//! over these records live in the unlock validator, the execution pipeline
//! and the chain state transition functions.

use crate::address::{Address, PublicKeyHash};
use crate::token_scheme::TokenScheme;
use crate::types::*;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDepositReturnUnlockCondition {
    pub return_address: Address,
    pub amount: BaseToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelockUnlockCondition {
    pub slot: SlotIndex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationUnlockCondition {
    pub return_address: Address,
    pub slot: SlotIndex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnlockCondition {
    Address(Address),
    StorageDepositReturn(StorageDepositReturnUnlockCondition),
    Timelock(TimelockUnlockCondition),
    Expiration(ExpirationUnlockCondition),
    StateControllerAddress(Address),
    GovernorAddress(Address),
    /// Foundries are owned by an account for their whole lifetime.
    ImmutableAccountAddress(AccountId),
}

/// Unlock conditions of an output; at most one of each kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockConditions(pub Vec<UnlockCondition>);

impl UnlockConditions {
    pub fn new(conditions: Vec<UnlockCondition>) -> Self {
        Self(conditions)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnlockCondition> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn address(&self) -> Option<&Address> {
        self.0.iter().find_map(|c| match c {
            UnlockCondition::Address(address) => Some(address),
            _ => None,
        })
    }

    pub fn storage_deposit_return(&self) -> Option<&StorageDepositReturnUnlockCondition> {
        self.0.iter().find_map(|c| match c {
            UnlockCondition::StorageDepositReturn(sdr) => Some(sdr),
            _ => None,
        })
    }

    pub fn timelock(&self) -> Option<&TimelockUnlockCondition> {
        self.0.iter().find_map(|c| match c {
            UnlockCondition::Timelock(timelock) => Some(timelock),
            _ => None,
        })
    }

    pub fn expiration(&self) -> Option<&ExpirationUnlockCondition> {
        self.0.iter().find_map(|c| match c {
            UnlockCondition::Expiration(expiration) => Some(expiration),
            _ => None,
        })
    }

    pub fn state_controller(&self) -> Option<&Address> {
        self.0.iter().find_map(|c| match c {
            UnlockCondition::StateControllerAddress(address) => Some(address),
            _ => None,
        })
    }

    pub fn governor(&self) -> Option<&Address> {
        self.0.iter().find_map(|c| match c {
            UnlockCondition::GovernorAddress(address) => Some(address),
            _ => None,
        })
    }

    pub fn immutable_account(&self) -> Option<&AccountId> {
        self.0.iter().find_map(|c| match c {
            UnlockCondition::ImmutableAccountAddress(account_id) => Some(account_id),
            _ => None,
        })
    }

    /// Whether the output is locked to `account_id` with a timelock reaching
    /// at least `min_slot`.
    pub fn is_mana_locked_to(&self, account_id: &AccountId, min_slot: SlotIndex) -> bool {
        let locked_to_account = matches!(
            self.address().map(Address::underlying),
            Some(Address::Account(id)) if id == account_id
        );
        locked_to_account && self.timelock().map_or(false, |t| t.slot >= min_slot)
    }
}

/// Metadata entries, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFeature {
    pub entries: BTreeMap<String, ByteString>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeTokenFeature {
    pub id: NativeTokenId,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockIssuerKey {
    PublicKeyHash(PublicKeyHash),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIssuerFeature {
    pub expiry_slot: SlotIndex,
    pub keys: Vec<BlockIssuerKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingFeature {
    pub staked_amount: BaseToken,
    pub fixed_cost: Mana,
    pub start_epoch: EpochIndex,
    pub end_epoch: EpochIndex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feature {
    Sender(Address),
    Issuer(Address),
    Metadata(MetadataFeature),
    StateMetadata(MetadataFeature),
    Tag(ByteString),
    NativeToken(NativeTokenFeature),
    BlockIssuer(BlockIssuerFeature),
    Staking(StakingFeature),
}

/// Features of an output; at most one of each kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features(pub Vec<Feature>);

impl Features {
    pub fn new(features: Vec<Feature>) -> Self {
        Self(features)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sender(&self) -> Option<&Address> {
        self.0.iter().find_map(|f| match f {
            Feature::Sender(address) => Some(address),
            _ => None,
        })
    }

    pub fn issuer(&self) -> Option<&Address> {
        self.0.iter().find_map(|f| match f {
            Feature::Issuer(address) => Some(address),
            _ => None,
        })
    }

    pub fn metadata(&self) -> Option<&MetadataFeature> {
        self.0.iter().find_map(|f| match f {
            Feature::Metadata(metadata) => Some(metadata),
            _ => None,
        })
    }

    pub fn state_metadata(&self) -> Option<&MetadataFeature> {
        self.0.iter().find_map(|f| match f {
            Feature::StateMetadata(metadata) => Some(metadata),
            _ => None,
        })
    }

    pub fn native_token(&self) -> Option<&NativeTokenFeature> {
        self.0.iter().find_map(|f| match f {
            Feature::NativeToken(native_token) => Some(native_token),
            _ => None,
        })
    }

    pub fn block_issuer(&self) -> Option<&BlockIssuerFeature> {
        self.0.iter().find_map(|f| match f {
            Feature::BlockIssuer(block_issuer) => Some(block_issuer),
            _ => None,
        })
    }

    pub fn staking(&self) -> Option<&StakingFeature> {
        self.0.iter().find_map(|f| match f {
            Feature::Staking(staking) => Some(staking),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicOutput {
    pub amount: BaseToken,
    pub mana: Mana,
    pub unlock_conditions: UnlockConditions,
    pub features: Features,
}

impl BasicOutput {
    /// Exactly an address unlock condition and nothing else: the only shape
    /// that counts towards storage deposit returns.
    pub fn is_simple_transfer(&self) -> bool {
        self.unlock_conditions.len() == 1
            && self.unlock_conditions.address().is_some()
            && self.features.is_empty()
    }

    pub fn is_implicit_account(&self) -> bool {
        self.unlock_conditions
            .address()
            .map_or(false, |address| {
                matches!(address, Address::ImplicitAccountCreation(_))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOutput {
    pub amount: BaseToken,
    pub mana: Mana,
    pub account_id: AccountId,
    pub foundry_counter: u32,
    pub unlock_conditions: UnlockConditions,
    pub features: Features,
    pub immutable_features: Features,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorOutput {
    pub amount: BaseToken,
    pub mana: Mana,
    pub anchor_id: AnchorId,
    pub state_index: u32,
    pub unlock_conditions: UnlockConditions,
    pub features: Features,
    pub immutable_features: Features,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundryOutput {
    pub amount: BaseToken,
    pub serial_number: u32,
    pub token_scheme: TokenScheme,
    pub unlock_conditions: UnlockConditions,
    pub features: Features,
    pub immutable_features: Features,
}

impl FoundryOutput {
    /// Owning account, if the mandatory immutable account unlock condition is present.
    pub fn account_id(&self) -> Option<AccountId> {
        self.unlock_conditions.immutable_account().copied()
    }

    pub fn foundry_id(&self) -> Option<FoundryId> {
        self.account_id().map(|account_id| {
            FoundryId::new(account_id, self.serial_number, self.token_scheme.kind())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftOutput {
    pub amount: BaseToken,
    pub mana: Mana,
    pub nft_id: NftId,
    pub unlock_conditions: UnlockConditions,
    pub features: Features,
    pub immutable_features: Features,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationOutput {
    pub amount: BaseToken,
    pub delegated_amount: BaseToken,
    pub delegation_id: DelegationId,
    pub validator_address: AccountId,
    pub start_epoch: EpochIndex,
    pub end_epoch: EpochIndex,
    pub unlock_conditions: UnlockConditions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Output {
    Basic(BasicOutput),
    Account(AccountOutput),
    Anchor(AnchorOutput),
    Foundry(FoundryOutput),
    Nft(NftOutput),
    Delegation(DelegationOutput),
}

static NO_FEATURES: Features = Features(Vec::new());

impl Output {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Output::Basic(_) => "basic",
            Output::Account(_) => "account",
            Output::Anchor(_) => "anchor",
            Output::Foundry(_) => "foundry",
            Output::Nft(_) => "nft",
            Output::Delegation(_) => "delegation",
        }
    }

    pub fn amount(&self) -> BaseToken {
        match self {
            Output::Basic(o) => o.amount,
            Output::Account(o) => o.amount,
            Output::Anchor(o) => o.amount,
            Output::Foundry(o) => o.amount,
            Output::Nft(o) => o.amount,
            Output::Delegation(o) => o.amount,
        }
    }

    /// Stored mana; foundries and delegations hold none.
    pub fn mana(&self) -> Mana {
        match self {
            Output::Basic(o) => o.mana,
            Output::Account(o) => o.mana,
            Output::Anchor(o) => o.mana,
            Output::Nft(o) => o.mana,
            Output::Foundry(_) | Output::Delegation(_) => 0,
        }
    }

    pub fn unlock_conditions(&self) -> &UnlockConditions {
        match self {
            Output::Basic(o) => &o.unlock_conditions,
            Output::Account(o) => &o.unlock_conditions,
            Output::Anchor(o) => &o.unlock_conditions,
            Output::Foundry(o) => &o.unlock_conditions,
            Output::Nft(o) => &o.unlock_conditions,
            Output::Delegation(o) => &o.unlock_conditions,
        }
    }

    /// Mutable features; delegations carry none.
    pub fn features(&self) -> &Features {
        match self {
            Output::Basic(o) => &o.features,
            Output::Account(o) => &o.features,
            Output::Anchor(o) => &o.features,
            Output::Foundry(o) => &o.features,
            Output::Nft(o) => &o.features,
            Output::Delegation(_) => &NO_FEATURES,
        }
    }

    pub fn immutable_features(&self) -> &Features {
        match self {
            Output::Account(o) => &o.immutable_features,
            Output::Anchor(o) => &o.immutable_features,
            Output::Foundry(o) => &o.immutable_features,
            Output::Nft(o) => &o.immutable_features,
            Output::Basic(_) | Output::Delegation(_) => &NO_FEATURES,
        }
    }

    pub fn native_token(&self) -> Option<&NativeTokenFeature> {
        self.features().native_token()
    }

    /// Declared chain ID; `None` for basic outputs and for foundries missing
    /// their owning account.
    pub fn chain_id(&self) -> Option<ChainId> {
        match self {
            Output::Basic(_) => None,
            Output::Account(o) => Some(ChainId::Account(o.account_id)),
            Output::Anchor(o) => Some(ChainId::Anchor(o.anchor_id)),
            Output::Foundry(o) => o.foundry_id().map(ChainId::Foundry),
            Output::Nft(o) => Some(ChainId::Nft(o.nft_id)),
            Output::Delegation(o) => Some(ChainId::Delegation(o.delegation_id)),
        }
    }

    /// Addresses that own the output: the address unlock condition, or both
    /// controllers of an anchor.
    pub fn owning_addresses(&self) -> Vec<&Address> {
        let conditions = self.unlock_conditions();
        match self {
            Output::Anchor(_) => conditions
                .state_controller()
                .into_iter()
                .chain(conditions.governor())
                .collect(),
            _ => conditions.address().into_iter().collect(),
        }
    }
}

/// A stateful output, viewed through the capabilities chain transitions need.
///
/// `ImplicitAccount` wraps a basic output owned by an implicit account
/// creation address; it acts as an account with an empty ID for exactly one
/// transition.
#[derive(Debug, Clone, Copy)]
pub enum ChainOutput<'a> {
    Account(&'a AccountOutput),
    ImplicitAccount(&'a BasicOutput),
    Anchor(&'a AnchorOutput),
    Foundry(&'a FoundryOutput),
    Nft(&'a NftOutput),
    Delegation(&'a DelegationOutput),
}

impl<'a> ChainOutput<'a> {
    /// View of a consumed output. Basic outputs are chains only when owned by
    /// an implicit account creation address.
    pub fn from_input(output: &'a Output) -> Option<Self> {
        match output {
            Output::Basic(basic) if basic.is_implicit_account() => {
                Some(ChainOutput::ImplicitAccount(basic))
            }
            _ => Self::from_output(output),
        }
    }

    /// View of a produced output. Implicit accounts only exist once consumed.
    pub fn from_output(output: &'a Output) -> Option<Self> {
        match output {
            Output::Basic(_) => None,
            Output::Account(o) => Some(ChainOutput::Account(o)),
            Output::Anchor(o) => Some(ChainOutput::Anchor(o)),
            Output::Foundry(o) => Some(ChainOutput::Foundry(o)),
            Output::Nft(o) => Some(ChainOutput::Nft(o)),
            Output::Delegation(o) => Some(ChainOutput::Delegation(o)),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ChainOutput::Account(_) => "account",
            ChainOutput::ImplicitAccount(_) => "implicit account",
            ChainOutput::Anchor(_) => "anchor",
            ChainOutput::Foundry(_) => "foundry",
            ChainOutput::Nft(_) => "nft",
            ChainOutput::Delegation(_) => "delegation",
        }
    }

    /// Declared chain ID; the synthesized empty account ID for implicit accounts.
    pub fn chain_id(&self) -> Option<ChainId> {
        match self {
            ChainOutput::Account(o) => Some(ChainId::Account(o.account_id)),
            ChainOutput::ImplicitAccount(_) => Some(ChainId::Account(AccountId::EMPTY)),
            ChainOutput::Anchor(o) => Some(ChainId::Anchor(o.anchor_id)),
            ChainOutput::Foundry(o) => o.foundry_id().map(ChainId::Foundry),
            ChainOutput::Nft(o) => Some(ChainId::Nft(o.nft_id)),
            ChainOutput::Delegation(o) => Some(ChainId::Delegation(o.delegation_id)),
        }
    }

    pub fn amount(&self) -> BaseToken {
        match self {
            ChainOutput::Account(o) => o.amount,
            ChainOutput::ImplicitAccount(o) => o.amount,
            ChainOutput::Anchor(o) => o.amount,
            ChainOutput::Foundry(o) => o.amount,
            ChainOutput::Nft(o) => o.amount,
            ChainOutput::Delegation(o) => o.amount,
        }
    }

    pub fn unlock_conditions(&self) -> &'a UnlockConditions {
        match *self {
            ChainOutput::Account(o) => &o.unlock_conditions,
            ChainOutput::ImplicitAccount(o) => &o.unlock_conditions,
            ChainOutput::Anchor(o) => &o.unlock_conditions,
            ChainOutput::Foundry(o) => &o.unlock_conditions,
            ChainOutput::Nft(o) => &o.unlock_conditions,
            ChainOutput::Delegation(o) => &o.unlock_conditions,
        }
    }
}
