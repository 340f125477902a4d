//! Per-transaction validation context
//!
//! Built once from a transaction and its externally resolved inputs, filled
//! with unlocked addresses by the unlock validator, then read by every
//! pipeline step. Never outlives the validation of one transaction.

use crate::address::{Address, AddressKey};
use crate::config::ProtocolParameters;
use crate::economic::{total_mana_in, total_mana_out};
use crate::error::{Result, ValidationError};
use crate::output::{ChainOutput, Output};
use crate::transaction::{ContextInput, Transaction, Unlock};
use crate::types::*;
use primitive_types::U256;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// State the caller resolved from its ledger for one transaction.
#[derive(Debug, Clone, Default)]
pub struct ResolvedInputs {
    /// Outputs consumed by the transaction, keyed by their ID
    pub input_set: HashMap<OutputId, Output>,
    /// Signed credit balances of the accounts named by credit context inputs
    pub block_issuance_credits: HashMap<AccountId, BlockIssuanceCredits>,
    pub commitment: Option<Commitment>,
    /// Mana claimed as rewards, per consumed chain
    pub rewards: HashMap<ChainId, Mana>,
}

/// A consumed output, in transaction order.
#[derive(Debug, Clone, Copy)]
pub struct InputRef<'a> {
    pub output_id: OutputId,
    pub output: &'a Output,
    /// Effective chain ID, if the output is a chain
    pub chain_id: Option<ChainId>,
}

/// A chain on the input side.
#[derive(Debug, Clone, Copy)]
pub struct ChainInput<'a> {
    pub chain_id: ChainId,
    pub output_id: OutputId,
    pub input_index: usize,
    pub output: ChainOutput<'a>,
}

/// A chain on the output side.
#[derive(Debug, Clone, Copy)]
pub struct ChainOutputEntry<'a> {
    pub chain_id: ChainId,
    pub output_index: usize,
    pub output: ChainOutput<'a>,
}

/// Record of an address authorized by the transaction's unlocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockedAddress {
    pub address: Address,
    /// Index of the input whose unlock first authorized the address
    pub unlocked_at: u16,
    /// Whether the address owned that input, as opposed to signing as a
    /// multi address member. Only direct entries can be referenced.
    pub direct: bool,
    /// Inputs that referenced this entry
    pub referenced_by: BTreeSet<u16>,
}

/// UnlockedAddresses: address key → first authorizing input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockedAddresses(BTreeMap<AddressKey, UnlockedAddress>);

impl UnlockedAddresses {
    pub fn get(&self, address: &Address) -> Option<&UnlockedAddress> {
        self.0.get(&address.key())
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.0.contains_key(&address.key())
    }

    /// Record `address` as unlocked by `input_index`; the caller checks it
    /// was not unlocked before.
    pub fn insert(&mut self, address: Address, input_index: u16) {
        self.0.insert(
            address.key(),
            UnlockedAddress {
                address,
                unlocked_at: input_index,
                direct: true,
                referenced_by: BTreeSet::new(),
            },
        );
    }

    /// Record a multi address member's signature unless the address is
    /// already known.
    pub fn insert_indirect(&mut self, address: Address, input_index: u16) {
        self.0.entry(address.key()).or_insert(UnlockedAddress {
            address,
            unlocked_at: input_index,
            direct: false,
            referenced_by: BTreeSet::new(),
        });
    }

    pub fn add_reference(&mut self, address: &Address, input_index: u16) {
        if let Some(entry) = self.0.get_mut(&address.key()) {
            entry.referenced_by.insert(input_index);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnlockedAddress> {
        self.0.values()
    }
}

/// Validation context of one transaction.
#[derive(Debug)]
pub struct WorkingSet<'a> {
    pub params: &'a ProtocolParameters,
    pub tx: &'a Transaction,
    pub tx_id: TransactionId,
    pub signing_message: Hash,
    pub unlocks: &'a [Unlock],
    /// Consumed outputs in transaction order
    pub inputs: Vec<InputRef<'a>>,
    pub in_chains: BTreeMap<ChainId, ChainInput<'a>>,
    pub out_chains: BTreeMap<ChainId, ChainOutputEntry<'a>>,
    pub unlocked_addresses: UnlockedAddresses,
    /// Credits of the accounts named by credit context inputs
    pub bic: HashMap<AccountId, BlockIssuanceCredits>,
    pub commitment: Option<&'a Commitment>,
    pub rewards: &'a HashMap<ChainId, Mana>,
    pub total_mana_in: Mana,
    pub total_mana_out: Mana,
    pub in_native_tokens: BTreeMap<NativeTokenId, U256>,
    pub out_native_tokens: BTreeMap<NativeTokenId, U256>,
}

impl<'a> WorkingSet<'a> {
    /// Resolve inputs, derive the chain sets and compute the token and mana
    /// totals every later step consumes.
    pub fn new(
        params: &'a ProtocolParameters,
        tx: &'a Transaction,
        unlocks: &'a [Unlock],
        resolved: &'a ResolvedInputs,
    ) -> Result<Self> {
        let signing_message = tx.signing_message()?;
        let tx_id = TransactionId::new(signing_message, tx.creation_slot);

        let mut inputs = Vec::with_capacity(tx.inputs.len());
        let mut in_chains = BTreeMap::new();
        for (input_index, output_id) in tx.inputs.iter().enumerate() {
            let output = resolved.input_set.get(output_id).ok_or(
                ValidationError::InputNotResolved {
                    input_index,
                    output_id: *output_id,
                },
            )?;
            if output_id.creation_slot() > tx.creation_slot {
                return Err(ValidationError::InputCreationAfterTxCreation {
                    input_index,
                    creation_slot: output_id.creation_slot(),
                    tx_slot: tx.creation_slot,
                }
                .into());
            }

            let chain = ChainOutput::from_input(output).and_then(|chain| {
                chain
                    .chain_id()
                    .map(|id| (id.or_from_output_id(output_id), chain))
            });
            if let Some((chain_id, chain)) = chain {
                in_chains.insert(
                    chain_id,
                    ChainInput {
                        chain_id,
                        output_id: *output_id,
                        input_index,
                        output: chain,
                    },
                );
            }
            inputs.push(InputRef {
                output_id: *output_id,
                output,
                chain_id: chain.map(|(chain_id, _)| chain_id),
            });
        }

        let mut out_chains = BTreeMap::new();
        for (output_index, output) in tx.outputs.iter().enumerate() {
            let Some(chain) = ChainOutput::from_output(output) else {
                continue;
            };
            let Some(declared) = chain.chain_id() else {
                continue;
            };
            let output_id = OutputId::new(tx_id, output_index as OutputIndex);
            let chain_id = declared.or_from_output_id(&output_id);
            let entry = ChainOutputEntry {
                chain_id,
                output_index,
                output: chain,
            };
            if out_chains.insert(chain_id, entry).is_some() {
                return Err(ValidationError::DuplicateChainOutput { chain_id }.into());
            }
        }

        match (tx.has_commitment_input(), resolved.commitment.is_some()) {
            (true, false) => return Err(ValidationError::CommitmentUnresolved.into()),
            (false, true) => return Err(ValidationError::CommitmentNotDeclared.into()),
            _ => {}
        }

        // Side inputs count only when the transaction declares them.
        let mut bic = HashMap::new();
        let mut claimed = BTreeSet::new();
        for context_input in &tx.context_inputs {
            match context_input {
                ContextInput::Commitment => {}
                ContextInput::BlockIssuanceCredit { account_id } => {
                    if let Some(credits) = resolved.block_issuance_credits.get(account_id) {
                        bic.insert(*account_id, *credits);
                    }
                }
                ContextInput::Reward { input_index } => {
                    let chain_id = inputs
                        .get(usize::from(*input_index))
                        .and_then(|input: &InputRef| input.chain_id)
                        .ok_or(ValidationError::RewardInputNotChain {
                            input_index: *input_index,
                        })?;
                    let claimable = in_chains.get(&chain_id).map_or(false, |input: &ChainInput| {
                        matches!(
                            input.output,
                            ChainOutput::Account(_) | ChainOutput::Delegation(_)
                        )
                    });
                    if !claimable {
                        return Err(ValidationError::RewardInputReferenceInvalid { chain_id }.into());
                    }
                    if !resolved.rewards.contains_key(&chain_id) {
                        return Err(ValidationError::RewardUnresolved { chain_id }.into());
                    }
                    claimed.insert(chain_id);
                }
            }
        }
        if let Some(chain_id) = resolved
            .rewards
            .keys()
            .find(|chain_id| !claimed.contains(*chain_id))
        {
            return Err(ValidationError::RewardNotDeclared {
                chain_id: *chain_id,
            }
            .into());
        }

        let in_native_tokens =
            sum_native_tokens(inputs.iter().map(|input: &InputRef| input.output))?;
        let out_native_tokens = sum_native_tokens(tx.outputs.iter())?;

        let total_mana_in = total_mana_in(
            inputs.iter().map(|input| (&input.output_id, input.output)),
            &resolved.rewards,
            tx.creation_slot,
            params,
        )?;
        let total_mana_out = total_mana_out(&tx.outputs, &tx.allotments)?;

        Ok(Self {
            params,
            tx,
            tx_id,
            signing_message,
            unlocks,
            inputs,
            in_chains,
            out_chains,
            unlocked_addresses: UnlockedAddresses::default(),
            bic,
            commitment: resolved.commitment.as_ref(),
            rewards: &resolved.rewards,
            total_mana_in,
            total_mana_out,
            in_native_tokens,
            out_native_tokens,
        })
    }

    /// Transition kind of `chain_id`, if the transaction touches it.
    pub fn transition_type(&self, chain_id: &ChainId) -> Option<ChainTransitionType> {
        match (
            self.in_chains.contains_key(chain_id),
            self.out_chains.contains_key(chain_id),
        ) {
            (false, true) => Some(ChainTransitionType::Genesis),
            (true, true) => Some(ChainTransitionType::StateChange),
            (true, false) => Some(ChainTransitionType::Destroy),
            (false, false) => None,
        }
    }

    pub fn past_bounded_slot(&self) -> Option<SlotIndex> {
        self.commitment
            .map(|c| self.params.past_bounded_slot(c.slot))
    }

    pub fn future_bounded_slot(&self) -> Option<SlotIndex> {
        self.commitment
            .map(|c| self.params.future_bounded_slot(c.slot))
    }

    pub fn native_token_in(&self, id: &NativeTokenId) -> U256 {
        self.in_native_tokens.get(id).copied().unwrap_or_default()
    }

    pub fn native_token_out(&self, id: &NativeTokenId) -> U256 {
        self.out_native_tokens.get(id).copied().unwrap_or_default()
    }
}

fn sum_native_tokens<'o>(
    outputs: impl Iterator<Item = &'o Output>,
) -> Result<BTreeMap<NativeTokenId, U256>> {
    let mut sums: BTreeMap<NativeTokenId, U256> = BTreeMap::new();
    for output in outputs {
        let Some(native_token) = output.native_token() else {
            continue;
        };
        let sum = sums.entry(native_token.id).or_default();
        *sum = sum
            .checked_add(native_token.amount)
            .ok_or(ValidationError::NativeTokenSumOverflow {
                native_token_id: native_token.id,
            })?;
    }
    Ok(sums)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::PublicKeyHash;
    use crate::output::*;
    use crate::transaction::TransactionCapabilities;
    use crate::error::VmError;

    fn owner() -> Address {
        Address::Secp256k1(PublicKeyHash([1; 32]))
    }

    fn conditions() -> UnlockConditions {
        UnlockConditions::new(vec![UnlockCondition::Address(owner())])
    }

    fn nft(nft_id: NftId) -> Output {
        Output::Nft(NftOutput {
            amount: 1_000_000,
            mana: 0,
            nft_id,
            unlock_conditions: conditions(),
            features: Features::default(),
            immutable_features: Features::default(),
        })
    }

    fn tx(inputs: Vec<OutputId>, outputs: Vec<Output>) -> Transaction {
        Transaction {
            network_id: 0,
            creation_slot: 20,
            context_inputs: vec![],
            inputs,
            allotments: vec![],
            capabilities: TransactionCapabilities::NONE,
            payload: None,
            outputs,
        }
    }

    fn input_id(byte: u8) -> OutputId {
        OutputId::new(TransactionId::new([byte; 32], 10), 0)
    }

    #[test]
    fn test_genesis_chain_keyed_by_derived_id() {
        let params = ProtocolParameters::default();
        let transaction = tx(vec![input_id(1)], vec![nft(NftId::EMPTY)]);
        let mut resolved = ResolvedInputs::default();
        resolved.input_set.insert(input_id(1), nft(NftId([5; 32])));

        let ws = WorkingSet::new(&params, &transaction, &[], &resolved).unwrap();
        let derived = ChainId::Nft(NftId::from_output_id(&OutputId::new(ws.tx_id, 0)));
        assert_eq!(ws.transition_type(&derived), Some(ChainTransitionType::Genesis));
        assert_eq!(
            ws.transition_type(&ChainId::Nft(NftId([5; 32]))),
            Some(ChainTransitionType::Destroy)
        );
    }

    #[test]
    fn test_consumed_genesis_output_keyed_by_its_output_id() {
        let params = ProtocolParameters::default();
        let created = input_id(2);
        let derived = NftId::from_output_id(&created);
        let transaction = tx(vec![created], vec![nft(derived)]);
        let mut resolved = ResolvedInputs::default();
        resolved.input_set.insert(created, nft(NftId::EMPTY));

        let ws = WorkingSet::new(&params, &transaction, &[], &resolved).unwrap();
        assert_eq!(
            ws.transition_type(&ChainId::Nft(derived)),
            Some(ChainTransitionType::StateChange)
        );
    }

    #[test]
    fn test_unresolved_input_rejected() {
        let params = ProtocolParameters::default();
        let transaction = tx(vec![input_id(1)], vec![nft(NftId::EMPTY)]);
        let resolved = ResolvedInputs::default();
        assert!(matches!(
            WorkingSet::new(&params, &transaction, &[], &resolved),
            Err(VmError::Rejected(ValidationError::InputNotResolved { input_index: 0, .. }))
        ));
    }

    #[test]
    fn test_duplicate_chain_output_rejected() {
        let params = ProtocolParameters::default();
        let id = NftId([7; 32]);
        let transaction = tx(vec![input_id(1)], vec![nft(id), nft(id)]);
        let mut resolved = ResolvedInputs::default();
        resolved.input_set.insert(input_id(1), nft(id));
        assert!(matches!(
            WorkingSet::new(&params, &transaction, &[], &resolved),
            Err(VmError::Rejected(ValidationError::DuplicateChainOutput { .. }))
        ));
    }

    #[test]
    fn test_rewards_must_be_declared_for_consumed_account_or_delegation() {
        let params = ProtocolParameters::default();
        let id = NftId([7; 32]);
        let mut transaction = tx(vec![input_id(1)], vec![nft(id)]);
        let mut resolved = ResolvedInputs::default();
        resolved.input_set.insert(input_id(1), nft(id));
        resolved.rewards.insert(ChainId::Nft(id), 10);
        assert!(matches!(
            WorkingSet::new(&params, &transaction, &[], &resolved),
            Err(VmError::Rejected(ValidationError::RewardNotDeclared { .. }))
        ));

        transaction.context_inputs.push(ContextInput::Reward { input_index: 0 });
        assert!(matches!(
            WorkingSet::new(&params, &transaction, &[], &resolved),
            Err(VmError::Rejected(ValidationError::RewardInputReferenceInvalid { .. }))
        ));
    }

    #[test]
    fn test_commitment_must_be_declared_and_resolved() {
        let params = ProtocolParameters::default();
        let mut transaction = tx(vec![input_id(1)], vec![nft(NftId::EMPTY)]);
        let mut resolved = ResolvedInputs::default();
        resolved.input_set.insert(input_id(1), nft(NftId([5; 32])));
        resolved.commitment = Some(Commitment::new(10));
        assert!(matches!(
            WorkingSet::new(&params, &transaction, &[], &resolved),
            Err(VmError::Rejected(ValidationError::CommitmentNotDeclared))
        ));

        transaction.context_inputs.push(ContextInput::Commitment);
        assert!(WorkingSet::new(&params, &transaction, &[], &resolved).is_ok());

        resolved.commitment = None;
        assert!(matches!(
            WorkingSet::new(&params, &transaction, &[], &resolved),
            Err(VmError::Rejected(ValidationError::CommitmentUnresolved))
        ));
    }

    #[test]
    fn test_credits_read_only_for_declared_accounts() {
        let params = ProtocolParameters::default();
        let declared = AccountId([3; 32]);
        let mut transaction = tx(vec![input_id(1)], vec![nft(NftId::EMPTY)]);
        transaction
            .context_inputs
            .push(ContextInput::BlockIssuanceCredit { account_id: declared });
        let mut resolved = ResolvedInputs::default();
        resolved.input_set.insert(input_id(1), nft(NftId([5; 32])));
        resolved.block_issuance_credits.insert(declared, 5);
        resolved.block_issuance_credits.insert(AccountId([4; 32]), 9);

        let ws = WorkingSet::new(&params, &transaction, &[], &resolved).unwrap();
        assert_eq!(ws.bic.get(&declared), Some(&5));
        assert!(!ws.bic.contains_key(&AccountId([4; 32])));
    }

    #[test]
    fn test_unlocked_addresses_track_references() {
        let mut table = UnlockedAddresses::default();
        table.insert(owner(), 0);
        table.add_reference(&owner(), 2);
        let entry = table.get(&owner()).unwrap();
        assert_eq!(entry.unlocked_at, 0);
        assert!(entry.referenced_by.contains(&2));
        assert!(!table.contains(&Address::Secp256k1(PublicKeyHash([2; 32]))));
    }
}
