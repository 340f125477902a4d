//! Shared fixtures for the integration tests
//!
//! Inputs are created in the transaction's own slot, so they carry no
//! potential mana and their stored mana does not decay.

#![allow(dead_code)]

use ledger_vm::address::{Address, PublicKeyHash};
use ledger_vm::output::*;
use ledger_vm::signing::{AddressSigner, InMemorySigner};
use ledger_vm::token_scheme::{SimpleTokenScheme, TokenScheme};
use ledger_vm::transaction::*;
use ledger_vm::*;
use secp256k1::SecretKey;

pub const TX_SLOT: SlotIndex = 1000;

/// Past bounded slot 1010, future bounded slot 1000, both in epoch 0.
pub const COMMITMENT_SLOT: SlotIndex = 990;

pub const AMOUNT: BaseToken = 1_000_000;

pub struct TxBuilder {
    pub vm: VirtualMachine,
    pub signer: InMemorySigner,
    pub resolved: ResolvedInputs,
    pub tx: Transaction,
    next_input: u8,
}

impl TxBuilder {
    pub fn new() -> Self {
        let vm = VirtualMachine::default();
        let tx = Transaction {
            network_id: vm.params().network_id,
            creation_slot: TX_SLOT,
            context_inputs: vec![],
            inputs: vec![],
            allotments: vec![],
            capabilities: TransactionCapabilities::NONE,
            payload: None,
            outputs: vec![],
        };
        Self {
            vm,
            signer: InMemorySigner::new(),
            resolved: ResolvedInputs::default(),
            tx,
            next_input: 1,
        }
    }

    /// Register a signing key and return its secp256k1 address.
    pub fn key(&mut self, seed: u8) -> Address {
        Address::Secp256k1(self.key_hash(seed))
    }

    pub fn key_hash(&mut self, seed: u8) -> PublicKeyHash {
        let secret = SecretKey::from_slice(&[seed; 32]).expect("valid secret key");
        self.signer.add_key(secret)
    }

    pub fn input(&mut self, output: Output) -> OutputId {
        let output_id = OutputId::new(TransactionId::new([self.next_input; 32], TX_SLOT), 0);
        self.next_input += 1;
        self.tx.inputs.push(output_id);
        self.resolved.input_set.insert(output_id, output);
        output_id
    }

    pub fn output(&mut self, output: Output) -> usize {
        self.tx.outputs.push(output);
        self.tx.outputs.len() - 1
    }

    pub fn commitment(&mut self, slot: SlotIndex) {
        self.tx.context_inputs.push(ContextInput::Commitment);
        self.resolved.commitment = Some(Commitment::new(slot));
    }

    pub fn credits(&mut self, account_id: AccountId, credits: BlockIssuanceCredits) {
        self.tx
            .context_inputs
            .push(ContextInput::BlockIssuanceCredit { account_id });
        self.resolved
            .block_issuance_credits
            .insert(account_id, credits);
    }

    pub fn reward(&mut self, input_index: u16, chain_id: ChainId, mana: Mana) {
        self.tx.context_inputs.push(ContextInput::Reward { input_index });
        self.resolved.rewards.insert(chain_id, mana);
    }

    pub fn capabilities(&mut self, capabilities: TransactionCapabilities) {
        self.tx.capabilities = capabilities;
    }

    /// Signature unlock for `address` over the transaction as built so far.
    pub fn signature(&self, address: &Address) -> Unlock {
        let message = self.tx.signing_message().expect("serializable transaction");
        Unlock::Signature(self.signer.sign(address, &message).expect("known key"))
    }

    pub fn signed(&self, unlocks: Vec<Unlock>) -> SignedTransaction {
        SignedTransaction {
            transaction: self.tx.clone(),
            unlocks,
        }
    }

    pub fn validate(&self, unlocks: Vec<Unlock>) -> ledger_vm::Result<ValidatedTransaction> {
        self.vm.validate(&self.signed(unlocks), &self.resolved)
    }
}

pub fn rejection(result: ledger_vm::Result<ValidatedTransaction>) -> ValidationError {
    match result {
        Ok(_) => panic!("transaction unexpectedly accepted"),
        Err(VmError::Rejected(err)) => err,
        Err(other) => panic!("expected a rejection, got {other}"),
    }
}

pub fn conditions(conditions: Vec<UnlockCondition>) -> UnlockConditions {
    UnlockConditions::new(conditions)
}

pub fn basic(amount: BaseToken, address: &Address) -> Output {
    basic_with(amount, 0, vec![UnlockCondition::Address(address.clone())], vec![])
}

pub fn basic_with(
    amount: BaseToken,
    mana: Mana,
    unlock_conditions: Vec<UnlockCondition>,
    features: Vec<Feature>,
) -> Output {
    Output::Basic(BasicOutput {
        amount,
        mana,
        unlock_conditions: conditions(unlock_conditions),
        features: Features::new(features),
    })
}

pub fn account(account_id: AccountId, owner: &Address) -> AccountOutput {
    AccountOutput {
        amount: AMOUNT,
        mana: 0,
        account_id,
        foundry_counter: 0,
        unlock_conditions: conditions(vec![UnlockCondition::Address(owner.clone())]),
        features: Features::default(),
        immutable_features: Features::default(),
    }
}

pub fn block_issuer(expiry_slot: SlotIndex) -> Feature {
    Feature::BlockIssuer(BlockIssuerFeature {
        expiry_slot,
        keys: vec![BlockIssuerKey::PublicKeyHash(PublicKeyHash([0xbb; 32]))],
    })
}

pub fn staking(start_epoch: EpochIndex, end_epoch: EpochIndex) -> Feature {
    Feature::Staking(StakingFeature {
        staked_amount: AMOUNT / 2,
        fixed_cost: 10,
        start_epoch,
        end_epoch,
    })
}

pub fn anchor(anchor_id: AnchorId, state_controller: &Address, governor: &Address) -> AnchorOutput {
    AnchorOutput {
        amount: AMOUNT,
        mana: 0,
        anchor_id,
        state_index: 0,
        unlock_conditions: conditions(vec![
            UnlockCondition::StateControllerAddress(state_controller.clone()),
            UnlockCondition::GovernorAddress(governor.clone()),
        ]),
        features: Features::default(),
        immutable_features: Features::default(),
    }
}

pub fn nft(nft_id: NftId, owner: &Address) -> NftOutput {
    NftOutput {
        amount: AMOUNT,
        mana: 0,
        nft_id,
        unlock_conditions: conditions(vec![UnlockCondition::Address(owner.clone())]),
        features: Features::default(),
        immutable_features: Features::default(),
    }
}

pub fn foundry(account_id: AccountId, serial_number: u32, minted: u64, melted: u64) -> FoundryOutput {
    FoundryOutput {
        amount: AMOUNT,
        serial_number,
        token_scheme: TokenScheme::Simple(SimpleTokenScheme::new(minted, melted, 1_000_000u64)),
        unlock_conditions: conditions(vec![UnlockCondition::ImmutableAccountAddress(account_id)]),
        features: Features::default(),
        immutable_features: Features::default(),
    }
}

pub fn foundry_id(account_id: AccountId, serial_number: u32) -> FoundryId {
    FoundryId::new(account_id, serial_number, TokenScheme::KIND_SIMPLE)
}

pub fn native_token(id: FoundryId, amount: u64) -> Feature {
    Feature::NativeToken(NativeTokenFeature {
        id,
        amount: amount.into(),
    })
}

pub fn delegation(owner: &Address, start_epoch: EpochIndex) -> DelegationOutput {
    DelegationOutput {
        amount: AMOUNT,
        delegated_amount: AMOUNT,
        delegation_id: DelegationId::EMPTY,
        validator_address: AccountId([0x77; 32]),
        start_epoch,
        end_epoch: 0,
        unlock_conditions: conditions(vec![UnlockCondition::Address(owner.clone())]),
    }
}
