//! Base token, native token and mana balance checks, plus the pipeline steps
//! that guard outputs

mod common;

use common::*;
use ledger_vm::address::{Address, PublicKeyHash};
use ledger_vm::execution::{exec_single_implicit_account_creation_address, ExecStep};
use ledger_vm::output::*;
use ledger_vm::transaction::{Allotment, ContextInput, TransactionCapabilities, Unlock};
use ledger_vm::*;

#[test]
fn test_base_tokens_must_balance() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    b.input(basic(AMOUNT, &alice));
    b.output(basic(AMOUNT - 1, &alice));

    assert_eq!(
        rejection(b.validate(vec![b.signature(&alice)])),
        ValidationError::BaseTokenSumUnbalanced {
            input: AMOUNT,
            output: AMOUNT - 1
        }
    );
}

#[test]
fn test_storage_deposit_return_is_owed_to_unsigned_return_address() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    let bob = b.key(2);
    b.input(basic_with(
        AMOUNT,
        0,
        vec![
            UnlockCondition::Address(alice.clone()),
            UnlockCondition::StorageDepositReturn(StorageDepositReturnUnlockCondition {
                return_address: bob.clone(),
                amount: 50_000,
            }),
        ],
        vec![],
    ));
    b.output(basic(AMOUNT - 50_000, &alice));
    b.output(basic(50_000, &bob));
    assert!(b.validate(vec![b.signature(&alice)]).is_ok());

    b.tx.outputs = vec![basic(AMOUNT - 40_000, &alice), basic(40_000, &bob)];
    assert_eq!(
        rejection(b.validate(vec![b.signature(&alice)])),
        ValidationError::ReturnAmountNotFulfilled {
            required: 50_000,
            returned: 40_000
        }
    );
}

#[test]
fn test_return_must_be_a_plain_transfer() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    let bob = b.key(2);
    b.input(basic_with(
        AMOUNT,
        0,
        vec![
            UnlockCondition::Address(alice.clone()),
            UnlockCondition::StorageDepositReturn(StorageDepositReturnUnlockCondition {
                return_address: bob.clone(),
                amount: 50_000,
            }),
        ],
        vec![],
    ));
    b.output(basic(AMOUNT - 50_000, &alice));
    b.output(basic_with(
        50_000,
        0,
        vec![UnlockCondition::Address(bob.clone())],
        vec![Feature::Tag(b"not a plain return".to_vec())],
    ));

    assert_eq!(
        rejection(b.validate(vec![b.signature(&alice)])),
        ValidationError::ReturnAmountNotFulfilled {
            required: 50_000,
            returned: 0
        }
    );
}

#[test]
fn test_return_waived_when_return_address_signs() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    let bob = b.key(2);
    b.input(basic_with(
        AMOUNT,
        0,
        vec![
            UnlockCondition::Address(alice.clone()),
            UnlockCondition::StorageDepositReturn(StorageDepositReturnUnlockCondition {
                return_address: bob.clone(),
                amount: 50_000,
            }),
        ],
        vec![],
    ));
    b.input(basic(AMOUNT, &bob));
    b.output(basic(2 * AMOUNT, &alice));

    let unlocks = vec![b.signature(&alice), b.signature(&bob)];
    assert!(b.validate(unlocks).is_ok());
}

#[test]
fn test_native_tokens_balance_unless_burning() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    let token = foundry_id(AccountId([0x10; 32]), 1);
    b.input(basic_with(
        AMOUNT,
        0,
        vec![UnlockCondition::Address(alice.clone())],
        vec![native_token(token, 100)],
    ));
    b.output(basic_with(
        AMOUNT,
        0,
        vec![UnlockCondition::Address(alice.clone())],
        vec![native_token(token, 90)],
    ));

    assert_eq!(
        rejection(b.validate(vec![b.signature(&alice)])),
        ValidationError::NativeTokenSumUnbalanced {
            native_token_id: token,
            input: 100u64.into(),
            output: 90u64.into()
        }
    );

    b.capabilities(TransactionCapabilities::NONE.with(TransactionCapabilities::CAN_BURN_NATIVE_TOKENS));
    assert!(b.validate(vec![b.signature(&alice)]).is_ok());
}

#[test]
fn test_native_tokens_cannot_appear_from_nowhere_even_when_burning() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    let token = foundry_id(AccountId([0x10; 32]), 1);
    b.input(basic(AMOUNT, &alice));
    b.output(basic_with(
        AMOUNT,
        0,
        vec![UnlockCondition::Address(alice.clone())],
        vec![native_token(token, 1)],
    ));
    b.capabilities(TransactionCapabilities::ALL);

    assert!(matches!(
        rejection(b.validate(vec![b.signature(&alice)])),
        ValidationError::NativeTokenSumUnbalanced { .. }
    ));
}

#[test]
fn test_mana_must_balance_unless_burning() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    b.input(basic_with(AMOUNT, 500, vec![UnlockCondition::Address(alice.clone())], vec![]));
    b.output(basic_with(AMOUNT, 400, vec![UnlockCondition::Address(alice.clone())], vec![]));

    assert_eq!(
        rejection(b.validate(vec![b.signature(&alice)])),
        ValidationError::InputOutputManaMismatch {
            mana_in: 500,
            mana_out: 400
        }
    );

    b.capabilities(TransactionCapabilities::NONE.with(TransactionCapabilities::CAN_BURN_MANA));
    let validated = b.validate(vec![b.signature(&alice)]).unwrap();
    assert_eq!((validated.mana_in, validated.mana_out), (500, 400));
}

#[test]
fn test_allotments_count_towards_mana_out() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    b.input(basic_with(AMOUNT, 500, vec![UnlockCondition::Address(alice.clone())], vec![]));
    b.output(basic_with(AMOUNT, 400, vec![UnlockCondition::Address(alice.clone())], vec![]));
    b.tx.allotments.push(Allotment {
        account_id: AccountId([0x33; 32]),
        mana: 100,
    });

    assert!(b.validate(vec![b.signature(&alice)]).is_ok());
}

#[test]
fn test_mana_cannot_be_created() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    b.input(basic(AMOUNT, &alice));
    b.output(basic_with(AMOUNT, 1, vec![UnlockCondition::Address(alice.clone())], vec![]));
    b.capabilities(TransactionCapabilities::ALL);

    assert_eq!(
        rejection(b.validate(vec![b.signature(&alice)])),
        ValidationError::InputOutputManaMismatch {
            mana_in: 0,
            mana_out: 1
        }
    );
}

#[test]
fn test_sender_feature_requires_unlocked_sender() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    let carol = b.key(3);
    b.input(basic(AMOUNT, &alice));
    b.output(basic_with(
        AMOUNT,
        0,
        vec![UnlockCondition::Address(carol.clone())],
        vec![Feature::Sender(alice.clone())],
    ));
    assert!(b.validate(vec![b.signature(&alice)]).is_ok());

    b.tx.outputs[0] = basic_with(
        AMOUNT,
        0,
        vec![UnlockCondition::Address(alice.clone())],
        vec![Feature::Sender(carol.clone())],
    );
    assert_eq!(
        rejection(b.validate(vec![b.signature(&alice)])),
        ValidationError::SenderFeatureNotUnlocked { output_index: 0 }
    );
}

#[test]
fn test_timelocked_input_spendable_at_future_bounded_slot() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    b.input(basic_with(
        AMOUNT,
        0,
        vec![
            UnlockCondition::Address(alice.clone()),
            UnlockCondition::Timelock(TimelockUnlockCondition { slot: 1000 }),
        ],
        vec![],
    ));
    b.output(basic(AMOUNT, &alice));
    b.commitment(COMMITMENT_SLOT);
    assert!(b.validate(vec![b.signature(&alice)]).is_ok());
}

#[test]
fn test_timelock_needs_declared_commitment() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    b.input(basic_with(
        AMOUNT,
        0,
        vec![
            UnlockCondition::Address(alice.clone()),
            UnlockCondition::Timelock(TimelockUnlockCondition { slot: 995 }),
        ],
        vec![],
    ));
    b.output(basic(AMOUNT, &alice));
    b.resolved.commitment = Some(Commitment::new(COMMITMENT_SLOT));
    assert_eq!(
        rejection(b.validate(vec![b.signature(&alice)])),
        ValidationError::CommitmentNotDeclared
    );

    b.tx.context_inputs.push(ContextInput::Commitment);
    assert!(b.validate(vec![b.signature(&alice)]).is_ok());
}

#[test]
fn test_timelocked_input_rejected_before_its_slot() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    b.input(basic_with(
        AMOUNT,
        0,
        vec![
            UnlockCondition::Address(alice.clone()),
            UnlockCondition::Timelock(TimelockUnlockCondition { slot: 1001 }),
        ],
        vec![],
    ));
    b.output(basic(AMOUNT, &alice));
    assert_eq!(
        rejection(b.validate(vec![b.signature(&alice)])),
        ValidationError::TimelockCommitmentInputMissing { input_index: 0 }
    );

    b.commitment(COMMITMENT_SLOT);
    assert_eq!(
        rejection(b.validate(vec![b.signature(&alice)])),
        ValidationError::TimelockNotExpired {
            input_index: 0,
            timelock_slot: 1001,
            future_bounded_slot: 1000
        }
    );
}

#[test]
fn test_restricted_owner_must_allow_what_the_output_carries() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    let restricted = Address::Restricted(Box::new(ledger_vm::address::RestrictedAddress {
        address: alice.clone(),
        capabilities: ledger_vm::address::AddressCapabilities::NONE,
    }));
    b.input(basic_with(AMOUNT, 5, vec![UnlockCondition::Address(alice.clone())], vec![]));
    b.output(basic_with(AMOUNT, 5, vec![UnlockCondition::Address(restricted)], vec![]));

    assert_eq!(
        rejection(b.validate(vec![b.signature(&alice)])),
        ValidationError::RestrictedAddressCapabilityMissing {
            output_index: 0,
            capability: "mana"
        }
    );
}

#[test]
fn test_inputs_may_not_mix_implicit_account_creation_addresses() {
    let mut b = TxBuilder::new();
    let first = Address::ImplicitAccountCreation(b.key_hash(1));
    let second = Address::ImplicitAccountCreation(b.key_hash(2));
    let carol = b.key(3);
    b.input(basic(AMOUNT, &first));
    b.input(basic(AMOUNT, &second));
    b.output(basic(2 * AMOUNT, &carol));

    let steps = [ExecStep {
        name: "implicit account creation addresses",
        func: exec_single_implicit_account_creation_address,
    }];
    let unlocks = vec![b.signature(&first), b.signature(&second)];
    let result = b.vm.validate_with(&b.signed(unlocks), &b.resolved, &steps);
    assert_eq!(
        rejection(result),
        ValidationError::MultipleImplicitAccountCreationAddresses
    );
}

#[test]
fn test_implicit_account_creation_address_limited_to_plain_basic_outputs() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    let implicit = Address::ImplicitAccountCreation(PublicKeyHash([0x21; 32]));
    b.input(basic(AMOUNT, &alice));
    b.output(basic_with(
        AMOUNT,
        0,
        vec![
            UnlockCondition::Address(implicit),
            UnlockCondition::Timelock(TimelockUnlockCondition { slot: 5000 }),
        ],
        vec![],
    ));

    assert_eq!(
        rejection(b.validate(vec![b.signature(&alice)])),
        ValidationError::ImplicitAccountCreationAddressInvalid { output_index: 0 }
    );
}

#[test]
fn test_unlock_list_is_checked_before_balances() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    b.input(basic(AMOUNT, &alice));
    b.output(basic(AMOUNT + 1, &alice));

    assert_eq!(
        rejection(b.validate(vec![Unlock::Reference(0)])),
        ValidationError::ReferenceUnlockInvalid {
            input_index: 0,
            reference: 0
        }
    );
}
