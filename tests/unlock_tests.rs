//! Unlock validation through the full validator

mod common;

use common::*;
use ledger_vm::address::{Address, MultiAddress, RestrictedAddress, AddressCapabilities, WeightedAddress};
use ledger_vm::output::*;
use ledger_vm::transaction::{TaggedData, Unlock};
use ledger_vm::*;

#[test]
fn test_simple_transfer_accepted() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    let bob = b.key(2);
    b.input(basic(AMOUNT, &alice));
    b.output(basic(AMOUNT, &bob));

    let unlocks = vec![b.signature(&alice)];
    let validated = b.validate(unlocks).unwrap();
    assert_eq!(validated.outputs.len(), 1);
    assert_eq!(validated.outputs[0].0.transaction_id, validated.transaction_id);
    assert!(validated.unlocked_addresses.contains(&alice));
    assert!(!validated.unlocked_addresses.contains(&bob));
}

#[test]
fn test_second_input_of_same_owner_uses_reference() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    b.input(basic(AMOUNT, &alice));
    b.input(basic(AMOUNT, &alice));
    b.output(basic(2 * AMOUNT, &alice));

    let signature = b.signature(&alice);
    assert!(b.validate(vec![signature.clone(), Unlock::Reference(0)]).is_ok());

    assert_eq!(
        rejection(b.validate(vec![signature.clone(), signature])),
        ValidationError::AddressAlreadyUnlocked {
            input_index: 1,
            unlocked_at: 0
        }
    );
}

#[test]
fn test_reference_to_unrelated_input_rejected() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    let bob = b.key(2);
    b.input(basic(AMOUNT, &alice));
    b.input(basic(AMOUNT, &bob));
    b.output(basic(2 * AMOUNT, &alice));

    let unlocks = vec![b.signature(&alice), Unlock::Reference(0)];
    assert_eq!(
        rejection(b.validate(unlocks)),
        ValidationError::ReferenceUnlockInvalid {
            input_index: 1,
            reference: 0
        }
    );
}

#[test]
fn test_signature_of_wrong_key_rejected() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    let bob = b.key(2);
    b.input(basic(AMOUNT, &alice));
    b.output(basic(AMOUNT, &alice));

    let unlocks = vec![b.signature(&bob)];
    assert_eq!(
        rejection(b.validate(unlocks)),
        ValidationError::SignatureAddressMismatch { input_index: 0 }
    );
}

#[test]
fn test_signature_over_other_transaction_rejected() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    b.input(basic(AMOUNT, &alice));
    b.output(basic(AMOUNT, &alice));

    let unlocks = vec![b.signature(&alice)];
    b.tx.payload = Some(TaggedData {
        tag: b"memo".to_vec(),
        data: b"changed after signing".to_vec(),
    });
    assert_eq!(
        rejection(b.validate(unlocks)),
        ValidationError::InvalidSignature { input_index: 0 }
    );
}

#[test]
fn test_restricted_owner_unlocked_by_underlying_signature() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    let restricted = Address::Restricted(Box::new(RestrictedAddress {
        address: alice.clone(),
        capabilities: AddressCapabilities::NONE,
    }));
    b.input(basic(AMOUNT, &restricted));
    b.output(basic(AMOUNT, &alice));

    let unlocks = vec![b.signature(&alice)];
    assert!(b.validate(unlocks).is_ok());
}

fn multi_owner(b: &mut TxBuilder) -> (Address, [Address; 3]) {
    let members = [b.key(1), b.key(2), b.key(3)];
    let multi = Address::Multi(MultiAddress {
        addresses: members
            .iter()
            .map(|address| WeightedAddress {
                address: address.clone(),
                weight: 1,
            })
            .collect(),
        threshold: 2,
    });
    (multi, members)
}

#[test]
fn test_multi_address_threshold() {
    let mut b = TxBuilder::new();
    let (multi, [first, second, _]) = multi_owner(&mut b);
    b.input(basic(AMOUNT, &multi));
    b.input(basic(AMOUNT, &multi));
    b.output(basic(2 * AMOUNT, &first));

    let enough = Unlock::Multi(vec![b.signature(&first), Unlock::Empty, b.signature(&second)]);
    let validated = b.validate(vec![enough, Unlock::Reference(0)]).unwrap();
    assert!(validated.unlocked_addresses.contains(&multi));
    assert!(validated.unlocked_addresses.contains(&first));

    let short = Unlock::Multi(vec![b.signature(&first), Unlock::Empty, Unlock::Empty]);
    assert_eq!(
        rejection(b.validate(vec![short, Unlock::Reference(0)])),
        ValidationError::MultiAddressThresholdNotReached {
            input_index: 0,
            weight: 1,
            threshold: 2
        }
    );
}

#[test]
fn test_multi_unlock_must_cover_every_member() {
    let mut b = TxBuilder::new();
    let (multi, [first, second, _]) = multi_owner(&mut b);
    b.input(basic(AMOUNT, &multi));
    b.output(basic(AMOUNT, &first));

    let unlock = Unlock::Multi(vec![b.signature(&first), b.signature(&second)]);
    assert_eq!(
        rejection(b.validate(vec![unlock])),
        ValidationError::MultiAddressLengthMismatch {
            input_index: 0,
            addresses: 3,
            unlocks: 2
        }
    );
}

/// Input 0 is an account owned by alice; input 1 is owned by the account.
fn account_owned_inputs(b: &mut TxBuilder) -> (Address, AccountId) {
    let alice = b.key(1);
    let account_id = AccountId([0x42; 32]);
    b.input(Output::Account(account(account_id, &alice)));
    b.input(basic(AMOUNT, &Address::Account(account_id)));
    b.output(Output::Account(account(account_id, &alice)));
    b.output(basic(AMOUNT, &alice));
    (alice, account_id)
}

#[test]
fn test_chain_owned_input_unlocked_by_account_unlock() {
    let mut b = TxBuilder::new();
    let (alice, account_id) = account_owned_inputs(&mut b);

    let unlocks = vec![b.signature(&alice), Unlock::Account(0)];
    let validated = b.validate(unlocks).unwrap();
    let entry = validated
        .unlocked_addresses
        .get(&Address::Account(account_id))
        .unwrap();
    assert_eq!(entry.unlocked_at, 0);
    assert!(entry.referenced_by.contains(&1));
}

#[test]
fn test_chain_unlock_must_point_at_the_chain_input() {
    let mut b = TxBuilder::new();
    let (alice, _) = account_owned_inputs(&mut b);

    let unlocks = vec![b.signature(&alice), Unlock::Account(1)];
    assert_eq!(
        rejection(b.validate(unlocks)),
        ValidationError::ChainAddressNotUnlocked {
            input_index: 1,
            reference: 1
        }
    );

    let unlocks = vec![b.signature(&alice), Unlock::Nft(0)];
    assert_eq!(
        rejection(b.validate(unlocks)),
        ValidationError::UnlockKindMismatch {
            input_index: 1,
            address_kind: "account",
            unlock_kind: "nft"
        }
    );
}

fn expiring_input(b: &mut TxBuilder, expiry: SlotIndex) -> (Address, Address) {
    let alice = b.key(1);
    let bob = b.key(2);
    b.input(basic_with(
        AMOUNT,
        0,
        vec![
            UnlockCondition::Address(alice.clone()),
            UnlockCondition::Expiration(ExpirationUnlockCondition {
                return_address: bob.clone(),
                slot: expiry,
            }),
        ],
        vec![],
    ));
    b.output(basic(AMOUNT, &bob));
    (alice, bob)
}

#[test]
fn test_expired_output_belongs_to_return_address() {
    let mut b = TxBuilder::new();
    let (alice, bob) = expiring_input(&mut b, 995);
    b.commitment(COMMITMENT_SLOT);

    assert!(b.validate(vec![b.signature(&bob)]).is_ok());
    assert_eq!(
        rejection(b.validate(vec![b.signature(&alice)])),
        ValidationError::SignatureAddressMismatch { input_index: 0 }
    );
}

#[test]
fn test_unexpired_output_belongs_to_primary_address() {
    let mut b = TxBuilder::new();
    let (alice, _) = expiring_input(&mut b, 1020);
    b.commitment(COMMITMENT_SLOT);

    assert!(b.validate(vec![b.signature(&alice)]).is_ok());
}

#[test]
fn test_expiration_inside_uncertainty_window_is_locked() {
    let mut b = TxBuilder::new();
    let (alice, _) = expiring_input(&mut b, 1005);
    b.commitment(COMMITMENT_SLOT);

    assert_eq!(
        rejection(b.validate(vec![b.signature(&alice)])),
        ValidationError::ExpirationNotUnlockable {
            input_index: 0,
            expiry_slot: 1005
        }
    );
}

#[test]
fn test_expiration_needs_commitment() {
    let mut b = TxBuilder::new();
    let (alice, _) = expiring_input(&mut b, 1020);

    assert_eq!(
        rejection(b.validate(vec![b.signature(&alice)])),
        ValidationError::ExpirationCommitmentInputMissing { input_index: 0 }
    );
}

#[test]
fn test_unlock_count_must_match_inputs() {
    let mut b = TxBuilder::new();
    let alice = b.key(1);
    b.input(basic(AMOUNT, &alice));
    b.output(basic(AMOUNT, &alice));

    assert_eq!(
        rejection(b.validate(vec![])),
        ValidationError::UnlockCountMismatch {
            inputs: 1,
            unlocks: 0
        }
    );
}

#[test]
fn test_multi_member_signature_cannot_be_referenced() {
    let mut b = TxBuilder::new();
    let (multi, [first, second, _]) = multi_owner(&mut b);
    b.input(basic(AMOUNT, &multi));
    b.input(basic(AMOUNT, &first));
    b.output(basic(2 * AMOUNT, &first));

    let signed = Unlock::Multi(vec![b.signature(&first), b.signature(&second), Unlock::Empty]);
    assert_eq!(
        rejection(b.validate(vec![signed.clone(), Unlock::Reference(0)])),
        ValidationError::ReferenceUnlockInvalid {
            input_index: 1,
            reference: 0
        }
    );

    let validated = b.validate(vec![signed, b.signature(&first)]).unwrap();
    let entry = validated.unlocked_addresses.get(&first).unwrap();
    assert_eq!(entry.unlocked_at, 1);
    assert!(entry.direct);
}

#[test]
fn test_commitment_without_context_input_rejected() {
    let mut b = TxBuilder::new();
    let (_, bob) = expiring_input(&mut b, 995);
    b.resolved.commitment = Some(Commitment::new(COMMITMENT_SLOT));

    assert_eq!(
        rejection(b.validate(vec![b.signature(&bob)])),
        ValidationError::CommitmentNotDeclared
    );
}
