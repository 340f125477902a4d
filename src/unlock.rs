//! Unlock validation
//!
//! Proves every consumed output is authorized by the transaction's unlocks
//! and produces the table of unlocked addresses later steps consult.

use crate::address::{Address, MultiAddress, PublicKeyHash};
use crate::constants::{PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use crate::error::{InvariantViolation, Result, ValidationError};
use crate::output::{AnchorOutput, ChainOutput, Output};
use crate::transaction::{SignatureUnlock, Unlock};
use crate::types::*;
use crate::working_set::{InputRef, UnlockedAddresses, WorkingSet};
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, Verification};

/// ValidateUnlocks: WorkingSet → UnlockedAddresses
///
/// For every input i, in order:
/// 1. owner(i) is the address currently entitled to the output (expiration
///    and anchor state/governance rules applied)
/// 2. unlock(i) must authorize owner(i) given the addresses unlocked by
///    inputs 0..i
/// 3. if input i is an account, NFT or state-transitioning anchor, its chain
///    address becomes unlocked at index i
pub fn validate_unlocks(ws: &WorkingSet<'_>) -> Result<UnlockedAddresses> {
    if ws.unlocks.len() != ws.inputs.len() {
        return Err(ValidationError::UnlockCountMismatch {
            inputs: ws.inputs.len(),
            unlocks: ws.unlocks.len(),
        }
        .into());
    }

    let mut unlocker = Unlocker {
        secp: Secp256k1::verification_only(),
        message: &ws.signing_message,
        unlocked: UnlockedAddresses::default(),
    };

    for (input_index, (input, unlock)) in ws.inputs.iter().zip(ws.unlocks).enumerate() {
        let owner = owner_of(ws, input_index, input)?;
        unlocker.unlock(input_index, &owner, unlock)?;
        tracing::trace!(
            input_index,
            owner = %owner,
            unlock = unlock.kind_name(),
            "input unlocked"
        );

        if let Some(chain_id) = input.chain_id {
            if unlocks_chain_address(ws, input) {
                if let Some(address) = Address::from_chain_id(&chain_id) {
                    unlocker.unlocked.insert(address, input_index as u16);
                }
            }
        }
    }

    Ok(unlocker.unlocked)
}

/// Address entitled to unlock an input.
///
/// Expiration: the return address owns the output once `expiry ≤
/// future_bounded`, the primary address while `expiry > past_bounded`;
/// in between nobody can unlock it.
pub fn owner_of(ws: &WorkingSet<'_>, input_index: usize, input: &InputRef<'_>) -> Result<Address> {
    let output = input.output;
    let conditions = output.unlock_conditions();
    let missing = |condition| InvariantViolation::MissingUnlockCondition {
        output_kind: output.kind_name(),
        condition,
    };

    match output {
        Output::Anchor(anchor) => {
            if is_anchor_state_transition(ws, input, anchor) {
                Ok(conditions
                    .state_controller()
                    .ok_or(missing("state controller address"))?
                    .clone())
            } else {
                Ok(conditions
                    .governor()
                    .ok_or(missing("governor address"))?
                    .clone())
            }
        }
        Output::Foundry(foundry) => Ok(Address::Account(
            foundry
                .account_id()
                .ok_or(missing("immutable account address"))?,
        )),
        Output::Basic(_) | Output::Account(_) | Output::Nft(_) | Output::Delegation(_) => {
            let address = conditions.address().ok_or(missing("address"))?;
            let Some(expiration) = conditions.expiration() else {
                return Ok(address.clone());
            };
            let commitment = ws
                .commitment
                .ok_or(ValidationError::ExpirationCommitmentInputMissing { input_index })?;

            if expiration.slot <= ws.params.future_bounded_slot(commitment.slot) {
                Ok(expiration.return_address.clone())
            } else if expiration.slot > ws.params.past_bounded_slot(commitment.slot) {
                Ok(address.clone())
            } else {
                Err(ValidationError::ExpirationNotUnlockable {
                    input_index,
                    expiry_slot: expiration.slot,
                }
                .into())
            }
        }
    }
}

/// An anchor performs a state transition when its successor exists with a
/// different state index; otherwise it is governed (or destroyed).
fn is_anchor_state_transition(ws: &WorkingSet<'_>, input: &InputRef<'_>, current: &AnchorOutput) -> bool {
    input
        .chain_id
        .and_then(|chain_id| ws.out_chains.get(&chain_id))
        .map_or(false, |entry| {
            matches!(entry.output, ChainOutput::Anchor(next) if next.state_index != current.state_index)
        })
}

fn unlocks_chain_address(ws: &WorkingSet<'_>, input: &InputRef<'_>) -> bool {
    match input.output {
        Output::Anchor(anchor) => is_anchor_state_transition(ws, input, anchor),
        Output::Account(_) | Output::Nft(_) => true,
        Output::Basic(basic) => basic.is_implicit_account(),
        Output::Foundry(_) | Output::Delegation(_) => false,
    }
}

struct Unlocker<'m, C: Verification> {
    secp: Secp256k1<C>,
    message: &'m Hash,
    unlocked: UnlockedAddresses,
}

impl<C: Verification> Unlocker<'_, C> {
    fn unlock(&mut self, input_index: usize, owner: &Address, unlock: &Unlock) -> Result<()> {
        self.unlock_as(input_index, owner, unlock, true)
    }

    /// `direct` is false for members signing inside a multi unlock.
    fn unlock_as(&mut self, input_index: usize, owner: &Address, unlock: &Unlock, direct: bool) -> Result<()> {
        match owner {
            Address::Secp256k1(hash) | Address::ImplicitAccountCreation(hash) => {
                self.unlock_direct(input_index, owner, hash, unlock, direct)
            }
            Address::Account(_) | Address::Anchor(_) | Address::Nft(_) => {
                self.unlock_chain(input_index, owner, unlock)
            }
            Address::Multi(multi) => self.unlock_multi(input_index, owner, multi, unlock),
            Address::Restricted(restricted) => {
                self.unlock_as(input_index, &restricted.address, unlock, direct)
            }
        }
    }

    fn unlock_direct(
        &mut self,
        input_index: usize,
        address: &Address,
        hash: &PublicKeyHash,
        unlock: &Unlock,
        direct: bool,
    ) -> Result<()> {
        match unlock {
            Unlock::Signature(signature) => {
                if let Some(entry) = self.unlocked.get(address) {
                    if direct && entry.direct {
                        return Err(ValidationError::AddressAlreadyUnlocked {
                            input_index,
                            unlocked_at: entry.unlocked_at,
                        }
                        .into());
                    }
                }
                if PublicKeyHash::from_public_key(&signature.public_key) != *hash {
                    return Err(ValidationError::SignatureAddressMismatch { input_index }.into());
                }
                if !verify_signature(&self.secp, self.message, signature) {
                    return Err(ValidationError::InvalidSignature { input_index }.into());
                }
                if direct {
                    self.unlocked.insert(address.clone(), input_index as u16);
                } else {
                    self.unlocked.insert_indirect(address.clone(), input_index as u16);
                }
                Ok(())
            }
            Unlock::Reference(reference) => self.check_reference(input_index, address, *reference),
            other => Err(kind_mismatch(input_index, address, other)),
        }
    }

    fn unlock_chain(&mut self, input_index: usize, address: &Address, unlock: &Unlock) -> Result<()> {
        let reference = match (address, unlock) {
            (Address::Account(_), Unlock::Account(r))
            | (Address::Anchor(_), Unlock::Anchor(r))
            | (Address::Nft(_), Unlock::Nft(r)) => *r,
            (_, other) => return Err(kind_mismatch(input_index, address, other)),
        };
        match self.unlocked.get(address) {
            Some(entry) if entry.unlocked_at == reference => {
                self.unlocked.add_reference(address, input_index as u16);
                Ok(())
            }
            _ => Err(ValidationError::ChainAddressNotUnlocked {
                input_index,
                reference,
            }
            .into()),
        }
    }

    fn unlock_multi(
        &mut self,
        input_index: usize,
        address: &Address,
        multi: &MultiAddress,
        unlock: &Unlock,
    ) -> Result<()> {
        let members = match unlock {
            Unlock::Reference(reference) => {
                return self.check_reference(input_index, address, *reference)
            }
            Unlock::Multi(members) => members,
            other => return Err(kind_mismatch(input_index, address, other)),
        };

        if let Some(entry) = self.unlocked.get(address) {
            return Err(ValidationError::AddressAlreadyUnlocked {
                input_index,
                unlocked_at: entry.unlocked_at,
            }
            .into());
        }
        if members.len() != multi.addresses.len() {
            return Err(ValidationError::MultiAddressLengthMismatch {
                input_index,
                addresses: multi.addresses.len(),
                unlocks: members.len(),
            }
            .into());
        }

        let mut weight: u32 = 0;
        for (member, member_unlock) in multi.addresses.iter().zip(members) {
            match member_unlock {
                Unlock::Empty => continue,
                Unlock::Multi(_) => {
                    return Err(kind_mismatch(input_index, &member.address, member_unlock))
                }
                _ => {
                    self.unlock_as(input_index, &member.address, member_unlock, false)?;
                    weight += member.weight as u32;
                }
            }
        }
        if weight < multi.threshold as u32 {
            return Err(ValidationError::MultiAddressThresholdNotReached {
                input_index,
                weight,
                threshold: multi.threshold,
            }
            .into());
        }

        self.unlocked.insert(address.clone(), input_index as u16);
        Ok(())
    }

    /// A reference is valid iff input `reference` unlocked `address` itself,
    /// not as a member of a multi unlock.
    fn check_reference(&mut self, input_index: usize, address: &Address, reference: u16) -> Result<()> {
        match self.unlocked.get(address) {
            Some(entry) if entry.direct && entry.unlocked_at == reference => {
                self.unlocked.add_reference(address, input_index as u16);
                Ok(())
            }
            _ => Err(ValidationError::ReferenceUnlockInvalid {
                input_index,
                reference,
            }
            .into()),
        }
    }
}

fn kind_mismatch(input_index: usize, address: &Address, unlock: &Unlock) -> crate::error::VmError {
    ValidationError::UnlockKindMismatch {
        input_index,
        address_kind: address.kind_name(),
        unlock_kind: unlock.kind_name(),
    }
    .into()
}

/// Verify a compact ECDSA signature over `message` with a compressed public key.
pub fn verify_signature<C: Verification>(
    secp: &Secp256k1<C>,
    message: &Hash,
    unlock: &SignatureUnlock,
) -> bool {
    if unlock.public_key.len() != PUBLIC_KEY_LENGTH || unlock.signature.len() != SIGNATURE_LENGTH {
        return false;
    }
    let public_key = match PublicKey::from_slice(&unlock.public_key) {
        Ok(pk) => pk,
        Err(_) => return false,
    };
    let signature = match Signature::from_compact(&unlock.signature) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    let message = match Message::from_digest_slice(message) {
        Ok(msg) => msg,
        Err(_) => return false,
    };
    secp.verify_ecdsa(&message, &signature, &public_key).is_ok()
}
