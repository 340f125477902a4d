//! Mana and storage economics
//!
//! Mana decays per epoch by a fixed-point factor and is generated per slot
//! by held base tokens. Storage deposits scale with an output's storage score.
//! All arithmetic is exact fixed-width integer math; overflow rejects.

use crate::address::Address;
use crate::config::{ManaParameters, ProtocolParameters};
use crate::error::{Result, ValidationError, VmError};
use crate::output::*;
use crate::token_scheme::TokenScheme;
use crate::transaction::Allotment;
use crate::types::*;
use std::collections::HashMap;

/// Decay: ℕ × ℕ → ℕ
///
/// decay(v, n) = ⌊v × (factor / 2^exponent)^n⌋
///
/// The power is taken by square-and-multiply, truncating after every step.
pub fn decay(value: Mana, epochs: EpochIndex, params: &ManaParameters) -> Result<Mana> {
    if value == 0 || epochs == 0 {
        return Ok(value);
    }
    let shift = params.decay_factor_exponent as u32;
    let mut base = params.decay_factor as u128;
    let mut acc: u128 = 1 << shift;
    let mut n = epochs;

    while n > 0 {
        if n & 1 == 1 {
            acc = acc.checked_mul(base).ok_or(ValidationError::ManaOverflow)? >> shift;
        }
        n >>= 1;
        if n > 0 {
            base = base.checked_mul(base).ok_or(ValidationError::ManaOverflow)? >> shift;
        }
    }

    let decayed = (value as u128)
        .checked_mul(acc)
        .ok_or(ValidationError::ManaOverflow)?
        >> shift;
    Ok(Mana::try_from(decayed).map_err(|_| ValidationError::ManaOverflow)?)
}

/// Mana generated by `amount` base tokens over `slots` slots, without decay.
pub fn generate_mana(amount: BaseToken, slots: SlotIndex, params: &ManaParameters) -> Result<Mana> {
    let generated = (amount as u128)
        .checked_mul(params.generation_rate as u128)
        .and_then(|v| v.checked_mul(slots as u128))
        .ok_or(ValidationError::ManaOverflow)?
        >> params.generation_rate_exponent;
    Ok(Mana::try_from(generated).map_err(|_| ValidationError::ManaOverflow)?)
}

/// DecayManaBySlots: stored mana created in `creation_slot`, decayed up to
/// `target_slot` by the number of epoch boundaries crossed.
pub fn decay_mana_by_slots(
    mana: Mana,
    creation_slot: SlotIndex,
    target_slot: SlotIndex,
    params: &ProtocolParameters,
) -> Result<Mana> {
    if creation_slot > target_slot {
        return Err(ValidationError::ManaDecayCreationAfterTarget {
            creation_slot,
            target_slot,
        }
        .into());
    }
    let epochs = params.epoch_from_slot(target_slot) - params.epoch_from_slot(creation_slot);
    decay(mana, epochs, &params.mana)
}

/// Mana generated by `amount` between `creation_slot` and `target_slot`,
/// each epoch's generation decayed for the epochs that follow it.
pub fn generate_mana_and_decay_by_slots(
    amount: BaseToken,
    creation_slot: SlotIndex,
    target_slot: SlotIndex,
    params: &ProtocolParameters,
) -> Result<Mana> {
    if creation_slot > target_slot {
        return Err(ValidationError::ManaDecayCreationAfterTarget {
            creation_slot,
            target_slot,
        }
        .into());
    }
    let creation_epoch = params.epoch_from_slot(creation_slot);
    let target_epoch = params.epoch_from_slot(target_slot);
    if creation_epoch == target_epoch {
        return generate_mana(amount, target_slot - creation_slot, &params.mana);
    }

    let first_slots = params.epoch_start(creation_epoch + 1) - creation_slot;
    let last_slots = target_slot - params.epoch_start(target_epoch);

    let mut acc = generate_mana(amount, first_slots, &params.mana)?;
    let full_epoch = generate_mana(amount, params.slots_per_epoch(), &params.mana)?;
    for _ in creation_epoch + 1..target_epoch {
        acc = decay(acc, 1, &params.mana)?
            .checked_add(full_epoch)
            .ok_or(ValidationError::ManaOverflow)?;
    }
    let last = generate_mana(amount, last_slots, &params.mana)?;
    Ok(decay(acc, 1, &params.mana)?
        .checked_add(last)
        .ok_or(ValidationError::ManaOverflow)?)
}

/// Structural byte size of an output, as charged by the storage score.
fn address_size(address: &Address) -> u64 {
    1 + match address {
        Address::Secp256k1(_)
        | Address::ImplicitAccountCreation(_)
        | Address::Account(_)
        | Address::Anchor(_)
        | Address::Nft(_) => 32,
        Address::Multi(multi) => {
            3 + multi
                .addresses
                .iter()
                .map(|member| address_size(&member.address) + 1)
                .sum::<u64>()
        }
        Address::Restricted(restricted) => address_size(&restricted.address) + 2,
    }
}

fn unlock_conditions_size(conditions: &UnlockConditions) -> u64 {
    1 + conditions
        .iter()
        .map(|condition| {
            1 + match condition {
                UnlockCondition::Address(address)
                | UnlockCondition::StateControllerAddress(address)
                | UnlockCondition::GovernorAddress(address) => address_size(address),
                UnlockCondition::StorageDepositReturn(sdr) => address_size(&sdr.return_address) + 8,
                UnlockCondition::Timelock(_) => 4,
                UnlockCondition::Expiration(exp) => address_size(&exp.return_address) + 4,
                UnlockCondition::ImmutableAccountAddress(_) => 33,
            }
        })
        .sum::<u64>()
}

fn metadata_size(metadata: &MetadataFeature) -> u64 {
    1 + metadata
        .entries
        .iter()
        .map(|(key, value)| 1 + key.len() as u64 + 2 + value.len() as u64)
        .sum::<u64>()
}

fn features_size(features: &Features) -> u64 {
    1 + features
        .iter()
        .map(|feature| {
            1 + match feature {
                Feature::Sender(address) | Feature::Issuer(address) => address_size(address),
                Feature::Metadata(metadata) | Feature::StateMetadata(metadata) => {
                    metadata_size(metadata)
                }
                Feature::Tag(tag) => 1 + tag.len() as u64,
                Feature::NativeToken(_) => 38 + 32,
                Feature::BlockIssuer(bif) => 4 + 1 + 33 * bif.keys.len() as u64,
                Feature::Staking(_) => 8 + 8 + 4 + 4,
            }
        })
        .sum::<u64>()
}

fn output_size(output: &Output) -> u64 {
    let common = 1 + 8 + unlock_conditions_size(output.unlock_conditions());
    common
        + match output {
            Output::Basic(o) => 8 + features_size(&o.features),
            Output::Account(o) => {
                8 + 32 + 4 + features_size(&o.features) + features_size(&o.immutable_features)
            }
            Output::Anchor(o) => {
                8 + 32 + 4 + features_size(&o.features) + features_size(&o.immutable_features)
            }
            Output::Foundry(o) => {
                let scheme = match o.token_scheme {
                    TokenScheme::Simple(_) => 1 + 3 * 32,
                };
                4 + scheme + features_size(&o.features) + features_size(&o.immutable_features)
            }
            Output::Nft(o) => {
                8 + 32 + features_size(&o.features) + features_size(&o.immutable_features)
            }
            Output::Delegation(_) => 8 + 32 + 32 + 4 + 4,
        }
}

/// StorageScore(o) = offset_output_overhead + factor_data × |o| + offsets(o)
///
/// Offsets are charged per block issuer key, for a staking feature, for
/// delegation outputs and for basic outputs that will become implicit accounts.
pub fn storage_score(output: &Output, params: &ProtocolParameters) -> Result<u64> {
    let p = &params.storage_score;
    let mut offsets = 0u64;
    if let Some(bif) = output.features().block_issuer() {
        offsets = offsets.saturating_add(p.offset_block_issuer_key.saturating_mul(bif.keys.len() as u64));
    }
    if output.features().staking().is_some() {
        offsets = offsets.saturating_add(p.offset_staking_feature);
    }
    match output {
        Output::Delegation(_) => offsets = offsets.saturating_add(p.offset_delegation),
        Output::Basic(basic) if basic.is_implicit_account() => {
            offsets = offsets.saturating_add(p.offset_implicit_account_creation_address)
        }
        _ => {}
    }

    (p.factor_data as u64)
        .checked_mul(output_size(output))
        .and_then(|data| data.checked_add(p.offset_output_overhead))
        .and_then(|score| score.checked_add(offsets))
        .ok_or_else(|| VmError::from(ValidationError::BaseTokenOverflow))
}

/// MinDeposit(o) = storage_cost × StorageScore(o)
pub fn min_deposit(output: &Output, params: &ProtocolParameters) -> Result<BaseToken> {
    storage_score(output, params)?
        .checked_mul(params.storage_score.storage_cost)
        .ok_or_else(|| VmError::from(ValidationError::BaseTokenOverflow))
}

/// PotentialMana: mana generated by the part of an output's amount that is
/// not tied up as storage deposit. Delegations generate none.
pub fn potential_mana(
    output: &Output,
    creation_slot: SlotIndex,
    target_slot: SlotIndex,
    params: &ProtocolParameters,
) -> Result<Mana> {
    if matches!(output, Output::Delegation(_)) {
        return Ok(0);
    }
    let excess = output.amount().saturating_sub(min_deposit(output, params)?);
    generate_mana_and_decay_by_slots(excess, creation_slot, target_slot, params)
}

/// Stored mana decayed to `target_slot` plus potential mana of one input.
pub fn input_mana(
    output_id: &OutputId,
    output: &Output,
    target_slot: SlotIndex,
    params: &ProtocolParameters,
) -> Result<Mana> {
    let creation_slot = output_id.creation_slot();
    let stored = decay_mana_by_slots(output.mana(), creation_slot, target_slot, params)?;
    let potential = potential_mana(output, creation_slot, target_slot, params)?;
    Ok(stored
        .checked_add(potential)
        .ok_or(ValidationError::ManaOverflow)?)
}

/// TotalManaIn = Σ (decayed stored + potential mana of each input) + Σ rewards
pub fn total_mana_in<'a>(
    inputs: impl IntoIterator<Item = (&'a OutputId, &'a Output)>,
    rewards: &HashMap<ChainId, Mana>,
    target_slot: SlotIndex,
    params: &ProtocolParameters,
) -> Result<Mana> {
    let mut total: Mana = 0;
    for (output_id, output) in inputs {
        let mana = input_mana(output_id, output, target_slot, params)?;
        total = total.checked_add(mana).ok_or(ValidationError::ManaOverflow)?;
    }
    for reward in rewards.values() {
        total = total.checked_add(*reward).ok_or(ValidationError::ManaOverflow)?;
    }
    Ok(total)
}

/// TotalManaOut = Σ stored mana of outputs + Σ allotments
pub fn total_mana_out(outputs: &[Output], allotments: &[Allotment]) -> Result<Mana> {
    let stored = outputs.iter().map(Output::mana);
    let allotted = allotments.iter().map(|allotment| allotment.mana);
    stored.chain(allotted).try_fold(0 as Mana, |total, mana| {
        total
            .checked_add(mana)
            .ok_or_else(|| VmError::from(ValidationError::ManaOverflow))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::PublicKeyHash;

    fn basic(amount: BaseToken, mana: Mana, address: Address) -> Output {
        Output::Basic(BasicOutput {
            amount,
            mana,
            unlock_conditions: UnlockConditions::new(vec![UnlockCondition::Address(address)]),
            features: Features::default(),
        })
    }

    fn signer() -> Address {
        Address::Secp256k1(PublicKeyHash([1; 32]))
    }

    #[test]
    fn test_decay_zero_epochs_is_identity() {
        let params = ManaParameters::default();
        assert_eq!(decay(1_000_000, 0, &params).unwrap(), 1_000_000);
        assert_eq!(decay(0, 100, &params).unwrap(), 0);
    }

    #[test]
    fn test_decay_is_monotone_in_epochs() {
        let params = ManaParameters::default();
        let one = decay(1_000_000_000, 1, &params).unwrap();
        let ten = decay(1_000_000_000, 10, &params).unwrap();
        assert!(one < 1_000_000_000);
        assert!(ten < one);
    }

    #[test]
    fn test_decay_square_and_multiply_matches_repeated_application_bound() {
        // truncation per step means the stepwise value never exceeds the direct power
        let params = ManaParameters::default();
        let mut stepwise = 1_000_000_000u64;
        for _ in 0..5 {
            stepwise = decay(stepwise, 1, &params).unwrap();
        }
        let direct = decay(1_000_000_000, 5, &params).unwrap();
        assert!(stepwise.abs_diff(direct) <= 5);
    }

    #[test]
    fn test_generation_within_one_epoch() {
        let params = ProtocolParameters::default();
        // rate 1 / 2^17 per token per slot
        let mana = generate_mana_and_decay_by_slots(1 << 17, 100, 110, &params).unwrap();
        assert_eq!(mana, 10);
    }

    #[test]
    fn test_generation_across_epochs_is_less_than_undecayed() {
        let params = ProtocolParameters::default();
        let start = 100;
        let end = params.epoch_start(3) + 50;
        let decayed = generate_mana_and_decay_by_slots(1 << 30, start, end, &params).unwrap();
        let undecayed = generate_mana(1 << 30, end - start, &params.mana).unwrap();
        assert!(decayed < undecayed);
        assert!(decayed > 0);
    }

    #[test]
    fn test_creation_after_target_rejected() {
        let params = ProtocolParameters::default();
        assert!(matches!(
            decay_mana_by_slots(10, 20, 10, &params),
            Err(VmError::Rejected(ValidationError::ManaDecayCreationAfterTarget { .. }))
        ));
    }

    #[test]
    fn test_min_deposit_grows_with_offsets() {
        let params = ProtocolParameters::default();
        let plain = min_deposit(&basic(1, 0, signer()), &params).unwrap();
        let implicit = min_deposit(
            &basic(1, 0, Address::ImplicitAccountCreation(PublicKeyHash([1; 32]))),
            &params,
        )
        .unwrap();
        assert_eq!(
            implicit - plain,
            params.storage_score.offset_implicit_account_creation_address
                * params.storage_score.storage_cost
        );
    }

    #[test]
    fn test_potential_mana_ignores_deposit_part() {
        let params = ProtocolParameters::default();
        let output = basic(1, 0, signer());
        // amount below the deposit generates nothing
        assert_eq!(potential_mana(&output, 0, 1_000, &params).unwrap(), 0);
    }

    #[test]
    fn test_totals() {
        let params = ProtocolParameters::default();
        let id = OutputId::new(TransactionId::new([1; 32], 50), 0);
        let input = basic(1_000_000, 700, signer());
        let rewards = HashMap::from([(ChainId::Account(AccountId([2; 32])), 30)]);
        let total_in = total_mana_in([(&id, &input)], &rewards, 50, &params).unwrap();
        assert_eq!(total_in, 730);

        let outputs = vec![basic(1_000_000, 600, signer())];
        let allotments = vec![Allotment {
            account_id: AccountId([2; 32]),
            mana: 130,
        }];
        assert_eq!(total_mana_out(&outputs, &allotments).unwrap(), 730);
    }
}
