//! Protocol parameters for ledger-vm
//!
//! Provides the parameters transaction validation depends on: time
//! (slots, epochs, committable ages), mana generation and decay, and the
//! storage score used to compute minimum deposits. These settings can be
//! loaded from JSON files, environment variables, or passed programmatically.

use crate::constants::MAX_SLOT;
use crate::types::*;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Mana generation and decay parameters
///
/// Both are fixed-point: a value `v` is scaled by `factor >> exponent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManaParameters {
    /// Mana generated per base token per slot, scaled by `2^-generation_rate_exponent`
    #[serde(default = "default_generation_rate")]
    pub generation_rate: u8,

    #[serde(default = "default_generation_rate_exponent")]
    pub generation_rate_exponent: u8,

    /// Fraction of mana retained per epoch, scaled by `2^-decay_factor_exponent`
    #[serde(default = "default_decay_factor")]
    pub decay_factor: u32,

    #[serde(default = "default_decay_factor_exponent")]
    pub decay_factor_exponent: u8,
}

fn default_generation_rate() -> u8 {
    1
}

fn default_generation_rate_exponent() -> u8 {
    17
}

fn default_decay_factor() -> u32 {
    // ~0.99985 per epoch
    4_294_323_000
}

fn default_decay_factor_exponent() -> u8 {
    32
}

impl Default for ManaParameters {
    fn default() -> Self {
        Self {
            generation_rate: default_generation_rate(),
            generation_rate_exponent: default_generation_rate_exponent(),
            decay_factor: default_decay_factor(),
            decay_factor_exponent: default_decay_factor_exponent(),
        }
    }
}

/// Storage score parameters
///
/// MinDeposit(o) = storage_cost × (offset_output_overhead + factor_data × |o| + offsets(o))
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageScoreParameters {
    /// Base tokens required per unit of storage score
    #[serde(default = "default_storage_cost")]
    pub storage_cost: BaseToken,

    #[serde(default = "default_factor_data")]
    pub factor_data: u8,

    #[serde(default = "default_offset_output_overhead")]
    pub offset_output_overhead: u64,

    /// Offset per block issuer key
    #[serde(default = "default_offset_block_issuer_key")]
    pub offset_block_issuer_key: u64,

    #[serde(default = "default_offset_staking_feature")]
    pub offset_staking_feature: u64,

    #[serde(default = "default_offset_delegation")]
    pub offset_delegation: u64,

    /// Offset charged to a basic output owned by an implicit account creation
    /// address, so that it covers the account it will become
    #[serde(default = "default_offset_implicit_account_creation_address")]
    pub offset_implicit_account_creation_address: u64,
}

fn default_storage_cost() -> BaseToken {
    100
}

fn default_factor_data() -> u8 {
    1
}

fn default_offset_output_overhead() -> u64 {
    10
}

fn default_offset_block_issuer_key() -> u64 {
    100
}

fn default_offset_staking_feature() -> u64 {
    100
}

fn default_offset_delegation() -> u64 {
    100
}

fn default_offset_implicit_account_creation_address() -> u64 {
    400
}

impl Default for StorageScoreParameters {
    fn default() -> Self {
        Self {
            storage_cost: default_storage_cost(),
            factor_data: default_factor_data(),
            offset_output_overhead: default_offset_output_overhead(),
            offset_block_issuer_key: default_offset_block_issuer_key(),
            offset_staking_feature: default_offset_staking_feature(),
            offset_delegation: default_offset_delegation(),
            offset_implicit_account_creation_address:
                default_offset_implicit_account_creation_address(),
        }
    }
}

/// Protocol parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParameters {
    /// Network a transaction must name to be valid
    #[serde(default = "default_network_id")]
    pub network_id: u64,

    /// Total supply of base tokens
    #[serde(default = "default_token_supply")]
    pub token_supply: BaseToken,

    /// An epoch lasts `2^slots_per_epoch_exponent` slots
    #[serde(default = "default_slots_per_epoch_exponent")]
    pub slots_per_epoch_exponent: u8,

    /// Minimum age (in slots) of a commitment a transaction may reference
    #[serde(default = "default_min_committable_age")]
    pub min_committable_age: SlotIndex,

    /// Maximum age (in slots) of a commitment a transaction may reference
    #[serde(default = "default_max_committable_age")]
    pub max_committable_age: SlotIndex,

    /// Slots before the end of an epoch after which registration targets the
    /// epoch after next
    #[serde(default = "default_epoch_nearing_threshold")]
    pub epoch_nearing_threshold: SlotIndex,

    /// Epochs a staking feature stays locked after being (re)committed
    #[serde(default = "default_staking_unbonding_period")]
    pub staking_unbonding_period: EpochIndex,

    #[serde(default)]
    pub mana: ManaParameters,

    #[serde(default)]
    pub storage_score: StorageScoreParameters,
}

fn default_network_id() -> u64 {
    0x1ed9_e7a3_0f3c_bd55
}

fn default_token_supply() -> BaseToken {
    4_600_000_000_000_000
}

fn default_slots_per_epoch_exponent() -> u8 {
    13
}

fn default_min_committable_age() -> SlotIndex {
    10
}

fn default_max_committable_age() -> SlotIndex {
    20
}

fn default_epoch_nearing_threshold() -> SlotIndex {
    60
}

fn default_staking_unbonding_period() -> EpochIndex {
    10
}

impl Default for ProtocolParameters {
    fn default() -> Self {
        Self {
            network_id: default_network_id(),
            token_supply: default_token_supply(),
            slots_per_epoch_exponent: default_slots_per_epoch_exponent(),
            min_committable_age: default_min_committable_age(),
            max_committable_age: default_max_committable_age(),
            epoch_nearing_threshold: default_epoch_nearing_threshold(),
            staking_unbonding_period: default_staking_unbonding_period(),
            mana: ManaParameters::default(),
            storage_score: StorageScoreParameters::default(),
        }
    }
}

impl ProtocolParameters {
    /// Parse parameters from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let params: Self =
            serde_json::from_str(json).context("failed to parse protocol parameters")?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read protocol parameters from {}", path.display()))?;
        Self::from_json_str(&json)
    }

    /// Load parameters from environment variables
    ///
    /// Environment variables follow the pattern: `LEDGER_VM_<KEY>`
    ///
    /// Examples:
    /// - `LEDGER_VM_MIN_COMMITTABLE_AGE=10`
    /// - `LEDGER_VM_STAKING_UNBONDING_PERIOD=10`
    pub fn from_env() -> anyhow::Result<Self> {
        let mut params = Self::default();

        if let Some(v) = env_parse("LEDGER_VM_NETWORK_ID") {
            params.network_id = v;
        }
        if let Some(v) = env_parse("LEDGER_VM_TOKEN_SUPPLY") {
            params.token_supply = v;
        }
        if let Some(v) = env_parse("LEDGER_VM_SLOTS_PER_EPOCH_EXPONENT") {
            params.slots_per_epoch_exponent = v;
        }
        if let Some(v) = env_parse("LEDGER_VM_MIN_COMMITTABLE_AGE") {
            params.min_committable_age = v;
        }
        if let Some(v) = env_parse("LEDGER_VM_MAX_COMMITTABLE_AGE") {
            params.max_committable_age = v;
        }
        if let Some(v) = env_parse("LEDGER_VM_EPOCH_NEARING_THRESHOLD") {
            params.epoch_nearing_threshold = v;
        }
        if let Some(v) = env_parse("LEDGER_VM_STAKING_UNBONDING_PERIOD") {
            params.staking_unbonding_period = v;
        }
        if let Some(v) = env_parse("LEDGER_VM_STORAGE_COST") {
            params.storage_score.storage_cost = v;
        }

        params
            .validate()
            .context("invalid protocol parameters in environment")?;
        Ok(params)
    }

    /// Reject parameter sets the time and mana arithmetic cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.slots_per_epoch_exponent == 0 || self.slots_per_epoch_exponent >= 32 {
            bail!(
                "slots_per_epoch_exponent must be in 1..32, got {}",
                self.slots_per_epoch_exponent
            );
        }
        if self.min_committable_age > self.max_committable_age {
            bail!(
                "min_committable_age ({}) exceeds max_committable_age ({})",
                self.min_committable_age,
                self.max_committable_age
            );
        }
        if self.epoch_nearing_threshold >= self.slots_per_epoch() {
            bail!(
                "epoch_nearing_threshold ({}) must be below the epoch length ({})",
                self.epoch_nearing_threshold,
                self.slots_per_epoch()
            );
        }
        if self.mana.decay_factor_exponent > 32 || self.mana.generation_rate_exponent > 63 {
            bail!("mana exponents out of range");
        }
        Ok(())
    }

    pub fn slots_per_epoch(&self) -> SlotIndex {
        1u32.checked_shl(self.slots_per_epoch_exponent as u32)
            .unwrap_or(MAX_SLOT)
    }

    pub fn epoch_from_slot(&self, slot: SlotIndex) -> EpochIndex {
        slot.checked_shr(self.slots_per_epoch_exponent as u32)
            .unwrap_or(0)
    }

    pub fn epoch_start(&self, epoch: EpochIndex) -> SlotIndex {
        epoch
            .checked_shl(self.slots_per_epoch_exponent as u32)
            .filter(|start| start >> self.slots_per_epoch_exponent == epoch)
            .unwrap_or(MAX_SLOT)
    }

    pub fn epoch_end(&self, epoch: EpochIndex) -> SlotIndex {
        match epoch.checked_add(1) {
            Some(next) => {
                let next_start = self.epoch_start(next);
                if next_start == MAX_SLOT {
                    MAX_SLOT
                } else {
                    next_start - 1
                }
            }
            None => MAX_SLOT,
        }
    }

    /// Latest slot a transaction referencing `commitment_slot` may consider "now".
    pub fn past_bounded_slot(&self, commitment_slot: SlotIndex) -> SlotIndex {
        commitment_slot.saturating_add(self.max_committable_age)
    }

    /// Earliest slot a transaction referencing `commitment_slot` may consider "now".
    pub fn future_bounded_slot(&self, commitment_slot: SlotIndex) -> SlotIndex {
        commitment_slot.saturating_add(self.min_committable_age)
    }

    /// Last slot of `epoch` in which registering still targets the next epoch.
    pub fn registration_slot(&self, epoch: EpochIndex) -> SlotIndex {
        self.epoch_end(epoch).saturating_sub(self.epoch_nearing_threshold)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ProtocolParameters::default().validate().is_ok());
    }

    #[test]
    fn test_epoch_arithmetic() {
        let params = ProtocolParameters::default();
        assert_eq!(params.slots_per_epoch(), 8192);
        assert_eq!(params.epoch_from_slot(0), 0);
        assert_eq!(params.epoch_from_slot(8191), 0);
        assert_eq!(params.epoch_from_slot(8192), 1);
        assert_eq!(params.epoch_start(2), 16384);
        assert_eq!(params.epoch_end(1), 16383);
        assert_eq!(params.registration_slot(0), 8191 - 60);
    }

    #[test]
    fn test_epoch_bounds_saturate() {
        let params = ProtocolParameters::default();
        assert_eq!(params.epoch_start(EpochIndex::MAX), MAX_SLOT);
        assert_eq!(params.epoch_end(params.epoch_from_slot(MAX_SLOT)), MAX_SLOT);
        assert_eq!(params.past_bounded_slot(MAX_SLOT - 1), MAX_SLOT);
    }

    #[test]
    fn test_bounded_slots() {
        let params = ProtocolParameters::default();
        assert_eq!(params.past_bounded_slot(990), 1010);
        assert_eq!(params.future_bounded_slot(990), 1000);
    }

    #[test]
    fn test_from_json_uses_defaults_for_missing_fields() {
        let params = ProtocolParameters::from_json_str(r#"{"min_committable_age": 3}"#).unwrap();
        assert_eq!(params.min_committable_age, 3);
        assert_eq!(params.max_committable_age, default_max_committable_age());
        assert_eq!(params.mana, ManaParameters::default());
    }

    #[test]
    fn test_inconsistent_ages_rejected() {
        let json = r#"{"min_committable_age": 30, "max_committable_age": 20}"#;
        assert!(ProtocolParameters::from_json_str(json).is_err());
    }

    #[test]
    fn test_from_env_rejects_oversized_epoch_exponent() {
        std::env::set_var("LEDGER_VM_SLOTS_PER_EPOCH_EXPONENT", "32");
        let result = ProtocolParameters::from_env();
        std::env::remove_var("LEDGER_VM_SLOTS_PER_EPOCH_EXPONENT");
        assert!(result.is_err());
    }

    #[test]
    fn test_mana_exponents_bounded() {
        let mut params = ProtocolParameters::default();
        params.mana.generation_rate_exponent = 64;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_nearing_threshold_must_fit_epoch() {
        let params = ProtocolParameters {
            slots_per_epoch_exponent: 3,
            epoch_nearing_threshold: 8,
            ..ProtocolParameters::default()
        };
        assert!(params.validate().is_err());
    }
}
