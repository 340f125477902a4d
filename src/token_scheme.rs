//! Token schemes governing a foundry's native token supply

use crate::error::{Result, ValidationError};
use crate::types::ChainTransitionType;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenScheme {
    Simple(SimpleTokenScheme),
}

impl TokenScheme {
    pub const KIND_SIMPLE: u8 = 0;

    pub fn kind(&self) -> u8 {
        match self {
            TokenScheme::Simple(_) => Self::KIND_SIMPLE,
        }
    }

    /// Dispatch a foundry transition to the scheme.
    ///
    /// `in_sum`/`out_sum` are the transaction's input and output holdings of
    /// the foundry's native token.
    pub fn state_transition(
        &self,
        transition: ChainTransitionType,
        next: Option<&TokenScheme>,
        in_sum: U256,
        out_sum: U256,
    ) -> Result<()> {
        match (self, next) {
            (TokenScheme::Simple(current), Some(TokenScheme::Simple(next))) => {
                current.state_transition(transition, Some(next), in_sum, out_sum)
            }
            (TokenScheme::Simple(current), None) => {
                current.state_transition(transition, None, in_sum, out_sum)
            }
        }
    }

    pub fn syntactic_check(&self) -> std::result::Result<(), &'static str> {
        match self {
            TokenScheme::Simple(scheme) => scheme.syntactic_check(),
        }
    }
}

/// SimpleTokenScheme: minted and melted counters under a fixed maximum supply.
///
/// Circulating supply = minted − melted ≤ maximum supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleTokenScheme {
    pub minted_tokens: U256,
    pub melted_tokens: U256,
    pub maximum_supply: U256,
}

impl SimpleTokenScheme {
    pub fn new(
        minted_tokens: impl Into<U256>,
        melted_tokens: impl Into<U256>,
        maximum_supply: impl Into<U256>,
    ) -> Self {
        Self {
            minted_tokens: minted_tokens.into(),
            melted_tokens: melted_tokens.into(),
            maximum_supply: maximum_supply.into(),
        }
    }

    /// Minted minus melted; `None` if more was melted than minted.
    pub fn circulating_supply(&self) -> Option<U256> {
        self.minted_tokens.checked_sub(self.melted_tokens)
    }

    pub fn syntactic_check(&self) -> std::result::Result<(), &'static str> {
        if self.maximum_supply.is_zero() {
            return Err("maximum supply must be greater than zero");
        }
        match self.circulating_supply() {
            None => Err("melted tokens exceed minted tokens"),
            Some(circulating) if circulating > self.maximum_supply => {
                Err("circulating supply exceeds maximum supply")
            }
            Some(_) => Ok(()),
        }
    }

    pub fn state_transition(
        &self,
        transition: ChainTransitionType,
        next: Option<&SimpleTokenScheme>,
        in_sum: U256,
        out_sum: U256,
    ) -> Result<()> {
        match (transition, next) {
            (ChainTransitionType::Genesis, _) => self.genesis_valid(out_sum),
            (ChainTransitionType::StateChange, Some(next)) => {
                self.state_change_valid(next, in_sum, out_sum)
            }
            (ChainTransitionType::StateChange, None) => Err(ValidationError::SimpleTokenSchemeInvalid {
                reason: "state change without a next token scheme",
            }
            .into()),
            (ChainTransitionType::Destroy, _) => self.destruction_valid(in_sum, out_sum),
        }
    }

    /// A new foundry mints exactly what appears on the output side.
    fn genesis_valid(&self, out_sum: U256) -> Result<()> {
        if !self.melted_tokens.is_zero() {
            return Err(ValidationError::SimpleTokenSchemeInvalid {
                reason: "melted tokens must be zero at genesis",
            }
            .into());
        }
        if self.minted_tokens != out_sum {
            return Err(ValidationError::SimpleTokenSchemeMintingInvalid {
                expected: out_sum,
                actual: self.minted_tokens,
            }
            .into());
        }
        Ok(())
    }

    fn state_change_valid(&self, next: &SimpleTokenScheme, in_sum: U256, out_sum: U256) -> Result<()> {
        if self.maximum_supply != next.maximum_supply {
            return Err(ValidationError::SimpleTokenSchemeMaximumSupplyChanged {
                current: self.maximum_supply,
                next: next.maximum_supply,
            }
            .into());
        }
        if next.minted_tokens < self.minted_tokens || next.melted_tokens < self.melted_tokens {
            return Err(ValidationError::SimpleTokenSchemeMintedMeltedTokenDecrease.into());
        }

        let minted_diff = next.minted_tokens - self.minted_tokens;
        let melted_diff = next.melted_tokens - self.melted_tokens;

        if in_sum > out_sum {
            // melting
            if !minted_diff.is_zero() {
                return Err(ValidationError::SimpleTokenSchemeMintingInvalid {
                    expected: U256::zero(),
                    actual: minted_diff,
                }
                .into());
            }
            let token_diff = in_sum - out_sum;
            if melted_diff != token_diff {
                return Err(ValidationError::SimpleTokenSchemeMeltingInvalid {
                    expected: token_diff,
                    actual: melted_diff,
                }
                .into());
            }
        } else if out_sum > in_sum {
            // minting
            if !melted_diff.is_zero() {
                return Err(ValidationError::SimpleTokenSchemeMeltingInvalid {
                    expected: U256::zero(),
                    actual: melted_diff,
                }
                .into());
            }
            let token_diff = out_sum - in_sum;
            if minted_diff != token_diff {
                return Err(ValidationError::SimpleTokenSchemeMintingInvalid {
                    expected: token_diff,
                    actual: minted_diff,
                }
                .into());
            }
        } else {
            if !minted_diff.is_zero() {
                return Err(ValidationError::SimpleTokenSchemeMintingInvalid {
                    expected: U256::zero(),
                    actual: minted_diff,
                }
                .into());
            }
            if !melted_diff.is_zero() {
                return Err(ValidationError::SimpleTokenSchemeMeltingInvalid {
                    expected: U256::zero(),
                    actual: melted_diff,
                }
                .into());
            }
        }
        Ok(())
    }

    /// A foundry may only be destroyed once its whole supply is melted and
    /// none of its tokens are consumed or remain on the output side.
    fn destruction_valid(&self, in_sum: U256, out_sum: U256) -> Result<()> {
        if !in_sum.is_zero() {
            return Err(ValidationError::SimpleTokenSchemeInvalid {
                reason: "native tokens of a destroyed foundry are consumed without being melted",
            }
            .into());
        }
        if !out_sum.is_zero() {
            return Err(ValidationError::SimpleTokenSchemeInvalid {
                reason: "native tokens of a destroyed foundry remain on the output side",
            }
            .into());
        }
        if self.circulating_supply() != Some(U256::zero()) {
            return Err(ValidationError::SimpleTokenSchemeInvalid {
                reason: "destroyed foundry still has a circulating supply",
            }
            .into());
        }
        Ok(())
    }
}
