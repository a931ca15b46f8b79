//! Staking genesis, validator records and messages.

use serde::{Deserialize, Serialize};

/// Module parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingParams {
    /// Upper bound on registered validators.
    pub max_validators: u32,
    /// Bank balance units per unit of voting power.
    pub power_reduction: i64,
}

impl Default for StakingParams {
    fn default() -> Self {
        Self {
            max_validators: 100,
            power_reduction: 1,
        }
    }
}

/// A validator as it appears in genesis. Power is derived, never imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    /// Hex-encoded consensus key.
    pub pub_key: String,
    /// Bank account whose balance bonds this validator.
    pub operator: String,
}

/// Genesis blob of the staking module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingGenesis {
    pub params: StakingParams,
    pub validators: Vec<GenesisValidator>,
}

/// Stored validator record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub pub_key: String,
    pub operator: String,
    pub power: i64,
}

/// `create_validator` payload.
pub type MsgCreateValidator = GenesisValidator;

/// `validator` query argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryValidator {
    pub pub_key: String,
}
