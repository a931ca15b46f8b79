//! Bank genesis, messages and query shapes.

use serde::{Deserialize, Serialize};

/// Balance of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub address: String,
    pub amount: i64,
}

impl Balance {
    pub fn new(address: impl Into<String>, amount: i64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

/// Module parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankParams {
    /// Whether `send` is accepted.
    pub send_enabled: bool,
}

impl Default for BankParams {
    fn default() -> Self {
        Self { send_enabled: true }
    }
}

/// Genesis blob of the bank module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankGenesis {
    pub params: BankParams,
    pub balances: Vec<Balance>,
}

/// `send` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSend {
    pub from: String,
    pub to: String,
    pub amount: i64,
}

/// `balance` query argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBalance {
    pub address: String,
}
