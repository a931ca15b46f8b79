//! Partition layout and typed access for the bank module.
//!
//! | key                   | value           |
//! |-----------------------|-----------------|
//! | `params`              | `BankParams`    |
//! | `supply`              | `i64`           |
//! | `balance/<address>`   | `i64`           |

use super::types::{Balance, BankParams};
use super::MODULE_NAME;
use crate::codec::{decode, encode, prefixed};
use module_manager::ModuleError;
use shared_types::{KvStore, StoreView};

pub const PARAMS_KEY: &[u8] = b"params";
pub const SUPPLY_KEY: &[u8] = b"supply";
pub const BALANCE_PREFIX: &[u8] = b"balance/";

pub fn balance_key(address: &str) -> Vec<u8> {
    prefixed(BALANCE_PREFIX, address.as_bytes())
}

pub fn params(store: &KvStore) -> Result<BankParams, ModuleError> {
    match store.get(PARAMS_KEY) {
        Some(raw) => decode(raw),
        None => Ok(BankParams::default()),
    }
}

pub fn set_params(store: &mut KvStore, params: &BankParams) -> Result<(), ModuleError> {
    store.set(PARAMS_KEY, encode(params)?);
    Ok(())
}

pub fn balance(store: &KvStore, address: &str) -> Result<i64, ModuleError> {
    match store.get(&balance_key(address)) {
        Some(raw) => decode(raw),
        None => Ok(0),
    }
}

/// Zero balances are removed rather than stored.
pub fn set_balance(store: &mut KvStore, address: &str, amount: i64) -> Result<(), ModuleError> {
    if amount == 0 {
        store.delete(&balance_key(address));
    } else {
        store.set(balance_key(address), encode(&amount)?);
    }
    Ok(())
}

/// Every non-zero balance, ordered by address.
pub fn balances(store: &KvStore) -> Result<Vec<Balance>, ModuleError> {
    store
        .prefix_iter(BALANCE_PREFIX)
        .map(|(key, raw)| {
            let address = String::from_utf8_lossy(&key[BALANCE_PREFIX.len()..]).into_owned();
            Ok(Balance::new(address, decode(raw)?))
        })
        .collect()
}

pub fn supply(store: &KvStore) -> Result<i64, ModuleError> {
    match store.get(SUPPLY_KEY) {
        Some(raw) => decode(raw),
        None => Ok(0),
    }
}

pub fn set_supply(store: &mut KvStore, supply: i64) -> Result<(), ModuleError> {
    store.set(SUPPLY_KEY, encode(&supply)?);
    Ok(())
}

/// Balance of `address` as seen from another module's context.
pub fn read_balance(view: &StoreView<'_>, address: &str) -> Result<i64, ModuleError> {
    match view.get(MODULE_NAME, &balance_key(address)) {
        Some(raw) => decode(raw),
        None => Ok(0),
    }
}
