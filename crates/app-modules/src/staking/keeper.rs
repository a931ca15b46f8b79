//! Partition layout and typed access for the staking module.
//!
//! | key                     | value           |
//! |-------------------------|-----------------|
//! | `params`                | `StakingParams` |
//! | `validator/<pub_key>`   | `Validator`     |

use super::types::{StakingParams, Validator};
use crate::bank;
use crate::codec::{decode, encode, prefixed};
use module_manager::ModuleError;
use shared_types::{KvStore, StoreView};

pub const PARAMS_KEY: &[u8] = b"params";
pub const VALIDATOR_PREFIX: &[u8] = b"validator/";

pub fn validator_key(pub_key: &str) -> Vec<u8> {
    prefixed(VALIDATOR_PREFIX, pub_key.as_bytes())
}

pub fn params(store: &KvStore) -> Result<StakingParams, ModuleError> {
    match store.get(PARAMS_KEY) {
        Some(raw) => decode(raw),
        None => Ok(StakingParams::default()),
    }
}

pub fn set_params(store: &mut KvStore, params: &StakingParams) -> Result<(), ModuleError> {
    store.set(PARAMS_KEY, encode(params)?);
    Ok(())
}

pub fn validator(store: &KvStore, pub_key: &str) -> Result<Option<Validator>, ModuleError> {
    store.get(&validator_key(pub_key)).map(decode::<Validator>).transpose()
}

pub fn set_validator(store: &mut KvStore, validator: &Validator) -> Result<(), ModuleError> {
    store.set(validator_key(&validator.pub_key), encode(validator)?);
    Ok(())
}

/// Every validator, ordered by public key.
pub fn validators(store: &KvStore) -> Result<Vec<Validator>, ModuleError> {
    store
        .prefix_iter(VALIDATOR_PREFIX)
        .map(|(_, raw)| decode(raw))
        .collect()
}

/// Voting power bonded by `operator`'s bank balance.
pub fn bonded_power(
    view: &StoreView<'_>,
    operator: &str,
    params: &StakingParams,
) -> Result<i64, ModuleError> {
    let balance = bank::keeper::read_balance(view, operator)?;
    Ok(balance / params.power_reduction.max(1))
}
