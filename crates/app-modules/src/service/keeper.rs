//! Partition layout and typed access for the service module.
//!
//! | key                                | value               |
//! |------------------------------------|---------------------|
//! | `params`                           | `ServiceParams`     |
//! | `next_request_id`                  | `u64`               |
//! | `definition/<name>`                | `ServiceDefinition` |
//! | `request/<id be>`                  | `ServiceRequest`    |
//! | `expiry/<height be><id be>`        | empty               |
//!
//! The expiry index orders pending requests by expiration height so the
//! end blocker only visits requests that are due.

use super::types::{ServiceDefinition, ServiceParams, ServiceRequest};
use crate::codec::{decode, encode, prefixed};
use module_manager::ModuleError;
use shared_types::KvStore;

pub const PARAMS_KEY: &[u8] = b"params";
pub const NEXT_ID_KEY: &[u8] = b"next_request_id";
pub const DEFINITION_PREFIX: &[u8] = b"definition/";
pub const REQUEST_PREFIX: &[u8] = b"request/";
pub const EXPIRY_PREFIX: &[u8] = b"expiry/";

pub fn definition_key(name: &str) -> Vec<u8> {
    prefixed(DEFINITION_PREFIX, name.as_bytes())
}

pub fn request_key(id: u64) -> Vec<u8> {
    prefixed(REQUEST_PREFIX, &id.to_be_bytes())
}

pub fn expiry_key(height: u64, id: u64) -> Vec<u8> {
    let mut suffix = [0u8; 16];
    suffix[..8].copy_from_slice(&height.to_be_bytes());
    suffix[8..].copy_from_slice(&id.to_be_bytes());
    prefixed(EXPIRY_PREFIX, &suffix)
}

/// Split an expiry index key into `(height, id)`.
pub fn parse_expiry_key(key: &[u8]) -> Option<(u64, u64)> {
    let suffix = key.strip_prefix(EXPIRY_PREFIX)?;
    let height = u64::from_be_bytes(suffix.get(..8)?.try_into().ok()?);
    let id = u64::from_be_bytes(suffix.get(8..16)?.try_into().ok()?);
    Some((height, id))
}

pub fn params(store: &KvStore) -> Result<ServiceParams, ModuleError> {
    match store.get(PARAMS_KEY) {
        Some(raw) => decode(raw),
        None => Ok(ServiceParams::default()),
    }
}

pub fn set_params(store: &mut KvStore, params: &ServiceParams) -> Result<(), ModuleError> {
    store.set(PARAMS_KEY, encode(params)?);
    Ok(())
}

pub fn next_request_id(store: &KvStore) -> Result<u64, ModuleError> {
    match store.get(NEXT_ID_KEY) {
        Some(raw) => decode(raw),
        None => Ok(1),
    }
}

pub fn set_next_request_id(store: &mut KvStore, id: u64) -> Result<(), ModuleError> {
    store.set(NEXT_ID_KEY, encode(&id)?);
    Ok(())
}

pub fn definition(store: &KvStore, name: &str) -> Result<Option<ServiceDefinition>, ModuleError> {
    store
        .get(&definition_key(name))
        .map(decode::<ServiceDefinition>)
        .transpose()
}

pub fn set_definition(store: &mut KvStore, def: &ServiceDefinition) -> Result<(), ModuleError> {
    store.set(definition_key(&def.name), encode(def)?);
    Ok(())
}

pub fn definitions(store: &KvStore) -> Result<Vec<ServiceDefinition>, ModuleError> {
    store
        .prefix_iter(DEFINITION_PREFIX)
        .map(|(_, raw)| decode(raw))
        .collect()
}

pub fn request(store: &KvStore, id: u64) -> Result<Option<ServiceRequest>, ModuleError> {
    store
        .get(&request_key(id))
        .map(decode::<ServiceRequest>)
        .transpose()
}

/// Store a request together with its expiry index entry.
pub fn insert_request(store: &mut KvStore, request: &ServiceRequest) -> Result<(), ModuleError> {
    store.set(request_key(request.id), encode(request)?);
    store.set(expiry_key(request.expiration_height, request.id), Vec::<u8>::new());
    Ok(())
}

/// Remove a request and its expiry index entry.
pub fn remove_request(store: &mut KvStore, request: &ServiceRequest) {
    store.delete(&request_key(request.id));
    store.delete(&expiry_key(request.expiration_height, request.id));
}

/// Every pending request, ordered by id.
pub fn requests(store: &KvStore) -> Result<Vec<ServiceRequest>, ModuleError> {
    store
        .prefix_iter(REQUEST_PREFIX)
        .map(|(_, raw)| decode(raw))
        .collect()
}

/// Ids of requests expiring at or before `height`, by expiration then id.
pub fn due_requests(store: &KvStore, height: u64) -> Vec<u64> {
    store
        .prefix_iter(EXPIRY_PREFIX)
        .filter_map(|(key, _)| parse_expiry_key(key))
        .take_while(|(expires, _)| *expires <= height)
        .map(|(_, id)| id)
        .collect()
}
