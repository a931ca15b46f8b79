//! # Partitioned State Store
//!
//! The global state is a set of named partitions, one per module. Every
//! partition is an ordered byte map so that iteration, export and hashing
//! are deterministic across replicas.
//!
//! Write access is only ever handed out one partition at a time through
//! [`MultiStore::checkout`]; while a partition is checked out, the rest of
//! the store is visible read-only through a [`StoreView`] that hides the
//! checked-out partition.

use crate::errors::StoreError;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::ops::Bound;

/// A single module's key/value partition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KvStore {
    name: String,
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl KvStore {
    /// Create an empty partition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Partition name (the owning module's name).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Remove a key, returning the previous value.
    pub fn delete(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Entries whose key starts with `prefix`, in key order.
    pub fn prefix_iter<'a>(
        &'a self,
        prefix: &'a [u8],
    ) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + 'a {
        self.entries
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Remove every entry under `prefix`. Returns how many were removed.
    pub fn delete_prefix(&mut self, prefix: &[u8]) -> usize {
        let doomed: Vec<Vec<u8>> = self
            .prefix_iter(prefix)
            .map(|(k, _)| k.to_vec())
            .collect();
        for key in &doomed {
            self.entries.remove(key);
        }
        doomed.len()
    }

    fn hash_into(&self, hasher: &mut Sha256) {
        write_len_prefixed(hasher, self.name.as_bytes());
        hasher.update((self.entries.len() as u64).to_be_bytes());
        for (k, v) in &self.entries {
            write_len_prefixed(hasher, k);
            write_len_prefixed(hasher, v);
        }
    }
}

fn write_len_prefixed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// Read-only view over the partitions of a [`MultiStore`].
#[derive(Debug, Clone, Copy)]
pub struct StoreView<'a> {
    partitions: &'a BTreeMap<String, KvStore>,
}

impl<'a> StoreView<'a> {
    /// Look up a partition by name.
    ///
    /// A partition that is currently checked out for writing is not visible.
    pub fn partition(&self, name: &str) -> Option<&'a KvStore> {
        self.partitions.get(name)
    }

    /// Read one key from another partition.
    pub fn get(&self, partition: &str, key: &[u8]) -> Option<&'a [u8]> {
        self.partition(partition).and_then(|p| p.get(key))
    }

    /// Names of all visible partitions, sorted.
    pub fn partition_names(&self) -> impl Iterator<Item = &'a str> {
        self.partitions.keys().map(String::as_str)
    }
}

/// A partition checked out for writing, plus a read-only view of the rest.
///
/// The partition is returned to the store by [`MultiStore::checkin`].
#[derive(Debug)]
pub struct CheckedOut {
    partition: KvStore,
}

impl CheckedOut {
    pub fn partition_mut(&mut self) -> &mut KvStore {
        &mut self.partition
    }
}

/// The global state store: one [`KvStore`] per mounted module.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultiStore {
    partitions: BTreeMap<String, KvStore>,
}

impl MultiStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the partition `name` if it does not exist yet.
    pub fn mount(&mut self, name: &str) {
        if !self.partitions.contains_key(name) {
            self.partitions.insert(name.to_string(), KvStore::new(name));
        }
    }

    pub fn is_mounted(&self, name: &str) -> bool {
        self.partitions.contains_key(name)
    }

    /// Read-only access to one partition.
    pub fn partition(&self, name: &str) -> Option<&KvStore> {
        self.partitions.get(name)
    }

    /// Read-only view of every partition.
    pub fn view(&self) -> StoreView<'_> {
        StoreView {
            partitions: &self.partitions,
        }
    }

    /// Take partition `name` out of the store for exclusive writing.
    ///
    /// While checked out, the partition is absent from [`MultiStore::view`].
    pub fn checkout(&mut self, name: &str) -> Result<CheckedOut, StoreError> {
        self.partitions
            .remove(name)
            .map(|partition| CheckedOut { partition })
            .ok_or_else(|| StoreError::PartitionNotFound(name.to_string()))
    }

    /// Return a checked-out partition to the store.
    pub fn checkin(&mut self, checked_out: CheckedOut) -> Result<(), StoreError> {
        let name = checked_out.partition.name.clone();
        if self.partitions.contains_key(&name) {
            return Err(StoreError::PartitionBusy(name));
        }
        self.partitions.insert(name, checked_out.partition);
        Ok(())
    }

    /// Deterministic commitment over every partition in name order.
    pub fn root_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update((self.partitions.len() as u64).to_be_bytes());
        for partition in self.partitions.values() {
            partition.hash_into(&mut hasher);
        }
        hasher.finalize().into()
    }

    /// Hex form of [`MultiStore::root_hash`], for logs.
    pub fn root_hash_hex(&self) -> String {
        hex::encode(self.root_hash())
    }
}
