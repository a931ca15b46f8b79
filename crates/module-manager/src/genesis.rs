//! # Genesis Coordinator
//!
//! Per-module genesis default/validate/init/export, always iterating the
//! registry in its fixed order.
//!
//! ## Genesis File
//!
//! The genesis document is a JSON object keyed by module name; each value
//! is an opaque blob owned by that module. Key order follows registry
//! order when produced by [`GenesisCoordinator::default_genesis`] or
//! [`GenesisCoordinator::export_genesis`], so fixtures and snapshots are
//! byte-stable.

use crate::context::{with_module_context, with_query_context};
use crate::descriptor::Capability;
use crate::errors::{GenesisError, ModuleError};
use crate::module::HasGenesis;
use crate::registry::RegisteredModule;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared_types::{BlockContext, MultiStore, ValidatorUpdate};
use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

/// Module name -> raw genesis blob, in insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenesisState(Map<String, Value>);

impl GenesisState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the blob of `module`, replacing any previous one.
    pub fn insert(&mut self, module: impl Into<String>, blob: Value) {
        self.0.insert(module.into(), blob);
    }

    pub fn get(&self, module: &str) -> Option<&Value> {
        self.0.get(module)
    }

    pub fn contains(&self, module: &str) -> bool {
        self.0.contains_key(module)
    }

    pub fn remove(&mut self, module: &str) -> Option<Value> {
        self.0.remove(module)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Module names in document order.
    pub fn module_names(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse a genesis document.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, GenesisError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| GenesisError::Decode(e.to_string()))?;
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(GenesisError::Decode(format!(
                "genesis must be a JSON object keyed by module name, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Compact, stable encoding.
    pub fn to_json_vec(&self) -> Result<Vec<u8>, GenesisError> {
        serde_json::to_vec(&self.0).map_err(|e| GenesisError::Decode(e.to_string()))
    }

    /// Human-readable encoding.
    pub fn to_json_pretty(&self) -> Result<String, GenesisError> {
        serde_json::to_string_pretty(&self.0).map_err(|e| GenesisError::Decode(e.to_string()))
    }

    /// Read a genesis file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GenesisError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| GenesisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_slice(&bytes)
    }

    /// Write a genesis file (pretty-printed).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), GenesisError> {
        let path = path.as_ref();
        let text = self.to_json_pretty()?;
        fs::write(path, text).map_err(|source| GenesisError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// How `validate_genesis` treats modules absent from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidateMode {
    /// A missing module is an error.
    #[default]
    Strict,
    /// A missing module is filled in with its default blob.
    FillDefaults,
}

/// Drives genesis for every `HasGenesis` module in registry order.
pub struct GenesisCoordinator<'r> {
    modules: &'r [RegisteredModule],
}

impl<'r> GenesisCoordinator<'r> {
    pub(crate) fn new(modules: &'r [RegisteredModule]) -> Self {
        Self { modules }
    }

    /// Modules taking part in genesis, in registry order.
    fn genesis_modules(&self) -> impl Iterator<Item = (&'r RegisteredModule, &'r dyn HasGenesis)> {
        self.modules.iter().filter_map(|m| {
            if !m.has(Capability::HasGenesis) {
                return None;
            }
            m.module().genesis().map(|g| (m, g))
        })
    }

    /// Default genesis of the whole application.
    pub fn default_genesis(&self) -> Result<GenesisState, GenesisError> {
        let mut state = GenesisState::new();
        for (module, genesis) in self.genesis_modules() {
            let blob = Self::module_default(module, genesis)?;
            state.insert(module.name(), blob);
        }
        debug!("[Genesis] Default genesis covers {} modules", state.len());
        Ok(state)
    }

    fn module_default(
        module: &RegisteredModule,
        genesis: &dyn HasGenesis,
    ) -> Result<Value, GenesisError> {
        let blob = genesis.default_genesis().map_err(|cause| GenesisError::Default {
            module: module.name().to_string(),
            reason: cause.to_string(),
        })?;
        if blob.is_null() {
            return Err(GenesisError::Default {
                module: module.name().to_string(),
                reason: "default genesis is null".to_string(),
            });
        }
        Ok(blob)
    }

    /// Validate a genesis document, failing on the first invalid module.
    ///
    /// Returns the effective state: the input, plus default blobs for
    /// absent modules when `mode` is [`ValidateMode::FillDefaults`].
    pub fn validate_genesis(
        &self,
        state: &GenesisState,
        mode: ValidateMode,
    ) -> Result<GenesisState, GenesisError> {
        for name in state.module_names() {
            let known = self
                .genesis_modules()
                .any(|(module, _)| module.name() == name);
            if !known {
                return Err(GenesisError::UnknownModule {
                    module: name.to_string(),
                });
            }
        }

        let mut effective = GenesisState::new();
        for (module, genesis) in self.genesis_modules() {
            let blob = match (state.get(module.name()), mode) {
                (Some(blob), _) => blob.clone(),
                (None, ValidateMode::FillDefaults) => {
                    debug!("[Genesis] {} absent, using default", module.name());
                    Self::module_default(module, genesis)?
                }
                (None, ValidateMode::Strict) => {
                    return Err(GenesisError::MissingModule {
                        module: module.name().to_string(),
                    });
                }
            };

            if let Err(cause) = genesis.validate_genesis(&blob) {
                error!("[Genesis] ✗ {} rejected its genesis: {}", module.name(), cause);
                return Err(GenesisError::Validation {
                    module: module.name().to_string(),
                    cause,
                });
            }
            effective.insert(module.name(), blob);
        }

        info!("[Genesis] ✓ Genesis valid for {} modules", effective.len());
        Ok(effective)
    }

    /// Import genesis into `store`, strictly in registry order.
    ///
    /// Later modules may read partitions written by earlier ones. Returns
    /// validator updates concatenated in registry order.
    pub fn init_genesis(
        &self,
        store: &mut MultiStore,
        state: &GenesisState,
        block: &BlockContext,
    ) -> Result<Vec<ValidatorUpdate>, GenesisError> {
        let mut updates = Vec::new();

        for module in self.modules {
            store.mount(module.name());
        }

        for (module, genesis) in self.genesis_modules() {
            let blob = state
                .get(module.name())
                .ok_or_else(|| GenesisError::MissingModule {
                    module: module.name().to_string(),
                })?;

            let (module_updates, _events) =
                with_module_context(store, module.name(), block, |ctx| {
                    genesis.init_genesis(ctx, blob)
                })
                .map_err(|cause| GenesisError::Init {
                    module: module.name().to_string(),
                    cause,
                })?;

            debug!(
                "[Genesis] Initialized {} ({} validator updates)",
                module.name(),
                module_updates.len()
            );
            updates.extend(module_updates);
        }

        info!(
            "[Genesis] Chain initialized at height {} with {} validator updates",
            block.height,
            updates.len()
        );
        Ok(updates)
    }

    /// Export every module's state, in registry order.
    pub fn export_genesis(&self, store: &MultiStore) -> Result<GenesisState, GenesisError> {
        let mut state = GenesisState::new();
        for (module, genesis) in self.genesis_modules() {
            let blob = with_query_context(store, module.name(), |ctx| genesis.export_genesis(ctx))
                .map_err(|cause: ModuleError| GenesisError::Export {
                    module: module.name().to_string(),
                    cause,
                })?;
            state.insert(module.name(), blob);
        }
        debug!("[Genesis] Exported {} modules", state.len());
        Ok(state)
    }
}
