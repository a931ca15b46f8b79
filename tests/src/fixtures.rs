//! Minimal modules for exercising the manager without the default set.
//!
//! - [`Ledger`]: route `bank`, genesis `{"balance": 0}`, balance must be non-negative
//! - [`Gov`]: route `gov`, no genesis, counts submitted proposals
//! - [`Emitter`]: no routes, returns fixed validator updates from `end_block`

use module_manager::{
    decode_blob, encode_blob, AppModule, Capability, DynModule, Handler, HasGenesis,
    ModuleContext, ModuleDescriptor, ModuleError, ModuleRegistry, Querier, QueryContext,
    RegistryError,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_types::{KvStore, Query, Request, Response, ValidatorUpdate};
use std::sync::Arc;

const BALANCE_KEY: &[u8] = b"balance";
const PROPOSALS_KEY: &[u8] = b"proposals";

fn read_i64(store: &KvStore, key: &[u8]) -> Result<i64, ModuleError> {
    match store.get(key) {
        None => Ok(0),
        Some(bytes) => {
            let bytes: [u8; 8] = bytes
                .try_into()
                .map_err(|_| ModuleError::Codec(format!("expected 8 bytes, got {}", bytes.len())))?;
            Ok(i64::from_be_bytes(bytes))
        }
    }
}

fn write_i64(store: &mut KvStore, key: &[u8], value: i64) {
    store.set(key.to_vec(), value.to_be_bytes().to_vec());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerGenesis {
    pub balance: i64,
}

#[derive(Debug, Deserialize)]
struct MsgCredit {
    amount: i64,
}

/// Single-balance ledger routed at `bank`.
pub struct Ledger;

fn ledger_handle(ctx: &mut ModuleContext<'_>, request: &Request) -> Result<Response, ModuleError> {
    match request.msg_type.as_str() {
        "credit" => {
            let msg: MsgCredit = decode_blob(&request.payload)?;
            let balance = read_i64(ctx.store_ref(), BALANCE_KEY)?;
            let next = balance
                .checked_add(msg.amount)
                .filter(|b| *b >= 0)
                .ok_or_else(|| ModuleError::InvalidRequest(format!("cannot credit {}", msg.amount)))?;
            write_i64(ctx.store(), BALANCE_KEY, next);
            Ok(Response::with_data(json!({"balance": next})))
        }
        other => Err(ModuleError::UnknownMessage(other.to_string())),
    }
}

fn ledger_query(ctx: &QueryContext<'_>, query: &Query) -> Result<Value, ModuleError> {
    match query.path.as_str() {
        "balance" => Ok(json!({"balance": read_i64(ctx.store(), BALANCE_KEY)?})),
        other => Err(ModuleError::UnknownQuery(other.to_string())),
    }
}

impl AppModule for Ledger {
    fn descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor::new("bank").with(Capability::HasGenesis)
    }

    fn new_handler(&self) -> Option<Handler> {
        Some(Arc::new(ledger_handle))
    }

    fn new_querier(&self) -> Option<Querier> {
        Some(Arc::new(ledger_query))
    }

    fn genesis(&self) -> Option<&dyn HasGenesis> {
        Some(self)
    }
}

impl HasGenesis for Ledger {
    fn default_genesis(&self) -> Result<Value, ModuleError> {
        encode_blob(&LedgerGenesis { balance: 0 })
    }

    fn validate_genesis(&self, blob: &Value) -> Result<(), ModuleError> {
        let genesis: LedgerGenesis = decode_blob(blob)?;
        if genesis.balance < 0 {
            return Err(ModuleError::InvalidGenesis(format!(
                "balance must be non-negative, got {}",
                genesis.balance
            )));
        }
        Ok(())
    }

    fn init_genesis(
        &self,
        ctx: &mut ModuleContext<'_>,
        blob: &Value,
    ) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        let genesis: LedgerGenesis = decode_blob(blob)?;
        write_i64(ctx.store(), BALANCE_KEY, genesis.balance);
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &QueryContext<'_>) -> Result<Value, ModuleError> {
        encode_blob(&LedgerGenesis {
            balance: read_i64(ctx.store(), BALANCE_KEY)?,
        })
    }
}

/// Proposal counter routed at `gov`. Has no genesis.
pub struct Gov;

fn gov_handle(ctx: &mut ModuleContext<'_>, request: &Request) -> Result<Response, ModuleError> {
    match request.msg_type.as_str() {
        "submit" => {
            let count = read_i64(ctx.store_ref(), PROPOSALS_KEY)? + 1;
            write_i64(ctx.store(), PROPOSALS_KEY, count);
            Ok(Response::with_data(json!({"proposal_id": count})))
        }
        other => Err(ModuleError::UnknownMessage(other.to_string())),
    }
}

fn gov_query(ctx: &QueryContext<'_>, query: &Query) -> Result<Value, ModuleError> {
    match query.path.as_str() {
        "proposals" => Ok(json!(read_i64(ctx.store(), PROPOSALS_KEY)?)),
        other => Err(ModuleError::UnknownQuery(other.to_string())),
    }
}

impl AppModule for Gov {
    fn descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor::new("gov")
    }

    fn new_handler(&self) -> Option<Handler> {
        Some(Arc::new(gov_handle))
    }

    fn new_querier(&self) -> Option<Querier> {
        Some(Arc::new(gov_query))
    }
}

/// Returns the same validator updates from every `end_block`.
pub struct Emitter {
    name: String,
    updates: Vec<ValidatorUpdate>,
}

impl Emitter {
    pub fn new(name: &str, keys: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            updates: keys.iter().map(|k| ValidatorUpdate::new(*k, 1)).collect(),
        }
    }
}

impl AppModule for Emitter {
    fn descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor::new(self.name.clone())
            .without_route()
            .without_querier()
    }

    fn end_block(&self, _ctx: &mut ModuleContext<'_>) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        Ok(self.updates.clone())
    }
}

pub fn ledger() -> DynModule {
    Arc::new(Ledger)
}

pub fn gov() -> DynModule {
    Arc::new(Gov)
}

/// Finalized registry over `modules`, in order.
pub fn registry(modules: Vec<DynModule>) -> Result<ModuleRegistry, RegistryError> {
    ModuleRegistry::from_modules(modules)
}
