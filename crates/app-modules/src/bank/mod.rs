//! # Bank Module
//!
//! Account balances and transfers.
//!
//! - Route `bank`: `send` moves funds between accounts.
//! - Querier `bank`: `balance`, `balances`, `supply`, `params`.
//! - Invariants: `bank/nonnegative` and `bank/supply` (stored supply equals
//!   the sum of balances).
//!
//! The supply is derived from balances at genesis import and is not part
//! of the exported blob.

pub mod keeper;
pub mod types;

pub use types::{Balance, BankGenesis, BankParams, MsgSend, QueryBalance};

use crate::codec::{decode, hex_entry, parse_payload, to_json};
use module_manager::{
    decode_blob, encode_blob, AppModule, Capability, Handler, HasGenesis, HasInvariants,
    HasSimulation, InvariantRegistry, InvariantResult, ModuleContext, ModuleDescriptor,
    ModuleError, Querier, QueryContext, SimRng,
};
use rand::Rng;
use serde_json::Value;
use shared_types::{Event, ParamChange, Query, Request, Response, StoreView, ValidatorUpdate};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

pub const MODULE_NAME: &str = "bank";

/// The bank module.
#[derive(Debug, Default, Clone, Copy)]
pub struct BankModule;

impl BankModule {
    pub fn new() -> Self {
        Self
    }
}

fn handle_send(ctx: &mut ModuleContext<'_>, msg: MsgSend) -> Result<Response, ModuleError> {
    if !keeper::params(ctx.store_ref())?.send_enabled {
        return Err(ModuleError::InvalidRequest("sends are disabled".to_string()));
    }
    if msg.amount <= 0 {
        return Err(ModuleError::InvalidRequest(format!(
            "amount must be positive, got {}",
            msg.amount
        )));
    }
    if msg.from.is_empty() || msg.to.is_empty() {
        return Err(ModuleError::InvalidRequest("empty address".to_string()));
    }

    let from_balance = keeper::balance(ctx.store_ref(), &msg.from)?;
    if from_balance < msg.amount {
        return Err(ModuleError::InvalidRequest(format!(
            "insufficient funds: {} has {}, needs {}",
            msg.from, from_balance, msg.amount
        )));
    }
    keeper::set_balance(ctx.store(), &msg.from, from_balance - msg.amount)?;
    let to_balance = keeper::balance(ctx.store_ref(), &msg.to)?;
    let credited = to_balance
        .checked_add(msg.amount)
        .ok_or_else(|| ModuleError::InvalidRequest("balance overflow".to_string()))?;
    keeper::set_balance(ctx.store(), &msg.to, credited)?;

    debug!("[bank] {} -> {}: {}", msg.from, msg.to, msg.amount);
    ctx.emit(
        Event::new("transfer")
            .attr("sender", &msg.from)
            .attr("recipient", &msg.to)
            .attr("amount", msg.amount),
    );
    Ok(Response::default())
}

/// Entry point of the `bank` route.
pub fn handle(ctx: &mut ModuleContext<'_>, request: &Request) -> Result<Response, ModuleError> {
    match request.msg_type.as_str() {
        "send" => handle_send(ctx, parse_payload(&request.payload)?),
        other => Err(ModuleError::UnknownMessage(other.to_string())),
    }
}

/// Entry point of the `bank` querier route.
pub fn query(ctx: &QueryContext<'_>, query: &Query) -> Result<Value, ModuleError> {
    let store = ctx.store();
    match query.path.as_str() {
        "balance" => {
            let q: QueryBalance = parse_payload(&query.data)?;
            let amount = keeper::balance(store, &q.address)?;
            to_json(&Balance::new(q.address, amount))
        }
        "balances" => to_json(&keeper::balances(store)?),
        "supply" => to_json(&keeper::supply(store)?),
        "params" => to_json(&keeper::params(store)?),
        other => Err(ModuleError::UnknownQuery(other.to_string())),
    }
}

fn validate(genesis: &BankGenesis) -> Result<(), ModuleError> {
    let mut seen = BTreeSet::new();
    for balance in &genesis.balances {
        if balance.address.is_empty() {
            return Err(ModuleError::InvalidGenesis("empty address".to_string()));
        }
        if balance.amount < 0 {
            return Err(ModuleError::InvalidGenesis(format!(
                "negative balance {} for {}",
                balance.amount, balance.address
            )));
        }
        if !seen.insert(balance.address.as_str()) {
            return Err(ModuleError::InvalidGenesis(format!(
                "duplicate account {}",
                balance.address
            )));
        }
    }
    genesis
        .balances
        .iter()
        .try_fold(0i64, |acc, b| acc.checked_add(b.amount))
        .ok_or_else(|| ModuleError::InvalidGenesis("total supply overflows".to_string()))?;
    Ok(())
}

impl HasGenesis for BankModule {
    fn default_genesis(&self) -> Result<Value, ModuleError> {
        encode_blob(&BankGenesis::default())
    }

    fn validate_genesis(&self, blob: &Value) -> Result<(), ModuleError> {
        validate(&decode_blob(blob)?)
    }

    fn init_genesis(
        &self,
        ctx: &mut ModuleContext<'_>,
        blob: &Value,
    ) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        let genesis: BankGenesis = decode_blob(blob)?;
        validate(&genesis)?;

        let store = ctx.store();
        keeper::set_params(store, &genesis.params)?;
        let mut supply = 0i64;
        for balance in &genesis.balances {
            keeper::set_balance(store, &balance.address, balance.amount)?;
            supply += balance.amount;
        }
        keeper::set_supply(store, supply)?;
        debug!(
            "[bank] Genesis imported {} accounts, supply {}",
            genesis.balances.len(),
            supply
        );
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &QueryContext<'_>) -> Result<Value, ModuleError> {
        let store = ctx.store();
        encode_blob(&BankGenesis {
            params: keeper::params(store)?,
            balances: keeper::balances(store)?,
        })
    }
}

fn check_nonnegative(view: &StoreView<'_>) -> InvariantResult {
    let Some(store) = view.partition(MODULE_NAME) else {
        return InvariantResult::broken("bank partition missing");
    };
    match keeper::balances(store) {
        Ok(balances) => match balances.iter().find(|b| b.amount < 0) {
            Some(b) => InvariantResult::broken(format!("{} has {}", b.address, b.amount)),
            None => InvariantResult::holds(format!("{} accounts", balances.len())),
        },
        Err(e) => InvariantResult::broken(e.to_string()),
    }
}

fn check_supply(view: &StoreView<'_>) -> InvariantResult {
    let Some(store) = view.partition(MODULE_NAME) else {
        return InvariantResult::broken("bank partition missing");
    };
    let (balances, supply) = match (keeper::balances(store), keeper::supply(store)) {
        (Ok(balances), Ok(supply)) => (balances, supply),
        (Err(e), _) | (_, Err(e)) => return InvariantResult::broken(e.to_string()),
    };
    let sum: i64 = balances.iter().map(|b| b.amount).sum();
    if sum == supply {
        InvariantResult::holds(format!("supply {supply}"))
    } else {
        InvariantResult::broken(format!("supply {supply} but balances sum to {sum}"))
    }
}

impl HasInvariants for BankModule {
    fn register_invariants(&self, registry: &mut InvariantRegistry) {
        registry.register(MODULE_NAME, "nonnegative", check_nonnegative);
        registry.register(MODULE_NAME, "supply", check_supply);
    }
}

/// Number of accounts in a randomized genesis.
pub const SIM_ACCOUNTS: usize = 8;

/// Deterministic account name used by simulations.
pub fn sim_account(index: usize) -> String {
    format!("acc{index}")
}

impl HasSimulation for BankModule {
    fn randomized_genesis(&self, rng: &mut SimRng) -> Result<Value, ModuleError> {
        let balances = (0..SIM_ACCOUNTS)
            .map(|i| Balance::new(sim_account(i), rng.gen_range(0..1_000_000)))
            .filter(|b| b.amount > 0)
            .collect();
        encode_blob(&BankGenesis {
            params: BankParams {
                send_enabled: rng.gen_bool(0.9),
            },
            balances,
        })
    }

    fn randomized_param_changes(&self, rng: &mut SimRng) -> Vec<ParamChange> {
        vec![ParamChange::new(
            MODULE_NAME,
            "SendEnabled",
            rng.gen_bool(0.5).to_string(),
        )]
    }

    fn apply_param_change(
        &self,
        ctx: &mut ModuleContext<'_>,
        change: &ParamChange,
    ) -> Result<(), ModuleError> {
        if change.key != "SendEnabled" {
            return Err(ModuleError::InvalidRequest(format!(
                "unknown bank param {}",
                change.key
            )));
        }
        let mut params = keeper::params(ctx.store_ref())?;
        params.send_enabled = serde_json::from_str(&change.value).map_err(|e| {
            ModuleError::InvalidRequest(format!("{}: {}", change.compose_key(), e))
        })?;
        keeper::set_params(ctx.store(), &params)
    }

    fn decode_store_entry(&self, key: &[u8], value: &[u8]) -> String {
        if key == keeper::PARAMS_KEY {
            if let Ok(params) = decode::<BankParams>(value) {
                return format!("params: {params:?}");
            }
        } else if key == keeper::SUPPLY_KEY {
            if let Ok(supply) = decode::<i64>(value) {
                return format!("supply: {supply}");
            }
        } else if let Some(address) = key.strip_prefix(keeper::BALANCE_PREFIX) {
            if let Ok(amount) = decode::<i64>(value) {
                return format!("balance/{}: {}", String::from_utf8_lossy(address), amount);
            }
        }
        hex_entry(key, value)
    }
}

impl AppModule for BankModule {
    fn descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor::new(MODULE_NAME)
            .with(Capability::HasGenesis)
            .with(Capability::HasInvariants)
            .with(Capability::HasSimulation)
    }

    fn new_handler(&self) -> Option<Handler> {
        Some(Arc::new(handle))
    }

    fn new_querier(&self) -> Option<Querier> {
        Some(Arc::new(query))
    }

    fn genesis(&self) -> Option<&dyn HasGenesis> {
        Some(self)
    }

    fn invariants(&self) -> Option<&dyn HasInvariants> {
        Some(self)
    }

    fn simulation(&self) -> Option<&dyn HasSimulation> {
        Some(self)
    }
}
