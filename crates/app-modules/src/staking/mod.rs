//! # Staking Module
//!
//! Validators whose voting power is bonded by a bank account balance.
//!
//! Reads the bank partition, so it must be registered after `bank`. At
//! genesis import each validator's power is computed from its operator's
//! balance and returned as validator updates. Every end block recomputes
//! the power of every validator and emits an update for each change;
//! power 0 removes the validator from the active set.

pub mod keeper;
pub mod types;

pub use types::{
    GenesisValidator, MsgCreateValidator, QueryValidator, StakingGenesis, StakingParams,
    Validator,
};

use crate::bank;
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
use tracing::{debug, info};

pub const MODULE_NAME: &str = "staking";

/// The staking module.
#[derive(Debug, Default, Clone, Copy)]
pub struct StakingModule;

impl StakingModule {
    pub fn new() -> Self {
        Self
    }
}

fn check_pub_key(pub_key: &str) -> Result<(), String> {
    if pub_key.is_empty() {
        return Err("empty validator pub_key".to_string());
    }
    hex::decode(pub_key).map_err(|e| format!("pub_key {pub_key} is not hex: {e}"))?;
    Ok(())
}

fn validate(genesis: &StakingGenesis) -> Result<(), ModuleError> {
    let params = &genesis.params;
    if params.power_reduction <= 0 {
        return Err(ModuleError::InvalidGenesis(format!(
            "power_reduction must be positive, got {}",
            params.power_reduction
        )));
    }
    if params.max_validators == 0 {
        return Err(ModuleError::InvalidGenesis(
            "max_validators must be positive".to_string(),
        ));
    }
    if genesis.validators.len() > params.max_validators as usize {
        return Err(ModuleError::InvalidGenesis(format!(
            "{} validators exceed max_validators {}",
            genesis.validators.len(),
            params.max_validators
        )));
    }

    let mut seen = BTreeSet::new();
    for validator in &genesis.validators {
        check_pub_key(&validator.pub_key).map_err(ModuleError::InvalidGenesis)?;
        if validator.operator.is_empty() {
            return Err(ModuleError::InvalidGenesis(format!(
                "validator {} has no operator",
                validator.pub_key
            )));
        }
        if !seen.insert(validator.pub_key.as_str()) {
            return Err(ModuleError::InvalidGenesis(format!(
                "duplicate validator {}",
                validator.pub_key
            )));
        }
    }
    Ok(())
}

fn handle_create_validator(
    ctx: &mut ModuleContext<'_>,
    msg: MsgCreateValidator,
) -> Result<Response, ModuleError> {
    check_pub_key(&msg.pub_key).map_err(ModuleError::InvalidRequest)?;
    if msg.operator.is_empty() {
        return Err(ModuleError::InvalidRequest("empty operator".to_string()));
    }
    let store = ctx.store_ref();
    if keeper::validator(store, &msg.pub_key)?.is_some() {
        return Err(ModuleError::InvalidRequest(format!(
            "validator {} already exists",
            msg.pub_key
        )));
    }
    let params = keeper::params(store)?;
    if keeper::validators(store)?.len() >= params.max_validators as usize {
        return Err(ModuleError::InvalidRequest(format!(
            "validator set is full ({})",
            params.max_validators
        )));
    }

    // Bonded at the next end block.
    keeper::set_validator(
        ctx.store(),
        &Validator {
            pub_key: msg.pub_key.clone(),
            operator: msg.operator.clone(),
            power: 0,
        },
    )?;
    ctx.emit(
        Event::new("create_validator")
            .attr("pub_key", &msg.pub_key)
            .attr("operator", &msg.operator),
    );
    Ok(Response::default())
}

/// Entry point of the `staking` route.
pub fn handle(ctx: &mut ModuleContext<'_>, request: &Request) -> Result<Response, ModuleError> {
    match request.msg_type.as_str() {
        "create_validator" => handle_create_validator(ctx, parse_payload(&request.payload)?),
        other => Err(ModuleError::UnknownMessage(other.to_string())),
    }
}

/// Entry point of the `staking` querier route.
pub fn query(ctx: &QueryContext<'_>, query: &Query) -> Result<Value, ModuleError> {
    let store = ctx.store();
    match query.path.as_str() {
        "validators" => to_json(&keeper::validators(store)?),
        "validator" => {
            let q: QueryValidator = parse_payload(&query.data)?;
            match keeper::validator(store, &q.pub_key)? {
                Some(validator) => to_json(&validator),
                None => Err(ModuleError::InvalidRequest(format!(
                    "unknown validator {}",
                    q.pub_key
                ))),
            }
        }
        "params" => to_json(&keeper::params(store)?),
        other => Err(ModuleError::UnknownQuery(other.to_string())),
    }
}

impl HasGenesis for StakingModule {
    fn default_genesis(&self) -> Result<Value, ModuleError> {
        encode_blob(&StakingGenesis::default())
    }

    fn validate_genesis(&self, blob: &Value) -> Result<(), ModuleError> {
        validate(&decode_blob(blob)?)
    }

    fn init_genesis(
        &self,
        ctx: &mut ModuleContext<'_>,
        blob: &Value,
    ) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        let genesis: StakingGenesis = decode_blob(blob)?;
        validate(&genesis)?;

        let others = ctx.others();
        keeper::set_params(ctx.store(), &genesis.params)?;
        let mut updates = Vec::new();
        for entry in &genesis.validators {
            let power = keeper::bonded_power(&others, &entry.operator, &genesis.params)?;
            keeper::set_validator(
                ctx.store(),
                &Validator {
                    pub_key: entry.pub_key.clone(),
                    operator: entry.operator.clone(),
                    power,
                },
            )?;
            if power > 0 {
                updates.push(ValidatorUpdate::new(&entry.pub_key, power));
            }
        }
        info!(
            "[staking] Genesis bonded {} of {} validators",
            updates.len(),
            genesis.validators.len()
        );
        Ok(updates)
    }

    fn export_genesis(&self, ctx: &QueryContext<'_>) -> Result<Value, ModuleError> {
        let store = ctx.store();
        let validators = keeper::validators(store)?
            .into_iter()
            .map(|v| GenesisValidator {
                pub_key: v.pub_key,
                operator: v.operator,
            })
            .collect();
        encode_blob(&StakingGenesis {
            params: keeper::params(store)?,
            validators,
        })
    }
}

fn check_bonded_power(view: &StoreView<'_>) -> InvariantResult {
    let Some(store) = view.partition(MODULE_NAME) else {
        return InvariantResult::broken("staking partition missing");
    };
    let (params, validators) = match (keeper::params(store), keeper::validators(store)) {
        (Ok(params), Ok(validators)) => (params, validators),
        (Err(e), _) | (_, Err(e)) => return InvariantResult::broken(e.to_string()),
    };
    for validator in &validators {
        match keeper::bonded_power(view, &validator.operator, &params) {
            Ok(expected) if expected == validator.power => {}
            Ok(expected) => {
                return InvariantResult::broken(format!(
                    "validator {} has power {} but {} is bonded",
                    validator.pub_key, validator.power, expected
                ))
            }
            Err(e) => return InvariantResult::broken(e.to_string()),
        }
    }
    InvariantResult::holds(format!("{} validators", validators.len()))
}

impl HasInvariants for StakingModule {
    fn register_invariants(&self, registry: &mut InvariantRegistry) {
        registry.register(MODULE_NAME, "bonded-power", check_bonded_power);
    }
}

impl HasSimulation for StakingModule {
    fn randomized_genesis(&self, rng: &mut SimRng) -> Result<Value, ModuleError> {
        let params = StakingParams {
            max_validators: rng.gen_range(4..=10),
            power_reduction: [1, 10, 100, 1000][rng.gen_range(0..4)],
        };
        let count = rng.gen_range(1..=4);
        let validators = (0..count)
            .map(|_| GenesisValidator {
                pub_key: hex::encode(rng.gen::<[u8; 32]>()),
                operator: bank::sim_account(rng.gen_range(0..bank::SIM_ACCOUNTS)),
            })
            .collect();
        encode_blob(&StakingGenesis { params, validators })
    }

    fn randomized_param_changes(&self, rng: &mut SimRng) -> Vec<ParamChange> {
        vec![ParamChange::new(
            MODULE_NAME,
            "MaxValidators",
            rng.gen_range(4..=100u32).to_string(),
        )]
    }

    fn apply_param_change(
        &self,
        ctx: &mut ModuleContext<'_>,
        change: &ParamChange,
    ) -> Result<(), ModuleError> {
        if change.key != "MaxValidators" {
            return Err(ModuleError::InvalidRequest(format!(
                "unknown staking param {}",
                change.key
            )));
        }
        let max_validators: u32 = serde_json::from_str(&change.value).map_err(|e| {
            ModuleError::InvalidRequest(format!("{}: {}", change.compose_key(), e))
        })?;
        let bonded = keeper::validators(ctx.store_ref())?.len();
        if max_validators == 0 || (max_validators as usize) < bonded {
            return Err(ModuleError::InvalidRequest(format!(
                "max_validators {max_validators} below the {bonded} bonded validators"
            )));
        }
        let mut params = keeper::params(ctx.store_ref())?;
        params.max_validators = max_validators;
        keeper::set_params(ctx.store(), &params)
    }

    fn decode_store_entry(&self, key: &[u8], value: &[u8]) -> String {
        if key == keeper::PARAMS_KEY {
            if let Ok(params) = decode::<StakingParams>(value) {
                return format!("params: {params:?}");
            }
        } else if key.starts_with(keeper::VALIDATOR_PREFIX) {
            if let Ok(v) = decode::<Validator>(value) {
                return format!("validator/{}: operator={} power={}", v.pub_key, v.operator, v.power);
            }
        }
        hex_entry(key, value)
    }
}

impl AppModule for StakingModule {
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

    fn end_block(&self, ctx: &mut ModuleContext<'_>) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        let others = ctx.others();
        let params = keeper::params(ctx.store_ref())?;
        let mut updates = Vec::new();
        for mut validator in keeper::validators(ctx.store_ref())? {
            let power = keeper::bonded_power(&others, &validator.operator, &params)?;
            if power != validator.power {
                debug!(
                    "[staking] {} power {} -> {} at height {}",
                    validator.pub_key,
                    validator.power,
                    power,
                    ctx.block().height
                );
                validator.power = power;
                keeper::set_validator(ctx.store(), &validator)?;
                updates.push(ValidatorUpdate::new(&validator.pub_key, power));
            }
        }
        Ok(updates)
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
