//! # Service Module
//!
//! Service definitions and the requests consumers make against them.
//!
//! - Route `service`: `define_service`, `call_service`, `respond`,
//!   `update_params`.
//! - Querier `service`: `definition`, `definitions`, `request`,
//!   `requests`, `params`.
//! - End block: drops every request whose expiration height has been
//!   reached and emits a `request_expired` event for each.

pub mod keeper;
pub mod types;

pub use types::{
    MsgCallService, MsgDefineService, MsgRespond, QueryDefinition, QueryRequest,
    ServiceDefinition, ServiceGenesis, ServiceParams, ServiceRequest,
};

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

pub const MODULE_NAME: &str = "service";

pub const PARAM_MAX_REQUEST_TIMEOUT: &str = "MaxRequestTimeout";
pub const PARAM_MAX_INPUT_LEN: &str = "MaxInputLen";

/// Upper bound accepted for `max_request_timeout`, in blocks.
pub const REQUEST_TIMEOUT_LIMIT: u64 = 1_000_000;

/// The service module.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServiceModule;

impl ServiceModule {
    pub fn new() -> Self {
        Self
    }
}

fn validate_params(params: &ServiceParams) -> Result<(), String> {
    if params.max_request_timeout == 0 {
        return Err("max_request_timeout must be positive".to_string());
    }
    if params.max_request_timeout > REQUEST_TIMEOUT_LIMIT {
        return Err(format!(
            "max_request_timeout {} exceeds {}",
            params.max_request_timeout, REQUEST_TIMEOUT_LIMIT
        ));
    }
    if params.max_input_len == 0 {
        return Err("max_input_len must be positive".to_string());
    }
    Ok(())
}

/// Apply one parameter change. The value is JSON text.
pub fn apply_param_change(
    params: &mut ServiceParams,
    change: &ParamChange,
) -> Result<(), ModuleError> {
    if change.subspace != MODULE_NAME {
        return Err(ModuleError::InvalidRequest(format!(
            "param change for subspace {} sent to {}",
            change.subspace, MODULE_NAME
        )));
    }
    let invalid = |e: serde_json::Error| {
        ModuleError::InvalidRequest(format!("{}: {}", change.compose_key(), e))
    };
    let mut updated = *params;
    match change.key.as_str() {
        PARAM_MAX_REQUEST_TIMEOUT => {
            updated.max_request_timeout = serde_json::from_str(&change.value).map_err(invalid)?
        }
        PARAM_MAX_INPUT_LEN => {
            updated.max_input_len = serde_json::from_str(&change.value).map_err(invalid)?
        }
        other => {
            return Err(ModuleError::InvalidRequest(format!(
                "unknown service param {other}"
            )))
        }
    }
    validate_params(&updated).map_err(ModuleError::InvalidRequest)?;
    *params = updated;
    Ok(())
}

fn handle_define(ctx: &mut ModuleContext<'_>, msg: MsgDefineService) -> Result<Response, ModuleError> {
    if msg.name.is_empty() || msg.author.is_empty() {
        return Err(ModuleError::InvalidRequest(
            "service name and author are required".to_string(),
        ));
    }
    if keeper::definition(ctx.store_ref(), &msg.name)?.is_some() {
        return Err(ModuleError::InvalidRequest(format!(
            "service {} already defined",
            msg.name
        )));
    }
    keeper::set_definition(ctx.store(), &msg)?;
    ctx.emit(
        Event::new("define_service")
            .attr("name", &msg.name)
            .attr("author", &msg.author),
    );
    Ok(Response::default())
}

fn handle_call(ctx: &mut ModuleContext<'_>, msg: MsgCallService) -> Result<Response, ModuleError> {
    let store = ctx.store_ref();
    let params = keeper::params(store)?;
    if keeper::definition(store, &msg.service_name)?.is_none() {
        return Err(ModuleError::InvalidRequest(format!(
            "unknown service {}",
            msg.service_name
        )));
    }
    if msg.timeout == 0 || msg.timeout > params.max_request_timeout {
        return Err(ModuleError::InvalidRequest(format!(
            "timeout {} outside 1..={}",
            msg.timeout, params.max_request_timeout
        )));
    }
    if msg.input.len() > params.max_input_len as usize {
        return Err(ModuleError::InvalidRequest(format!(
            "input of {} bytes exceeds {}",
            msg.input.len(),
            params.max_input_len
        )));
    }

    let id = keeper::next_request_id(store)?;
    let next_id = id
        .checked_add(1)
        .ok_or_else(|| ModuleError::InvalidRequest("request ids exhausted".to_string()))?;
    let height = ctx.block().height;
    let expiration_height = height.checked_add(msg.timeout).ok_or_else(|| {
        ModuleError::InvalidRequest(format!(
            "timeout {} overflows height {}",
            msg.timeout, height
        ))
    })?;
    let request = ServiceRequest {
        id,
        service_name: msg.service_name,
        consumer: msg.consumer,
        input: msg.input,
        expiration_height,
    };
    keeper::insert_request(ctx.store(), &request)?;
    keeper::set_next_request_id(ctx.store(), next_id)?;
    ctx.emit(
        Event::new("call_service")
            .attr("request_id", id)
            .attr("service", &request.service_name)
            .attr("expiration_height", request.expiration_height),
    );
    Ok(Response::with_data(Value::from(id)))
}

fn handle_respond(ctx: &mut ModuleContext<'_>, msg: MsgRespond) -> Result<Response, ModuleError> {
    let request = keeper::request(ctx.store_ref(), msg.request_id)?.ok_or_else(|| {
        ModuleError::InvalidRequest(format!("no pending request {}", msg.request_id))
    })?;
    keeper::remove_request(ctx.store(), &request);
    ctx.emit(
        Event::new("respond_service")
            .attr("request_id", request.id)
            .attr("provider", &msg.provider),
    );
    Ok(Response::with_data(Value::String(msg.output)))
}

fn handle_update_params(
    ctx: &mut ModuleContext<'_>,
    change: ParamChange,
) -> Result<Response, ModuleError> {
    let mut params = keeper::params(ctx.store_ref())?;
    apply_param_change(&mut params, &change)?;
    keeper::set_params(ctx.store(), &params)?;
    info!("[service] Param {} set to {}", change.compose_key(), change.value);
    ctx.emit(
        Event::new("update_params")
            .attr("key", change.compose_key())
            .attr("value", &change.value),
    );
    Ok(Response::default())
}

/// Entry point of the `service` route.
pub fn handle(ctx: &mut ModuleContext<'_>, request: &Request) -> Result<Response, ModuleError> {
    let payload = &request.payload;
    match request.msg_type.as_str() {
        "define_service" => handle_define(ctx, parse_payload(payload)?),
        "call_service" => handle_call(ctx, parse_payload(payload)?),
        "respond" => handle_respond(ctx, parse_payload(payload)?),
        "update_params" => handle_update_params(ctx, parse_payload(payload)?),
        other => Err(ModuleError::UnknownMessage(other.to_string())),
    }
}

/// Entry point of the `service` querier route.
pub fn query(ctx: &QueryContext<'_>, query: &Query) -> Result<Value, ModuleError> {
    let store = ctx.store();
    match query.path.as_str() {
        "definition" => {
            let q: QueryDefinition = parse_payload(&query.data)?;
            let def = keeper::definition(store, &q.name)?.ok_or_else(|| {
                ModuleError::InvalidRequest(format!("unknown service {}", q.name))
            })?;
            to_json(&def)
        }
        "definitions" => to_json(&keeper::definitions(store)?),
        "request" => {
            let q: QueryRequest = parse_payload(&query.data)?;
            let request = keeper::request(store, q.id)?
                .ok_or_else(|| ModuleError::InvalidRequest(format!("no request {}", q.id)))?;
            to_json(&request)
        }
        "requests" => to_json(&keeper::requests(store)?),
        "params" => to_json(&keeper::params(store)?),
        other => Err(ModuleError::UnknownQuery(other.to_string())),
    }
}

fn validate(genesis: &ServiceGenesis) -> Result<(), ModuleError> {
    validate_params(&genesis.params).map_err(ModuleError::InvalidGenesis)?;

    let mut names = BTreeSet::new();
    for def in &genesis.definitions {
        if def.name.is_empty() || def.author.is_empty() {
            return Err(ModuleError::InvalidGenesis(
                "service definitions need a name and an author".to_string(),
            ));
        }
        if !names.insert(def.name.as_str()) {
            return Err(ModuleError::InvalidGenesis(format!(
                "duplicate service {}",
                def.name
            )));
        }
    }

    let mut ids = BTreeSet::new();
    for request in &genesis.requests {
        if !ids.insert(request.id) {
            return Err(ModuleError::InvalidGenesis(format!(
                "duplicate request id {}",
                request.id
            )));
        }
        if request.id == 0 || request.id >= genesis.next_request_id {
            return Err(ModuleError::InvalidGenesis(format!(
                "request id {} outside 1..{}",
                request.id, genesis.next_request_id
            )));
        }
        if !names.contains(request.service_name.as_str()) {
            return Err(ModuleError::InvalidGenesis(format!(
                "request {} names unknown service {}",
                request.id, request.service_name
            )));
        }
        if request.expiration_height == 0 {
            return Err(ModuleError::InvalidGenesis(format!(
                "request {} has no expiration height",
                request.id
            )));
        }
    }
    if genesis.next_request_id == 0 || genesis.next_request_id == u64::MAX {
        return Err(ModuleError::InvalidGenesis(format!(
            "next_request_id must be in 1..{}",
            u64::MAX
        )));
    }
    Ok(())
}

impl HasGenesis for ServiceModule {
    fn default_genesis(&self) -> Result<Value, ModuleError> {
        encode_blob(&ServiceGenesis::default())
    }

    fn validate_genesis(&self, blob: &Value) -> Result<(), ModuleError> {
        validate(&decode_blob(blob)?)
    }

    fn init_genesis(
        &self,
        ctx: &mut ModuleContext<'_>,
        blob: &Value,
    ) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        let genesis: ServiceGenesis = decode_blob(blob)?;
        validate(&genesis)?;

        let store = ctx.store();
        keeper::set_params(store, &genesis.params)?;
        keeper::set_next_request_id(store, genesis.next_request_id)?;
        for def in &genesis.definitions {
            keeper::set_definition(store, def)?;
        }
        for request in &genesis.requests {
            keeper::insert_request(store, request)?;
        }
        debug!(
            "[service] Genesis imported {} definitions, {} requests",
            genesis.definitions.len(),
            genesis.requests.len()
        );
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &QueryContext<'_>) -> Result<Value, ModuleError> {
        let store = ctx.store();
        encode_blob(&ServiceGenesis {
            params: keeper::params(store)?,
            definitions: keeper::definitions(store)?,
            requests: keeper::requests(store)?,
            next_request_id: keeper::next_request_id(store)?,
        })
    }
}

fn check_expiry_index(view: &StoreView<'_>) -> InvariantResult {
    let Some(store) = view.partition(MODULE_NAME) else {
        return InvariantResult::broken("service partition missing");
    };
    let requests = match keeper::requests(store) {
        Ok(requests) => requests,
        Err(e) => return InvariantResult::broken(e.to_string()),
    };
    let indexed = store.prefix_iter(keeper::EXPIRY_PREFIX).count();
    if indexed != requests.len() {
        return InvariantResult::broken(format!(
            "{} requests but {} expiry entries",
            requests.len(),
            indexed
        ));
    }
    match requests
        .iter()
        .find(|r| !store.has(&keeper::expiry_key(r.expiration_height, r.id)))
    {
        Some(r) => InvariantResult::broken(format!("request {} is not indexed", r.id)),
        None => InvariantResult::holds(format!("{} pending requests", requests.len())),
    }
}

impl HasInvariants for ServiceModule {
    fn register_invariants(&self, registry: &mut InvariantRegistry) {
        registry.register(MODULE_NAME, "expiry-index", check_expiry_index);
    }
}

impl HasSimulation for ServiceModule {
    fn randomized_genesis(&self, rng: &mut SimRng) -> Result<Value, ModuleError> {
        let params = ServiceParams {
            max_request_timeout: rng.gen_range(10..=200),
            max_input_len: rng.gen_range(64..=1024),
        };
        let definitions: Vec<ServiceDefinition> = (0..rng.gen_range(1..=4))
            .map(|i| ServiceDefinition {
                name: format!("svc{i}"),
                author: format!("author{}", rng.gen_range(0..4)),
                description: String::new(),
            })
            .collect();
        let requests: Vec<ServiceRequest> = (1..=rng.gen_range(0..=6u64))
            .map(|id| ServiceRequest {
                id,
                service_name: definitions[rng.gen_range(0..definitions.len())].name.clone(),
                consumer: format!("acc{}", rng.gen_range(0..8)),
                input: hex::encode(rng.gen::<[u8; 8]>()),
                expiration_height: rng.gen_range(1..=params.max_request_timeout),
            })
            .collect();
        let next_request_id = requests.len() as u64 + 1;
        encode_blob(&ServiceGenesis {
            params,
            definitions,
            requests,
            next_request_id,
        })
    }

    fn randomized_param_changes(&self, rng: &mut SimRng) -> Vec<ParamChange> {
        vec![
            ParamChange::new(
                MODULE_NAME,
                PARAM_MAX_REQUEST_TIMEOUT,
                rng.gen_range(10..=200u64).to_string(),
            ),
            ParamChange::new(
                MODULE_NAME,
                PARAM_MAX_INPUT_LEN,
                rng.gen_range(64..=1024u32).to_string(),
            ),
        ]
    }

    fn apply_param_change(
        &self,
        ctx: &mut ModuleContext<'_>,
        change: &ParamChange,
    ) -> Result<(), ModuleError> {
        let mut params = keeper::params(ctx.store_ref())?;
        apply_param_change(&mut params, change)?;
        keeper::set_params(ctx.store(), &params)
    }

    fn decode_store_entry(&self, key: &[u8], value: &[u8]) -> String {
        if key == keeper::PARAMS_KEY {
            if let Ok(params) = decode::<ServiceParams>(value) {
                return format!("params: {params:?}");
            }
        } else if key == keeper::NEXT_ID_KEY {
            if let Ok(id) = decode::<u64>(value) {
                return format!("next_request_id: {id}");
            }
        } else if key.starts_with(keeper::DEFINITION_PREFIX) {
            if let Ok(def) = decode::<ServiceDefinition>(value) {
                return format!("definition/{}: author={}", def.name, def.author);
            }
        } else if key.starts_with(keeper::REQUEST_PREFIX) {
            if let Ok(r) = decode::<ServiceRequest>(value) {
                return format!(
                    "request/{}: service={} consumer={} expires={}",
                    r.id, r.service_name, r.consumer, r.expiration_height
                );
            }
        } else if let Some((height, id)) = keeper::parse_expiry_key(key) {
            return format!("expiry/{height}/{id}");
        }
        hex_entry(key, value)
    }
}

impl AppModule for ServiceModule {
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
        let height = ctx.block().height;
        for id in keeper::due_requests(ctx.store_ref(), height) {
            let Some(request) = keeper::request(ctx.store_ref(), id)? else {
                continue;
            };
            keeper::remove_request(ctx.store(), &request);
            debug!("[service] Request {} expired at height {}", id, height);
            ctx.emit(
                Event::new("request_expired")
                    .attr("request_id", id)
                    .attr("service", &request.service_name),
            );
        }
        Ok(Vec::new())
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
