//! # Block Lifecycle Sequencer
//!
//! Runs begin/end-block hooks in registry order and routes requests and
//! queries to their owning module.
//!
//! ## Failure Model
//!
//! - A hook failure halts the remaining hooks of that phase and is
//!   returned as a [`HookError`]. The caller must stop processing the block.
//! - A routing or handler failure is scoped to the single request and
//!   returned as a [`RequestError`]. Other requests are unaffected.

use crate::context::{with_module_context, with_query_context};
use crate::errors::{HookError, HookPhase, ModuleError, RequestError};
use crate::registry::RegisteredModule;
use crate::router::RouteTable;
use serde_json::Value;
use shared_types::{BlockContext, Event, MultiStore, Query, Request, Response, ValidatorUpdate};
use tracing::{debug, error, warn};

/// Result of the end-block phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockOutcome {
    /// Validator updates concatenated in registry order.
    pub validator_updates: Vec<ValidatorUpdate>,
    pub events: Vec<Event>,
}

/// Per-block driver over a frozen registry.
pub struct BlockSequencer<'r> {
    modules: &'r [RegisteredModule],
    routes: &'r RouteTable,
}

impl<'r> BlockSequencer<'r> {
    pub(crate) fn new(modules: &'r [RegisteredModule], routes: &'r RouteTable) -> Self {
        Self { modules, routes }
    }

    /// Run every module's begin-block hook, in registry order.
    pub fn begin_block(
        &self,
        store: &mut MultiStore,
        block: &BlockContext,
    ) -> Result<Vec<Event>, HookError> {
        let mut events = Vec::new();
        for module in self.modules {
            let ((), hook_events) = with_module_context(store, module.name(), block, |ctx| {
                module.module().begin_block(ctx)
            })
            .map_err(|cause| Self::hook_failed(module, HookPhase::BeginBlock, block, cause))?;
            debug!(
                "[Sequencer] BeginBlock {} height={} events={}",
                module.name(),
                block.height,
                hook_events.len()
            );
            events.extend(hook_events);
        }
        Ok(events)
    }

    /// Run every module's end-block hook, in registry order.
    pub fn end_block(
        &self,
        store: &mut MultiStore,
        block: &BlockContext,
    ) -> Result<BlockOutcome, HookError> {
        let mut outcome = BlockOutcome::default();
        for module in self.modules {
            let (updates, hook_events) =
                with_module_context(store, module.name(), block, |ctx| {
                    module.module().end_block(ctx)
                })
                .map_err(|cause| Self::hook_failed(module, HookPhase::EndBlock, block, cause))?;
            debug!(
                "[Sequencer] EndBlock {} height={} validator_updates={}",
                module.name(),
                block.height,
                updates.len()
            );
            outcome.validator_updates.extend(updates);
            outcome.events.extend(hook_events);
        }
        Ok(outcome)
    }

    fn hook_failed(
        module: &RegisteredModule,
        phase: HookPhase,
        block: &BlockContext,
        cause: ModuleError,
    ) -> HookError {
        error!(
            "[Sequencer] ✗ {} {} failed at height {}: {}",
            module.name(),
            phase,
            block.height,
            cause
        );
        HookError {
            module: module.name().to_string(),
            phase,
            height: block.height,
            cause,
        }
    }

    /// Route one request to its owning module and run the handler.
    ///
    /// Events emitted through the context are appended to the response.
    pub fn deliver(
        &self,
        store: &mut MultiStore,
        block: &BlockContext,
        request: &Request,
    ) -> Result<Response, RequestError> {
        let routed = self.routes.route_handler(&request.route).map_err(|e| {
            warn!("[Sequencer] {}", e);
            e
        })?;

        let (mut response, events) =
            with_module_context(store, &routed.module, block, |ctx| {
                (routed.handler)(ctx, request)
            })
            .map_err(|cause| {
                debug!(
                    "[Sequencer] {} rejected {}: {}",
                    routed.module, request.msg_type, cause
                );
                RequestError::Handler {
                    module: routed.module.clone(),
                    msg_type: request.msg_type.clone(),
                    cause,
                }
            })?;

        response.events.extend(events);
        Ok(response)
    }

    /// Route one read-only query.
    pub fn query(&self, store: &MultiStore, query: &Query) -> Result<Value, RequestError> {
        let routed = self.routes.route_querier(&query.route)?;
        with_query_context(store, &routed.module, |ctx| (routed.querier)(ctx, query)).map_err(
            |cause| RequestError::Querier {
                module: routed.module.clone(),
                path: query.path.clone(),
                cause,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ModuleContext, QueryContext};
    use crate::descriptor::ModuleDescriptor;
    use crate::errors::RouteError;
    use crate::module::{AppModule, DynModule, Handler, Querier};
    use crate::registry::ModuleRegistry;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Records hook calls into a shared log and emits one validator update.
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_end: bool,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                log: Arc::clone(log),
                fail_end: false,
            }
        }
    }

    fn counter_handler(
        ctx: &mut ModuleContext<'_>,
        req: &Request,
    ) -> Result<Response, ModuleError> {
        match req.msg_type.as_str() {
            "incr" => {
                let next = ctx.store_ref().get(b"n").map(|v| v[0]).unwrap_or(0) + 1;
                ctx.store().set(b"n".to_vec(), vec![next]);
                ctx.emit(Event::new("incremented").attr("n", next));
                Ok(Response::with_data(json!(next)))
            }
            other => Err(ModuleError::UnknownMessage(other.to_string())),
        }
    }

    fn counter_querier(ctx: &QueryContext<'_>, query: &Query) -> Result<Value, ModuleError> {
        match query.path.as_str() {
            "n" => Ok(json!(ctx.store().get(b"n").map(|v| v[0]).unwrap_or(0))),
            other => Err(ModuleError::UnknownQuery(other.to_string())),
        }
    }

    impl AppModule for Recorder {
        fn descriptor(&self) -> ModuleDescriptor {
            ModuleDescriptor::new(self.name)
        }

        fn new_handler(&self) -> Option<Handler> {
            Some(Arc::new(counter_handler))
        }

        fn new_querier(&self) -> Option<Querier> {
            Some(Arc::new(counter_querier))
        }

        fn begin_block(&self, _ctx: &mut ModuleContext<'_>) -> Result<(), ModuleError> {
            if let Ok(mut log) = self.log.lock() {
                log.push(format!("begin:{}", self.name));
            }
            Ok(())
        }

        fn end_block(
            &self,
            ctx: &mut ModuleContext<'_>,
        ) -> Result<Vec<ValidatorUpdate>, ModuleError> {
            if let Ok(mut log) = self.log.lock() {
                log.push(format!("end:{}", self.name));
            }
            if self.fail_end {
                return Err(ModuleError::Internal("end failed".to_string()));
            }
            Ok(vec![ValidatorUpdate::new(self.name, ctx.block().height as i64)])
        }
    }

    fn registry(modules: Vec<Recorder>) -> ModuleRegistry {
        ModuleRegistry::from_modules(modules.into_iter().map(|m| Arc::new(m) as DynModule))
            .unwrap()
    }

    #[test]
    fn test_hooks_follow_registry_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(vec![Recorder::new("b", &log), Recorder::new("a", &log)]);
        let mut store = registry.new_store();
        let block = BlockContext::new("test", 3, 0);
        let sequencer = registry.sequencer().unwrap();

        sequencer.begin_block(&mut store, &block).unwrap();
        let outcome = sequencer.end_block(&mut store, &block).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["begin:b", "begin:a", "end:b", "end:a"]
        );
        assert_eq!(
            outcome.validator_updates,
            vec![ValidatorUpdate::new("b", 3), ValidatorUpdate::new("a", 3)]
        );
    }

    #[test]
    fn test_validator_updates_reverse_with_registration() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let forward = registry(vec![Recorder::new("a", &log), Recorder::new("b", &log)]);
        let reverse = registry(vec![Recorder::new("b", &log), Recorder::new("a", &log)]);
        let block = BlockContext::new("test", 1, 0);

        let mut s1 = forward.new_store();
        let mut s2 = reverse.new_store();
        let u1 = forward
            .sequencer()
            .unwrap()
            .end_block(&mut s1, &block)
            .unwrap()
            .validator_updates;
        let mut u2 = reverse
            .sequencer()
            .unwrap()
            .end_block(&mut s2, &block)
            .unwrap()
            .validator_updates;

        u2.reverse();
        assert_eq!(u1, u2);
    }

    #[test]
    fn test_end_block_failure_halts_remaining_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = Recorder::new("b", &log);
        failing.fail_end = true;
        let registry = registry(vec![
            Recorder::new("a", &log),
            failing,
            Recorder::new("c", &log),
        ]);
        let mut store = registry.new_store();

        let err = registry
            .sequencer()
            .unwrap()
            .end_block(&mut store, &BlockContext::new("test", 9, 0))
            .unwrap_err();

        assert_eq!(err.module, "b");
        assert_eq!(err.phase, HookPhase::EndBlock);
        assert_eq!(err.height, 9);
        assert_eq!(*log.lock().unwrap(), vec!["end:a", "end:b"]);
        assert!(store.is_mounted("b"));
    }

    #[test]
    fn test_deliver_and_query() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(vec![Recorder::new("a", &log), Recorder::new("b", &log)]);
        let mut store = registry.new_store();
        let block = BlockContext::new("test", 1, 0);
        let sequencer = registry.sequencer().unwrap();

        let response = sequencer
            .deliver(&mut store, &block, &Request::new("b", "incr", Value::Null))
            .unwrap();
        assert_eq!(response.data, json!(1));
        assert_eq!(response.events.len(), 1);
        assert!(store.partition("a").unwrap().is_empty());

        assert_eq!(
            sequencer.query(&store, &Query::new("b", "n", Value::Null)).unwrap(),
            json!(1)
        );
        assert_eq!(
            sequencer.query(&store, &Query::new("a", "n", Value::Null)).unwrap(),
            json!(0)
        );
    }

    #[test]
    fn test_request_errors_are_scoped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(vec![Recorder::new("a", &log)]);
        let mut store = registry.new_store();
        let block = BlockContext::new("test", 1, 0);
        let sequencer = registry.sequencer().unwrap();

        let err = sequencer
            .deliver(&mut store, &block, &Request::new("nowhere", "incr", Value::Null))
            .unwrap_err();
        assert!(matches!(
            err,
            RequestError::Route(RouteError::UnroutableRequest { key }) if key == "nowhere"
        ));

        let err = sequencer
            .deliver(&mut store, &block, &Request::new("a", "burn", Value::Null))
            .unwrap_err();
        assert!(matches!(
            err,
            RequestError::Handler { cause: ModuleError::UnknownMessage(_), .. }
        ));

        // A later request still succeeds.
        assert!(sequencer
            .deliver(&mut store, &block, &Request::new("a", "incr", Value::Null))
            .is_ok());

        let err = sequencer
            .query(&store, &Query::new("a", "missing", Value::Null))
            .unwrap_err();
        assert!(matches!(err, RequestError::Querier { path, .. } if path == "missing"));
    }
}
