//! # Module Contexts
//!
//! Handles through which module code touches state.
//!
//! - [`ModuleContext`]: write access to the module's own partition, read
//!   access to every other partition. Used by handlers, block hooks and
//!   genesis import.
//! - [`QueryContext`]: read-only. Used by queriers, genesis export and
//!   invariants.

use crate::errors::ModuleError;
use shared_types::{BlockContext, Event, KvStore, MultiStore, StoreView};

/// Mutable context scoped to one module's partition.
pub struct ModuleContext<'a> {
    block: &'a BlockContext,
    store: &'a mut KvStore,
    others: StoreView<'a>,
    events: Vec<Event>,
}

impl<'a> ModuleContext<'a> {
    pub fn new(block: &'a BlockContext, store: &'a mut KvStore, others: StoreView<'a>) -> Self {
        Self {
            block,
            store,
            others,
            events: Vec::new(),
        }
    }

    /// The block being executed.
    pub fn block(&self) -> &BlockContext {
        self.block
    }

    /// The module's own partition.
    pub fn store(&mut self) -> &mut KvStore {
        &mut *self.store
    }

    /// Read-only access to the module's own partition.
    pub fn store_ref(&self) -> &KvStore {
        &*self.store
    }

    /// Read-only view of every other module's partition.
    pub fn others(&self) -> StoreView<'a> {
        self.others
    }

    /// Record an event for the current request or hook.
    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    fn into_events(self) -> Vec<Event> {
        self.events
    }
}

/// Read-only context for one module.
#[derive(Clone, Copy)]
pub struct QueryContext<'a> {
    store: &'a KvStore,
    view: StoreView<'a>,
}

impl<'a> QueryContext<'a> {
    pub fn new(store: &'a KvStore, view: StoreView<'a>) -> Self {
        Self { store, view }
    }

    /// The module's own partition.
    pub fn store(&self) -> &'a KvStore {
        self.store
    }

    /// Every partition, including the module's own.
    pub fn view(&self) -> StoreView<'a> {
        self.view
    }
}

/// Run `f` with write access to partition `module` of `store`.
///
/// The partition is checked out for the duration of `f` and always
/// returned, even when `f` fails. Events emitted through the context are
/// returned alongside the result.
pub(crate) fn with_module_context<R>(
    store: &mut MultiStore,
    module: &str,
    block: &BlockContext,
    f: impl FnOnce(&mut ModuleContext<'_>) -> Result<R, ModuleError>,
) -> Result<(R, Vec<Event>), ModuleError> {
    let mut checked_out = store.checkout(module)?;
    let (result, events) = {
        let mut ctx = ModuleContext::new(block, checked_out.partition_mut(), store.view());
        let result = f(&mut ctx);
        (result, ctx.into_events())
    };
    store.checkin(checked_out)?;
    result.map(|value| (value, events))
}

/// Run `f` with read-only access to partition `module` of `store`.
pub(crate) fn with_query_context<R>(
    store: &MultiStore,
    module: &str,
    f: impl FnOnce(&QueryContext<'_>) -> Result<R, ModuleError>,
) -> Result<R, ModuleError> {
    let partition = store
        .partition(module)
        .ok_or_else(|| shared_types::StoreError::PartitionNotFound(module.to_string()))?;
    let ctx = QueryContext::new(partition, store.view());
    f(&ctx)
}
