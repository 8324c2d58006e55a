//! State shared by every compilation in a session.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::rc::Rc;

use crate::domain::error::{CompileError, TradeflowError};
use crate::domain::node::Node;
use crate::domain::order::{OrderPublisher, TaskQueue};
use crate::domain::reactor::{proxy, FoldSlot, ProxyBinding, Trigger};
use crate::domain::translation::{with_native_type, Translation};
use crate::domain::types::NativeType;
use crate::domain::value::NativeValue;
use crate::ports::market_data_port::MarketDataClient;
use crate::ports::order_execution_port::OrderExecutionClient;
use crate::ports::script_port::ScriptHost;
use crate::ports::time_port::TimeClient;
use crate::ports::timer_port::TimerFactory;

/// Address of a node, its identity within one tree.
pub(crate) type NodeKey = *const Node;

pub(crate) fn node_key(node: &Node) -> NodeKey {
    node
}

type Binder = Box<dyn FnOnce(&Translation) -> Result<(), CompileError>>;

/// A placeholder handed out while its node is still being compiled.
pub(crate) struct PendingProxy {
    pub translation: Translation,
    binder: Binder,
}

impl PendingProxy {
    pub fn bind(self, target: &Translation) -> Result<(), CompileError> {
        (self.binder)(target)
    }
}

/// Collaborators and memo tables for compiling trees that live for `'a`.
///
/// Translations are memoized by node address, so compiling the same node
/// twice yields the same series.
pub struct CompilationContext<'a> {
    account: String,
    trigger: Trigger,
    tasks: TaskQueue,
    publisher: OrderPublisher,
    time: Rc<dyn TimeClient>,
    order_client: Option<Rc<dyn OrderExecutionClient>>,
    market_data: Option<Rc<dyn MarketDataClient>>,
    timers: Option<Rc<dyn TimerFactory>>,
    scripts: Option<Rc<dyn ScriptHost>>,
    memo: HashMap<NodeKey, Translation>,
    pending: HashMap<NodeKey, PendingProxy>,
    proxies: Vec<Rc<dyn ProxyBinding>>,
    fold_slots: HashMap<NodeKey, Rc<dyn Any>>,
    order_slots: HashMap<NodeKey, BTreeMap<String, Translation>>,
    _trees: PhantomData<&'a Node>,
}

impl<'a> CompilationContext<'a> {
    pub fn new(account: &str, time: Rc<dyn TimeClient>) -> Result<Self, TradeflowError> {
        Ok(Self {
            account: account.to_string(),
            trigger: Trigger::new(),
            tasks: TaskQueue::new("tradeflow-tasks")?,
            publisher: OrderPublisher::new(),
            time,
            order_client: None,
            market_data: None,
            timers: None,
            scripts: None,
            memo: HashMap::new(),
            pending: HashMap::new(),
            proxies: Vec::new(),
            fold_slots: HashMap::new(),
            order_slots: HashMap::new(),
            _trees: PhantomData,
        })
    }

    pub fn with_order_client(mut self, client: Rc<dyn OrderExecutionClient>) -> Self {
        self.order_client = Some(client);
        self
    }

    pub fn with_market_data(mut self, client: Rc<dyn MarketDataClient>) -> Self {
        self.market_data = Some(client);
        self
    }

    pub fn with_timers(mut self, timers: Rc<dyn TimerFactory>) -> Self {
        self.timers = Some(timers);
        self
    }

    pub fn with_scripts(mut self, host: Rc<dyn ScriptHost>) -> Self {
        self.scripts = Some(host);
        self
    }

    /// A context sharing this one's collaborators and trigger, with empty
    /// memo tables.
    pub(crate) fn fork<'b>(&self) -> CompilationContext<'b> {
        CompilationContext {
            account: self.account.clone(),
            trigger: self.trigger.clone(),
            tasks: self.tasks.clone(),
            publisher: self.publisher.clone(),
            time: Rc::clone(&self.time),
            order_client: self.order_client.clone(),
            market_data: self.market_data.clone(),
            timers: self.timers.clone(),
            scripts: self.scripts.clone(),
            memo: HashMap::new(),
            pending: HashMap::new(),
            proxies: Vec::new(),
            fold_slots: HashMap::new(),
            order_slots: HashMap::new(),
            _trees: PhantomData,
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// The wake signal shared by every reactor compiled in this context.
    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    pub fn publisher(&self) -> &OrderPublisher {
        &self.publisher
    }

    pub fn time(&self) -> Rc<dyn TimeClient> {
        Rc::clone(&self.time)
    }

    pub fn order_client(&self) -> Option<Rc<dyn OrderExecutionClient>> {
        self.order_client.clone()
    }

    pub fn market_data(&self) -> Option<Rc<dyn MarketDataClient>> {
        self.market_data.clone()
    }

    pub fn timers(&self) -> Option<Rc<dyn TimerFactory>> {
        self.timers.clone()
    }

    pub fn scripts(&self) -> Option<Rc<dyn ScriptHost>> {
        self.scripts.clone()
    }

    /// Number of placeholders created so far that never got a target.
    pub fn unbound_proxies(&self) -> usize {
        self.proxies.iter().filter(|p| !p.is_bound()).count()
    }

    /// Translations registered for the named slots of an order node.
    pub fn order_slot(&self, node: &Node, slot: &str) -> Option<Translation> {
        self.order_slots
            .get(&node_key(node))
            .and_then(|slots| slots.get(slot))
            .cloned()
    }

    pub(crate) fn memo(&self, key: NodeKey) -> Option<Translation> {
        self.memo.get(&key).cloned()
    }

    /// Last write wins.
    pub(crate) fn memoize(&mut self, key: NodeKey, translation: Translation) {
        self.memo.insert(key, translation);
    }

    pub(crate) fn pending_proxy(&self, key: NodeKey) -> Option<Translation> {
        self.pending.get(&key).map(|p| p.translation.clone())
    }

    /// Creates a placeholder of `native` for a node about to be compiled.
    pub(crate) fn install_proxy(&mut self, key: NodeKey, native: NativeType) {
        let (translation, binding, binder) = with_native_type!(native, T => typed_proxy::<T>());
        self.proxies.push(binding);
        self.pending.insert(
            key,
            PendingProxy {
                translation,
                binder,
            },
        );
    }

    pub(crate) fn take_proxy(&mut self, key: NodeKey) -> Option<PendingProxy> {
        self.pending.remove(&key)
    }

    pub(crate) fn register_fold_slot<T: NativeValue>(&mut self, key: NodeKey, slot: Rc<FoldSlot<T>>) {
        self.fold_slots.insert(key, slot as Rc<dyn Any>);
    }

    pub(crate) fn fold_slot<T: NativeValue>(&self, key: NodeKey) -> Option<Rc<FoldSlot<T>>> {
        self.fold_slots
            .get(&key)
            .cloned()
            .and_then(|slot| slot.downcast::<FoldSlot<T>>().ok())
    }

    pub(crate) fn register_order_slot(&mut self, key: NodeKey, slot: &str, translation: Translation) {
        self.order_slots
            .entry(key)
            .or_default()
            .insert(slot.to_string(), translation);
    }
}

fn typed_proxy<T: NativeValue>() -> (Translation, Rc<dyn ProxyBinding>, Binder) {
    let (cell, series) = proxy::<T>();
    let binding: Rc<dyn ProxyBinding> = cell.clone();
    let binder: Binder = Box::new(move |target: &Translation| {
        cell.bind(&target.extract::<T>()?);
        Ok(())
    });
    (Translation::new(series), binding, binder)
}

impl std::fmt::Debug for CompilationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationContext")
            .field("account", &self.account)
            .field("memoized", &self.memo.len())
            .field("proxies", &self.proxies.len())
            .finish()
    }
}
