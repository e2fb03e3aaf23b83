//! The state machine runtime.
//!
//! `StateMachine` is a cheap, cloneable handle over shared state. It owns the
//! tree, one [`StateInstance`] per state, the event queue and the active-state
//! pointer. Transitions are serialized by an in-flight flag; events are
//! consumed one at a time, in arrival order, either by a background task
//! started with [`StateMachine::run`] or step by step with
//! [`StateMachine::run_once`].

use crate::builder::MachineBuilder;
use crate::config::MachineConfig;
use crate::core::{
    plan_transition, EventId, NodeId, StateTree, TransitionHistory, TransitionPlan,
    TransitionRecord, ROOT_NAME,
};
use crate::runtime::error::{MachineError, Result};
use crate::runtime::instance::StateInstance;
use crate::runtime::queue::{event_queue, EventReceiver, EventSender, QueueItem};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace, warn};
use uuid::Uuid;

/// Outcome of delivering one event to the active state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler consumed the event
    Consumed,
    /// No handler consumed the event; it was dropped
    Unhandled,
}

pub(crate) struct MachineInner {
    id: Uuid,
    name: String,
    tree: StateTree,
    instances: Vec<Option<Arc<StateInstance>>>,
    active: Mutex<Option<NodeId>>,
    transitioning: AtomicBool,
    running: AtomicBool,
    queue_capacity: usize,
    sender: Mutex<EventSender>,
    receiver: tokio::sync::Mutex<EventReceiver>,
    task: Mutex<Option<JoinHandle<()>>>,
    history: Mutex<TransitionHistory>,
}

/// Releases the in-flight flag when dropped, including when the transition
/// future is cancelled.
struct TransitionGuard<'a>(&'a AtomicBool);

impl<'a> TransitionGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(flag))
            .map_err(|_| MachineError::TransitionInProgress)
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Clears the running flag when the dispatch loop exits, including by panic.
struct LoopGuard<'a>(&'a AtomicBool);

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hierarchical state machine.
///
/// # Example
///
/// ```rust
/// use nestor::{StateDefinition, StateMachine};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let powered_off = StateDefinition::builder("PoweredOff")
///     .on_event("power", |ctx| async move {
///         ctx.transition_to("PoweredOn").await?;
///         Ok(true)
///     })
///     .build();
/// let powered_on = StateDefinition::builder("PoweredOn").build();
/// let idle = StateDefinition::builder("Idle").parent(&powered_on).build();
///
/// let machine = StateMachine::builder()
///     .initial(powered_off)
///     .states([powered_on, idle])
///     .build()?;
///
/// machine.start().await?;
/// assert_eq!(machine.state_name().as_deref(), Some("PoweredOff"));
///
/// machine.queue_event("power").await?;
/// machine.run_once().await?;
/// assert_eq!(machine.state_name().as_deref(), Some("Idle"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct StateMachine {
    inner: Arc<MachineInner>,
}

impl StateMachine {
    /// Start configuring a new machine.
    pub fn builder() -> MachineBuilder {
        MachineBuilder::new()
    }

    /// Create a machine over an already validated tree.
    pub(crate) fn new(tree: StateTree, config: MachineConfig) -> Self {
        let (sender, receiver) = event_queue(config.queue_capacity);

        let inner = Arc::new_cyclic(|weak| {
            let instances = tree
                .nodes()
                .iter()
                .map(|node| {
                    node.definition().map(|definition| {
                        Arc::new(StateInstance::new(
                            node.id(),
                            Arc::clone(definition),
                            weak.clone(),
                        ))
                    })
                })
                .collect();

            MachineInner {
                id: Uuid::new_v4(),
                name: config.name,
                tree,
                instances,
                active: Mutex::new(None),
                transitioning: AtomicBool::new(false),
                running: AtomicBool::new(false),
                queue_capacity: config.queue_capacity,
                sender: Mutex::new(sender),
                receiver: tokio::sync::Mutex::new(receiver),
                task: Mutex::new(None),
                history: Mutex::new(TransitionHistory::new(config.history_limit)),
            }
        });

        Self { inner }
    }

    pub(crate) fn from_inner(inner: Arc<MachineInner>) -> Self {
        Self { inner }
    }

    /// Unique id of this machine.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Name attached to every log record of this machine.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The validated state hierarchy.
    pub fn tree(&self) -> &StateTree {
        &self.inner.tree
    }

    /// The active leaf state, `None` before `start` and after `stop`.
    pub fn state(&self) -> Option<Arc<StateInstance>> {
        self.active_node().and_then(|id| self.instance_at(id))
    }

    /// Name of the active leaf state.
    pub fn state_name(&self) -> Option<String> {
        self.active_node()
            .map(|id| self.inner.tree.name(id).to_owned())
    }

    /// Instance of the state called `name`.
    pub fn instance(&self, name: &str) -> Option<Arc<StateInstance>> {
        self.inner.tree.find(name).and_then(|id| self.instance_at(id))
    }

    /// Whether a leaf state is active.
    pub fn is_started(&self) -> bool {
        self.active_node().is_some()
    }

    /// Whether a background dispatch loop is active.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Snapshot of the recorded transitions.
    pub fn history(&self) -> TransitionHistory {
        lock(&self.inner.history).clone()
    }

    /// Enter the initial leaf of the tree.
    #[instrument(skip(self), fields(machine = %self.inner.name))]
    pub async fn start(&self) -> Result<()> {
        if self.is_started() {
            return Err(MachineError::AlreadyStarted);
        }
        let _guard = TransitionGuard::acquire(&self.inner.transitioning)?;

        let plan = plan_transition(&self.inner.tree, None, NodeId::ROOT);
        self.execute(plan).await;
        Ok(())
    }

    /// Transition to `target`, settling on its innermost initial leaf.
    ///
    /// Exit actions run innermost first, then entry actions outermost first,
    /// one at a time. Returns once every action has completed.
    #[instrument(skip(self), fields(machine = %self.inner.name))]
    pub async fn transition_to(&self, target: &str) -> Result<()> {
        let requested = self
            .inner
            .tree
            .find(target)
            .ok_or_else(|| MachineError::UnknownState {
                name: target.to_owned(),
            })?;
        let _guard = TransitionGuard::acquire(&self.inner.transitioning)?;

        let plan = plan_transition(&self.inner.tree, self.active_node(), requested);
        self.execute(plan).await;
        Ok(())
    }

    /// Queue an event, waiting for space if the queue is bounded and full.
    ///
    /// Awaiting this from a handler running in the background loop deadlocks
    /// when the queue is full.
    pub async fn queue_event(&self, event: impl Into<EventId>) -> Result<()> {
        let event = event.into();
        self.sender().send(QueueItem::Event(event)).await
    }

    /// Queue an event without waiting, failing with [`MachineError::QueueFull`].
    pub fn try_queue_event(&self, event: impl Into<EventId>) -> Result<()> {
        self.sender().try_send(QueueItem::Event(event.into()))
    }

    /// Spawn the background dispatch loop, starting the machine first if
    /// needed. Requires a tokio runtime.
    #[instrument(skip(self), fields(machine = %self.inner.name))]
    pub async fn run(&self) -> Result<()> {
        if self.inner.running.swap(true, Ordering::AcqRel) {
            return Err(MachineError::AlreadyRunning);
        }

        if !self.is_started() {
            if let Err(e) = self.start().await {
                self.inner.running.store(false, Ordering::Release);
                return Err(e);
            }
        }

        let handle = tokio::spawn(self.clone().dispatch_loop());
        *lock(&self.inner.task) = Some(handle);
        debug!("Dispatch loop started");
        Ok(())
    }

    /// Dispatch at most one pending event without waiting for one.
    ///
    /// Returns `None` when the queue is empty. Not available while a
    /// background loop is running.
    pub async fn run_once(&self) -> Result<Option<Dispatch>> {
        if self.is_running() {
            return Err(MachineError::InvalidOperation {
                reason: "run_once called while the dispatch loop is running".to_string(),
            });
        }
        if !self.is_started() {
            self.start().await?;
        }

        let item = {
            let mut receiver =
                self.inner
                    .receiver
                    .try_lock()
                    .map_err(|_| MachineError::InvalidOperation {
                        reason: "event queue is being consumed elsewhere".to_string(),
                    })?;
            receiver.try_recv()
        };

        match item {
            Some(QueueItem::Event(event)) => self.dispatch(&event).await.map(Some),
            Some(QueueItem::Stop) | None => Ok(None),
        }
    }

    /// Stop the background loop, drop pending events and clear the active
    /// state. The machine can be started again afterwards.
    ///
    /// Producers still waiting for space in a bounded queue fail with
    /// [`MachineError::QueueClosed`]. Awaiting this from a handler running in
    /// the background loop deadlocks.
    #[instrument(skip(self), fields(machine = %self.inner.name))]
    pub async fn stop(&self) -> Result<()> {
        if self.is_running() {
            self.sender().send(QueueItem::Stop).await?;
        } else if !self.is_started() {
            warn!("State machine is already stopped");
        }

        let handle = lock(&self.inner.task).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Dispatch loop terminated abnormally");
            }
        }
        self.inner.running.store(false, Ordering::Release);

        let dropped = self.reset_queue().await;
        self.set_active(None);
        self.inner.transitioning.store(false, Ordering::Release);

        debug!(dropped, "State machine stopped");
        Ok(())
    }

    fn sender(&self) -> EventSender {
        lock(&self.inner.sender).clone()
    }

    /// Replace the queue with an empty one, closing and draining the old one.
    async fn reset_queue(&self) -> usize {
        let (sender, receiver) = event_queue(self.inner.queue_capacity);
        let mut current = self.inner.receiver.lock().await;
        *lock(&self.inner.sender) = sender;

        let mut stale = std::mem::replace(&mut *current, receiver);
        stale.close();
        stale.drain()
    }

    fn active_node(&self) -> Option<NodeId> {
        *lock(&self.inner.active)
    }

    fn set_active(&self, node: Option<NodeId>) {
        *lock(&self.inner.active) = node;
    }

    fn instance_at(&self, id: NodeId) -> Option<Arc<StateInstance>> {
        self.inner.instances.get(id.index()).cloned().flatten()
    }

    async fn execute(&self, plan: TransitionPlan) {
        let tree = &self.inner.tree;

        if plan.is_noop() {
            trace!(
                machine = %self.inner.name,
                state = %tree.name(plan.destination),
                "Already in target state"
            );
            return;
        }

        let from = plan.source.map(|id| tree.name(id).to_owned());
        let to = tree.name(plan.destination);
        debug!(
            machine = %self.inner.name,
            "{} -> {}",
            from.as_deref().unwrap_or(ROOT_NAME),
            to
        );

        for &id in &plan.exit {
            if let Some(instance) = self.instance_at(id) {
                instance.exit(self).await;
            }
        }

        self.set_active(Some(plan.destination));

        for &id in &plan.entry {
            if let Some(instance) = self.instance_at(id) {
                instance.enter(self).await;
            }
        }

        let record = TransitionRecord::new(
            from,
            to,
            tree.names(&plan.exit),
            tree.names(&plan.entry),
        );
        lock(&self.inner.history).record(record);
    }

    async fn dispatch(&self, event: &EventId) -> Result<Dispatch> {
        let Some(instance) = self.state() else {
            trace!(machine = %self.inner.name, event = %event, "No active state, event dropped");
            return Ok(Dispatch::Unhandled);
        };

        if instance.process_event(self, event).await? {
            Ok(Dispatch::Consumed)
        } else {
            trace!(
                machine = %self.inner.name,
                state = %instance.name(),
                event = %event,
                "Event not handled, dropped"
            );
            Ok(Dispatch::Unhandled)
        }
    }

    async fn dispatch_loop(self) {
        let _running = LoopGuard(&self.inner.running);
        let mut receiver = self.inner.receiver.lock().await;

        while let Some(item) = receiver.recv().await {
            let event = match item {
                QueueItem::Event(event) => event,
                QueueItem::Stop => break,
            };

            if let Err(e) = self.dispatch(&event).await {
                error!(
                    machine = %self.inner.name,
                    event = %event,
                    error = %e,
                    "Event handler failed"
                );
            }
        }

        debug!(machine = %self.inner.name, "Dispatch loop exited");
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("state", &self.state_name())
            .field("running", &self.is_running())
            .finish()
    }
}
