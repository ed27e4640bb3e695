use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sipbridge_sip_core::{Message, Request, Response};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::timer::{TimerHandle, TimerKind, TimerProvider, TimerSettings};
use crate::transaction::{
    AtomicTransactionState, TransactionEvent, TransactionKey, TransactionKind,
    TransactionServices, TransactionState,
};
use crate::transport::Transport;

/// Run by the transaction task once it has terminated.
pub(crate) type TerminationHook = Box<dyn FnOnce(&TransactionKey) + Send + 'static>;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

pub(crate) enum Command<O> {
    Op {
        op: O,
        reply: oneshot::Sender<Result<()>>,
    },
    Terminate,
}

/// Timers currently armed by one transaction.
///
/// Each arming gets a fresh generation. A firing is only acted upon if its
/// generation still matches the armed slot, so a callback that was already
/// queued when its timer got cancelled or re-armed is dropped.
pub(crate) struct TimerSlots<T: TimerKind> {
    provider: Arc<dyn TimerProvider>,
    fired_tx: mpsc::UnboundedSender<(T, u64)>,
    armed: HashMap<T, (u64, TimerHandle)>,
    next_generation: u64,
}

impl<T: TimerKind> TimerSlots<T> {
    fn new(provider: Arc<dyn TimerProvider>, fired_tx: mpsc::UnboundedSender<(T, u64)>) -> Self {
        Self {
            provider,
            fired_tx,
            armed: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Arms `timer`, replacing any previous arming of it.
    pub fn arm(&mut self, timer: T, delay: Duration) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let fired_tx = self.fired_tx.clone();
        let handle = self.provider.schedule(
            timer.timer_type(),
            delay,
            Box::new(move || {
                let _ = fired_tx.send((timer, generation));
            }),
        );
        trace!(timer = %timer.timer_type(), ?delay, generation, "Timer armed");
        if let Some((_, previous)) = self.armed.insert(timer, (generation, handle)) {
            previous.cancel();
        }
    }

    pub fn cancel(&mut self, timer: T) {
        if let Some((_, handle)) = self.armed.remove(&timer) {
            handle.cancel();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, (_, handle)) in self.armed.drain() {
            handle.cancel();
        }
    }

    #[cfg(test)]
    fn is_armed(&self, timer: T) -> bool {
        self.armed.contains_key(&timer)
    }

    /// Accepts a firing if it belongs to the current arming of `timer`.
    fn claim(&mut self, timer: T, generation: u64) -> bool {
        match self.armed.get(&timer) {
            Some((armed, _)) if *armed == generation => {
                self.armed.remove(&timer);
                true
            }
            _ => false,
        }
    }
}

/// Everything a transaction task owns, shared by all transaction kinds.
pub(crate) struct TransactionContext<T: TimerKind> {
    pub key: TransactionKey,
    pub kind: TransactionKind,
    pub request: Request,
    pub remote_addr: SocketAddr,
    /// Last final response sent (server) or received (client)
    pub last_response: Option<Response>,
    pub settings: TimerSettings,
    pub timers: TimerSlots<T>,
    shared_state: Arc<AtomicTransactionState>,
    current: TransactionState,
    transport: Arc<dyn Transport>,
    events_tx: mpsc::UnboundedSender<TransactionEvent>,
}

impl<T: TimerKind> TransactionContext<T> {
    pub fn state(&self) -> TransactionState {
        self.current
    }

    fn set_state(&mut self, state: TransactionState) {
        self.current = state;
        self.shared_state.set(state);
    }

    pub fn emit(&self, event: TransactionEvent) {
        if self.events_tx.send(event).is_err() {
            trace!(id = %self.key, "Transaction event receiver dropped");
        }
    }

    pub async fn send(&self, message: Message) -> Result<()> {
        self.transport
            .send_message(message, self.remote_addr)
            .await
            .map_err(|e| match e {
                Error::TransportError(reason) => Error::TransportError(reason),
                other => Error::TransportError(other.to_string()),
            })
    }

    pub async fn send_request(&self) -> Result<()> {
        self.send(Message::Request(self.request.clone())).await
    }

    pub async fn send_response(&self, response: &Response) -> Result<()> {
        self.send(Message::Response(response.clone())).await
    }

    /// Emits the transport-failure notifications. Client transactions also
    /// report a timeout (RFC 3261 §17.1.4).
    pub fn report_transport_failure(&self) {
        self.emit(TransactionEvent::TransportError {
            transaction_id: self.key.clone(),
        });
        if self.kind.is_client() {
            self.emit(TransactionEvent::Timeout {
                transaction_id: self.key.clone(),
            });
        }
    }

    pub fn invalid(&self, operation: &'static str) -> Error {
        Error::InvalidOperation {
            operation,
            state: self.current,
        }
    }

    fn terminate_now(&mut self) {
        let previous = self.current;
        if previous.is_terminated() {
            return;
        }
        self.set_state(TransactionState::Terminated);
        self.timers.cancel_all();
        self.emit(TransactionEvent::StateChanged {
            transaction_id: self.key.clone(),
            previous_state: previous,
            new_state: TransactionState::Terminated,
        });
    }
}

/// Behavior specific to one transaction kind.
///
/// The generic loop in this module owns the task, validates and applies every
/// transition the logic asks for, and calls `on_enter_state` after each one.
/// Each method returns the state to move to, if any.
#[async_trait]
pub(crate) trait TransactionLogic: Send + 'static {
    type Timer: TimerKind;
    type Op: Send + 'static;

    fn kind(&self) -> TransactionKind;

    /// Called once, in the initial state, before any operation is processed.
    async fn on_start(
        &mut self,
        ctx: &mut TransactionContext<Self::Timer>,
    ) -> Result<Option<TransactionState>>;

    /// Arms or cancels timers for the state just entered.
    async fn on_enter_state(
        &mut self,
        ctx: &mut TransactionContext<Self::Timer>,
        new_state: TransactionState,
        previous_state: TransactionState,
    ) -> Result<Option<TransactionState>>;

    async fn handle_op(
        &mut self,
        ctx: &mut TransactionContext<Self::Timer>,
        op: Self::Op,
    ) -> Result<Option<TransactionState>>;

    async fn handle_timer(
        &mut self,
        ctx: &mut TransactionContext<Self::Timer>,
        timer: Self::Timer,
    ) -> Result<Option<TransactionState>>;
}

/// Sending side of a running transaction.
pub(crate) struct TransactionHandle<O> {
    key: TransactionKey,
    kind: TransactionKind,
    remote_addr: SocketAddr,
    instance: u64,
    state: Arc<AtomicTransactionState>,
    cmd_tx: mpsc::UnboundedSender<Command<O>>,
}

impl<O> Clone for TransactionHandle<O> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            kind: self.kind,
            remote_addr: self.remote_addr,
            instance: self.instance,
            state: self.state.clone(),
            cmd_tx: self.cmd_tx.clone(),
        }
    }
}

impl<O> fmt::Debug for TransactionHandle<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("remote_addr", &self.remote_addr)
            .field("state", &self.state.get())
            .finish()
    }
}

impl<O: Send + 'static> TransactionHandle<O> {
    pub fn key(&self) -> &TransactionKey {
        &self.key
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn state(&self) -> TransactionState {
        self.state.get()
    }

    /// Distinguishes two transactions created with the same key.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Runs `op` on the transaction task and returns its verdict.
    ///
    /// A transaction that already terminated ignores the operation.
    pub async fn request(&self, op: O) -> Result<()> {
        let (reply, verdict) = oneshot::channel();
        if self.cmd_tx.send(Command::Op { op, reply }).is_err() {
            debug!(id = %self.key, "Transaction already terminated, operation ignored");
            return Ok(());
        }
        match verdict.await {
            Ok(result) => result,
            Err(_) => {
                debug!(id = %self.key, "Transaction terminated before answering");
                Ok(())
            }
        }
    }

    pub fn terminate(&self) {
        let _ = self.cmd_tx.send(Command::Terminate);
    }
}

/// A created transaction whose task has not been spawned yet.
pub(crate) struct PendingTransaction<L: TransactionLogic> {
    logic: L,
    ctx: TransactionContext<L::Timer>,
    cmd_rx: mpsc::UnboundedReceiver<Command<L::Op>>,
    fired_rx: mpsc::UnboundedReceiver<(L::Timer, u64)>,
    on_terminated: Option<TerminationHook>,
}

impl<L: TransactionLogic> PendingTransaction<L> {
    pub fn on_terminated(mut self, hook: TerminationHook) -> Self {
        self.on_terminated = Some(hook);
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(run_transaction_loop(self))
    }
}

pub(crate) fn prepare<L: TransactionLogic>(
    logic: L,
    key: TransactionKey,
    request: Request,
    remote_addr: SocketAddr,
    services: &TransactionServices,
) -> (TransactionHandle<L::Op>, PendingTransaction<L>) {
    let kind = logic.kind();
    let initial = kind.initial_state();
    let shared_state = Arc::new(AtomicTransactionState::new(initial));
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (fired_tx, fired_rx) = mpsc::unbounded_channel();

    let ctx = TransactionContext {
        key: key.clone(),
        kind,
        request,
        remote_addr,
        last_response: None,
        settings: services.timers.settings(),
        timers: TimerSlots::new(services.timers.clone(), fired_tx),
        shared_state: shared_state.clone(),
        current: initial,
        transport: services.transport.clone(),
        events_tx: services.events_tx.clone(),
    };
    let handle = TransactionHandle {
        key,
        kind,
        remote_addr,
        instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
        state: shared_state,
        cmd_tx,
    };
    let pending = PendingTransaction {
        logic,
        ctx,
        cmd_rx,
        fired_rx,
        on_terminated: None,
    };
    (handle, pending)
}

async fn run_transaction_loop<L: TransactionLogic>(pending: PendingTransaction<L>) {
    let PendingTransaction {
        mut logic,
        mut ctx,
        mut cmd_rx,
        mut fired_rx,
        on_terminated,
    } = pending;

    debug!(id = %ctx.key, state = ?ctx.state(), "Transaction loop starting");

    let started = logic.on_start(&mut ctx).await;
    if let Err(e) = settle(&mut logic, &mut ctx, started).await {
        report_error(&ctx, &e);
    }

    while !ctx.state().is_terminated() {
        tokio::select! {
            command = cmd_rx.recv() => match command {
                Some(Command::Op { op, reply }) => {
                    let outcome = logic.handle_op(&mut ctx, op).await;
                    let verdict = settle(&mut logic, &mut ctx, outcome).await;
                    let _ = reply.send(verdict);
                }
                Some(Command::Terminate) => {
                    debug!(id = %ctx.key, "Received explicit termination command");
                    ctx.terminate_now();
                }
                None => {
                    debug!(id = %ctx.key, "All handles dropped, terminating");
                    ctx.terminate_now();
                }
            },
            Some((timer, generation)) = fired_rx.recv() => {
                if ctx.timers.claim(timer, generation) {
                    trace!(id = %ctx.key, timer = %timer.timer_type(), state = ?ctx.state(), "Timer fired");
                    ctx.emit(TransactionEvent::TimerTriggered {
                        transaction_id: ctx.key.clone(),
                        timer: timer.timer_type(),
                    });
                    let outcome = logic.handle_timer(&mut ctx, timer).await;
                    if let Err(e) = settle(&mut logic, &mut ctx, outcome).await {
                        report_error(&ctx, &e);
                    }
                } else {
                    trace!(id = %ctx.key, ?timer, generation, "Ignoring stale timer firing");
                }
            }
        }
    }

    ctx.timers.cancel_all();
    if let Some(hook) = on_terminated {
        hook(&ctx.key);
    }
    ctx.emit(TransactionEvent::Terminated {
        transaction_id: ctx.key.clone(),
    });
    debug!(id = %ctx.key, "Transaction loop ended");
}

/// Applies the outcome of a logic call: follows requested transitions, runs
/// `on_enter_state` for each, and turns transport failures into termination.
async fn settle<L: TransactionLogic>(
    logic: &mut L,
    ctx: &mut TransactionContext<L::Timer>,
    outcome: Result<Option<TransactionState>>,
) -> Result<()> {
    let mut next = match outcome {
        Ok(next) => next,
        Err(e) => return Err(fail(ctx, e)),
    };

    while let Some(target) = next.take() {
        let previous = ctx.state();
        if previous == target {
            trace!(id = %ctx.key, state = ?previous, "Already in requested state");
            break;
        }
        if let Err(e) = previous.validate_transition(ctx.kind, target) {
            error!(id = %ctx.key, error = %e, "Rejected state transition");
            return Err(e);
        }

        ctx.set_state(target);
        debug!(id = %ctx.key, "State transition: {:?} -> {:?}", previous, target);
        ctx.emit(TransactionEvent::StateChanged {
            transaction_id: ctx.key.clone(),
            previous_state: previous,
            new_state: target,
        });

        if target.is_terminated() {
            ctx.timers.cancel_all();
            break;
        }
        next = match logic.on_enter_state(ctx, target, previous).await {
            Ok(next) => next,
            Err(e) => return Err(fail(ctx, e)),
        };
    }
    Ok(())
}

fn fail<T: TimerKind>(ctx: &mut TransactionContext<T>, error: Error) -> Error {
    if let Error::TransportError(reason) = &error {
        warn!(id = %ctx.key, %reason, "Transport failure, terminating transaction");
        ctx.report_transport_failure();
        ctx.terminate_now();
    }
    error
}

fn report_error<T: TimerKind>(ctx: &TransactionContext<T>, error: &Error) {
    error!(id = %ctx.key, %error, state = ?ctx.state(), "Transaction error");
    ctx.emit(TransactionEvent::Error {
        transaction_id: Some(ctx.key.clone()),
        error: error.to_string(),
    });
}
