//! Billing connection lifecycle.
//!
//! [`ConnectionManager`] owns the one billing client, drives its state
//! machine on the [`MainThread`] and queues every store operation until the
//! client can serve it:
//!
//! ```text
//! Disconnected --start--> Connecting --setup OK--> Ready
//!      ^                      |                      |
//!      |<-- retryable: backoff reconnect ------------|
//!      |<-- terminal: fail queued requests ----------|
//! ```
//!
//! All client state lives behind one lock. Check-then-mutate sequences
//! ("not ready, so start connecting", "ready, so drain") run inside a single
//! lock scope, and the lock is never held across an `.await`.

mod state;

pub use state::ConnectionState;
pub(crate) use state::ConnectionInner;

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use purchasekit_lib::{PostedTokenStore, PurchasesError, PurchasesErrorCode, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::client::{
    BillingClient, BillingClientFactory, ClientEvent, ClientEventSender, StorePurchase,
};
use crate::config::BillingConfig;
use crate::context::PurchaseContextRegistry;
use crate::executor::MainThread;
use crate::listener::{PurchasesUpdatedListener, StateListener};
use crate::queue::{RequestQueue, ServiceRequest};
use crate::reconciler::ConsumptionReconciler;
use crate::response::{BillingResult, SetupOutcome};

type PurchaseUpdate = (BillingResult, Option<Vec<StorePurchase>>);

/// A client event tagged with the generation of the client that sent it.
type TaggedEvent = (u64, ClientEvent);

/// State shared by every handle to the engine.
pub(crate) struct Shared {
    pub(crate) config: BillingConfig,
    factory: Arc<dyn BillingClientFactory>,
    events: mpsc::UnboundedSender<TaggedEvent>,
    pub(crate) main: MainThread,
    inner: Mutex<ConnectionInner>,
    pub(crate) contexts: PurchaseContextRegistry,
    pub(crate) reconciler: ConsumptionReconciler,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, ConnectionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The client, if the connection can serve a request right now.
    pub(crate) fn ready_client(&self) -> Option<Arc<dyn BillingClient>> {
        let inner = self.lock();
        if !inner.is_ready() {
            return None;
        }
        inner.client.clone().filter(|client| client.is_ready())
    }

    pub(crate) fn purchases_listener(&self) -> Option<Arc<dyn PurchasesUpdatedListener>> {
        self.lock().purchases_listener.clone()
    }
}

/// Root of the billing engine.
///
/// Cheap to clone; all clones drive the same connection. Must be created
/// inside a Tokio runtime.
#[derive(Clone)]
pub struct ConnectionManager {
    pub(crate) shared: Arc<Shared>,
}

impl ConnectionManager {
    /// Create an engine. No connection is made until a purchases listener is
    /// attached or a request is submitted.
    pub fn new(
        config: BillingConfig,
        factory: Arc<dyn BillingClientFactory>,
        token_store: Arc<dyn PostedTokenStore>,
    ) -> Result<Self> {
        config.validate()?;

        let main = MainThread::spawn();
        let queue = RequestQueue::new(main.clone());
        let (events, event_receiver) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            inner: Mutex::new(ConnectionInner::new(queue, config.backoff())),
            config,
            factory,
            events,
            main,
            contexts: PurchaseContextRegistry::new(),
            reconciler: ConsumptionReconciler::new(token_store),
        });
        spawn_event_pump(Arc::downgrade(&shared), event_receiver);

        Ok(Self { shared })
    }

    pub(crate) fn upgrade(shared: &Weak<Shared>) -> Option<Self> {
        shared.upgrade().map(|shared| Self { shared })
    }

    pub(crate) fn downgrade(&self) -> Weak<Shared> {
        Arc::downgrade(&self.shared)
    }

    /// Attach or detach the purchase result sink.
    ///
    /// Attaching starts the connection, detaching ends it. Requests submitted
    /// while no listener is attached are rejected.
    pub fn set_purchases_updated_listener(
        &self,
        listener: Option<Arc<dyn PurchasesUpdatedListener>>,
    ) {
        let attached = listener.is_some();
        self.shared.lock().purchases_listener = listener;
        if attached {
            self.start_connection();
        } else {
            self.end_connection();
        }
    }

    pub fn set_state_listener(&self, listener: Option<Arc<dyn StateListener>>) {
        self.shared.lock().state_listener = listener;
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.shared.ready_client().is_some()
    }

    /// Requests waiting for a ready connection.
    pub fn pending_requests(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Connect if not connected. Safe to call any number of times.
    pub fn start_connection(&self) {
        let manager = self.clone();
        self.shared
            .main
            .post(move || manager.start_connection_on_main());
    }

    /// Tear down and discard the client. Queued requests stay queued.
    pub fn end_connection(&self) {
        let manager = self.clone();
        self.shared.main.post(move || manager.end_connection_on_main());
    }

    /// Submit a unit of store work.
    ///
    /// The request runs on the [`MainThread`] once the connection is ready,
    /// after `delay` if one is given, and never before a request submitted
    /// earlier. It is resolved with an error instead when no purchases
    /// listener is attached or the store reports billing as unavailable.
    pub fn execute_request(&self, delay: Option<Duration>, request: ServiceRequest) {
        let mut inner = self.shared.lock();
        if inner.purchases_listener.is_none() {
            drop(inner);
            warn!("Rejecting store request: no purchases listener attached");
            self.shared
                .main
                .post(move || request(Some(PurchasesError::listener_not_attached())));
            return;
        }

        let was_idle = inner.queue.is_empty();
        inner.queue.push(request, delay);
        if inner.is_ready() {
            self.drain(&mut inner);
            return;
        }

        let should_connect = was_idle
            || (inner.state == ConnectionState::Disconnected && !inner.reconnect_scheduled);
        debug!(
            pending = inner.queue.len(),
            state = %inner.state,
            should_connect,
            "Queued store request"
        );
        drop(inner);

        if should_connect {
            self.start_connection();
        }
    }

    /// Run `call` against the ready client and wait for its result.
    ///
    /// The call runs on the [`MainThread`], so no two client calls are ever
    /// in flight at once.
    pub(crate) async fn call_client<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn BillingClient>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let shared = self.downgrade();
        let main = self.shared.main.clone();

        self.execute_request(
            None,
            Box::new(move |error: Option<PurchasesError>| {
                if let Some(error) = error {
                    let _ = sender.send(Err(error));
                    return;
                }
                let Some(client) = shared.upgrade().and_then(|shared| shared.ready_client())
                else {
                    let _ = sender.send(Err(PurchasesError::store_problem(format!(
                        "{operation}: billing client is not connected"
                    ))));
                    return;
                };
                main.post_async(async move {
                    let _ = sender.send(call(client).await);
                });
            }),
        );

        receiver.await.unwrap_or_else(|_| {
            Err(PurchasesError::new(
                PurchasesErrorCode::UnknownError,
                format!("{operation}: request dropped before completing"),
            ))
        })
    }

    fn start_connection_on_main(&self) {
        let mut inner = self.shared.lock();
        inner.reconnect_scheduled = false;

        let client = match inner.client.clone() {
            Some(client) => client,
            None => {
                inner.generation = inner.generation.wrapping_add(1);
                let generation = inner.generation;
                debug!(generation, "Creating billing client");
                let events = spawn_event_tagger(generation, self.shared.events.clone());
                let client = self.shared.factory.build_client(events);
                inner.client = Some(client.clone());
                client
            }
        };

        if client.is_ready() {
            self.drain(&mut inner);
            return;
        }
        if inner.state == ConnectionState::Connecting {
            debug!("Connection attempt already in progress");
            return;
        }

        inner.transition(ConnectionState::Connecting);
        info!("Starting billing client connection");
        if let Err(err) = client.start_connection() {
            inner.transition(ConnectionState::Disconnected);
            let failed = inner
                .queue
                .fail_all(&PurchasesError::store_problem(err.to_string()));
            error!(%err, failed, "Billing client failed to start connecting");
        }
    }

    fn end_connection_on_main(&self) {
        let mut inner = self.shared.lock();
        if let Some(client) = inner.client.take() {
            info!("Ending billing client connection");
            client.end_connection();
        }
        inner.transition(ConnectionState::Disconnected);
    }

    /// Arm the head of the queue if the connection can serve it.
    fn drain(&self, inner: &mut ConnectionInner) -> bool {
        if !inner.is_ready() {
            return false;
        }
        let shared = self.downgrade();
        inner.queue.dispatch_next(move |ticket| {
            if let Some(manager) = Self::upgrade(&shared) {
                manager.run_due_request(ticket);
            }
        })
    }

    /// Run the armed head once its delay is over, unless the connection went
    /// away in the meantime. Then arm the next one.
    fn run_due_request(&self, ticket: u64) {
        let request = {
            let mut inner = self.shared.lock();
            let ready = inner.is_ready();
            inner.queue.take_due(ticket, ready)
        };
        if let Some(request) = request {
            request(None);
        }
        let mut inner = self.shared.lock();
        self.drain(&mut inner);
    }

    fn on_setup_finished(&self, generation: u64, result: BillingResult) {
        let mut inner = self.shared.lock();
        if !inner.is_current(generation) {
            debug!(generation, %result, "Ignoring setup result from a discarded client");
            return;
        }

        match result.setup_outcome() {
            SetupOutcome::Connected => {
                inner.transition(ConnectionState::Ready);
                inner.backoff.reset();
                self.drain(&mut inner);
                let pending = inner.queue.len();
                let listener = inner.state_listener.clone();
                drop(inner);

                info!(pending, "Billing client connected");
                if let Some(listener) = listener {
                    listener.on_connected();
                }
            }
            SetupOutcome::Terminal => {
                inner.transition(ConnectionState::Disconnected);
                let failed = inner.queue.fail_all(&result.to_purchases_error());
                warn!(%result, failed, "Billing is unavailable, failing pending requests");
            }
            SetupOutcome::Retry => {
                inner.transition(ConnectionState::Disconnected);
                warn!(%result, "Billing client setup failed");
                self.schedule_reconnect(&mut inner);
            }
            SetupOutcome::Ignore => {
                // Leaves the connection retryable by the next request.
                inner.transition(ConnectionState::Disconnected);
                warn!(%result, "Unexpected billing setup response");
            }
        }
    }

    fn on_service_disconnected(&self, generation: u64) {
        let mut inner = self.shared.lock();
        if !inner.is_current(generation) {
            debug!(generation, "Ignoring disconnect from a discarded client");
            return;
        }
        let previous = inner.transition(ConnectionState::Disconnected);
        warn!(%previous, "Billing service disconnected");
        self.schedule_reconnect(&mut inner);
    }

    fn schedule_reconnect(&self, inner: &mut ConnectionInner) {
        if inner.reconnect_scheduled {
            debug!("Reconnection already scheduled");
            return;
        }
        inner.reconnect_scheduled = true;
        let delay = inner.backoff.next_delay();
        info!(
            delay_ms = delay.as_millis() as u64,
            "Scheduling billing reconnection"
        );

        let shared = self.downgrade();
        self.shared.main.post_delayed(delay, move || {
            if let Some(manager) = Self::upgrade(&shared) {
                manager.reconnect_on_main();
            }
        });
    }

    fn reconnect_on_main(&self) {
        {
            let mut inner = self.shared.lock();
            if inner.purchases_listener.is_none() {
                inner.reconnect_scheduled = false;
                debug!("No purchases listener attached, skipping reconnection");
                return;
            }
        }
        self.start_connection_on_main();
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.shared.config)
            .field("inner", &*self.shared.lock())
            .finish()
    }
}

/// Give a new client its own event channel, tagging what it sends with
/// `generation` before it reaches the pump.
fn spawn_event_tagger(
    generation: u64,
    pump: mpsc::UnboundedSender<TaggedEvent>,
) -> ClientEventSender {
    let (sender, mut receiver) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            if pump.send((generation, event)).is_err() {
                break;
            }
        }
    });
    sender
}

/// Forward client events to the engine without keeping it alive.
///
/// Purchase updates are delivered whichever client reported them; connection
/// events only count for the live client.
fn spawn_event_pump(shared: Weak<Shared>, mut events: mpsc::UnboundedReceiver<TaggedEvent>) {
    let (updates, update_receiver) = mpsc::unbounded_channel();
    spawn_update_lane(shared.clone(), update_receiver);

    tokio::spawn(async move {
        while let Some((generation, event)) = events.recv().await {
            let Some(manager) = ConnectionManager::upgrade(&shared) else {
                break;
            };
            match event {
                ClientEvent::SetupFinished(result) => {
                    let target = manager.clone();
                    manager
                        .shared
                        .main
                        .post(move || target.on_setup_finished(generation, result));
                }
                ClientEvent::ServiceDisconnected => {
                    let target = manager.clone();
                    manager
                        .shared
                        .main
                        .post(move || target.on_service_disconnected(generation));
                }
                ClientEvent::PurchasesUpdated { result, purchases } => {
                    if updates.send((result, purchases)).is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Billing event pump stopped");
    });
}

/// Purchase updates are resolved one event at a time, in arrival order.
fn spawn_update_lane(shared: Weak<Shared>, mut updates: mpsc::UnboundedReceiver<PurchaseUpdate>) {
    tokio::spawn(async move {
        while let Some((result, purchases)) = updates.recv().await {
            let Some(manager) = ConnectionManager::upgrade(&shared) else {
                break;
            };
            manager.handle_purchases_updated(result, purchases).await;
        }
    });
}
