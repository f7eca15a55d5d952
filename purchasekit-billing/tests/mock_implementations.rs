#![allow(dead_code)]

use async_trait::async_trait;
use purchasekit_billing::{
    BillingClient, BillingClientFactory, BillingConfig, BillingFlowParams, BillingResponseCode,
    BillingResult, ClientError, ClientEvent, ClientEventSender, ConnectionManager,
    PurchaseHistoryRecord, PurchasesUpdatedListener, StateListener, StorePurchase,
};
use purchasekit_lib::{
    InMemoryPostedTokenStore, ProductType, PurchaseState, PurchasesError, StoreProduct,
    StoreTransaction,
};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Scriptable in-memory billing client.
///
/// Each `start_connection` pops the next scripted setup result (OK once the
/// script runs out) and reports it as a `SetupFinished` event, unless setup
/// is held, in which case the test reports it with `emit_setup`.
#[derive(Default)]
pub struct MockBillingClient {
    events: Mutex<Option<ClientEventSender>>,
    ready: AtomicBool,
    hold_setup: AtomicBool,
    call_latency: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    setup_results: Mutex<VecDeque<BillingResult>>,
    connect_error: Mutex<Option<String>>,
    connect_attempts: Mutex<Vec<Instant>>,
    end_calls: AtomicUsize,
    purchases: Mutex<HashMap<ProductType, Vec<StorePurchase>>>,
    history: Mutex<HashMap<ProductType, Vec<PurchaseHistoryRecord>>>,
    query_failures: Mutex<HashMap<ProductType, BillingResult>>,
    products: Mutex<Vec<StoreProduct>>,
    launch_result: Mutex<Option<BillingResult>>,
    launched: Mutex<Vec<BillingFlowParams>>,
    consumed: Mutex<Vec<String>>,
    acknowledged: Mutex<Vec<String>>,
    finish_result: Mutex<Option<BillingResult>>,
    product_queries: Mutex<Vec<Vec<String>>>,
}

impl MockBillingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_setup(&self, codes: &[BillingResponseCode]) {
        let mut results = self.setup_results.lock().unwrap();
        results.extend(codes.iter().map(|code| BillingResult::new(*code, "scripted")));
    }

    /// Leave `start_connection` unanswered.
    pub fn hold_setup(&self) {
        self.hold_setup.store(true, Ordering::SeqCst);
    }

    /// Report a setup result, as the service would after `start_connection`.
    pub fn emit_setup(&self, code: BillingResponseCode) {
        let result = BillingResult::new(code, "held setup");
        self.ready.store(result.is_ok(), Ordering::SeqCst);
        self.emit(ClientEvent::SetupFinished(result));
    }

    /// Make tracked store calls take `latency` to answer.
    pub fn set_call_latency(&self, latency: Duration) {
        *self.call_latency.lock().unwrap() = Some(latency);
    }

    /// Most store calls ever observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn fail_connect_with(&self, message: &str) {
        *self.connect_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_purchases(&self, product_type: ProductType, purchases: Vec<StorePurchase>) {
        self.purchases.lock().unwrap().insert(product_type, purchases);
    }

    pub fn set_history(&self, product_type: ProductType, records: Vec<PurchaseHistoryRecord>) {
        self.history.lock().unwrap().insert(product_type, records);
    }

    pub fn fail_queries(&self, product_type: ProductType, code: BillingResponseCode) {
        self.query_failures
            .lock()
            .unwrap()
            .insert(product_type, BillingResult::new(code, "scripted failure"));
    }

    pub fn set_products(&self, products: Vec<StoreProduct>) {
        *self.products.lock().unwrap() = products;
    }

    pub fn set_launch_result(&self, code: BillingResponseCode) {
        *self.launch_result.lock().unwrap() = Some(BillingResult::new(code, "scripted launch"));
    }

    pub fn set_finish_result(&self, code: BillingResponseCode) {
        *self.finish_result.lock().unwrap() = Some(BillingResult::new(code, "scripted finish"));
    }

    pub fn connect_attempts(&self) -> Vec<Instant> {
        self.connect_attempts.lock().unwrap().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connect_attempts.lock().unwrap().len()
    }

    pub fn end_count(&self) -> usize {
        self.end_calls.load(Ordering::SeqCst)
    }

    pub fn launched(&self) -> Vec<BillingFlowParams> {
        self.launched.lock().unwrap().clone()
    }

    pub fn consumed(&self) -> Vec<String> {
        self.consumed.lock().unwrap().clone()
    }

    pub fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().unwrap().clone()
    }

    pub fn product_queries(&self) -> Vec<Vec<String>> {
        self.product_queries.lock().unwrap().clone()
    }

    /// Simulate the service dropping the connection.
    pub fn disconnect(&self) {
        self.ready.store(false, Ordering::SeqCst);
        self.emit(ClientEvent::ServiceDisconnected);
    }

    /// Simulate a purchase update from the store.
    pub fn emit_purchases(&self, code: BillingResponseCode, purchases: Option<Vec<StorePurchase>>) {
        self.emit(ClientEvent::PurchasesUpdated {
            result: BillingResult::new(code, "scripted update"),
            purchases,
        });
    }

    fn emit(&self, event: ClientEvent) {
        if let Some(events) = self.events.lock().unwrap().as_ref() {
            let _ = events.send(event);
        }
    }

    async fn tracked<T>(&self, call: impl Future<Output = T>) -> T {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let latency = *self.call_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let output = call.await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        output
    }

    fn query_failure(&self, product_type: ProductType) -> Option<BillingResult> {
        self.query_failures.lock().unwrap().get(&product_type).cloned()
    }

    fn finish_result(&self) -> BillingResult {
        self.finish_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(BillingResult::ok)
    }
}

#[async_trait]
impl BillingClient for MockBillingClient {
    fn start_connection(&self) -> Result<(), ClientError> {
        self.connect_attempts.lock().unwrap().push(Instant::now());
        if let Some(message) = self.connect_error.lock().unwrap().clone() {
            return Err(ClientError::Connect(message));
        }
        let result = self
            .setup_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(BillingResult::ok);
        if self.hold_setup.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.ready.store(result.is_ok(), Ordering::SeqCst);
        self.emit(ClientEvent::SetupFinished(result));
        Ok(())
    }

    fn end_connection(&self) {
        self.end_calls.fetch_add(1, Ordering::SeqCst);
        self.ready.store(false, Ordering::SeqCst);
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn launch_billing_flow(&self, params: BillingFlowParams) -> BillingResult {
        self.tracked(async {
            self.launched.lock().unwrap().push(params);
            self.launch_result
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(BillingResult::ok)
        })
        .await
    }

    async fn query_purchases(
        &self,
        product_type: ProductType,
    ) -> Result<Vec<StorePurchase>, BillingResult> {
        if let Some(failure) = self.query_failure(product_type) {
            return Err(failure);
        }
        Ok(self
            .purchases
            .lock()
            .unwrap()
            .get(&product_type)
            .cloned()
            .unwrap_or_default())
    }

    async fn query_purchase_history(
        &self,
        product_type: ProductType,
    ) -> Result<Vec<PurchaseHistoryRecord>, BillingResult> {
        if let Some(failure) = self.query_failure(product_type) {
            return Err(failure);
        }
        Ok(self
            .history
            .lock()
            .unwrap()
            .get(&product_type)
            .cloned()
            .unwrap_or_default())
    }

    async fn query_product_details(
        &self,
        product_type: ProductType,
        product_ids: Vec<String>,
    ) -> Result<Vec<StoreProduct>, BillingResult> {
        self.product_queries.lock().unwrap().push(product_ids.clone());
        Ok(self
            .products
            .lock()
            .unwrap()
            .iter()
            .filter(|product| product.product_type == product_type)
            .filter(|product| product_ids.contains(&product.id))
            .cloned()
            .collect())
    }

    async fn consume(&self, purchase_token: &str) -> BillingResult {
        self.consumed.lock().unwrap().push(purchase_token.to_string());
        self.finish_result()
    }

    async fn acknowledge(&self, purchase_token: &str) -> BillingResult {
        self.acknowledged
            .lock()
            .unwrap()
            .push(purchase_token.to_string());
        self.finish_result()
    }

    async fn country_code(&self) -> Result<String, BillingResult> {
        self.tracked(async { Ok("US".to_string()) }).await
    }
}

/// Factory handing out scripted clients in order, repeating the last one.
pub struct MockFactory {
    clients: Vec<Arc<MockBillingClient>>,
    builds: AtomicUsize,
}

impl MockFactory {
    pub fn new(client: Arc<MockBillingClient>) -> Arc<Self> {
        Self::with_clients(vec![client])
    }

    pub fn with_clients(clients: Vec<Arc<MockBillingClient>>) -> Arc<Self> {
        assert!(!clients.is_empty());
        Arc::new(Self {
            clients,
            builds: AtomicUsize::new(0),
        })
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl BillingClientFactory for MockFactory {
    fn build_client(&self, events: ClientEventSender) -> Arc<dyn BillingClient> {
        let build = self.builds.fetch_add(1, Ordering::SeqCst);
        let client = &self.clients[build.min(self.clients.len() - 1)];
        *client.events.lock().unwrap() = Some(events);
        client.clone()
    }
}

#[derive(Debug)]
pub enum ListenerEvent {
    Updated(Vec<StoreTransaction>),
    Failed(PurchasesError),
}

/// Purchases listener forwarding every callback to a channel.
pub struct MockListener {
    sender: mpsc::UnboundedSender<ListenerEvent>,
}

impl MockListener {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ListenerEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender }), receiver)
    }
}

impl PurchasesUpdatedListener for MockListener {
    fn on_purchases_updated(&self, purchases: Vec<StoreTransaction>) {
        let _ = self.sender.send(ListenerEvent::Updated(purchases));
    }

    fn on_purchases_failed_to_update(&self, error: PurchasesError) {
        let _ = self.sender.send(ListenerEvent::Failed(error));
    }
}

/// State listener counting successful connections.
#[derive(Default)]
pub struct MockStateListener {
    connected: AtomicUsize,
}

impl MockStateListener {
    pub fn connected(&self) -> usize {
        self.connected.load(Ordering::SeqCst)
    }
}

impl StateListener for MockStateListener {
    fn on_connected(&self) {
        self.connected.fetch_add(1, Ordering::SeqCst);
    }
}

/// Engine wired to mocks.
pub struct Harness {
    pub manager: ConnectionManager,
    pub client: Arc<MockBillingClient>,
    pub factory: Arc<MockFactory>,
    pub token_store: Arc<InMemoryPostedTokenStore>,
    pub state: Arc<MockStateListener>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_client(MockBillingClient::new())
    }

    pub fn with_client(client: Arc<MockBillingClient>) -> Self {
        Self::with_factory(client.clone(), MockFactory::new(client))
    }

    /// Engine whose factory hands out `clients` in order; `client` is the first.
    pub fn with_clients(clients: Vec<Arc<MockBillingClient>>) -> Self {
        let client = clients[0].clone();
        Self::with_factory(client, MockFactory::with_clients(clients))
    }

    fn with_factory(client: Arc<MockBillingClient>, factory: Arc<MockFactory>) -> Self {
        let token_store = Arc::new(InMemoryPostedTokenStore::new());
        let manager =
            ConnectionManager::new(BillingConfig::default(), factory.clone(), token_store.clone())
                .unwrap();
        let state = Arc::new(MockStateListener::default());
        manager.set_state_listener(Some(state.clone()));
        Self {
            manager,
            client,
            factory,
            token_store,
            state,
        }
    }

    /// Attach a channel-backed purchases listener.
    pub fn attach(&self) -> mpsc::UnboundedReceiver<ListenerEvent> {
        let (listener, receiver) = MockListener::new();
        self.manager.set_purchases_updated_listener(Some(listener));
        receiver
    }
}

/// Wait until `condition` holds, failing the test after a generous timeout.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(600), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

/// Next listener callback, failing the test if none arrives.
pub async fn next_event(receiver: &mut mpsc::UnboundedReceiver<ListenerEvent>) -> ListenerEvent {
    tokio::time::timeout(Duration::from_secs(600), receiver.recv())
        .await
        .expect("listener event not delivered")
        .expect("listener channel closed")
}

pub fn store_purchase(product_id: &str, token: &str) -> StorePurchase {
    StorePurchase {
        order_id: Some(format!("GPA.{token}")),
        product_ids: vec![product_id.to_string()],
        purchase_time_millis: 1_700_000_000_000,
        purchase_token: token.to_string(),
        purchase_state: PurchaseState::Purchased,
        is_auto_renewing: true,
        is_acknowledged: false,
        signature: "signature".to_string(),
        original_json: format!(r#"{{"productId":"{product_id}","purchaseToken":"{token}"}}"#),
    }
}

pub fn history_record(product_id: &str, token: &str) -> PurchaseHistoryRecord {
    PurchaseHistoryRecord {
        product_ids: vec![product_id.to_string()],
        purchase_time_millis: 1_600_000_000_000,
        purchase_token: token.to_string(),
        signature: "signature".to_string(),
        original_json: "{}".to_string(),
    }
}
