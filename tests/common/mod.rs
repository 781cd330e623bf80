use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    Router,
};
use equipment_inspection::{
    app_router,
    config::AppConfig,
    events,
    integrations::{
        AdditionalCharge, InMemoryPriceCatalog, InMemoryReturnSource, RecordingChargeSink,
        ReturnedItem,
    },
    AppState,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

/// Return request seeded by [`TestApp::seed_return`].
pub const RETURN_REQUEST: &str = "RR-2024-0042";

/// Helper harness for an application wired to in-memory collaborators.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub return_source: Arc<InMemoryReturnSource>,
    pub price_catalog: Arc<InMemoryPriceCatalog>,
    pub charge_sink: RecordingChargeSink,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::default()).await
    }

    /// Each app gets its own in-memory database.
    pub async fn with_config(cfg: AppConfig) -> Self {
        let return_source = Arc::new(InMemoryReturnSource::new());
        let price_catalog = Arc::new(InMemoryPriceCatalog::new());
        let charge_sink = RecordingChargeSink::new();

        let (state, event_rx) = AppState::new(cfg, return_source.clone(), price_catalog.clone())
            .await
            .expect("failed to build application state");
        let event_task = tokio::spawn(events::process_events(
            event_rx,
            Arc::new(charge_sink.clone()),
        ));

        Self {
            router: app_router(state.clone()),
            state,
            return_source,
            price_catalog,
            charge_sink,
            _event_task: event_task,
        }
    }

    /// Registers a return of 10 marquees at 50.00 and 4 chairs at 10.00.
    pub fn seed_return(&self) {
        self.price_catalog.set_price("TENT-6X6", Decimal::from(50));
        self.price_catalog.set_price("CHAIR-FOLD", Decimal::from(10));
        self.return_source.register(
            RETURN_REQUEST,
            vec![
                ReturnedItem {
                    item_ref: "TENT-6X6".into(),
                    name: "Marquee 6x6".into(),
                    quantity_returned: 10,
                },
                ReturnedItem {
                    item_ref: "CHAIR-FOLD".into(),
                    name: "Folding chair".into(),
                    quantity_returned: 4,
                },
            ],
        );
    }

    /// Send a request against the router.
    #[allow(dead_code)]
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Waits for the event loop to hand `expected` charges to the billing sink.
    #[allow(dead_code)]
    pub async fn wait_for_charges(&self, expected: usize) -> Vec<AdditionalCharge> {
        for _ in 0..50 {
            let charges = self.charge_sink.charges().await;
            if charges.len() >= expected {
                return charges;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.charge_sink.charges().await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

#[allow(dead_code)]
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body is not valid json")
}
