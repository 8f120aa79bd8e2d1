//! Catalog managers used by the demo host
//!
//! Product data arrives through an async request (standing in for the HTTP
//! call), is marshaled onto the main thread and announced with
//! `OnProductsReceived`. The catalog then edits a price through a
//! synchronous validation request and the edit manager reports the outcome.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use catalog_dispatch::{
    AsyncResponder, DispatchContext, ExecutorHandle, Listener, Manager, Responder,
};

const LOG_TARGET: &str = "catalog_demo::catalog";

const SAMPLE_PRODUCTS: &str = r#"{
    "products": [
        { "name": "Espresso Cup", "description": "Porcelain, 90 ml", "price": 7.5 },
        { "name": "Tea Kettle", "description": "Stainless steel, 1.2 l", "price": 34.0 },
        { "name": "Linen Napkin", "description": "Set of four", "price": 18.25 }
    ]
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEvent {
    FetchProducts,
    FetchFailed,
    OnProductsReceived,
    ValidatePrice,
    EditGotResponse,
    EditFail,
}

impl CatalogEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            CatalogEvent::FetchProducts => "FetchProducts",
            CatalogEvent::FetchFailed => "FetchFailed",
            CatalogEvent::OnProductsReceived => "OnProductsReceived",
            CatalogEvent::ValidatePrice => "ValidatePrice",
            CatalogEvent::EditGotResponse => "EditGotResponse",
            CatalogEvent::EditFail => "EditFail",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductData {
    pub name: String,
    pub description: String,
    pub price: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductsData {
    pub products: Vec<ProductData>,
}

/// Requested price change
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdate {
    pub name: String,
    pub price: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductUpdateResponse {
    pub success: bool,
}

/// Where the demo flow ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Pending,
    Edited { name: String, price: f32 },
    EditFailed,
    FetchFailed,
}

/// Parsed product list, or why it could not be produced
pub type FetchResult = Result<ProductsData, String>;

/// Answers `FetchProducts` off the main thread
pub struct ProductSource {
    payload: Arc<str>,
    responder: Option<AsyncResponder<(), FetchResult>>,
}

impl ProductSource {
    pub fn new() -> Self {
        Self::with_payload(SAMPLE_PRODUCTS)
    }

    /// Serve `payload` as the server's JSON response body
    pub fn with_payload(payload: &str) -> Self {
        Self {
            payload: Arc::from(payload),
            responder: None,
        }
    }
}

impl Manager for ProductSource {
    fn name(&self) -> &str {
        "ProductSource"
    }

    fn attach(&mut self, ctx: &DispatchContext) {
        let payload = Arc::clone(&self.payload);
        let responder = AsyncResponder::producer(move || {
            let payload = Arc::clone(&payload);
            async move {
                serde_json::from_str::<ProductsData>(&payload)
                    .map_err(|e| format!("malformed product data: {}", e))
            }
        });

        ctx.async_requests::<(), FetchResult>()
            .register(CatalogEvent::FetchProducts.as_str(), responder.clone());
        self.responder = Some(responder);
    }

    fn detach(&mut self, ctx: &DispatchContext) {
        if let Some(responder) = self.responder.take() {
            ctx.async_requests::<(), FetchResult>()
                .unregister(CatalogEvent::FetchProducts.as_str(), &responder);
        }
    }
}

/// Keeps the product list and starts the edit once products arrive
pub struct CatalogManager {
    on_products: Option<Listener<ProductsData>>,
    products: Arc<Mutex<Vec<ProductData>>>,
    markup: f32,
}

impl CatalogManager {
    pub fn new(markup: f32) -> Self {
        Self {
            on_products: None,
            products: Arc::new(Mutex::new(Vec::new())),
            markup,
        }
    }

    pub fn products(&self) -> Arc<Mutex<Vec<ProductData>>> {
        Arc::clone(&self.products)
    }
}

impl Manager for CatalogManager {
    fn name(&self) -> &str {
        "CatalogManager"
    }

    fn attach(&mut self, ctx: &DispatchContext) {
        let products = Arc::clone(&self.products);
        let markup = self.markup;
        let bus_ctx = ctx.clone();

        let listener = Listener::new(move |data: &ProductsData| {
            for (index, product) in data.products.iter().enumerate() {
                tracing::info!(
                    target: LOG_TARGET,
                    "Product {}: {} ({}) at {:.2}",
                    index,
                    product.name,
                    product.description,
                    product.price
                );
            }
            *products.lock() = data.products.clone();

            let Some(first) = data.products.first() else {
                bus_ctx.signals().emit(CatalogEvent::EditFail.as_str());
                return;
            };
            let update = PriceUpdate {
                name: first.name.clone(),
                price: first.price * markup,
            };
            request_price_update(&bus_ctx, update);
        });

        ctx.notifications::<ProductsData>()
            .register(CatalogEvent::OnProductsReceived.as_str(), listener.clone());
        self.on_products = Some(listener);
    }

    fn detach(&mut self, ctx: &DispatchContext) {
        if let Some(listener) = self.on_products.take() {
            ctx.notifications::<ProductsData>()
                .unregister(CatalogEvent::OnProductsReceived.as_str(), &listener);
        }
    }
}

/// Validate `update` and announce the result the way the product service would
fn request_price_update(ctx: &DispatchContext, update: PriceUpdate) {
    let mut accepted = false;
    ctx.requests::<PriceUpdate, bool>()
        .raise(CatalogEvent::ValidatePrice.as_str(), update.clone(), |valid| accepted = valid);

    if accepted {
        tracing::info!(target: LOG_TARGET, "Price of {} set to {:.2}", update.name, update.price);
        ctx.notifications::<ProductUpdateResponse>().raise(
            CatalogEvent::EditGotResponse.as_str(),
            ProductUpdateResponse { success: true },
        );
    } else {
        tracing::warn!(target: LOG_TARGET, "Price update for {} rejected", update.name);
        ctx.signals().emit(CatalogEvent::EditFail.as_str());
    }
}

/// Validates prices and records how the edit ended
pub struct EditManager {
    max_price: f32,
    outcome: Arc<Mutex<Outcome>>,
    last_update: Arc<Mutex<Option<PriceUpdate>>>,
    validator: Option<Responder<PriceUpdate, bool>>,
    on_response: Option<Listener<ProductUpdateResponse>>,
    on_fail: Option<Listener<()>>,
    on_fetch_fail: Option<Listener<()>>,
}

impl EditManager {
    pub fn new(max_price: f32) -> Self {
        Self {
            max_price,
            outcome: Arc::new(Mutex::new(Outcome::Pending)),
            last_update: Arc::new(Mutex::new(None)),
            validator: None,
            on_response: None,
            on_fail: None,
            on_fetch_fail: None,
        }
    }

    pub fn outcome(&self) -> Arc<Mutex<Outcome>> {
        Arc::clone(&self.outcome)
    }
}

impl Manager for EditManager {
    fn name(&self) -> &str {
        "EditManager"
    }

    fn attach(&mut self, ctx: &DispatchContext) {
        let max_price = self.max_price;
        let last_update = Arc::clone(&self.last_update);
        let validator = Responder::new(move |update: &PriceUpdate| {
            *last_update.lock() = Some(update.clone());
            update.price.is_finite() && update.price > 0.0 && update.price <= max_price
        });

        let outcome = Arc::clone(&self.outcome);
        let last_update = Arc::clone(&self.last_update);
        let on_response = Listener::new(move |response: &ProductUpdateResponse| {
            let edited = last_update.lock().clone();
            *outcome.lock() = match (response.success, edited) {
                (true, Some(update)) => Outcome::Edited {
                    name: update.name,
                    price: update.price,
                },
                _ => Outcome::EditFailed,
            };
        });

        let outcome = Arc::clone(&self.outcome);
        let on_fail = Listener::signal(move || *outcome.lock() = Outcome::EditFailed);

        let outcome = Arc::clone(&self.outcome);
        let on_fetch_fail = Listener::signal(move || *outcome.lock() = Outcome::FetchFailed);

        ctx.requests::<PriceUpdate, bool>()
            .register(CatalogEvent::ValidatePrice.as_str(), validator.clone());
        ctx.notifications::<ProductUpdateResponse>()
            .register(CatalogEvent::EditGotResponse.as_str(), on_response.clone());
        ctx.signals()
            .register(CatalogEvent::EditFail.as_str(), on_fail.clone());
        ctx.signals()
            .register(CatalogEvent::FetchFailed.as_str(), on_fetch_fail.clone());

        self.validator = Some(validator);
        self.on_response = Some(on_response);
        self.on_fail = Some(on_fail);
        self.on_fetch_fail = Some(on_fetch_fail);
    }

    fn detach(&mut self, ctx: &DispatchContext) {
        if let Some(validator) = self.validator.take() {
            ctx.requests::<PriceUpdate, bool>()
                .unregister(CatalogEvent::ValidatePrice.as_str(), &validator);
        }
        if let Some(listener) = self.on_response.take() {
            ctx.notifications::<ProductUpdateResponse>()
                .unregister(CatalogEvent::EditGotResponse.as_str(), &listener);
        }
        if let Some(listener) = self.on_fail.take() {
            ctx.signals()
                .unregister(CatalogEvent::EditFail.as_str(), &listener);
        }
        if let Some(listener) = self.on_fetch_fail.take() {
            ctx.signals()
                .unregister(CatalogEvent::FetchFailed.as_str(), &listener);
        }
    }
}

/// Ask for products; the answer is raised on the executor's owner thread
pub fn fetch_products(ctx: &DispatchContext, executor: ExecutorHandle) {
    let bus_ctx = ctx.clone();
    ctx.async_requests::<(), FetchResult>()
        .fetch(CatalogEvent::FetchProducts.as_str(), move |result| {
            match result.map_err(|e| e.to_string()).and_then(|fetched| fetched) {
                Ok(products) => executor.enqueue(move || {
                    bus_ctx
                        .notifications::<ProductsData>()
                        .raise(CatalogEvent::OnProductsReceived.as_str(), products);
                }),
                Err(reason) => {
                    tracing::error!(target: LOG_TARGET, "Product fetch failed: {}", reason);
                    executor.enqueue(move || {
                        bus_ctx.signals().emit(CatalogEvent::FetchFailed.as_str());
                    });
                }
            }
        });
}
