//! Name-keyed dispatch
//!
//! Three bus kinds share one registration model: subscribers are kept per
//! name, in registration order, and a raise runs the whole chain.
//!
//! - **NotificationBus**: fire-and-forget notifications (`raise`, `raise_async`)
//! - **RequestBus**: subscribers return a value, reduced and handed to a result handler
//! - **AsyncRequestBus**: subscribers return deferred values, resolved on a worker
//!
//! ## Usage
//!
//! ```rust,ignore
//! let ctx = DispatchContext::new();
//!
//! // Listen for products arriving
//! let on_products = Listener::new(|products: &ProductsData| shelf.fill(products));
//! ctx.notifications::<ProductsData>().register("OnProductsReceived", on_products.clone());
//!
//! // Somewhere else
//! ctx.notifications::<ProductsData>().raise("OnProductsReceived", products);
//!
//! // Ask for a value
//! ctx.requests::<f32, bool>().raise("ValidatePrice", 12.5, |ok| println!("valid: {}", ok));
//!
//! // Stop listening
//! ctx.notifications::<ProductsData>().unregister("OnProductsReceived", &on_products);
//! ```

pub mod async_request;
pub mod context;
pub mod notification;
pub mod reduce;
pub(crate) mod registry;
pub mod request;
pub mod subscribers;
pub mod workers;

// Re-export commonly used types
pub use async_request::AsyncRequestBus;
pub use context::DispatchContext;
pub use notification::{NotificationBus, Signal};
pub use reduce::{Collect, Last, Reduce};
pub use request::RequestBus;
pub use subscribers::{AsyncResponder, Listener, Responder};
pub use workers::Workers;
