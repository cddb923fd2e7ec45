pub mod handler;
pub mod models;
pub mod service;
pub mod validator;

use axum::{Router, routing::post};

use crate::state::AppState;

pub use models::{Event, IngestOutcome, RejectReason, StatsRequest, ValidationOutcome};
pub use service::{AcceptedEventHook, IngestionService, NoopHook};

pub fn create_ingest_router() -> Router<AppState> {
    Router::new().route("/customer/stats", post(handler::post_customer_stats))
}
