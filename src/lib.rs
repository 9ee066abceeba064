//! M-Pesa STK push payment service
//!
//! A standalone HTTP service wrapping the Daraja push-payment flow:
//! initiation, status query, and the asynchronous callback receiver, with an
//! in-process correlation store and a reconciliation sweep for payments
//! whose callback never arrives.

use axum::{
    routing::{get, post},
    Router,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod state;

pub use config::MpesaConfig;
pub use error::MpesaError;
pub use state::AppState;

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/api/mpesa/stk-push", post(handlers::stk_push))
        .route("/api/mpesa/query", post(handlers::query_status))
        .route("/api/mpesa/callback", post(handlers::callback))
        .route("/api/mpesa/validate", get(handlers::validate_setup))
        .route(
            "/api/mpesa/status/{checkout_request_id}",
            get(handlers::payment_status),
        )
        .route("/api/mpesa/test", post(handlers::test_payment))
        .with_state(app_state)
}
