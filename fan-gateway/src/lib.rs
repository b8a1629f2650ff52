//! fan-gateway - HTTP surface for fanpost
//!
//! | Route | Caller | Purpose |
//! |---|---|---|
//! | `GET /dispatch` | cron secret | run one trigger tick |
//! | `POST /publish` | API token | publish a post now |
//! | `POST /schedule` | API token | put a post on the schedule |
//! | `GET /verify` | API token, or cron secret with `?userId=` | check platform connections |
//! | `GET /health` | anyone | liveness |

use axum::routing::{get, post};
use axum::{middleware, Router};
use secrecy::SecretString;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use libfanpost::{ConnectionVerifier, Publisher};

pub mod auth;
pub mod error;
pub mod routes;

/// Shared application state
pub struct AppState {
    pub publisher: Publisher,
    pub verifier: ConnectionVerifier,
    /// `None` disables service access (`/dispatch`, `/verify?userId=`)
    pub cron_secret: Option<SecretString>,
}

impl AppState {
    /// The verifier shares the publisher's adapters and call timeout
    pub fn new(publisher: Publisher, cron_secret: Option<SecretString>) -> Self {
        let dispatcher = publisher.dispatcher();
        let verifier =
            ConnectionVerifier::new(dispatcher.source().clone(), dispatcher.call_timeout());
        Self {
            publisher,
            verifier,
            cron_secret,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/dispatch", get(routes::dispatch))
        .route("/publish", post(routes::publish))
        .route("/schedule", post(routes::schedule))
        .route("/verify", get(routes::verify))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ));

    let public = Router::new().route("/health", get(routes::health));

    protected
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
