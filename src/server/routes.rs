use std::sync::Arc;

use axum::{
    http::Method,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::model::AssertionClassifier;
use crate::server::{handlers, middleware as mw, types::AppState};

pub fn create_router(classifier: Arc<dyn AssertionClassifier>) -> Router {
    let state = Arc::new(AppState { classifier });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/predict", post(handlers::predict))
        .route("/predict/batch", post(handlers::predict_batch))
        .layer(middleware::from_fn(mw::process_time))
        .layer(middleware::from_fn(mw::log_errors))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
