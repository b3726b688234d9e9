//! HTTP boundary: `POST /api/send-email`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use teamflow_smtp::Connector;
use tower_http::trace::TraceLayer;

use crate::config::ConfigSource;
use crate::gateway::{EmailGateway, SendEmailRequest, SendEmailResponse};

/// Route accepting send requests.
pub const SEND_EMAIL_PATH: &str = "/api/send-email";

/// Builds the router around a shared gateway.
pub fn router<C, S>(gateway: Arc<EmailGateway<C, S>>) -> Router
where
    C: Connector + 'static,
    S: ConfigSource + 'static,
{
    Router::new()
        .route(SEND_EMAIL_PATH, post(send_email::<C, S>))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

/// POST /api/send-email - 200 when the relay accepted the message, 500
/// otherwise.
async fn send_email<C, S>(
    State(gateway): State<Arc<EmailGateway<C, S>>>,
    Json(request): Json<SendEmailRequest>,
) -> (StatusCode, Json<SendEmailResponse>)
where
    C: Connector,
    S: ConfigSource,
{
    let response = gateway.handle(&request).await;
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response))
}
