use axum::{
    body::Bytes,
    http::{header::CONTENT_TYPE, HeaderMap, Method},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use metrics::counter;
use serde_json::{json, Map, Value};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub const WEBHOOK_PATH: &str = "/twenty-webhook";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "crm-migrate-webhook",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Parse a webhook body: form pairs when the content type says so, otherwise
/// JSON, otherwise the raw text under `raw_body`.
pub fn parse_body(content_type: Option<&str>, body: &[u8]) -> Value {
    if content_type.is_some_and(|ct| ct.contains(FORM_CONTENT_TYPE)) {
        let form: Map<String, Value> = url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();
        return Value::Object(form);
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(value) => value,
        Err(_) => json!({ "raw_body": String::from_utf8_lossy(body) }),
    }
}

/// Build the response document echoed back to the caller.
pub fn webhook_response(body: Value) -> Value {
    let field = |key: &str| body.get(key).cloned().unwrap_or(Value::Null);
    let received = json!({
        "id": field("id"),
        "opportunity_name": field("opportunity_name"),
        "new_stage_value": field("new_stage_value"),
    });

    json!({
        "status": "ok",
        "received": received,
        "raw": body,
    })
}

/// Accepts any body and always answers 200.
async fn receive_webhook(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let parsed = parse_body(content_type, &body);

    counter!("crm_webhook_requests_total").increment(1);
    info!(body = %parsed, "Received webhook from Twenty");

    Json(webhook_response(parsed))
}

/// Create the HTTP router
pub fn create_server() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route(WEBHOOK_PATH, post(receive_webhook))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the given address
pub async fn start_server(host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_server();
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Webhook receiver listening on http://{addr}{WEBHOOK_PATH}");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
