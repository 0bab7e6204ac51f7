//! JSON-RPC 2.0 surface plus a liveness probe, served over HTTP via `axum`.
//!
//! Three methods are exposed at `/api/v1/query`, `/api/v1/get_doc`, and
//! `/api/v1/find_concept`, each accepting a JSON-RPC 2.0 envelope and
//! forwarding to the matching `kiln-store::Repository` operation. `/health`
//! is a plain GET with no envelope.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use kiln_config::Config;
use kiln_store::Repository;

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const DOCUMENT_NOT_FOUND: i64 = -32004;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    fn err(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError { code, message: message.into() }),
        }
    }
}

impl IntoResponse for RpcResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct QueryParams {
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct GetDocParams {
    id: i64,
    #[serde(default)]
    content: bool,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    section: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FindConceptParams {
    concept: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    10
}

fn parse_body(body: &str) -> std::result::Result<RpcRequest, ()> {
    serde_json::from_str(body).map_err(|_| ())
}

fn check_method(request: &RpcRequest, expected: &str) -> std::result::Result<(), RpcResponse> {
    if !request.method.is_empty() && request.method != expected {
        return Err(RpcResponse::err(
            request.id.clone(),
            METHOD_NOT_FOUND,
            format!("unknown method: {}", request.method),
        ));
    }
    Ok(())
}

async fn semantic_query(State(repo): State<Arc<Repository>>, body: String) -> RpcResponse {
    let Ok(request) = parse_body(&body) else {
        return RpcResponse::err(Value::Null, PARSE_ERROR, "invalid JSON");
    };
    if let Err(resp) = check_method(&request, "semantic_query") {
        return resp;
    }
    let params: QueryParams = match serde_json::from_value(request.params) {
        Ok(p) => p,
        Err(e) => return RpcResponse::err(request.id, INVALID_PARAMS, e.to_string()),
    };
    match repo.semantic_search(&params.query, params.limit) {
        Ok(results) => RpcResponse::ok(
            request.id,
            json!({ "query": params.query, "count": results.len(), "documents": results }),
        ),
        Err(e) => RpcResponse::err(request.id, METHOD_NOT_FOUND, e.to_string()),
    }
}

async fn get_doc(State(repo): State<Arc<Repository>>, body: String) -> RpcResponse {
    let Ok(request) = parse_body(&body) else {
        return RpcResponse::err(Value::Null, PARSE_ERROR, "invalid JSON");
    };
    if let Err(resp) = check_method(&request, "get_document") {
        return resp;
    }
    let params: GetDocParams = match serde_json::from_value(request.params) {
        Ok(p) => p,
        Err(e) => return RpcResponse::err(request.id, INVALID_PARAMS, e.to_string()),
    };
    match repo.get_document(params.id, params.content, params.max_tokens, params.section.as_deref()) {
        Ok(Some(detail)) => RpcResponse::ok(request.id, json!(detail)),
        Ok(None) => RpcResponse::err(request.id, DOCUMENT_NOT_FOUND, "document not found"),
        Err(e) => RpcResponse::err(request.id, METHOD_NOT_FOUND, e.to_string()),
    }
}

async fn find_concept(State(repo): State<Arc<Repository>>, body: String) -> RpcResponse {
    let Ok(request) = parse_body(&body) else {
        return RpcResponse::err(Value::Null, PARSE_ERROR, "invalid JSON");
    };
    if let Err(resp) = check_method(&request, "find_by_concept") {
        return resp;
    }
    let params: FindConceptParams = match serde_json::from_value(request.params) {
        Ok(p) => p,
        Err(e) => return RpcResponse::err(request.id, INVALID_PARAMS, e.to_string()),
    };
    match repo.find_by_concept(&params.concept, params.limit) {
        Ok(results) => RpcResponse::ok(
            request.id,
            json!({ "concept": params.concept, "count": results.len(), "documents": results }),
        ),
        Err(e) => RpcResponse::err(request.id, METHOD_NOT_FOUND, e.to_string()),
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn serve(config: Config, repo: Repository) -> anyhow::Result<()> {
    let state = Arc::new(repo);

    let app = Router::new()
        .route("/api/v1/query", post(semantic_query))
        .route("/api/v1/get_doc", post(get_doc))
        .route("/api/v1/find_concept", post(find_concept))
        .route("/health", get(health))
        .with_state(state);

    let addr = format!("{}:{}", config.api.host, config.api.port);
    tracing::info!(%addr, "kiln JSON-RPC surface listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
