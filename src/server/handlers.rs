use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{AppState, errors::ApiError};
use crate::documents::DocumentType;
use crate::generation::{ChatMessage, GenerationRequest, Role};
use crate::retrieval::{
    NO_CONTEXT_AVAILABLE, RetrievalResult, SourceReference, build_system_prompt,
};
use crate::vocabulary::VOCABULARY_VERSION;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Largest `limit` accepted by the search endpoint
pub const MAX_SEARCH_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub doc_type: Option<DocumentType>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    #[serde(flatten)]
    pub result: RetrievalResult,
    pub sources: Vec<SourceReference>,
    pub context: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub documents_in_database: Option<u64>,
    pub vocabulary_version: &'static str,
}

#[inline]
pub async fn health() -> &'static str {
    "ok"
}

/// Answer the latest user message as a plain-text stream grounded in retrieved context
#[inline]
pub async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    let request_id = Uuid::new_v4();
    let mut response = match answer(&state, request, request_id).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn answer(
    state: &AppState,
    request: ChatRequest,
    request_id: Uuid,
) -> Result<Response, ApiError> {
    let question = match request.messages.last() {
        Some(message) if message.role == Role::User && !message.content.trim().is_empty() => {
            message.content.clone()
        }
        _ => return Err(ApiError::BadRequest("No user message provided".to_string())),
    };

    info!("[{}] Chat question: {:?}", request_id, question);

    let context = match state.retriever.hybrid_retrieve(&question, state.limit).await {
        Ok(result) if !result.is_empty() => {
            debug!("[{}] Using {} retrieved documents", request_id, result.len());
            result.context()
        }
        Ok(_) => {
            warn!("[{}] No documents retrieved, using general knowledge", request_id);
            NO_CONTEXT_AVAILABLE.to_string()
        }
        Err(e) => {
            warn!("[{}] Retrieval failed, using general knowledge: {}", request_id, e);
            NO_CONTEXT_AVAILABLE.to_string()
        }
    };

    let messages: Vec<ChatMessage> = request
        .messages
        .into_iter()
        .filter(|message| message.role != Role::System)
        .collect();

    let generation = GenerationRequest {
        system: build_system_prompt(&context),
        messages,
    };

    let stream = state.generator.stream_chat(generation).await.map_err(|e| {
        error!("[{}] Generation failed to start: {:#}", request_id, e);
        ApiError::Internal("Failed to process message".to_string())
    })?;

    let stream = stream.inspect(move |fragment| {
        if let Err(e) = fragment {
            error!("[{}] Generation stream failed: {:#}", request_id, e);
        }
    });

    Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(format!("Failed to build response: {e}")))
}

/// Retrieval without generation; entity or type filters select the strategy
#[inline]
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Query must not be empty".to_string()));
    }

    let limit = request.limit.unwrap_or(state.limit);
    if limit == 0 || limit > MAX_SEARCH_LIMIT {
        return Err(ApiError::BadRequest(format!(
            "Limit must be between 1 and {MAX_SEARCH_LIMIT}"
        )));
    }

    let retrieval = match (request.entity.as_deref(), request.doc_type) {
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "Use either entity or doc_type, not both".to_string(),
            ));
        }
        (Some(entity), None) => state.retriever.retrieve_by_entity(query, entity, limit).await,
        (None, Some(doc_type)) => state.retriever.retrieve_by_type(query, doc_type, limit).await,
        (None, None) => state.retriever.hybrid_retrieve(query, limit).await,
    };

    let result = retrieval.map_err(|e| {
        error!("Search for {:?} failed: {}", query, e);
        ApiError::ServiceUnavailable(format!("Retrieval failed: {e}"))
    })?;

    debug!("Search for {:?} returned {} documents", query, result.len());
    Ok(Json(SearchResponse {
        sources: result.sources(),
        context: result.context(),
        result,
    }))
}

#[inline]
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let documents_in_database = match state.index.count(None).await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!("Failed to count documents: {}", e);
            None
        }
    };

    Json(StatusResponse {
        status: if documents_in_database.is_some() { "ok" } else { "degraded" },
        documents_in_database,
        vocabulary_version: VOCABULARY_VERSION,
    })
}
