// src/services/api_server.rs
//! API Server for certificate anchoring and verification
//!
//! Exposes `CertificateService` over HTTP. Documents travel base64-encoded
//! inside JSON bodies; fingerprints travel as hex, with or without `0x`.
//!
//! Endpoints:
//! - `POST /fingerprint`: fingerprint a document without touching the ledger
//! - `POST /certificates`: register a certificate
//! - `POST /verify`: verify a document or fingerprint
//! - `GET  /verify/:fingerprint`: verify a fingerprint
//! - `GET  /health`: liveness probe
//!
//! Infrastructure failures are reported with a 5xx status, never as
//! `valid: false`.

use crate::error::AnchorError;
use crate::models::certificate::CertificateMetadata;
use crate::models::fingerprint::Fingerprint;
use crate::services::certificates::{CertificateService, DocumentInput, Registration, Verification};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

// API request and response structures

/// Request payload for fingerprinting a document
#[derive(Serialize, Deserialize)]
struct FingerprintRequest {
    /// Base64-encoded document bytes
    document: String,
}

#[derive(Serialize, Deserialize)]
struct FingerprintResponse {
    fingerprint: Fingerprint,
}

/// Request payload for registering a certificate
///
/// Exactly one of `document` and `fingerprint` must be present.
#[derive(Serialize, Deserialize)]
struct RegisterCertificateRequest {
    #[serde(default)]
    document: Option<String>,
    #[serde(default)]
    fingerprint: Option<String>,
    #[serde(flatten)]
    metadata: CertificateMetadata,
}

/// Request payload for verifying a certificate
#[derive(Serialize, Deserialize)]
struct VerifyCertificateRequest {
    #[serde(default)]
    document: Option<String>,
    #[serde(default)]
    fingerprint: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

type ApiFailure = (StatusCode, Json<ErrorResponse>);

/// API server state
#[derive(Clone)]
pub struct ApiServer {
    certificates: Arc<CertificateService>,
}

impl ApiServer {
    pub fn new(certificates: CertificateService) -> Self {
        ApiServer { certificates: Arc::new(certificates) }
    }

    /// Routes with shared state and a permissive CORS policy.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(Self::health_handler))
            .route("/fingerprint", post(Self::fingerprint_handler))
            .route("/certificates", post(Self::register_certificate_handler))
            .route("/verify", post(Self::verify_certificate_handler))
            .route("/verify/:fingerprint", get(Self::verify_fingerprint_handler))
            .layer(CorsLayer::permissive())
            .with_state(Arc::new(self.clone()))
    }

    /// Starts the API server and serves until the listener fails.
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:3000")
    pub async fn run(&self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API server listening on http://{}", listener.local_addr()?);
        axum::serve(listener, self.router()).await
    }

    async fn health_handler() -> impl IntoResponse {
        Json(json!({ "status": "ok" }))
    }

    /// # Endpoint
    /// POST /fingerprint
    ///
    /// # Responses
    /// - 200 OK: Returns the fingerprint
    /// - 400 Bad Request: Not base64, empty, or not a PDF when PDFs are required
    async fn fingerprint_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<FingerprintRequest>,
    ) -> Result<Json<FingerprintResponse>, ApiFailure> {
        let input = decode_document(&payload.document).map_err(failure)?;
        let fingerprint = state.certificates.fingerprint(&input).map_err(failure)?;
        Ok(Json(FingerprintResponse { fingerprint }))
    }

    /// # Endpoint
    /// POST /certificates
    ///
    /// # Responses
    /// - 200 OK: Returns fingerprint and transaction
    /// - 400 Bad Request: Malformed input or metadata
    /// - 409 Conflict: Fingerprint already holds a record
    /// - 422 Unprocessable Entity: Ledger refused the write
    /// - 503 / 504: Ledger unreachable, or confirmation timed out
    async fn register_certificate_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<RegisterCertificateRequest>,
    ) -> Result<Json<Registration>, ApiFailure> {
        let input = document_input(payload.document, payload.fingerprint).map_err(failure)?;
        let registration = state
            .certificates
            .register_certificate(&input, &payload.metadata)
            .await
            .map_err(failure)?;
        Ok(Json(registration))
    }

    /// # Endpoint
    /// POST /verify
    ///
    /// # Responses
    /// - 200 OK: Returns the verification outcome, valid or not
    /// - 400 Bad Request: Malformed input
    /// - 502 / 503 / 504: Verification could not be completed
    async fn verify_certificate_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<VerifyCertificateRequest>,
    ) -> Result<Json<Verification>, ApiFailure> {
        let input = document_input(payload.document, payload.fingerprint).map_err(failure)?;
        let verification = state.certificates.verify_certificate(&input).await.map_err(failure)?;
        Ok(Json(verification))
    }

    /// # Endpoint
    /// GET /verify/:fingerprint
    async fn verify_fingerprint_handler(
        State(state): State<Arc<ApiServer>>,
        Path(fingerprint): Path<String>,
    ) -> Result<Json<Verification>, ApiFailure> {
        let input = DocumentInput::Fingerprint(fingerprint);
        let verification = state.certificates.verify_certificate(&input).await.map_err(failure)?;
        Ok(Json(verification))
    }
}

fn decode_document(encoded: &str) -> Result<DocumentInput, AnchorError> {
    base64::decode(encoded.trim())
        .map(DocumentInput::Document)
        .map_err(|e| AnchorError::Input(format!("document is not valid base64: {}", e)))
}

fn document_input(document: Option<String>, fingerprint: Option<String>) -> Result<DocumentInput, AnchorError> {
    match (document, fingerprint) {
        (Some(document), None) => decode_document(&document),
        (None, Some(fingerprint)) => Ok(DocumentInput::Fingerprint(fingerprint)),
        (Some(_), Some(_)) => Err(AnchorError::Input("send either document or fingerprint, not both".into())),
        (None, None) => Err(AnchorError::Input("document or fingerprint is required".into())),
    }
}

fn status_of(error: &AnchorError) -> StatusCode {
    match error {
        AnchorError::Input(_) => StatusCode::BAD_REQUEST,
        AnchorError::AlreadyRegistered(_) => StatusCode::CONFLICT,
        AnchorError::SubmissionRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AnchorError::CallReverted(_) => StatusCode::BAD_GATEWAY,
        AnchorError::LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        AnchorError::ConfirmationTimeout { .. } | AnchorError::ScanIncomplete { .. } => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn failure(error: AnchorError) -> ApiFailure {
    let status = status_of(&error);
    if status.is_server_error() {
        warn!("request failed: {}", error);
    }
    (status, Json(ErrorResponse { error: error.to_string() }))
}
