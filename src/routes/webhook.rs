use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use super::ApiError;
use crate::app_state::AppState;
use crate::models::job::SubmitOutcome;
use crate::models::order::OrderJob;
use crate::services::signature::SIGNATURE_HEADER;

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
    pub status: SubmitOutcome,
    pub download: String,
}

/// POST /webhooks/orders-paid: validate a paid order and hand it to the worker.
///
/// Responds as soon as the job is queued; processing happens in the background.
pub async fn orders_paid(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    if let Some(verifier) = &state.verifier {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        if let Err(e) = verifier.verify(&body, signature) {
            tracing::warn!(error = %e, "Rejected webhook with bad signature");
            return Err(e.into());
        }
    }

    let raw: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;

    let job = match OrderJob::from_payload(raw) {
        Ok(job) => job,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected order payload");
            return Err(e.into());
        }
    };

    let download = format!("/download/{}", job.order_id);
    let status = state.queue.submit(job).await;

    Ok(Json(WebhookResponse {
        ok: true,
        status,
        download,
    }))
}
