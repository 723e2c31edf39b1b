use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use super::ApiError;
use crate::app_state::AppState;
use crate::models::job::OrderState;
use crate::models::order::is_valid_order_id;

/// GET /download/{order_id}: zip bundle with `order.xml` and `cropped.png`.
///
/// 404 when the order has no artifact directory, 409 while the order is
/// queued or being processed in this process.
pub async fn download_bundle(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Response, ApiError> {
    let not_found = || ApiError::NotFound(format!("No artifacts for order {order_id}"));

    if !is_valid_order_id(&order_id) || !state.store.exists(&order_id).await {
        return Err(not_found());
    }

    if matches!(
        state.queue.state_of(&order_id).await,
        OrderState::Queued | OrderState::Processing
    ) {
        return Err(ApiError::Conflict(format!("Order {order_id} is still processing")));
    }

    let bytes = state.store.package(&order_id).await?;
    tracing::info!(order_id = %order_id, bytes = bytes.len(), "Serving artifact bundle");

    let disposition = format!(
        "attachment; filename={}-{}.zip",
        state.download_prefix, order_id
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(bytes),
    )
        .into_response())
}
