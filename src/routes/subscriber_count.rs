use crate::{app_state::AppState, persistence::count_verified_subscribers};
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/subscriber-count",
        get(subscriber_count)
            .post(subscriber_count)
            .fallback(method_not_allowed),
    )
}

#[tracing::instrument(name = "Report subscriber count", skip(app_state))]
async fn subscriber_count(State(app_state): State<AppState>) -> Json<SubscriberCount> {
    Json(current_count(&app_state.db_pool).await)
}

async fn method_not_allowed() -> (StatusCode, Json<SubscriberCount>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(SubscriberCount {
            count: 0,
            code: Some("method_not_allowed"),
        }),
    )
}

#[derive(Serialize)]
pub(super) struct SubscriberCount {
    pub(super) count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

/// Counts verified subscribers, falling back to zero so pages keep rendering.
pub(super) async fn current_count(db_pool: &PgPool) -> SubscriberCount {
    match count_verified_subscribers(db_pool).await {
        Ok(count) => SubscriberCount { count, code: None },
        Err(e) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "Failed to count verified subscribers. Reporting zero."
            );
            SubscriberCount {
                count: 0,
                code: Some("server_error"),
            }
        }
    }
}
