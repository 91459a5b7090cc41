use askama_axum::Template;
use axum::http::{StatusCode, Uri};

#[tracing::instrument(name = "Unknown page")]
pub async fn not_found(uri: Uri) -> (StatusCode, NotFoundTemplate) {
    tracing::warn!("No route for {}", uri.path());
    (StatusCode::NOT_FOUND, NotFoundTemplate)
}

#[derive(Template)]
#[template(path = "web/not_found.html")]
pub struct NotFoundTemplate;
