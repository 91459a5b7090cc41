use super::subscriber_count::current_count;
use crate::{app_state::AppState, domain::OtpPolicy};
use askama_axum::Template;
use axum::{extract::State, routing::get, Router};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(home))
}

#[tracing::instrument(name = "Render landing page", skip(app_state))]
async fn home(State(app_state): State<AppState>) -> HomeTemplate<'static> {
    let subscriber_count = current_count(&app_state.db_pool).await.count;

    HomeTemplate {
        title: "Tone2vibe | Coming soon",
        subscriber_count,
        resend_cooldown_seconds: resend_cooldown_seconds(&app_state.otp_policy),
    }
}

fn resend_cooldown_seconds(policy: &OtpPolicy) -> i64 {
    policy.resend_cooldown.whole_seconds()
}

#[derive(Template)]
#[template(path = "web/home.html")]
struct HomeTemplate<'a> {
    title: &'a str,
    subscriber_count: i64,
    resend_cooldown_seconds: i64,
}
