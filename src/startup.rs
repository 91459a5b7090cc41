use crate::{
    app_state::AppState,
    configuration::{DatabaseSettings, Settings},
    request_id::RequestUuid,
    routes::{
        health_check, home, not_found::not_found, send_otp, subscriber_count, verify_otp,
    },
    telemetry::request_span,
};
use anyhow::Context;
use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    Router,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

const CLIENT_HEADERS: [&str; 6] = [
    "x-client-info",
    "apikey",
    "x-supabase-client-platform",
    "x-supabase-client-platform-version",
    "x-supabase-client-runtime",
    "x-supabase-client-runtime-version",
];

pub struct Application {
    local_addr: SocketAddr,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, anyhow::Error> {
        let db_pool = get_connection_pool(&config.database);
        let email_client = config.email_client.client()?;

        let address = format!("{}:{}", config.application.host, config.application.port);
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind {address}"))?;
        let local_addr = listener.local_addr()?;

        let app_state = AppState {
            db_pool,
            email_client,
            otp_policy: config.otp.policy(),
        };
        let cors = cors_layer(&config.application.allowed_origins)?;

        let router = Router::new()
            .merge(health_check::router())
            .merge(home::router())
            .merge(send_otp::router())
            .merge(verify_otp::router())
            .merge(subscriber_count::router())
            .fallback(not_found)
            .with_state(app_state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(RequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(request_span))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(cors),
            );

        Ok(Self {
            local_addr,
            listener,
            router,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        tracing::info!("Listening on {}", self.local_addr);
        axum::serve(self.listener, self.router).await
    }
}

pub fn get_connection_pool(config: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new().connect_lazy_with(config.with_db())
}

/// Browsers may only call the API from the listed origins.
pub fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, anyhow::Error> {
    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("`{origin}` is not a valid CORS origin"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let headers = CLIENT_HEADERS
        .into_iter()
        .map(HeaderName::from_static)
        .chain([AUTHORIZATION, CONTENT_TYPE]);

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(headers.collect::<Vec<_>>()))
}
