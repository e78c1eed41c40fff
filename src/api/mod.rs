use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request},
    response::Json,
    routing::get,
    Extension,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, info, warn, Span};
use ulid::Ulid;
use url::Url;

pub mod handlers;
mod openapi;
pub mod response;

use handlers::auth::{
    state::{AuthConfig, AuthState},
    storage::PgAccountStore,
    token::TokenConfig,
};

/// Start the HTTP server.
///
/// # Errors
///
/// Returns an error if the database is unreachable, migrations fail, or the
/// listener cannot bind.
pub async fn new(
    port: u16,
    dsn: String,
    auth_config: AuthConfig,
    token_config: TokenConfig,
) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let cors = cors_layer(auth_config.frontend_base_url());

    let store = Arc::new(PgAccountStore::new(pool.clone()));
    let auth_state = Arc::new(AuthState::new(auth_config, &token_config, store));

    let (router, openapi) = openapi::api_router().split_for_parts();
    let app = router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth_state))
                .layer(Extension(pool.clone())),
        )
        .route("/", get(handlers::root::root))
        .route(
            "/openapi.json",
            get(move || async move { Json(openapi) }),
        )
        .layer(Extension(pool));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", err);
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// CORS restricted to the configured frontend origin; falls back to the
/// literal value when it is not a parseable URL.
fn cors_layer(frontend_base_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            HeaderName::from_static("authorization"),
            HeaderName::from_static("content-type"),
        ]);

    match frontend_origin(frontend_base_url).parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(err) => {
            warn!("Invalid frontend origin, CORS disabled: {}", err);
            layer
        }
    }
}

/// Reduce a frontend URL to its origin (scheme://host[:port]).
fn frontend_origin(frontend_base_url: &str) -> String {
    Url::parse(frontend_base_url)
        .map(|url| url.origin().ascii_serialization())
        .unwrap_or_else(|_| frontend_base_url.to_string())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_strips_path_and_query() {
        assert_eq!(
            frontend_origin("http://localhost:5173/app?x=1"),
            "http://localhost:5173"
        );
        assert_eq!(
            frontend_origin("https://portal.example.com/"),
            "https://portal.example.com"
        );
    }

    #[test]
    fn non_url_origin_passes_through() {
        assert_eq!(frontend_origin("not a url"), "not a url");
    }
}
