mod auth;
mod forms;
mod middleware;
mod operator;
mod public;

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::{SignedCookieJar, cookie::Key};
use sha2::{Digest, Sha512};

use crate::application::{
    articles::{ArticleService, ArticleServiceError},
    auth::AuthService,
    chrome::ChromeService,
    error::ErrorReport,
};
use crate::infra::media::MediaStorage;
use crate::presentation::views::LayoutChrome;

use self::middleware::{current_operator, log_responses, require_operator, set_request_context};

pub(crate) const METRIC_HTTP_REQUEST_MS: &str = "geeoh_http_request_ms";

#[derive(Clone)]
pub struct HttpState {
    pub articles: Arc<ArticleService>,
    pub auth: Arc<AuthService>,
    pub chrome: Arc<ChromeService>,
    pub media: Arc<MediaStorage>,
    pub cookie_key: Key,
    pub upload_limit_bytes: usize,
}

impl FromRef<HttpState> for Key {
    fn from_ref(state: &HttpState) -> Self {
        state.cookie_key.clone()
    }
}

impl HttpState {
    fn chrome(&self, jar: &SignedCookieJar) -> LayoutChrome {
        let operator = current_operator(self, jar);
        self.chrome.load(operator.as_ref())
    }
}

/// Derive the cookie signing key from the configured secret.
pub fn cookie_key(secret_key: &str) -> Key {
    let digest = Sha512::digest(secret_key.as_bytes());
    Key::from(&digest[..])
}

pub fn build_router(state: HttpState) -> Router {
    let operator_routes = Router::new()
        .route(
            "/publish",
            get(operator::publish_form).post(operator::publish_submit),
        )
        .route(
            "/publish/",
            get(operator::publish_form).post(operator::publish_submit),
        )
        .route(
            "/article/{key}/edit",
            get(operator::edit_form).post(operator::edit_submit),
        )
        .route(
            "/article/{key}/edit/",
            get(operator::edit_form).post(operator::edit_submit),
        )
        .route("/markdownify", post(operator::markdownify))
        .route("/markdownify/", post(operator::markdownify))
        .layer(DefaultBodyLimit::max(state.upload_limit_bytes))
        .route_layer(from_fn_with_state(state.clone(), require_operator));

    let public_routes = Router::new()
        .route("/", get(public::index))
        .route("/article/{key}", get(public::article_by_key))
        .route("/article/{key}/", get(public::article_by_key))
        .route("/article/{key}/{title}", get(public::article_with_title))
        .route("/article/{key}/{title}/", get(public::article_with_title))
        .route("/auth", get(auth::auth_page).post(auth::auth_submit))
        .route("/auth/", get(auth::auth_page).post(auth::auth_submit))
        .route("/media/{*path}", get(public::serve_media))
        .route("/_health/db", get(public::health))
        .fallback(public::fallback);

    public_routes
        .merge(operator_routes)
        .with_state(state)
        .layer(from_fn(log_responses))
        .layer(from_fn(set_request_context))
}

fn health_response(result: Result<(), ArticleServiceError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
