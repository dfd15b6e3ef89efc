use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::SignedCookieJar;
use metrics::histogram;
use time::OffsetDateTime;
use tracing::{error, warn};
use url::form_urlencoded::Serializer;
use uuid::Uuid;

use crate::application::auth::SESSION_COOKIE;
use crate::application::error::ErrorReport;
use crate::domain::accounts::Operator;

use super::{HttpState, METRIC_HTTP_REQUEST_MS};

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed = start.elapsed();
    histogram!(METRIC_HTTP_REQUEST_MS).record(elapsed.as_secs_f64() * 1000.0);

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = elapsed.as_millis();
        let operator = response
            .extensions()
            .get::<Operator>()
            .map(|operator| operator.username.clone());
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "geeoh::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                operator = operator.as_deref().unwrap_or(""),
                "request failed",
            );
        } else {
            warn!(
                target = "geeoh::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                operator = operator.as_deref().unwrap_or(""),
                "client request error",
            );
        }
    }

    response
}

/// Resolve the session cookie to an [`Operator`], or send anonymous visitors
/// to the sign-in page with the current path as `next`.
pub async fn require_operator(
    State(state): State<HttpState>,
    jar: SignedCookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(operator) = current_operator(&state, &jar) else {
        let target = request
            .uri()
            .path_and_query()
            .map(|value| value.as_str())
            .unwrap_or("/");
        return Redirect::to(&login_redirect(target)).into_response();
    };

    request.extensions_mut().insert(operator.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(operator);
    response
}

/// Operator for the current request when a valid session cookie is present.
pub(super) fn current_operator(state: &HttpState, jar: &SignedCookieJar) -> Option<Operator> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| state.auth.verify_session(cookie.value(), OffsetDateTime::now_utc()))
}

pub(super) fn login_redirect(next: &str) -> String {
    let query = Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    format!("/auth?{query}")
}

#[cfg(test)]
mod tests {
    use super::login_redirect;

    #[test]
    fn login_redirect_encodes_the_target() {
        insta::assert_snapshot!(login_redirect("/publish/"), @"/auth?next=%2Fpublish%2F");
        assert_eq!(
            login_redirect("/article/24030901/edit/?x=1&y=2"),
            "/auth?next=%2Farticle%2F24030901%2Fedit%2F%3Fx%3D1%26y%3D2"
        );
    }
}
