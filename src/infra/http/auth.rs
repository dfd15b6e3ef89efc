//! Sign-in and sign-out at `/auth/`.

use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{
    SignedCookieJar,
    cookie::{Cookie, SameSite},
};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::application::auth::{SESSION_COOKIE, local_redirect_target};
use crate::presentation::views::{
    AuthTemplate, AuthView, LayoutContext, render_message_response, render_template_response,
};

use super::{HttpState, middleware::current_operator};

#[derive(Debug, Default, Deserialize)]
pub(super) struct AuthQuery {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

pub(super) async fn auth_page(
    State(state): State<HttpState>,
    jar: SignedCookieJar,
    Query(query): Query<AuthQuery>,
) -> Response {
    let operator = current_operator(&state, &jar);
    let chrome = state.chrome.load(operator.as_ref());
    let title = if operator.is_some() { "Sign out" } else { "Sign in" };

    let content = AuthView {
        signed_in_as: operator.map(|operator| operator.username),
        action: form_action(query.next.as_deref()),
    };
    let view = LayoutContext::new(chrome, title, content);
    render_template_response(AuthTemplate { view }, StatusCode::OK)
}

/// A signed-in operator posting here signs out; anyone else is signing in.
pub(super) async fn auth_submit(
    State(state): State<HttpState>,
    jar: SignedCookieJar,
    Query(query): Query<AuthQuery>,
    Form(form): Form<LoginForm>,
) -> Response {
    if current_operator(&state, &jar).is_some() {
        let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
        return (jar, Redirect::to("/auth/")).into_response();
    }

    let Some(operator) = state.auth.authenticate(form.username.trim(), &form.password) else {
        return render_message_response(
            state.chrome.load(None),
            StatusCode::UNAUTHORIZED,
            "Sign in failed",
            "Bad username and/or password.",
        );
    };

    let token = state
        .auth
        .issue_session(&operator, OffsetDateTime::now_utc());
    let cookie = Cookie::build((SESSION_COOKIE, token.encode()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(state.auth.session_ttl());

    let target = query
        .next
        .as_deref()
        .and_then(local_redirect_target)
        .unwrap_or("/auth/");

    (jar.add(cookie), Redirect::to(target)).into_response()
}

fn form_action(next: Option<&str>) -> String {
    match next.and_then(local_redirect_target) {
        Some(next) => {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("next", next)
                .finish();
            format!("/auth/?{query}")
        }
        None => "/auth/".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::form_action;

    #[test]
    fn form_action_keeps_local_targets_only() {
        assert_eq!(form_action(None), "/auth/");
        assert_eq!(form_action(Some("//evil.example")), "/auth/");
        insta::assert_snapshot!(form_action(Some("/publish/")), @"/auth/?next=%2Fpublish%2F");
    }
}
