use std::io::ErrorKind;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::SignedCookieJar;
use bytes::Bytes;
use tracing::error;

use crate::application::error::HttpError;
use crate::application::render::render_markdown;
use crate::application::repos::MediaStorageError;
use crate::domain::article_id::ArticleId;
use crate::domain::articles::article_path;
use crate::presentation::views::{
    ArticleTemplate, ArticleView, IndexTemplate, IndexView, LayoutContext,
    render_not_found_response, render_template_response,
};

use super::{HttpState, health_response, middleware::current_operator};

pub(super) async fn index(State(state): State<HttpState>, jar: SignedCookieJar) -> Response {
    let chrome = state.chrome(&jar);
    match state.articles.list().await {
        Ok(articles) => {
            let view = LayoutContext::new(chrome, "", IndexView::new(&articles));
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

/// `/article/{key}/`: a numeric key is an article id, anything else a legacy
/// title link that redirects to the canonical path.
pub(super) async fn article_by_key(
    State(state): State<HttpState>,
    jar: SignedCookieJar,
    Path(key): Path<String>,
) -> Response {
    if key.chars().all(|c| c.is_ascii_digit()) {
        return article_detail(&state, &jar, &key).await;
    }

    match state.articles.find_by_title_slug(&key).await {
        Ok(Some(article)) => {
            Redirect::permanent(&article_path(article.id, &article.title)).into_response()
        }
        Ok(None) => render_not_found_response(state.chrome(&jar)),
        Err(err) => HttpError::from(err).into_response(),
    }
}

/// `/article/{id}/{title}/`: the title segment is cosmetic.
pub(super) async fn article_with_title(
    State(state): State<HttpState>,
    jar: SignedCookieJar,
    Path((key, _title)): Path<(String, String)>,
) -> Response {
    article_detail(&state, &jar, &key).await
}

async fn article_detail(state: &HttpState, jar: &SignedCookieJar, key: &str) -> Response {
    let operator = current_operator(state, jar);
    let chrome = state.chrome.load(operator.as_ref());

    let Ok(id) = key.parse::<ArticleId>() else {
        return render_not_found_response(chrome);
    };

    match state.articles.find(id).await {
        Ok(Some(article)) => {
            let content_html = render_markdown(&article.content);
            let content = ArticleView::new(&article, content_html, operator.is_some());
            let view = LayoutContext::new(chrome, &article.title, content);
            render_template_response(ArticleTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(chrome),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn serve_media(
    State(state): State<HttpState>,
    Path(path): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.media.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(MediaStorageError::InvalidPath { .. }) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "File not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(MediaStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "File not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored media"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    // files are overwritten in place when an article is edited
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("public, no-cache"));

    response
}

pub(super) async fn health(State(state): State<HttpState>) -> Response {
    health_response(state.articles.health_check().await)
}

pub(super) async fn fallback(State(state): State<HttpState>, jar: SignedCookieJar) -> Response {
    render_not_found_response(state.chrome(&jar))
}
