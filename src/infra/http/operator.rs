//! Operator-only pages: publishing, editing and the markdown preview.

use axum::{
    Extension, Form,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::Multipart;
use serde::Deserialize;

use crate::application::articles::{
    ArticleServiceError, PublishArticleCommand, UpdateArticleCommand,
};
use crate::application::error::HttpError;
use crate::application::render::render_markdown;
use crate::domain::accounts::Operator;
use crate::domain::article_id::ArticleId;
use crate::domain::articles::article_path;
use crate::presentation::views::{
    ArticleFormTemplate, ArticleFormView, LayoutChrome, LayoutContext, render_not_found_response,
    render_template_response,
};

use super::HttpState;
use super::forms::{ArticleForm, read_article_form};

pub(super) async fn publish_form(
    State(state): State<HttpState>,
    Extension(operator): Extension<Operator>,
) -> Response {
    let chrome = state.chrome.load(Some(&operator));
    render_form(chrome, ArticleFormView::publish(), StatusCode::OK)
}

pub(super) async fn publish_submit(
    State(state): State<HttpState>,
    Extension(operator): Extension<Operator>,
    mut multipart: Multipart,
) -> Response {
    let form = match read_article_form(&mut multipart).await {
        Ok(form) => form,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let view = ArticleFormView::publish().with_values(&form.title, &form.description, &form.content);
    let command = PublishArticleCommand {
        title: form.title,
        description: form.description,
        content: form.content,
        thumb: form.thumb,
        banner: form.banner,
        attachments: form.attachments,
    };

    match state.articles.publish(&operator, command).await {
        Ok(article) => Redirect::to(&article_path(article.id, &article.title)).into_response(),
        Err(err) => form_failure(state.chrome.load(Some(&operator)), view, err),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    Extension(operator): Extension<Operator>,
    Path(key): Path<String>,
) -> Response {
    let chrome = state.chrome.load(Some(&operator));
    let Ok(id) = key.parse::<ArticleId>() else {
        return render_not_found_response(chrome);
    };

    match state.articles.find(id).await {
        Ok(Some(article)) => render_form(chrome, ArticleFormView::edit(&article), StatusCode::OK),
        Ok(None) => render_not_found_response(chrome),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    Extension(operator): Extension<Operator>,
    Path(key): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let chrome = state.chrome.load(Some(&operator));
    let Ok(id) = key.parse::<ArticleId>() else {
        return render_not_found_response(chrome);
    };

    let existing = match state.articles.find(id).await {
        Ok(Some(article)) => article,
        Ok(None) => return render_not_found_response(chrome),
        Err(err) => return HttpError::from(err).into_response(),
    };

    let form = match read_article_form(&mut multipart).await {
        Ok(form) => form,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let view =
        ArticleFormView::edit(&existing).with_values(&form.title, &form.description, &form.content);
    let ArticleForm {
        title,
        description,
        content,
        thumb,
        banner,
        attachments,
    } = form;
    let command = UpdateArticleCommand {
        id,
        title,
        description,
        content,
        thumb,
        banner,
        attachments,
    };

    match state.articles.update(&operator, command).await {
        Ok(article) => Redirect::to(&article_path(article.id, &article.title)).into_response(),
        Err(ArticleServiceError::NotFound) => render_not_found_response(chrome),
        Err(err) => form_failure(chrome, view, err),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct MarkdownifyForm {
    #[serde(default)]
    content: String,
}

/// HTML preview of a draft, rendered exactly like the article page.
pub(super) async fn markdownify(Form(form): Form<MarkdownifyForm>) -> Html<String> {
    Html(render_markdown(&form.content))
}

fn render_form(chrome: LayoutChrome, form: ArticleFormView, status: StatusCode) -> Response {
    let title = form.heading.clone();
    let view = LayoutContext::new(chrome, &title, form);
    render_template_response(ArticleFormTemplate { view }, status)
}

/// Input problems re-render the form with the operator's values; anything
/// else becomes an error response.
fn form_failure(chrome: LayoutChrome, view: ArticleFormView, err: ArticleServiceError) -> Response {
    match &err {
        ArticleServiceError::Validation(inner) => {
            render_form(chrome, view.with_error(inner.to_string()), StatusCode::BAD_REQUEST)
        }
        ArticleServiceError::DuplicateTitle { .. } => {
            render_form(chrome, view.with_error(err.to_string()), StatusCode::CONFLICT)
        }
        _ => HttpError::from(err).into_response(),
    }
}
