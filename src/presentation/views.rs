use crate::application::error::{ErrorReport, HttpError};
use crate::domain::article_id::ArticleId;
use crate::domain::articles::{DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS, article_path, edit_path};
use crate::domain::entities::{Article, ArticleSummary};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let view = LayoutContext::new(chrome, "Not found", ErrorPageView::not_found());
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Render a short message page, e.g. after a failed sign-in.
pub fn render_message_response(
    chrome: LayoutChrome,
    status: StatusCode,
    title: &str,
    message: &str,
) -> Response {
    let content = MessageView {
        title: title.to_string(),
        message: message.to_string(),
    };
    let view = LayoutContext::new(chrome, title, content);
    render_template_response(MessageTemplate { view }, status)
}

/// Public URL for a stored media path.
pub fn media_url(path: &str) -> String {
    format!("/media/{path}")
}

#[derive(Debug, Clone)]
pub struct LayoutChrome {
    pub site_title: String,
    pub motto: Option<String>,
    pub operator: Option<String>,
}

pub struct LayoutContext<T> {
    pub site_title: String,
    pub page_title: String,
    pub motto: Option<String>,
    pub operator: Option<String>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, page_title: &str, content: T) -> Self {
        Self {
            site_title: chrome.site_title,
            page_title: page_title.to_string(),
            motto: chrome.motto,
            operator: chrome.operator,
            content,
        }
    }

    pub fn document_title(&self) -> String {
        if self.page_title.is_empty() {
            self.site_title.clone()
        } else {
            format!("{} | {}", self.page_title, self.site_title)
        }
    }
}

pub struct ArticleCard {
    pub href: String,
    pub title: String,
    pub description: String,
    pub date: String,
    pub thumb_url: Option<String>,
}

impl From<&ArticleSummary> for ArticleCard {
    fn from(article: &ArticleSummary) -> Self {
        Self {
            href: article_path(article.id, &article.title),
            title: article.title.clone(),
            description: article.description.clone(),
            date: article.date.to_string(),
            thumb_url: article.thumb.as_deref().map(media_url),
        }
    }
}

pub struct IndexView {
    pub articles: Vec<ArticleCard>,
}

impl IndexView {
    pub fn new(articles: &[ArticleSummary]) -> Self {
        Self {
            articles: articles.iter().map(ArticleCard::from).collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexView>,
}

pub struct ArticleView {
    pub id: ArticleId,
    pub title: String,
    pub description: String,
    pub date: String,
    pub content_html: String,
    pub banner_url: Option<String>,
    pub edit_href: Option<String>,
}

impl ArticleView {
    pub fn new(article: &Article, content_html: String, can_edit: bool) -> Self {
        Self {
            id: article.id,
            title: article.title.clone(),
            description: article.description.clone(),
            date: article.date.to_string(),
            content_html,
            banner_url: article.banner.as_deref().map(media_url),
            edit_href: can_edit.then(|| edit_path(article.id)),
        }
    }
}

#[derive(Template)]
#[template(path = "article.html")]
pub struct ArticleTemplate {
    pub view: LayoutContext<ArticleView>,
}

pub struct AuthView {
    pub signed_in_as: Option<String>,
    pub action: String,
}

#[derive(Template)]
#[template(path = "auth.html")]
pub struct AuthTemplate {
    pub view: LayoutContext<AuthView>,
}

pub struct MessageView {
    pub title: String,
    pub message: String,
}

#[derive(Template)]
#[template(path = "message.html")]
pub struct MessageTemplate {
    pub view: LayoutContext<MessageView>,
}

/// Form shared by publishing and editing.
pub struct ArticleFormView {
    pub heading: String,
    pub action: String,
    pub submit_label: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub error: Option<String>,
    pub title_max: usize,
    pub description_max: usize,
    pub images_required: bool,
}

impl ArticleFormView {
    pub fn publish() -> Self {
        Self {
            heading: "Publish".to_string(),
            action: "/publish/".to_string(),
            submit_label: "Publish".to_string(),
            title: String::new(),
            description: String::new(),
            content: String::new(),
            error: None,
            title_max: TITLE_MAX_CHARS,
            description_max: DESCRIPTION_MAX_CHARS,
            images_required: true,
        }
    }

    pub fn edit(article: &Article) -> Self {
        Self {
            heading: format!("Edit article {}", article.id),
            action: edit_path(article.id),
            submit_label: "Save".to_string(),
            title: article.title.clone(),
            description: article.description.clone(),
            content: article.content.clone(),
            error: None,
            title_max: TITLE_MAX_CHARS,
            description_max: DESCRIPTION_MAX_CHARS,
            images_required: false,
        }
    }

    pub fn with_values(mut self, title: &str, description: &str, content: &str) -> Self {
        self.title = title.to_string();
        self.description = description.to_string();
        self.content = content.to_string();
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[derive(Template)]
#[template(path = "article_form.html")]
pub struct ArticleFormTemplate {
    pub view: LayoutContext<ArticleFormView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
