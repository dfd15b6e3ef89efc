use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{articles::ArticleServiceError, repos::RepoError},
    domain::article_id::AllocationError,
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<ArticleServiceError> for HttpError {
    fn from(error: ArticleServiceError) -> Self {
        const SOURCE: &str = "application::error::article_error_to_http";
        match &error {
            ArticleServiceError::Validation(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Article could not be saved",
                &error,
            ),
            ArticleServiceError::DuplicateTitle { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::CONFLICT,
                "An article with this title already exists",
                &error,
            ),
            ArticleServiceError::Contended { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::CONFLICT,
                "Another article was published at the same time, please retry",
                &error,
            ),
            ArticleServiceError::Allocation(AllocationError::Exhausted { .. }) => {
                HttpError::from_error(
                    SOURCE,
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Publishing is busy for today",
                    &error,
                )
            }
            ArticleServiceError::NotFound | ArticleServiceError::Repo(RepoError::NotFound) => {
                HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Article not found", &error)
            }
            ArticleServiceError::Repo(RepoError::Timeout) => HttpError::from_error(
                SOURCE,
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable",
                &error,
            ),
            ArticleServiceError::Allocation(_)
            | ArticleServiceError::Repo(_)
            | ArticleServiceError::Media(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &error,
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
