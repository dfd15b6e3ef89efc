//! Multipart article form parsing.

use axum::http::StatusCode;
use axum_extra::extract::Multipart;
use axum_extra::extract::multipart::Field;
use thiserror::Error;
use tracing::error;

use crate::application::articles::MediaUpload;
use crate::application::error::HttpError;

const SOURCE: &str = "infra::http::forms";

/// Fields of the publish and edit forms.
#[derive(Debug, Default)]
pub(super) struct ArticleForm {
    pub(super) title: String,
    pub(super) description: String,
    pub(super) content: String,
    pub(super) thumb: Option<MediaUpload>,
    pub(super) banner: Option<MediaUpload>,
    pub(super) attachments: Vec<MediaUpload>,
}

#[derive(Debug, Error)]
pub(super) enum FormError {
    #[error("request body exceeds the upload limit")]
    PayloadTooLarge,
    #[error("malformed form data")]
    Invalid,
    #[error("failed to read form data: {0}")]
    Read(String),
}

impl From<FormError> for HttpError {
    fn from(err: FormError) -> Self {
        let (status, message) = match &err {
            FormError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "Upload is too large"),
            FormError::Invalid => (StatusCode::BAD_REQUEST, "Invalid form data"),
            FormError::Read(_) => (StatusCode::BAD_REQUEST, "Form data could not be read"),
        };
        HttpError::from_error(SOURCE, status, message, &err)
    }
}

pub(super) async fn read_article_form(multipart: &mut Multipart) -> Result<ArticleForm, FormError> {
    let mut form = ArticleForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                let status = err.status();
                error!(
                    target = SOURCE,
                    status = status.as_u16(),
                    error = %err,
                    "failed to read multipart payload"
                );
                return Err(match status {
                    StatusCode::PAYLOAD_TOO_LARGE => FormError::PayloadTooLarge,
                    StatusCode::BAD_REQUEST => FormError::Invalid,
                    _ => FormError::Read(err.to_string()),
                });
            }
        };

        match field.name() {
            Some("title") => form.title = read_text(field).await?,
            Some("description") => form.description = read_text(field).await?,
            Some("content") => form.content = read_text(field).await?,
            Some("thumbnail") => form.thumb = read_file(field).await?,
            Some("banner") => form.banner = read_file(field).await?,
            Some("article-files") => {
                if let Some(upload) = read_file(field).await? {
                    form.attachments.push(upload);
                }
            }
            _ => continue,
        }
    }

    Ok(form)
}

async fn read_text(field: Field) -> Result<String, FormError> {
    field.text().await.map_err(|err| match err.status() {
        StatusCode::PAYLOAD_TOO_LARGE => FormError::PayloadTooLarge,
        _ => FormError::Invalid,
    })
}

/// Browsers submit an empty, unnamed part for file inputs left blank. A named
/// but empty file is kept so validation can reject it.
async fn read_file(field: Field) -> Result<Option<MediaUpload>, FormError> {
    let filename = field
        .file_name()
        .map(|value| value.trim().to_string())
        .unwrap_or_default();

    let data = field.bytes().await.map_err(|err| match err.status() {
        StatusCode::PAYLOAD_TOO_LARGE => FormError::PayloadTooLarge,
        _ => FormError::Read(err.to_string()),
    })?;

    if data.is_empty() && filename.is_empty() {
        return Ok(None);
    }

    Ok(Some(MediaUpload {
        filename: if filename.is_empty() {
            "upload.bin".to_string()
        } else {
            filename
        },
        data,
    }))
}
