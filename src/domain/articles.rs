//! Article field rules, canonical paths, and media locations.

use std::path::Path;

use slug::slugify;

use crate::domain::article_id::ArticleId;
use crate::domain::error::DomainError;

pub const TITLE_MAX_CHARS: usize = 30;
pub const DESCRIPTION_MAX_CHARS: usize = 60;

/// Validated article fields supplied by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleDraft {
    pub title: String,
    pub description: String,
    pub content: String,
}

impl ArticleDraft {
    pub fn new(title: &str, description: &str, content: &str) -> Result<Self, DomainError> {
        let title = required_line("title", title, TITLE_MAX_CHARS)?;
        let description = required_line("description", description, DESCRIPTION_MAX_CHARS)?;
        if content.trim().is_empty() {
            return Err(DomainError::validation("content", "must not be empty"));
        }

        Ok(Self {
            title,
            description,
            content: content.replace("\r\n", "\n"),
        })
    }
}

fn required_line(field: &'static str, value: &str, max_chars: usize) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }

    let count = trimmed.chars().count();
    if count > max_chars {
        return Err(DomainError::validation(
            field,
            format!("must be at most {max_chars} characters (got {count})"),
        ));
    }

    Ok(trimmed.to_string())
}

pub fn title_slug(title: &str) -> String {
    slugify(title)
}

/// Canonical public path, with the title slug appended when it has one.
pub fn article_path(id: ArticleId, title: &str) -> String {
    let slug = title_slug(title);
    if slug.is_empty() {
        format!("/article/{id}/")
    } else {
        format!("/article/{id}/{slug}/")
    }
}

pub fn edit_path(id: ArticleId) -> String {
    format!("/article/{id}/edit/")
}

/// Image slots every article carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Thumb,
    Banner,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Thumb => "thumb",
            Self::Banner => "banner",
        }
    }
}

/// Location of an article image relative to the media root: `{id}/{kind}.{ext}`.
pub fn media_path(id: ArticleId, kind: MediaKind, original_filename: &str) -> String {
    let extension = Path::new(original_filename)
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{id}/{}.{ext}", kind.as_str()),
        None => format!("{id}/{}", kind.as_str()),
    }
}

/// Validated attachment file name: the final path component of the upload,
/// not hidden and not shadowing an article image.
pub fn attachment_name(original_filename: &str) -> Result<String, DomainError> {
    let name = Path::new(original_filename.trim())
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or_default();

    if name.is_empty() || name.starts_with('.') {
        return Err(DomainError::validation(
            "article_files",
            format!("`{original_filename}` is not a usable file name"),
        ));
    }

    let stem = Path::new(name).file_stem().and_then(|value| value.to_str());
    if [MediaKind::Thumb, MediaKind::Banner]
        .iter()
        .any(|kind| stem == Some(kind.as_str()))
    {
        return Err(DomainError::validation(
            "article_files",
            format!("`{name}` clashes with the article images"),
        ));
    }

    Ok(name.to_string())
}

/// Location of a free-form attachment: `{id}/{filename}`, keeping the original name.
pub fn attachment_path(id: ArticleId, original_filename: &str) -> Result<String, DomainError> {
    let name = attachment_name(original_filename)?;
    Ok(format!("{id}/{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn sample_id() -> ArticleId {
        ArticleId::compose(date!(2024 - 03 - 09), 1).expect("id")
    }

    #[test]
    fn draft_trims_and_accepts_limits() {
        let title = "t".repeat(TITLE_MAX_CHARS);
        let draft = ArticleDraft::new(&format!("  {title} "), "About", "# Hi\r\nthere")
            .expect("valid draft");
        assert_eq!(draft.title, title);
        assert_eq!(draft.content, "# Hi\nthere");
    }

    #[test]
    fn draft_rejects_long_title() {
        let err = ArticleDraft::new(&"x".repeat(31), "About", "body").expect_err("too long");
        assert_eq!(err.field(), Some("title"));
    }

    #[test]
    fn draft_counts_characters_not_bytes() {
        let description = "é".repeat(DESCRIPTION_MAX_CHARS);
        assert!(ArticleDraft::new("Title", &description, "body").is_ok());
    }

    #[test]
    fn draft_rejects_blank_fields() {
        assert_eq!(
            ArticleDraft::new("Title", "   ", "body")
                .expect_err("blank")
                .field(),
            Some("description")
        );
        assert_eq!(
            ArticleDraft::new("Title", "About", "\n\n")
                .expect_err("blank")
                .field(),
            Some("content")
        );
    }

    #[test]
    fn article_path_includes_slug() {
        insta::assert_snapshot!(
            article_path(sample_id(), "Hello, World!"),
            @"/article/24030901/hello-world/"
        );
        assert_eq!(article_path(sample_id(), "???"), "/article/24030901/");
    }

    #[test]
    fn media_path_uses_lowercase_extension() {
        assert_eq!(
            media_path(sample_id(), MediaKind::Thumb, "Photo.PNG"),
            "24030901/thumb.png"
        );
        assert_eq!(
            media_path(sample_id(), MediaKind::Banner, "banner"),
            "24030901/banner"
        );
    }

    #[test]
    fn attachment_path_strips_directories() {
        assert_eq!(
            attachment_path(sample_id(), "../../etc/notes.txt").expect("path"),
            "24030901/notes.txt"
        );
        assert!(attachment_path(sample_id(), "..").is_err());
        assert!(attachment_path(sample_id(), ".env").is_err());
        assert!(attachment_path(sample_id(), "thumb.jpg").is_err());
    }
}
