//! Repository traits describing persistence adapters.

use std::collections::BTreeSet;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use time::Date;

use crate::domain::article_id::ArticleId;
use crate::domain::entities::{Article, ArticleSummary};

/// Unique constraint guarding article ids.
pub const ARTICLES_PKEY: &str = "articles_pkey";
/// Unique constraint guarding article titles.
pub const ARTICLES_TITLE_KEY: &str = "articles_title_key";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn duplicate(constraint: &str) -> Self {
        Self::Duplicate {
            constraint: constraint.to_string(),
        }
    }

    /// Whether this error is a unique violation on the given constraint.
    pub fn is_duplicate_of(&self, name: &str) -> bool {
        matches!(self, Self::Duplicate { constraint } if constraint == name)
    }
}

#[derive(Debug, Clone)]
pub struct NewArticleParams {
    pub id: ArticleId,
    pub date: Date,
    pub title: String,
    pub description: String,
    pub content: String,
    pub thumb: Option<String>,
    pub banner: Option<String>,
}

impl NewArticleParams {
    pub fn into_article(self) -> Article {
        Article {
            id: self.id,
            date: self.date,
            title: self.title,
            description: self.description,
            content: self.content,
            thumb: self.thumb,
            banner: self.banner,
        }
    }
}

/// Replacement values for a stored article. `None` media keeps the current path.
#[derive(Debug, Clone)]
pub struct UpdateArticleParams {
    pub id: ArticleId,
    pub title: String,
    pub description: String,
    pub content: String,
    pub thumb: Option<String>,
    pub banner: Option<String>,
}

#[async_trait]
pub trait ArticlesRepo: Send + Sync {
    /// All articles, newest id first.
    async fn list_articles(&self) -> Result<Vec<ArticleSummary>, RepoError>;

    /// Ids in the inclusive range `low..=high`.
    async fn list_ids_between(
        &self,
        low: ArticleId,
        high: ArticleId,
    ) -> Result<BTreeSet<ArticleId>, RepoError>;

    async fn find_by_id(&self, id: ArticleId) -> Result<Option<Article>, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ArticlesWriteRepo: Send + Sync {
    /// Persist a new article. Fails with [`RepoError::Duplicate`] when the id
    /// or the title is already taken.
    async fn insert_article(&self, params: NewArticleParams) -> Result<Article, RepoError>;

    async fn update_article(&self, params: UpdateArticleParams) -> Result<Article, RepoError>;

    /// Remove an article. Deleting a missing id is not an error.
    async fn delete_article(&self, id: ArticleId) -> Result<(), RepoError>;
}

#[derive(Debug, Error)]
pub enum MediaStorageError {
    #[error("invalid media path `{path}`")]
    InvalidPath { path: String },
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Write access to article media, addressed by paths relative to the media root.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Write `data` to `relative_path`, replacing any existing file.
    async fn put(&self, relative_path: &str, data: Bytes) -> Result<(), MediaStorageError>;

    /// Remove the directory at `relative_dir` with everything in it.
    async fn discard(&self, relative_dir: &str) -> Result<(), MediaStorageError>;
}
