//! Domain entities mirrored from persistent storage.

use time::Date;

use crate::domain::article_id::ArticleId;

/// Index entry for an article: everything except the markdown body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSummary {
    pub id: ArticleId,
    pub date: Date,
    pub title: String,
    pub description: String,
    pub thumb: Option<String>,
    pub banner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub id: ArticleId,
    pub date: Date,
    pub title: String,
    pub description: String,
    pub content: String,
    pub thumb: Option<String>,
    pub banner: Option<String>,
}

impl Article {
    pub fn from_summary(summary: ArticleSummary, content: String) -> Self {
        Self {
            id: summary.id,
            date: summary.date,
            title: summary.title,
            description: summary.description,
            content,
            thumb: summary.thumb,
            banner: summary.banner,
        }
    }

    pub fn summary(&self) -> ArticleSummary {
        ArticleSummary {
            id: self.id,
            date: self.date,
            title: self.title.clone(),
            description: self.description.clone(),
            thumb: self.thumb.clone(),
            banner: self.banner.clone(),
        }
    }
}
