use std::collections::BTreeSet;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::FromRow;
use time::Date;

use crate::application::repos::{
    ArticlesRepo, ArticlesWriteRepo, NewArticleParams, RepoError, UpdateArticleParams,
};
use crate::domain::article_id::ArticleId;
use crate::domain::entities::{Article, ArticleSummary};

use super::PostgresRepositories;
use super::util::map_sqlx_error;

#[derive(Debug, FromRow)]
struct ArticleRow {
    id: ArticleId,
    date: Date,
    title: String,
    description: String,
    content: String,
    thumb: Option<String>,
    banner: Option<String>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            date: row.date,
            title: row.title,
            description: row.description,
            content: row.content,
            thumb: row.thumb,
            banner: row.banner,
        }
    }
}

#[derive(Debug, FromRow)]
struct ArticleSummaryRow {
    id: ArticleId,
    date: Date,
    title: String,
    description: String,
    thumb: Option<String>,
    banner: Option<String>,
}

impl From<ArticleSummaryRow> for ArticleSummary {
    fn from(row: ArticleSummaryRow) -> Self {
        Self {
            id: row.id,
            date: row.date,
            title: row.title,
            description: row.description,
            thumb: row.thumb,
            banner: row.banner,
        }
    }
}

#[async_trait]
impl ArticlesRepo for PostgresRepositories {
    async fn list_articles(&self) -> Result<Vec<ArticleSummary>, RepoError> {
        let rows = sqlx::query_as::<_, ArticleSummaryRow>(
            r#"
            SELECT id, date, title, description, thumb, banner
            FROM articles
            ORDER BY id DESC
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ArticleSummary::from).collect())
    }

    async fn list_ids_between(
        &self,
        low: ArticleId,
        high: ArticleId,
    ) -> Result<BTreeSet<ArticleId>, RepoError> {
        let ids = sqlx::query_scalar::<_, ArticleId>(
            r#"
            SELECT id
            FROM articles
            WHERE id BETWEEN $1 AND $2
            "#,
        )
        .bind(low)
        .bind(high)
        .fetch(self.pool())
        .try_collect::<BTreeSet<_>>()
        .await
        .map_err(map_sqlx_error)?;

        Ok(ids)
    }

    async fn find_by_id(&self, id: ArticleId) -> Result<Option<Article>, RepoError> {
        let row = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT id, date, title, description, content, thumb, banner
            FROM articles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Article::from))
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.ping().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl ArticlesWriteRepo for PostgresRepositories {
    async fn insert_article(&self, params: NewArticleParams) -> Result<Article, RepoError> {
        let row = sqlx::query_as::<_, ArticleRow>(
            r#"
            INSERT INTO articles (id, date, title, description, content, thumb, banner)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, date, title, description, content, thumb, banner
            "#,
        )
        .bind(params.id)
        .bind(params.date)
        .bind(params.title)
        .bind(params.description)
        .bind(params.content)
        .bind(params.thumb)
        .bind(params.banner)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(Article::from(row))
    }

    async fn update_article(&self, params: UpdateArticleParams) -> Result<Article, RepoError> {
        let row = sqlx::query_as::<_, ArticleRow>(
            r#"
            UPDATE articles
            SET title = $2,
                description = $3,
                content = $4,
                thumb = COALESCE($5, thumb),
                banner = COALESCE($6, banner)
            WHERE id = $1
            RETURNING id, date, title, description, content, thumb, banner
            "#,
        )
        .bind(params.id)
        .bind(params.title)
        .bind(params.description)
        .bind(params.content)
        .bind(params.thumb)
        .bind(params.banner)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(Article::from).ok_or(RepoError::NotFound)
    }

    async fn delete_article(&self, id: ArticleId) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            DELETE FROM articles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
