//! Copying article content between storage backends.

use tracing::{info, warn};

use crate::application::error::AppError;
use crate::application::repos::{ArticlesRepo, ArticlesWriteRepo, NewArticleParams, RepoError};
use crate::infra::error::InfraError;

/// Outcome of [`import_articles`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Copy every article from `source` into `target`, keeping ids and dates.
/// Articles whose id or title already exists in `target` are skipped.
pub async fn import_articles(
    source: &dyn ArticlesRepo,
    target: &dyn ArticlesWriteRepo,
) -> Result<ImportSummary, AppError> {
    let summaries = source.list_articles().await.map_err(repo_failure)?;
    let mut summary = ImportSummary::default();

    // oldest first so ids land in creation order
    for entry in summaries.into_iter().rev() {
        let Some(article) = source.find_by_id(entry.id).await.map_err(repo_failure)? else {
            warn!(
                target = "geeoh::import",
                article_id = %entry.id,
                "indexed article has no content; skipping"
            );
            summary.skipped += 1;
            continue;
        };

        let params = NewArticleParams {
            id: article.id,
            date: article.date,
            title: article.title,
            description: article.description,
            content: article.content,
            thumb: article.thumb,
            banner: article.banner,
        };

        match target.insert_article(params).await {
            Ok(_) => summary.imported += 1,
            Err(RepoError::Duplicate { constraint }) => {
                warn!(
                    target = "geeoh::import",
                    article_id = %entry.id,
                    constraint = %constraint,
                    "article already present; skipping"
                );
                summary.skipped += 1;
            }
            Err(err) => return Err(repo_failure(err)),
        }
    }

    info!(
        target = "geeoh::import",
        imported = summary.imported,
        skipped = summary.skipped,
        "article import finished"
    );
    Ok(summary)
}

fn repo_failure(err: RepoError) -> AppError {
    AppError::from(InfraError::database(err.to_string()))
}
