//! Article publishing, editing and lookup.

use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use time::{Date, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::application::repos::{
    ARTICLES_TITLE_KEY, ArticlesRepo, ArticlesWriteRepo, MediaStorageError, MediaStore,
    NewArticleParams, RepoError, UpdateArticleParams,
};
use crate::domain::accounts::Operator;
use crate::domain::article_id::{AllocationError, ArticleId, MAX_SEQUENCE, allocate_id};
use crate::domain::articles::{
    ArticleDraft, MediaKind, attachment_name, attachment_path, media_path, title_slug,
};
use crate::domain::entities::{Article, ArticleSummary};
use crate::domain::error::DomainError;

/// Insert attempts before a publish gives up. Every lost race fills one more
/// slot of the day, so allocation reports exhaustion before this runs out.
pub const MAX_PUBLISH_ATTEMPTS: usize = MAX_SEQUENCE as usize + 1;

pub(crate) const METRIC_ARTICLES_PUBLISHED: &str = "geeoh_articles_published_total";
pub(crate) const METRIC_ID_COLLISIONS: &str = "geeoh_article_id_collisions_total";

#[derive(Debug, Error)]
pub enum ArticleServiceError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error("article id allocation lost {attempts} races in a row")]
    Contended { attempts: usize },
    #[error("an article titled `{title}` already exists")]
    DuplicateTitle { title: String },
    #[error("article not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Media(#[from] MediaStorageError),
}

/// File received from the operator form.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub filename: String,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct PublishArticleCommand {
    pub title: String,
    pub description: String,
    pub content: String,
    pub thumb: Option<MediaUpload>,
    pub banner: Option<MediaUpload>,
    pub attachments: Vec<MediaUpload>,
}

#[derive(Debug, Clone)]
pub struct UpdateArticleCommand {
    pub id: ArticleId,
    pub title: String,
    pub description: String,
    pub content: String,
    pub thumb: Option<MediaUpload>,
    pub banner: Option<MediaUpload>,
    pub attachments: Vec<MediaUpload>,
}

#[derive(Clone)]
pub struct ArticleService {
    reader: Arc<dyn ArticlesRepo>,
    writer: Arc<dyn ArticlesWriteRepo>,
    media: Arc<dyn MediaStore>,
    publish_lock: Arc<Mutex<()>>,
}

impl ArticleService {
    pub fn new(
        reader: Arc<dyn ArticlesRepo>,
        writer: Arc<dyn ArticlesWriteRepo>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            reader,
            writer,
            media,
            publish_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn list(&self) -> Result<Vec<ArticleSummary>, ArticleServiceError> {
        self.reader
            .list_articles()
            .await
            .map_err(ArticleServiceError::from)
    }

    pub async fn find(&self, id: ArticleId) -> Result<Option<Article>, ArticleServiceError> {
        self.reader
            .find_by_id(id)
            .await
            .map_err(ArticleServiceError::from)
    }

    /// Resolve a title-only link by comparing slugified titles.
    pub async fn find_by_title_slug(
        &self,
        slug: &str,
    ) -> Result<Option<ArticleSummary>, ArticleServiceError> {
        let wanted = title_slug(slug);
        if wanted.is_empty() {
            return Ok(None);
        }

        let articles = self.reader.list_articles().await?;
        Ok(articles
            .into_iter()
            .find(|article| title_slug(&article.title) == wanted))
    }

    pub async fn health_check(&self) -> Result<(), ArticleServiceError> {
        self.reader
            .health_check()
            .await
            .map_err(ArticleServiceError::from)
    }

    /// Publish a new article under today's UTC date.
    pub async fn publish(
        &self,
        actor: &Operator,
        command: PublishArticleCommand,
    ) -> Result<Article, ArticleServiceError> {
        let today = OffsetDateTime::now_utc().date();
        self.publish_on(actor, today, command).await
    }

    /// Publish a new article dated `date`, allocating the smallest free id
    /// for that day and retrying when a concurrent writer takes it first.
    pub async fn publish_on(
        &self,
        actor: &Operator,
        date: Date,
        command: PublishArticleCommand,
    ) -> Result<Article, ArticleServiceError> {
        let draft = ArticleDraft::new(&command.title, &command.description, &command.content)?;
        require_upload("thumb", command.thumb.as_ref())?;
        require_upload("banner", command.banner.as_ref())?;
        validate_attachments(&command.attachments)?;
        let (low, high) = ArticleId::day_bounds(date)?;

        let guard = self.publish_lock.lock().await;
        let mut inserted = None;
        for attempt in 1..=MAX_PUBLISH_ATTEMPTS {
            let existing = self.reader.list_ids_between(low, high).await?;
            let id = allocate_id(date, &existing)?;

            let params = NewArticleParams {
                id,
                date,
                title: draft.title.clone(),
                description: draft.description.clone(),
                content: draft.content.clone(),
                thumb: slot_path(id, MediaKind::Thumb, command.thumb.as_ref()),
                banner: slot_path(id, MediaKind::Banner, command.banner.as_ref()),
            };

            match self.writer.insert_article(params).await {
                Ok(article) => {
                    inserted = Some(article);
                    break;
                }
                Err(err) if err.is_duplicate_of(ARTICLES_TITLE_KEY) => {
                    return Err(ArticleServiceError::DuplicateTitle { title: draft.title });
                }
                Err(RepoError::Duplicate { constraint }) => {
                    counter!(METRIC_ID_COLLISIONS).increment(1);
                    warn!(
                        target = "geeoh::application::articles",
                        article_id = %id,
                        attempt,
                        constraint = %constraint,
                        "article id taken by a concurrent writer; retrying"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        drop(guard);

        let Some(article) = inserted else {
            return Err(ArticleServiceError::Contended {
                attempts: MAX_PUBLISH_ATTEMPTS,
            });
        };

        if let Err(err) = self
            .store_media(
                article.id,
                command.thumb,
                command.banner,
                command.attachments,
            )
            .await
        {
            self.withdraw(article.id).await;
            return Err(err);
        }

        counter!(METRIC_ARTICLES_PUBLISHED).increment(1);
        info!(
            target = "geeoh::application::articles",
            actor = %actor.username,
            article_id = %article.id,
            title = %article.title,
            "article published"
        );

        Ok(article)
    }

    /// Rewrite an article. New media is stored before the row changes, so a
    /// failed upload leaves the published version intact.
    pub async fn update(
        &self,
        actor: &Operator,
        command: UpdateArticleCommand,
    ) -> Result<Article, ArticleServiceError> {
        let draft = ArticleDraft::new(&command.title, &command.description, &command.content)?;
        validate_upload("thumb", command.thumb.as_ref())?;
        validate_upload("banner", command.banner.as_ref())?;
        validate_attachments(&command.attachments)?;
        let id = command.id;

        if self.reader.find_by_id(id).await?.is_none() {
            return Err(ArticleServiceError::NotFound);
        }
        let articles = self.reader.list_articles().await?;
        if articles
            .iter()
            .any(|article| article.id != id && article.title == draft.title)
        {
            return Err(ArticleServiceError::DuplicateTitle { title: draft.title });
        }

        let params = UpdateArticleParams {
            id,
            title: draft.title.clone(),
            description: draft.description,
            content: draft.content,
            thumb: slot_path(id, MediaKind::Thumb, command.thumb.as_ref()),
            banner: slot_path(id, MediaKind::Banner, command.banner.as_ref()),
        };

        self.store_media(
            id,
            command.thumb,
            command.banner,
            command.attachments,
        )
        .await?;

        let article = match self.writer.update_article(params).await {
            Ok(article) => article,
            Err(RepoError::NotFound) => return Err(ArticleServiceError::NotFound),
            Err(err) if err.is_duplicate_of(ARTICLES_TITLE_KEY) => {
                return Err(ArticleServiceError::DuplicateTitle { title: draft.title });
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            target = "geeoh::application::articles",
            actor = %actor.username,
            article_id = %id,
            "article updated"
        );

        Ok(article)
    }

    /// Undo a publish whose media could not be stored. Media goes first: the
    /// id stays reserved until the row is deleted.
    async fn withdraw(&self, id: ArticleId) {
        if let Err(err) = self.media.discard(&id.to_string()).await {
            error!(
                target = "geeoh::application::articles",
                article_id = %id,
                error = %err,
                "failed to remove media of a withdrawn article"
            );
        }

        match self.writer.delete_article(id).await {
            Ok(()) => warn!(
                target = "geeoh::application::articles",
                article_id = %id,
                "article withdrawn after media storage failed"
            ),
            Err(err) => error!(
                target = "geeoh::application::articles",
                article_id = %id,
                error = %err,
                "failed to withdraw article after media storage failed"
            ),
        }
    }

    async fn store_media(
        &self,
        id: ArticleId,
        thumb: Option<MediaUpload>,
        banner: Option<MediaUpload>,
        attachments: Vec<MediaUpload>,
    ) -> Result<(), ArticleServiceError> {
        for (kind, upload) in [(MediaKind::Thumb, thumb), (MediaKind::Banner, banner)] {
            if let Some(upload) = upload {
                let path = media_path(id, kind, &upload.filename);
                self.media.put(&path, upload.data).await?;
            }
        }

        for upload in attachments {
            let path = attachment_path(id, &upload.filename)?;
            self.media.put(&path, upload.data).await?;
        }

        Ok(())
    }
}

fn slot_path(id: ArticleId, kind: MediaKind, upload: Option<&MediaUpload>) -> Option<String> {
    upload.map(|upload| media_path(id, kind, &upload.filename))
}

fn require_upload(field: &'static str, upload: Option<&MediaUpload>) -> Result<(), DomainError> {
    match upload {
        Some(_) => validate_upload(field, upload),
        None => Err(DomainError::validation(field, "an image is required")),
    }
}

fn validate_upload(field: &'static str, upload: Option<&MediaUpload>) -> Result<(), DomainError> {
    match upload {
        Some(upload) if upload.data.is_empty() => Err(DomainError::validation(
            field,
            format!("`{}` is empty", upload.filename),
        )),
        _ => Ok(()),
    }
}

/// Reject bad attachments before an id is allocated.
fn validate_attachments(uploads: &[MediaUpload]) -> Result<(), DomainError> {
    for upload in uploads {
        attachment_name(&upload.filename)?;
        validate_upload("attachments", Some(upload))?;
    }
    Ok(())
}
