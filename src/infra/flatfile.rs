//! Flat-file article store: a JSON index plus one markdown file per article.
//!
//! Layout under the root directory:
//!
//! ```text
//! index.json      {"articles": [...]}, newest first
//! {id}.md         markdown body of article {id}
//! ```
//!
//! Writers are serialized by an async mutex and every file is replaced
//! atomically through a temporary file in the same directory, so readers never
//! observe a half-written index.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use time::Date;
use tokio::{fs, sync::Mutex};

use crate::application::repos::{
    ARTICLES_PKEY, ARTICLES_TITLE_KEY, ArticlesRepo, ArticlesWriteRepo, NewArticleParams,
    RepoError, UpdateArticleParams,
};
use crate::domain::article_id::ArticleId;
use crate::domain::entities::{Article, ArticleSummary};

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    #[serde(default)]
    articles: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    id: ArticleId,
    #[serde(with = "index_date")]
    date: Date,
    title: String,
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thumb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    banner: Option<String>,
    // older indexes inlined the body; read it when the markdown file is missing
    #[serde(default, skip_serializing)]
    content: Option<String>,
}

impl From<&IndexEntry> for ArticleSummary {
    fn from(entry: &IndexEntry) -> Self {
        Self {
            id: entry.id,
            date: entry.date,
            title: entry.title.clone(),
            description: entry.description.clone(),
            thumb: entry.thumb.clone(),
            banner: entry.banner.clone(),
        }
    }
}

mod index_date {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use time::{Date, Month};

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!(
            "{:04}-{:02}-{:02}",
            date.year(),
            u8::from(date.month()),
            date.day()
        ))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid index date `{raw}`")))
    }

    /// Accepts both `2024-03-09` and the unpadded `2024-3-9`.
    pub(super) fn parse(raw: &str) -> Option<Date> {
        let mut parts = raw.trim().splitn(3, '-');
        let year: i32 = parts.next()?.parse().ok()?;
        let month: u8 = parts.next()?.parse().ok()?;
        let day: u8 = parts.next()?.parse().ok()?;
        Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
    }
}

#[derive(Clone)]
pub struct FlatFileRepositories {
    root: Arc<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl FlatFileRepositories {
    /// Open the store rooted at `root`, creating the directory if necessary.
    pub fn open(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root: Arc::new(root),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn content_path(&self, id: ArticleId) -> PathBuf {
        self.root.join(format!("{id}.md"))
    }

    async fn load_index(&self) -> Result<IndexFile, RepoError> {
        let raw = match fs::read(self.index_path()).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(IndexFile::default());
            }
            Err(err) => return Err(RepoError::from_persistence(err)),
        };

        serde_json::from_slice(&raw).map_err(|err| RepoError::Integrity {
            message: format!("{INDEX_FILE} is not a valid article index: {err}"),
        })
    }

    async fn store_index(&self, mut index: IndexFile) -> Result<(), RepoError> {
        index.articles.sort_by(|a, b| b.id.cmp(&a.id));
        let encoded = serde_json::to_vec_pretty(&index).map_err(RepoError::from_persistence)?;
        self.replace_file(self.index_path(), encoded).await
    }

    async fn replace_file(&self, target: PathBuf, contents: Vec<u8>) -> Result<(), RepoError> {
        let directory = self.root.as_ref().clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut file = NamedTempFile::new_in(&directory)?;
            file.write_all(&contents)?;
            file.as_file().sync_all()?;
            file.persist(&target).map_err(|err| err.error)?;
            Ok(())
        })
        .await
        .map_err(RepoError::from_persistence)?
        .map_err(RepoError::from_persistence)
    }

    async fn read_content(&self, entry: &IndexEntry) -> Result<String, RepoError> {
        match fs::read_to_string(self.content_path(entry.id)).await {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                entry.content.clone().ok_or_else(|| RepoError::Integrity {
                    message: format!("article {} has no markdown file", entry.id),
                })
            }
            Err(err) => Err(RepoError::from_persistence(err)),
        }
    }
}

#[async_trait]
impl ArticlesRepo for FlatFileRepositories {
    async fn list_articles(&self) -> Result<Vec<ArticleSummary>, RepoError> {
        let index = self.load_index().await?;
        let mut articles: Vec<ArticleSummary> =
            index.articles.iter().map(ArticleSummary::from).collect();
        articles.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(articles)
    }

    async fn list_ids_between(
        &self,
        low: ArticleId,
        high: ArticleId,
    ) -> Result<BTreeSet<ArticleId>, RepoError> {
        let index = self.load_index().await?;
        Ok(index
            .articles
            .iter()
            .map(|entry| entry.id)
            .filter(|id| (low..=high).contains(id))
            .collect())
    }

    async fn find_by_id(&self, id: ArticleId) -> Result<Option<Article>, RepoError> {
        let index = self.load_index().await?;
        let Some(entry) = index.articles.iter().find(|entry| entry.id == id) else {
            return Ok(None);
        };

        let content = self.read_content(entry).await?;
        Ok(Some(Article::from_summary(
            ArticleSummary::from(entry),
            content,
        )))
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        let metadata = fs::metadata(self.root.as_ref())
            .await
            .map_err(RepoError::from_persistence)?;
        if !metadata.is_dir() {
            return Err(RepoError::Integrity {
                message: format!("{} is not a directory", self.root.display()),
            });
        }
        self.load_index().await.map(|_| ())
    }
}

#[async_trait]
impl ArticlesWriteRepo for FlatFileRepositories {
    async fn insert_article(&self, params: NewArticleParams) -> Result<Article, RepoError> {
        let _guard = self.write_lock.lock().await;
        let mut index = self.load_index().await?;

        if index.articles.iter().any(|entry| entry.id == params.id) {
            return Err(RepoError::duplicate(ARTICLES_PKEY));
        }
        if index.articles.iter().any(|entry| entry.title == params.title) {
            return Err(RepoError::duplicate(ARTICLES_TITLE_KEY));
        }

        let article = params.into_article();
        self.replace_file(
            self.content_path(article.id),
            article.content.clone().into_bytes(),
        )
        .await?;

        index.articles.push(IndexEntry {
            id: article.id,
            date: article.date,
            title: article.title.clone(),
            description: article.description.clone(),
            thumb: article.thumb.clone(),
            banner: article.banner.clone(),
            content: None,
        });
        self.store_index(index).await?;

        Ok(article)
    }

    async fn update_article(&self, params: UpdateArticleParams) -> Result<Article, RepoError> {
        let _guard = self.write_lock.lock().await;
        let mut index = self.load_index().await?;

        if index
            .articles
            .iter()
            .any(|entry| entry.id != params.id && entry.title == params.title)
        {
            return Err(RepoError::duplicate(ARTICLES_TITLE_KEY));
        }

        let entry = index
            .articles
            .iter_mut()
            .find(|entry| entry.id == params.id)
            .ok_or(RepoError::NotFound)?;

        entry.title = params.title;
        entry.description = params.description;
        entry.content = None;
        if params.thumb.is_some() {
            entry.thumb = params.thumb;
        }
        if params.banner.is_some() {
            entry.banner = params.banner;
        }
        let summary = ArticleSummary::from(&*entry);

        self.replace_file(
            self.content_path(params.id),
            params.content.clone().into_bytes(),
        )
        .await?;
        self.store_index(index).await?;

        Ok(Article::from_summary(summary, params.content))
    }

    async fn delete_article(&self, id: ArticleId) -> Result<(), RepoError> {
        let _guard = self.write_lock.lock().await;
        let mut index = self.load_index().await?;

        let before = index.articles.len();
        index.articles.retain(|entry| entry.id != id);
        if index.articles.len() != before {
            self.store_index(index).await?;
        }

        match fs::remove_file(self.content_path(id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(RepoError::from_persistence(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use time::macros::date;

    use super::*;

    fn params(id: i32, title: &str) -> NewArticleParams {
        let id = ArticleId::from_raw(id).expect("id");
        NewArticleParams {
            id,
            date: id.date().expect("date"),
            title: title.to_string(),
            description: "About it".to_string(),
            content: format!("# {title}"),
            thumb: Some(format!("{id}/thumb.png")),
            banner: None,
        }
    }

    fn open() -> (TempDir, FlatFileRepositories) {
        let dir = TempDir::new().expect("tempdir");
        let repo = FlatFileRepositories::open(dir.path().join("articles")).expect("open");
        (dir, repo)
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let (_dir, repo) = open();
        assert!(repo.list_articles().await.expect("list").is_empty());
        repo.health_check().await.expect("healthy");
    }

    #[tokio::test]
    async fn inserted_articles_round_trip() {
        let (_dir, repo) = open();
        repo.insert_article(params(24030901, "First"))
            .await
            .expect("insert");
        repo.insert_article(params(24031001, "Second"))
            .await
            .expect("insert");

        let listed: Vec<i32> = repo
            .list_articles()
            .await
            .expect("list")
            .iter()
            .map(|a| a.id.get())
            .collect();
        assert_eq!(listed, vec![24031001, 24030901]);

        let article = repo
            .find_by_id(ArticleId::from_raw(24030901).expect("id"))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(article.content, "# First");
        assert_eq!(article.date, date!(2024 - 03 - 09));
        assert_eq!(article.thumb.as_deref(), Some("24030901/thumb.png"));
        assert!(repo.root().join("24030901.md").exists());
    }

    #[tokio::test]
    async fn duplicate_ids_and_titles_are_rejected() {
        let (_dir, repo) = open();
        repo.insert_article(params(24030901, "First"))
            .await
            .expect("insert");

        let err = repo
            .insert_article(params(24030901, "Other"))
            .await
            .expect_err("duplicate id");
        assert!(err.is_duplicate_of(ARTICLES_PKEY));

        let err = repo
            .insert_article(params(24030902, "First"))
            .await
            .expect_err("duplicate title");
        assert!(err.is_duplicate_of(ARTICLES_TITLE_KEY));
    }

    #[tokio::test]
    async fn ids_between_only_covers_the_range() {
        let (_dir, repo) = open();
        for (id, title) in [(24030901, "a"), (24030902, "b"), (24031001, "c")] {
            repo.insert_article(params(id, title)).await.expect("insert");
        }

        let (low, high) = ArticleId::day_bounds(date!(2024 - 03 - 09)).expect("bounds");
        let ids: Vec<i32> = repo
            .list_ids_between(low, high)
            .await
            .expect("ids")
            .into_iter()
            .map(ArticleId::get)
            .collect();
        assert_eq!(ids, vec![24030901, 24030902]);
    }

    #[tokio::test]
    async fn update_rewrites_body_and_keeps_media() {
        let (_dir, repo) = open();
        repo.insert_article(params(24030901, "First"))
            .await
            .expect("insert");

        let id = ArticleId::from_raw(24030901).expect("id");
        let updated = repo
            .update_article(UpdateArticleParams {
                id,
                title: "Renamed".into(),
                description: "Changed".into(),
                content: "new body".into(),
                thumb: None,
                banner: Some(format!("{id}/banner.jpg")),
            })
            .await
            .expect("update");

        assert_eq!(updated.thumb.as_deref(), Some("24030901/thumb.png"));
        assert_eq!(updated.banner.as_deref(), Some("24030901/banner.jpg"));
        let stored = repo.find_by_id(id).await.expect("find").expect("present");
        assert_eq!(stored.title, "Renamed");
        assert_eq!(stored.content, "new body");
    }

    #[tokio::test]
    async fn update_of_missing_article_is_not_found() {
        let (_dir, repo) = open();
        let err = repo
            .update_article(UpdateArticleParams {
                id: ArticleId::from_raw(24030901).expect("id"),
                title: "x".into(),
                description: "y".into(),
                content: "z".into(),
                thumb: None,
                banner: None,
            })
            .await
            .expect_err("missing");
        assert!(matches!(err, RepoError::NotFound));
    }

    #[tokio::test]
    async fn reads_unpadded_dates_and_inline_content() {
        let (_dir, repo) = open();
        let legacy = r#"{"articles": [
            {"id": 24030901, "date": "2024-3-9", "title": "Old", "description": "Legacy",
             "content": "inline body"}
        ]}"#;
        std::fs::write(repo.root().join(INDEX_FILE), legacy).expect("write index");

        let article = repo
            .find_by_id(ArticleId::from_raw(24030901).expect("id"))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(article.date, date!(2024 - 03 - 09));
        assert_eq!(article.content, "inline body");
        assert!(article.thumb.is_none());
    }

    #[tokio::test]
    async fn delete_removes_entry_and_body() {
        let (_dir, repo) = open();
        let id = ArticleId::from_raw(24030901).expect("id");
        repo.insert_article(params(24030901, "First"))
            .await
            .expect("insert");
        repo.insert_article(params(24030902, "Second"))
            .await
            .expect("insert");

        repo.delete_article(id).await.expect("delete");
        assert!(repo.find_by_id(id).await.expect("find").is_none());
        assert!(!repo.root().join("24030901.md").exists());
        assert_eq!(repo.list_articles().await.expect("list").len(), 1);

        repo.delete_article(id).await.expect("deleting again is fine");
        repo.insert_article(params(24030901, "First"))
            .await
            .expect("id and title are free again");
    }

    #[tokio::test]
    async fn keeps_unpadded_legacy_ids() {
        let (_dir, repo) = open();
        let legacy = r#"{"articles": [
            {"id": 243901, "date": "2024-3-9", "title": "Old", "description": "Legacy"}
        ]}"#;
        std::fs::write(repo.root().join(INDEX_FILE), legacy).expect("write index");
        std::fs::write(repo.root().join("243901.md"), "legacy body").expect("write body");

        let id: ArticleId = "243901".parse().expect("lookup key");
        let article = repo
            .find_by_id(id)
            .await
            .expect("find")
            .expect("present");
        assert_eq!(article.content, "legacy body");
        assert_eq!(article.date, date!(2024 - 03 - 09));
    }

    #[test]
    fn index_dates_parse_strictly() {
        assert_eq!(index_date::parse("2024-03-09"), Some(date!(2024 - 03 - 09)));
        assert_eq!(index_date::parse("2024-2-30"), None);
        assert_eq!(index_date::parse("yesterday"), None);
    }
}
