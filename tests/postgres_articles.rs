//! Postgres store checks. These need a server reachable through `DATABASE_URL`,
//! so they are ignored by default: `cargo test -- --ignored`.

use std::sync::Arc;

use bytes::Bytes;
use geeoh::application::articles::{ArticleService, MediaUpload, PublishArticleCommand};
use geeoh::application::repos::{
    ARTICLES_PKEY, ARTICLES_TITLE_KEY, ArticlesRepo, ArticlesWriteRepo, NewArticleParams,
    UpdateArticleParams,
};
use geeoh::domain::accounts::Operator;
use geeoh::domain::article_id::ArticleId;
use geeoh::infra::db::PostgresRepositories;
use geeoh::infra::media::MediaStorage;
use sqlx::PgPool;
use tempfile::TempDir;
use time::macros::date;

fn image(name: &str) -> MediaUpload {
    MediaUpload {
        filename: name.to_string(),
        data: Bytes::from_static(b"image bytes"),
    }
}

fn params(sequence: u8, title: &str) -> NewArticleParams {
    let date = date!(2024 - 03 - 09);
    NewArticleParams {
        id: ArticleId::compose(date, sequence).expect("id"),
        date,
        title: title.to_string(),
        description: "Summary".to_string(),
        content: "Body".to_string(),
        thumb: None,
        banner: None,
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn insert_rejects_duplicate_ids_and_titles(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    repos.insert_article(params(1, "One")).await.expect("insert");

    let err = repos
        .insert_article(params(1, "Other"))
        .await
        .expect_err("duplicate id");
    assert!(err.is_duplicate_of(ARTICLES_PKEY), "{err:?}");

    let err = repos
        .insert_article(params(2, "One"))
        .await
        .expect_err("duplicate title");
    assert!(err.is_duplicate_of(ARTICLES_TITLE_KEY), "{err:?}");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn ids_are_listed_per_day_and_newest_first(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    repos.insert_article(params(1, "One")).await.expect("one");
    repos.insert_article(params(2, "Two")).await.expect("two");

    let (low, high) = ArticleId::day_bounds(date!(2024 - 03 - 09)).expect("bounds");
    let ids: Vec<i32> = repos
        .list_ids_between(low, high)
        .await
        .expect("ids")
        .into_iter()
        .map(ArticleId::get)
        .collect();
    assert_eq!(ids, vec![24030901, 24030902]);

    let listed: Vec<i32> = repos
        .list_articles()
        .await
        .expect("list")
        .into_iter()
        .map(|article| article.id.get())
        .collect();
    assert_eq!(listed, vec![24030902, 24030901]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn update_keeps_media_when_none_is_supplied(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let mut first = params(1, "One");
    first.thumb = Some("24030901/thumb.png".to_string());
    repos.insert_article(first).await.expect("insert");

    let updated = repos
        .update_article(UpdateArticleParams {
            id: params(1, "One").id,
            title: "Renamed".to_string(),
            description: "New summary".to_string(),
            content: "New body".to_string(),
            thumb: None,
            banner: Some("24030901/banner.jpg".to_string()),
        })
        .await
        .expect("update");

    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.thumb.as_deref(), Some("24030901/thumb.png"));
    assert_eq!(updated.banner.as_deref(), Some("24030901/banner.jpg"));
    assert_eq!(updated.date, date!(2024 - 03 - 09));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn concurrent_publishes_never_share_an_id(pool: PgPool) {
    let dir = TempDir::new().expect("temp dir");
    let media = Arc::new(MediaStorage::new(dir.path().to_path_buf()).expect("media"));
    let operator = Operator {
        id: 1,
        username: "geeoh".to_string(),
    };

    // separate services share only the database, like separate processes
    let mut handles = Vec::new();
    for n in 0..8 {
        let repos = Arc::new(PostgresRepositories::new(pool.clone()));
        let service = ArticleService::new(repos.clone(), repos, media.clone());
        let operator = operator.clone();
        handles.push(tokio::spawn(async move {
            service
                .publish_on(
                    &operator,
                    date!(2024 - 03 - 09),
                    PublishArticleCommand {
                        title: format!("Post {n}"),
                        description: "Summary".to_string(),
                        content: "Body".to_string(),
                        thumb: Some(image("thumb.png")),
                        banner: Some(image("banner.png")),
                        attachments: Vec::new(),
                    },
                )
                .await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let article = handle.await.expect("task").expect("every publish succeeds");
        ids.push(article.id.get());
    }

    ids.sort_unstable();
    assert_eq!(ids, (24030901..=24030908).collect::<Vec<i32>>());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn delete_frees_the_id(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let id = params(1, "One").id;
    repos.insert_article(params(1, "One")).await.expect("insert");

    repos.delete_article(id).await.expect("delete");
    assert!(repos.find_by_id(id).await.expect("lookup").is_none());
    repos.delete_article(id).await.expect("deleting again is fine");

    repos
        .insert_article(params(1, "One"))
        .await
        .expect("id and title are free again");
}
