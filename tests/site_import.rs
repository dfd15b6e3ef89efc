use geeoh::application::repos::{ArticlesRepo, ArticlesWriteRepo, NewArticleParams};
use geeoh::application::site::{ImportSummary, import_articles};
use geeoh::domain::article_id::ArticleId;
use geeoh::infra::flatfile::FlatFileRepositories;
use tempfile::TempDir;
use time::macros::date;

fn params(sequence: u8, title: &str) -> NewArticleParams {
    let date = date!(2024 - 03 - 09);
    NewArticleParams {
        id: ArticleId::compose(date, sequence).expect("id"),
        date,
        title: title.to_string(),
        description: "Summary".to_string(),
        content: format!("# {title}"),
        thumb: Some(format!("2403090{sequence}/thumb.png")),
        banner: None,
    }
}

#[tokio::test]
async fn import_keeps_ids_and_skips_existing_articles() {
    let dir = TempDir::new().expect("temp dir");
    let source = FlatFileRepositories::open(dir.path().join("source")).expect("source");
    let target = FlatFileRepositories::open(dir.path().join("target")).expect("target");

    source.insert_article(params(1, "One")).await.expect("one");
    source.insert_article(params(2, "Two")).await.expect("two");
    target
        .insert_article(params(1, "One"))
        .await
        .expect("already imported");

    let summary = import_articles(&source, &target).await.expect("import");
    assert_eq!(
        summary,
        ImportSummary {
            imported: 1,
            skipped: 1,
        }
    );

    let imported = target
        .find_by_id(params(2, "Two").id)
        .await
        .expect("lookup")
        .expect("present");
    assert_eq!(imported.title, "Two");
    assert_eq!(imported.date, date!(2024 - 03 - 09));
    assert_eq!(imported.content, "# Two");
    assert_eq!(imported.thumb.as_deref(), Some("24030902/thumb.png"));

    let ids: Vec<i32> = target
        .list_articles()
        .await
        .expect("list")
        .into_iter()
        .map(|article| article.id.get())
        .collect();
    assert_eq!(ids, vec![24030902, 24030901]);
}
