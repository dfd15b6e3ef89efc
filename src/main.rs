use std::{future::Future, io, process, sync::Arc};

use geeoh::{
    application::{
        articles::ArticleService,
        auth::{AuthService, hash_password},
        chrome::ChromeService,
        error::AppError,
        repos::{ArticlesRepo, ArticlesWriteRepo},
        site,
    },
    config::{self, StorageBackend},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        flatfile::FlatFileRepositories,
        http::{self, HttpState},
        media::MediaStorage,
        telemetry,
    },
};
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::HashPassword(args) => {
            println!("{}", hash_password(&settings.auth.secret_key, &args.password));
            Ok(())
        }
        config::Command::ImportFlatfile(_) => run_import_flatfile(settings).await,
    }
}

type ArticleStores = (Arc<dyn ArticlesRepo>, Arc<dyn ArticlesWriteRepo>);

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (reader, writer) = init_stores(&settings).await?;

    let media = Arc::new(
        MediaStorage::new(settings.media.directory.clone())
            .map_err(|err| AppError::from(InfraError::from(err)))?,
    );
    let session_ttl = time::Duration::try_from(settings.auth.session_ttl).map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "session ttl out of range: {err}"
        )))
    })?;
    let upload_limit_bytes = usize::try_from(settings.media.max_request_bytes.get())
        .map_err(|_| InfraError::configuration("media.max_request_bytes exceeds usize"))
        .map_err(AppError::from)?;

    if settings.auth.accounts.is_empty() {
        warn!(
            target = "geeoh::serve",
            "no operator accounts configured; publishing is disabled"
        );
    }

    let state = HttpState {
        articles: Arc::new(ArticleService::new(reader, writer, media.clone())),
        auth: Arc::new(AuthService::new(
            &settings.auth.secret_key,
            settings.auth.accounts.clone(),
            session_ttl,
        )),
        chrome: Arc::new(ChromeService::new(
            &settings.site.title,
            settings.site.mottos.clone(),
        )),
        media,
        cookie_key: http::cookie_key(&settings.auth.secret_key),
        upload_limit_bytes,
    };

    serve_http(&settings, state).await
}

async fn run_import_flatfile(settings: config::Settings) -> Result<(), AppError> {
    let directory = settings.storage.flatfile_directory.clone();
    info!(
        target = "geeoh::import",
        source = %directory.display(),
        "Starting flat-file import"
    );

    let source = open_flatfile(&settings)?;
    let target = init_postgres(&settings).await?;

    let summary = site::import_articles(&source, &target).await?;
    info!(
        target = "geeoh::import",
        imported = summary.imported,
        skipped = summary.skipped,
        "Import completed"
    );
    Ok(())
}

async fn init_stores(settings: &config::Settings) -> Result<ArticleStores, AppError> {
    match settings.storage.backend {
        StorageBackend::Postgres => {
            let repositories = Arc::new(init_postgres(settings).await?);
            let reader: Arc<dyn ArticlesRepo> = repositories.clone();
            let writer: Arc<dyn ArticlesWriteRepo> = repositories;
            Ok((reader, writer))
        }
        StorageBackend::FlatFile => {
            let repositories = Arc::new(open_flatfile(settings)?);
            let reader: Arc<dyn ArticlesRepo> = repositories.clone();
            let writer: Arc<dyn ArticlesWriteRepo> = repositories;
            Ok((reader, writer))
        }
    }
}

async fn init_postgres(settings: &config::Settings) -> Result<PostgresRepositories, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(PostgresRepositories::new(pool))
}

fn open_flatfile(settings: &config::Settings) -> Result<FlatFileRepositories, AppError> {
    FlatFileRepositories::open(settings.storage.flatfile_directory.clone()).map_err(|err| {
        AppError::from(InfraError::storage(format!(
            "failed to open flat-file store at {}: {err}",
            settings.storage.flatfile_directory.display()
        )))
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "geeoh::serve",
        addr = %settings.server.addr,
        backend = ?settings.storage.backend,
        "listening"
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    if let Some(outcome) = wait_for_shutdown(&mut server, tokio::signal::ctrl_c()).await {
        return outcome;
    }

    info!(target = "geeoh::serve", "shutdown requested; draining connections");
    let _ = stop_tx.send(());

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!(
                target = "geeoh::serve",
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out; aborting open connections"
            );
            server.abort();
            Ok(())
        }
    }
}

/// Wait until `signal` asks for a shutdown (`None`) or the server stops on its
/// own. A signal listener that fails to install leaves the server running.
async fn wait_for_shutdown(
    server: &mut JoinHandle<io::Result<()>>,
    signal: impl Future<Output = io::Result<()>>,
) -> Option<Result<(), AppError>> {
    let signal = tokio::select! {
        joined = &mut *server => return Some(server_outcome(joined)),
        signal = signal => signal,
    };

    match signal {
        Ok(()) => None,
        Err(err) => {
            warn!(
                target = "geeoh::serve",
                error = %err,
                "failed to listen for shutdown signal; serving until the server stops"
            );
            Some(server_outcome(server.await))
        }
    }
}

fn server_outcome(
    joined: Result<io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn failed_signal_listener_keeps_serving() {
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let mut server = tokio::spawn(async move {
            let _ = release_rx.await;
            Ok::<(), io::Error>(())
        });

        let waiting = tokio::spawn(async move {
            wait_for_shutdown(&mut server, async { Err(io::Error::other("no handler")) }).await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());

        release_tx.send(()).expect("server still running");
        let outcome = waiting.await.expect("task").expect("server outcome");
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn signal_requests_shutdown() {
        let mut server = tokio::spawn(std::future::pending::<io::Result<()>>());

        let outcome = wait_for_shutdown(&mut server, async { Ok(()) }).await;

        assert!(outcome.is_none());
        server.abort();
    }
}
