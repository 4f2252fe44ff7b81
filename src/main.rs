use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

mod api;
mod classify;
mod config;
mod contacts;
mod db;
mod emails;
mod enhance;
mod mailer;
mod matcher;
mod shutdown;
mod taxonomy;
mod worker;

use crate::api::apply::{handlers::apply_config, ApplyService, ApplySettings};
use crate::api::health::health_config;
use crate::api::validation;
use crate::db::document_store::{DocumentStore, PgDocumentStore};
use crate::enhance::{DisabledSuggester, OpenAiSuggester, RoleSuggester};
use crate::mailer::{Mailer, ResendMailer};
use crate::shutdown::ShutdownCoordinator;
use crate::worker::SweepWorker;

#[derive(Parser)]
#[command(name = "applystorm", about = "Job-application auto-apply service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server with the background scheduler (default)
    Serve,
    /// Run one all-users apply sweep and exit
    Sweep,
    /// Run one classification pass over untagged postings and exit
    Categorize {
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn init_tracing(log_dir: &str) {
    // File-based logging with daily rotation and level separation, plus a
    // console layer. Files land as logs/info.log.2024-12-22 and so on.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let info_file = tracing_appender::rolling::daily(log_dir, "info.log");
    let warn_file = tracing_appender::rolling::daily(log_dir, "warn.log");
    let error_file = tracing_appender::rolling::daily(log_dir, "error.log");

    let info_layer = tracing_subscriber::fmt::layer()
        .with_writer(info_file)
        .with_ansi(false)
        .with_filter(LevelFilter::INFO);

    let warn_layer = tracing_subscriber::fmt::layer()
        .with_writer(warn_file)
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_file)
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(info_layer)
        .with(warn_layer)
        .with(error_layer)
        .init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = config::Config::from_env().expect("Failed to load configuration");

    std::fs::create_dir_all(&config.log_dir).expect("Failed to create logs directory");
    init_tracing(&config.log_dir);

    let pool = db::connection::get_connection(&config.database_url, config.max_db_connections)
        .await
        .expect("Failed to connect to database");

    info!("Starting applystorm");
    info!("  - HTTP port: {}", config.http_port);
    info!("  - Mailer configured: {}", config.resend_api_key.is_some());
    info!("  - Enhancement service configured: {}", config.openai_api_key.is_some());
    info!("  - Sweep hour (UTC): {}", config.sweep_hour_utc);

    db::migrations::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let store: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(pool.clone()));
    let mailer: Option<Arc<dyn Mailer>> = config
        .resend_api_key
        .clone()
        .map(|key| Arc::new(ResendMailer::new(key)) as Arc<dyn Mailer>);
    let suggester: Arc<dyn RoleSuggester> = match config.openai_api_key.clone() {
        Some(key) => Arc::new(OpenAiSuggester::new(key, config.openai_model.clone())),
        None => Arc::new(DisabledSuggester),
    };
    let service = Arc::new(ApplyService::new(
        store,
        mailer,
        suggester,
        ApplySettings::from_config(&config),
    ));

    match cli.command {
        Some(Command::Sweep) => {
            let summary = service.sweep().await.expect("sweep failed");
            info!(
                "Sweep complete: {} users, {} applications attempted",
                summary.users, summary.attempted
            );
            pool.close().await;
            return Ok(());
        }
        Some(Command::Categorize { limit }) => {
            let updated = service.categorize(limit).await.expect("categorize failed");
            info!("Categorize complete: {} postings tagged", updated);
            pool.close().await;
            return Ok(());
        }
        Some(Command::Serve) | None => {}
    }

    // watch channel lets every worker observe the same shutdown flag
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let sweep_worker = SweepWorker::new(
        service.clone(),
        config.sweep_hour_utc,
        config.categorize_interval_hours,
    );
    let worker_handle = tokio::spawn(async move {
        sweep_worker.run(shutdown_rx).await;
    });
    info!("Spawned sweep worker");

    let server_pool = pool.clone();
    let service_data = web::Data::from(service);
    let max_payload_size = config.max_payload_size;

    let server = HttpServer::new(move || {
        let payload_config = web::PayloadConfig::default().limit(max_payload_size);

        App::new()
            .app_data(web::Data::new(server_pool.clone()))
            .app_data(service_data.clone())
            .app_data(payload_config)
            .app_data(validation::json_config())
            .configure(health_config)
            .configure(apply_config)
    });

    info!("Server starting on http://127.0.0.1:{}", config.http_port);

    let server = server.bind(("127.0.0.1", config.http_port))?.run();
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    let coordinator = ShutdownCoordinator::new(
        server_handle,
        server_task,
        vec![worker_handle],
        shutdown_tx,
        pool,
    );

    coordinator.wait_for_shutdown().await
}
