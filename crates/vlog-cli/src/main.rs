//! Operator CLI (§6): a thin client over the Coordinator's Admin, Public and
//! Worker API surfaces, plus direct Catalog access for `settings
//! migrate-from-env`, which is meant to run before the Coordinator is
//! trusted to be up.
//!
//! Exit codes: `0` success, `1` user/transport error, `2` validation.

mod client;
mod error;
mod settings_migrate;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use client::CoordinatorClient;
use error::CliError;

#[derive(Parser)]
#[command(name = "vlog", version, about = "Operator CLI for the vlog transcoding pipeline")]
struct Cli {
    /// Base URL of the Coordinator's HTTP API.
    #[arg(long, env = "VLOG_COORDINATOR_URL", default_value = "http://localhost:8080")]
    coordinator_url: String,

    /// Shared admin secret, sent as `X-Admin-Secret`. Falls back to `ADMIN_SECRET`.
    #[arg(long, env = "ADMIN_SECRET")]
    admin_secret: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a source file and enqueue it for transcoding.
    Upload {
        /// Path to the local source video file.
        file: PathBuf,
        #[arg(long)]
        slug: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "hls_ts")]
        streaming_format: String,
    },
    /// List videos.
    List {
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// List public video categories.
    Categories,
    /// Soft-delete a video.
    Delete { video_id: uuid::Uuid },
    /// Download a video's source file to a local path.
    Download { video_id: uuid::Uuid, out: PathBuf },
    #[command(subcommand)]
    Worker(WorkerCommand),
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand)]
enum WorkerCommand {
    /// Register a new worker and print its issued API key.
    Register {
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "remote")]
        worker_type: String,
    },
    /// List registered workers.
    List,
    /// Show one worker's status.
    Status { worker_id: uuid::Uuid },
    /// Revoke a worker's registration.
    Revoke { worker_id: uuid::Uuid },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Seed known settings from their env-var fallbacks (runs against the
    /// Catalog directly; requires `DATABASE_URL`).
    MigrateFromEnv,
    /// List settings in a category.
    List {
        #[arg(long)]
        category: String,
    },
    /// Get one setting by key.
    Get { key: String },
    /// Set one setting's value (JSON, e.g. `'{"type":"int","value":6}'`).
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let client = CoordinatorClient::new(cli.coordinator_url, cli.admin_secret);

    match cli.command {
        Command::Upload { file, slug, title, streaming_format } => {
            upload(&client, &file, &slug, &title, &streaming_format).await
        }
        Command::List { limit, offset } => {
            let videos: Value = client.get_json(&format!("/api/admin/videos?limit={limit}&offset={offset}")).await?;
            println!("{}", serde_json::to_string_pretty(&videos).unwrap());
            Ok(())
        }
        Command::Categories => {
            let categories: Value = client.get_json("/api/categories").await?;
            println!("{}", serde_json::to_string_pretty(&categories).unwrap());
            Ok(())
        }
        Command::Delete { video_id } => {
            client.delete(&format!("/api/admin/videos/{video_id}")).await?;
            eprintln!("deleted {video_id}");
            Ok(())
        }
        Command::Download { video_id, out } => download(&client, video_id, &out).await,
        Command::Worker(cmd) => worker_command(&client, cmd).await,
        Command::Settings(cmd) => settings_command(&client, cmd).await,
    }
}

async fn upload(
    client: &CoordinatorClient,
    file: &PathBuf,
    slug: &str,
    title: &str,
    streaming_format: &str,
) -> Result<(), CliError> {
    if !vlog_models::slug::is_valid_slug(slug) {
        return Err(CliError::Validation(format!("invalid slug: {slug}")));
    }

    let video: Value = client
        .post_json(
            "/api/admin/videos",
            &json!({ "slug": slug, "title": title, "streaming_format": streaming_format }),
        )
        .await?;
    let video_id = video.get("id").and_then(|v| v.as_str()).ok_or_else(|| CliError::Transport("missing video id".into()))?;

    let video_uuid: uuid::Uuid = video_id.parse().map_err(|_| CliError::Transport("invalid video id".into()))?;
    let storage = vlog_storage::R2Client::from_env().await.map_err(|e| CliError::Transport(e.to_string()))?;
    let source_key = vlog_storage::operations::source_key(video_uuid.into());
    storage.upload_file(file, &source_key, "application/octet-stream").await.map_err(|e| CliError::Transport(e.to_string()))?;

    let job: Value = client.post_empty(&format!("/api/admin/videos/{video_id}/retranscode")).await?;
    eprintln!("uploaded {slug} as {video_id}, job {}", job.get("job_id").and_then(|j| j.as_str()).unwrap_or("?"));
    Ok(())
}

async fn download(client: &CoordinatorClient, video_id: uuid::Uuid, out: &PathBuf) -> Result<(), CliError> {
    let _video: Value = client.get_json(&format!("/api/admin/videos/{video_id}")).await?;
    let storage = vlog_storage::R2Client::from_env().await.map_err(|e| CliError::Transport(e.to_string()))?;
    let source_key = vlog_storage::operations::source_key(video_id.into());
    storage.download_file(&source_key, out).await.map_err(|e| CliError::Transport(e.to_string()))?;
    eprintln!("downloaded {video_id} to {}", out.display());
    Ok(())
}

async fn worker_command(client: &CoordinatorClient, cmd: WorkerCommand) -> Result<(), CliError> {
    match cmd {
        WorkerCommand::Register { name, worker_type } => {
            let resp: Value =
                client.post_json("/api/worker/register", &json!({ "worker_name": name, "worker_type": worker_type })).await?;
            println!("{}", serde_json::to_string_pretty(&resp).unwrap());
            Ok(())
        }
        WorkerCommand::List => {
            let workers: Value = client.get_json("/api/admin/workers").await?;
            println!("{}", serde_json::to_string_pretty(&workers).unwrap());
            Ok(())
        }
        WorkerCommand::Status { worker_id } => {
            let worker: Value = client.get_json(&format!("/api/admin/workers/{worker_id}")).await?;
            println!("{}", serde_json::to_string_pretty(&worker).unwrap());
            Ok(())
        }
        WorkerCommand::Revoke { worker_id } => {
            client.delete(&format!("/api/admin/workers/{worker_id}")).await?;
            eprintln!("revoked {worker_id}");
            Ok(())
        }
    }
}

async fn settings_command(client: &CoordinatorClient, cmd: SettingsCommand) -> Result<(), CliError> {
    match cmd {
        SettingsCommand::MigrateFromEnv => {
            let config = vlog_catalog::CatalogConfig::from_env()?;
            let pool = vlog_catalog::connect(&config).await?;
            let settings = vlog_catalog::SettingsService::new(pool, std::time::Duration::from_secs(30));
            let migrated = settings_migrate::migrate_from_env(&settings).await?;
            eprintln!("migrated {migrated} setting(s) from environment");
            Ok(())
        }
        SettingsCommand::List { category } => {
            let settings: Value = client.get_json(&format!("/api/admin/settings?category={category}")).await?;
            println!("{}", serde_json::to_string_pretty(&settings).unwrap());
            Ok(())
        }
        SettingsCommand::Get { key } => {
            let setting: Value = client.get_json(&format!("/api/admin/settings/{key}")).await?;
            println!("{}", serde_json::to_string_pretty(&setting).unwrap());
            Ok(())
        }
        SettingsCommand::Set { key, value } => {
            let parsed: Value = serde_json::from_str(&value).map_err(|e| CliError::Validation(e.to_string()))?;
            let setting: Value = client.patch_json(&format!("/api/admin/settings/{key}"), &json!({ "value": parsed })).await?;
            println!("{}", serde_json::to_string_pretty(&setting).unwrap());
            Ok(())
        }
    }
}
