use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use log_archive::context::{
    KEY_EXECID, KEY_JOB_GROUP, KEY_JOB_ID, KEY_JOB_NAME, KEY_PROJECT, KEY_SERVER_URL,
    KEY_SERVER_UUID, KEY_URL, KEY_USERNAME,
};
use log_archive::{ArchiveConfig, ArchiveStorageAdapter, ExecutionContext};
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variables carrying the execution context for one run.
const CONTEXT_ENV: [(&str, &str); 9] = [
    ("JOB_EXECID", KEY_EXECID),
    ("JOB_PROJECT", KEY_PROJECT),
    ("JOB_ID", KEY_JOB_ID),
    ("JOB_NAME", KEY_JOB_NAME),
    ("JOB_GROUP", KEY_JOB_GROUP),
    ("JOB_USERNAME", KEY_USERNAME),
    ("JOB_URL", KEY_URL),
    ("JOB_SERVER_URL", KEY_SERVER_URL),
    ("JOB_SERVER_UUID", KEY_SERVER_UUID),
];

#[tokio::main]
async fn main() -> Result<()> {
    let config = ArchiveConfig::load().context("Failed to load configuration")?;

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (action, file_type) = match (args.first(), args.get(1)) {
        (Some(action), Some(file_type)) => (action.as_str(), file_type.as_str()),
        _ => bail!("usage: log-archive <store|retrieve|state|delete> <filetype> [file]"),
    };

    let context = execution_context_from_env();
    let storage = ArchiveStorageAdapter::new(config)
        .initialize(context)
        .await
        .context("Failed to initialize archive storage")?;

    info!(base_path = storage.base_path(), "archive storage ready");

    match action {
        "store" => {
            let Some(path) = args.get(2) else {
                bail!("store requires a source file argument")
            };
            let attributes = tokio::fs::metadata(path)
                .await
                .with_context(|| format!("cannot stat {path}"))?;
            let modified: DateTime<Utc> = attributes
                .modified()
                .map(DateTime::from)
                .unwrap_or_else(|_| Utc::now());
            let mut file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("cannot open {path}"))?;

            storage
                .store(file_type, &mut file, attributes.len(), modified)
                .await?;
            info!(file_type, "stored");
        }
        "retrieve" => {
            let Some(path) = args.get(2) else {
                bail!("retrieve requires a destination file argument")
            };
            let mut file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("cannot create {path}"))?;

            storage.retrieve(file_type, &mut file).await?;
            file.flush().await?;
            info!(file_type, "retrieved");
        }
        "state" => {
            let available = storage.is_available(file_type).await?;
            println!("available: {available}");
        }
        "delete" => {
            storage.delete(file_type).await?;
            info!(file_type, "deleted");
        }
        other => bail!("unknown action: {other}"),
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();
}

/// Collect the execution context the host exported into the environment.
fn execution_context_from_env() -> ExecutionContext {
    let mut context = ExecutionContext::new();
    for (variable, key) in CONTEXT_ENV {
        if let Ok(value) = std::env::var(variable) {
            context = context.with(key, value);
        }
    }
    context
}
