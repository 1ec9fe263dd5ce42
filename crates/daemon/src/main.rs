// foliod: serve the document editor over newline-delimited JSON-RPC on
// stdin/stdout. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use folio_common::patch::PatchParser;
use folio_daemon::config::DaemonConfig;
use folio_daemon::editor::{DocumentEditor, ReadOnlyActors};
use folio_daemon::rpc::methods::RpcServerState;
use folio_daemon::rpc::stdio::serve_stdio;
use folio_daemon::store::meta_db::MetaDb;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "foliod",
    version,
    about = "Document editor with optimistic concurrency over JSON-RPC"
)]
struct Cli {
    /// Config file (default: ~/.folio/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides `[store] path`)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (overrides `[log] filter`)
    #[arg(long)]
    log: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DaemonConfig::load_from(path)
            .with_context(|| format!("failed to load config `{}`", path.display()))?,
        None => DaemonConfig::load().context("failed to load config")?,
    };
    if let Some(db) = cli.db {
        config.store.path = Some(db);
    }
    if let Some(filter) = cli.log {
        config.log.filter = filter;
    }

    init_tracing(&config.log.filter, cli.log_format);

    let db_path = config.store.resolved_path();
    let db = MetaDb::open_with_busy_timeout(&db_path, config.store.busy_timeout())?;
    info!(db = %db_path.display(), "document store opened");

    let mut editor =
        DocumentEditor::new(db).with_parser(PatchParser::new(config.parser.preview_chars));
    let read_only = ReadOnlyActors::new(config.access.read_only_actors.iter().cloned());
    if !read_only.is_empty() {
        editor = editor.with_access_policy(Arc::new(read_only));
    }

    info!("serving json-rpc on stdio");
    serve_stdio(RpcServerState::new(editor)).await.context("json-rpc server failed")
}

fn init_tracing(default_filter: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
