use bookgate_core::gateway::{BookLookupGateway, GatewayConfig, GatewayError};
use bookgate_core::store::{BookStore, InMemoryBookStore, JsonFileBookStore};
use bookgate_core::transport::ReqwestTransport;
use bookgate_core::types::{AppConfig, JsonEnvelope};
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const CONFIG_FILE: &str = ".bookgate.toml";

#[derive(Debug, Parser)]
#[command(
    name = "bookgate",
    version,
    about = "Search Google Books and enrich a local book catalog"
)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    InitConfig {
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Free-text volume search.
    Search {
        query: String,
        #[arg(long = "max-results")]
        max_results: Option<u32>,
    },
    /// Search volumes by ISBN.
    Isbn { isbn: String },
    /// Fetch a single volume by its Google Books id.
    Volume { volume_id: String },
    /// Look up an ISBN and create or update the local record.
    Enrich {
        isbn: String,
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { force } = cli.cmd {
        init_config_file(Path::new(CONFIG_FILE), force)?;
        println!("initialized {CONFIG_FILE}");
        return Ok(());
    }

    let mut cfg = load_config()?;
    init_tracing(&cfg.logging.level);

    match cli.cmd {
        Commands::InitConfig { .. } => {}
        Commands::Search { query, max_results } => {
            if let Some(n) = max_results {
                cfg.google_books.max_results = n;
            }
            let gateway = build_gateway(&cfg, InMemoryBookStore::new())?;
            let value = gateway.search(&query).await.map_err(render_gateway_error)?;
            emit(cli.json, "search", "search completed", &value)?;
        }
        Commands::Isbn { isbn } => {
            let gateway = build_gateway(&cfg, InMemoryBookStore::new())?;
            let value = gateway
                .search_by_isbn(&isbn)
                .await
                .map_err(render_gateway_error)?;
            emit(cli.json, "isbn", "isbn search completed", &value)?;
        }
        Commands::Volume { volume_id } => {
            let gateway = build_gateway(&cfg, InMemoryBookStore::new())?;
            let value = gateway
                .get_volume_by_id(&volume_id)
                .await
                .map_err(render_gateway_error)?;
            emit(cli.json, "volume", "volume lookup completed", &value)?;
        }
        Commands::Enrich { isbn, store } => {
            if let Some(path) = store {
                cfg.store.path = path.to_string_lossy().to_string();
            }
            let store = JsonFileBookStore::open(&cfg.store.path).await?;
            debug!(path = %store.path().display(), "opened book store");
            let gateway = build_gateway(&cfg, store)?;
            let book = gateway
                .enrich_book_data(&isbn)
                .await
                .map_err(render_gateway_error)?;
            emit(cli.json, "enrich", "book enriched", &book)?;
        }
    }

    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // stdout carries command output
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_gateway<S: BookStore>(
    cfg: &AppConfig,
    store: S,
) -> anyhow::Result<BookLookupGateway<ReqwestTransport, S>> {
    let transport = ReqwestTransport::new(
        &cfg.google_books.base_url,
        Duration::from_millis(cfg.google_books.timeout_ms),
    )?;
    let config = GatewayConfig::from_app_config(cfg, |k| std::env::var(k).ok());
    Ok(BookLookupGateway::new(config, transport, store))
}

fn emit<T: Serialize>(
    json_output: bool,
    phase: &str,
    message: &str,
    details: &T,
) -> anyhow::Result<()> {
    let details = serde_json::to_value(details)?;
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonEnvelope {
                status: "ok".to_string(),
                phase: phase.to_string(),
                message: message.to_string(),
                details,
            })?
        );
    } else {
        println!("{}", serde_json::to_string_pretty(&details)?);
    }
    Ok(())
}

fn load_config() -> anyhow::Result<AppConfig> {
    let mut layers = Vec::new();
    for path in config_paths(std::env::var("HOME").ok()) {
        if let Some(layer) = read_config_layer(&path)? {
            debug!(path = %path.display(), "loaded config layer");
            layers.push(layer);
        }
    }
    resolve_config(layers, |k| std::env::var(k).ok())
}

/// Candidate config files, lowest precedence first.
fn config_paths(home: Option<String>) -> Vec<PathBuf> {
    home.map(|h| PathBuf::from(h).join(CONFIG_FILE))
        .into_iter()
        .chain(std::iter::once(PathBuf::from(CONFIG_FILE)))
        .collect()
}

/// Folds `layers` over the defaults, then applies `BOOKGATE_*` overrides.
fn resolve_config<F>(layers: Vec<Value>, env_get: F) -> anyhow::Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut merged = Value::try_from(AppConfig::default())?;
    for layer in layers {
        overlay_toml(&mut merged, layer);
    }
    let mut cfg = merged
        .try_into::<AppConfig>()
        .context("config does not match the expected sections")?;
    apply_env_overrides(&mut cfg, env_get);
    Ok(cfg)
}

fn read_config_layer(path: &Path) -> anyhow::Result<Option<Value>> {
    match fs::read_to_string(path) {
        Ok(raw) => raw
            .parse::<Value>()
            .map(Some)
            .with_context(|| format!("invalid toml in {}", path.display())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
    }
}

fn overlay_toml(slot: &mut Value, layer: Value) {
    match (slot, layer) {
        (Value::Table(table), Value::Table(layer_table)) => {
            for (key, value) in layer_table {
                match table.get_mut(&key) {
                    Some(existing) => overlay_toml(existing, value),
                    None => {
                        table.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn apply_env_overrides<F>(cfg: &mut AppConfig, env_get: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = env_get("BOOKGATE_BASE_URL") {
        cfg.google_books.base_url = v;
    }
    if let Some(v) = env_get("BOOKGATE_API_KEY_ENV_VAR") {
        cfg.google_books.api_key_env_var = v;
    }
    if let Some(v) = env_get("BOOKGATE_MAX_RESULTS").and_then(|v| v.parse::<u32>().ok()) {
        cfg.google_books.max_results = v;
    }
    if let Some(v) = env_get("BOOKGATE_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
        cfg.google_books.timeout_ms = v;
    }
    if let Some(v) = env_get("BOOKGATE_STORE_PATH") {
        cfg.store.path = v;
    }
    if let Some(v) = env_get("BOOKGATE_LOG_LEVEL") {
        cfg.logging.level = v;
    }
}

fn init_config_file(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; re-run with --force to overwrite",
            path.display()
        );
    }
    fs::write(path, config_template())?;
    Ok(())
}

fn config_template() -> &'static str {
    r#"# bookgate configuration
# precedence: CLI > env > local .bookgate.toml > home ~/.bookgate.toml > defaults

[google_books]
base_url = "https://www.googleapis.com/books/v1/volumes"
# the API key itself is never stored here; it is read from this variable
api_key_env_var = "GOOGLE_BOOKS_API_KEY"
max_results = 20
timeout_ms = 10000

[store]
path = ".bookgate/books.json"

[logging]
# overridden by RUST_LOG when set
level = "info"
"#
}

fn render_gateway_error(err: GatewayError) -> anyhow::Error {
    match err {
        upstream @ GatewayError::Upstream { .. } => anyhow::anyhow!(upstream),
        other => {
            let status = other.status();
            anyhow::anyhow!("{other} (status {status})")
        }
    }
}
