use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use progress_core::model::{CacheType, ListDescriptor, ModeGroup, UserId};
use services::{
    AppServices, Clock, EngineConfig, JsonFileSessionSource, ProgressCache, SharedIdentity,
};
use storage::repository::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidGroup { raw: String },
    InvalidUser { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidGroup { raw } => {
                write!(f, "invalid --group value: {raw} (general|phonics|grammar)")
            }
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw:?}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  progress report --sessions <file> --lists <file> --user <id> [--type <cache_type>] [--group <name>] [--db <sqlite_url>]"
    );
    eprintln!("  progress clear  --user <id> [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --type level1_progress");
    eprintln!("  --group general");
    eprintln!("  --db sqlite://progress.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PROGRESS_DB_URL, PROGRESS_CACHE_PREFIX, PROGRESS_COALESCE_SECS,");
    eprintln!("  PROGRESS_STORE_QUOTA_BYTES, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Report,
    Clear,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "report" => Some(Self::Report),
            "clear" => Some(Self::Clear),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    user: UserId,
    sessions: Option<PathBuf>,
    lists: Option<PathBuf>,
    cache_type: CacheType,
    group: ModeGroup,
}

impl Args {
    fn parse(
        cmd: Command,
        args: &mut impl Iterator<Item = String>,
        config: &EngineConfig,
    ) -> Result<Self, ArgsError> {
        let mut db_url = normalize_sqlite_url(config.db_url.clone());
        let mut user = None;
        let mut sessions = None;
        let mut lists = None;
        let mut cache_type = CacheType::new(CacheType::LEVEL1_PROGRESS);
        let mut group = ModeGroup::general();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    user = Some(
                        UserId::new(value.clone()).ok_or(ArgsError::InvalidUser { raw: value })?,
                    );
                }
                "--sessions" if cmd == Command::Report => {
                    sessions = Some(PathBuf::from(require_value(args, "--sessions")?));
                }
                "--lists" if cmd == Command::Report => {
                    lists = Some(PathBuf::from(require_value(args, "--lists")?));
                }
                "--type" if cmd == Command::Report => {
                    cache_type = CacheType::new(require_value(args, "--type")?.trim());
                }
                "--group" if cmd == Command::Report => {
                    let value = require_value(args, "--group")?;
                    group = ModeGroup::by_name(&value)
                        .ok_or(ArgsError::InvalidGroup { raw: value })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let user = user.ok_or(ArgsError::MissingFlag { flag: "--user" })?;
        if cmd == Command::Report {
            if sessions.is_none() {
                return Err(ArgsError::MissingFlag { flag: "--sessions" });
            }
            if lists.is_none() {
                return Err(ArgsError::MissingFlag { flag: "--lists" });
            }
        }

        Ok(Self {
            db_url,
            user,
            sessions,
            lists,
            cache_type,
            group,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn load_lists(path: &PathBuf) -> Result<Vec<ListDescriptor>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| format!("cannot read {}: {err}", path.display()))?;
    let lists: Vec<ListDescriptor> = serde_json::from_str(&raw)
        .map_err(|err| format!("invalid list file {}: {err}", path.display()))?;
    Ok(lists)
}

async fn report(
    parsed: Args,
    storage: &Storage,
    config: &EngineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let (Some(sessions), Some(lists)) = (parsed.sessions, parsed.lists) else {
        return Err(ArgsError::MissingFlag { flag: "--sessions" }.into());
    };
    let lists = load_lists(&lists)?;

    let services = AppServices::with_parts(
        storage,
        Arc::new(JsonFileSessionSource::new(sessions)),
        SharedIdentity::signed_in(parsed.user),
        config,
        Clock::default_clock(),
    );
    let progress = services.progress();

    let percentages = progress
        .list_progress(&parsed.cache_type, &lists, &parsed.group)
        .await?;
    let stars = progress.level_stars().await?;
    info!(
        cache_type = %parsed.cache_type,
        cached = percentages.from_cache,
        "progress computed"
    );

    let output = serde_json::json!({
        "cacheType": parsed.cache_type.as_str(),
        "group": parsed.group.name(),
        "fromCache": percentages.from_cache,
        "lists": percentages.value,
        "stars": stars.value,
        "totalStars": stars.value.total(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    // Let background refreshes land before the process exits.
    for handle in [percentages.revalidation, stars.revalidation]
        .into_iter()
        .flatten()
    {
        handle.await?;
    }
    Ok(())
}

async fn clear(parsed: Args, storage: &Storage, config: &EngineConfig) {
    let cache = ProgressCache::with_prefix(
        Arc::clone(&storage.cache),
        Arc::new(SharedIdentity::signed_in(parsed.user)),
        Clock::default_clock(),
        config.cache_prefix.clone(),
    );
    cache.clear_all().await;
    info!("progress cache cleared");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let config = EngineConfig::from_env()?;
    let mut iter = argv.into_iter().skip(1);
    let parsed = Args::parse(cmd, &mut iter, &config).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url, config.store_quota_bytes).await?;

    match cmd {
        Command::Report => report(parsed, &storage, &config).await,
        Command::Clear => {
            clear(parsed, &storage, &config).await;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
