use dotenvy::dotenv;
use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

/// Load `.env` into the process environment. Call it once at start-up, before
/// any config or `RUST_LOG` is read.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenv() {
        Ok(path) => {
            eprintln!(".env read successfully from {}", path.display());
            Some(path)
        }
        Err(e) => {
            eprintln!("Could not load .env file: {e}");
            None
        }
    }
}

fn init_env_layer() -> EnvFilter {
    env_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok())
}

fn env_filter(directives: Option<String>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| DEFAULT_FILTER.into())
}

pub fn init_tracing_to_stdout() {
    let env_layer = init_env_layer();

    let stdout_layer = tracing_subscriber::fmt::layer().with_ansi(true);

    tracing_subscriber::registry()
        .with(env_layer)
        .with(stdout_layer)
        .init();
}

/// Log to `<log_dir>/app.log`, falling back to stdout when the file cannot be created.
pub fn init_tracing_to_file(log_dir: impl AsRef<Path>) {
    let file = match create_log_file(log_dir.as_ref()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Failed to create log file: {}", e);
            init_tracing_to_stdout();
            return;
        }
    };

    let env_layer = init_env_layer();

    let file_log_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_layer)
        .with(file_log_layer)
        .init();
}

fn create_log_file(log_dir: &Path) -> std::io::Result<File> {
    std::fs::create_dir_all(log_dir)?;
    File::create(log_dir.join("app.log"))
}
