use clap::{Args, Subcommand};
use cpick_catalog::{HttpCatalogConfig, DIRECTORY_FILENAME};
use cpick_core::{DEFAULT_DIRECTORY_URL, DEFAULT_FILM_BASE_URL};
use std::path::PathBuf;
use std::time::Duration;

pub const DB_FILENAME: &str = "criterion.db";

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding the database and the cached directory listing
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
    /// Reuse the cached directory listing while it is younger than this
    #[arg(long, global = true, default_value_t = 24)]
    pub cache_hours: u64,
    #[arg(long, global = true, default_value_t = 30)]
    pub timeout_secs: u64,
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,
    /// Disable colored output
    #[arg(long, global = true, default_value_t = false)]
    pub plain: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
#[command(rename_all = "kebab-case")]
pub enum Command {
    /// Sync the directory and pick something to watch (default)
    Pick,
    /// List watched movies, newest first
    History {
        #[arg(long)]
        json: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Mark the current selection as watched
    Watch,
    /// Put the current selection back into the pool
    Unselect,
    /// Merge new directory tags into the database
    Sync {
        /// Ignore the cached directory listing
        #[arg(long)]
        refresh: bool,
    },
    /// List every tracked movie
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show a random directory film without recording anything
    Roll,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub cache_max_age: Duration,
    pub catalog: HttpCatalogConfig,
    pub debug: bool,
    pub color: bool,
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILENAME)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(DIRECTORY_FILENAME)
    }
}

pub fn load_config(args: &GlobalArgs) -> Config {
    let data_dir = resolve_data_dir(args.data_dir.clone());
    let catalog = HttpCatalogConfig {
        directory_url: env_or("CPICK_DIRECTORY_URL", DEFAULT_DIRECTORY_URL),
        film_base_url: env_or("CPICK_FILM_BASE_URL", DEFAULT_FILM_BASE_URL),
        timeout: Duration::from_secs(args.timeout_secs.max(1)),
        ..HttpCatalogConfig::default()
    };
    Config {
        data_dir,
        cache_max_age: Duration::from_secs(args.cache_hours.saturating_mul(60 * 60)),
        catalog,
        debug: args.debug || env_true("CPICK_DEBUG"),
        color: !args.plain && std::env::var_os("NO_COLOR").is_none(),
    }
}

fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = flag {
        return dir;
    }
    if let Ok(value) = std::env::var("CPICK_DATA_DIR") {
        if !value.trim().is_empty() {
            return PathBuf::from(value);
        }
    }
    dirs::data_dir()
        .map(|dir| dir.join("cpick"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default.to_string(),
    }
}

fn env_true(key: &str) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> GlobalArgs {
        GlobalArgs {
            data_dir: Some(PathBuf::from("/tmp/cpick-test")),
            cache_hours: 6,
            timeout_secs: 0,
            debug: false,
            plain: true,
        }
    }

    #[test]
    fn explicit_data_dir_drives_file_locations() {
        let config = load_config(&args());
        assert_eq!(config.db_path(), PathBuf::from("/tmp/cpick-test/criterion.db"));
        assert_eq!(
            config.cache_path(),
            PathBuf::from("/tmp/cpick-test/criterion-directory.html")
        );
        assert_eq!(config.cache_max_age, Duration::from_secs(6 * 60 * 60));
        assert_eq!(config.catalog.timeout, Duration::from_secs(1));
        assert!(!config.color);
    }

    #[test]
    fn oversized_cache_hours_saturate() {
        let config = load_config(&GlobalArgs {
            cache_hours: u64::MAX,
            ..args()
        });
        assert_eq!(config.cache_max_age, Duration::from_secs(u64::MAX));
    }
}
