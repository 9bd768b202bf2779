use cpick_core::{CatalogClient, FetchError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const DIRECTORY_FILENAME: &str = "criterion-directory.html";
pub const DEFAULT_CACHE_MAX_AGE: Duration = Duration::from_secs(60 * 60 * 24);

/// File-backed copy of the directory listing. The file's mtime is the fetch time.
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    path: PathBuf,
    max_age: Duration,
}

impl DirectoryCache {
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
        }
    }

    pub fn in_dir(dir: impl AsRef<Path>, max_age: Duration) -> Self {
        Self::new(dir.as_ref().join(DIRECTORY_FILENAME), max_age)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached listing while it is younger than `max_age`, otherwise a fresh fetch that
    /// replaces the artifact. Fetch failures never fall back to the stale copy.
    pub fn get_directory(&self, client: &dyn CatalogClient) -> Result<String, FetchError> {
        if self.is_fresh(SystemTime::now()) {
            match fs::read_to_string(&self.path) {
                Ok(html) => {
                    tracing::debug!(path = %self.path.display(), "using cached directory");
                    return Ok(html);
                }
                Err(err) => {
                    tracing::warn!(path = %self.path.display(), error = %err, "cached directory unreadable");
                }
            }
        }

        tracing::info!("refreshing directory listing");
        let html = client.fetch_directory_html()?;
        self.store(&html)?;
        Ok(html)
    }

    /// Missing or unreadable metadata counts as stale. An mtime in the future counts as fresh.
    pub fn is_fresh(&self, now: SystemTime) -> bool {
        let modified = match fs::metadata(&self.path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(_) => return false,
        };
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        age < self.max_age
    }

    pub fn invalidate(&self) -> Result<(), FetchError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(cache_error(&self.path, err)),
        }
    }

    fn store(&self, html: &str) -> Result<(), FetchError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| cache_error(parent, err))?;
            }
        }
        let tmp = self.path.with_extension("html.tmp");
        fs::write(&tmp, html).map_err(|err| cache_error(&tmp, err))?;
        fs::rename(&tmp, &self.path).map_err(|err| cache_error(&self.path, err))?;
        Ok(())
    }
}

fn cache_error(path: &Path, err: io::Error) -> FetchError {
    FetchError::Cache(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpick_core::MovieDetail;
    use filetime::FileTime;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct CountingClient {
        html: Option<&'static str>,
        calls: Cell<usize>,
    }

    impl CountingClient {
        fn serving(html: &'static str) -> Self {
            Self {
                html: Some(html),
                calls: Cell::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                html: None,
                calls: Cell::new(0),
            }
        }
    }

    impl CatalogClient for CountingClient {
        fn fetch_directory_html(&self) -> Result<String, FetchError> {
            self.calls.set(self.calls.get() + 1);
            self.html.map(str::to_string).ok_or_else(|| FetchError::Http {
                url: "https://films.criterionchannel.com".to_string(),
                message: "connection refused".to_string(),
            })
        }

        fn extract_tags(&self, _directory_html: &str) -> Result<Vec<String>, FetchError> {
            Ok(Vec::new())
        }

        fn fetch_movie_detail(&self, tag: &str) -> Result<MovieDetail, FetchError> {
            Err(FetchError::Parse(format!("no detail for {tag}")))
        }
    }

    fn age_file(path: &Path, age: Duration) {
        let when = SystemTime::now() - age;
        filetime::set_file_mtime(path, FileTime::from_system_time(when)).expect("set mtime");
    }

    #[test]
    fn missing_artifact_is_fetched_and_persisted() {
        let dir = TempDir::new().expect("temp dir");
        let cache = DirectoryCache::in_dir(dir.path(), DEFAULT_CACHE_MAX_AGE);
        let client = CountingClient::serving("<html>fresh</html>");

        assert!(!cache.is_fresh(SystemTime::now()));
        let html = cache.get_directory(&client).expect("directory");
        assert_eq!(html, "<html>fresh</html>");
        assert_eq!(client.calls.get(), 1);
        assert_eq!(
            fs::read_to_string(cache.path()).expect("artifact"),
            "<html>fresh</html>"
        );
        assert!(cache.is_fresh(SystemTime::now()));
    }

    #[test]
    fn fresh_artifact_is_served_without_fetching() {
        let dir = TempDir::new().expect("temp dir");
        let cache = DirectoryCache::in_dir(dir.path(), DEFAULT_CACHE_MAX_AGE);
        fs::write(cache.path(), "<html>cached</html>").expect("seed cache");
        age_file(cache.path(), Duration::from_secs(60 * 60 * 23));

        let client = CountingClient::serving("<html>remote</html>");
        let html = cache.get_directory(&client).expect("directory");
        assert_eq!(html, "<html>cached</html>");
        assert_eq!(client.calls.get(), 0);
    }

    #[test]
    fn stale_artifact_is_replaced() {
        let dir = TempDir::new().expect("temp dir");
        let cache = DirectoryCache::in_dir(dir.path(), DEFAULT_CACHE_MAX_AGE);
        fs::write(cache.path(), "<html>old</html>").expect("seed cache");
        age_file(cache.path(), Duration::from_secs(60 * 60 * 25));

        let client = CountingClient::serving("<html>new</html>");
        let html = cache.get_directory(&client).expect("directory");
        assert_eq!(html, "<html>new</html>");
        assert_eq!(client.calls.get(), 1);
        assert_eq!(
            fs::read_to_string(cache.path()).expect("artifact"),
            "<html>new</html>"
        );
    }

    #[test]
    fn stale_artifact_is_not_served_when_fetch_fails() {
        let dir = TempDir::new().expect("temp dir");
        let cache = DirectoryCache::in_dir(dir.path(), DEFAULT_CACHE_MAX_AGE);
        fs::write(cache.path(), "<html>old</html>").expect("seed cache");
        age_file(cache.path(), Duration::from_secs(60 * 60 * 48));

        let client = CountingClient::failing();
        assert!(matches!(
            cache.get_directory(&client),
            Err(FetchError::Http { .. })
        ));
        assert_eq!(
            fs::read_to_string(cache.path()).expect("artifact untouched"),
            "<html>old</html>"
        );
    }

    #[test]
    fn future_mtime_counts_as_fresh() {
        let dir = TempDir::new().expect("temp dir");
        let cache = DirectoryCache::in_dir(dir.path(), DEFAULT_CACHE_MAX_AGE);
        fs::write(cache.path(), "<html>cached</html>").expect("seed cache");
        let future = SystemTime::now() + Duration::from_secs(600);
        filetime::set_file_mtime(cache.path(), FileTime::from_system_time(future))
            .expect("set mtime");

        assert!(cache.is_fresh(SystemTime::now()));
    }

    #[test]
    fn invalidate_forces_refetch_and_tolerates_missing_file() {
        let dir = TempDir::new().expect("temp dir");
        let cache = DirectoryCache::in_dir(dir.path(), DEFAULT_CACHE_MAX_AGE);
        cache.invalidate().expect("nothing to remove");

        let client = CountingClient::serving("<html>remote</html>");
        cache.get_directory(&client).expect("first fetch");
        cache.invalidate().expect("remove artifact");
        assert!(!cache.path().exists());
        cache.get_directory(&client).expect("second fetch");
        assert_eq!(client.calls.get(), 2);
    }
}
