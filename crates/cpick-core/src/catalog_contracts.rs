use crate::MovieDetail;
use thiserror::Error;

pub const DEFAULT_DIRECTORY_URL: &str = "https://films.criterionchannel.com";
pub const DEFAULT_FILM_BASE_URL: &str = "https://www.criterionchannel.com";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error for {url}: {message}")]
    Http { url: String, message: String },
    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("directory cache error: {0}")]
    Cache(String),
}

/// Remote catalog as seen by the sync and selection engines.
pub trait CatalogClient {
    /// Raw directory listing page.
    fn fetch_directory_html(&self) -> Result<String, FetchError>;

    /// Tags referenced by a directory listing, in page order.
    fn extract_tags(&self, directory_html: &str) -> Result<Vec<String>, FetchError>;

    /// Detail page metadata for one tag. Never cached.
    fn fetch_movie_detail(&self, tag: &str) -> Result<MovieDetail, FetchError>;
}

pub fn film_url(base_url: &str, tag: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        tag.trim_start_matches('/')
    )
}

/// Recovers the tag from a film URL under `base_url`; query and fragment are dropped.
pub fn tag_from_url(base_url: &str, url: &str) -> Option<String> {
    let base = base_url.trim_end_matches('/');
    let rest = url.trim().strip_prefix(base)?.strip_prefix('/')?;
    let tag = rest
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or(rest)
        .trim_end_matches('/');
    if tag.is_empty() {
        None
    } else {
        Some(tag.to_string())
    }
}
