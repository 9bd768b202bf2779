mod directory_cache;
mod html;
mod http;

pub use directory_cache::{DirectoryCache, DEFAULT_CACHE_MAX_AGE, DIRECTORY_FILENAME};
pub use html::{extract_directory_tags, extract_movie_detail};
pub use http::{HttpCatalog, HttpCatalogConfig};
