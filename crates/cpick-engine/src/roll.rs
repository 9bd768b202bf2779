use crate::sync::SyncError;
use cpick_catalog::DirectoryCache;
use cpick_core::{CatalogClient, FetchError, MovieDetail};
use rand::seq::SliceRandom;
use rand::Rng;

/// Picks any film from the directory and fetches its detail without touching the store.
pub fn roll_from_directory<R: Rng + ?Sized>(
    cache: &DirectoryCache,
    client: &dyn CatalogClient,
    rng: &mut R,
) -> Result<(String, MovieDetail), SyncError> {
    let html = cache.get_directory(client)?;
    let tags = client.extract_tags(&html)?;
    let tag = tags
        .choose(rng)
        .cloned()
        .ok_or_else(|| FetchError::Parse("directory listing is empty".to_string()))?;
    let detail = client.fetch_movie_detail(&tag)?;
    Ok((tag, detail))
}
