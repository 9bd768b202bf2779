use chrono::{DateTime, Utc};
use cpick_core::{CatalogClient, FetchError, MovieRecord, ResolutionChoice};
use cpick_storage::{MovieStore, StorageError};
use rand::rngs::ThreadRng;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PickError {
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("storage error: {0}")]
    Storage(StorageError),
    #[error("no unwatched movies left")]
    EmptyPool,
    #[error("more than one movie is selected: {}", .selected.join(", "))]
    Consistency { selected: Vec<String> },
    #[error("no movie is currently selected")]
    NothingSelected,
    #[error("unknown tag: {0}")]
    UnknownTag(String),
    #[error("prompt failed: {0}")]
    Prompt(String),
}

impl From<StorageError> for PickError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Consistency { selected } => PickError::Consistency { selected },
            other => PickError::Storage(other),
        }
    }
}

/// Decides what happens to a selection left over from an earlier run.
pub trait ResolutionPrompt {
    fn resolve(&mut self, leftover: &MovieRecord) -> Result<ResolutionChoice, PickError>;
}

impl<F> ResolutionPrompt for F
where
    F: FnMut(&MovieRecord) -> ResolutionChoice,
{
    fn resolve(&mut self, leftover: &MovieRecord) -> Result<ResolutionChoice, PickError> {
        Ok(self(leftover))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLeftover {
    pub movie: MovieRecord,
    pub choice: ResolutionChoice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    Picked {
        movie: MovieRecord,
        resolved: Option<ResolvedLeftover>,
    },
    /// The leftover selection was kept and nothing was written.
    Aborted { leftover: MovieRecord },
}

pub struct SelectionEngine<'a, R = ThreadRng> {
    store: &'a MovieStore,
    client: &'a dyn CatalogClient,
    rng: R,
}

impl<'a> SelectionEngine<'a, ThreadRng> {
    pub fn new(store: &'a MovieStore, client: &'a dyn CatalogClient) -> Self {
        Self {
            store,
            client,
            rng: rand::thread_rng(),
        }
    }
}

impl<'a, R: Rng> SelectionEngine<'a, R> {
    pub fn with_rng<R2: Rng>(self, rng: R2) -> SelectionEngine<'a, R2> {
        SelectionEngine {
            store: self.store,
            client: self.client,
            rng,
        }
    }

    /// Resolves any leftover selection, then picks, hydrates and selects a random
    /// unwatched movie.
    pub fn select_movie_to_watch(
        &mut self,
        prompt: &mut dyn ResolutionPrompt,
    ) -> Result<PickOutcome, PickError> {
        let resolved = match self.store.selected()? {
            Some(leftover) => {
                let choice = prompt.resolve(&leftover)?;
                tracing::info!(tag = %leftover.tag, %choice, "resolving leftover selection");
                match choice {
                    ResolutionChoice::Watched => self.store.mark_watched(leftover.id, now())?,
                    ResolutionChoice::Unselect => {
                        self.store.unselect_all(now())?;
                    }
                    ResolutionChoice::Abort => return Ok(PickOutcome::Aborted { leftover }),
                }
                Some(ResolvedLeftover {
                    movie: self.reload(leftover.id)?,
                    choice,
                })
            }
            None => None,
        };

        let pool = self.store.unwatched()?;
        let candidate = pool.choose(&mut self.rng).ok_or(PickError::EmptyPool)?;
        tracing::debug!(tag = %candidate.tag, pool = pool.len(), "picked candidate");

        if !candidate.is_hydrated() {
            self.hydrate(&candidate.tag)?;
        }
        self.store.select(candidate.id, now())?;

        Ok(PickOutcome::Picked {
            movie: self.reload(candidate.id)?,
            resolved,
        })
    }

    /// Fetches and stores the detail for a known tag.
    pub fn hydrate_tag(&self, tag: &str) -> Result<MovieRecord, PickError> {
        let movie = self
            .store
            .by_tag(tag)?
            .ok_or_else(|| PickError::UnknownTag(tag.to_string()))?;
        self.hydrate(&movie.tag)?;
        self.reload(movie.id)
    }

    pub fn mark_selected_watched(&self) -> Result<MovieRecord, PickError> {
        let selected = self.store.selected()?.ok_or(PickError::NothingSelected)?;
        self.store.mark_watched(selected.id, now())?;
        tracing::info!(tag = %selected.tag, "marked watched");
        self.reload(selected.id)
    }

    pub fn unselect_current(&self) -> Result<MovieRecord, PickError> {
        let selected = self.store.selected()?.ok_or(PickError::NothingSelected)?;
        self.store.unselect_all(now())?;
        tracing::info!(tag = %selected.tag, "returned to pool");
        self.reload(selected.id)
    }

    fn hydrate(&self, tag: &str) -> Result<(), PickError> {
        let detail = self.client.fetch_movie_detail(tag)?;
        if let Some(canonical) = detail.canonical_tag.as_deref() {
            if canonical != tag {
                tracing::debug!(tag, canonical, "detail page reports a different canonical tag");
            }
        }
        self.store.hydrate(tag, &detail, now())?;
        Ok(())
    }

    fn reload(&self, id: i64) -> Result<MovieRecord, PickError> {
        self.store
            .by_id(id)?
            .ok_or_else(|| PickError::Storage(StorageError::NotFound(format!("id {id}"))))
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}
