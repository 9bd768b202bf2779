use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod catalog_contracts;

pub use catalog_contracts::{
    film_url, tag_from_url, CatalogClient, FetchError, DEFAULT_DIRECTORY_URL,
    DEFAULT_FILM_BASE_URL,
};

/// One row of the local catalog, keyed by its unique tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieRecord {
    pub id: i64,
    pub tag: String,
    pub movie_id: Option<String>,
    pub title: Option<String>,
    pub duration: Option<String>,
    pub created_at: DateTime<Utc>,
    pub hydrated_at: Option<DateTime<Utc>>,
    pub selected_at: Option<DateTime<Utc>>,
    pub watched_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MovieRecord {
    pub fn state(&self) -> MovieState {
        if self.watched_at.is_some() {
            MovieState::Watched
        } else if self.selected_at.is_some() {
            MovieState::Selected
        } else if self.is_hydrated() {
            MovieState::Hydrated
        } else {
            MovieState::Unhydrated
        }
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated_at.is_some()
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.tag)
    }
}

/// Metadata scraped from a film's detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieDetail {
    #[serde(deserialize_with = "deserialize_movie_id")]
    pub movie_id: String,
    pub title: String,
    pub duration: String,
    #[serde(default)]
    pub canonical_tag: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MovieState {
    Unhydrated,
    Hydrated,
    Selected,
    Watched,
}

impl MovieState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovieState::Unhydrated => "unhydrated",
            MovieState::Hydrated => "hydrated",
            MovieState::Selected => "selected",
            MovieState::Watched => "watched",
        }
    }
}

impl fmt::Display for MovieState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer to a leftover selection from an earlier run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionChoice {
    Watched,
    Unselect,
    Abort,
}

impl ResolutionChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionChoice::Watched => "watched",
            ResolutionChoice::Unselect => "unselect",
            ResolutionChoice::Abort => "abort",
        }
    }
}

impl fmt::Display for ResolutionChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionChoice {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "w" | "watched" | "watch" => Ok(ResolutionChoice::Watched),
            "u" | "unselect" => Ok(ResolutionChoice::Unselect),
            "a" | "abort" => Ok(ResolutionChoice::Abort),
            other => Err(format!("Unknown choice: {other}")),
        }
    }
}

/// The catalog renders ids as strings, older exports wrote them as numbers.
fn deserialize_movie_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let val: serde_json::Value = serde_json::Value::deserialize(deserializer)?;
    match val {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom(
            "expected string or number for movie_id",
        )),
    }
}
