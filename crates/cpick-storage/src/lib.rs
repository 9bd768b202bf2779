use chrono::{DateTime, SecondsFormat, Utc};
use cpick_core::{MovieDetail, MovieRecord};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use thiserror::Error;

pub const MOVIES_SCHEMA_VERSION: i64 = 2;

const MOVIE_COLUMNS: &str = "id, tag, movie_id, title, duration, created_at, hydrated_at, selected_at, watched_at, updated_at";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("timestamp parse error: {0}")]
    Timestamp(String),
    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
    #[error("more than one movie is selected: {}", .selected.join(", "))]
    Consistency { selected: Vec<String> },
    #[error("no movie with {0}")]
    NotFound(String),
    #[error("movie {id} is already watched")]
    AlreadyWatched { id: i64 },
}

/// Durable table of movie records. The only writer of `movies`.
pub struct MovieStore {
    conn: Connection,
}

impl MovieStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<i64, StorageError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    pub fn migrate(&self) -> Result<(), StorageError> {
        let mut current = self.schema_version()?;
        if current > MOVIES_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchemaVersion {
                found: current,
                supported: MOVIES_SCHEMA_VERSION,
            });
        }

        if current < 1 {
            let sql = include_str!("../migrations/0001_movies.sql");
            self.conn.execute_batch(sql)?;
            self.conn
                .execute("PRAGMA user_version = 1", [])
                .map(|_| ())?;
            current = 1;
        }

        if current < 2 {
            let sql = include_str!("../migrations/0002_lifecycle_indexes.sql");
            self.conn.execute_batch(sql)?;
            self.conn
                .execute("PRAGMA user_version = 2", [])
                .map(|_| ())?;
        }

        Ok(())
    }

    pub fn insert_if_absent(&self, tag: &str, now: DateTime<Utc>) -> Result<bool, StorageError> {
        let changes = self.conn.execute(
            "INSERT OR IGNORE INTO movies (tag, created_at) VALUES (?1, ?2)",
            params![tag, format_timestamp(now)],
        )?;
        Ok(changes > 0)
    }

    /// Inserts every absent tag in one transaction and returns how many rows were new.
    pub fn insert_tags<S: AsRef<str>>(
        &self,
        tags: &[S],
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let created_at = format_timestamp(now);
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO movies (tag, created_at) VALUES (?1, ?2)")?;
            for tag in tags {
                inserted += stmt.execute(params![tag.as_ref(), created_at])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Overwrites the scraped metadata. `hydrated_at` keeps its first value.
    pub fn hydrate(
        &self,
        tag: &str,
        detail: &MovieDetail,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let now = format_timestamp(now);
        let changes = self.conn.execute(
            "
            UPDATE movies
            SET movie_id = ?1,
                title = ?2,
                duration = ?3,
                hydrated_at = COALESCE(hydrated_at, ?4),
                updated_at = ?4
            WHERE tag = ?5
            ",
            params![detail.movie_id, detail.title, detail.duration, now, tag],
        )?;
        if changes == 0 {
            return Err(StorageError::NotFound(format!("tag {tag}")));
        }
        Ok(())
    }

    /// Marks one record as the current selection.
    ///
    /// Re-checks the single-selection invariant inside the write transaction, so a
    /// concurrent selection surfaces as [`StorageError::Consistency`] instead of a second
    /// selected row.
    pub fn select(&self, id: i64, now: DateTime<Utc>) -> Result<(), StorageError> {
        let tx = self.conn.unchecked_transaction()?;

        let watched_at: Option<Option<String>> = tx
            .query_row(
                "SELECT watched_at FROM movies WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        match watched_at {
            None => return Err(StorageError::NotFound(format!("id {id}"))),
            Some(Some(_)) => return Err(StorageError::AlreadyWatched { id }),
            Some(None) => {}
        }

        let others = {
            let mut stmt = tx.prepare(
                "SELECT tag FROM movies WHERE selected_at IS NOT NULL AND id != ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map([id], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        if !others.is_empty() {
            return Err(StorageError::Consistency { selected: others });
        }

        tx.execute(
            "UPDATE movies SET selected_at = ?1 WHERE id = ?2",
            params![format_timestamp(now), id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Clears every selection and returns how many rows were selected.
    ///
    /// `_now` keeps the signature in line with the other lifecycle writes. Clearing a
    /// selection records no timestamp and leaves `updated_at` alone, since that column
    /// tracks hydrated metadata only.
    pub fn unselect_all(&self, _now: DateTime<Utc>) -> Result<usize, StorageError> {
        let changes = self.conn.execute(
            "UPDATE movies SET selected_at = NULL WHERE selected_at IS NOT NULL",
            [],
        )?;
        Ok(changes)
    }

    pub fn mark_watched(&self, id: i64, now: DateTime<Utc>) -> Result<(), StorageError> {
        let changes = self.conn.execute(
            "UPDATE movies SET watched_at = ?1, selected_at = NULL WHERE id = ?2",
            params![format_timestamp(now), id],
        )?;
        if changes == 0 {
            return Err(StorageError::NotFound(format!("id {id}")));
        }
        Ok(())
    }

    /// The current selection. More than one selected row is reported, never resolved.
    pub fn selected(&self) -> Result<Option<MovieRecord>, StorageError> {
        let mut selected = self.query_movies(
            &format!(
                "SELECT {MOVIE_COLUMNS} FROM movies WHERE selected_at IS NOT NULL ORDER BY id"
            ),
            [],
        )?;
        if selected.len() > 1 {
            return Err(StorageError::Consistency {
                selected: selected.into_iter().map(|movie| movie.tag).collect(),
            });
        }
        Ok(selected.pop())
    }

    /// Candidate pool: everything not yet watched.
    pub fn unwatched(&self) -> Result<Vec<MovieRecord>, StorageError> {
        self.query_movies(
            &format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE watched_at IS NULL ORDER BY id"),
            [],
        )
    }

    pub fn history(&self) -> Result<Vec<MovieRecord>, StorageError> {
        self.query_movies(
            &format!(
                "
                SELECT {MOVIE_COLUMNS}
                FROM movies
                WHERE watched_at IS NOT NULL
                ORDER BY watched_at DESC, id DESC
                "
            ),
            [],
        )
    }

    pub fn all(&self) -> Result<Vec<MovieRecord>, StorageError> {
        self.query_movies(&format!("SELECT {MOVIE_COLUMNS} FROM movies ORDER BY id"), [])
    }

    pub fn by_id(&self, id: i64) -> Result<Option<MovieRecord>, StorageError> {
        let movie = self
            .conn
            .query_row(
                &format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE id = ?1"),
                [id],
                movie_from_row,
            )
            .optional()?;
        Ok(movie)
    }

    pub fn by_tag(&self, tag: &str) -> Result<Option<MovieRecord>, StorageError> {
        let movie = self
            .conn
            .query_row(
                &format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE tag = ?1"),
                [tag],
                movie_from_row,
            )
            .optional()?;
        Ok(movie)
    }

    pub fn count(&self) -> Result<i64, StorageError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM movies", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool, StorageError> {
        let exists = self
            .conn
            .query_row(
                "
                SELECT 1
                FROM sqlite_master
                WHERE type='table' AND name = ?1
                LIMIT 1
                ",
                [table_name],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(exists)
    }

    fn query_movies<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<MovieRecord>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, movie_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn movie_from_row(row: &Row<'_>) -> rusqlite::Result<MovieRecord> {
    let created_at = parse_column(row, 5)?.ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Null,
            Box::new(StorageError::Timestamp("created_at is null".to_string())),
        )
    })?;

    Ok(MovieRecord {
        id: row.get(0)?,
        tag: row.get(1)?,
        movie_id: row.get(2)?,
        title: row.get(3)?,
        duration: row.get(4)?,
        created_at,
        hydrated_at: parse_column(row, 6)?,
        selected_at: parse_column(row, 7)?,
        watched_at: parse_column(row, 8)?,
        updated_at: parse_column(row, 9)?,
    })
}

fn parse_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|value| {
            parse_timestamp(value).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(err),
                )
            })
        })
        .transpose()
}

/// Fixed-width UTC text, so `ORDER BY` on the column is chronological.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: String) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|err| StorageError::Timestamp(err.to_string()))
}
