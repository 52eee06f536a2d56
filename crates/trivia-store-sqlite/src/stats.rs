//! [`SqliteStatsService`]: dynamic answers computed from the game-statistics
//! database.
//!
//! The statistics database is written by another process (the activity
//! tracker). It is opened read-only here; every query reads whatever is
//! committed at the moment the question is resolved.

use std::path::Path;

use rusqlite::{OpenFlags, OptionalExtension as _};
use trivia_core::ports::{PortError, StatsService};

use crate::Result;

/// Table layout of the statistics database. Only applied to in-memory
/// instances; the real file belongs to the tracker.
const STATS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS play_sessions (
    user_id       TEXT NOT NULL,
    game          TEXT NOT NULL,
    started_at    TEXT NOT NULL,
    duration_secs INTEGER NOT NULL CHECK (duration_secs >= 0)
);
";

/// Query types understood by [`SqliteStatsService`].
pub const QUERY_TYPES: [&str; 5] = [
  "longest_playtime_game",
  "most_played_game",
  "most_active_player",
  "total_playtime_hours",
  "distinct_games_played",
];

fn query_sql(query_type: &str) -> Option<&'static str> {
  Some(match query_type {
    "longest_playtime_game" => {
      "SELECT game FROM play_sessions
       GROUP BY game ORDER BY SUM(duration_secs) DESC, game LIMIT 1"
    }
    "most_played_game" => {
      "SELECT game FROM play_sessions
       GROUP BY game ORDER BY COUNT(*) DESC, game LIMIT 1"
    }
    "most_active_player" => {
      "SELECT user_id FROM play_sessions
       GROUP BY user_id
       ORDER BY COUNT(*) DESC, SUM(duration_secs) DESC, user_id LIMIT 1"
    }
    "total_playtime_hours" => {
      "SELECT CAST(SUM(duration_secs) / 3600 AS TEXT) FROM play_sessions
       HAVING COUNT(*) > 0"
    }
    "distinct_games_played" => {
      "SELECT CAST(COUNT(DISTINCT game) AS TEXT) FROM play_sessions
       HAVING COUNT(*) > 0"
    }
    _ => return None,
  })
}

/// Read-only statistics over the tracker's `play_sessions` table.
#[derive(Clone)]
pub struct SqliteStatsService {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStatsService {
  /// Open an existing statistics database without write access.
  pub async fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_with_flags(
      path,
      OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .await?;
    Ok(Self { conn })
  }

  /// A writable in-memory statistics database, for fixtures.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    conn
      .call(|conn| {
        conn.execute_batch(STATS_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn })
  }

  /// Append one play session. Fails on read-only instances.
  pub async fn record_play(
    &self,
    user_id: &str,
    game: &str,
    started_at: &str,
    duration_secs: i64,
  ) -> Result<()> {
    let (user_id, game, started_at) =
      (user_id.to_owned(), game.to_owned(), started_at.to_owned());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO play_sessions (user_id, game, started_at, duration_secs)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![user_id, game, started_at, duration_secs],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

impl StatsService for SqliteStatsService {
  async fn compute_stat(&self, query_type: &str) -> Result<String, PortError> {
    let sql = query_sql(query_type).ok_or_else(|| {
      PortError::Rejected(format!("unknown query type `{query_type}`"))
    })?;

    let value: Option<String> = self
      .conn
      .call(move |conn| Ok(conn.query_row(sql, [], |r| r.get(0)).optional()?))
      .await
      .map_err(|e| {
        tracing::warn!(error = %e, query_type, "statistics query failed");
        PortError::Unavailable(e.to_string())
      })?;

    value.ok_or_else(|| {
      PortError::Rejected(format!("no statistics recorded for `{query_type}`"))
    })
  }
}
