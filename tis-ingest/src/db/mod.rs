//! Database access for tis-ingest
//!
//! Three related tables: educators (identity by name tuple), transcripts
//! (one row per degree of an uploaded file) and courses (unique by row hash).

pub mod retry;
pub mod search;
pub mod transcripts;

pub use retry::retry_on_lock;
pub use search::{search_courses, summarize_by_category};
pub use transcripts::{insert_course, insert_educator, insert_transcript, persist_transcript, CourseInsert};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tis_common::Result;

/// Initialize database connection pool
///
/// Creates the file and parent directory if missing, then the tables.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let options = SqliteConnectOptions::from_str(&db_url)?
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create tables and indexes if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS educators (
            educator_id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            middle_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (first_name, middle_name, last_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcripts (
            transcript_id INTEGER PRIMARY KEY AUTOINCREMENT,
            educator_id INTEGER NOT NULL REFERENCES educators(educator_id) ON DELETE CASCADE,
            institution_name TEXT NOT NULL,
            degree TEXT NOT NULL,
            major TEXT NOT NULL,
            minor TEXT NOT NULL DEFAULT '',
            awarded_date TEXT NOT NULL DEFAULT '',
            overall_credits_earned REAL,
            overall_gpa REAL,
            degree_level TEXT NOT NULL,
            file_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (educator_id, institution_name, file_name, degree, major)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS courses (
            course_id INTEGER PRIMARY KEY AUTOINCREMENT,
            transcript_id INTEGER NOT NULL REFERENCES transcripts(transcript_id) ON DELETE CASCADE,
            course_name TEXT NOT NULL,
            credits_earned REAL,
            grade TEXT NOT NULL DEFAULT '',
            is_passed TEXT NOT NULL,
            should_be_category TEXT NOT NULL,
            adjusted_credits_earned REAL NOT NULL DEFAULT 0,
            row_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_courses_row_hash ON courses(row_hash)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_courses_category ON courses(should_be_category)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (educators, transcripts, courses)");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("tis.db");

        let pool = init_database_pool(&db_path).await.unwrap();
        init_tables(&pool).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(tables, vec!["courses", "educators", "transcripts"]);
    }
}
