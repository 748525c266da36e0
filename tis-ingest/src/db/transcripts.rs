//! Transcript persistence
//!
//! One transaction per file. Educators and transcripts are looked up by
//! natural key before insert; courses pass a dedup gate on `row_hash`.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tis_common::{Error, Result};

use super::retry::retry_on_lock;
use crate::models::{CourseRecord, DegreeRecord, PersistSummary, Student, TranscriptRecord};

/// Upper bound on waiting for a locked database before failing the file
const PERSIST_MAX_WAIT: Duration = Duration::from_secs(5);

/// Hashes bound per lookup query, well under SQLite's parameter limit
const HASH_LOOKUP_CHUNK: usize = 500;

/// Outcome of the course dedup gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseInsert {
    Inserted,
    Duplicate,
}

/// Look up an educator by name tuple, inserting if absent
///
/// A missing middle name is stored as the empty string so `NULL` and `''`
/// name the same person.
pub async fn insert_educator(conn: &mut SqliteConnection, student: &Student) -> Result<i64> {
    let first = student.first_name.trim();
    let middle = student.middle_name.as_deref().map(str::trim).unwrap_or("");
    let last = student.last_name.trim();

    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT educator_id FROM educators WHERE first_name = ? AND middle_name = ? AND last_name = ?",
    )
    .bind(first)
    .bind(middle)
    .bind(last)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO educators (first_name, middle_name, last_name, created_at)
        VALUES (?, ?, ?, CURRENT_TIMESTAMP)
        "#,
    )
    .bind(first)
    .bind(middle)
    .bind(last)
    .execute(&mut *conn)
    .await?;

    let id = result.last_insert_rowid();
    tracing::debug!(educator_id = id, first_name = first, last_name = last, "Created educator");
    Ok(id)
}

/// Look up the transcript row for one degree of a file, inserting if absent
pub async fn insert_transcript(
    conn: &mut SqliteConnection,
    educator_id: i64,
    file_name: &str,
    degree: &DegreeRecord,
) -> Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT transcript_id FROM transcripts
        WHERE educator_id = ? AND institution_name = ? AND file_name = ? AND degree = ? AND major = ?
        "#,
    )
    .bind(educator_id)
    .bind(degree.institution_name.trim())
    .bind(file_name)
    .bind(degree.degree.trim())
    .bind(degree.major.trim())
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO transcripts (
            educator_id, institution_name, degree, major, minor, awarded_date,
            overall_credits_earned, overall_gpa, degree_level, file_name, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        "#,
    )
    .bind(educator_id)
    .bind(degree.institution_name.trim())
    .bind(degree.degree.trim())
    .bind(degree.major.trim())
    .bind(degree.minor.trim())
    .bind(degree.awarded_date.trim())
    .bind(degree.overall_credits_earned)
    .bind(degree.overall_gpa)
    .bind(degree.degree_level.as_str())
    .bind(file_name)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Insert one course unless its `row_hash` is already stored
///
/// `known_hashes` holds every hash stored before this batch plus those
/// inserted by it; the unique index is the final arbiter.
pub async fn insert_course(
    conn: &mut SqliteConnection,
    transcript_id: i64,
    course: &CourseRecord,
    known_hashes: &mut HashSet<String>,
) -> Result<CourseInsert> {
    let hash = course.row_hash().ok_or_else(|| {
        Error::Internal(format!("course '{}' has no row hash", course.course_name))
    })?;

    if known_hashes.contains(hash) {
        return Ok(CourseInsert::Duplicate);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO courses (
            transcript_id, course_name, credits_earned, grade, is_passed,
            should_be_category, adjusted_credits_earned, row_hash, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(row_hash) DO NOTHING
        "#,
    )
    .bind(transcript_id)
    .bind(course.course_name.trim())
    .bind(course.credits_earned)
    .bind(course.grade.trim())
    .bind(course.is_passed.as_str())
    .bind(course.should_be_category.trim())
    .bind(course.adjusted_credits_earned)
    .bind(hash)
    .execute(&mut *conn)
    .await?;

    known_hashes.insert(hash.to_string());

    if result.rows_affected() == 0 {
        Ok(CourseInsert::Duplicate)
    } else {
        Ok(CourseInsert::Inserted)
    }
}

/// Hashes among `candidates` that are already stored
async fn load_existing_hashes(conn: &mut SqliteConnection, candidates: &[&str]) -> Result<HashSet<String>> {
    let mut existing = HashSet::new();

    for chunk in candidates.chunks(HASH_LOOKUP_CHUNK) {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT row_hash FROM courses WHERE row_hash IN (");
        let mut separated = query.separated(", ");
        for hash in chunk {
            separated.push_bind(*hash);
        }
        separated.push_unseparated(")");

        let rows: Vec<String> = query.build_query_scalar::<String>().fetch_all(&mut *conn).await?;
        existing.extend(rows);
    }

    Ok(existing)
}

/// Persist a finalized record in a single transaction
///
/// Every course must carry a row hash. On any failure the whole file's
/// transaction is rolled back; lock contention retries the transaction.
pub async fn persist_transcript(pool: &SqlitePool, record: &TranscriptRecord) -> Result<PersistSummary> {
    retry_on_lock("persist_transcript", PERSIST_MAX_WAIT, || persist_once(pool, record)).await
}

async fn persist_once(pool: &SqlitePool, record: &TranscriptRecord) -> Result<PersistSummary> {
    let mut tx = pool.begin().await?;

    match write_record(&mut *tx, record).await {
        Ok(summary) => {
            tx.commit().await?;
            tracing::info!(
                file_name = %record.file_name,
                inserted = summary.inserted_count,
                duplicates = summary.duplicate_row_identifiers.len(),
                "Transcript persisted"
            );
            Ok(summary)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(
                    file_name = %record.file_name,
                    error = %rollback_err,
                    "Rollback failed"
                );
            }
            Err(e)
        }
    }
}

async fn write_record(conn: &mut SqliteConnection, record: &TranscriptRecord) -> Result<PersistSummary> {
    let candidates: Vec<&str> = record
        .degrees
        .iter()
        .flat_map(|d| d.courses.iter())
        .filter_map(CourseRecord::row_hash)
        .collect();
    let mut known_hashes = load_existing_hashes(&mut *conn, &candidates).await?;

    let educator_id = insert_educator(&mut *conn, &record.student).await?;

    // (institution, degree, major) -> transcript_id for this file
    let mut transcript_ids: HashMap<(String, String, String), i64> = HashMap::new();
    let mut summary = PersistSummary::default();

    for degree in &record.degrees {
        let key = (
            degree.institution_name.trim().to_string(),
            degree.degree.trim().to_string(),
            degree.major.trim().to_string(),
        );
        let transcript_id = match transcript_ids.get(&key) {
            Some(id) => *id,
            None => {
                let id = insert_transcript(&mut *conn, educator_id, &record.file_name, degree).await?;
                transcript_ids.insert(key, id);
                id
            }
        };

        for course in &degree.courses {
            match insert_course(&mut *conn, transcript_id, course, &mut known_hashes).await? {
                CourseInsert::Inserted => summary.inserted_count += 1,
                CourseInsert::Duplicate => {
                    tracing::debug!(
                        file_name = %record.file_name,
                        course = %course.course_name,
                        "Skipping duplicate course"
                    );
                    summary
                        .duplicate_row_identifiers
                        .push(course.row_hash().unwrap_or_default().to_string());
                }
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database_pool;
    use crate::rules;
    use tempfile::TempDir;

    async fn test_pool() -> (TempDir, SqlitePool) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database_pool(&temp_dir.path().join("test.db")).await.unwrap();
        (temp_dir, pool)
    }

    fn sample_record(file_name: &str) -> TranscriptRecord {
        let mut record = TranscriptRecord::new(
            file_name,
            Student {
                first_name: "Jane".to_string(),
                middle_name: None,
                last_name: "Doe".to_string(),
            },
        );
        record.degrees.push(DegreeRecord {
            institution_name: "State University".to_string(),
            degree: "Bachelor of Science".to_string(),
            major: "Biology".to_string(),
            overall_credits_earned: Some(6.0),
            courses: vec![
                CourseRecord::new("General Biology", Some(3.0), "A"),
                CourseRecord::new("Organic Chemistry", Some(3.0), "B"),
            ],
            ..Default::default()
        });
        rules::assess(&mut record);
        rules::finalize(&mut record);
        record
    }

    async fn count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_persist_inserts_all_rows() {
        let (_dir, pool) = test_pool().await;
        let summary = persist_transcript(&pool, &sample_record("jane.pdf")).await.unwrap();

        assert_eq!(summary.inserted_count, 2);
        assert!(summary.duplicate_row_identifiers.is_empty());
        assert_eq!(count(&pool, "educators").await, 1);
        assert_eq!(count(&pool, "transcripts").await, 1);
        assert_eq!(count(&pool, "courses").await, 2);
    }

    #[tokio::test]
    async fn test_large_file_hash_lookup_spans_chunks() {
        let (_dir, pool) = test_pool().await;
        let mut record = sample_record("big.csv");
        record.degrees[0].courses = (0..1200)
            .map(|i| CourseRecord::new(format!("Seminar {}", i), Some(1.0), "A"))
            .collect();
        rules::assess(&mut record);
        rules::finalize(&mut record);

        let first = persist_transcript(&pool, &record).await.unwrap();
        assert_eq!(first.inserted_count, 1200);

        let second = persist_transcript(&pool, &record).await.unwrap();
        assert_eq!(second.inserted_count, 0);
        assert_eq!(second.duplicate_row_identifiers.len(), 1200);
        assert_eq!(count(&pool, "courses").await, 1200);
    }

    #[tokio::test]
    async fn test_second_run_reports_duplicates() {
        let (_dir, pool) = test_pool().await;
        let record = sample_record("jane.pdf");
        persist_transcript(&pool, &record).await.unwrap();

        let summary = persist_transcript(&pool, &record).await.unwrap();
        assert_eq!(summary.inserted_count, 0);
        assert_eq!(summary.duplicate_row_identifiers.len(), 2);
        assert_eq!(count(&pool, "courses").await, 2);
    }

    #[tokio::test]
    async fn test_null_and_empty_middle_name_are_one_educator() {
        let (_dir, pool) = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let mut student = Student {
            first_name: "Jane".to_string(),
            middle_name: None,
            last_name: "Doe".to_string(),
        };
        let a = insert_educator(&mut *conn, &student).await.unwrap();
        student.middle_name = Some(String::new());
        let b = insert_educator(&mut *conn, &student).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_unsealed_course_rolls_back_whole_file() {
        let (_dir, pool) = test_pool().await;
        let mut record = sample_record("jane.pdf");
        record.degrees[0]
            .courses
            .push(CourseRecord::new("Unsealed", Some(1.0), "A"));

        let result = persist_transcript(&pool, &record).await;
        assert!(matches!(result, Err(Error::Internal(_))));
        assert_eq!(count(&pool, "courses").await, 0);
        assert_eq!(count(&pool, "educators").await, 0);
    }
}
