use crate::error::OpError;
use crate::model::{
    Batch, BatchKind, Certificate, CertificatePatch, Event, EventInput, EventType, NewCertificate,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::instrument;
use uuid::Uuid;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the
/// parent directory exists. Leaves in-memory URLs untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") {
        return url.to_string();
    }
    // In-memory URLs like sqlite::memory: or sqlite::memory:?cache=shared
    if url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = if let Some(rest) = path_part.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            format!("{}/{}", home.trim_end_matches('/'), rest)
        } else {
            path_part.to_string()
        }
    } else {
        path_part.to_string()
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err.as_database_error().map(|db| db.kind()),
        Some(sqlx::error::ErrorKind::UniqueViolation)
    )
}

fn row_to_certificate(row: &SqliteRow) -> Certificate {
    Certificate {
        id: row.get("id"),
        cert_id: row.get("cert_id"),
        student_name: row.get("student_name"),
        event: row.get("event"),
        position: row.get("position"),
        date: row.get("date"),
        issued_by: row.get("issued_by"),
        is_placeholder: row.get("is_placeholder"),
        batch_id: row.get("batch_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Create a certificate under a caller-chosen ID. A duplicate ID is rejected
/// as a validation error without touching any other record.
#[instrument(skip_all, fields(id = %cert.id))]
pub async fn create_certificate(pool: &Pool, cert: &NewCertificate) -> Result<(), OpError> {
    let res = sqlx::query(
        "INSERT INTO certificates \
         (id, cert_id, student_name, event, position, date, issued_by, is_placeholder, batch_id, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&cert.id)
    .bind(&cert.id)
    .bind(&cert.student_name)
    .bind(&cert.event)
    .bind(&cert.position)
    .bind(&cert.date)
    .bind(&cert.issued_by)
    .bind(cert.is_placeholder)
    .bind(&cert.batch_id)
    .bind(Utc::now())
    .execute(pool)
    .await;
    match res {
        Ok(_) => Ok(()),
        Err(err) if is_unique_violation(&err) => Err(OpError::validation(format!(
            "certificate {} already exists",
            cert.id
        ))),
        Err(err) => Err(err.into()),
    }
}

/// Create or fully replace a certificate (full-replace semantics). Used by
/// the bulk paths, where a colliding ID deliberately overwrites the stored
/// record; the original `created_at` is preserved on replace.
#[instrument(skip_all, fields(id = %cert.id))]
pub async fn upsert_certificate(pool: &Pool, cert: &NewCertificate) -> Result<(), OpError> {
    sqlx::query(
        "INSERT INTO certificates \
         (id, cert_id, student_name, event, position, date, issued_by, is_placeholder, batch_id, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET \
            cert_id = excluded.cert_id, \
            student_name = excluded.student_name, \
            event = excluded.event, \
            position = excluded.position, \
            date = excluded.date, \
            issued_by = excluded.issued_by, \
            is_placeholder = excluded.is_placeholder, \
            batch_id = excluded.batch_id, \
            updated_at = excluded.created_at",
    )
    .bind(&cert.id)
    .bind(&cert.id)
    .bind(&cert.student_name)
    .bind(&cert.event)
    .bind(&cert.position)
    .bind(&cert.date)
    .bind(&cert.issued_by)
    .bind(cert.is_placeholder)
    .bind(&cert.batch_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

/// Apply a partial field set to an existing certificate and stamp `updated_at`.
#[instrument(skip_all, fields(id = %id))]
pub async fn update_certificate(
    pool: &Pool,
    id: &str,
    patch: &CertificatePatch,
) -> Result<(), OpError> {
    let res = sqlx::query(
        "UPDATE certificates SET \
            student_name = COALESCE(?, student_name), \
            event = COALESCE(?, event), \
            position = COALESCE(?, position), \
            date = COALESCE(?, date), \
            issued_by = COALESCE(?, issued_by), \
            updated_at = ? \
         WHERE id = ?",
    )
    .bind(&patch.student_name)
    .bind(&patch.event)
    .bind(&patch.position)
    .bind(&patch.date)
    .bind(&patch.issued_by)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;
    if res.rows_affected() == 0 {
        return Err(OpError::not_found(format!("certificate {id}")));
    }
    Ok(())
}

/// Delete a certificate. Idempotent: deleting a missing ID is not an error.
#[instrument(skip_all, fields(id = %id))]
pub async fn delete_certificate(pool: &Pool, id: &str) -> Result<(), OpError> {
    sqlx::query("DELETE FROM certificates WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Exact, case-sensitive primary-key lookup. A missing ID is `None`, never an
/// error; only storage failures surface as `Err`.
#[instrument(skip_all, fields(id = %id))]
pub async fn get_certificate(pool: &Pool, id: &str) -> Result<Option<Certificate>, OpError> {
    let row = sqlx::query("SELECT * FROM certificates WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_certificate))
}

#[instrument(skip_all)]
pub async fn list_certificates(pool: &Pool) -> Result<Vec<Certificate>, OpError> {
    let rows = sqlx::query("SELECT * FROM certificates ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_certificate).collect())
}

#[instrument(skip_all, fields(batch_id = %batch_id))]
pub async fn list_by_batch(pool: &Pool, batch_id: &str) -> Result<Vec<Certificate>, OpError> {
    let rows = sqlx::query("SELECT * FROM certificates WHERE batch_id = ?")
        .bind(batch_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_certificate).collect())
}

fn row_to_batch(row: &SqliteRow) -> Result<Batch, OpError> {
    let kind_str: String = row.get("kind");
    let kind = BatchKind::parse(&kind_str).ok_or_else(|| {
        OpError::Storage(sqlx::Error::Decode(
            format!("unknown batch kind {kind_str:?}").into(),
        ))
    })?;
    Ok(Batch {
        id: row.get("id"),
        kind,
        count: row.get("count"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    })
}

#[instrument(skip_all, fields(id = %id))]
pub async fn insert_batch(
    pool: &Pool,
    id: &str,
    kind: BatchKind,
    count: i64,
    description: &str,
) -> Result<(), OpError> {
    sqlx::query("INSERT INTO batches (id, kind, count, description, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(id)
        .bind(kind.as_str())
        .bind(count)
        .bind(description)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all, fields(id = %id))]
pub async fn get_batch(pool: &Pool, id: &str) -> Result<Option<Batch>, OpError> {
    let row = sqlx::query("SELECT * FROM batches WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_batch).transpose()
}

#[instrument(skip_all)]
pub async fn list_batches(pool: &Pool) -> Result<Vec<Batch>, OpError> {
    let rows = sqlx::query("SELECT * FROM batches ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(row_to_batch).collect()
}

#[instrument(skip_all, fields(id = %id))]
pub async fn delete_batch(pool: &Pool, id: &str) -> Result<(), OpError> {
    sqlx::query("DELETE FROM batches WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

fn row_to_event(row: &SqliteRow) -> Result<Event, OpError> {
    let type_str: String = row.get("event_type");
    let event_type = EventType::parse(&type_str).ok_or_else(|| {
        OpError::Storage(sqlx::Error::Decode(
            format!("unknown event type {type_str:?}").into(),
        ))
    })?;
    let tags_json: String = row.get("tags");
    // Tags are stored as a JSON array to preserve order.
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
    Ok(Event {
        id: row.get("id"),
        title: row.get("title"),
        date: row.get("date"),
        location: row.get("location"),
        category: row.get("category"),
        description: row.get("description"),
        tags,
        link: row.get("link"),
        image: row.get("image"),
        event_type,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Insert an event under a fresh system-generated ID and return that ID.
#[instrument(skip_all)]
pub async fn insert_event(pool: &Pool, input: &EventInput) -> Result<String, OpError> {
    let id = Uuid::new_v4().to_string();
    let tags = serde_json::to_string(&input.tags).unwrap_or_else(|_| "[]".to_string());
    sqlx::query(
        "INSERT INTO events \
         (id, title, date, location, category, description, tags, link, image, event_type, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&input.title)
    .bind(&input.date)
    .bind(&input.location)
    .bind(&input.category)
    .bind(&input.description)
    .bind(&tags)
    .bind(&input.link)
    .bind(&input.image)
    .bind(input.event_type.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(id)
}

/// Fully replace an event's fields and stamp `updated_at`.
#[instrument(skip_all, fields(id = %id))]
pub async fn update_event(pool: &Pool, id: &str, input: &EventInput) -> Result<(), OpError> {
    let tags = serde_json::to_string(&input.tags).unwrap_or_else(|_| "[]".to_string());
    let res = sqlx::query(
        "UPDATE events SET \
            title = ?, date = ?, location = ?, category = ?, description = ?, \
            tags = ?, link = ?, image = ?, event_type = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&input.title)
    .bind(&input.date)
    .bind(&input.location)
    .bind(&input.category)
    .bind(&input.description)
    .bind(&tags)
    .bind(&input.link)
    .bind(&input.image)
    .bind(input.event_type.as_str())
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;
    if res.rows_affected() == 0 {
        return Err(OpError::not_found(format!("event {id}")));
    }
    Ok(())
}

#[instrument(skip_all, fields(id = %id))]
pub async fn delete_event(pool: &Pool, id: &str) -> Result<(), OpError> {
    sqlx::query("DELETE FROM events WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all, fields(id = %id))]
pub async fn get_event(pool: &Pool, id: &str) -> Result<Option<Event>, OpError> {
    let row = sqlx::query("SELECT * FROM events WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_event).transpose()
}

/// List events newest-first, optionally filtered by where they surface.
#[instrument(skip_all)]
pub async fn list_events(pool: &Pool, event_type: Option<EventType>) -> Result<Vec<Event>, OpError> {
    let rows = match event_type {
        Some(t) => {
            sqlx::query("SELECT * FROM events WHERE event_type = ? ORDER BY created_at DESC")
                .bind(t.as_str())
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query("SELECT * FROM events ORDER BY created_at DESC")
                .fetch_all(pool)
                .await?
        }
    };
    rows.iter().map(row_to_event).collect()
}
