//! Local store: free-form notes and tags per student, plus the last roster
//! document downloaded from each source.
//!
//! Nothing here reads or changes a `StudentRecord`; notes only refer to
//! students by roll number.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::error::{RosterError, RosterResult};
use crate::models::{NewNote, Note, NoteCategory, NotePriority, NoteQuery};

pub async fn connect(database_url: &str) -> RosterResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn init_db(pool: &SqlitePool) -> RosterResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn add_note(pool: &SqlitePool, note: NewNote, now: DateTime<Utc>) -> RosterResult<Note> {
    let id = Uuid::new_v4();
    let tags = normalize_tags(&note.tags);
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO notes
        (id, roll_no, content, author, priority, category, is_private, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(&note.roll_no)
    .bind(&note.content)
    .bind(&note.author)
    .bind(note.priority.as_str())
    .bind(note.category.as_str())
    .bind(note.is_private)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    for tag in tags.iter() {
        sqlx::query("INSERT OR IGNORE INTO note_tags (note_id, tag) VALUES (?, ?)")
            .bind(id)
            .bind(tag)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(Note {
        id,
        roll_no: note.roll_no,
        content: note.content,
        author: note.author,
        priority: note.priority,
        category: note.category,
        tags,
        is_private: note.is_private,
        created_at: now,
        updated_at: None,
    })
}

/// Returns whether a note with `id` existed.
pub async fn update_note_content(
    pool: &SqlitePool,
    id: Uuid,
    content: &str,
    now: DateTime<Utc>,
) -> RosterResult<bool> {
    let result = sqlx::query("UPDATE notes SET content = ?, updated_at = ? WHERE id = ?")
        .bind(content)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_note(pool: &SqlitePool, id: Uuid) -> RosterResult<bool> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM note_tags WHERE note_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM notes WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

/// Attaches `tag` to a note. False when the note is missing, the tag is
/// blank, or the note already carries it.
pub async fn add_tag(pool: &SqlitePool, id: Uuid, tag: &str) -> RosterResult<bool> {
    let Some(tag) = normalize_tag(tag) else {
        return Ok(false);
    };

    let result = sqlx::query(
        "INSERT OR IGNORE INTO note_tags (note_id, tag) SELECT id, ? FROM notes WHERE id = ?",
    )
    .bind(tag)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Notes for one student, newest first.
pub async fn fetch_notes(
    pool: &SqlitePool,
    roll_no: &str,
    filter: &NoteQuery,
) -> RosterResult<Vec<Note>> {
    let mut query = String::from(
        "SELECT id, roll_no, content, author, priority, category, is_private, \
         created_at, updated_at FROM notes WHERE roll_no = ?",
    );
    if filter.priority.is_some() {
        query.push_str(" AND priority = ?");
    }
    if filter.category.is_some() {
        query.push_str(" AND category = ?");
    }

    let mut rows = sqlx::query(&query).bind(roll_no);
    if let Some(priority) = filter.priority {
        rows = rows.bind(priority.as_str());
    }
    if let Some(category) = filter.category {
        rows = rows.bind(category.as_str());
    }

    let records = rows.fetch_all(pool).await?;
    let mut tags = fetch_tags(pool, roll_no).await?;

    let mut notes = Vec::with_capacity(records.len());
    for row in records.iter() {
        let mut note = note_from_row(row)?;
        note.tags = tags.remove(&note.id).unwrap_or_default();
        notes.push(note);
    }

    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let term = term.to_lowercase();
        notes.retain(|note| {
            note.content.to_lowercase().contains(&term)
                || note.author.to_lowercase().contains(&term)
                || note.tags.iter().any(|tag| tag.contains(&term))
        });
    }

    notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(notes)
}

async fn fetch_tags(pool: &SqlitePool, roll_no: &str) -> RosterResult<HashMap<Uuid, Vec<String>>> {
    let rows = sqlx::query(
        "SELECT t.note_id, t.tag FROM note_tags t \
         JOIN notes n ON n.id = t.note_id \
         WHERE n.roll_no = ? ORDER BY t.tag",
    )
    .bind(roll_no)
    .fetch_all(pool)
    .await?;

    let mut tags: HashMap<Uuid, Vec<String>> = HashMap::new();
    for row in rows {
        let note_id: Uuid = row.try_get("note_id")?;
        let tag: String = row.try_get("tag")?;
        tags.entry(note_id).or_default().push(tag);
    }
    Ok(tags)
}

fn note_from_row(row: &SqliteRow) -> RosterResult<Note> {
    let priority: String = row.try_get("priority")?;
    let category: String = row.try_get("category")?;

    Ok(Note {
        id: row.try_get("id")?,
        roll_no: row.try_get("roll_no")?,
        content: row.try_get("content")?,
        author: row.try_get("author")?,
        priority: NotePriority::parse(&priority)
            .ok_or_else(|| RosterError::CorruptAnnotation(format!("priority {priority:?}")))?,
        category: NoteCategory::parse(&category)
            .ok_or_else(|| RosterError::CorruptAnnotation(format!("category {category:?}")))?,
        tags: Vec::new(),
        is_private: row.try_get("is_private")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// A roster document as it was downloaded, with the time of the download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterSnapshot {
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

/// Replaces the stored document for `source`.
pub async fn save_roster_snapshot(
    pool: &SqlitePool,
    source: &str,
    body: &str,
    fetched_at: DateTime<Utc>,
) -> RosterResult<()> {
    sqlx::query(
        r#"
        INSERT INTO roster_snapshots (source, body, fetched_at)
        VALUES (?, ?, ?)
        ON CONFLICT (source) DO UPDATE SET body = excluded.body, fetched_at = excluded.fetched_at
        "#,
    )
    .bind(source)
    .bind(body)
    .bind(fetched_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn latest_roster_snapshot(
    pool: &SqlitePool,
    source: &str,
) -> RosterResult<Option<RosterSnapshot>> {
    let row = sqlx::query("SELECT body, fetched_at FROM roster_snapshots WHERE source = ?")
        .bind(source)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    Ok(Some(RosterSnapshot {
        body: row.try_get("body")?,
        fetched_at: row.try_get("fetched_at")?,
    }))
}

fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().to_lowercase();
    (!tag.is_empty()).then_some(tag)
}

fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = tags.iter().filter_map(|t| normalize_tag(t)).collect();
    normalized.sort();
    normalized.dedup();
    normalized
}
