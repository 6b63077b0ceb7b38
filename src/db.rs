use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "roster.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    // Workspaces created before updated_at was tracked.
    ensure_documents_updated_at(&conn)?;

    Ok(conn)
}

pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute(
        "CREATE TABLE documents(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    Ok(conn)
}

pub fn document_get(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT value FROM documents WHERE key = ?", [key], |r| {
        r.get(0)
    })
    .optional()
}

pub fn document_set(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO documents(key, value, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        (key, value, now),
    )?;
    Ok(())
}

pub fn document_delete(conn: &Connection, key: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM documents WHERE key = ?", [key])?;
    Ok(())
}

pub fn document_keys(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT key FROM documents ORDER BY key")?;
    let keys = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(keys)
}

fn ensure_documents_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "documents", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE documents ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
