//! Durable key to JSON-document storage.
//!
//! Every collection lives under one key as a single JSON document. Access is
//! synchronous and single-writer; there is no transaction boundary between
//! keys.

use crate::db;
use crate::errors::{Result, RosterError};
use rusqlite::Connection;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;

pub trait DocumentStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>>;
    fn set_raw(&self, key: &str, text: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;

    fn get_json(&self, key: &str) -> Result<Option<serde_json::Value>> {
        match self.get_raw(key)? {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| RosterError::Storage(format!("malformed document {key}: {e}"))),
            None => Ok(None),
        }
    }

    fn set_json(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.set_raw(key, &text)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get_raw(key)?.is_some())
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            conn: db::open_db(workspace)?,
        })
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        Ok(Self {
            conn: db::open_in_memory()?,
        })
    }
}

impl DocumentStore for SqliteStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        Ok(db::document_get(&self.conn, key)?)
    }

    fn set_raw(&self, key: &str, text: &str) -> Result<()> {
        Ok(db::document_set(&self.conn, key, text)?)
    }

    fn remove(&self, key: &str) -> Result<()> {
        Ok(db::document_delete(&self.conn, key)?)
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(db::document_keys(&self.conn)?)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    docs: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        Ok(self.docs.borrow().get(key).cloned())
    }

    fn set_raw(&self, key: &str, text: &str) -> Result<()> {
        self.docs.borrow_mut().insert(key.to_string(), text.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.docs.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.docs.borrow().keys().cloned().collect())
    }
}
