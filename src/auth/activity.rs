use crate::errors::Result;
use crate::models::{keys, ActivityLogEntry};
use crate::store::{new_id, RecordStore};
use tracing::debug;

pub const LOCAL_ORIGIN: &str = "local";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityAction {
    Login,
    Logout,
    CreateUser,
    UpdateUser,
    DeleteUser,
}

impl ActivityAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityAction::Login => "login",
            ActivityAction::Logout => "logout",
            ActivityAction::CreateUser => "create_user",
            ActivityAction::UpdateUser => "update_user",
            ActivityAction::DeleteUser => "delete_user",
        }
    }
}

/// Oldest first.
pub fn list(store: &RecordStore) -> Vec<ActivityLogEntry> {
    store
        .read_document::<Vec<ActivityLogEntry>>(keys::ACTIVITIES)
        .unwrap_or_default()
}

/// Newest first, at most `n`.
pub fn recent(store: &RecordStore, n: usize) -> Vec<ActivityLogEntry> {
    list(store).into_iter().rev().take(n).collect()
}

/// Append and keep only the newest `cap` entries, in their original order.
pub fn append(
    store: &RecordStore,
    cap: usize,
    user_id: &str,
    action: ActivityAction,
    description: impl Into<String>,
) -> Result<ActivityLogEntry> {
    let entry = ActivityLogEntry {
        id: new_id(),
        user_id: user_id.to_string(),
        action: action.as_str().to_string(),
        description: description.into(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        origin: LOCAL_ORIGIN.to_string(),
    };

    let mut entries = list(store);
    entries.push(entry.clone());
    if entries.len() > cap {
        let excess = entries.len() - cap;
        entries.drain(..excess);
    }
    store.write_document(keys::ACTIVITIES, &entries)?;
    debug!(action = action.as_str(), user_id, "activity appended");
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_evicts_oldest_in_order() {
        let store = RecordStore::in_memory();
        for i in 0..5 {
            append(&store, 3, "u1", ActivityAction::Login, format!("n{i}")).expect("append");
        }
        let all = list(&store);
        let descs: Vec<&str> = all.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(descs, vec!["n2", "n3", "n4"]);
        assert!(all.iter().all(|e| e.origin == "local"));

        let latest = recent(&store, 2);
        assert_eq!(latest[0].description, "n4");
        assert_eq!(latest[1].description, "n3");
    }
}
