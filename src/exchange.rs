//! Collection export as a JSON array or CSV.

use crate::errors::{Result, RosterError};
use crate::models::{keys, PublicUser};
use crate::store::RecordStore;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

pub const EXPORTABLE: [&str; 6] = [
    keys::USERS,
    keys::STUDENTS,
    keys::CLASSES,
    keys::SUBJECTS,
    keys::SCORES,
    keys::TEACHER_ASSIGNMENTS,
];

/// Rows of a collection as plain JSON objects. User rows never carry the
/// password hash.
pub fn collection_rows(store: &RecordStore, collection: &str) -> Result<Vec<Map<String, Value>>> {
    let values: Vec<Value> = match collection {
        keys::USERS => store
            .users()
            .iter()
            .map(|u| serde_json::to_value(PublicUser::from(u)))
            .collect::<std::result::Result<_, _>>()?,
        keys::STUDENTS => to_values(store.students())?,
        keys::CLASSES => to_values(store.classes_with_counts())?,
        keys::SUBJECTS => to_values(store.subjects())?,
        keys::SCORES => to_values(store.scores())?,
        keys::TEACHER_ASSIGNMENTS => to_values(store.teacher_assignments())?,
        other => {
            return Err(RosterError::validation(format!(
                "unknown collection: {other}"
            )))
        }
    };
    Ok(values
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(m) => Some(m),
            _ => None,
        })
        .collect())
}

fn to_values<T: serde::Serialize>(rows: Vec<T>) -> Result<Vec<Value>> {
    rows.iter()
        .map(|r| serde_json::to_value(r).map_err(RosterError::from))
        .collect()
}

pub fn export_collection(store: &RecordStore, collection: &str, format: ExportFormat) -> Result<String> {
    let rows = collection_rows(store, collection)?;
    match format {
        ExportFormat::Json => {
            let arr = Value::Array(rows.into_iter().map(Value::Object).collect());
            Ok(serde_json::to_string_pretty(&arr)?)
        }
        ExportFormat::Csv => Ok(to_csv(&rows)),
    }
}

/// Header is the union of keys in first-seen order.
pub fn to_csv(rows: &[Map<String, Value>]) -> String {
    let mut header: Vec<&str> = Vec::new();
    for row in rows {
        for k in row.keys() {
            if !header.contains(&k.as_str()) {
                header.push(k);
            }
        }
    }

    let mut out = String::new();
    out.push_str(
        &header
            .iter()
            .map(|h| csv_quote(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');
    for row in rows {
        let line = header
            .iter()
            .map(|h| csv_quote(&csv_cell(row.get(*h))))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn csv_cell(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|i| csv_cell(Some(i)))
            .collect::<Vec<_>>()
            .join(";"),
        Some(other) => other.to_string(),
    }
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn quotes_only_when_needed() {
        let rows = vec![
            obj(json!({ "fullName": "Tran, An", "id": "s1" })),
            obj(json!({ "fullName": "Le \"Bo\"", "gender": null, "id": "s2" })),
        ];
        let csv = to_csv(&rows);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "fullName,id,gender");
        assert_eq!(lines[1], "\"Tran, An\",s1,");
        assert_eq!(lines[2], "\"Le \"\"Bo\"\"\",s2,");
    }

    #[test]
    fn arrays_join_with_semicolons() {
        let rows = vec![obj(json!({ "code": "TOAN", "grades": [10, 11, 12] }))];
        assert_eq!(to_csv(&rows).lines().nth(1), Some("TOAN,10;11;12"));
    }
}
