use crate::backup;
use crate::errors::RosterError;
use crate::exchange::{self, ExportFormat};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{self, finish, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::models::keys;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_export_collection(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let collection = helpers::param_str(req, "collection")?;
    let format_name = helpers::opt_param_str(req, "format").unwrap_or_else(|| "json".into());
    let Some(format) = ExportFormat::parse(&format_name) else {
        return Err(helpers::fail(
            req,
            RosterError::validation(format!("unknown export format: {format_name}")),
        ));
    };
    let store = helpers::store(&state.store, req)?;
    state
        .auth
        .require_admin("export data")
        .map_err(|e| helpers::fail(req, e))?;

    let content = exchange::export_collection(store, &collection, format)
        .map_err(|e| helpers::fail(req, e))?;
    Ok(ok(
        &req.id,
        json!({ "collection": collection, "format": format_name, "content": content }),
    ))
}

fn handle_backup_export(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let out_path = PathBuf::from(helpers::param_str(req, "outPath")?);
    state
        .auth
        .require_admin("export backups")
        .map_err(|e| helpers::fail(req, e))?;
    let Some(workspace) = state.workspace.clone() else {
        return Err(err(&req.id, "no_workspace", "select a workspace first", None));
    };

    let summary = backup::export_workspace_bundle(&workspace, &out_path)
        .map_err(|e| err(&req.id, "io_failed", format!("{e:#}"), None))?;
    Ok(ok(
        &req.id,
        json!({
            "path": out_path.to_string_lossy(),
            "bundleFormat": summary.bundle_format,
            "entryCount": summary.entry_count,
            "dbSha256": summary.db_sha256,
        }),
    ))
}

/// Replaces the open workspace database and signs everyone out.
fn handle_backup_import(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let in_path = PathBuf::from(helpers::param_str(req, "inPath")?);
    state
        .auth
        .require_admin("restore backups")
        .map_err(|e| helpers::fail(req, e))?;
    let Some(workspace) = state.workspace.clone() else {
        return Err(err(&req.id, "no_workspace", "select a workspace first", None));
    };

    state.close_workspace();
    let imported = backup::import_workspace_bundle(&in_path, &workspace);
    let reopened = state.select_workspace(&workspace);
    let summary = imported.map_err(|e| err(&req.id, "io_failed", format!("{e:#}"), None))?;
    reopened.map_err(|e| err(&req.id, "db_open_failed", format!("{e:#}"), None))?;

    let store = helpers::store(&state.store, req)?;
    store
        .remove_document(keys::SESSION)
        .map_err(|e| helpers::fail(req, e))?;
    state.auth.forget();
    let _ = state.views.reset(None, store);
    info!(format = %summary.bundle_format_detected, "workspace restored from backup");

    Ok(ok(
        &req.id,
        json!({
            "bundleFormatDetected": summary.bundle_format_detected,
            "view": state.views.snapshot(),
        }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "export.collection" => Some(finish(handle_export_collection(state, req))),
        "backup.exportWorkspaceBundle" => Some(finish(handle_backup_export(state, req))),
        "backup.importWorkspaceBundle" => Some(finish(handle_backup_import(state, req))),
        _ => None,
    }
}
