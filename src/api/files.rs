//! File handlers: upload into, download from, and list the upload directory,
//! plus the HTML client page served at `/`.

use std::io;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tokio::fs;
use tracing::{debug, info, warn};

use super::AppState;
use crate::context::Context;
use crate::{Response, StatusCode};

/// `POST /api/files/upload`: stores every multipart file part.
///
/// Responds `201 {"uploaded_files": [{"filename", "status": "uploaded"}, ...]}`
/// listing the files actually written. Parts whose filename reduces to nothing
/// or whose write fails are logged and left out.
pub async fn upload(state: Arc<AppState>, ctx: Context) -> Response {
    let request = ctx.request();

    if request.files().is_empty() {
        if request.form_fields().is_empty() {
            let message = format!(
                "No files or form data found. Content-Type: {}, Body size: {}",
                request.content_type().unwrap_or("missing"),
                request.body().len()
            );
            return Response::error(StatusCode::BadRequest, message);
        }
        return Response::error(StatusCode::BadRequest, "No files uploaded");
    }

    if let Err(e) = fs::create_dir_all(&state.upload_dir).await {
        warn!(dir = %state.upload_dir.display(), error = %e, "cannot create upload directory");
    }

    let mut uploaded = Vec::with_capacity(request.files().len());
    for (field, file) in request.files() {
        let Some(name) = sanitize_filename(&file.filename) else {
            warn!(field = %field, filename = %file.filename, "skipping upload with unusable filename");
            continue;
        };

        let path = state.upload_dir.join(name);
        match fs::write(&path, &file.data).await {
            Ok(()) => {
                info!(file = %path.display(), bytes = file.data.len(), "file uploaded");
                uploaded.push(json!({ "filename": name, "status": "uploaded" }));
            }
            Err(e) => warn!(file = %path.display(), error = %e, "failed to write upload"),
        }
    }

    Response::json(StatusCode::Created, &json!({ "uploaded_files": uploaded }))
}

/// `GET /api/files/download/{filename}`: the named file from the upload directory.
pub async fn download(state: Arc<AppState>, ctx: Context) -> Response {
    let filename = ctx.param("filename");
    if !is_plain_filename(filename) {
        return Response::error(StatusCode::BadRequest, "Invalid filename");
    }
    send_file(&state.upload_dir.join(filename)).await
}

/// `GET /api/files`: `{"files": [...]}`, the sorted names of the regular files
/// in the upload directory. A missing directory is created and listed as empty.
pub async fn list(state: Arc<AppState>, _ctx: Context) -> Response {
    let files = match list_dir(&state.upload_dir).await {
        Ok(files) => files,
        Err(e) => {
            debug!(dir = %state.upload_dir.display(), error = %e, "upload directory unreadable; creating it");
            if let Err(e) = fs::create_dir_all(&state.upload_dir).await {
                warn!(dir = %state.upload_dir.display(), error = %e, "cannot create upload directory");
            }
            Vec::new()
        }
    };

    Response::json(StatusCode::Ok, &json!({ "files": files }))
}

/// `GET /`: the client page.
pub async fn client_page(state: Arc<AppState>, _ctx: Context) -> Response {
    send_file(&state.client_page).await
}

async fn list_dir(dir: &Path) -> io::Result<Vec<String>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

// HTML is served inline as text; every other type is a binary attachment.
async fn send_file(path: &Path) -> Response {
    let data = match fs::read(path).await {
        Ok(data) => data,
        Err(e) => {
            debug!(file = %path.display(), error = %e, "file not readable");
            return Response::error(StatusCode::NotFound, "File not found");
        }
    };

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content_type = content_type_for(&filename);

    if content_type == "text/html" {
        Response::html(String::from_utf8_lossy(&data))
    } else {
        Response::attachment(&filename, content_type, data)
    }
}

/// MIME type for `filename`, chosen by its (case-insensitive) extension.
///
/// ```
/// use crudhttp::api::files::content_type_for;
///
/// assert_eq!(content_type_for("index.HTML"), "text/html");
/// assert_eq!(content_type_for("photo.jpeg"), "image/jpeg");
/// assert_eq!(content_type_for("archive.tar.gz"), "application/octet-stream");
/// ```
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map_or(filename, |(_, ext)| ext)
        .to_ascii_lowercase();

    match extension.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

// Reduces a client-supplied filename to its final path component.
fn sanitize_filename(raw: &str) -> Option<&str> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    is_plain_filename(name).then_some(name)
}

// A single path component that can also be echoed in a header.
fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| matches!(c, '/' | '\\' | '"') || c.is_control())
}
