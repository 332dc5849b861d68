//! HTTP handlers for the share lifecycle endpoints.

use anyhow::Context;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, Response},
    Json,
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use crate::common::AppError;
use crate::share::{ConfirmOutcome, SessionManager, SessionSnapshot, StartedShare};
use crate::utils::security::content_disposition;

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct StartRequest {
    file_path: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct FileQuery {
    file: Option<String>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
pub struct StartResponse {
    message: &'static str,
    #[serde(flatten)]
    share: StartedShare,
}

/// Begin sharing the file named in the body.
pub async fn start_share(
    State(manager): State<SessionManager>,
    payload: Option<Json<StartRequest>>,
) -> Result<Json<StartResponse>, AppError> {
    // a missing or malformed body reports as a missing path
    let payload = payload.map_or_else(StartRequest::default, |Json(value)| value);
    let path = payload.file_path.unwrap_or_default();

    let share = manager.start(&path).await?;

    Ok(Json(StartResponse {
        message: "File is sharing",
        share,
    }))
}

/// Receiver accepts the transfer. Safe to repeat.
pub async fn confirm_share(
    State(manager): State<SessionManager>,
) -> Result<Json<MessageResponse>, AppError> {
    let message = match manager.confirm().await? {
        ConfirmOutcome::Confirmed => "Receiver confirmed. File transfer authorized.",
        ConfirmOutcome::AlreadyConfirmed => "Already confirmed. File transfer authorized.",
    };

    Ok(Json(MessageResponse { message }))
}

/// Stream the shared file as an attachment once confirmed.
pub async fn stream_file(
    Query(query): Query<FileQuery>,
    State(manager): State<SessionManager>,
) -> Result<Response<Body>, AppError> {
    let download = manager.authorize_stream(query.file.as_deref()).await?;

    let disposition = content_disposition(&download.file_name);
    let file_name = download.file_name;

    // an I/O error ends this response only; the session stays confirmed
    let body = ReaderStream::new(download.reader).inspect_err(move |e| {
        tracing::warn!("Transfer of '{}' aborted: {}", file_name, e);
    });

    let mut response = Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff");
    if let Some(len) = download.len {
        response = response.header(header::CONTENT_LENGTH, len);
    }

    Ok(response
        .body(Body::from_stream(body))
        .context("build response")?)
}

/// Sender ends the share.
pub async fn stop_share(
    State(manager): State<SessionManager>,
) -> Result<Json<MessageResponse>, AppError> {
    manager.stop().await?;
    Ok(Json(MessageResponse {
        message: "Sharing stopped",
    }))
}

pub async fn share_status(State(manager): State<SessionManager>) -> Json<SessionSnapshot> {
    Json(manager.status().await)
}
