//! Publish notifications from the ingest server.
//!
//! The ingest server (nginx-rtmp `on_publish` / `on_publish_done`) posts a
//! urlencoded form per event. A non-2xx answer to `on_publish` makes it
//! refuse the publisher.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Form;
use castline_ipc::{SessionId, StreamPath};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::TransportError;
use crate::{HttpState, TransportResult};

/// Fields castline reads from a publish notification. Others are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishForm {
    pub app: Option<String>,
    pub name: Option<String>,
    pub clientid: Option<String>,
    pub addr: Option<String>,
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> TransportResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(TransportError::MissingField(field))
}

impl PublishForm {
    /// Session id and stream path named by this notification.
    pub fn session(&self) -> TransportResult<(SessionId, StreamPath)> {
        let app = required(&self.app, "app")?;
        let name = required(&self.name, "name")?;
        let client = required(&self.clientid, "clientid")?;
        let path = StreamPath::new(app, name)?;
        Ok((SessionId::from(client), path))
    }
}

/// `POST /api/v1/streams/publish`
pub async fn on_publish(
    State(state): State<HttpState>,
    Form(form): Form<PublishForm>,
) -> TransportResult<StatusCode> {
    let (session_id, path) = form.session().inspect_err(|e| {
        warn!(error = %e, "Rejected publish notification");
    })?;
    info!(session_id = %session_id, stream = %path, addr = ?form.addr, "Publish started");
    state.hooks.on_start(session_id, path)?;
    Ok(StatusCode::OK)
}

/// `POST /api/v1/streams/publish_done`
pub async fn on_publish_done(
    State(state): State<HttpState>,
    Form(form): Form<PublishForm>,
) -> TransportResult<StatusCode> {
    let (session_id, path) = form.session().inspect_err(|e| {
        warn!(error = %e, "Rejected publish_done notification");
    })?;
    info!(session_id = %session_id, stream = %path, "Publish done");
    state.hooks.on_stop(session_id, path)?;
    Ok(StatusCode::OK)
}
