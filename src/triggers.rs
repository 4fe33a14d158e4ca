use anyhow::Context;
use serde::Deserialize;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};

use crate::attendance::recompute_attendance;
use crate::error::AggregateError;
use crate::models::{AttendanceRun, RankingRun, WEEKLY_ATTENDANCE, WEEKLY_POINTS};
use crate::ranking::recompute_ranking;
use crate::store::DocumentStore;

/// Channel the `documents_change_notify` trigger publishes on.
pub const CHANGE_CHANNEL: &str = "document_changes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    #[serde(alias = "insert")]
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangeEvent {
    pub collection: String,
    pub id: String,
    pub op: ChangeOp,
}

impl ChangeEvent {
    pub fn parse(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    Ranking(RankingRun),
    Attendance(AttendanceRun),
    Ignored,
}

/// Runs the aggregator fed by `event.collection`, if any. The changed
/// document itself is not inspected; every run is a full recomputation.
pub async fn dispatch(
    store: &dyn DocumentStore,
    event: &ChangeEvent,
) -> Result<Dispatched, AggregateError> {
    match event.collection.as_str() {
        WEEKLY_POINTS => Ok(Dispatched::Ranking(recompute_ranking(store).await?)),
        WEEKLY_ATTENDANCE => Ok(Dispatched::Attendance(recompute_attendance(store).await?)),
        _ => Ok(Dispatched::Ignored),
    }
}

pub async fn watch(pool: &PgPool, store: &dyn DocumentStore) -> anyhow::Result<()> {
    let mut listener = PgListener::connect_with(pool)
        .await
        .context("failed to open change listener")?;
    listener
        .listen(CHANGE_CHANNEL)
        .await
        .with_context(|| format!("failed to listen on {CHANGE_CHANNEL}"))?;
    info!(channel = CHANGE_CHANNEL, "watching for document changes");

    loop {
        let notification = tokio::select! {
            received = listener.recv() => received.context("change listener disconnected")?,
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down watcher");
                return Ok(());
            }
        };

        let event = match ChangeEvent::parse(notification.payload()) {
            Ok(event) => event,
            Err(err) => {
                warn!(payload = notification.payload(), error = %err, "skipping malformed change event");
                continue;
            }
        };

        match dispatch(store, &event).await {
            Ok(Dispatched::Ignored) => {
                debug!(collection = %event.collection, id = %event.id, "no aggregate depends on collection");
            }
            Ok(Dispatched::Ranking(run)) => {
                debug!(id = %event.id, op = ?event.op, groups = run.groups, "ranking refreshed");
            }
            Ok(Dispatched::Attendance(run)) => {
                debug!(id = %event.id, op = ?event.op, weeks = run.weeks, "attendance refreshed");
            }
            Err(err) => {
                error!(collection = %event.collection, id = %event.id, error = %err, "recompute failed");
            }
        }
    }
}
