use serde::Serialize;
use tracing::{info, warn};

use crate::attendance::recompute_attendance;
use crate::coerce;
use crate::error::AggregateError;
use crate::models::{fields, USERS};
use crate::ranking::recompute_ranking;
use crate::store::DocumentStore;

pub const ADMIN_ROLE: &str = "admin";
pub const DEFAULT_ROLE: &str = "viewer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub email: Option<String>,
    pub email_verified: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    pub auth: Option<CallerIdentity>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RecomputeAck {
    pub ok: bool,
}

/// Role stored under `usuarios/{email}`. Callers without a verified email,
/// without a user document, or without a `papel` are viewers.
pub async fn role_for(
    store: &dyn DocumentStore,
    identity: &CallerIdentity,
) -> Result<String, AggregateError> {
    let email = match identity.email.as_deref() {
        Some(email) if identity.email_verified && !email.is_empty() => email,
        _ => return Ok(DEFAULT_ROLE.to_string()),
    };

    let role = store
        .get(USERS, email)
        .await?
        .and_then(|user| coerce::text_key(user.field(fields::ROLE)))
        .unwrap_or_else(|| DEFAULT_ROLE.to_string());
    Ok(role)
}

pub async fn recompute_all(
    store: &dyn DocumentStore,
    ctx: &CallContext,
) -> Result<RecomputeAck, AggregateError> {
    let Some(identity) = ctx.auth.as_ref() else {
        warn!("recompute requested without a signed-in caller");
        return Err(AggregateError::Unauthenticated);
    };

    let role = role_for(store, identity).await?;
    if role != ADMIN_ROLE {
        warn!(email = ?identity.email, role = %role, "recompute refused");
        return Err(AggregateError::PermissionDenied);
    }

    info!(email = ?identity.email, "manual recompute started");
    recompute_ranking(store).await?;
    recompute_attendance(store).await?;
    Ok(RecomputeAck { ok: true })
}
