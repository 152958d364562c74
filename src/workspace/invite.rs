//! Workspace invite codes.
//!
//! A code is the first eight hex digits of a random v4 UUID, upper-cased.
//! The generator does not check for collisions: the store's unique
//! constraint on `invite_code` decides, and callers regenerate on conflict.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::service::WorkspaceError;
use super::store::StoreError;

pub const INVITE_CODE_LEN: usize = 8;

/// How many fresh codes to try before giving up on a unique one.
pub const MAX_INVITE_CODE_ATTEMPTS: usize = 5;

pub fn generate_invite_code() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(INVITE_CODE_LEN)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

pub fn is_well_formed(code: &str) -> bool {
    code.len() == INVITE_CODE_LEN
        && code
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
}

/// Trim and upper-case user input so `abcd1234 ` finds `ABCD1234`.
pub fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Run `attempt` with a new code until the store accepts it.
///
/// Only `DuplicateInviteCode` triggers another try; any other outcome is
/// returned as-is.
pub async fn with_fresh_code<T, F, Fut>(mut attempt: F) -> Result<T, StoreError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut tries = 0;
    loop {
        tries += 1;
        match attempt(generate_invite_code()).await {
            Err(StoreError::DuplicateInviteCode) if tries < MAX_INVITE_CODE_ATTEMPTS => {
                tracing::warn!(tries, "invite code collision, regenerating");
            }
            other => return other,
        }
    }
}

/// Turn an optional lifetime in hours into an absolute expiry.
pub fn expiry_from_hours(
    hours: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, WorkspaceError> {
    match hours {
        None => Ok(None),
        Some(h) if h > 0 => Duration::try_hours(h)
            .and_then(|d| now.checked_add_signed(d))
            .map(Some)
            .ok_or_else(|| WorkspaceError::Validation("Invite lifetime is too long".into())),
        Some(_) => Err(WorkspaceError::Validation(
            "Invite lifetime must be a positive number of hours".into(),
        )),
    }
}
