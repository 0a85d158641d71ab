//! Download authorization rules
//!
//! Checks run in a fixed order and stop at the first failure:
//! existence, visibility, password, expiry.

use chrono::{DateTime, Utc};

use crate::core::error::AppError;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::files::models::File;
use crate::shared::password::verify_password;

/// Request facts the policy looks at
#[derive(Debug, Clone, Copy)]
pub struct AccessContext<'a> {
    pub presented_password: Option<&'a str>,
    pub user: Option<&'a AuthenticatedUser>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    NotFound,
    Forbidden,
    PasswordRequired,
    Gone,
}

pub fn evaluate(file: Option<&File>, ctx: &AccessContext<'_>) -> Result<(), AccessDenied> {
    let file = file.ok_or(AccessDenied::NotFound)?;

    if !file.is_public && !ctx.user.is_some_and(|user| user.owns(file.owner_user_id)) {
        return Err(AccessDenied::Forbidden);
    }

    if let Some(hash) = file.password_hash.as_deref() {
        match ctx.presented_password {
            None => return Err(AccessDenied::PasswordRequired),
            Some(password) if !verify_password(password, hash) => {
                return Err(AccessDenied::Forbidden)
            }
            Some(_) => {}
        }
    }

    if file.is_expired(ctx.now) {
        return Err(AccessDenied::Gone);
    }

    Ok(())
}

impl From<AccessDenied> for AppError {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::NotFound => AppError::NotFound("File not found".to_string()),
            AccessDenied::Forbidden => AppError::Forbidden("Access to this file is denied".to_string()),
            AccessDenied::PasswordRequired => {
                AppError::PasswordRequired("This file is password protected".to_string())
            }
            AccessDenied::Gone => AppError::Gone("This link has expired".to_string()),
        }
    }
}
