use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;

use crate::core::error::{AppError, Result};
use crate::features::files::models::{File, NewFile};
use crate::features::files::registry::FileRegistry;

/// Random bytes behind each slug (96 bits, 16 URL-safe characters)
const SLUG_BYTES: usize = 12;

pub fn generate_slug() -> String {
    let mut bytes = [0u8; SLUG_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Insert `file` under a fresh slug from `next_slug`, drawing a new one after
/// each collision up to `max_attempts` times.
pub async fn create_with_unique_slug<F>(
    registry: &dyn FileRegistry,
    mut file: NewFile,
    max_attempts: u32,
    mut next_slug: F,
) -> Result<File>
where
    F: FnMut() -> String,
{
    for attempt in 1..=max_attempts.max(1) {
        file.download_slug = next_slug();

        match registry.create(file.clone()).await {
            Ok(created) => return Ok(created),
            Err(AppError::Conflict(_)) => {
                tracing::warn!(
                    "Slug collision on attempt {}/{} for '{}'",
                    attempt,
                    max_attempts,
                    file.original_name
                );
            }
            Err(e) => return Err(e),
        }
    }

    Err(AppError::Internal(format!(
        "Could not allocate a unique slug after {} attempts",
        max_attempts
    )))
}
