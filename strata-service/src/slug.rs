//! Slug generation with bounded collision resolution.

use crate::config::SlugConfig;
use crate::error::ServiceError;
use std::future::Future;

/// Lowercase, ASCII, hyphen-separated form of `source`.
pub fn default_generator(source: &str) -> String {
    ::slug::slugify(source)
}

/// `base-count`, e.g. `alpha-2` for the second collision.
pub fn default_resolver(base: &str, count: u32) -> String {
    format!("{base}-{count}")
}

/// Derive a slug from `source` that `is_taken` reports as free.
///
/// The base candidate comes from the configured generator; each collision
/// bumps a counter and asks the configured resolver for the next candidate.
/// After `max_attempts` collisions the search stops with
/// [`ServiceError::SlugExhausted`]. Returns `None` when the generator yields
/// an empty slug.
pub async fn unique_slug<F, Fut>(
    config: &SlugConfig,
    source: &str,
    mut is_taken: F,
) -> Result<Option<String>, ServiceError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, ServiceError>>,
{
    let base = (config.generator)(source);
    if base.is_empty() {
        return Ok(None);
    }

    let mut candidate = base.clone();
    let mut count = 0;
    while is_taken(candidate.clone()).await? {
        if count >= config.max_attempts {
            return Err(ServiceError::SlugExhausted {
                base,
                attempts: config.max_attempts,
            });
        }
        count += 1;
        tracing::debug!(slug = %candidate, attempt = count, "slug collision");
        candidate = (config.resolver)(&base, count);
    }
    Ok(Some(candidate))
}
