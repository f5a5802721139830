//! Retry profiles
//!
//! Two bounded exponential-backoff profiles shared across the crate:
//! `normal` (~15 s total budget, backend connections and other long
//! retries) and `short` (~1 s, checkpoint advance). On exhaustion the last
//! error is returned.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoff;

/// Backoff profile with a ~15 second total budget
pub fn normal() -> ExponentialBackoff {
    ExponentialBackoff {
        max_elapsed_time: Some(Duration::from_secs(15)),
        ..ExponentialBackoff::default()
    }
}

/// Backoff profile with a ~1 second total budget
pub fn short() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(50),
        max_elapsed_time: Some(Duration::from_secs(1)),
        ..ExponentialBackoff::default()
    }
}

/// Retry an operation under the normal profile, treating every error as
/// transient
pub async fn retry_normal<T, E, F, Fut>(op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with(normal(), op).await
}

/// Retry an operation under the short profile
pub async fn retry_short<T, E, F, Fut>(op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with(short(), op).await
}

async fn retry_with<T, E, F, Fut>(profile: ExponentialBackoff, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    backoff::future::retry(profile, move || {
        let attempt = op();
        async move { attempt.await.map_err(backoff::Error::transient) }
    })
    .await
}
