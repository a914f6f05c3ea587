use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{IdentityError, IdentityResult};

/// Run a network-bound operation until it completes or `token` is cancelled.
///
/// Dropping the returned future also abandons the operation; the token lets
/// callers cancel from elsewhere (shutdown, request abort).
pub async fn cancellable<T, F>(token: &CancellationToken, operation: F) -> IdentityResult<T>
where
    F: Future<Output = IdentityResult<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(IdentityError::Cancelled),
        result = operation => result,
    }
}
