//! Bounded retry around status and body acquisition
//!
//! Some transports raise a spurious "not found" the first time the status or
//! body of a non-2xx or redirect response is requested, while a second
//! request against the same live connection yields the real value. The probe
//! absorbs that condition a fixed number of times. It is not a network retry:
//! there is no delay and the request is never resent.

use futures::future::BoxFuture;
use tracing::{debug, trace};

use crate::connection::{BodyStream, Connection};
use crate::error::ConnectionError;

/// Attempts before the swallowed condition is surfaced
pub const PROBE_ATTEMPTS: usize = 5;

/// Run `op` against `target` up to `attempts` times
///
/// Errors matching `is_transient` are swallowed and the operation retried;
/// any other error, or a success, returns immediately. When every attempt
/// is swallowed the last error is returned.
pub async fn retry_swallowing<C, T, E, P, Op>(
    target: &mut C,
    attempts: usize,
    what: &str,
    is_transient: P,
    mut op: Op,
) -> Result<T, E>
where
    C: ?Sized,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
    Op: for<'a> FnMut(&'a mut C) -> BoxFuture<'a, Result<T, E>>,
{
    let mut result = op(&mut *target).await;
    for attempt in 1..attempts {
        match &result {
            Err(err) if is_transient(err) => {
                trace!(attempt, "Swallowed transient error in {}", what);
                debug!(error = %err, "{} failed", what);
            }
            _ => return result,
        }
        result = op(&mut *target).await;
    }
    result
}

/// Read the response status, absorbing the transient "not found"
pub async fn resolve_status(connection: &mut dyn Connection) -> Result<u16, ConnectionError> {
    retry_swallowing(
        connection,
        PROBE_ATTEMPTS,
        "status",
        ConnectionError::is_not_found,
        |c| c.status(),
    )
    .await
}

/// Open the response body, absorbing the transient "not found"
pub async fn resolve_body(
    connection: &mut dyn Connection,
) -> Result<Box<dyn BodyStream>, ConnectionError> {
    retry_swallowing(
        connection,
        PROBE_ATTEMPTS,
        "body",
        ConnectionError::is_not_found,
        |c| c.body(),
    )
    .await
}
