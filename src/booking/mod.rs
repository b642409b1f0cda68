//! The booking engine: availability queries, guest-detail validation, the
//! session draft, and the transaction that turns a draft into stored rows.

pub mod availability;
pub mod commit;
pub mod draft;
pub mod error;
pub mod validation;

pub use availability::Availability;
pub use commit::BookingTx;
pub use draft::{DraftReservation, DraftStage, DraftStore, SessionId};
pub use error::BookingError;
pub use validation::{ValidationErrors, validate};

use std::future::Future;
use std::time::{Duration, Instant};

use crate::model::Stay;
use crate::observability::{REPO_CALL_DURATION_SECONDS, REPO_TIMEOUTS_TOTAL};
use crate::repository::RepoError;

/// Run one repository call with an upper bound on how long it may take.
/// An elapsed bound is reported as a storage error.
pub async fn bounded<T, F>(limit: Duration, op: &'static str, call: F) -> Result<T, RepoError>
where
    F: Future<Output = Result<T, RepoError>>,
{
    let started = Instant::now();
    let result = tokio::time::timeout(limit, call).await;
    metrics::histogram!(REPO_CALL_DURATION_SECONDS, "op" => op).record(started.elapsed().as_secs_f64());
    match result {
        Ok(inner) => inner,
        Err(_) => {
            metrics::counter!(REPO_TIMEOUTS_TOTAL, "op" => op).increment(1);
            tracing::warn!("repository call {op} timed out after {}ms", limit.as_millis());
            Err(RepoError::Storage(format!("{op} timed out")))
        }
    }
}

/// Parse a `YYYY-MM-DD` pair into a stay.
pub fn parse_stay(start: &str, end: &str) -> Result<Stay, BookingError> {
    Ok(Stay::parse(start.trim(), end.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_passes_results_through() {
        let ok = bounded(Duration::from_millis(50), "test", async { Ok::<_, RepoError>(7) }).await;
        assert_eq!(ok, Ok(7));
        let err = bounded(Duration::from_millis(50), "test", async {
            Err::<(), _>(RepoError::NotFound(4))
        })
        .await;
        assert_eq!(err, Err(RepoError::NotFound(4)));
    }

    #[tokio::test]
    async fn bounded_times_out_as_storage_error() {
        let result = bounded(
            Duration::from_millis(10),
            "stall",
            std::future::pending::<Result<(), RepoError>>(),
        )
        .await;
        assert!(matches!(result, Err(RepoError::Storage(_))));
        assert!(BookingError::from(result.unwrap_err()).is_system());
    }

    #[test]
    fn parse_stay_reports_each_failure() {
        assert!(matches!(parse_stay("invalid", "2050-01-02"), Err(BookingError::InvalidDate(_))));
        assert!(matches!(parse_stay("2050-01-02", "invalid"), Err(BookingError::InvalidDate(_))));
        assert!(matches!(
            parse_stay("2050-01-02", "2050-01-01"),
            Err(BookingError::InvalidInterval { .. })
        ));
        assert_eq!(parse_stay(" 2050-01-01", "2050-01-02 ").unwrap().nights(), 1);
    }
}
