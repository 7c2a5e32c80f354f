/// Scrape job state definitions
///
/// A job starts `Pending` and ends in exactly one terminal state.
use serde::Deserialize;
use std::fmt;

/// Lifecycle of a server-side scrape job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    /// The server is still fetching the logo
    Pending,

    /// The logo is ready; the original logo URL can be fetched again
    Complete,

    /// The server gave up on the job
    Failed,
}

impl ScrapeStatus {
    /// Returns true if no further polling is needed
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns true if the transition `self -> next` is legal
    ///
    /// `Pending` may repeat or move to either terminal state. Terminal
    /// states never transition.
    pub fn can_transition_to(&self, next: ScrapeStatus) -> bool {
        matches!((self, next), (Self::Pending, _))
    }

    /// Wire representation used by the poll endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Handle to a scrape job announced in a `202 Accepted` response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeJob {
    /// Server-assigned job identifier
    pub job_id: String,

    /// Absolute or base-relative URL of the job status endpoint
    pub poll_url: String,

    /// Server estimate of how long the job will take
    #[serde(default)]
    pub estimated_wait_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!ScrapeStatus::Pending.is_terminal());
        assert!(ScrapeStatus::Complete.is_terminal());
        assert!(ScrapeStatus::Failed.is_terminal());
    }

    #[test]
    fn test_transitions() {
        use ScrapeStatus::*;
        assert!(Pending.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Complete));
        assert!(Pending.can_transition_to(Failed));

        for terminal in [Complete, Failed] {
            for next in [Pending, Complete, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_wire_strings() {
        for status in [
            ScrapeStatus::Pending,
            ScrapeStatus::Complete,
            ScrapeStatus::Failed,
        ] {
            let wire = format!("\"{}\"", status.as_str());
            assert_eq!(serde_json::from_str::<ScrapeStatus>(&wire).unwrap(), status);
        }
        assert!(serde_json::from_str::<ScrapeStatus>("\"scrape_pending\"").is_err());
        assert_eq!(format!("{}", ScrapeStatus::Complete), "complete");
    }

    #[test]
    fn test_deserialize_job() {
        let job: ScrapeJob = serde_json::from_str(
            r#"{"jobId":"j-1","pollUrl":"/jobs/j-1","estimatedWaitMs":1500}"#,
        )
        .unwrap();
        assert_eq!(job.job_id, "j-1");
        assert_eq!(job.poll_url, "/jobs/j-1");
        assert_eq!(job.estimated_wait_ms, 1500);

        let job: ScrapeJob = serde_json::from_str(r#"{"jobId":"j-2","pollUrl":"/jobs/j-2"}"#).unwrap();
        assert_eq!(job.estimated_wait_ms, 0);
    }
}
