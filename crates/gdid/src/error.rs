//! Error taxonomy shared by the allocation engine and the client generator.
//!
//! The variants follow the propagation policy of the system: an authority
//! recovers locally from a single degraded persistence location but always
//! surfaces "nothing could be read" and "nothing could be written"; a client
//! recovers locally from a single failed endpoint but surfaces exhaustion of
//! all of them.

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for GDID allocation.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Malformed scope/sequence name, zero block size, or an inconsistent
    /// vicinity bound. Rejected before any I/O; never worth retrying as-is.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// No persistence location could be read. The caller should fail over to
    /// another authority endpoint if one is configured, or retry with
    /// backoff.
    #[error("authority {authority} unavailable: no persistence location could be read")]
    AuthorityUnavailable { authority: u8 },

    /// Every durable write failed after a successful read. No block was
    /// returned and the high-water mark did not advance; safe to retry.
    #[error("authority {authority}: all persistence writes failed, no block issued")]
    PersistenceWriteFailed { authority: u8 },

    /// Persisted state is inconsistent with any plausible era progression
    /// (for example, durable storage regressed below the engine's own
    /// in-memory mark). Reported rather than silently resolved.
    #[error("fencing violation: {detail}")]
    FencingViolation { detail: String },

    /// The authority is in the process of shutting down.
    #[error("authority is shutting down")]
    ServiceShutdown,

    /// An endpoint attempt timed out after the request may already have
    /// advanced the durable mark. The block, if one was issued, is abandoned
    /// — that only wastes range, which is safe — but the outcome is unknown.
    #[error("ambiguous outcome: endpoint {endpoint} timed out mid-allocation")]
    AmbiguousOutcome { endpoint: String },

    /// Every configured authority endpoint failed or timed out.
    #[error("all {attempts} authority endpoints exhausted, last error: {last}")]
    ClientExhaustedAllLocations { attempts: usize, last: Box<Error> },
}

impl Error {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }
}
