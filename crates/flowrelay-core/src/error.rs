//! Core error type for the Flowrelay invocation client.
//!
//! Only `Configuration` ever reaches a caller (at client construction).
//! Every other variant is contained inside the invocation state machine and
//! converted to a rendered fragment, so `invoke` itself never fails for
//! remote reasons.

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Missing or unusable invoke endpoint. Fatal, surfaced immediately,
    /// never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connection failure, timeout, or non-success HTTP status for a round.
    #[error("transport error: {0}")]
    Transport(String),

    /// One malformed event line. Logged and skipped; the stream continues.
    #[error("decode error: {0}")]
    Decode(String),

    /// The stream violated the invocation protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Defensive cutoff, not a remote failure.
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),
}
