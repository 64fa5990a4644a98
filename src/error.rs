use thiserror::Error;

use crate::model::SlotKey;

/// Error taxonomy shared across the engine. Every failure path surfaces one
/// of these; callers can match on the variant instead of parsing strings.
#[derive(Debug, Error)]
pub enum TimetableError {
    /// Rejected before any network call (empty subject name, out-of-range
    /// period, malformed input).
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Transport-level failure reaching the timetable service, or a 2xx
    /// response whose body did not decode.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response outside the mapped statuses; message is the server
    /// body verbatim.
    #[error("service error {status}: {message}")]
    Api { status: u16, message: String },

    /// A write for this cell is already in flight; the caller must wait for
    /// it to settle before issuing another.
    #[error("write already in flight for {0}")]
    WriteInFlight(SlotKey),

    /// The submission gate: slots holding a subject but no teacher.
    #[error("{missing} slot(s) missing teacher assignment")]
    Incomplete { missing: usize },

    /// Personal-scope toggle on a class without a class teacher.
    #[error("class {0} has no class teacher")]
    MissingClassTeacher(String),
}

pub type TimetableResult<T> = Result<T, TimetableError>;
