use serde::Deserialize;

/// Error payload the service attaches to non-2xx responses. `message` is the
/// user-facing text and is surfaced verbatim.
#[derive(Deserialize, Debug)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
