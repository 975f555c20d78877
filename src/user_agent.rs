//! User-Agent string sent with every fetch.

/// Default User-Agent for download requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    format!("resource-harvester/{}", env!("CARGO_PKG_VERSION"))
}
