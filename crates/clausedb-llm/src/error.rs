//! Error types for `clausedb-llm`.

use clausedb_core::capability::CapabilityError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Missing API key or an unusable client setting.
  #[error("configuration error: {0}")]
  Config(String),

  /// Connection failure or timeout.
  #[error("network error: {0}")]
  Network(String),

  #[error("API returned {status}: {body}")]
  Status { status: u16, body: String },

  /// The response was not the JSON shape asked for.
  #[error("unparsable response: {0}")]
  Parse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Whether the failure is the service's rather than this request's.
  pub fn is_outage(&self) -> bool {
    match self {
      Self::Network(_) | Self::Config(_) => true,
      Self::Status { status, .. } => *status == 401 || *status == 403 || *status == 429 || *status >= 500,
      Self::Parse(_) => false,
    }
  }
}

impl From<Error> for CapabilityError {
  fn from(e: Error) -> Self {
    if e.is_outage() {
      CapabilityError::Unavailable(e.to_string())
    } else {
      CapabilityError::Rejected(e.to_string())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn outages_and_rejections() {
    let unavailable = |e: Error| CapabilityError::from(e).is_unavailable();
    assert!(unavailable(Error::Network("timed out".into())));
    assert!(unavailable(Error::Status { status: 429, body: String::new() }));
    assert!(unavailable(Error::Status { status: 503, body: String::new() }));
    assert!(unavailable(Error::Status { status: 401, body: String::new() }));
    assert!(unavailable(Error::Config("no api key".into())));
    assert!(!unavailable(Error::Status { status: 400, body: String::new() }));
    assert!(!unavailable(Error::Parse("not json".into())));
  }
}
