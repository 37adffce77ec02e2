//! Error type for `sharename-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A text column held a value no enum variant maps to.
  #[error("unknown {column} value: {value:?}")]
  UnknownVariant { column: &'static str, value: String },

  #[error("could not allocate a unique share code after {0} attempts")]
  CodeSpaceExhausted(usize),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
