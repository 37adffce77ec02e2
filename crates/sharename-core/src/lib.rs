//! Core types and trait definitions for the Sharename context-sharing backend.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the entities (users, contexts, share codes, audits, consent requests,
//! notifications), their invariants, the validation layer, and the
//! [`store::ShareStore`] abstraction every backend implements.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

/// Declare an integer row identifier newtype.
macro_rules! row_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
      serde::Serialize, serde::Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl std::fmt::Display for $name {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
      }
    }
  };
}

pub mod audit;
pub mod consent;
pub mod context;
pub mod error;
pub mod notification;
pub mod share_code;
pub mod store;
pub mod user;
pub mod validate;

pub use error::{ConsentRequired, Denial, Error, Result, ValidationErrors};
