//! Dotted/indexed addressing into JSON trees
//!
//! Addresses look like `a.b.c`, `list[2]` or `list[-1]`. Reads through
//! [`resolve`] treat any problem as "absent"; writes through
//! [`ensure_and_set`] reject malformed addresses with a [`PathError`].

pub mod address;
pub mod navigate;

pub use address::{PathAddress, Segment};
pub use navigate::{ensure_and_set, resolve, resolve_mut, NodeValue};

use thiserror::Error;

/// Address syntax errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Empty segment in address: {0:?}")]
    EmptySegment(String),

    #[error("Unbalanced brackets in address: {0:?}")]
    Unbalanced(String),

    #[error("Invalid index {index:?} in address: {address:?}")]
    InvalidIndex { address: String, index: String },
}
