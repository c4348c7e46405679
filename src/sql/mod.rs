//! SQL text handling: extraction from model replies, canonicalization,
//! and read-only validation against the table allow-list.
//!
//! Everything in this module is a pure text transform. Nothing here talks
//! to the database or the model endpoint.

pub mod extract;
pub mod sanitize;
pub mod validate;

pub use extract::extract_sql;
pub use sanitize::{apply_row_cap, sanitize_sql};
pub use validate::validate_sql;
