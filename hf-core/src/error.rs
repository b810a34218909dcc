//! Re-export of the crate-wide error type.
//!
//! hf-core has no error variants of its own; everything funnels through
//! `hf-error` so the daemon can map a single enum onto RPC error codes.

pub use hf_error::{HyperfanError, Result};
