//! The streaming transform pipeline: token filtering, finalization,
//! and the per-request relay that ties them to a backend stream.

pub mod filter;
pub mod finalize;
pub mod relay;

pub use filter::{FilterAction, FilterState, TokenFilter, EXCLUSION_FRAGMENTS};
pub use finalize::{finalize, wrap_plain_text, FinalizeOutcome, StructuredResult};
pub use relay::{complete_generation, run_relay, RelayEnd};
