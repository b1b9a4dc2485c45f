//! pollsync-core: pure poll model and derived-value logic.
//!
//! Everything here is deterministic and I/O free: the poll data model, the
//! clock projector (time remaining), the tally evaluator (percentages and
//! winner), and the projection of a poll into a render-ready view.

pub mod clock;
pub mod error;
pub mod tally;
pub mod types;
pub mod view;

pub use error::PollError;
