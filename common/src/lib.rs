//! Tally Common Types
//!
//! Shared types used across the Tally ledger: identifiers, the positive
//! monetary amount, the error taxonomy and the commit clock.

pub mod identifiers;
pub mod monetary;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
pub use time::*;
