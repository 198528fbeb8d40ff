//! Terminal output helpers for the larder command line
//!
//! - Status lines and headers
//! - Entity tables and refresh state rendering
//! - Spinners for refreshes that take a while

#![warn(missing_docs)]

pub mod output;
pub mod progress;
