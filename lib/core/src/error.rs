//! Error handling foundation for kubebrowser.
//!
//! Only the `Result` alias lives here. Each crate owns its error kinds and
//! wraps them in a rootcause `Report` as they cross layer boundaries.

use rootcause::Report;

/// A Result type alias using rootcause's Report.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
