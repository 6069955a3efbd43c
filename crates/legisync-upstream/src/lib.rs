//! # legisync-upstream
//!
//! The [`LegislativeSource`] port through which every sync reads upstream
//! data, the typed [`UpstreamError`] classification, and [`CamaraClient`],
//! the reqwest implementation for the Chamber of Deputies open-data API.

pub mod camara;
pub mod error;
pub mod source;

pub use camara::CamaraClient;
pub use error::UpstreamError;
pub use source::{BillQuery, ExpenseQuery, LegislativeSource, PageQuery, VoteQuery, collect_pages};
