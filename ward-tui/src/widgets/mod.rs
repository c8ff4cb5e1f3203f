//! Reusable widget components.

pub mod detail;
pub mod filter;
pub mod status;

pub use detail::DetailPanel;
pub use filter::SearchBar;
pub use status::{describe_entry, StatusIndicator};
