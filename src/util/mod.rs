//! URI helpers.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `query` | Ordered query parameters and component escaping |
//! | `yeast` | Cache-busting id generator |

/// Ordered query parameters.
pub mod query;

/// Cache-busting id generator.
pub mod yeast;

pub use query::Query;
