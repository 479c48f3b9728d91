//! sx-core: shared foundation for the stellarator explorer.
//!
//! Contains:
//! - ids (stable configuration identifiers)
//! - record (configuration rows as read from the database)
//! - order (model order and the single order-selection rule)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod order;
pub mod record;

pub use error::{CoreError, CoreResult};
pub use ids::ConfigId;
pub use order::{ModelOrder, determine_order};
pub use record::ConfigurationRecord;
