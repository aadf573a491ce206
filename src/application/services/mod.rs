//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on the FileSystem boundary trait but are themselves
//! concrete structs, not traits.

mod build;
mod dataset;
mod layout;

pub use build::{BuildService, Session};
pub use dataset::DatasetService;
pub use layout::{LayoutService, NodeLine};
