//! # skiff-common
//!
//! Shared utilities and types for the skiff container runtime:
//! - Container ID generation and validation
//! - Standard filesystem paths
//! - Memory-quantity parsing for resource limits
//! - Common error types

#![warn(missing_docs)]

pub mod error;
pub mod id;
pub mod paths;
pub mod resource;

pub use error::{SkiffError, SkiffResult};
pub use id::ContainerId;
pub use paths::SkiffPaths;
pub use resource::ResourceQuantity;
