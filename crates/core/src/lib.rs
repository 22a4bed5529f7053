// crates/core/src/lib.rs
pub mod aggregate;
pub mod entry;
pub mod error;
pub mod paths;
pub mod tags;
pub mod types;
pub mod validation;

pub use aggregate::*;
pub use entry::*;
pub use error::*;
pub use tags::{join_tags, parse_tags};
pub use types::*;
