pub mod analytics;
pub mod compliance;
pub mod device;
pub mod error;
pub mod event;
pub mod label;
pub mod line;
pub mod repository;
pub mod schedule;

pub use error::{DomainError, DomainResult};
