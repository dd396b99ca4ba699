//! Match lifecycle and turn services

pub mod service;

pub use service::{MatchService, ServiceError};
