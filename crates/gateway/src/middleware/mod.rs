//! Gateway middleware and request extractors

pub mod metrics;
pub mod session;
