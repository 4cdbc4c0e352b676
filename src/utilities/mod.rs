//! Cross-cutting helpers: errors, metrics, text processing and token
//! budgeting.

pub mod errors;
pub mod metrics;
pub mod text_processing;
pub mod token_counter;

pub use errors::{ServiceError, ServiceResult};
pub use metrics::Metrics;
