//! In-process specialist implementations.

mod customer_data;
mod support;

pub use customer_data::CustomerDataSpecialist;
pub use support::SupportSpecialist;
