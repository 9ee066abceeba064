//! Business logic services
//!
//! Services orchestrate the payment operations and coordinate with the
//! infrastructure layer; handlers stay thin on top of them.

pub mod callback_service;
pub mod mpesa_service;
pub mod reconcile_service;
pub mod signature;
