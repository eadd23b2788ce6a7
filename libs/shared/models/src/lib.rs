pub mod auth;
pub mod error;
pub mod interval;
pub mod scheduling;
