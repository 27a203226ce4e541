//! Common module - Types, errors and seams shared by every component

pub mod channels;
pub mod errors;
pub mod traits;
pub mod types;
