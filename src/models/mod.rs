pub mod config;
pub mod keys;
pub mod reading;
pub mod region;
