pub mod calibrate;
pub mod config;
pub mod convert;
pub mod embed;
pub mod error;
pub mod memory;
pub mod persistence;
pub mod protocol;
pub mod server;
pub mod sparse;
pub mod store;
pub mod transport;
pub mod types;
