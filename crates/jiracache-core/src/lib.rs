pub mod cache;
pub mod config;
pub mod correlator;
pub mod paths;
pub mod push;
pub mod selection;
pub mod session;
