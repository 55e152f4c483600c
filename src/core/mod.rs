pub mod config;
pub mod contacts;
pub mod dispatch;
pub mod error;
pub mod intake;
pub mod model;
