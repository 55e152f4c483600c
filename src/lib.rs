#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
pub mod core;

#[cfg(feature = "desktop")]
pub mod app;
#[cfg(feature = "desktop")]
pub use app::run;
