//! HTTP API

pub mod aliases;
mod health;
mod meta;
mod router;
mod speech;
mod status;

pub use router::create_router;
