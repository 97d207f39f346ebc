//! Exchange REST plumbing shared by all exchange adapters.

pub mod client;

pub use client::{ErrorDecoder, HttpSettings, RestClient};
