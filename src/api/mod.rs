//! OKX v5 REST transport: wire types, the endpoint trait, and the signed HTTP client.

mod client;
mod rest;
pub mod types;

pub use client::OkxClient;
pub use rest::OkxApi;
