//! REST boundary
//!
//! Factories talk to the backend through the [`RestTransport`] trait. [`HttpTransport`]
//! is the reqwest implementation used by applications.

pub mod client;
pub mod constants;
pub mod transport;

pub use client::HttpTransport;
pub use transport::{Method, RestError, RestRequest, RestTransport};
