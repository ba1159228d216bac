//! HTTP transport layer for the Vertex AI client.

mod error;
mod http;
mod reqwest;
pub mod endpoints;

pub use error::TransportError;
pub use http::{HttpRequest, HttpResponse, HttpTransport};
pub use self::reqwest::ReqwestTransport;
