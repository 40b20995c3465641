//! HTTP transport layer.
//!
//! The connector talks to the server through the [`HttpTransport`] trait so
//! that workflows can be exercised against a mock transport in tests. The
//! production implementation is [`ReqwestTransport`], built once per
//! reconciliation run from the connection configuration.

mod http;
mod multipart;
mod reqwest;

pub use self::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
pub use self::multipart::MultipartForm;
pub use self::reqwest::ReqwestTransport;
