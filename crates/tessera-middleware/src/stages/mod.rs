//! Built-in stages.
//!
//! - [`cors`] - CORS headers and preflight answers, mounted first
//! - [`cookies`] - `Cookie` header parsing, mounted after CORS
//! - [`error_translator`] - failures to status-only responses

pub mod cookies;
pub mod cors;
pub mod error_translator;

pub use cookies::{CookieParser, Cookies};
pub use cors::CorsMiddleware;
pub use error_translator::ErrorTranslator;
