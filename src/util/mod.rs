//! Utility functions shared by the engine and the CLI.
//!
//! - **Endpoint validation**: store and relay URLs must be HTTPS (localhost excepted)
//! - **Text processing**: single-line sanitizing and display-width truncation for terminal output

mod text;
mod url_validator;

pub use text::{display_width, single_line, truncate_to_width};
pub use url_validator::{validate_endpoint, UrlValidationError};
