//! Utility functions for common operations.
//!
//! - **URL validation**: scheme and host policy for source and API URLs
//! - **Text processing**: excerpts, terminal-width truncation, control-char stripping

mod text;
mod url_validator;

pub use text::{
    collapse_whitespace, display_width, excerpt_head, strip_control_chars, truncate_to_width,
    EXCERPT_CHARS,
};
pub use url_validator::{is_secure_or_loopback, validate_url, UrlValidationError};
