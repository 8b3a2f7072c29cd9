//! Utility functions shared by the client and the CLI.
//!
//! - **Text**: HTML stripping and terminal-safe, width-aware output
//! - **Age**: "N days ago" rendering of entry timestamps
//! - **URL validation**: scheme and host checks before probing or opening a URL

mod age;
mod text;
mod url_validator;

pub use age::{age_in_days, epoch_to_millis, format_age, format_age_days};
pub use text::{display_width, strip_control_chars, strip_html, terminal_line, truncate_to_width};
pub use url_validator::{validate_url, validate_url_for_open, UrlValidationError};
