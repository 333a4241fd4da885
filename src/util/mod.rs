//! Utility functions shared by the API clients, storage and the CLI.
//!
//! - **Text processing**: control-character stripping and width-aware truncation
//!   for printing untrusted API text to a terminal
//! - **Percent-encoding**: form-style encode/decode used to pass article URLs
//!   around as opaque tokens
//! - **Serde helpers**: lenient deserialization of nullable API fields
//!
//! # Examples
//!
//! ```
//! use newsdesk::util::{decode, encode, truncate_to_width};
//!
//! assert_eq!(encode("Hello World"), "Hello+World");
//! assert_eq!(decode("Hello+World").unwrap(), "Hello World");
//! assert_eq!(truncate_to_width("Breaking news today", 11), "Breaking...");
//! ```

mod encoding;
mod text;

use serde::{Deserialize, Deserializer};

pub use encoding::{decode, encode, DecodeError};
pub use text::{display_width, strip_control_chars, truncate_to_width};

/// Deserialize a field that the remote API may send as JSON `null`, falling back
/// to the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
