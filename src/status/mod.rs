//! Status event data model.
//!
//! ## Contents
//! - [`StatusMessage`] one status event, also used as a wildcard matcher
//! - [`Origin`], [`Severity`] enumerations encoded in the numeric code
//! - [`StatusCode`] catalogue of application codes and [`bus_code`]

mod code;
mod message;

pub use code::{MAX_APP_CODE, StatusCode, bus_code, split_bus_code};
pub use message::{Origin, Severity, StatusMessage, format_code, normalize};
