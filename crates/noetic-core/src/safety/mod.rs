//! Path & JSON Safety (C1)
//!
//! Two fail-safe, pure operations consumed by the rest of the engine:
//! filesystem path containment checks and prototype-pollution-resistant
//! JSON parsing. Neither ever panics or propagates an error — both degrade
//! to a safe default and log a warning.

mod json;
mod path;

pub use json::{safe_parse_json, safe_parse_json_as};
pub use path::safe_resolve;
