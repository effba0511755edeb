//! Conversions between Parsely values and other data formats.
//!
//! Decoders are used for `.json`, `.yaml`/`.yml` and `.toml` lookup targets;
//! encoders back the command-line tool's output formats. Both report
//! failures as plain messages, which callers wrap in their own error types.

pub mod json;
pub mod toml;
pub mod yaml;
