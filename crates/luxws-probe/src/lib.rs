//! Library half of the `luxws-probe` binary.
//!
//! Split out of `main.rs` so the config schema and the renderers can be unit
//! tested without a controller.
//!
//! ```text
//! luxws-probe
//!   config/   optional TOML file: [controller] and [probe] sections
//!   render/   content tree → indented text or JSON
//! ```

pub mod config;
pub mod render;
