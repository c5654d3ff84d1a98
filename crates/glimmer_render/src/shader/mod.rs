//! # Shader Programs
//!
//! [`ShaderProgram`] compiles a vertex + fragment pair, links it, and caches
//! uniform and attribute locations by name. Source text comes from the
//! caller; [`sources`] carries the built-in particle pair.

mod program;
pub mod sources;

pub use program::ShaderProgram;
