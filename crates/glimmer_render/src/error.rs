//! # Render Error Types
//!
//! Errors produced while creating GPU resources or loading configuration.
//!
//! Resource constructors never hand these to callers: they log them and
//! return a resource in the invalid state. Only configuration parsing
//! returns a [`RenderResult`].

use thiserror::Error;

use crate::backend::{ObjectKind, ShaderStage};

/// Errors that can occur in the render layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The device could not create a GPU object.
    #[error("GPU allocation failed: {kind:?}")]
    AllocationFailed {
        /// What was being created.
        kind: ObjectKind,
    },

    /// A shader stage failed to compile.
    #[error("{stage} shader failed to compile: {log}")]
    ShaderCompile {
        /// Which stage failed.
        stage: ShaderStage,
        /// Driver diagnostic.
        log: String,
    },

    /// The program failed to link.
    #[error("program failed to link: {log}")]
    ProgramLink {
        /// Driver diagnostic.
        log: String,
    },

    /// A vertex channel's length is not a multiple of its component count.
    #[error("vertex channel {channel}: {len} floats is not a multiple of {components} components")]
    ChannelLength {
        /// Channel index in declaration order.
        channel: usize,
        /// Number of floats supplied.
        len: usize,
        /// Components per element.
        components: usize,
    },

    /// Component counts must be 1 to 4.
    #[error("vertex channel {channel}: {components} components per element, expected 1..=4")]
    ChannelComponents {
        /// Channel index in declaration order.
        channel: usize,
        /// Components per element.
        components: usize,
    },

    /// The mesh declares no per-vertex channel.
    #[error("mesh has no per-vertex channel")]
    NoVertexChannel,

    /// The index buffer is empty.
    #[error("index buffer is empty")]
    EmptyIndexBuffer,

    /// An index refers past the end of the vertex data.
    #[error("index {index} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// Offending index value.
        index: u16,
        /// Position in the index buffer.
        position: usize,
        /// Vertices available.
        vertex_count: usize,
    },

    /// The instance layout is unusable.
    #[error("instance layout: {0}")]
    InstanceLayout(String),

    /// Configuration text could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Configuration parsed but holds unusable values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<toml::de::Error> for RenderError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;
