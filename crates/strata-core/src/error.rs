use thiserror::Error;

/// Errors surfaced to callers of the chunk grid.
#[derive(Debug, Error, PartialEq)]
pub enum StrataError {
    #[error("invalid grid configuration: {0}")]
    InvalidConfig(String),

    #[error("world position is not finite: ({x}, {y}, {z})")]
    NonFinitePosition { x: f32, y: f32, z: f32 },

    #[error("failed to parse grid config RON: {0}")]
    ConfigParse(String),
}
