//! Error types for screenwire

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenWireError {
    /// Binding the listener socket failed. Fatal: the receiver cannot start.
    #[error("Failed to bind UDP listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A length prefix declared a payload beyond the sanity ceiling.
    /// There is no resync token in the protocol, so the connection closes.
    #[error("Declared frame length {declared} exceeds limit {limit}")]
    MalformedLength { declared: u32, limit: u32 },

    /// Payload bytes carry no known image container header.
    #[error("Payload is not a recognized image format")]
    UnrecognizedImage,

    /// Raw pixel payload disagrees with the configured geometry.
    #[error("Pixel payload is {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    /// The pixel buffer allocation was refused.
    #[error("Failed to allocate {bytes} byte pixel buffer")]
    AllocationFailed { bytes: usize },
}

pub type Result<T> = std::result::Result<T, ScreenWireError>;
