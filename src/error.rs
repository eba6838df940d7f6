use std::io;
use thiserror::Error;

use crate::transport::SocketKind;

/// Errors that can occur during RPC operations.
#[derive(Error, Debug)]
pub enum RpcError {
    /// The request could not be encoded. Nothing was sent.
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The transport failed to connect, send or receive.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A reply was received but is not a well-formed envelope.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// `invoke` was called before the client was connected.
    #[error("Client is not connected")]
    NotConnected,

    /// The client has been closed.
    #[error("Client is closed")]
    Closed,
}

/// A request argument or header value could not be represented in MessagePack.
#[derive(Error, Debug)]
pub enum EncodeError {
    /// Error writing a MessagePack value.
    #[error("MessagePack write failed: {0}")]
    Value(#[from] rmpv::encode::Error),

    /// Error serializing a typed request.
    #[cfg(feature = "serde")]
    #[error("Serialization failed: {0}")]
    Serde(#[from] rmp_serde::encode::Error),
}

/// Failures of the underlying message transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Error reported by the ZeroMQ socket.
    #[error("ZeroMQ error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    /// I/O error, including failure to start the transport runtime.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transport cannot open sockets of this kind.
    #[error("Unsupported socket kind: {0:?}")]
    UnsupportedSocketKind(SocketKind),

    /// A message arrived with no frames.
    #[error("Received a message with no frames")]
    EmptyMessage,

    /// The socket has already been closed.
    #[error("Socket is closed")]
    Closed,
}

/// A received reply is not a valid zerorpc envelope.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The bytes are not valid MessagePack.
    #[error("Invalid MessagePack: {0}")]
    Decode(#[from] rmpv::decode::Error),

    /// The top-level value is not an array.
    #[error("Envelope is not an array")]
    NotAnArray,

    /// The top-level array has fewer than three elements.
    #[error("Envelope has {len} elements, expected 3")]
    TooShort { len: usize },

    /// The first element is not a map.
    #[error("Envelope header is not a map")]
    InvalidHeader,

    /// The second element is not a string.
    #[error("Envelope name is not a string")]
    InvalidName,

    /// The third element is not an array.
    #[error("Envelope arguments are not an array")]
    InvalidArgs,

    /// The reply carries no return value.
    #[error("Reply has an empty argument list")]
    EmptyReply,

    /// The return value does not match the requested type.
    #[cfg(feature = "serde")]
    #[error("Deserialization failed: {0}")]
    Deserialize(#[from] rmp_serde::decode::Error),
}

pub type Result<T> = std::result::Result<T, RpcError>;
