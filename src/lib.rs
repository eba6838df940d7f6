//! zerorpc client implementation in Rust.
//!
//! zerorpc is request/reply RPC over ZeroMQ. Every message is a MessagePack
//! array of three elements: a header map carrying a unique `message_id`, the
//! method name, and the argument array. A reply carries the return value as
//! the single element of its argument array.
//!
//! To call a remote method:
//! 1. Create a `Client` with `Client::new(endpoint, None)`, or configure one
//!    with `Client::builder()`
//! 2. Call `client.invoke(method, &args)` and inspect the returned `Value`
//! 3. Call `client.close()` when done
//!
//! Calls are blocking: one request is sent and the caller waits for exactly
//! one reply. The ZeroMQ sockets run on a `Context`, which is shared between
//! clients and defaults to a process-wide instance.
//!
//! Uses `zeromq` for the transport and `rmpv` for MessagePack serialization.

mod client;
mod diagnostics;
mod envelope;
mod error;
mod transport;

pub use client::*;
pub use diagnostics::*;
pub use envelope::*;
pub use error::*;
pub use transport::*;

pub use rmpv::Value;
