//! Message transport for zerorpc clients.
//!
//! Provides the socket kinds understood by ZeroMQ, the [`Transport`] trait the
//! client talks to, and a ZeroMQ implementation of it. A [`Context`] hosts the
//! background I/O of its sockets on a small tokio runtime; socket operations
//! block the calling thread until that I/O completes.

use std::{
    collections::VecDeque,
    sync::{Arc, OnceLock},
};

use bytes::Bytes;
use tokio::runtime::{Builder, Runtime};
use tracing::{trace, warn};
use zeromq::{Endpoint, ReqSocket, Socket, SocketRecv, SocketSend, ZmqError, ZmqMessage};

use crate::error::TransportError;

/// ZeroMQ messaging patterns.
///
/// Only [`SocketKind::Req`] is used by the RPC client; the rest are tags for
/// callers that work with the transport directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketKind {
    Pair,
    Pub,
    Sub,
    Req,
    Rep,
    Dealer,
    Router,
    Pull,
    Push,
    XPub,
    XSub,
}

/// A bidirectional, message-oriented socket.
///
/// Each call blocks until the operation completes. A socket in the REQ role
/// must alternate `send` and `recv`; the implementation decides whether a
/// violation fails or blocks.
pub trait Transport {
    /// Connects to an endpoint such as `tcp://host:port` or `ipc://path`.
    ///
    /// Returns without waiting for the peer to be reachable.
    fn connect(&mut self, endpoint: &str) -> Result<(), TransportError>;

    /// Sends one message consisting of a single frame.
    fn send(&mut self, frame: Bytes) -> Result<(), TransportError>;

    /// Waits for the next message and returns its first frame.
    fn recv(&mut self) -> Result<Bytes, TransportError>;

    /// Releases the socket. Further operations fail with [`TransportError::Closed`].
    fn close(&mut self) -> Result<(), TransportError>;
}

static GLOBAL_CONTEXT: OnceLock<Context> = OnceLock::new();

/// A transport context, shared by all sockets opened from it.
///
/// Cloning is cheap; clones refer to the same runtime. Blocking socket calls
/// must not be made from inside an async task.
#[derive(Clone, Debug)]
pub struct Context {
    runtime: Arc<Runtime>,
}

impl Context {
    /// Creates a new context with its own I/O thread.
    pub fn new() -> Result<Self, TransportError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("zerorpc-io")
            .enable_all()
            .build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }

    /// Returns the process-wide default context, creating it on first use.
    ///
    /// The first successful caller wins and the context lives until the
    /// process exits. There is no way to replace or tear it down.
    pub fn global() -> Result<&'static Context, TransportError> {
        if let Some(context) = GLOBAL_CONTEXT.get() {
            return Ok(context);
        }
        let context = Self::new()?;
        Ok(GLOBAL_CONTEXT.get_or_init(|| context))
    }

    /// Opens a socket of the given kind. Only REQ sockets are supported.
    pub fn socket(&self, kind: SocketKind) -> Result<ZmqSocket, TransportError> {
        match kind {
            SocketKind::Req => {
                let _guard = self.runtime.enter();
                Ok(ZmqSocket {
                    context: self.clone(),
                    socket: Some(ReqSocket::new()),
                    pending: VecDeque::new(),
                })
            }
            other => Err(TransportError::UnsupportedSocketKind(other)),
        }
    }
}

/// A ZeroMQ REQ socket driven by its context's runtime.
///
/// Like libzmq, `connect` only records the endpoint. The connection is made
/// before the next send, so a client can be created before its server is up
/// and the wait for the peer happens inside the call.
pub struct ZmqSocket {
    context: Context,
    /// `None` once closed.
    socket: Option<ReqSocket>,
    /// Validated endpoints not yet connected.
    pending: VecDeque<String>,
}

impl ZmqSocket {
    pub fn kind(&self) -> SocketKind {
        SocketKind::Req
    }

    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    /// Endpoints that will be connected before the next send.
    pub fn pending_endpoints(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }
}

impl std::fmt::Debug for ZmqSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZmqSocket")
            .field("kind", &self.kind())
            .field("closed", &self.is_closed())
            .field("pending", &self.pending)
            .finish()
    }
}

impl Transport for ZmqSocket {
    fn connect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        if self.socket.is_none() {
            return Err(TransportError::Closed);
        }
        endpoint.parse::<Endpoint>().map_err(ZmqError::from)?;
        trace!("queued connect to {}", endpoint);
        self.pending.push_back(endpoint.to_string());
        Ok(())
    }

    fn send(&mut self, frame: Bytes) -> Result<(), TransportError> {
        let socket = self.socket.as_mut().ok_or(TransportError::Closed)?;
        // Blocks until the peer accepts. An endpoint stays queued if it fails.
        while let Some(endpoint) = self.pending.front() {
            self.context.runtime.block_on(socket.connect(endpoint))?;
            trace!("connected to {}", endpoint);
            self.pending.pop_front();
        }
        trace!("sending frame of {} bytes", frame.len());
        self.context
            .runtime
            .block_on(socket.send(ZmqMessage::from(frame)))?;
        Ok(())
    }

    fn recv(&mut self) -> Result<Bytes, TransportError> {
        let socket = self.socket.as_mut().ok_or(TransportError::Closed)?;
        let message = self.context.runtime.block_on(socket.recv())?;
        let mut frames = message.into_vecdeque();
        if frames.len() > 1 {
            warn!("ignoring {} extra frames in reply", frames.len() - 1);
        }
        let frame = frames.pop_front().ok_or(TransportError::EmptyMessage)?;
        trace!("received frame of {} bytes", frame.len());
        Ok(frame)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.pending.clear();
        let Some(socket) = self.socket.take() else {
            return Ok(());
        };
        let mut errors = self.context.runtime.block_on(socket.close()).into_iter();
        let first = errors.next();
        for e in errors {
            warn!("error closing socket: {}", e);
        }
        match first {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

impl Drop for ZmqSocket {
    fn drop(&mut self) {
        if let Some(socket) = self.socket.take() {
            let _guard = self.context.runtime.enter();
            drop(socket);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_req_sockets_open() {
        let context = Context::new().unwrap();
        let socket = context.socket(SocketKind::Req).unwrap();
        assert_eq!(socket.kind(), SocketKind::Req);
        assert!(!socket.is_closed());

        for kind in [
            SocketKind::Pair,
            SocketKind::Pub,
            SocketKind::Sub,
            SocketKind::Rep,
            SocketKind::Dealer,
            SocketKind::Router,
            SocketKind::Pull,
            SocketKind::Push,
            SocketKind::XPub,
            SocketKind::XSub,
        ] {
            match context.socket(kind) {
                Err(TransportError::UnsupportedSocketKind(k)) => assert_eq!(k, kind),
                other => panic!("expected UnsupportedSocketKind for {:?}, got {:?}", kind, other),
            }
        }
    }

    #[test]
    fn test_global_context_is_shared() {
        let first = Context::global().unwrap();
        let second = Context::global().unwrap();
        assert!(Arc::ptr_eq(&first.runtime, &second.runtime));
    }

    #[test]
    fn test_closed_socket_rejects_operations() {
        let context = Context::new().unwrap();
        let mut socket = context.socket(SocketKind::Req).unwrap();
        socket.close().unwrap();
        assert!(socket.is_closed());
        // closing twice is a no-op
        socket.close().unwrap();
        assert!(matches!(
            socket.send(Bytes::from_static(b"x")),
            Err(TransportError::Closed)
        ));
        assert!(matches!(socket.recv(), Err(TransportError::Closed)));
        assert!(matches!(
            socket.connect("tcp://127.0.0.1:1"),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn test_connect_does_not_wait_for_peer() {
        let context = Context::new().unwrap();
        let mut socket = context.socket(SocketKind::Req).unwrap();
        // nothing listens on port 1
        socket.connect("tcp://127.0.0.1:1").unwrap();
        socket.connect("ipc:///tmp/zerorpc-unbound.sock").unwrap();
        assert_eq!(
            socket.pending_endpoints().collect::<Vec<_>>(),
            ["tcp://127.0.0.1:1", "ipc:///tmp/zerorpc-unbound.sock"]
        );
        socket.close().unwrap();
        assert_eq!(socket.pending_endpoints().count(), 0);
    }

    #[test]
    fn test_malformed_endpoint() {
        let context = Context::new().unwrap();
        let mut socket = context.socket(SocketKind::Req).unwrap();
        assert!(matches!(
            socket.connect("not an endpoint"),
            Err(TransportError::Zmq(_))
        ));
    }
}
