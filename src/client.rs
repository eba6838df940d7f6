//! The zerorpc client.
//!
//! A [`Client`] owns a single REQ socket. Each [`Client::invoke`] sends one
//! request envelope and blocks until the matching reply arrives, then returns
//! the first element of the reply's arguments.
#[cfg(feature = "serde")]
use std::io::Cursor;
use std::{fmt, sync::Arc};

use bytes::Bytes;
use rmpv::Value;
#[cfg(feature = "serde")]
use rmpv::{decode::read_value, encode::write_value};
#[cfg(feature = "serde")]
use serde::{de::DeserializeOwned, Serialize};
use tracing::trace;

#[cfg(feature = "serde")]
use crate::error::{EncodeError, ProtocolError};
use crate::{
    diagnostics::{Diagnostic, DiagnosticSink, TracingSink},
    envelope::Envelope,
    error::{Result, RpcError},
    transport::{Context, SocketKind, Transport, ZmqSocket},
};

/// Lifecycle of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Created, not yet connected.
    Disconnected,
    /// Connected to at least one endpoint; calls are allowed.
    Connected,
    /// Closed; the socket has been released.
    Closed,
}

/// A zerorpc client over a REQ socket.
///
/// Calls block the current thread and must not be made from inside an async
/// task when using the ZeroMQ transport. There is no timeout: a call to a
/// peer that never answers blocks forever.
pub struct Client<T: Transport = ZmqSocket> {
    /// The owned socket.
    transport: T,
    state: State,
    /// Whether diagnostics are emitted.
    verbose: bool,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl Client<ZmqSocket> {
    /// Creates a client connected to `endpoint`.
    ///
    /// Without an explicit context the process-wide default from
    /// [`Context::global`] is used.
    pub fn new(endpoint: &str, context: Option<&Context>) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(context) = context {
            builder = builder.context(context);
        }
        builder.connect(endpoint)
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }
}

impl<T: Transport> Client<T> {
    /// Wraps an existing transport. The client starts out disconnected.
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            state: State::Disconnected,
            verbose: false,
            diagnostics: Arc::new(TracingSink),
        }
    }

    /// Connects the socket to `endpoint`.
    ///
    /// Connecting a connected client adds the endpoint to the socket, which
    /// then spreads requests across all of them.
    pub fn connect(&mut self, endpoint: &str) -> Result<()> {
        if self.state == State::Closed {
            return Err(RpcError::Closed);
        }
        self.emit(Diagnostic::Connecting { endpoint });
        self.transport.connect(endpoint)?;
        self.state = State::Connected;
        Ok(())
    }

    /// Calls `method` on the remote end and returns its result.
    ///
    /// Fails with [`RpcError::NotConnected`] before [`Client::connect`] and
    /// [`RpcError::Closed`] after [`Client::close`], without sending anything.
    /// The client stays connected after any other error.
    pub fn invoke(&mut self, method: &str, args: &[Value]) -> Result<Value> {
        match self.state {
            State::Connected => {}
            State::Disconnected => return Err(RpcError::NotConnected),
            State::Closed => return Err(RpcError::Closed),
        }

        let request = Envelope::request(method, args.to_vec());
        let message_id = request.header.message_id().unwrap_or_default().to_string();
        let frame = Bytes::from(request.encode()?);
        self.emit(Diagnostic::Request {
            method,
            message_id: &message_id,
            frame: &frame,
        });
        trace!("invoking {} with {} args", method, args.len());
        self.transport.send(frame)?;

        let raw = self.transport.recv()?;
        self.emit(Diagnostic::Response { frame: &raw });
        let reply = Envelope::decode(&raw)?;
        self.emit(Diagnostic::Reply {
            header: &reply.header,
            name: &reply.name,
        });
        Ok(reply.into_return_value()?)
    }

    /// Calls `method` with typed arguments and deserializes the result.
    ///
    /// If `req` encodes to an array, its elements become the arguments.
    /// Otherwise it is sent as the only argument.
    #[cfg(feature = "serde")]
    pub fn call<Req, Resp>(&mut self, method: &str, req: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let args = serialize_args(req)?;
        let value = self.invoke(method, &args)?;
        deserialize_result(&value)
    }

    /// Releases the socket. Closing a closed client does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.state == State::Closed {
            return Ok(());
        }
        self.state = State::Closed;
        self.transport.close()?;
        Ok(())
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == State::Connected
    }

    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Turns diagnostics on or off.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Replaces the diagnostic sink.
    pub fn set_diagnostics(&mut self, sink: impl DiagnosticSink + 'static) {
        self.diagnostics = Arc::new(sink);
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn emit(&self, diagnostic: Diagnostic<'_>) {
        if self.verbose {
            self.diagnostics.emit(&diagnostic);
        }
    }
}

impl<T: Transport + fmt::Debug> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("transport", &self.transport)
            .field("state", &self.state)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "serde")]
/// Serializes typed arguments into a zerorpc argument array.
fn serialize_args<Req>(req: &Req) -> Result<Vec<Value>>
where
    Req: Serialize,
{
    let buf = rmp_serde::to_vec(req).map_err(EncodeError::from)?;
    let value = read_value(&mut Cursor::new(buf)).map_err(ProtocolError::from)?;
    match value {
        Value::Array(values) => Ok(values),
        value => Ok(vec![value]),
    }
}

#[cfg(feature = "serde")]
/// Deserializes a typed result from a returned value.
fn deserialize_result<Resp>(value: &Value) -> Result<Resp>
where
    Resp: DeserializeOwned,
{
    let mut buf = Vec::new();
    write_value(&mut buf, value).map_err(EncodeError::from)?;
    Ok(rmp_serde::from_slice(&buf).map_err(ProtocolError::from)?)
}

/// Options for creating a ZeroMQ-backed [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    context: Option<Context>,
    verbose: bool,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
}

impl ClientBuilder {
    /// Uses `context` instead of the process-wide default.
    pub fn context(mut self, context: &Context) -> Self {
        self.context = Some(context.clone());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Sends diagnostics to `sink` instead of `tracing`.
    pub fn diagnostics(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.diagnostics = Some(Arc::new(sink));
        self
    }

    /// Opens the socket without connecting it.
    pub fn build(mut self) -> Result<Client<ZmqSocket>> {
        let context = match self.context.take() {
            Some(context) => context,
            None => Context::global()?.clone(),
        };
        let socket = context.socket(SocketKind::Req)?;
        Ok(self.finish(socket))
    }

    /// Opens the socket and connects it to `endpoint`.
    pub fn connect(self, endpoint: &str) -> Result<Client<ZmqSocket>> {
        let mut client = self.build()?;
        client.connect(endpoint)?;
        Ok(client)
    }

    /// Applies the options to a client over `transport`. The client starts
    /// out disconnected.
    pub fn transport<T: Transport>(self, transport: T) -> Client<T> {
        self.finish(transport)
    }

    fn finish<T: Transport>(self, transport: T) -> Client<T> {
        let mut client = Client::with_transport(transport);
        client.verbose = self.verbose;
        if let Some(diagnostics) = self.diagnostics {
            client.diagnostics = diagnostics;
        }
        client
    }
}
