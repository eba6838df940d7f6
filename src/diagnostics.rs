//! Verbose diagnostics emitted by a client.
//!
//! Diagnostics are only produced when a client is verbose. They go to a
//! [`DiagnosticSink`], which by default forwards them to `tracing`.

use std::fmt;

use rmpv::Value;

use crate::envelope::Header;

/// A diagnostic event. Borrows from the call that produced it.
#[derive(Debug, Clone, Copy)]
pub enum Diagnostic<'a> {
    /// About to connect to an endpoint.
    Connecting { endpoint: &'a str },
    /// A request frame is about to be sent.
    Request {
        method: &'a str,
        message_id: &'a str,
        frame: &'a [u8],
    },
    /// A raw reply frame was received.
    Response { frame: &'a [u8] },
    /// A reply was decoded.
    Reply { header: &'a Header, name: &'a str },
}

impl fmt::Display for Diagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Connecting { endpoint } => write!(f, "Connecting to \"{}\"", endpoint),
            Diagnostic::Request {
                method,
                message_id,
                frame,
            } => write!(
                f,
                "request: {} ({}) {} bytes: {:02x?}",
                method,
                message_id,
                frame.len(),
                frame
            ),
            Diagnostic::Response { frame } => {
                write!(f, "response: {} bytes: {:02x?}", frame.len(), frame)
            }
            Diagnostic::Reply { header, name } => {
                write!(f, "reply \"{}\" header: {{", name)?;
                for (i, (key, value)) in header.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_entry(f, key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn write_entry(f: &mut fmt::Formatter<'_>, key: &Value, value: &Value) -> fmt::Result {
    write_plain(f, key)?;
    write!(f, " = ")?;
    write_plain(f, value)
}

/// Strings are written without quotes.
fn write_plain(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value.as_str() {
        Some(s) => write!(f, "{}", s),
        None => write!(f, "{}", value),
    }
}

/// Receives diagnostics from a verbose client.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, diagnostic: &Diagnostic<'_>);
}

impl<F> DiagnosticSink for F
where
    F: Fn(&Diagnostic<'_>) + Send + Sync,
{
    fn emit(&self, diagnostic: &Diagnostic<'_>) {
        self(diagnostic)
    }
}

/// Forwards diagnostics to `tracing` at `INFO` under the `zerorpc` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, diagnostic: &Diagnostic<'_>) {
        tracing::info!(target: "zerorpc", "{}", diagnostic);
    }
}

/// Writes diagnostics straight to standard error, one line each.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn emit(&self, diagnostic: &Diagnostic<'_>) {
        eprintln!("zerorpc: {}", diagnostic);
    }
}
