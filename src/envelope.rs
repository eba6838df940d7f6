//! The zerorpc envelope and its MessagePack encoding.
//!
//! Every zerorpc message is a three element array: a header map, an event
//! name and an argument array. Requests carry a freshly generated
//! `message_id` in the header; replies carry the return value as the single
//! element of the argument array.
use rmpv::Value;
use uuid::Uuid;

use crate::error::{EncodeError, ProtocolError};

/// Header key carrying the per-request identifier.
pub const MESSAGE_ID: &str = "message_id";

/// The header map of an envelope.
///
/// Entries are kept in wire order. Keys and values are arbitrary MessagePack
/// values, so headers from peers that send extra fields survive a decode
/// untouched.
#[derive(PartialEq, Clone, Debug, Default)]
pub struct Header(Vec<(Value, Value)>);

impl Header {
    /// Creates an empty header.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Creates a header holding only a new random `message_id`.
    pub fn with_message_id() -> Self {
        let mut header = Self::new();
        header.insert(MESSAGE_ID, Uuid::new_v4().to_string());
        header
    }

    /// Returns the `message_id` entry, if present and a string.
    pub fn message_id(&self) -> Option<&str> {
        self.get(MESSAGE_ID).and_then(Value::as_str)
    }

    /// Looks up the value for a string key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Sets `key` to `value`, returning the previous value if the key was present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| k.as_str() == Some(key.as_str())) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.0.push((Value::from(key), value));
                None
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Header> for Value {
    fn from(header: Header) -> Self {
        Value::Map(header.0)
    }
}

/// A zerorpc message: header, event name and arguments.
#[derive(PartialEq, Clone, Debug)]
pub struct Envelope {
    pub header: Header,
    pub name: String,
    pub args: Vec<Value>,
}

impl Envelope {
    pub fn new(header: Header, name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            header,
            name: name.into(),
            args,
        }
    }

    /// Builds a request envelope for `method` with a new `message_id`.
    pub fn request(method: &str, args: Vec<Value>) -> Self {
        Self::new(Header::with_message_id(), method, args)
    }

    /// Converts the envelope to its wire shape, `[header, name, args]`.
    pub fn to_value(&self) -> Value {
        self.clone().into_value()
    }

    /// Consumes the envelope, producing its wire shape.
    pub fn into_value(self) -> Value {
        Value::Array(vec![
            self.header.into(),
            Value::from(self.name),
            Value::Array(self.args),
        ])
    }

    /// Parses an envelope out of a decoded MessagePack value.
    ///
    /// The value must be an array of at least three elements: a map, a string
    /// and an array. Elements past the third are ignored.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Array(elements) = value else {
            return Err(ProtocolError::NotAnArray);
        };
        if elements.len() < 3 {
            return Err(ProtocolError::TooShort {
                len: elements.len(),
            });
        }
        let mut elements = elements.into_iter();
        let header = match elements.next() {
            Some(Value::Map(entries)) => Header(entries),
            _ => return Err(ProtocolError::InvalidHeader),
        };
        let name = match elements.next() {
            Some(Value::String(name)) => name.into_str().ok_or(ProtocolError::InvalidName)?,
            // Older msgpack packers send names as raw bytes.
            Some(Value::Binary(raw)) => {
                String::from_utf8(raw).map_err(|_| ProtocolError::InvalidName)?
            }
            _ => return Err(ProtocolError::InvalidName),
        };
        let args = match elements.next() {
            Some(Value::Array(args)) => args,
            _ => return Err(ProtocolError::InvalidArgs),
        };
        Ok(Self { header, name, args })
    }

    /// Consumes the envelope, encoding it to MessagePack.
    pub fn encode(self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &self.into_value())?;
        Ok(buf)
    }

    /// Decodes an envelope from a MessagePack buffer.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = bytes;
        let value = rmpv::decode::read_value(&mut reader)?;
        Self::from_value(value)
    }

    /// Takes the return value out of a reply: the first argument.
    pub fn into_return_value(self) -> Result<Value, ProtocolError> {
        self.args
            .into_iter()
            .next()
            .ok_or(ProtocolError::EmptyReply)
    }
}

/// Encodes a request for `method` with a freshly generated `message_id`.
pub fn encode_request(method: &str, args: Vec<Value>) -> Result<Vec<u8>, EncodeError> {
    Envelope::request(method, args).encode()
}
