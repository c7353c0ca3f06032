//! msgpack-RPC wire codec
//!
//! The backend speaks msgpack-RPC over its stdio pipes: every frame is a
//! msgpack array tagged with a message type, and requests carry a sequence
//! id that the matching response echoes back. The encoding here must stay
//! bit-for-bit compatible with the backend's published protocol.

use std::io::{Read, Write};

use rmpv::Value;
use thiserror::Error;

const TYPE_REQUEST: u64 = 0;
const TYPE_RESPONSE: u64 = 1;
const TYPE_NOTIFICATION: u64 = 2;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("failed to decode msgpack value: {0}")]
    Decode(#[from] rmpv::decode::Error),

    #[error("failed to encode msgpack value: {0}")]
    Encode(#[from] rmpv::encode::Error),

    #[error("failed to write to the editor pipe: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed RPC frame: {0}")]
    Frame(String),
}

pub type Result<T> = std::result::Result<T, RpcError>;

/// One decoded RPC frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcMessage {
    Request {
        msgid: u64,
        method: String,
        params: Vec<Value>,
    },
    Response {
        msgid: u64,
        error: Value,
        result: Value,
    },
    Notification {
        method: String,
        params: Vec<Value>,
    },
}

/// Read and decode exactly one frame from the stream.
///
/// Blocks until a full value is available. An i/o error (including EOF)
/// surfaces as a decode error and is treated by the caller as disconnect.
pub fn read_message<R: Read>(reader: &mut R) -> Result<RpcMessage> {
    let value = rmpv::decode::read_value(reader)?;
    let items = match value {
        Value::Array(items) => items,
        other => return Err(RpcError::Frame(format!("expected array, got {other}"))),
    };

    let kind = field(&items, 0)?
        .as_u64()
        .ok_or_else(|| RpcError::Frame("message type is not an integer".into()))?;

    match kind {
        TYPE_REQUEST => Ok(RpcMessage::Request {
            msgid: msgid(&items)?,
            method: method(&items, 2)?,
            params: params(&items, 3)?,
        }),
        TYPE_RESPONSE => Ok(RpcMessage::Response {
            msgid: msgid(&items)?,
            error: field(&items, 2)?.clone(),
            result: field(&items, 3)?.clone(),
        }),
        TYPE_NOTIFICATION => Ok(RpcMessage::Notification {
            method: method(&items, 1)?,
            params: params(&items, 2)?,
        }),
        other => Err(RpcError::Frame(format!("unknown message type {other}"))),
    }
}

/// Encode and write a request frame: `[0, msgid, method, params]`.
pub fn write_request<W: Write>(
    writer: &mut W,
    msgid: u64,
    method: &str,
    params: Vec<Value>,
) -> Result<()> {
    let frame = Value::Array(vec![
        Value::from(TYPE_REQUEST),
        Value::from(msgid),
        Value::from(method),
        Value::Array(params),
    ]);
    rmpv::encode::write_value(writer, &frame)?;
    writer.flush()?;
    Ok(())
}

/// Encode and write a response frame: `[1, msgid, error, result]`.
pub fn write_response<W: Write>(
    writer: &mut W,
    msgid: u64,
    error: Value,
    result: Value,
) -> Result<()> {
    let frame = Value::Array(vec![
        Value::from(TYPE_RESPONSE),
        Value::from(msgid),
        error,
        result,
    ]);
    rmpv::encode::write_value(writer, &frame)?;
    writer.flush()?;
    Ok(())
}

fn field(items: &[Value], index: usize) -> Result<&Value> {
    items
        .get(index)
        .ok_or_else(|| RpcError::Frame(format!("frame too short, missing field {index}")))
}

fn msgid(items: &[Value]) -> Result<u64> {
    field(items, 1)?
        .as_u64()
        .ok_or_else(|| RpcError::Frame("msgid is not an unsigned integer".into()))
}

fn method(items: &[Value], index: usize) -> Result<String> {
    match field(items, index)? {
        Value::String(s) => s
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| RpcError::Frame("method name is not valid UTF-8".into())),
        other => Err(RpcError::Frame(format!("method name is {other}, not a string"))),
    }
}

fn params(items: &[Value], index: usize) -> Result<Vec<Value>> {
    match field(items, index)? {
        Value::Array(args) => Ok(args.clone()),
        other => Err(RpcError::Frame(format!("params are {other}, not an array"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_frame_is_bit_exact() {
        let mut buffer = Vec::new();
        write_request(&mut buffer, 1, "ping", vec![]).unwrap();
        // fixarray(4), fixint 0, fixint 1, fixstr "ping", fixarray(0)
        assert_eq!(
            buffer,
            [0x94, 0x00, 0x01, 0xa4, b'p', b'i', b'n', b'g', 0x90]
        );
    }

    #[test]
    fn request_roundtrip() {
        let mut buffer = Vec::new();
        write_request(
            &mut buffer,
            7,
            "nvim_ui_try_resize",
            vec![Value::from(80u64), Value::from(40u64)],
        )
        .unwrap();

        let message = read_message(&mut buffer.as_slice()).unwrap();
        assert_eq!(
            message,
            RpcMessage::Request {
                msgid: 7,
                method: "nvim_ui_try_resize".into(),
                params: vec![Value::from(80u64), Value::from(40u64)],
            }
        );
    }

    #[test]
    fn decodes_notification_frame() {
        let frame = Value::Array(vec![
            Value::from(2u64),
            Value::from("redraw"),
            Value::Array(vec![Value::Array(vec![Value::from("clear")])]),
        ]);
        let mut buffer = Vec::new();
        rmpv::encode::write_value(&mut buffer, &frame).unwrap();

        match read_message(&mut buffer.as_slice()).unwrap() {
            RpcMessage::Notification { method, params } => {
                assert_eq!(method, "redraw");
                assert_eq!(params.len(), 1);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn rejects_non_array_frame() {
        let mut buffer = Vec::new();
        rmpv::encode::write_value(&mut buffer, &Value::from(42)).unwrap();
        assert!(matches!(
            read_message(&mut buffer.as_slice()),
            Err(RpcError::Frame(_))
        ));
    }

    #[test]
    fn rejects_unknown_message_type() {
        let frame = Value::Array(vec![Value::from(9u64), Value::from(0u64)]);
        let mut buffer = Vec::new();
        rmpv::encode::write_value(&mut buffer, &frame).unwrap();
        assert!(matches!(
            read_message(&mut buffer.as_slice()),
            Err(RpcError::Frame(_))
        ));
    }
}
