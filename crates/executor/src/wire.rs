//! Length-prefixed frame codec for the session boundary.
//!
//! Requests and responses travel as a 4-byte network-order length
//! followed by a JSON body. A response is either a structured
//! [`Output`] or a structured [`Error`] descriptor that the far side
//! re-raises; nothing is collapsed into a generic failure. Socket
//! ownership and accept loops belong to the host process, not here:
//! [`serve_connection`] drives any `Read + Write` pair.

use crate::command::Command;
use crate::error::Error;
use crate::output::Output;
use crate::session::Session;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{self, Read, Write};
use tracing::debug;

/// Upper bound on a frame body; anything larger is a protocol error.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// A session response: structured result or re-raisable error.
pub type Response = Result<Output, Error>;

fn invalid_data(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}

fn write_frame<W: Write, T: Serialize>(writer: &mut W, value: &T) -> io::Result<()> {
    let body = serde_json::to_vec(value).map_err(invalid_data)?;
    if body.len() > MAX_FRAME_LEN as usize {
        return Err(invalid_data("frame exceeds maximum length"));
    }
    writer.write_u32::<BigEndian>(body.len() as u32)?;
    writer.write_all(&body)?;
    writer.flush()
}

fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> io::Result<T> {
    let len = reader.read_u32::<BigEndian>()?;
    if len > MAX_FRAME_LEN {
        return Err(invalid_data("frame exceeds maximum length"));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body)?;
    serde_json::from_slice(&body).map_err(invalid_data)
}

/// Write one command frame.
pub fn write_command<W: Write>(writer: &mut W, cmd: &Command) -> io::Result<()> {
    write_frame(writer, cmd)
}

/// Read one command frame.
pub fn read_command<R: Read>(reader: &mut R) -> io::Result<Command> {
    read_frame(reader)
}

/// Write one response frame.
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> io::Result<()> {
    write_frame(writer, response)
}

/// Read one response frame.
pub fn read_response<R: Read>(reader: &mut R) -> io::Result<Response> {
    read_frame(reader)
}

/// Serve one connection to completion: read commands, execute, write
/// responses. Returns cleanly when the peer closes between frames.
pub fn serve_connection<R: Read, W: Write>(
    session: &mut Session,
    reader: &mut R,
    writer: &mut W,
) -> io::Result<()> {
    loop {
        let cmd = match read_command(reader) {
            Ok(cmd) => cmd,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                debug!(target: "trellis::session", "peer closed the connection");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let response = session.execute(cmd);
        write_response(writer, &response)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;
    use trellis_core::MemoryStore;
    use trellis_engine::EngineConfig;

    #[test]
    fn test_command_frame_round_trip() {
        let cmd = Command::OpenFile {
            name: "EMPLOYEE".into(),
            internal: true,
            fieldnames: None,
            fieldids: None,
        };
        let mut buf = Vec::new();
        write_command(&mut buf, &cmd).unwrap();
        // 4-byte network-order length prefix
        let len = u32::from_be_bytes(buf[..4].try_into().unwrap());
        assert_eq!(len as usize, buf.len() - 4);
        let back = read_command(&mut Cursor::new(buf)).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn test_error_response_is_re_raisable() {
        let response: Response = Err(Error::Validation {
            file: "EMPLOYEE".into(),
            row: None,
            field: "1".into(),
            value: "x".into(),
            code: "701".into(),
            message: "value is not numeric".into(),
            help: None,
        });
        let mut buf = Vec::new();
        write_response(&mut buf, &response).unwrap();
        let back = read_response(&mut Cursor::new(buf)).unwrap();
        assert_eq!(back, response);
        let engine: trellis_core::Error = back.unwrap_err().into();
        assert!(engine.is_validation());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_LEN + 1).to_be_bytes());
        let err = read_command(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_serve_connection_end_to_end() {
        let store = MemoryStore::new();
        store.define_file("EMPLOYEE", "9999900", "DIZ").unwrap();
        store
            .define_field("9999900", ".01", "NAME", "RF", "", "0;1")
            .unwrap();
        store.define_index("9999900", "B", ".01").unwrap();
        let mut session = Session::new(Arc::new(store), EngineConfig::default());

        let mut input = Vec::new();
        write_command(&mut input, &Command::Connect { user: None }).unwrap();
        write_command(
            &mut input,
            &Command::OpenFile {
                name: "EMPLOYEE".into(),
                internal: true,
                fieldnames: None,
                fieldids: None,
            },
        )
        .unwrap();
        write_command(
            &mut input,
            &Command::Insert {
                handle: 1,
                values: vec![("name".into(), "ALICE".into())],
            },
        )
        .unwrap();
        write_command(
            &mut input,
            &Command::Get {
                handle: 1,
                rowid: "99".into(),
                as_map: false,
            },
        )
        .unwrap();

        let mut output = Vec::new();
        serve_connection(&mut session, &mut Cursor::new(input), &mut output).unwrap();

        let mut reader = Cursor::new(output);
        assert_eq!(read_response(&mut reader).unwrap(), Ok(Output::Unit));
        assert_eq!(read_response(&mut reader).unwrap(), Ok(Output::Handle(1)));
        assert_eq!(
            read_response(&mut reader).unwrap(),
            Ok(Output::RowId("1".into()))
        );
        // the error crosses the boundary as a distinguishable kind
        match read_response(&mut reader).unwrap() {
            Err(Error::NotFound { what }) => assert!(what.contains("99")),
            other => panic!("expected not-found, got {:?}", other),
        }
    }
}
