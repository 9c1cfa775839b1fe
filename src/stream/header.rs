//! Stream header and record tags.

use std::io::{self, Read, Write};

/// Magic number opening every stream.
pub const STREAM_MAGIC: u16 = 0xACED;
/// Stream format version.
pub const STREAM_VERSION: u16 = 5;

/// Back-reference to a previously resolved type.
pub const TC_REFERENCE: u8 = 0x71;
/// Plain type record.
pub const TC_CLASSDESC: u8 = 0x72;
/// Proxy type record.
pub const TC_PROXYCLASSDESC: u8 = 0x7D;

/// First handle assigned within a session.
pub const BASE_WIRE_HANDLE: u32 = 0x7E_0000;

/// Reads and verifies the header, blocking until four bytes are available.
///
/// # Errors
/// `UnexpectedEof` if the source ends early, `InvalidData` on a bad magic
/// number or version, and any error of the source itself.
pub fn read_header<R: Read>(source: &mut R) -> io::Result<()> {
    let mut buf = [0u8; 4];
    source.read_exact(&mut buf)?;

    let magic = u16::from_be_bytes([buf[0], buf[1]]);
    let version = u16::from_be_bytes([buf[2], buf[3]]);
    if magic != STREAM_MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid stream header: magic 0x{magic:04X}"),
        ));
    }
    if version != STREAM_VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported stream version {version}"),
        ));
    }
    Ok(())
}

/// Writes the header.
///
/// # Errors
/// Any error of the sink.
pub fn write_header<W: Write>(sink: &mut W) -> io::Result<()> {
    sink.write_all(&STREAM_MAGIC.to_be_bytes())?;
    sink.write_all(&STREAM_VERSION.to_be_bytes())
}
