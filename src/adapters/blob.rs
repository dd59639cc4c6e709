//! SQLite access and peak blob decoding shared by the SQLite-backed adapters.

use std::io::{Cursor, Read};
use std::path::Path;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use rusqlite::{Connection, OpenFlags};

use super::{AdapterError, Format};

/// Byte order of a numeric blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endian {
    Little,
    Big,
}

/// Open a database without write access
pub(crate) fn open_read_only(path: &Path, format: Format) -> Result<Connection, AdapterError> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| AdapterError::format(format, e))
}

/// Names of the tables in a database
pub(crate) fn table_names(connection: &Connection, format: Format) -> Result<Vec<String>, AdapterError> {
    let mut statement = connection
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
        .map_err(|e| AdapterError::format(format, e))?;
    let names = statement
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| AdapterError::format(format, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AdapterError::format(format, e))?;
    Ok(names)
}

/// Inflate a zlib blob, or return it unchanged when it is not zlib data
pub(crate) fn inflate_or_raw(bytes: &[u8]) -> Vec<u8> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut out = Vec::new();
    match decoder.read_to_end(&mut out) {
        Ok(_) => out,
        Err(_) => bytes.to_vec(),
    }
}

/// Inflate a zlib blob
pub(crate) fn inflate(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Decode packed 64-bit floats
pub(crate) fn decode_f64(bytes: &[u8], endian: Endian) -> std::io::Result<Vec<f64>> {
    check_width(bytes, 8)?;
    let mut cursor = Cursor::new(bytes);
    let mut values = Vec::with_capacity(bytes.len() / 8);
    for _ in 0..bytes.len() / 8 {
        let value = match endian {
            Endian::Little => cursor.read_f64::<LittleEndian>()?,
            Endian::Big => cursor.read_f64::<BigEndian>()?,
        };
        values.push(value);
    }
    Ok(values)
}

/// Decode packed 32-bit floats, widened to f64
pub(crate) fn decode_f32(bytes: &[u8], endian: Endian) -> std::io::Result<Vec<f64>> {
    check_width(bytes, 4)?;
    let mut cursor = Cursor::new(bytes);
    let mut values = Vec::with_capacity(bytes.len() / 4);
    for _ in 0..bytes.len() / 4 {
        let value = match endian {
            Endian::Little => cursor.read_f32::<LittleEndian>()?,
            Endian::Big => cursor.read_f32::<BigEndian>()?,
        };
        values.push(value as f64);
    }
    Ok(values)
}

fn check_width(bytes: &[u8], width: usize) -> std::io::Result<()> {
    if bytes.len() % width != 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "blob of {} bytes is not a whole number of {}-byte values",
                bytes.len(),
                width
            ),
        ));
    }
    Ok(())
}
