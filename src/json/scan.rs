//! Structural scan of a JSON library for the byte ranges of its entries.
//!
//! The scanner tracks only nesting depth, string state and the most recent
//! string at the top level, so it can walk libraries far larger than memory
//! while holding a single entry at a time.

use std::io::{BufRead, BufReader, Read};

use super::JsonError;

/// Which top-level array an element came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Element of `"spectra"`
    Spectrum,
    /// Element of `"clusters"`
    Cluster,
}

impl ElementKind {
    fn for_key(key: &[u8]) -> Option<Self> {
        match key {
            b"spectra" => Some(ElementKind::Spectrum),
            b"clusters" => Some(ElementKind::Cluster),
            _ => None,
        }
    }
}

const SCAN_BUFFER_SIZE: usize = 64 * 1024;

/// Walk a JSON library and call `on_element` for every object in its top-level
/// `spectra` and `clusters` arrays with the object's `[start, end)` byte range
/// and its bytes.
///
/// Returns the number of elements reported.
pub fn scan_elements<R, F, E>(reader: R, mut on_element: F) -> Result<u64, E>
where
    R: Read,
    F: FnMut(ElementKind, u64, u64, &[u8]) -> Result<(), E>,
    E: From<JsonError>,
{
    let mut reader = BufReader::with_capacity(SCAN_BUFFER_SIZE, reader);
    let mut offset: u64 = 0;
    let mut depth: u32 = 0;
    let mut in_string = false;
    let mut escape = false;

    let mut top_string: Vec<u8> = Vec::new();
    let mut array: Option<ElementKind> = None;
    let mut element: Option<(u64, Vec<u8>)> = None;
    let mut count = 0u64;

    loop {
        let buf = reader.fill_buf().map_err(JsonError::from)?;
        if buf.is_empty() {
            break;
        }
        let len = buf.len();
        for &byte in buf {
            if let Some((_, bytes)) = element.as_mut() {
                bytes.push(byte);
            }

            if in_string {
                if escape {
                    escape = false;
                } else if byte == b'\\' {
                    escape = true;
                } else if byte == b'"' {
                    in_string = false;
                }
                if in_string && depth == 1 {
                    top_string.push(byte);
                }
                offset += 1;
                continue;
            }

            match byte {
                b'"' => {
                    in_string = true;
                    if depth == 1 {
                        top_string.clear();
                    }
                }
                b'{' | b'[' => {
                    if depth == 1 && byte == b'[' {
                        array = ElementKind::for_key(&top_string);
                    }
                    if depth == 2 && byte == b'{' && array.is_some() {
                        element = Some((offset, vec![b'{']));
                    }
                    depth += 1;
                }
                b'}' | b']' => {
                    if depth == 0 {
                        return Err(JsonError::Unbalanced(offset).into());
                    }
                    depth -= 1;
                    if depth == 2 && byte == b'}' {
                        if let (Some(kind), Some((start, bytes))) = (array, element.take()) {
                            on_element(kind, start, offset + 1, &bytes)?;
                            count += 1;
                        }
                    }
                    if depth == 1 {
                        array = None;
                    }
                }
                _ => {}
            }
            offset += 1;
        }
        reader.consume(len);
    }

    if depth != 0 || in_string {
        return Err(JsonError::Unbalanced(offset).into());
    }
    Ok(count)
}
