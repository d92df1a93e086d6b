//! Order-preserving tuple codec.
//!
//! Encodes a heterogeneous tuple `(v1, v2, ..)` as one byte string such that
//! the lexicographic order of encoded forms matches a defined order on
//! tuples: componentwise, with the type tag breaking ties across
//! heterogeneous components. Range scans on the underlying ordered store
//! depend entirely on this ordering.
//!
//! Tag assignments, the integer sign-bit flip, and the NUL terminator for
//! text/bytes are part of the on-disk format and must not change without a
//! migration (spec §6).

use crate::error::{Error, Result};

const TAG_INT: u8 = 0x01;
const TAG_TEXT: u8 = 0x02;
const TAG_BYTES: u8 = 0x03;
const TAG_OPAQUE: u8 = 0x04;

/// One element of an encodable tuple.
///
/// `Int`, `Text`, and `Bytes` are the only element kinds with a
/// distinguished, order-preserving encoding; everything else a property
/// value can hold is wrapped by the caller into an `Opaque` msgpack blob
/// before reaching the codec (see [`crate::value`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
    Opaque(Vec<u8>),
}

impl Element {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Element::Int(v) => {
                out.push(TAG_INT);
                let flipped = (*v as u64) ^ (1u64 << 63);
                out.extend_from_slice(&flipped.to_be_bytes());
            }
            Element::Text(s) => {
                if s.as_bytes().contains(&0) {
                    return Err(Error::InvalidArgument("text element must not contain NUL".into()));
                }
                out.push(TAG_TEXT);
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
            Element::Bytes(b) => {
                if b.contains(&0) {
                    return Err(Error::InvalidArgument("byte-string element must not contain NUL".into()));
                }
                out.push(TAG_BYTES);
                out.extend_from_slice(b);
                out.push(0);
            }
            Element::Opaque(payload) => {
                out.push(TAG_OPAQUE);
                out.extend_from_slice(&(payload.len() as u64).to_be_bytes());
                out.extend_from_slice(payload);
            }
        }
        Ok(())
    }
}

/// Encode a heterogeneous tuple as one order-preserving byte string.
pub fn encode(elements: &[Element]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for el in elements {
        el.encode_into(&mut out)?;
    }
    Ok(out)
}

/// Decode a byte string produced by [`encode`] back into its element list.
/// Self-delimiting: does not require the caller to know the tuple shape.
pub fn decode(mut bytes: &[u8]) -> Result<Vec<Element>> {
    let mut elements = Vec::new();
    while !bytes.is_empty() {
        let tag = bytes[0];
        bytes = &bytes[1..];
        match tag {
            TAG_INT => {
                if bytes.len() < 8 {
                    return Err(Error::Codec("truncated integer element".into()));
                }
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes[..8]);
                let flipped = u64::from_be_bytes(buf);
                let v = (flipped ^ (1u64 << 63)) as i64;
                elements.push(Element::Int(v));
                bytes = &bytes[8..];
            }
            TAG_TEXT => {
                let idx = bytes.iter().position(|&b| b == 0).ok_or_else(|| Error::Codec("unterminated text element".into()))?;
                let s = std::str::from_utf8(&bytes[..idx]).map_err(|e| Error::Codec(format!("invalid utf-8 in text element: {e}")))?;
                elements.push(Element::Text(s.to_owned()));
                bytes = &bytes[idx + 1..];
            }
            TAG_BYTES => {
                let idx = bytes.iter().position(|&b| b == 0).ok_or_else(|| Error::Codec("unterminated byte-string element".into()))?;
                elements.push(Element::Bytes(bytes[..idx].to_vec()));
                bytes = &bytes[idx + 1..];
            }
            TAG_OPAQUE => {
                if bytes.len() < 8 {
                    return Err(Error::Codec("truncated opaque length".into()));
                }
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes[..8]);
                let len = u64::from_be_bytes(buf) as usize;
                bytes = &bytes[8..];
                if bytes.len() < len {
                    return Err(Error::Codec("truncated opaque payload".into()));
                }
                elements.push(Element::Opaque(bytes[..len].to_vec()));
                bytes = &bytes[len..];
            }
            other => return Err(Error::Codec(format!("unknown type tag: {other:#04x}"))),
        }
    }
    Ok(elements)
}

/// Compute the exclusive upper bound of a prefix scan: the smallest byte
/// string that sorts strictly after every key beginning with `prefix`.
/// Returns `None` if `prefix` is all `0xFF` bytes (or empty), meaning the
/// scan is unbounded above.
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(&last) = upper.last() {
        if last == 0xFF {
            upper.pop();
        } else {
            *upper.last_mut().unwrap() += 1;
            return Some(upper);
        }
    }
    None
}
