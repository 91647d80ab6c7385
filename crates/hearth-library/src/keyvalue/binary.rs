//! Binary key-value codec
//!
//! A dictionary is a run of `(tag, key, value)` entries closed by
//! [`tag::END`]. Keys and string values are NUL-terminated UTF-8. There are
//! no length prefixes, so a single unknown tag makes the rest of the file
//! unreadable.

use super::KvError;

/// Type tags as written by the store client
pub mod tag {
    pub const DICT: u8 = 0x00;
    pub const STRING: u8 = 0x01;
    pub const INT32: u8 = 0x02;
    pub const UINT64: u8 = 0x07;
    pub const END: u8 = 0x08;
}

const MAX_DEPTH: usize = 64;

/// A typed value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvValue {
    Dict(KvDict),
    String(String),
    Int32(i32),
    UInt64(u64),
}

impl KvValue {
    /// Build an integer value, using the 32-bit tag whenever the value fits
    /// the unsigned 32-bit range.
    pub fn integer(value: u64) -> Self {
        match u32::try_from(value) {
            Ok(small) => KvValue::Int32(small as i32),
            Err(_) => KvValue::UInt64(value),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KvValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&KvDict> {
        match self {
            KvValue::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Integer value reinterpreted as unsigned 32-bit.
    ///
    /// Shortcut ids are stored under the 32-bit tag but routinely have the
    /// high bit set, so the signed payload is bit-cast rather than range
    /// checked.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            KvValue::Int32(v) => Some(*v as u32),
            KvValue::UInt64(v) => u32::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            KvValue::Int32(v) => Some(*v as u32 as u64),
            KvValue::UInt64(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for KvValue {
    fn from(value: &str) -> Self {
        KvValue::String(value.to_string())
    }
}

impl From<String> for KvValue {
    fn from(value: String) -> Self {
        KvValue::String(value)
    }
}

impl From<KvDict> for KvValue {
    fn from(value: KvDict) -> Self {
        KvValue::Dict(value)
    }
}

/// An ordered dictionary.
///
/// Entry order is preserved exactly as decoded, including duplicate keys,
/// so that re-encoding reproduces the original bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvDict {
    entries: Vec<(String, KvValue)>,
}

impl KvDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing the first existing entry in place or appending
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<KvValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`KvDict::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<KvValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Exact-key lookup
    pub fn get(&self, key: &str) -> Option<&KvValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// ASCII case-insensitive lookup. Field casing varies between client
    /// versions (`appid` vs `AppID`).
    pub fn get_ci(&self, key: &str) -> Option<&KvValue> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get_ci(key).and_then(KvValue::as_str)
    }

    pub fn get_dict(&self, key: &str) -> Option<&KvDict> {
        self.get_ci(key).and_then(KvValue::as_dict)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KvValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn read_u8(&mut self) -> Result<u8, KvError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(KvError::UnexpectedEof { offset: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], KvError> {
        let end = self.pos + N;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(KvError::UnexpectedEof {
                offset: self.bytes.len(),
            })?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos = end;
        Ok(out)
    }

    fn read_cstr(&mut self) -> Result<String, KvError> {
        let start = self.pos;
        let rest = &self.bytes[start..];
        let nul = rest.iter().position(|b| *b == 0).ok_or(KvError::UnexpectedEof {
            offset: self.bytes.len(),
        })?;
        let s = std::str::from_utf8(&rest[..nul])
            .map_err(|_| KvError::InvalidUtf8 { offset: start })?
            .to_string();
        self.pos = start + nul + 1;
        Ok(s)
    }

    fn read_dict(&mut self, depth: usize) -> Result<KvDict, KvError> {
        if depth > MAX_DEPTH {
            return Err(KvError::TooDeep {
                offset: self.pos,
                limit: MAX_DEPTH,
            });
        }

        let mut dict = KvDict::new();
        loop {
            let tag_offset = self.pos;
            let tag = self.read_u8()?;
            if tag == tag::END {
                return Ok(dict);
            }

            let key = self.read_cstr()?;
            let value = match tag {
                tag::DICT => KvValue::Dict(self.read_dict(depth + 1)?),
                tag::STRING => KvValue::String(self.read_cstr()?),
                tag::INT32 => KvValue::Int32(i32::from_le_bytes(self.take::<4>()?)),
                tag::UINT64 => KvValue::UInt64(u64::from_le_bytes(self.take::<8>()?)),
                other => {
                    return Err(KvError::UnknownType {
                        tag: other,
                        offset: tag_offset,
                    });
                }
            };
            dict.entries.push((key, value));
        }
    }
}

/// Decode a complete binary key-value file.
///
/// The root dictionary must be closed by an end tag and followed by nothing.
pub fn decode(bytes: &[u8]) -> Result<KvDict, KvError> {
    let mut reader = Reader { bytes, pos: 0 };
    let dict = reader.read_dict(0)?;
    if reader.pos != bytes.len() {
        return Err(KvError::TrailingData {
            offset: reader.pos,
            len: bytes.len() - reader.pos,
        });
    }
    Ok(dict)
}

/// Encode a dictionary as a complete binary key-value file
pub fn encode(dict: &KvDict) -> Result<Vec<u8>, KvError> {
    let mut out = Vec::new();
    write_dict(&mut out, dict)?;
    Ok(out)
}

fn write_cstr(out: &mut Vec<u8>, s: &str) -> Result<(), KvError> {
    if s.as_bytes().contains(&0) {
        return Err(KvError::InteriorNul(s.to_string()));
    }
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    Ok(())
}

fn write_dict(out: &mut Vec<u8>, dict: &KvDict) -> Result<(), KvError> {
    for (key, value) in &dict.entries {
        match value {
            KvValue::Dict(child) => {
                out.push(tag::DICT);
                write_cstr(out, key)?;
                write_dict(out, child)?;
            }
            KvValue::String(s) => {
                out.push(tag::STRING);
                write_cstr(out, key)?;
                write_cstr(out, s)?;
            }
            KvValue::Int32(v) => {
                out.push(tag::INT32);
                write_cstr(out, key)?;
                out.extend_from_slice(&v.to_le_bytes());
            }
            KvValue::UInt64(v) => {
                out.push(tag::UINT64);
                write_cstr(out, key)?;
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    out.push(tag::END);
    Ok(())
}
