//! Key-value formats used by the native store client
//!
//! Two unrelated encodings share the same tree shape:
//!
//! - [`binary`]: the typed, NUL-delimited format of `shortcuts.vdf`. Lossless
//!   and strict; any unknown tag aborts the whole file.
//! - [`text`]: the brace-delimited format of `*.acf` and `libraryfolders.vdf`.
//!   Lenient; lines that do not parse are skipped.

pub mod binary;
pub mod text;

pub use binary::{KvDict, KvValue};
pub use text::{TextSection, TextValue};

use thiserror::Error;

/// Binary key-value decode/encode failure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KvError {
    #[error("unknown type tag 0x{tag:02x} at offset {offset}")]
    UnknownType { tag: u8, offset: usize },

    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("{len} trailing bytes after root dictionary at offset {offset}")]
    TrailingData { offset: usize, len: usize },

    #[error("dictionaries nested deeper than {limit} levels at offset {offset}")]
    TooDeep { offset: usize, limit: usize },

    #[error("key or string value contains a NUL byte: {0:?}")]
    InteriorNul(String),
}
