use std::fmt::Display;

use anyhow::{bail, Context, Result};

use crate::bytes::Cursor;

/// A DNS domain name inside a message.
///
/// A name is not a materialized string but a decode position: the full
/// message buffer plus the offset where the name's encoding starts. Labels
/// are length-prefixed; a two-byte compression pointer (top two bits set)
/// continues decoding at an earlier offset in the same message.
#[derive(Debug, Clone, Copy)]
pub struct Name<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Name<'a> {
    /// Creates a name that starts at an offset in a message buffer.
    pub fn new(buf: &'a [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    /// Returns the offset where the name's encoding starts.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Decodes the name into dot-separated labels.
    ///
    /// Compression pointers are followed, with two guards against malformed
    /// or adversarial input: a pointer target must lie inside the message,
    /// and each followed pointer must land strictly before everything decoded
    /// from so far. Offsets that only move backward cannot loop.
    pub fn decode(&self) -> Result<String> {
        let mut cursor = Cursor::at(self.buf, self.offset)?;
        let mut floor = self.offset;
        let mut labels: Vec<String> = vec![];

        loop {
            let signal = cursor.peek()?;
            let is_pointer = (signal >> 6 & 3) == 3;
            if is_pointer {
                let target = (cursor.read_u16()? & 0x3fff) as usize;
                if target >= floor {
                    bail!("compression pointer at offset {} does not point backward", floor);
                }
                cursor = Cursor::at(self.buf, target)?;
                floor = target;
            } else {
                let len = cursor.read()? as usize;
                if len == 0 {
                    break;
                }
                let label = cursor.read_exact(len)?;
                let label = String::from_utf8(label.to_vec())
                    .context("name label is not valid utf-8")?;
                labels.push(label);
            }
        }

        Ok(labels.join("."))
    }

    /// Walks the name without materializing it, applying the same pointer
    /// guards as [`Name::decode`]. Used to reject undecodable names at parse
    /// time.
    pub fn verify(&self) -> Result<()> {
        let mut cursor = Cursor::at(self.buf, self.offset)?;
        let mut floor = self.offset;

        loop {
            let signal = cursor.peek()?;
            if signal >= 0xC0 {
                let target = (cursor.read_u16()? & 0x3fff) as usize;
                if target >= floor {
                    bail!("compression pointer at offset {} does not point backward", floor);
                }
                cursor = Cursor::at(self.buf, target)?;
                floor = target;
            } else {
                let len = cursor.read()? as usize;
                if len == 0 {
                    return Ok(());
                }
                cursor.skip(len)?;
            }
        }
    }

    /// Returns the number of bytes the name occupies at its own position.
    ///
    /// This is the distance to skip to reach whatever follows the name: label
    /// bytes plus the zero terminator, or everything up to and including the
    /// first compression pointer, whichever comes first. Pointers are not
    /// followed.
    pub fn data_length(&self) -> Result<usize> {
        let mut cursor = Cursor::at(self.buf, self.offset)?;

        loop {
            let signal = cursor.peek()?;
            if signal >= 0xC0 {
                cursor.read_u16()?;
                break;
            }
            let len = cursor.read()? as usize;
            if len == 0 {
                break;
            }
            cursor.skip(len)?;
        }

        Ok(cursor.pos() - self.offset)
    }

    /// Returns true if the name decodes to `other`, ignoring ASCII case and
    /// a trailing dot on `other`. A malformed name matches nothing.
    pub fn eq_str(&self, other: &str) -> bool {
        let other = other.strip_suffix('.').unwrap_or(other);
        match self.decode() {
            Ok(name) => name.eq_ignore_ascii_case(other),
            Err(_) => false,
        }
    }
}

impl Display for Name<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.decode() {
            Ok(name) => write!(f, "{name}"),
            Err(_) => write!(f, "<malformed name @{}>", self.offset),
        }
    }
}

impl PartialEq<&str> for Name<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.eq_str(other)
    }
}
