use std::fmt::Display;
use std::net::{Ipv4Addr, Ipv6Addr};

use anyhow::{bail, Result};

use crate::bytes::Cursor;
use crate::name::Name;

/// The type of a DNS resource record.
///
/// Only the types the responder works with get a named variant; anything else
/// is carried (and rendered) numerically rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    /// 32-bit IPv4 address.
    A,
    /// Authoritative zone information.
    Soa,
    /// Pointer to a canonical name.
    Ptr,
    /// Host information.
    Hinfo,
    /// Attribute list, conventionally key=value pairs.
    Txt,
    /// 128-bit IPv6 address.
    Aaaa,
    /// Service locator.
    Srv,
    /// Matches any resource type in a query.
    Any,
    /// Any other type, kept as its numeric value.
    Other(u16),
}

impl From<u16> for ResourceType {
    fn from(value: u16) -> Self {
        use ResourceType::*;

        match value {
            1 => A,
            6 => Soa,
            12 => Ptr,
            13 => Hinfo,
            16 => Txt,
            28 => Aaaa,
            33 => Srv,
            255 => Any,
            other => Other(other),
        }
    }
}

impl From<ResourceType> for u16 {
    fn from(value: ResourceType) -> Self {
        use ResourceType::*;

        match value {
            A => 1,
            Soa => 6,
            Ptr => 12,
            Hinfo => 13,
            Txt => 16,
            Aaaa => 28,
            Srv => 33,
            Any => 255,
            Other(other) => other,
        }
    }
}

impl Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ResourceType::*;

        match self {
            A => write!(f, "A"),
            Soa => write!(f, "SOA"),
            Ptr => write!(f, "PTR"),
            Hinfo => write!(f, "HINFO"),
            Txt => write!(f, "TXT"),
            Aaaa => write!(f, "AAAA"),
            Srv => write!(f, "SRV"),
            Any => write!(f, "ANY"),
            Other(value) => write!(f, "{value}"),
        }
    }
}

/// An 'A' record: four raw bytes holding an IPv4 address in network order.
pub struct A<'a> {
    rdata: &'a [u8],
}

impl<'a> A<'a> {
    pub fn new(rdata: &'a [u8]) -> Self {
        Self { rdata }
    }

    pub fn address(&self) -> Result<Ipv4Addr> {
        let addr = Cursor::new(self.rdata).read_u32()?;
        Ok(Ipv4Addr::from(addr))
    }
}

/// An 'AAAA' record: sixteen raw bytes holding an IPv6 address.
pub struct Aaaa<'a> {
    rdata: &'a [u8],
}

impl<'a> Aaaa<'a> {
    pub fn new(rdata: &'a [u8]) -> Self {
        Self { rdata }
    }

    pub fn address(&self) -> Result<Ipv6Addr> {
        let bytes = Cursor::new(self.rdata).read_exact(16)?;
        let octets: [u8; 16] = bytes.try_into()?;
        Ok(Ipv6Addr::from(octets))
    }
}

/// A 'PTR' record: one embedded name starting at record byte 0.
///
/// The name may contain compression pointers into the enclosing message, so
/// the view keeps the full message buffer rather than just the record window.
pub struct Ptr<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Ptr<'a> {
    pub fn new(buf: &'a [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    pub fn name(&self) -> Name<'a> {
        Name::new(self.buf, self.offset)
    }
}

/// An 'SRV' record: priority, weight and port as big-endian 16-bit fields at
/// record bytes 0, 2 and 4, then the target host name at byte 6.
pub struct Srv<'a> {
    buf: &'a [u8],
    offset: usize,
    len: usize,
}

impl<'a> Srv<'a> {
    pub fn new(buf: &'a [u8], offset: usize, len: usize) -> Self {
        Self { buf, offset, len }
    }

    fn field(&self, at: usize) -> Result<u16> {
        if at + 2 > self.len {
            bail!("SRV record is {} bytes, too short", self.len);
        }
        Cursor::at(self.buf, self.offset + at)?.read_u16()
    }

    pub fn priority(&self) -> Result<u16> {
        self.field(0)
    }

    pub fn weight(&self) -> Result<u16> {
        self.field(2)
    }

    pub fn port(&self) -> Result<u16> {
        self.field(4)
    }

    pub fn host(&self) -> Result<Name<'a>> {
        if self.len < 7 {
            bail!("SRV record is {} bytes, too short to hold a host", self.len);
        }
        Ok(Name::new(self.buf, self.offset + 6))
    }
}

/// A 'TXT' record: a sequence of length-prefixed strings, conventionally
/// key=value pairs.
pub struct Txt<'a> {
    rdata: &'a [u8],
}

impl<'a> Txt<'a> {
    pub fn new(rdata: &'a [u8]) -> Self {
        Self { rdata }
    }

    /// Returns the number of entries in the record.
    pub fn count(&self) -> usize {
        let mut cursor = Cursor::new(self.rdata);
        let mut count = 0;
        while let Ok(len) = cursor.read() {
            if cursor.skip(len as usize).is_err() {
                break;
            }
            count += 1;
        }
        count
    }

    /// Returns the entry at `index`, or None past the end of the record.
    pub fn get(&self, index: usize) -> Option<&'a [u8]> {
        let mut cursor = Cursor::new(self.rdata);
        let mut remaining = index;
        while let Ok(len) = cursor.read() {
            let entry = cursor.read_exact(len as usize).ok()?;
            if remaining == 0 {
                return Some(entry);
            }
            remaining -= 1;
        }
        None
    }

    /// Returns the value for a key=value entry matching `key`.
    ///
    /// The key comparison ignores ASCII case. A missing key is None, not an
    /// error.
    pub fn value(&self, key: &str) -> Option<&'a [u8]> {
        let key = key.as_bytes();
        let mut cursor = Cursor::new(self.rdata);
        while let Ok(len) = cursor.read() {
            let entry = cursor.read_exact(len as usize).ok()?;
            if entry.len() > key.len()
                && entry[key.len()] == b'='
                && entry[..key.len()].eq_ignore_ascii_case(key)
            {
                return Some(&entry[key.len() + 1..]);
            }
        }
        None
    }
}

impl Display for Txt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut cursor = Cursor::new(self.rdata);
        let mut first = true;
        while let Ok(len) = cursor.read() {
            let Ok(entry) = cursor.read_exact(len as usize) else {
                break;
            };
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}", String::from_utf8_lossy(entry))?;
            first = false;
        }
        Ok(())
    }
}

/// An 'HINFO' record: two length-prefixed strings naming CPU and OS.
pub struct Hinfo<'a> {
    rdata: &'a [u8],
}

impl<'a> Hinfo<'a> {
    pub fn new(rdata: &'a [u8]) -> Self {
        Self { rdata }
    }

    fn strings(&self) -> Result<(&'a [u8], &'a [u8])> {
        let mut cursor = Cursor::new(self.rdata);
        let cpu_len = cursor.read()?;
        let cpu = cursor.read_exact(cpu_len as usize)?;
        let os_len = cursor.read()?;
        let os = cursor.read_exact(os_len as usize)?;
        Ok((cpu, os))
    }

    pub fn cpu(&self) -> Result<&'a [u8]> {
        Ok(self.strings()?.0)
    }

    pub fn os(&self) -> Result<&'a [u8]> {
        Ok(self.strings()?.1)
    }
}
