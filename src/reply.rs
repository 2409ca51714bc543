use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use anyhow::{bail, Result};

use crate::resource::ResourceType;
use crate::CLASS_IN;

/// One of the four record groupings in a DNS message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Question,
    Answer,
    Authority,
    Additional,
}

impl Section {
    /// Returns the next section, in wire order.
    fn next(self) -> Option<Self> {
        match self {
            Section::Question => Some(Section::Answer),
            Section::Answer => Some(Section::Authority),
            Section::Authority => Some(Section::Additional),
            Section::Additional => None,
        }
    }

    fn index(self) -> usize {
        match self {
            Section::Question => 0,
            Section::Answer => 1,
            Section::Authority => 2,
            Section::Additional => 3,
        }
    }
}

/// A reference to a name written into a reply.
///
/// If the name's encoding ended in a compression pointer, the reference
/// remembers where that pointer sits so it can be re-aimed later with
/// [`Reply::fixup`].
#[derive(Debug, Clone, Copy)]
pub struct NameRef {
    offset: usize,
    pointer_pos: Option<usize>,
}

impl NameRef {
    /// Returns the offset where the name's encoding starts.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns true if the name's encoding ends in a compression pointer.
    pub fn ends_in_pointer(&self) -> bool {
        self.pointer_pos.is_some()
    }
}

/// A handle over a record written into a reply.
#[derive(Debug, Clone, Copy)]
pub struct RecordHandle {
    name: NameRef,
    rdata_name: Option<NameRef>,
}

impl RecordHandle {
    /// Returns the record's owner name.
    pub fn name(&self) -> NameRef {
        self.name
    }

    /// Returns the name embedded in the record data, where the record type
    /// carries one (the PTR target, the SRV host).
    pub fn rdata_name(&self) -> Option<NameRef> {
        self.rdata_name
    }
}

/// A handle over a TXT record written into a reply.
///
/// Entries can be appended in place through [`Reply::add_txt_entry`] for as
/// long as the record is the last thing in the reply.
#[derive(Debug, Clone, Copy)]
pub struct TxtRecordHandle {
    name: NameRef,
    rdlen_pos: usize,
}

impl TxtRecordHandle {
    pub fn name(&self) -> NameRef {
        self.name
    }
}

/// An outgoing DNS message under construction.
///
/// The builder is append-only: records land in the current section, the
/// section cursor only moves forward, and the per-section counts are kept
/// live in the header bytes. Names are compressed against every name already
/// written into the same buffer.
pub struct Reply {
    buf: Vec<u8>,
    section: Section,
    /// First occurrence of every written name suffix, lowercased, keyed for
    /// compression back-references.
    names: HashMap<String, usize>,
}

impl Reply {
    fn new(id: u16, is_response: bool, section: Section) -> Self {
        let mut buf = vec![0; 12];
        buf[0..2].copy_from_slice(&id.to_be_bytes());
        if is_response {
            // response + authoritative answer
            buf[2] = 0x84;
        }
        Self {
            buf,
            section,
            names: HashMap::new(),
        }
    }

    /// Creates a reply message, positioned at the Answer section.
    ///
    /// mDNS responses carry no question echo, so the question section stays
    /// empty and the first answer name becomes the compression target for
    /// everything after it.
    pub fn answer(id: u16) -> Self {
        Self::new(id, true, Section::Answer)
    }

    /// Creates a query message, positioned at the Question section.
    pub fn query(id: u16) -> Self {
        Self::new(id, false, Section::Question)
    }

    /// Returns the section records are currently appended to.
    pub fn section(&self) -> Section {
        self.section
    }

    /// Advances to the next section. Sections only move forward; once one is
    /// passed nothing can be appended to it again.
    pub fn next_section(&mut self) -> Result<()> {
        match self.section.next() {
            Some(section) => {
                self.section = section;
                Ok(())
            }
            None => bail!("already in the additional section"),
        }
    }

    /// Returns the finished wire bytes.
    pub fn packet(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the count of records written into a section.
    pub fn count(&self, section: Section) -> u16 {
        let pos = 4 + section.index() * 2;
        u16::from_be_bytes([self.buf[pos], self.buf[pos + 1]])
    }

    fn bump_count(&mut self) {
        let pos = 4 + self.section.index() * 2;
        let count = u16::from_be_bytes([self.buf[pos], self.buf[pos + 1]]);
        self.set_u16(pos, count + 1);
    }

    fn set_u16(&mut self, pos: usize, value: u16) {
        self.buf[pos..pos + 2].copy_from_slice(&value.to_be_bytes());
    }

    fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Encodes a name at the end of the buffer.
    ///
    /// Each label is written length-prefixed unless the remaining suffix was
    /// already written somewhere earlier in this message, in which case a
    /// two-byte pointer to that first occurrence ends the encoding. Pointer
    /// targets are always earlier offsets below 0x4000.
    fn write_name(&mut self, name: &str) -> Result<NameRef> {
        let name = name.strip_suffix('.').unwrap_or(name);
        let offset = self.buf.len();

        if name.is_empty() {
            self.buf.push(0);
            return Ok(NameRef {
                offset,
                pointer_pos: None,
            });
        }

        let labels: Vec<&str> = name.split('.').collect();
        for (i, label) in labels.iter().enumerate() {
            let suffix = labels[i..].join(".").to_ascii_lowercase();
            if let Some(&target) = self.names.get(&suffix) {
                let pointer_pos = self.buf.len();
                self.write_u16(0xC000 | target as u16);
                return Ok(NameRef {
                    offset,
                    pointer_pos: Some(pointer_pos),
                });
            }

            if label.is_empty() {
                bail!("name {name:?} contains an empty label");
            }
            if label.len() > 63 {
                bail!("label {label:?} is longer than 63 bytes");
            }

            let start = self.buf.len();
            if start < 0x4000 {
                self.names.insert(suffix, start);
            }
            self.buf.push(label.len() as u8);
            self.buf.extend_from_slice(label.as_bytes());
        }
        self.buf.push(0);

        Ok(NameRef {
            offset,
            pointer_pos: None,
        })
    }

    /// Re-aims a written name's trailing compression pointer at an earlier
    /// offset. Patches exactly the two pointer bytes; the buffer never
    /// changes size.
    pub fn fixup(&mut self, name: NameRef, target: u16) -> Result<()> {
        let Some(pos) = name.pointer_pos else {
            bail!("name does not end in a compression pointer");
        };
        if target >= 0x4000 {
            bail!("pointer target {target:#x} does not fit in 14 bits");
        }
        if target as usize >= pos {
            bail!("pointer target {target} does not lie before the pointer at {pos}");
        }
        self.set_u16(pos, 0xC000 | target);
        Ok(())
    }

    /// Returns the offset of a name already written into this message.
    pub fn offset_of(&self, name: &str) -> Option<u16> {
        let name = name.strip_suffix('.').unwrap_or(name);
        let offset = *self.names.get(&name.to_ascii_lowercase())?;
        Some(offset as u16)
    }

    /// Appends a question. Only valid while still in the question section.
    pub fn add_question(&mut self, name: &str, q_type: ResourceType) -> Result<NameRef> {
        if self.section != Section::Question {
            bail!("the question section has already been passed");
        }
        let name = self.write_name(name)?;
        self.write_u16(q_type.into());
        self.write_u16(CLASS_IN);
        self.bump_count();
        Ok(name)
    }

    /// Writes a record head: name, type, class, ttl and an rdlength
    /// placeholder. Returns the name reference and the placeholder position.
    fn add_record(&mut self, name: &str, r_type: ResourceType, ttl: u32) -> Result<(NameRef, usize)> {
        if self.section == Section::Question {
            bail!("records cannot be appended to the question section");
        }
        let name = self.write_name(name)?;
        self.write_u16(r_type.into());
        self.write_u16(CLASS_IN);
        self.write_u32(ttl);
        let rdlen_pos = self.buf.len();
        self.write_u16(0);
        self.bump_count();
        Ok((name, rdlen_pos))
    }

    fn finish_rdata(&mut self, rdlen_pos: usize) {
        let len = self.buf.len() - (rdlen_pos + 2);
        self.set_u16(rdlen_pos, len as u16);
    }

    /// Appends an 'A' record to the current section.
    pub fn add_a(&mut self, name: &str, ttl: u32, addr: Ipv4Addr) -> Result<RecordHandle> {
        let (name, rdlen_pos) = self.add_record(name, ResourceType::A, ttl)?;
        self.buf.extend_from_slice(&addr.octets());
        self.finish_rdata(rdlen_pos);
        Ok(RecordHandle {
            name,
            rdata_name: None,
        })
    }

    /// Appends an 'AAAA' record to the current section.
    pub fn add_aaaa(&mut self, name: &str, ttl: u32, addr: Ipv6Addr) -> Result<RecordHandle> {
        let (name, rdlen_pos) = self.add_record(name, ResourceType::Aaaa, ttl)?;
        self.buf.extend_from_slice(&addr.octets());
        self.finish_rdata(rdlen_pos);
        Ok(RecordHandle {
            name,
            rdata_name: None,
        })
    }

    /// Appends a 'PTR' record to the current section.
    pub fn add_ptr(&mut self, name: &str, ttl: u32, target: &str) -> Result<RecordHandle> {
        let (name, rdlen_pos) = self.add_record(name, ResourceType::Ptr, ttl)?;
        let target = self.write_name(target)?;
        self.finish_rdata(rdlen_pos);
        Ok(RecordHandle {
            name,
            rdata_name: Some(target),
        })
    }

    /// Appends an 'SRV' record to the current section.
    pub fn add_srv(
        &mut self,
        name: &str,
        ttl: u32,
        priority: u16,
        weight: u16,
        port: u16,
        host: &str,
    ) -> Result<RecordHandle> {
        let (name, rdlen_pos) = self.add_record(name, ResourceType::Srv, ttl)?;
        self.write_u16(priority);
        self.write_u16(weight);
        self.write_u16(port);
        let host = self.write_name(host)?;
        self.finish_rdata(rdlen_pos);
        Ok(RecordHandle {
            name,
            rdata_name: Some(host),
        })
    }

    /// Appends an empty 'TXT' record to the current section. Entries are
    /// added afterwards with [`Reply::add_txt_entry`].
    pub fn add_txt(&mut self, name: &str, ttl: u32) -> Result<TxtRecordHandle> {
        let (name, rdlen_pos) = self.add_record(name, ResourceType::Txt, ttl)?;
        self.finish_rdata(rdlen_pos);
        Ok(TxtRecordHandle { name, rdlen_pos })
    }

    /// Appends one length-prefixed entry to a TXT record, growing the record
    /// in place. The record must still be the last thing in the reply.
    pub fn add_txt_entry(&mut self, txt: TxtRecordHandle, entry: impl AsRef<[u8]>) -> Result<()> {
        let entry = entry.as_ref();
        if entry.len() > 255 {
            bail!("TXT entry is longer than 255 bytes");
        }
        let rdlen_pos = txt.rdlen_pos;
        let rdlen = u16::from_be_bytes([self.buf[rdlen_pos], self.buf[rdlen_pos + 1]]) as usize;
        if rdlen_pos + 2 + rdlen != self.buf.len() {
            bail!("TXT record is no longer at the end of the reply");
        }
        self.buf.push(entry.len() as u8);
        self.buf.extend_from_slice(entry);
        self.set_u16(rdlen_pos, (rdlen + 1 + entry.len()) as u16);
        Ok(())
    }
}
