use std::ops::Range;

use anyhow::{Context, Result};

use crate::bytes::Cursor;
use crate::name::Name;
use crate::resource::{Aaaa, Hinfo, Ptr, ResourceType, Srv, Txt, A};

/// A DNS message header.
#[derive(Debug)]
pub struct Header {
    pub id: u16,
    pub is_response: bool,
    pub op_code: u8,
    pub is_authority: bool,
    pub is_truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub resp_code: u8,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

impl Header {
    /// Parses a header from the front of a message.
    fn parse(cursor: &mut Cursor) -> Result<Self> {
        let id = cursor.read_u16()?;

        let byte = cursor.read()?;
        let is_response = ((byte >> 7) & 1) == 1;
        let op_code = (byte >> 3) & 0b1111;
        let is_authority = ((byte >> 2) & 1) == 1;
        let is_truncated = ((byte >> 1) & 1) == 1;
        let recursion_desired = (byte & 1) == 1;

        let byte = cursor.read()?;
        let recursion_available = ((byte >> 7) & 1) == 1;
        let resp_code = byte & 0b1111;

        let question_count = cursor.read_u16()?;
        let answer_count = cursor.read_u16()?;
        let authority_count = cursor.read_u16()?;
        let additional_count = cursor.read_u16()?;

        Ok(Self {
            id,
            is_response,
            op_code,
            is_authority,
            is_truncated,
            recursion_desired,
            recursion_available,
            resp_code,
            question_count,
            answer_count,
            authority_count,
            additional_count,
        })
    }
}

/// A question in a received message.
///
/// The name stays a decode position into the shared buffer; nothing is
/// materialized until asked for.
pub struct Question<'a> {
    buf: &'a [u8],
    name_offset: usize,
    q_type: ResourceType,
    q_class: u16,
}

impl<'a> Question<'a> {
    pub fn name(&self) -> Name<'a> {
        Name::new(self.buf, self.name_offset)
    }

    pub fn q_type(&self) -> ResourceType {
        self.q_type
    }

    pub fn q_class(&self) -> u16 {
        self.q_class
    }
}

/// A resource record in a received message.
///
/// The record data is a window into the shared buffer, never a copy.
pub struct Answer<'a> {
    buf: &'a [u8],
    name_offset: usize,
    r_type: ResourceType,
    class: u16,
    ttl: u32,
    rdata: Range<usize>,
}

impl<'a> Answer<'a> {
    pub fn name(&self) -> Name<'a> {
        Name::new(self.buf, self.name_offset)
    }

    pub fn r_type(&self) -> ResourceType {
        self.r_type
    }

    pub fn class(&self) -> u16 {
        self.class
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Returns the raw record data.
    pub fn rdata(&self) -> &'a [u8] {
        &self.buf[self.rdata.clone()]
    }

    /// Interprets the record as an 'A' record.
    pub fn a(&self) -> A<'a> {
        A::new(self.rdata())
    }

    /// Interprets the record as an 'AAAA' record.
    pub fn aaaa(&self) -> Aaaa<'a> {
        Aaaa::new(self.rdata())
    }

    /// Interprets the record as a 'PTR' record.
    pub fn ptr(&self) -> Ptr<'a> {
        Ptr::new(self.buf, self.rdata.start)
    }

    /// Interprets the record as an 'SRV' record.
    pub fn srv(&self) -> Srv<'a> {
        Srv::new(self.buf, self.rdata.start, self.rdata.len())
    }

    /// Interprets the record as a 'TXT' record.
    pub fn txt(&self) -> Txt<'a> {
        Txt::new(self.rdata())
    }

    /// Interprets the record as an 'HINFO' record.
    pub fn hinfo(&self) -> Hinfo<'a> {
        Hinfo::new(self.rdata())
    }
}

/// A parsed view over a received datagram.
///
/// Parsing validates the section structure up front; a truncated or otherwise
/// malformed datagram fails as a whole, so no partially decoded message is
/// ever observable. Names and record data stay offsets into the input buffer.
pub struct Message<'a> {
    pub header: Header,
    questions: Vec<Question<'a>>,
    answers: Vec<Answer<'a>>,
    authority: Vec<Answer<'a>>,
    additional: Vec<Answer<'a>>,
}

impl<'a> Message<'a> {
    /// Parses a message from a received datagram.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(buf);
        let header = Header::parse(&mut cursor).context("malformed header")?;

        let mut questions = vec![];
        for index in 0..header.question_count {
            let question = Self::parse_question(buf, &mut cursor)
                .with_context(|| format!("malformed question {index}"))?;
            questions.push(question);
        }

        let mut sections = [vec![], vec![], vec![]];
        let counts = [
            header.answer_count,
            header.authority_count,
            header.additional_count,
        ];
        for (section, count) in sections.iter_mut().zip(counts) {
            for index in 0..count {
                let answer = Self::parse_answer(buf, &mut cursor)
                    .with_context(|| format!("malformed record {index}"))?;
                section.push(answer);
            }
        }
        let [answers, authority, additional] = sections;

        Ok(Self {
            header,
            questions,
            answers,
            authority,
            additional,
        })
    }

    fn parse_question(buf: &'a [u8], cursor: &mut Cursor<'a>) -> Result<Question<'a>> {
        let name_offset = cursor.pos();
        let name = Name::new(buf, name_offset);
        name.verify()?;
        cursor.skip(name.data_length()?)?;

        let q_type = cursor.read_u16()?.into();
        let q_class = cursor.read_u16()?;

        Ok(Question {
            buf,
            name_offset,
            q_type,
            q_class,
        })
    }

    fn parse_answer(buf: &'a [u8], cursor: &mut Cursor<'a>) -> Result<Answer<'a>> {
        let name_offset = cursor.pos();
        let name = Name::new(buf, name_offset);
        name.verify()?;
        cursor.skip(name.data_length()?)?;

        let r_type = cursor.read_u16()?.into();
        let class = cursor.read_u16()?;
        let ttl = cursor.read_u32()?;
        let rd_len = cursor.read_u16()? as usize;
        let rdata = cursor.pos()..cursor.pos() + rd_len;
        cursor.skip(rd_len)?;

        Ok(Answer {
            buf,
            name_offset,
            r_type,
            class,
            ttl,
            rdata,
        })
    }

    pub fn questions(&self) -> &[Question<'a>] {
        &self.questions
    }

    pub fn answers(&self) -> &[Answer<'a>] {
        &self.answers
    }

    pub fn authority(&self) -> &[Answer<'a>] {
        &self.authority
    }

    pub fn additional(&self) -> &[Answer<'a>] {
        &self.additional
    }
}
