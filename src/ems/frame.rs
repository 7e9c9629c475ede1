//! # EMS Telegram Framing
//!
//! This module turns a post-link-layer byte run into an [`EmsFrame`] and
//! serialises outbound command telegrams. A frame is
//! `source | dest | type | offset | payload...`; the offset field shifts
//! the logical payload window, so byte `k` of the payload is addressed by
//! logical index `offset + k`. Runs shorter than the four header bytes are
//! not a frame.
//!
//! On the wire an outbound command omits the source byte (the link layer
//! inserts it) and sets the high bit of the destination iff a response is
//! expected.

use crate::constants::DEST_RESPONSE_FLAG;
use bytes::{BufMut, BytesMut};
use nom::number::complete::be_u8;
use nom::sequence::tuple;
use nom::IResult;

/// Represents one inbound EMS telegram after link-layer framing and CRC
/// have been stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmsFrame {
    pub source: u8,
    pub dest: u8,
    pub frame_type: u8,
    pub offset: u8,
    pub payload: Vec<u8>,
}

fn parse_header(input: &[u8]) -> IResult<&[u8], (u8, u8, u8, u8)> {
    tuple((be_u8, be_u8, be_u8, be_u8))(input)
}

impl EmsFrame {
    /// Parses a telegram. Returns `None` for runs shorter than the frame
    /// header; such runs are discarded silently by the caller.
    pub fn parse(raw: &[u8]) -> Option<EmsFrame> {
        let (payload, (source, dest, frame_type, offset)) = parse_header(raw).ok()?;
        Some(EmsFrame {
            source,
            dest,
            frame_type,
            offset,
            payload: payload.to_vec(),
        })
    }

    /// Whether the destination marks this telegram as a polling request.
    pub fn is_polling(&self) -> bool {
        self.dest & DEST_RESPONSE_FLAG != 0
    }

    /// Whether the header is the all-zero invalid pattern.
    pub fn has_invalid_header(&self) -> bool {
        self.source == 0 && self.dest == 0 && self.frame_type == 0
    }

    /// Bounded-range check: true iff the `len` bytes at logical index
    /// `logical` lie fully inside the payload window of this frame. The
    /// upper boundary is inclusive: access ending exactly at the end of
    /// the payload is allowed.
    pub fn can_access(&self, logical: usize, len: usize) -> bool {
        let start = self.offset as usize;
        logical >= start && logical + len <= start + self.payload.len()
    }

    /// Payload byte at logical index `logical`. The caller must have
    /// checked [`EmsFrame::can_access`] first.
    pub fn at(&self, logical: usize) -> u8 {
        self.payload[logical - self.offset as usize]
    }

    /// Payload bytes starting at logical index `logical`. The caller must
    /// have checked [`EmsFrame::can_access`] first.
    pub fn slice(&self, logical: usize, len: usize) -> &[u8] {
        let start = logical - self.offset as usize;
        &self.payload[start..start + len]
    }

    /// Serialises the frame back into its inbound wire layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(4 + self.payload.len());
        buf.put_u8(self.source);
        buf.put_u8(self.dest);
        buf.put_u8(self.frame_type);
        buf.put_u8(self.offset);
        buf.put_slice(&self.payload);
        buf.to_vec()
    }
}

/// Serialises an outbound command into the on-wire byte layout
/// `dest | type | offset | payload...`.
///
/// The source byte is omitted; the link layer inserts it. If
/// `expect_response` is set, the high bit of the destination requests a
/// reply from the addressed module.
pub fn pack_command(
    dest: u8,
    frame_type: u8,
    offset: u8,
    payload: &[u8],
    expect_response: bool,
) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(3 + payload.len());
    buf.put_u8(if expect_response {
        dest | DEST_RESPONSE_FLAG
    } else {
        dest
    });
    buf.put_u8(frame_type);
    buf.put_u8(offset);
    buf.put_slice(payload);
    buf.to_vec()
}
