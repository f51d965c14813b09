//! Framed wire protocol.
//!
//! Every message travels as `[u32 payload length][u32 type tag][payload]`,
//! all big-endian. The payload is a bincode-encoded [`Packet`]; the tag is
//! the closed enumeration below and is cross-checked against the decoded
//! variant, so a header that lies about its payload is a protocol error
//! rather than a silently misrouted message.

use crate::error::ProtocolError;
use crate::model::{Badge, Hotel, HotelRate};
use serde::{Deserialize, Serialize};

/// Frame header size: payload length (4 bytes) + type tag (4 bytes).
pub const HEADER_LEN: usize = 8;

/// Upper bound on a declared payload. Anything larger is treated as a
/// desynchronized or hostile stream.
pub const MAX_PAYLOAD: usize = 1024 * 1024;

/// The closed set of request/response messages, tagged 0-12 on the wire.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    LoginRequest { username: String, password: String },
    LoginResponse { message: String },
    LogoutRequest,
    LogoutResponse { message: String },
    SearchHotelRequest { name: String, city: String },
    SearchHotelResponse { hotel: Hotel },
    SearchAllHotelsRequest { city: String },
    SearchAllHotelsResponse { hotels: Vec<Hotel> },
    InsertReviewRequest {
        hotel_name: String,
        city: String,
        rate: f32,
        ratings: HotelRate,
    },
    InsertReviewResponse { message: String },
    BadgeRequest,
    BadgeResponse { badge: Badge },
    ErrorResponse { message: String },
}

impl Packet {
    /// Wire type tag of this variant.
    pub fn tag(&self) -> u32 {
        match self {
            Packet::LoginRequest { .. } => 0,
            Packet::LoginResponse { .. } => 1,
            Packet::LogoutRequest => 2,
            Packet::LogoutResponse { .. } => 3,
            Packet::SearchHotelRequest { .. } => 4,
            Packet::SearchHotelResponse { .. } => 5,
            Packet::SearchAllHotelsRequest { .. } => 6,
            Packet::SearchAllHotelsResponse { .. } => 7,
            Packet::InsertReviewRequest { .. } => 8,
            Packet::InsertReviewResponse { .. } => 9,
            Packet::BadgeRequest => 10,
            Packet::BadgeResponse { .. } => 11,
            Packet::ErrorResponse { .. } => 12,
        }
    }
}

const MAX_TAG: u32 = 12;

/// Serializes a packet into its wire tag and payload bytes.
pub fn encode(packet: &Packet) -> Result<(u32, Vec<u8>), ProtocolError> {
    let payload = bincode::serialize(packet).map_err(ProtocolError::Encode)?;
    Ok((packet.tag(), payload))
}

/// Reconstructs a packet from a received tag and payload. Unknown tags,
/// undecodable payloads and tag/payload mismatches all fail without
/// touching anything beyond this call.
pub fn decode(tag: u32, payload: &[u8]) -> Result<Packet, ProtocolError> {
    if tag > MAX_TAG {
        return Err(ProtocolError::UnknownTag(tag));
    }
    let packet: Packet = bincode::deserialize(payload)
        .map_err(|source| ProtocolError::MalformedPayload { tag, source })?;
    if packet.tag() != tag {
        return Err(ProtocolError::TagMismatch {
            expected: tag,
            found: packet.tag(),
        });
    }
    Ok(packet)
}

/// Serializes a packet into one complete frame, header included.
pub fn encode_frame(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    let (tag, payload) = encode(packet)?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&tag.to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

struct PendingPayload {
    tag: u32,
    buf: Vec<u8>,
    filled: usize,
}

/// Incremental frame reassembly: accumulates the fixed header, then the
/// payload it announces, and emits `(tag, payload)` pairs. Message
/// boundaries may fall anywhere inside the fed chunks; feeding one byte at
/// a time produces the same sequence as feeding everything at once.
#[derive(Default)]
pub struct FrameDecoder {
    header: [u8; HEADER_LEN],
    header_filled: usize,
    pending: Option<PendingPayload>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes `bytes` and returns every frame they complete, in order.
    pub fn feed(&mut self, mut bytes: &[u8]) -> Result<Vec<(u32, Vec<u8>)>, ProtocolError> {
        let mut frames = Vec::new();

        while !bytes.is_empty() {
            match self.pending.as_mut() {
                None => {
                    let take = (HEADER_LEN - self.header_filled).min(bytes.len());
                    self.header[self.header_filled..self.header_filled + take]
                        .copy_from_slice(&bytes[..take]);
                    self.header_filled += take;
                    bytes = &bytes[take..];

                    if self.header_filled == HEADER_LEN {
                        self.begin_payload(&mut frames)?;
                    }
                }
                Some(pending) => {
                    let take = (pending.buf.len() - pending.filled).min(bytes.len());
                    pending.buf[pending.filled..pending.filled + take]
                        .copy_from_slice(&bytes[..take]);
                    pending.filled += take;
                    bytes = &bytes[take..];

                    if pending.filled == pending.buf.len() {
                        if let Some(done) = self.pending.take() {
                            frames.push((done.tag, done.buf));
                        }
                    }
                }
            }
        }

        Ok(frames)
    }

    /// Parses a completed header: either emits an empty-payload frame right
    /// away or allocates the payload buffer the next fed bytes fill.
    fn begin_payload(
        &mut self,
        frames: &mut Vec<(u32, Vec<u8>)>,
    ) -> Result<(), ProtocolError> {
        let len = u32::from_be_bytes([
            self.header[0],
            self.header[1],
            self.header[2],
            self.header[3],
        ]) as usize;
        let tag = u32::from_be_bytes([
            self.header[4],
            self.header[5],
            self.header[6],
            self.header[7],
        ]);
        self.header_filled = 0;

        if len > MAX_PAYLOAD {
            return Err(ProtocolError::OversizedFrame(len));
        }

        if len == 0 {
            frames.push((tag, Vec::new()));
        } else {
            self.pending = Some(PendingPayload {
                tag,
                buf: vec![0; len],
                filled: 0,
            });
        }
        Ok(())
    }
}
