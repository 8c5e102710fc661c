//! Packet encoding/decoding
//!
//! Implements the s3g packet framing.
//!
//! Packet format:
//! - 1 byte: start byte (0xD5)
//! - 1 byte: payload length N (0..=32)
//! - N bytes: payload
//! - 1 byte: CRC8 (iButton/Maxim) of the payload only
//!
//! Outbound payloads are assembled with a [`PacketBuilder`] and framed whole
//! with [`encode`]. Inbound bytes are fed one
//! at a time through a [`PacketDecoder`], so the same code handles a serial
//! driver that delivers single bytes and one that delivers whole buffers.

use byteorder::{ByteOrder, LittleEndian};

use super::commands::{HostQuery, ToolQuery};
use super::crc::crc8;
use super::{ProtocolError, MAX_PAYLOAD_LENGTH, PACKET_OVERHEAD, START_BYTE};

/// A protocol packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    payload: Vec<u8>,
    crc: u8,
}

impl Packet {
    /// Create a new packet with the given payload
    pub fn new(payload: Vec<u8>) -> Result<Self, ProtocolError> {
        if payload.len() > MAX_PAYLOAD_LENGTH {
            return Err(ProtocolError::PayloadTooLong(payload.len()));
        }
        let crc = crc8(&payload);
        Ok(Self { payload, crc })
    }

    /// Decode a packet from exactly one packet's worth of raw bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        let payload = decode(data)?;
        let crc = crc8(&payload);
        Ok(Self { payload, crc })
    }

    /// Packet payload
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// CRC8 of the payload
    pub fn crc(&self) -> u8 {
        self.crc
    }

    /// Encode the packet to raw bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_size());
        bytes.push(START_BYTE);
        // Length fits in a byte, checked in new()
        bytes.push(self.payload.len() as u8);
        bytes.extend_from_slice(&self.payload);
        bytes.push(self.crc);
        bytes
    }

    /// Get the total encoded size
    pub fn encoded_size(&self) -> usize {
        self.payload.len() + PACKET_OVERHEAD
    }
}

/// Builder for command payloads
#[derive(Debug, Clone, Default)]
pub struct PacketBuilder {
    payload: Vec<u8>,
}

impl PacketBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            payload: Vec::with_capacity(MAX_PAYLOAD_LENGTH),
        }
    }

    /// Add a host query opcode
    pub fn query(mut self, query: HostQuery) -> Self {
        self.payload.push(query.opcode());
        self
    }

    /// Add a tool query: `[10, tool, sub-opcode]`
    pub fn tool_query(self, tool: u8, query: ToolQuery) -> Self {
        self.query(HostQuery::ToolQuery).byte(tool).byte(query.opcode())
    }

    /// Add a single byte
    pub fn byte(mut self, b: u8) -> Self {
        self.payload.push(b);
        self
    }

    /// Add a 16-bit value (little-endian)
    pub fn u16_le(mut self, value: u16) -> Self {
        let mut bytes = [0u8; 2];
        LittleEndian::write_u16(&mut bytes, value);
        self.payload.extend_from_slice(&bytes);
        self
    }

    /// Add raw bytes
    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.payload.extend_from_slice(data);
        self
    }

    /// Take the assembled payload without framing it
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Build the packet
    pub fn build(self) -> Result<Packet, ProtocolError> {
        Packet::new(self.payload)
    }
}

/// Frame a payload for transmission
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    Ok(Packet::new(payload.to_vec())?.to_bytes())
}

/// Decode a buffer holding exactly one packet and return its payload.
///
/// Fails with [`ProtocolError::IncompletePacket`] if the buffer ends early and
/// [`ProtocolError::LengthMismatch`] if bytes follow the checksum.
pub fn decode(bytes: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut decoder = PacketDecoder::new();
    for (i, &byte) in bytes.iter().enumerate() {
        decoder.push(byte)?;
        if decoder.is_payload_ready() {
            if i + 1 != bytes.len() {
                return Err(ProtocolError::LengthMismatch);
            }
            return decoder.take_payload().ok_or(ProtocolError::InvalidResponse);
        }
    }
    Err(ProtocolError::IncompletePacket {
        received: bytes.len(),
    })
}

/// Decoder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Waiting for the start byte
    WaitForHeader,
    /// Waiting for the length byte
    WaitForLength,
    /// Accumulating payload bytes
    WaitForData,
    /// Waiting for the CRC byte
    WaitForChecksum,
    /// A validated payload is available; reset before decoding further
    PayloadReady,
}

/// Incremental packet decoder.
///
/// Holds the state of at most one packet. After a packet is read, or after
/// any error, [`PacketDecoder::reset`] must be called before more bytes are
/// pushed; until then [`PacketDecoder::push`] returns
/// [`ProtocolError::DecoderNotReset`].
#[derive(Debug, Clone)]
pub struct PacketDecoder {
    state: DecoderState,
    expected_length: usize,
    payload: Vec<u8>,
    received: usize,
    faulted: bool,
}

impl PacketDecoder {
    /// Create a decoder waiting for a start byte
    pub fn new() -> Self {
        Self {
            state: DecoderState::WaitForHeader,
            expected_length: 0,
            payload: Vec::with_capacity(MAX_PAYLOAD_LENGTH),
            received: 0,
            faulted: false,
        }
    }

    /// Current state
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Number of bytes consumed since the last reset
    pub fn bytes_received(&self) -> usize {
        self.received
    }

    /// Whether the last push failed and a reset is pending
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Feed one byte and return the resulting state
    pub fn push(&mut self, byte: u8) -> Result<DecoderState, ProtocolError> {
        if self.faulted {
            return Err(ProtocolError::DecoderNotReset);
        }
        let result = self.step(byte);
        match result {
            Ok(_) => self.received += 1,
            Err(_) => self.faulted = true,
        }
        result
    }

    fn step(&mut self, byte: u8) -> Result<DecoderState, ProtocolError> {
        match self.state {
            DecoderState::WaitForHeader => {
                if byte != START_BYTE {
                    return Err(ProtocolError::HeaderMismatch(byte));
                }
                self.state = DecoderState::WaitForLength;
            }
            DecoderState::WaitForLength => {
                let length = byte as usize;
                if length > MAX_PAYLOAD_LENGTH {
                    return Err(ProtocolError::LengthExceeded(length));
                }
                self.expected_length = length;
                self.state = if length == 0 {
                    DecoderState::WaitForChecksum
                } else {
                    DecoderState::WaitForData
                };
            }
            DecoderState::WaitForData => {
                self.payload.push(byte);
                if self.payload.len() > self.expected_length {
                    return Err(ProtocolError::LengthMismatch);
                }
                if self.payload.len() == self.expected_length {
                    self.state = DecoderState::WaitForChecksum;
                }
            }
            DecoderState::WaitForChecksum => {
                let expected = crc8(&self.payload);
                if byte != expected {
                    return Err(ProtocolError::ChecksumMismatch {
                        expected,
                        actual: byte,
                    });
                }
                self.state = DecoderState::PayloadReady;
            }
            DecoderState::PayloadReady => return Err(ProtocolError::DecoderNotReset),
        }
        Ok(self.state)
    }

    /// Check whether a validated payload is available
    pub fn is_payload_ready(&self) -> bool {
        self.state == DecoderState::PayloadReady
    }

    /// Borrow the validated payload, if one is ready
    pub fn payload(&self) -> Option<&[u8]> {
        self.is_payload_ready().then_some(self.payload.as_slice())
    }

    /// Take the validated payload and reset the decoder
    pub fn take_payload(&mut self) -> Option<Vec<u8>> {
        if !self.is_payload_ready() {
            return None;
        }
        let payload = std::mem::take(&mut self.payload);
        self.reset();
        Some(payload)
    }

    /// Clear state, buffer and byte count
    pub fn reset(&mut self) {
        self.state = DecoderState::WaitForHeader;
        self.expected_length = 0;
        self.payload.clear();
        self.received = 0;
        self.faulted = false;
    }
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(decoder: &mut PacketDecoder, bytes: &[u8]) -> Result<DecoderState, ProtocolError> {
        let mut state = decoder.state();
        for &b in bytes {
            state = decoder.push(b)?;
        }
        Ok(state)
    }

    #[test]
    fn test_packet_roundtrip() {
        let original = Packet::new(vec![20]).expect("Should encode");
        let encoded = original.to_bytes();
        let decoded = Packet::from_bytes(&encoded).expect("Should decode successfully");

        assert_eq!(original, decoded);
        assert_eq!(decoded.payload(), &[20]);
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode(&[10, 0, 2]).unwrap();
        assert_eq!(bytes, vec![0xD5, 3, 10, 0, 2, crc8(&[10, 0, 2])]);
    }

    #[test]
    fn test_encode_empty() {
        assert_eq!(encode(&[]).unwrap(), vec![0xD5, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_max_length() {
        let payload = [0xAAu8; MAX_PAYLOAD_LENGTH];
        let packet = Packet::new(payload.to_vec()).unwrap();
        assert_eq!(packet.encoded_size(), 35);
        assert_eq!(packet.to_bytes().len(), 35);
    }

    #[test]
    fn test_encode_too_long() {
        let err = encode(&[0u8; 33]).unwrap_err();
        assert!(matches!(err, ProtocolError::PayloadTooLong(33)));
    }

    #[test]
    fn test_builder_queries() {
        let payload = PacketBuilder::new()
            .query(HostQuery::GetBuildName)
            .into_payload();
        assert_eq!(payload, vec![20]);

        let payload = PacketBuilder::new()
            .tool_query(1, ToolQuery::GetToolheadTargetTemperature)
            .into_payload();
        assert_eq!(payload, vec![10, 1, 32]);
    }

    #[test]
    fn test_builder_build_frames_payload() {
        let packet = PacketBuilder::new()
            .tool_query(0, ToolQuery::GetToolheadTemperature)
            .build()
            .unwrap();
        assert_eq!(packet.to_bytes(), encode(&[10, 0, 2]).unwrap());

        let packet = PacketBuilder::new().byte(0x81).u16_le(230).build().unwrap();
        assert_eq!(packet.payload(), &[0x81, 0xE6, 0x00]);
    }

    #[test]
    fn test_builder_rejects_oversized_payload() {
        let err = PacketBuilder::new()
            .query(HostQuery::GetBuildStatistics)
            .bytes(&[0u8; 32])
            .build()
            .unwrap_err();
        assert!(matches!(err, ProtocolError::PayloadTooLong(33)));
    }

    #[test]
    fn test_state_transitions() {
        let mut decoder = PacketDecoder::new();
        assert_eq!(decoder.state(), DecoderState::WaitForHeader);
        assert_eq!(decoder.push(0xD5).unwrap(), DecoderState::WaitForLength);
        assert_eq!(decoder.push(2).unwrap(), DecoderState::WaitForData);
        assert_eq!(decoder.push(0x81).unwrap(), DecoderState::WaitForData);
        assert_eq!(decoder.push(0x00).unwrap(), DecoderState::WaitForChecksum);
        assert!(decoder.payload().is_none());
        let crc = crc8(&[0x81, 0x00]);
        assert_eq!(decoder.push(crc).unwrap(), DecoderState::PayloadReady);
        assert_eq!(decoder.payload(), Some(&[0x81, 0x00][..]));
        assert_eq!(decoder.bytes_received(), 5);
    }

    #[test]
    fn test_empty_payload_skips_data_state() {
        let mut decoder = PacketDecoder::new();
        decoder.push(0xD5).unwrap();
        assert_eq!(decoder.push(0).unwrap(), DecoderState::WaitForChecksum);
        assert_eq!(decoder.push(0).unwrap(), DecoderState::PayloadReady);
        assert_eq!(decoder.take_payload(), Some(Vec::new()));
    }

    #[test]
    fn test_header_mismatch() {
        let mut decoder = PacketDecoder::new();
        let err = decoder.push(0x41).unwrap_err();
        assert!(matches!(err, ProtocolError::HeaderMismatch(0x41)));
        assert!(decoder.is_faulted());
    }

    #[test]
    fn test_length_exceeded() {
        let mut decoder = PacketDecoder::new();
        decoder.push(0xD5).unwrap();
        assert!(matches!(
            decoder.push(33).unwrap_err(),
            ProtocolError::LengthExceeded(33)
        ));
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut decoder = PacketDecoder::new();
        let crc = crc8(&[1, 2, 3]);
        let err = feed(&mut decoder, &[0xD5, 3, 1, 2, 3, crc ^ 0x01]).unwrap_err();
        match err {
            ProtocolError::ChecksumMismatch { expected, actual } => {
                assert_eq!(expected, crc);
                assert_eq!(actual, crc ^ 0x01);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_faulted_decoder_refuses_bytes_until_reset() {
        let mut decoder = PacketDecoder::new();
        decoder.push(0x00).unwrap_err();
        assert!(matches!(
            decoder.push(0xD5).unwrap_err(),
            ProtocolError::DecoderNotReset
        ));

        decoder.reset();
        assert!(!decoder.is_faulted());
        assert_eq!(decoder.bytes_received(), 0);
        let state = feed(&mut decoder, &encode(&[7, 8]).unwrap()).unwrap();
        assert_eq!(state, DecoderState::PayloadReady);
        assert_eq!(decoder.payload(), Some(&[7, 8][..]));
    }

    #[test]
    fn test_ready_decoder_refuses_bytes() {
        let mut decoder = PacketDecoder::new();
        feed(&mut decoder, &encode(&[1]).unwrap()).unwrap();
        assert!(matches!(
            decoder.push(0xD5).unwrap_err(),
            ProtocolError::DecoderNotReset
        ));
    }

    #[test]
    fn test_take_payload_resets() {
        let mut decoder = PacketDecoder::new();
        assert_eq!(decoder.take_payload(), None);
        feed(&mut decoder, &encode(&[1, 2]).unwrap()).unwrap();
        assert_eq!(decoder.take_payload(), Some(vec![1, 2]));
        assert_eq!(decoder.state(), DecoderState::WaitForHeader);
        assert_eq!(decoder.bytes_received(), 0);
    }

    #[test]
    fn test_decode_truncated() {
        let bytes = encode(&[1, 2, 3]).unwrap();
        let err = decode(&bytes[..4]).unwrap_err();
        assert!(matches!(err, ProtocolError::IncompletePacket { received: 4 }));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut bytes = encode(&[1]).unwrap();
        bytes.push(0xD5);
        assert!(matches!(
            decode(&bytes).unwrap_err(),
            ProtocolError::LengthMismatch
        ));
    }
}
