//! WebSocket framing for an established connection.
//!
//! tungstenite's message layer rejects text frames that are not UTF-8 and
//! ends the stream when it does.  Controllers may answer in the encoding
//! named by the XML prolog (ISO-8859-1 is common), so frames are read one
//! level lower: [`FrameCodec`] splits the byte stream into frames using
//! tungstenite's header parser, and [`Assembler`] rebuilds messages,
//! handing text payloads on as raw bytes.
//!
//! ```text
//!  bytes ──► FrameCodec::decode ──► Frame ──► Assembler::push ──► Inbound
//!  Frame ──► FrameCodec::encode (masked) ──► bytes
//! ```

use std::io::Cursor;

use bytes::{Buf, BufMut, BytesMut};
use tokio_tungstenite::tungstenite::error::{CapacityError, ProtocolError};
use tokio_tungstenite::tungstenite::protocol::frame::coding::{Control, Data, OpCode};
use tokio_tungstenite::tungstenite::protocol::frame::{Frame, FrameHeader};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_util::codec::{Decoder, Encoder};

/// Upper bound for a single frame and for a reassembled message.
pub(crate) const MAX_MESSAGE_SIZE: usize = 16 << 20;

/// Largest payload a control frame may carry.
const MAX_CONTROL_PAYLOAD: usize = 125;

// ── Codec ─────────────────────────────────────────────────────────────────────

/// Client-side frame codec: decodes unmasked server frames, encodes masked
/// client frames.
#[derive(Debug, Clone)]
pub(crate) struct FrameCodec {
    max_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self {
            max_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = WsError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, WsError> {
        let (header, length, header_len) = {
            let mut cursor = Cursor::new(&src[..]);
            match FrameHeader::parse(&mut cursor)? {
                Some((header, length)) => (header, length, cursor.position() as usize),
                None => return Ok(None),
            }
        };

        let length = usize::try_from(length).unwrap_or(usize::MAX);
        if length > self.max_size {
            return Err(WsError::Capacity(CapacityError::MessageTooLong {
                size: length,
                max_size: self.max_size,
            }));
        }
        if header.mask.is_some() {
            return Err(WsError::Protocol(ProtocolError::MaskedFrameFromServer));
        }
        if header.rsv1 || header.rsv2 || header.rsv3 {
            return Err(WsError::Protocol(ProtocolError::NonZeroReservedBits));
        }

        let frame_len = header_len + length;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(header_len);
        let payload = src.split_to(length).to_vec();
        Ok(Some(Frame::from_payload(header, payload)))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = WsError;

    fn encode(&mut self, mut frame: Frame, dst: &mut BytesMut) -> Result<(), WsError> {
        // Frames sent by a client must be masked.
        frame.header_mut().mask = Some(rand::random());
        dst.reserve(frame.len());
        let mut out = BufMut::writer(&mut *dst);
        frame.format(&mut out)
    }
}

// ── Message reassembly ────────────────────────────────────────────────────────

/// A complete inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Inbound {
    /// Text payload exactly as received; not validated as UTF-8.
    Text(Vec<u8>),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong,
    /// Close frame payload (status code and reason, possibly empty).
    Close(Vec<u8>),
}

/// Rebuilds messages from frames, including fragmented data messages.
/// Control frames may arrive between fragments.
#[derive(Debug)]
pub(crate) struct Assembler {
    partial: Option<(Data, Vec<u8>)>,
    max_size: usize,
}

impl Default for Assembler {
    fn default() -> Self {
        Self {
            partial: None,
            max_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl Assembler {
    /// Feeds one frame; returns a message once one is complete.
    ///
    /// # Errors
    ///
    /// Protocol violations (bad fragmentation, oversized or fragmented
    /// control frames, reserved opcodes) and messages above the size limit.
    pub(crate) fn push(&mut self, frame: Frame) -> Result<Option<Inbound>, WsError> {
        let is_final = frame.header().is_final;

        match frame.header().opcode {
            OpCode::Control(control) => {
                if !is_final {
                    return Err(WsError::Protocol(ProtocolError::FragmentedControlFrame));
                }
                if frame.payload().len() > MAX_CONTROL_PAYLOAD {
                    return Err(WsError::Protocol(ProtocolError::ControlFrameTooBig));
                }
                match control {
                    Control::Ping => Ok(Some(Inbound::Ping(frame.into_data()))),
                    Control::Pong => Ok(Some(Inbound::Pong)),
                    Control::Close => Ok(Some(Inbound::Close(frame.into_data()))),
                    Control::Reserved(code) => Err(WsError::Protocol(
                        ProtocolError::UnknownControlFrameType(code),
                    )),
                }
            }
            OpCode::Data(Data::Reserved(code)) => Err(WsError::Protocol(
                ProtocolError::UnknownDataFrameType(code),
            )),
            OpCode::Data(Data::Continue) => {
                let Some((kind, mut data)) = self.partial.take() else {
                    return Err(WsError::Protocol(ProtocolError::UnexpectedContinueFrame));
                };
                data.extend_from_slice(frame.payload());
                if data.len() > self.max_size {
                    return Err(WsError::Capacity(CapacityError::MessageTooLong {
                        size: data.len(),
                        max_size: self.max_size,
                    }));
                }
                Ok(self.finish(kind, data, is_final))
            }
            OpCode::Data(kind) => {
                if self.partial.is_some() {
                    return Err(WsError::Protocol(ProtocolError::ExpectedFragment(kind)));
                }
                Ok(self.finish(kind, frame.into_data(), is_final))
            }
        }
    }

    fn finish(&mut self, kind: Data, data: Vec<u8>, is_final: bool) -> Option<Inbound> {
        if !is_final {
            self.partial = Some((kind, data));
            return None;
        }
        Some(match kind {
            Data::Text => Inbound::Text(data),
            _ => Inbound::Binary(data),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Bytes of an unmasked frame as a server would send it.
    fn server_frame(opcode: OpCode, payload: &[u8], is_final: bool) -> Vec<u8> {
        let frame = Frame::from_payload(
            FrameHeader {
                is_final,
                opcode,
                ..FrameHeader::default()
            },
            payload.to_vec(),
        );
        let mut bytes = Vec::new();
        frame.format(&mut bytes).unwrap();
        bytes
    }

    fn text(payload: &[u8]) -> Vec<u8> {
        server_frame(OpCode::Data(Data::Text), payload, true)
    }

    fn decode_all(bytes: &[u8]) -> Vec<Inbound> {
        let mut codec = FrameCodec::default();
        let mut assembler = Assembler::default();
        let mut buf = BytesMut::from(bytes);
        let mut out = Vec::new();
        while let Some(frame) = codec.decode(&mut buf).unwrap() {
            if let Some(message) = assembler.push(frame).unwrap() {
                out.push(message);
            }
        }
        assert!(buf.is_empty(), "{} bytes left over", buf.len());
        out
    }

    #[test]
    fn test_latin1_text_frame_is_passed_through_unvalidated() {
        // Arrange: "Rückl." in ISO-8859-1
        let bytes = text(b"R\xFCckl.");

        // Act
        let messages = decode_all(&bytes);

        // Assert
        assert_eq!(messages, [Inbound::Text(b"R\xFCckl.".to_vec())]);
    }

    #[test]
    fn test_partial_header_and_partial_payload_wait_for_more_bytes() {
        // Arrange
        let bytes = text(b"<Content/>");
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&bytes[..1]);

        // Act / Assert: one header byte is not enough
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 1);

        buf.extend_from_slice(&bytes[1..4]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&bytes[4..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.payload().as_slice(), b"<Content/>");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_fragmented_text_with_interleaved_ping_is_reassembled() {
        // Arrange
        let mut bytes = server_frame(OpCode::Data(Data::Text), b"<Navi", false);
        bytes.extend(server_frame(OpCode::Control(Control::Ping), b"hb", true));
        bytes.extend(server_frame(OpCode::Data(Data::Continue), b"gation/>", true));

        // Act
        let messages = decode_all(&bytes);

        // Assert
        assert_eq!(
            messages,
            [
                Inbound::Ping(b"hb".to_vec()),
                Inbound::Text(b"<Navigation/>".to_vec()),
            ]
        );
    }

    #[test]
    fn test_continue_without_start_is_protocol_error() {
        let mut buf = BytesMut::from(&server_frame(OpCode::Data(Data::Continue), b"x", true)[..]);
        let frame = FrameCodec::default().decode(&mut buf).unwrap().unwrap();

        let err = Assembler::default().push(frame).unwrap_err();

        assert!(matches!(
            err,
            WsError::Protocol(ProtocolError::UnexpectedContinueFrame)
        ));
    }

    #[test]
    fn test_masked_server_frame_is_rejected() {
        // Arrange
        let mut frame = Frame::message(b"x".to_vec(), OpCode::Data(Data::Text), true);
        frame.header_mut().mask = Some([1, 2, 3, 4]);
        let mut bytes = Vec::new();
        frame.format(&mut bytes).unwrap();

        // Act
        let err = FrameCodec::default()
            .decode(&mut BytesMut::from(&bytes[..]))
            .unwrap_err();

        // Assert
        assert!(matches!(
            err,
            WsError::Protocol(ProtocolError::MaskedFrameFromServer)
        ));
    }

    #[test]
    fn test_oversized_frame_is_rejected_before_payload_arrives() {
        let mut codec = FrameCodec { max_size: 4 };
        let bytes = text(b"too long");

        // Only the header is buffered.
        let err = codec.decode(&mut BytesMut::from(&bytes[..2])).unwrap_err();

        assert!(matches!(err, WsError::Capacity(_)));
    }

    #[test]
    fn test_encoded_frames_are_masked() {
        // Arrange
        let frame = Frame::message(b"LOGIN;".to_vec(), OpCode::Data(Data::Text), true);
        let mut buf = BytesMut::new();

        // Act
        FrameCodec::default().encode(frame, &mut buf).unwrap();

        // Assert: FIN + text opcode, mask bit set, 4 mask bytes, 6 payload bytes
        assert_eq!(buf[0], 0x81);
        assert_eq!(buf[1], 0x80 | 6);
        assert_eq!(buf.len(), 2 + 4 + 6);
        let mask = [buf[2], buf[3], buf[4], buf[5]];
        let unmasked: Vec<u8> = buf[6..]
            .iter()
            .enumerate()
            .map(|(i, byte)| byte ^ mask[i % 4])
            .collect();
        assert_eq!(unmasked, b"LOGIN;");
    }
}
