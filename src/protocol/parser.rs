//! Packet and payload codec (protocol version 4).
//!
//! # Packet Encoding
//!
//! | Data | Wire unit |
//! |------|-----------|
//! | none | `<digit>` |
//! | text | `<digit><text>` |
//! | binary | raw bytes, no type prefix |
//!
//! # Payload Framing
//!
//! Packets in one HTTP body are joined by the record separator `0x1E`.
//! Binary packets are written as `b` followed by standard base64 so the
//! whole payload stays text-safe. An empty packet list encodes to the
//! empty string.
//!
//! Decoding never fails: malformed input yields the sentinel packet
//! `{error, "parser error"}` (see [`Packet::parser_error`]).

// ============================================================================
// Imports
// ============================================================================

use std::ops::ControlFlow;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::packet::{Packet, PacketData, PacketType};

// ============================================================================
// Constants
// ============================================================================

/// Protocol revision sent as the `EIO` query parameter.
pub const PROTOCOL: u32 = 4;

/// Separator between packets inside a payload.
pub const SEPARATOR: char = '\x1e';

/// Prefix marking a base64-encoded binary packet inside a payload.
const BINARY_PREFIX: char = 'b';

// ============================================================================
// Encoded
// ============================================================================

/// A single encoded packet, ready for one physical frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
    /// Text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

// ============================================================================
// Packet Codec
// ============================================================================

/// Encodes one packet.
///
/// Binary data is passed through untouched; the frame type carries the
/// distinction. Binary data is always a `message` on the wire.
#[must_use]
pub fn encode_packet(packet: &Packet) -> Encoded {
    match &packet.data {
        Some(PacketData::Binary(bytes)) => Encoded::Binary(bytes.clone()),
        Some(PacketData::Text(text)) => Encoded::Text(format!("{}{text}", type_digit(packet))),
        None => Encoded::Text(type_digit(packet).to_string()),
    }
}

/// Decodes a text wire unit.
///
/// A leading `b` marks base64 binary data, anything else must start with
/// a type digit in `0..=6`. A bare `4` decodes to an empty text message;
/// other bare digits carry no data.
#[must_use]
pub fn decode_packet(data: &str) -> Packet {
    let mut chars = data.chars();
    let Some(first) = chars.next() else {
        return Packet::parser_error();
    };

    if first == BINARY_PREFIX {
        return match STANDARD.decode(chars.as_str()) {
            Ok(bytes) => Packet::message(bytes),
            Err(_) => Packet::parser_error(),
        };
    }

    let kind = first
        .to_digit(10)
        .and_then(|digit| u8::try_from(digit).ok())
        .and_then(PacketType::from_digit);

    match kind {
        // An empty message is still a message.
        Some(PacketType::Message) if chars.as_str().is_empty() => Packet::message(""),
        Some(kind) if chars.as_str().is_empty() => Packet::new(kind),
        Some(kind) => Packet::with_data(kind, chars.as_str()),
        None => Packet::parser_error(),
    }
}

/// Decodes a binary wire unit as a `message` packet.
#[inline]
#[must_use]
pub fn decode_binary_packet(data: &[u8]) -> Packet {
    Packet::message(data.to_vec())
}

/// Returns the digit of a packet type as a character.
fn type_digit(packet: &Packet) -> char {
    // `error` has no digit and degrades to `noop`.
    let digit = packet.kind.to_digit().unwrap_or(6);
    char::from(b'0' + digit)
}

// ============================================================================
// Payload Codec
// ============================================================================

/// Encodes a batch of packets into one text payload.
#[must_use]
pub fn encode_payload(packets: &[Packet]) -> String {
    let mut payload = String::new();

    for (index, packet) in packets.iter().enumerate() {
        if index > 0 {
            payload.push(SEPARATOR);
        }
        match encode_packet(packet) {
            Encoded::Text(text) => payload.push_str(&text),
            Encoded::Binary(bytes) => {
                payload.push(BINARY_PREFIX);
                payload.push_str(&STANDARD.encode(bytes));
            }
        }
    }

    payload
}

/// Decodes a payload, invoking `callback(packet, index, total)` per packet.
///
/// Returning [`ControlFlow::Break`] stops processing of the remaining
/// packets. Malformed units are delivered as [`Packet::parser_error`].
pub fn decode_payload<F>(data: &str, mut callback: F)
where
    F: FnMut(Packet, usize, usize) -> ControlFlow<()>,
{
    if data.is_empty() {
        return;
    }

    let units: Vec<&str> = data.split(SEPARATOR).collect();
    let total = units.len();

    for (index, unit) in units.into_iter().enumerate() {
        if callback(decode_packet(unit), index, total).is_break() {
            break;
        }
    }
}

/// Decodes a payload into a vector of packets.
#[must_use]
pub fn decode_payload_vec(data: &str) -> Vec<Packet> {
    let mut packets = Vec::new();
    decode_payload(data, |packet, _, _| {
        packets.push(packet);
        ControlFlow::Continue(())
    });
    packets
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn text_of(encoded: Encoded) -> String {
        match encoded {
            Encoded::Text(text) => text,
            Encoded::Binary(_) => panic!("expected text"),
        }
    }

    #[test]
    fn test_encode_packet_prefixes_digit() {
        assert_eq!(text_of(encode_packet(&Packet::new(PacketType::Open))), "0");
        assert_eq!(
            text_of(encode_packet(&Packet::with_data(PacketType::Ping, "probe"))),
            "2probe"
        );
        assert_eq!(text_of(encode_packet(&Packet::message("hello"))), "4hello");
    }

    #[test]
    fn test_encode_binary_packet_has_no_prefix() {
        let encoded = encode_packet(&Packet::message(vec![1u8, 2, 3]));
        assert_eq!(encoded, Encoded::Binary(vec![1, 2, 3]));
    }

    #[test]
    fn test_decode_packet_types() {
        assert_eq!(decode_packet("0"), Packet::new(PacketType::Open));
        assert_eq!(decode_packet("1"), Packet::new(PacketType::Close));
        assert_eq!(decode_packet("3probe"), Packet::with_data(PacketType::Pong, "probe"));
        assert_eq!(decode_packet("5"), Packet::new(PacketType::Upgrade));
        assert_eq!(decode_packet("6"), Packet::new(PacketType::Noop));
    }

    #[test]
    fn test_empty_message_keeps_its_data() {
        let packet = Packet::message("");
        let Encoded::Text(text) = encode_packet(&packet) else {
            panic!("expected text");
        };
        assert_eq!(text, "4");
        assert_eq!(decode_packet(&text), packet);

        let packets = vec![Packet::message(""), Packet::message("after")];
        assert_eq!(encode_payload(&packets), "4\x1e4after");
        assert_eq!(decode_payload_vec("4\x1e4after"), packets);
    }

    #[test]
    fn test_decode_packet_keeps_utf8() {
        assert_eq!(decode_packet("4€ ünïcödé"), Packet::message("€ ünïcödé"));
    }

    #[test]
    fn test_decode_bad_format() {
        assert!(decode_packet(":::").is_parser_error());
    }

    #[test]
    fn test_decode_inexistent_types() {
        assert!(decode_packet("94103").is_parser_error());
        assert!(decode_packet("7").is_parser_error());
    }

    #[test]
    fn test_decode_empty() {
        assert!(decode_packet("").is_parser_error());
    }

    #[test]
    fn test_decode_base64_binary() {
        assert_eq!(decode_packet("bAQID"), Packet::message(vec![1u8, 2, 3]));
        assert!(decode_packet("b!!!").is_parser_error());
    }

    #[test]
    fn test_decode_binary_packet() {
        assert_eq!(decode_binary_packet(&[9, 8]), Packet::message(vec![9u8, 8]));
    }

    #[test]
    fn test_encode_empty_payload() {
        assert_eq!(encode_payload(&[]), "");
        assert!(decode_payload_vec("").is_empty());
    }

    #[test]
    fn test_encode_mixed_payload() {
        let packets = vec![
            Packet::message("a"),
            Packet::message(vec![1u8, 2, 3]),
            Packet::new(PacketType::Ping),
        ];
        assert_eq!(encode_payload(&packets), "4a\x1ebAQID\x1e2");
    }

    #[test]
    fn test_decode_payload_reports_index_and_total() {
        let mut seen = Vec::new();
        decode_payload("4a\x1e4b\x1e4c", |packet, index, total| {
            seen.push((packet.text().map(ToString::to_string), index, total));
            ControlFlow::Continue(())
        });
        assert_eq!(
            seen,
            vec![
                (Some("a".to_string()), 0, 3),
                (Some("b".to_string()), 1, 3),
                (Some("c".to_string()), 2, 3),
            ]
        );
    }

    #[test]
    fn test_decode_payload_stops_on_break() {
        let mut seen = Vec::new();
        decode_payload("4a\x1e1\x1e4c", |packet, _, _| {
            let kind = packet.kind;
            seen.push(kind);
            if kind == PacketType::Close {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(seen, vec![PacketType::Message, PacketType::Close]);
    }

    #[test]
    fn test_decode_payload_malformed_unit() {
        let packets = decode_payload_vec("4a\x1e:::\x1e4c");
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0], Packet::message("a"));
        assert!(packets[1].is_parser_error());
        assert_eq!(packets[2], Packet::message("c"));
    }

    fn packet_strategy() -> impl Strategy<Value = Packet> {
        let kinds = prop_oneof![
            Just(PacketType::Open),
            Just(PacketType::Close),
            Just(PacketType::Ping),
            Just(PacketType::Pong),
            Just(PacketType::Message),
            Just(PacketType::Upgrade),
            Just(PacketType::Noop),
        ];
        // A message always carries data; other types drop empty text.
        prop_oneof![
            kinds
                .clone()
                .prop_filter("message carries data", |kind| *kind != PacketType::Message)
                .prop_map(Packet::new),
            (kinds, "[^\x1e]{0,32}").prop_map(|(kind, text)| {
                if text.is_empty() && kind != PacketType::Message {
                    Packet::new(kind)
                } else {
                    Packet::with_data(kind, text)
                }
            }),
            proptest::collection::vec(any::<u8>(), 0..64).prop_map(Packet::message),
        ]
    }

    proptest! {
        #[test]
        fn prop_packet_round_trip(packet in packet_strategy()) {
            let decoded = match encode_packet(&packet) {
                Encoded::Text(text) => decode_packet(&text),
                Encoded::Binary(bytes) => decode_binary_packet(&bytes),
            };
            prop_assert_eq!(decoded, packet);
        }

        #[test]
        fn prop_payload_round_trip(packets in proptest::collection::vec(packet_strategy(), 0..8)) {
            let decoded = decode_payload_vec(&encode_payload(&packets));
            prop_assert_eq!(decoded, packets);
        }
    }
}
