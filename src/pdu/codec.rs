// ABOUTME: SUBMIT encoding and DELIVER decoding for UCS-2 SMS PDUs, including concatenated-SMS segmentation
// ABOUTME: Generalizes the teacher's Encodable/Decodable split and thiserror-based CodecError from binary SMPP framing to hex-string AT-channel framing

use crate::pdu::address::{Address, AddressError};
use crate::pdu::scts::{ScteError, ServiceCenterTimestamp};
use crate::pdu::udh::{self, ConcatHeader};
use rand::Rng;
use thiserror::Error;

/// Maximum UCS-2 characters in a single (non-concatenated) PDU.
pub const MAX_SINGLE_CHARS: usize = 70;
/// Maximum UCS-2 characters per segment of a concatenated SMS.
pub const MAX_CONCAT_CHARS: usize = 67;

/// First-octet value for a SUBMIT PDU with no UDH.
const SUBMIT_NO_UDH: u8 = 0x11;
/// First-octet value for a SUBMIT PDU with UDHI set.
const SUBMIT_WITH_UDH: u8 = 0x51;

/// One segment of an outbound submission: the full PDU hex string (SMSC
/// octet included) and the `AT+CMGS=<n>` length parameter (TPDU byte count,
/// i.e. the PDU minus the leading SMSC-length octet).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduSegment {
    pub pdu_hex: String,
    pub tpdu_length: usize,
}

/// The full encoding plan for one queue entry: one or more segments sharing
/// a concatenation reference if there is more than one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundSubmission {
    pub destination: Address,
    pub reference: Option<u8>,
    pub segments: Vec<PduSegment>,
}

/// A decoded DELIVER PDU.
#[derive(Clone, Debug, PartialEq)]
pub struct Deliver {
    pub sender: Address,
    pub timestamp: ServiceCenterTimestamp,
    pub text: String,
    pub concat: Option<ConcatHeader>,
}

/// Encodes `text` addressed to `destination` as one or more SUBMIT PDUs.
pub fn encode_submit(destination: &str, text: &str) -> Result<OutboundSubmission, CodecError> {
    let address = Address::parse(destination)?;
    let chars: Vec<char> = text.chars().collect();

    if chars.len() <= MAX_SINGLE_CHARS {
        let segment = encode_segment(&address, text, None)?;
        return Ok(OutboundSubmission {
            destination: address,
            reference: None,
            segments: vec![segment],
        });
    }

    let total_parts = chars.len().div_ceil(MAX_CONCAT_CHARS);
    if total_parts > u8::MAX as usize {
        return Err(CodecError::MessageTooLong(chars.len()));
    }
    let reference: u8 = rand::thread_rng().gen();

    let mut segments = Vec::with_capacity(total_parts);
    for (index, chunk) in chars.chunks(MAX_CONCAT_CHARS).enumerate() {
        let sequence = (index + 1) as u8;
        let part_text: String = chunk.iter().collect();
        let header = ConcatHeader {
            reference: reference as u16,
            total_parts: total_parts as u8,
            sequence,
        };
        segments.push(encode_segment(&address, &part_text, Some(header))?);
    }

    Ok(OutboundSubmission {
        destination: address,
        reference: Some(reference),
        segments,
    })
}

fn encode_segment(
    address: &Address,
    text: &str,
    udh: Option<ConcatHeader>,
) -> Result<PduSegment, CodecError> {
    let ucs2_hex = ucs2_encode(text);

    let mut user_data = String::new();
    if let Some(header) = &udh {
        user_data.push_str(&header.encode_hex());
    }
    user_data.push_str(&ucs2_hex);
    let user_data_len_octets = user_data.len() / 2;
    if user_data_len_octets > 0xFF {
        return Err(CodecError::MessageTooLong(text.chars().count()));
    }

    let first_octet = if udh.is_some() {
        SUBMIT_WITH_UDH
    } else {
        SUBMIT_NO_UDH
    };

    let addr_len = address.digit_count();
    if addr_len > 0xFF {
        return Err(CodecError::MessageTooLong(addr_len));
    }

    let mut pdu = String::new();
    pdu.push_str("00"); // SMSC length: use network default
    pdu.push_str(&format!("{first_octet:02X}"));
    pdu.push_str("00"); // message reference
    pdu.push_str(&format!("{addr_len:02X}"));
    pdu.push_str("91"); // TOA: international
    pdu.push_str(&address.to_swapped_semi_octets());
    pdu.push_str("00"); // protocol identifier
    pdu.push_str(&format!(
        "{:02X}",
        crate::pdu::data_coding::DataCoding::Ucs2.to_byte()
    )); // DCS: UCS-2
    pdu.push_str("AA"); // validity period
    pdu.push_str(&format!("{user_data_len_octets:02X}"));
    pdu.push_str(&user_data);

    let tpdu_length = pdu.len() / 2 - 1;

    Ok(PduSegment {
        pdu_hex: pdu,
        tpdu_length,
    })
}

/// Decodes a DELIVER PDU from its upper-hex wire representation.
pub fn decode_deliver(hex: &str) -> Result<Deliver, CodecError> {
    let bytes = hex_pairs(hex)?;
    let mut cursor = 0usize;

    let smsc_len = next_byte(&bytes, &mut cursor)?;
    cursor += smsc_len as usize * 2; // skip SMSC address octets (already consumed length byte)

    let first_octet = next_byte(&bytes, &mut cursor)?;
    let udhi = first_octet & 0x40 != 0;

    let sender_digit_count = next_byte(&bytes, &mut cursor)? as usize;
    let sender_octets = sender_digit_count.div_ceil(2);
    let _sender_toa = next_byte(&bytes, &mut cursor)?;
    let sender_swapped = take_hex(&bytes, &mut cursor, sender_octets)?;
    let sender = Address::from_swapped_semi_octets(&sender_swapped, sender_digit_count)?;

    let _pid = next_byte(&bytes, &mut cursor)?;
    let dcs = next_byte(&bytes, &mut cursor)?;
    if !crate::pdu::data_coding::DataCoding::from_byte(dcs).is_ucs2() {
        return Err(CodecError::UnsupportedEncoding(dcs));
    }

    let scts_hex = take_hex(&bytes, &mut cursor, 7)?;
    let timestamp = ServiceCenterTimestamp::decode(&scts_hex)?;

    let udl = next_byte(&bytes, &mut cursor)? as usize;
    let ud_start = cursor;

    let (concat, udh_len) = if udhi {
        let remaining = take_hex(&bytes, &mut cursor, bytes.len() / 2 - cursor / 2)?;
        let (concat, udh_len) = udh::parse(&remaining)?;
        // rewind: we only wanted to measure the UDH, not consume the text
        cursor = ud_start + udh_len * 2;
        (concat, udh_len)
    } else {
        (None, 0)
    };

    let text_octets = udl.checked_sub(udh_len).ok_or(CodecError::MalformedPdu(
        "UDL shorter than UDH".to_string(),
    ))?;
    let text_hex = take_hex(&bytes, &mut cursor, text_octets)?;
    let text = ucs2_decode(&text_hex)?;

    Ok(Deliver {
        sender,
        timestamp,
        text,
        concat,
    })
}

fn ucs2_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 4);
    for unit in text.encode_utf16() {
        out.push_str(&format!("{unit:04X}"));
    }
    out
}

fn ucs2_decode(hex: &str) -> Result<String, CodecError> {
    if hex.len() % 4 != 0 {
        return Err(CodecError::MalformedPdu(
            "UCS-2 payload has odd number of code units".to_string(),
        ));
    }
    let mut units = Vec::with_capacity(hex.len() / 4);
    let bytes = hex.as_bytes();
    for quad in bytes.chunks(4) {
        let s = std::str::from_utf8(quad).map_err(|_| CodecError::MalformedPdu("non-hex UCS-2 payload".to_string()))?;
        let unit = u16::from_str_radix(s, 16)
            .map_err(|_| CodecError::MalformedPdu("non-hex UCS-2 payload".to_string()))?;
        units.push(unit);
    }
    String::from_utf16(&units).map_err(|_| CodecError::MalformedPdu("invalid UTF-16 in UCS-2 payload".to_string()))
}

fn hex_pairs(hex: &str) -> Result<Vec<u8>, CodecError> {
    if hex.len() % 2 != 0 {
        return Err(CodecError::MalformedPdu("odd-length hex string".to_string()));
    }
    let mut out = Vec::with_capacity(hex.len() / 2);
    let bytes = hex.as_bytes();
    for pair in bytes.chunks(2) {
        let s = std::str::from_utf8(pair).map_err(|_| CodecError::MalformedPdu("non-ASCII hex string".to_string()))?;
        let v = u8::from_str_radix(s, 16).map_err(|_| CodecError::MalformedPdu(format!("invalid hex byte: {s}")))?;
        out.push(v);
    }
    Ok(out)
}

fn next_byte(bytes: &[u8], cursor: &mut usize) -> Result<u8, CodecError> {
    let idx = *cursor / 2;
    if idx >= bytes.len() {
        return Err(CodecError::MalformedPdu("PDU truncated".to_string()));
    }
    *cursor += 2;
    Ok(bytes[idx])
}

fn take_hex(bytes: &[u8], cursor: &mut usize, octets: usize) -> Result<String, CodecError> {
    let start = *cursor / 2;
    let end = start + octets;
    if end > bytes.len() {
        return Err(CodecError::MalformedPdu("PDU truncated".to_string()));
    }
    *cursor += octets * 2;
    Ok(bytes[start..end].iter().map(|b| format!("{b:02X}")).collect())
}

/// Codec errors with enough context to log and drop the offending fragment.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed PDU: {0}")]
    MalformedPdu(String),

    #[error("unsupported data coding scheme: 0x{0:02X}")]
    UnsupportedEncoding(u8),

    #[error("message too long to encode: {0} units")]
    MessageTooLong(usize),

    #[error("address error: {0}")]
    Address(#[from] AddressError),

    #[error("timestamp error: {0}")]
    Timestamp(#[from] ScteError),

    #[error("UDH error: {0}")]
    Udh(#[from] crate::pdu::udh::UdhError),
}
