// ABOUTME: User Data Header parsing: walks (IEI, IEDL, IED) tuples and recognizes 8-bit concatenation info
// ABOUTME: Expressed as a plain byte-pair iterator rather than a parser-combinator, matching the rest of this codec's hand-rolled cursor style

use std::fmt;

/// Concatenated-SMS metadata recognized from UDH IEI `0x00` (8-bit reference)
/// or IEI `0x08` (16-bit reference). `reference` is widened to `u16` so both
/// variants share one field; outbound encoding only ever produces the 8-bit
/// form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConcatHeader {
    pub reference: u16,
    pub total_parts: u8,
    pub sequence: u8,
}

impl ConcatHeader {
    /// Encodes the 6-byte UDH for an 8-bit concatenation reference:
    /// `05 00 03 ref total seq`.
    pub fn encode_hex(&self) -> String {
        format!(
            "050003{:02X}{:02X}{:02X}",
            self.reference as u8, self.total_parts, self.sequence
        )
    }
}

/// Walks a UDH byte span (as upper-hex, UDHL byte included) and returns the
/// first recognized concatenation header plus the byte length of the whole
/// UDH (including its own length byte), so the caller can locate where the
/// text payload begins.
pub fn parse(udh_hex: &str) -> Result<(Option<ConcatHeader>, usize), UdhError> {
    let bytes = hex_to_bytes(udh_hex)?;
    if bytes.is_empty() {
        return Err(UdhError::Truncated);
    }

    let udhl = bytes[0] as usize;
    if bytes.len() < 1 + udhl {
        return Err(UdhError::Truncated);
    }

    let mut concat = None;
    let mut offset = 1usize;
    let end = 1 + udhl;
    while offset < end {
        if offset + 2 > bytes.len() {
            return Err(UdhError::Truncated);
        }
        let iei = bytes[offset];
        let iedl = bytes[offset + 1] as usize;
        offset += 2;
        if offset + iedl > bytes.len() {
            return Err(UdhError::Truncated);
        }

        if iei == 0x00 && iedl == 3 {
            concat = Some(ConcatHeader {
                reference: bytes[offset] as u16,
                total_parts: bytes[offset + 1],
                sequence: bytes[offset + 2],
            });
        } else if iei == 0x08 && iedl == 4 {
            let reference = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
            concat = Some(ConcatHeader {
                reference,
                total_parts: bytes[offset + 2],
                sequence: bytes[offset + 3],
            });
        }

        offset += iedl;
    }

    Ok((concat, end))
}

fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, UdhError> {
    if hex.len() % 2 != 0 {
        return Err(UdhError::Truncated);
    }
    let mut out = Vec::with_capacity(hex.len() / 2);
    let bytes = hex.as_bytes();
    for pair in bytes.chunks(2) {
        let s = std::str::from_utf8(pair).map_err(|_| UdhError::Truncated)?;
        let v = u8::from_str_radix(s, 16).map_err(|_| UdhError::Truncated)?;
        out.push(v);
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UdhError {
    Truncated,
}

impl fmt::Display for UdhError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UdhError::Truncated => write!(f, "UDH is truncated or internally inconsistent"),
        }
    }
}

impl std::error::Error for UdhError {}
