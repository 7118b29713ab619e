// ABOUTME: Strongly-typed Data Coding Scheme byte, covering just enough of 3GPP 23.038 to recognize UCS-2 and reject everything else

use std::fmt;

/// Data Coding Scheme (DCS) byte from a SUBMIT/DELIVER PDU.
///
/// This gateway's core only ever sends and expects `Ucs2`; the other
/// variants exist so a decoded DELIVER PDU can report what it actually saw
/// rather than silently misreading it as text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataCoding {
    SmscDefault,
    Ascii,
    Binary,
    Latin1,
    Ucs2,
    Other(u8),
}

impl DataCoding {
    pub fn from_byte(value: u8) -> Self {
        match value {
            0x00 => DataCoding::SmscDefault,
            0x01 => DataCoding::Ascii,
            0x02 | 0x04 => DataCoding::Binary,
            0x03 => DataCoding::Latin1,
            0x08 => DataCoding::Ucs2,
            other => DataCoding::Other(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            DataCoding::SmscDefault => 0x00,
            DataCoding::Ascii => 0x01,
            DataCoding::Binary => 0x02,
            DataCoding::Latin1 => 0x03,
            DataCoding::Ucs2 => 0x08,
            DataCoding::Other(value) => value,
        }
    }

    pub fn is_ucs2(self) -> bool {
        matches!(self, DataCoding::Ucs2)
    }
}

impl fmt::Display for DataCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataCoding::SmscDefault => write!(f, "SMSC default (GSM 7-bit)"),
            DataCoding::Ascii => write!(f, "ASCII"),
            DataCoding::Binary => write!(f, "binary"),
            DataCoding::Latin1 => write!(f, "Latin-1"),
            DataCoding::Ucs2 => write!(f, "UCS-2"),
            DataCoding::Other(value) => write!(f, "reserved/unknown (0x{value:02X})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ucs2_round_trips() {
        assert_eq!(DataCoding::from_byte(0x08), DataCoding::Ucs2);
        assert_eq!(DataCoding::Ucs2.to_byte(), 0x08);
        assert!(DataCoding::Ucs2.is_ucs2());
    }

    #[test]
    fn unknown_values_are_preserved() {
        assert_eq!(DataCoding::from_byte(0x15), DataCoding::Other(0x15));
        assert!(!DataCoding::Other(0x15).is_ucs2());
    }
}
