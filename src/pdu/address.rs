// ABOUTME: Swapped-semi-octet phone number encoding for SMS PDU addresses
// ABOUTME: Validates digit-only destinations and produces the nibble-swapped, F-padded wire form

use std::fmt;

/// Type-of-Address byte for international numbers (TON=international, NPI=ISDN).
pub const TOA_INTERNATIONAL: u8 = 0x91;

/// A validated, digit-only phone number ready for PDU address encoding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    digits: String,
}

impl Address {
    /// Normalizes a destination: strips a leading `+` and any whitespace,
    /// then requires the remainder to be ASCII digits only.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let digits: String = raw.trim().trim_start_matches('+').chars().filter(|c| !c.is_whitespace()).collect();

        if digits.is_empty() {
            return Err(AddressError::Empty);
        }
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(AddressError::InvalidDigits(raw.to_string()));
        }

        Ok(Address { digits })
    }

    /// Number of actual digits, before any `F` padding.
    pub fn digit_count(&self) -> usize {
        self.digits.len()
    }

    /// Encodes the swapped-semi-octet wire form (upper-hex), `F`-padded if
    /// the digit count is odd.
    pub fn to_swapped_semi_octets(&self) -> String {
        let mut digits = self.digits.clone();
        if digits.len() % 2 != 0 {
            digits.push('F');
        }

        let bytes = digits.as_bytes();
        let mut out = String::with_capacity(bytes.len());
        for pair in bytes.chunks(2) {
            out.push(pair[1] as char);
            out.push(pair[0] as char);
        }
        out
    }

    /// Decodes a swapped-semi-octet wire form back into a digit string,
    /// given the original (pre-padding) digit count from the address length
    /// field. Trailing `F` padding nibbles are dropped.
    pub fn from_swapped_semi_octets(swapped: &str, digit_count: usize) -> Result<Self, AddressError> {
        let bytes = swapped.as_bytes();
        if bytes.len() % 2 != 0 {
            return Err(AddressError::OddSwappedLength(swapped.to_string()));
        }

        let mut digits = String::with_capacity(bytes.len());
        for pair in bytes.chunks(2) {
            digits.push(pair[1] as char);
            digits.push(pair[0] as char);
        }
        digits.truncate(digit_count);

        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(AddressError::InvalidDigits(swapped.to_string()));
        }

        Ok(Address { digits })
    }

    pub fn as_str(&self) -> &str {
        &self.digits
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.digits)
    }
}

/// Errors that can occur when parsing or decoding a PDU address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    Empty,
    InvalidDigits(String),
    OddSwappedLength(String),
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::Empty => write!(f, "destination address is empty"),
            AddressError::InvalidDigits(raw) => {
                write!(f, "address contains non-digit characters: {raw}")
            }
            AddressError::OddSwappedLength(raw) => {
                write!(f, "swapped semi-octet address has odd length: {raw}")
            }
        }
    }
}

impl std::error::Error for AddressError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_length_round_trips() {
        let addr = Address::parse("+84977426274").unwrap();
        assert_eq!(addr.digit_count(), 11);
        let swapped = addr.to_swapped_semi_octets();
        let decoded = Address::from_swapped_semi_octets(&swapped, addr.digit_count()).unwrap();
        assert_eq!(addr, decoded);
    }

    #[test]
    fn odd_length_gets_f_padded() {
        let addr = Address::parse("123456789").unwrap();
        assert_eq!(addr.digit_count(), 9);
        let swapped = addr.to_swapped_semi_octets();
        // last byte pairs the 9th digit with an 'F' pad nibble, swapped to "F9"
        assert_eq!(swapped, "21436587F9");
        assert_eq!(swapped.len(), 10);
    }

    #[test]
    fn known_vector() {
        // destination "84977426274" -> pad to "849774262749"? no: 11 digits is odd -> pad with F
        let addr = Address::parse("84977426274").unwrap();
        let swapped = addr.to_swapped_semi_octets();
        assert_eq!(swapped, "4879476272F4");
    }

    #[test]
    fn rejects_non_digit_characters() {
        assert!(matches!(
            Address::parse("12a456"),
            Err(AddressError::InvalidDigits(_))
        ));
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(Address::parse("+"), Err(AddressError::Empty)));
    }
}
