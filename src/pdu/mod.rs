// ABOUTME: PDU codec module tree: address encoding, data coding, UDH, timestamps, and the SUBMIT/DELIVER codec itself

pub mod address;
pub mod codec;
pub mod data_coding;
pub mod scts;
pub mod udh;

pub use address::AddressError;
pub use codec::{decode_deliver, encode_submit, CodecError, Deliver, OutboundSubmission};
pub use data_coding::DataCoding;
pub use scts::ServiceCenterTimestamp;
pub use udh::ConcatHeader;
