#![forbid(unsafe_code)]

//! Wire format shared by `pulse-probe` and `pulse-mux`: a 16-octet
//! header followed by a sequence of type-tagged records.

pub mod arg;
pub mod crc;
pub mod error;
pub mod exitcode;
pub mod header;
pub mod record;

pub use arg::Arg;
pub use error::{Result, WireError};
pub use header::{Header, HEADER_LEN, MAX_SUPPORTED_VERSION};
pub use record::{pack_record, unpack_record, Record, RecordPayload, RecordType};
