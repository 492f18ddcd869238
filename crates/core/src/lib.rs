pub mod decode;
pub mod entity;
pub mod label;
pub mod report;

pub use decode::{DecodeError, TokenDecoder, DEFAULT_SPECIAL_TOKENS, WORD_BOUNDARY};
pub use entity::EntityMap;
pub use label::{Label, LabelMap, LabelMapError};
pub use report::{format_report, ReceiptReport, MAX_ECHOED_TOKENS, NO_ENTITIES};
