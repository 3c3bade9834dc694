pub mod compression;
pub mod csv;
pub mod format;
pub mod jsonl;

pub use format::{decode, encode, encode_to, Format, FormatOptions, RowDecoder, RowEncoder};
