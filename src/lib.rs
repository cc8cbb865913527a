//! Double-buffered, file-segmented write-ahead log buffer.
//!
//! Mutation records are sequenced by a 64-bit log sequence number whose high
//! half is a segment file number and whose low half is a byte offset within
//! that file, so any LSN is a self-describing position in the log. Two
//! equal-sized in-memory buffers act as a producer/consumer window over the
//! on-disk segment sequence: one writer appends, one reader drains, and the
//! two share a buffer until the writer rolls over to a new segment.

mod buffer;
mod config;
mod lsn;
mod record;
mod segment_file;

pub(crate) mod testing;

pub mod dump;
pub mod errors;

pub use buffer::WalBuffer;
pub use buffer::WalReader;
pub use buffer::WalWriter;
pub use config::Config;
pub use config::MAX_BUFFER_SIZE;
pub use config::MIN_BUFFER_SIZE;
pub use errors::WalError;
pub use lsn::Lsn;
pub use lsn::LSN_OFFSET_MASK;
pub use record::IdList;
pub use record::Record;
pub use record::RecordEntry;
pub use record::RecordType;
pub use record::RECORD_HEADER_SIZE;
pub use segment_file::OpenMode;
pub use segment_file::SegmentFileHandler;

#[cfg(test)]
mod tests;
