use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::buffer::BufferCore;
use crate::errors::SegmentIoError;
use crate::errors::WalError;
use crate::lsn::Lsn;
use crate::record::decode_record;
use crate::record::RecordEntry;
use crate::segment_file::OpenMode;
use crate::segment_file::SegmentFileHandler;
use crate::Config;

/// The consumer half: advances sequentially through the log.
///
/// Exactly one reader exists per log. `next` borrows the reader mutably for
/// the lifetime of the returned entry, so a decoded record cannot outlive
/// its bytes in the buffer.
#[derive(Debug)]
pub struct WalReader {
    core: Arc<BufferCore>,
}

impl WalReader {
    pub(crate) fn new(core: Arc<BufferCore>) -> Self {
        Self { core }
    }

    /// The reader's current position: everything below it has been handed
    /// out. Non-decreasing across `next` calls.
    pub fn read_lsn(&self) -> Lsn {
        Lsn::new(
            self.core.reader_file_no.load(Ordering::Relaxed),
            self.core.reader_offset.load(Ordering::Relaxed),
        )
    }

    /// Effective capacity of each buffer.
    pub fn capacity(&self) -> u32 {
        self.core.bufs.capacity()
    }

    /// Returns the record following the current read position, or `None`
    /// when the position has reached `last_applied_lsn` (not an error).
    ///
    /// `last_applied_lsn` is the producer's publication point: the caller
    /// must have obtained it from the writer through a synchronized channel.
    /// The entry's payload sections alias the reader buffer and are valid
    /// until the next call.
    pub fn next(
        &mut self,
        last_applied_lsn: Lsn,
    ) -> Result<Option<RecordEntry<'_>>, WalError> {
        if self.read_lsn() >= last_applied_lsn {
            return Ok(None);
        }

        // A next record exists, in the buffer or in an on-disk segment.
        let mut file_no = self.core.reader_file_no.load(Ordering::Relaxed);
        let mut offset = self.core.reader_offset.load(Ordering::Relaxed);

        let (buf_idx, mut bound, load_file) = {
            let mut swap = self.core.swap.lock().unwrap();
            let writer_file_no =
                self.core.writer_file_no.load(Ordering::Relaxed);
            let mut load_file = None;

            if file_no != writer_file_no
                && offset == swap.reader_max_offset
            {
                // Current segment exhausted; move to the next one.
                if file_no + 1 == writer_file_no {
                    // Caught up: share the writer's buffer, no load needed.
                    file_no += 1;
                    offset = 0;
                    self.core
                        .reader_file_no
                        .store(file_no, Ordering::Relaxed);
                    self.core.reader_offset.store(offset, Ordering::Relaxed);
                    swap.reader_buf = swap.writer_buf;
                } else {
                    // The cursor only advances once the segment is in
                    // memory, so a failed load can simply be retried.
                    load_file = Some(file_no + 1);
                }
            }

            let bound = if file_no == writer_file_no {
                self.core.writer_offset.load(Ordering::Acquire)
            } else {
                swap.reader_max_offset
            };

            (swap.reader_buf, bound, load_file)
        };

        if let Some(next_file) = load_file {
            let size = self.load_segment(buf_idx, next_file)?;

            file_no = next_file;
            offset = 0;
            self.core.reader_file_no.store(file_no, Ordering::Relaxed);
            self.core.reader_offset.store(offset, Ordering::Relaxed);
            self.core.swap.lock().unwrap().reader_max_offset = size;
            bound = size;
        }

        // SAFETY: `[0, bound)` of the reader's buffer is stable: the writer
        // appends at offsets >= `bound` in the shared state and writes only
        // the other buffer in the distinct state.
        let valid = unsafe { self.core.bufs.range(buf_idx, 0, bound) };

        let entry = decode_record(valid, file_no, offset)?;

        // The header's stored LSN already names the post-record offset.
        self.core
            .reader_offset
            .store(entry.lsn.offset(), Ordering::Relaxed);

        Ok(Some(entry))
    }

    /// Loads all of segment `file_no` into the reader's buffer and returns
    /// its size; the caller updates the cursor afterwards.
    fn load_segment(
        &mut self,
        buf_idx: usize,
        file_no: u32,
    ) -> Result<u32, WalError> {
        let mut file = SegmentFileHandler::new(&self.core.config.dir);
        file.set_name(Config::wal_file_name(file_no));
        file.set_mode(OpenMode::Read);
        file.open()
            .map_err(|e| SegmentIoError::new(file_no, "open", e))?;

        let size = file
            .size()
            .map_err(|e| SegmentIoError::new(file_no, "size", e))?;
        if size > self.core.bufs.capacity() as u64 {
            return Err(SegmentIoError::new(
                file_no,
                "load",
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "segment size {} exceeds buffer capacity {}",
                        size,
                        self.core.bufs.capacity()
                    ),
                ),
            )
            .into());
        }
        let size = size as u32;

        // SAFETY: the reader owns this buffer while it lags the writer.
        let dst = unsafe { self.core.bufs.range_mut(buf_idx, 0, size) };
        file.load(dst, 0)
            .map_err(|e| SegmentIoError::new(file_no, "load", e))?;
        file.close();

        Ok(size)
    }
}
