use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::debug;

use crate::buffer::BufferCore;
use crate::buffer::WalReader;
use crate::errors::RecordTooLarge;
use crate::errors::SegmentIoError;
use crate::errors::WalError;
use crate::lsn::Lsn;
use crate::record::encode_record;
use crate::record::Record;
use crate::segment_file::OpenMode;
use crate::segment_file::SegmentFileHandler;
use crate::Config;

/// The producer half: appends records, owns the open segment file.
///
/// Exactly one writer exists per log; it is not cloneable and its methods
/// take `&mut self`, so the single-producer discipline is enforced by the
/// type system.
#[derive(Debug)]
pub struct WalWriter {
    core: Arc<BufferCore>,
    file: SegmentFileHandler,
    /// Which buffer the writer currently fills. Mirrors
    /// `SwapState::writer_buf`; only this handle updates either.
    buf_idx: usize,
}

impl WalWriter {
    pub(crate) fn new(
        core: Arc<BufferCore>,
        file: SegmentFileHandler,
        buf_idx: usize,
    ) -> Self {
        Self {
            core,
            file,
            buf_idx,
        }
    }

    /// Remaining space in the writer's buffer before the next rollover.
    pub fn surplus_space(&self) -> u32 {
        self.core.bufs.capacity()
            - self.core.writer_offset.load(Ordering::Relaxed)
    }

    /// Effective capacity of each buffer.
    pub fn capacity(&self) -> u32 {
        self.core.bufs.capacity()
    }

    /// Appends a record and returns its assigned LSN.
    ///
    /// The LSN names the position just past the record's last byte; it is
    /// assigned before the disk write so it can be embedded in the record
    /// header. On a failed write the cursor is not advanced, so retrying
    /// the same append overwrites the stale bytes.
    pub fn append(&mut self, record: &Record<'_>) -> Result<Lsn, WalError> {
        record.check_field_limits()?;

        let capacity = self.core.bufs.capacity();
        let record_size64 = record.encoded_size();
        if record_size64 > capacity as u64 {
            return Err(RecordTooLarge::new(record_size64, capacity).into());
        }
        let record_size = record_size64 as u32;

        let mut file_no = self.core.writer_file_no.load(Ordering::Relaxed);
        let mut offset = self.core.writer_offset.load(Ordering::Relaxed);

        if record_size > capacity - offset {
            // No room for this record: roll over to a new segment. If the
            // reader still shares the buffer, pin it to the bytes it has
            // and migrate to the other buffer.
            {
                let mut swap = self.core.swap.lock().unwrap();
                if swap.writer_buf == swap.reader_buf {
                    swap.reader_max_offset = offset;
                    swap.writer_buf ^= 1;
                }
                self.buf_idx = swap.writer_buf;

                file_no += 1;
                offset = 0;
                self.core.writer_file_no.store(file_no, Ordering::Relaxed);
                self.core.writer_offset.store(offset, Ordering::Release);
            }

            self.file
                .reborn(Config::wal_file_name(file_no), OpenMode::Write)
                .map_err(|e| SegmentIoError::new(file_no, "reborn", e))?;
        }

        let lsn = Lsn::new(file_no, offset + record_size);

        // SAFETY: `[offset, offset + record_size)` lies at or past
        // `writer_offset`; the reader never touches that range (it reads
        // below `writer_offset` in the shared state and only the other
        // buffer in the distinct state).
        let dst = unsafe {
            self.core.bufs.range_mut(self.buf_idx, offset, record_size)
        };
        encode_record(record, lsn, dst)?;

        self.file
            .write(dst)
            .map_err(|e| SegmentIoError::new(file_no, "write", e))?;

        // Publish the bytes before the new offset becomes visible to the
        // reader.
        self.core
            .writer_offset
            .store(offset + record_size, Ordering::Release);

        Ok(lsn)
    }

    /// Moves the write position to `lsn`, as decided by an external
    /// authority such as a checkpoint.
    ///
    /// Within the current file this is a pure rewind; later appends
    /// overwrite the trailing bytes. Moving to another file reopens that
    /// segment and replays its `[0, offset)` prefix into the writer buffer
    /// so subsequent appends extend past it.
    ///
    /// The caller must ensure the reader has not consumed past `lsn`.
    pub fn set_write_lsn(&mut self, lsn: Lsn) -> Result<(), WalError> {
        debug!("set write lsn {}", lsn);

        let file_no = lsn.file_no();
        let offset = lsn.offset();

        if offset > self.core.bufs.capacity() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "write position {} is past buffer capacity {}",
                    lsn,
                    self.core.bufs.capacity()
                ),
            )
            .into());
        }

        let old_file_no = self.core.writer_file_no.load(Ordering::Relaxed);
        let old_offset = self.core.writer_offset.load(Ordering::Relaxed);

        if file_no == old_file_no {
            self.core.writer_offset.store(offset, Ordering::Release);
            // Reposition the file so the next append lands at `offset`.
            self.file
                .load(&mut [], offset as u64)
                .map_err(|e| SegmentIoError::new(file_no, "seek", e))?;
            return Ok(());
        }

        let need_load = {
            let mut swap = self.core.swap.lock().unwrap();

            let shares_reader_file =
                file_no == self.core.reader_file_no.load(Ordering::Relaxed);
            if shares_reader_file {
                // The reader's buffer already holds this file's bytes.
                swap.writer_buf = swap.reader_buf;
            } else if swap.writer_buf == swap.reader_buf {
                // Leaving a shared buffer: pin the reader to what it has.
                swap.reader_max_offset = old_offset;
                swap.writer_buf ^= 1;
            }
            self.buf_idx = swap.writer_buf;

            self.core.writer_file_no.store(file_no, Ordering::Relaxed);
            self.core.writer_offset.store(offset, Ordering::Release);

            !shares_reader_file
        };

        self.file
            .reborn(Config::wal_file_name(file_no), OpenMode::Update)
            .map_err(|e| SegmentIoError::new(file_no, "reborn", e))?;

        if need_load {
            // SAFETY: the reader occupies the other buffer here.
            let dst = unsafe {
                self.core.bufs.range_mut(self.buf_idx, 0, offset)
            };
            self.file
                .load(dst, 0)
                .map_err(|e| SegmentIoError::new(file_no, "load", e))?;
        } else {
            // Shared buffer already holds the prefix; only position the
            // file for the next append.
            self.file
                .load(&mut [], offset as u64)
                .map_err(|e| SegmentIoError::new(file_no, "seek", e))?;
        }

        Ok(())
    }

    /// Discards all buffered state and starts a fresh segment at `lsn`
    /// (on the next file number if the offset is nonzero). The reader is
    /// moved to the same position.
    ///
    /// Requiring `&mut` on both handles proves neither side is mid-call.
    /// Used after the surrounding system truncates or discards the log.
    pub fn reset(
        &mut self,
        _reader: &mut WalReader,
        lsn: Lsn,
    ) -> Result<(), WalError> {
        debug!("reset wal buffer to {}", lsn);

        let mut file_no = lsn.file_no();
        if lsn.offset() != 0 {
            file_no += 1;
        }

        {
            let mut swap = self.core.swap.lock().unwrap();
            swap.writer_buf = 0;
            swap.reader_buf = 0;
            swap.reader_max_offset = 0;
        }
        self.buf_idx = 0;

        self.core.writer_file_no.store(file_no, Ordering::Relaxed);
        self.core.writer_offset.store(0, Ordering::Release);
        self.core.reader_file_no.store(file_no, Ordering::Relaxed);
        self.core.reader_offset.store(0, Ordering::Relaxed);

        self.file
            .reborn(Config::wal_file_name(file_no), OpenMode::Write)
            .map_err(|e| SegmentIoError::new(file_no, "reborn", e))?;

        Ok(())
    }
}
