pub(crate) mod buf_pair;
mod reader;
mod writer;

use std::fs::File;
use std::fs::OpenOptions;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use std::sync::Mutex;

use fs2::FileExt;
use log::debug;
use log::info;

pub use reader::WalReader;
pub use writer::WalWriter;

use crate::buffer::buf_pair::BufferPair;
use crate::config::MAX_BUFFER_SIZE;
use crate::errors::DirectoryLocked;
use crate::errors::RecoveryError;
use crate::errors::SegmentIoError;
use crate::errors::WalError;
use crate::lsn::Lsn;
use crate::segment_file::OpenMode;
use crate::segment_file::SegmentFileHandler;
use crate::Config;

/// Buffer-swap state guarded by the single mutex.
///
/// `reader_max_offset` marks end-of-valid-bytes in the reader's buffer and
/// is meaningful only while the reader lags the writer by at least one file;
/// it must change atomically with a writer buffer swap.
#[derive(Debug)]
pub(crate) struct SwapState {
    pub(crate) writer_buf: usize,
    pub(crate) reader_buf: usize,
    pub(crate) reader_max_offset: u32,
}

/// State shared between the writer and reader handles.
///
/// The cursors are atomics so each side can run its lock-free fast path:
/// `writer_offset` is published with release ordering after the record bytes
/// land in the buffer and read with acquire ordering where the reader uses
/// it as a decode bound. Everything else a cursor update must keep
/// consistent with a buffer swap lives in [`SwapState`].
#[derive(Debug)]
pub(crate) struct BufferCore {
    pub(crate) config: Arc<Config>,
    pub(crate) bufs: BufferPair,
    pub(crate) swap: Mutex<SwapState>,

    pub(crate) writer_file_no: AtomicU32,
    pub(crate) writer_offset: AtomicU32,
    pub(crate) reader_file_no: AtomicU32,
    pub(crate) reader_offset: AtomicU32,

    /// Exclusive lock on the segment directory, released when the core
    /// drops and the file closes.
    _lock_file: File,
}

/// Every segment mutation goes through one process; a second buffer opened
/// on the same directory must fail fast instead of interleaving appends
/// into the segment sequence.
fn lock_dir(config: &Config) -> Result<File, WalError> {
    let f = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(config.lock_path())?;

    f.try_lock_exclusive()
        .map_err(|e| DirectoryLocked::new(&config.dir, e))?;

    debug!("wal directory locked: {}", config.lock_path());
    Ok(f)
}

/// Double-buffered window over the on-disk segment sequence.
///
/// Opened from a `(start_lsn, end_lsn)` pair persisted by the surrounding
/// system, then split into the single writer handle and the single reader
/// handle.
#[derive(Debug)]
pub struct WalBuffer {
    core: Arc<BufferCore>,
    writer_file: SegmentFileHandler,
    writer_buf: usize,
}

impl WalBuffer {
    /// Opens the log between `start_lsn` (reader position) and `end_lsn`
    /// (writer position), recovering on-disk segments in that range.
    ///
    /// With `start_lsn == end_lsn` there is nothing to recover and a fresh
    /// segment is started (on the next file number if the offset is
    /// nonzero). Otherwise every segment between the two positions must
    /// exist and be non-empty, and the buffer capacity grows to hold the
    /// largest of them if the configured size is not enough.
    pub fn open(
        config: Arc<Config>,
        start_lsn: Lsn,
        end_lsn: Lsn,
    ) -> Result<WalBuffer, WalError> {
        debug!("open wal buffer: start {} end {}", start_lsn, end_lsn);

        if start_lsn > end_lsn {
            return Err(RecoveryError::new(
                start_lsn.file_no(),
                format!("start {} is past end {}", start_lsn, end_lsn),
            )
            .into());
        }

        let lock_file = lock_dir(&config)?;

        let mut reader_file_no = start_lsn.file_no();
        let mut reader_offset = start_lsn.offset();
        let mut writer_file_no = end_lsn.file_no();
        let mut writer_offset = end_lsn.offset();

        let mut capacity = config.buffer_size();

        if start_lsn == end_lsn {
            // Nothing to recover; a nonzero offset means the last segment is
            // abandoned and a fresh one starts.
            if writer_offset != 0 {
                writer_file_no += 1;
                writer_offset = 0;
                reader_file_no += 1;
                reader_offset = 0;
            }
        } else {
            let need = Self::probe_segment_sizes(
                &config,
                reader_file_no,
                writer_file_no,
                writer_offset,
            )?;
            if need > capacity {
                capacity = need;
                info!(
                    "recovery needs larger buffers, capacity changed to {}",
                    capacity
                );
            }
        }

        let mut bufs = BufferPair::allocate(capacity);

        let mut writer_file = SegmentFileHandler::new(&config.dir);
        writer_file.set_name(Config::wal_file_name(writer_file_no));

        let mut reader_max_offset = 0u32;
        let writer_buf;
        let reader_buf = 0;

        if reader_file_no == writer_file_no {
            // Reader and writer share buffer 0.
            writer_buf = 0;

            if writer_offset == 0 {
                writer_file.set_mode(OpenMode::Write);
                writer_file.open().map_err(|e| {
                    SegmentIoError::new(writer_file_no, "open", e)
                })?;
            } else {
                writer_file.set_mode(OpenMode::Update);
                if !writer_file.exists() {
                    return Err(RecoveryError::new(
                        writer_file_no,
                        "segment file does not exist",
                    )
                    .into());
                }
                let dst = &mut bufs.whole_mut(0)
                    [reader_offset as usize..writer_offset as usize];
                writer_file.load(dst, reader_offset as u64).map_err(|e| {
                    SegmentIoError::new(writer_file_no, "load", e)
                })?;
            }
        } else {
            // The reader lags by at least one file: it gets its whole
            // segment in buffer 0, the writer continues its own in buffer 1.
            let mut reader_file = SegmentFileHandler::new(&config.dir);
            reader_file.set_name(Config::wal_file_name(reader_file_no));
            reader_file.set_mode(OpenMode::Read);
            if !reader_file.exists() {
                return Err(RecoveryError::new(
                    reader_file_no,
                    "segment file does not exist",
                )
                .into());
            }

            let size = reader_file
                .size()
                .map_err(|e| SegmentIoError::new(reader_file_no, "size", e))?
                as u32;
            if reader_offset > size {
                return Err(RecoveryError::new(
                    reader_file_no,
                    format!(
                        "start offset {} is past segment size {}",
                        reader_offset, size
                    ),
                )
                .into());
            }
            reader_max_offset = size;
            let dst = &mut bufs.whole_mut(0)
                [reader_offset as usize..size as usize];
            reader_file.load(dst, reader_offset as u64).map_err(|e| {
                SegmentIoError::new(reader_file_no, "load", e)
            })?;
            reader_file.close();

            writer_buf = 1;
            writer_file.set_mode(OpenMode::Update);
            if !writer_file.exists() {
                return Err(RecoveryError::new(
                    writer_file_no,
                    "segment file does not exist",
                )
                .into());
            }
            let dst = &mut bufs.whole_mut(1)[..writer_offset as usize];
            writer_file.load(dst, 0).map_err(|e| {
                SegmentIoError::new(writer_file_no, "load", e)
            })?;
        }

        let core = BufferCore {
            config,
            bufs,
            swap: Mutex::new(SwapState {
                writer_buf,
                reader_buf,
                reader_max_offset,
            }),
            writer_file_no: AtomicU32::new(writer_file_no),
            writer_offset: AtomicU32::new(writer_offset),
            reader_file_no: AtomicU32::new(reader_file_no),
            reader_offset: AtomicU32::new(reader_offset),
            _lock_file: lock_file,
        };

        Ok(WalBuffer {
            core: Arc::new(core),
            writer_file,
            writer_buf,
        })
    }

    /// Checks every segment between the reader's and the writer's file and
    /// returns the buffer capacity recovery requires.
    fn probe_segment_sizes(
        config: &Config,
        reader_file_no: u32,
        writer_file_no: u32,
        writer_offset: u32,
    ) -> Result<u32, WalError> {
        let mut probe = SegmentFileHandler::new(&config.dir);

        let mut need = writer_offset;
        for file_no in reader_file_no..writer_file_no {
            probe.set_name(Config::wal_file_name(file_no));

            if !probe.exists() {
                return Err(RecoveryError::new(
                    file_no,
                    "segment file does not exist",
                )
                .into());
            }
            let size = probe
                .size()
                .map_err(|e| SegmentIoError::new(file_no, "size", e))?;
            if size == 0 {
                return Err(
                    RecoveryError::new(file_no, "segment file is empty")
                        .into(),
                );
            }
            if size > MAX_BUFFER_SIZE as u64 {
                return Err(RecoveryError::new(
                    file_no,
                    format!("segment size {} exceeds the buffer limit", size),
                )
                .into());
            }
            need = need.max(size as u32);
        }

        Ok(need)
    }

    /// Effective capacity of each buffer; at least the configured size, and
    /// larger if recovery had to grow it.
    pub fn capacity(&self) -> u32 {
        self.core.bufs.capacity()
    }

    /// Splits into the single producer handle and the single consumer
    /// handle. Neither is cloneable: one thread appends, one thread reads.
    pub fn split(self) -> (WalWriter, WalReader) {
        let writer = WalWriter::new(
            self.core.clone(),
            self.writer_file,
            self.writer_buf,
        );
        let reader = WalReader::new(self.core);
        (writer, reader)
    }
}
