//! Offline inspection of segment files, independent of the log buffer.
//!
//! Reads whole segments from disk and decodes them record by record; used
//! by the `dump` binary and by recovery tests to check what actually landed
//! on disk.

use std::fs;
use std::io;
use std::io::Write;

use crate::errors::WalError;
use crate::record::decode_record;
use crate::record::RecordEntry;
use crate::Config;

/// A fully decoded segment: the file's bytes plus the offset of each record.
///
/// Offsets hold N + 1 entries; the last one is the file length.
#[derive(Debug)]
pub struct SegmentDump {
    file_no: u32,
    bytes: Vec<u8>,
    offsets: Vec<u32>,
}

impl SegmentDump {
    /// Reads and decodes segment `file_no` under `config.dir`.
    pub fn read(config: &Config, file_no: u32) -> Result<Self, WalError> {
        let bytes = fs::read(config.wal_path(file_no))?;

        let mut offsets = vec![0u32];
        let mut at = 0u32;
        while (at as usize) < bytes.len() {
            let entry = decode_record(&bytes, file_no, at)?;
            at = entry.lsn.offset();
            offsets.push(at);
        }

        Ok(Self {
            file_no,
            bytes,
            offsets,
        })
    }

    pub fn file_no(&self) -> u32 {
        self.file_no
    }

    pub fn records_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Decodes record `i` again, borrowing from the segment bytes.
    pub fn record(&self, i: usize) -> Result<RecordEntry<'_>, WalError> {
        let entry = decode_record(&self.bytes, self.file_no, self.offsets[i])?;
        Ok(entry)
    }

    /// Renders every record as one line of text.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), WalError> {
        writeln!(w, "{}", Config::wal_file_name(self.file_no))?;
        for i in 0..self.records_count() {
            let rec = self.record(i)?;
            writeln!(
                w,
                "  R-{:05}: [{:09}, {:09}) {:?} table_id={:?} \
                 partition_tag={:?} ids={} data={}B",
                i,
                self.offsets[i],
                self.offsets[i + 1],
                rec.record_type,
                String::from_utf8_lossy(rec.table_id),
                String::from_utf8_lossy(rec.partition_tag),
                rec.ids.len(),
                rec.data.len(),
            )?;
        }
        Ok(())
    }
}

/// Lists the segment file numbers present under `config.dir`, ascending.
///
/// Non-segment files (the directory lock, strays) are skipped.
pub fn segment_file_nos(config: &Config) -> Result<Vec<u32>, io::Error> {
    let mut file_nos = Vec::new();

    for dir_entry in fs::read_dir(&config.dir)? {
        let dir_entry = dir_entry?;
        let file_name = dir_entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if let Ok(file_no) = Config::parse_wal_file_name(name) {
            file_nos.push(file_no);
        }
    }

    file_nos.sort_unstable();
    Ok(file_nos)
}

/// Renders every segment in the directory, in file-number order.
pub fn write_dir_to<W: Write>(
    config: &Config,
    w: &mut W,
) -> Result<(), WalError> {
    for file_no in segment_file_nos(config)? {
        SegmentDump::read(config, file_no)?.write_to(w)?;
    }
    Ok(())
}

/// Convenience wrapper collecting the directory dump into a string.
pub fn dir_to_string(config: &Config) -> Result<String, WalError> {
    let mut out = Vec::new();
    write_dir_to(config, &mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}
