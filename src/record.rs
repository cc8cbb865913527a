use std::io;

use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::errors::FieldTooLong;
use crate::errors::MalformedRecord;
use crate::lsn::Lsn;

/// Fixed size of an encoded record header.
pub const RECORD_HEADER_SIZE: u32 = 25;

/// Mutation kind carried by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    None = 0,
    Insert = 1,
    Delete = 2,
    Flush = 3,
}

impl RecordType {
    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(RecordType::None),
            1 => Some(RecordType::Insert),
            2 => Some(RecordType::Delete),
            3 => Some(RecordType::Flush),
            _ => None,
        }
    }
}

/// A mutation record to be appended.
///
/// The payload sections are borrowed from the caller; the buffer copies them
/// during `append` and assigns the LSN itself.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    pub record_type: RecordType,
    pub table_id: &'a [u8],
    pub partition_tag: &'a [u8],
    pub ids: &'a [u64],
    pub data: &'a [u8],
}

impl Record<'_> {
    /// On-disk size of this record: header plus the four payload sections.
    pub fn encoded_size(&self) -> u64 {
        RECORD_HEADER_SIZE as u64
            + self.table_id.len() as u64
            + self.partition_tag.len() as u64
            + self.ids.len() as u64 * 8
            + self.data.len() as u64
    }

    /// Checks each variable-length section against its header counter width.
    pub(crate) fn check_field_limits(&self) -> Result<(), FieldTooLong> {
        if self.table_id.len() > u16::MAX as usize {
            return Err(FieldTooLong::new(
                "table_id",
                self.table_id.len(),
                u16::MAX as usize,
            ));
        }
        if self.partition_tag.len() > u16::MAX as usize {
            return Err(FieldTooLong::new(
                "partition_tag",
                self.partition_tag.len(),
                u16::MAX as usize,
            ));
        }
        if self.ids.len() > u32::MAX as usize {
            return Err(FieldTooLong::new(
                "ids",
                self.ids.len(),
                u32::MAX as usize,
            ));
        }
        Ok(())
    }
}

/// The fixed 25-byte header preceding every record's payload.
///
/// `lsn` holds the position just past the end of the record within its
/// segment file, so parsing a header is enough to advance to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecordHeader {
    pub(crate) lsn: Lsn,
    pub(crate) record_type: u8,
    pub(crate) table_id_size: u16,
    pub(crate) partition_tag_size: u16,
    pub(crate) vector_num: u32,
    pub(crate) data_size: u64,
}

impl RecordHeader {
    /// Total on-disk size of the record this header describes.
    pub(crate) fn record_size(&self) -> u64 {
        RECORD_HEADER_SIZE as u64
            + self.table_id_size as u64
            + self.partition_tag_size as u64
            + self.vector_num as u64 * 8
            + self.data_size
    }

    pub(crate) fn encode(&self, mut w: &mut [u8]) -> Result<(), io::Error> {
        w.write_u64::<LittleEndian>(self.lsn.0)?;
        w.write_u8(self.record_type)?;
        w.write_u16::<LittleEndian>(self.table_id_size)?;
        w.write_u16::<LittleEndian>(self.partition_tag_size)?;
        w.write_u32::<LittleEndian>(self.vector_num)?;
        w.write_u64::<LittleEndian>(self.data_size)?;
        Ok(())
    }

    /// Decodes a header from a slice of at least `RECORD_HEADER_SIZE` bytes.
    pub(crate) fn decode(mut r: &[u8]) -> Result<Self, io::Error> {
        Ok(Self {
            lsn: Lsn(r.read_u64::<LittleEndian>()?),
            record_type: r.read_u8()?,
            table_id_size: r.read_u16::<LittleEndian>()?,
            partition_tag_size: r.read_u16::<LittleEndian>()?,
            vector_num: r.read_u32::<LittleEndian>()?,
            data_size: r.read_u64::<LittleEndian>()?,
        })
    }
}

/// A record decoded in place from the reader buffer.
///
/// All payload sections alias the underlying buffer and stay valid only
/// while this entry is borrowed; copy them out for anything longer-lived.
#[derive(Debug, Clone, Copy)]
pub struct RecordEntry<'a> {
    pub record_type: RecordType,
    /// Position just past the end of this record in its segment file.
    pub lsn: Lsn,
    pub table_id: &'a [u8],
    pub partition_tag: &'a [u8],
    pub ids: IdList<'a>,
    pub data: &'a [u8],
}

/// Identifier array section of a decoded record.
///
/// The ids sit unaligned in the reader buffer, so they are exposed through
/// accessors that assemble each `u64` from its little-endian bytes.
#[derive(Debug, Clone, Copy)]
pub struct IdList<'a> {
    bytes: &'a [u8],
}

impl<'a> IdList<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        debug_assert_eq!(bytes.len() % 8, 0);
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len() / 8
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<u64> {
        let raw = self.bytes.get(i * 8..i * 8 + 8)?;
        Some(u64::from_le_bytes(raw.try_into().unwrap()))
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + 'a {
        self.bytes
            .chunks_exact(8)
            .map(|raw| u64::from_le_bytes(raw.try_into().unwrap()))
    }

    pub fn to_vec(&self) -> Vec<u64> {
        self.iter().collect()
    }
}

/// Encodes `record` with an already-assigned `lsn` into `dst`.
///
/// `dst` must be exactly `record.encoded_size()` bytes; field limits must
/// have been checked beforehand.
pub(crate) fn encode_record(
    record: &Record<'_>,
    lsn: Lsn,
    dst: &mut [u8],
) -> Result<(), io::Error> {
    debug_assert_eq!(dst.len() as u64, record.encoded_size());

    let header = RecordHeader {
        lsn,
        record_type: record.record_type as u8,
        table_id_size: record.table_id.len() as u16,
        partition_tag_size: record.partition_tag.len() as u16,
        vector_num: record.ids.len() as u32,
        data_size: record.data.len() as u64,
    };

    header.encode(&mut dst[..RECORD_HEADER_SIZE as usize])?;
    let mut at = RECORD_HEADER_SIZE as usize;

    dst[at..at + record.table_id.len()].copy_from_slice(record.table_id);
    at += record.table_id.len();

    dst[at..at + record.partition_tag.len()]
        .copy_from_slice(record.partition_tag);
    at += record.partition_tag.len();

    for id in record.ids {
        dst[at..at + 8].copy_from_slice(&id.to_le_bytes());
        at += 8;
    }

    dst[at..at + record.data.len()].copy_from_slice(record.data);

    Ok(())
}

/// Decodes the record starting at `offset` within `buf`, where `buf` covers
/// the valid bytes `[0, bound)` of segment `file_no`.
///
/// Fails with [`MalformedRecord`] if the header's declared lengths would
/// cross the end of `buf`, or if the header's stored LSN disagrees with the
/// decoded extent (a corrupt LSN would otherwise move the reader backwards).
pub(crate) fn decode_record<'a>(
    buf: &'a [u8],
    file_no: u32,
    offset: u32,
) -> Result<RecordEntry<'a>, MalformedRecord> {
    let start = offset as usize;
    let header_end = start + RECORD_HEADER_SIZE as usize;
    if header_end > buf.len() {
        return Err(MalformedRecord::new(
            file_no,
            offset,
            "header crosses end of valid bytes",
        ));
    }

    let header = RecordHeader::decode(&buf[start..header_end])
        .map_err(|e| MalformedRecord::new(file_no, offset, e))?;

    let record_size = header.record_size();
    let end = start as u64 + record_size;
    if end > buf.len() as u64 {
        return Err(MalformedRecord::new(
            file_no,
            offset,
            format!(
                "payload of {} bytes crosses end of valid bytes {}",
                record_size,
                buf.len()
            ),
        ));
    }

    if header.lsn != Lsn::new(file_no, end as u32) {
        return Err(MalformedRecord::new(
            file_no,
            offset,
            format!("header lsn {} does not match record extent", header.lsn),
        ));
    }

    let record_type = RecordType::from_u8(header.record_type).ok_or_else(
        || {
            MalformedRecord::new(
                file_no,
                offset,
                format!("unknown record type {}", header.record_type),
            )
        },
    )?;

    let mut at = header_end;
    let table_id = &buf[at..at + header.table_id_size as usize];
    at += header.table_id_size as usize;

    let partition_tag = &buf[at..at + header.partition_tag_size as usize];
    at += header.partition_tag_size as usize;

    let ids = IdList::new(&buf[at..at + header.vector_num as usize * 8]);
    at += header.vector_num as usize * 8;

    let data = &buf[at..at + header.data_size as usize];

    Ok(RecordEntry {
        record_type,
        lsn: header.lsn,
        table_id,
        partition_tag,
        ids,
        data,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::decode_record;
    use super::encode_record;
    use super::Record;
    use super::RecordHeader;
    use super::RecordType;
    use super::RECORD_HEADER_SIZE;
    use crate::lsn::Lsn;

    fn sample() -> Record<'static> {
        Record {
            record_type: RecordType::Insert,
            table_id: b"t",
            partition_tag: b"",
            ids: &[42, 43],
            data: b"abcd",
        }
    }

    #[test]
    fn test_encoded_size() {
        // 25 + 1 + 0 + 2 * 8 + 4
        assert_eq!(sample().encoded_size(), 46);
    }

    #[test]
    fn test_header_layout() {
        let header = RecordHeader {
            lsn: Lsn::new(1, 46),
            record_type: RecordType::Insert as u8,
            table_id_size: 1,
            partition_tag_size: 0,
            vector_num: 2,
            data_size: 4,
        };

        let mut b = [0u8; RECORD_HEADER_SIZE as usize];
        header.encode(&mut b).unwrap();

        assert_eq!(b, [
            46, 0, 0, 0, 1, 0, 0, 0, // lsn, low half first
            1, // type
            1, 0, // table_id_size
            0, 0, // partition_tag_size
            2, 0, 0, 0, // vector_num
            4, 0, 0, 0, 0, 0, 0, 0, // data_size
        ]);

        assert_eq!(RecordHeader::decode(&b).unwrap(), header);
    }

    #[test]
    fn test_encode_decode_in_place() {
        let rec = sample();
        let size = rec.encoded_size() as usize;
        let lsn = Lsn::new(0, size as u32);

        let mut buf = vec![0u8; size];
        encode_record(&rec, lsn, &mut buf).unwrap();

        let entry = decode_record(&buf, 0, 0).unwrap();
        assert_eq!(entry.record_type, RecordType::Insert);
        assert_eq!(entry.lsn, lsn);
        assert_eq!(entry.table_id, b"t");
        assert_eq!(entry.partition_tag, b"");
        assert_eq!(entry.ids.to_vec(), vec![42, 43]);
        assert_eq!(entry.ids.get(1), Some(43));
        assert_eq!(entry.ids.get(2), None);
        assert_eq!(entry.data, b"abcd");
    }

    #[test]
    fn test_decode_rejects_truncated_header() {
        let rec = sample();
        let size = rec.encoded_size() as usize;
        let mut buf = vec![0u8; size];
        encode_record(&rec, Lsn::new(0, size as u32), &mut buf).unwrap();

        let err = decode_record(&buf[..10], 0, 0).unwrap_err();
        assert!(err.reason.contains("header crosses"));
    }

    #[test]
    fn test_decode_rejects_payload_past_bound() {
        let rec = sample();
        let size = rec.encoded_size() as usize;
        let mut buf = vec![0u8; size];
        encode_record(&rec, Lsn::new(0, size as u32), &mut buf).unwrap();

        // Header intact, payload cut short.
        let err = decode_record(&buf[..size - 1], 0, 0).unwrap_err();
        assert!(err.reason.contains("crosses end of valid bytes"));
    }

    #[test]
    fn test_decode_rejects_inconsistent_lsn() {
        let rec = sample();
        let size = rec.encoded_size() as usize;
        let mut buf = vec![0u8; size];
        // One byte short of where the record actually ends.
        encode_record(&rec, Lsn::new(0, size as u32 - 1), &mut buf).unwrap();

        let err = decode_record(&buf, 0, 0).unwrap_err();
        assert!(err.reason.contains("does not match record extent"));
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let rec = sample();
        let size = rec.encoded_size() as usize;
        let mut buf = vec![0u8; size];
        encode_record(&rec, Lsn::new(0, size as u32), &mut buf).unwrap();
        buf[8] = 9;

        let err = decode_record(&buf, 0, 0).unwrap_err();
        assert!(err.reason.contains("unknown record type"));
    }

    #[test]
    fn test_empty_sections() {
        let rec = Record {
            record_type: RecordType::Flush,
            table_id: b"",
            partition_tag: b"",
            ids: &[],
            data: b"",
        };
        assert_eq!(rec.encoded_size(), RECORD_HEADER_SIZE as u64);

        let mut buf = vec![0u8; RECORD_HEADER_SIZE as usize];
        encode_record(&rec, Lsn::new(2, RECORD_HEADER_SIZE), &mut buf)
            .unwrap();

        let entry = decode_record(&buf, 2, 0).unwrap();
        assert_eq!(entry.record_type, RecordType::Flush);
        assert!(entry.ids.is_empty());
        assert_eq!(entry.data, b"");
    }
}
