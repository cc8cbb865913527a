use crate::record::Record;
use crate::record::RecordEntry;
use crate::record::RecordType;
use crate::RECORD_HEADER_SIZE;

/// Owned payload sections for building records in tests.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordData {
    pub(crate) record_type: RecordType,
    pub(crate) table_id: Vec<u8>,
    pub(crate) partition_tag: Vec<u8>,
    pub(crate) ids: Vec<u64>,
    pub(crate) data: Vec<u8>,
}

#[allow(dead_code)]
impl RecordData {
    pub(crate) fn insert(
        table_id: impl AsRef<[u8]>,
        ids: Vec<u64>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            record_type: RecordType::Insert,
            table_id: table_id.as_ref().to_vec(),
            partition_tag: Vec::new(),
            ids,
            data,
        }
    }

    pub(crate) fn delete(table_id: impl AsRef<[u8]>, ids: Vec<u64>) -> Self {
        Self {
            record_type: RecordType::Delete,
            table_id: table_id.as_ref().to_vec(),
            partition_tag: Vec::new(),
            ids,
            data: Vec::new(),
        }
    }

    pub(crate) fn flush(table_id: impl AsRef<[u8]>) -> Self {
        Self {
            record_type: RecordType::Flush,
            table_id: table_id.as_ref().to_vec(),
            partition_tag: Vec::new(),
            ids: Vec::new(),
            data: Vec::new(),
        }
    }

    /// An insert whose encoded size is exactly `size` bytes.
    pub(crate) fn with_encoded_size(size: u32) -> Self {
        assert!(size >= RECORD_HEADER_SIZE);
        Self {
            record_type: RecordType::Insert,
            table_id: Vec::new(),
            partition_tag: Vec::new(),
            ids: Vec::new(),
            data: vec![0xab; (size - RECORD_HEADER_SIZE) as usize],
        }
    }

    pub(crate) fn record(&self) -> Record<'_> {
        Record {
            record_type: self.record_type,
            table_id: &self.table_id,
            partition_tag: &self.partition_tag,
            ids: &self.ids,
            data: &self.data,
        }
    }

    pub(crate) fn encoded_size(&self) -> u32 {
        self.record().encoded_size() as u32
    }

    pub(crate) fn assert_matches(&self, entry: &RecordEntry<'_>) {
        assert_eq!(self.record_type, entry.record_type);
        assert_eq!(self.table_id, entry.table_id);
        assert_eq!(self.partition_tag, entry.partition_tag);
        assert_eq!(self.ids, entry.ids.to_vec());
        assert_eq!(self.data, entry.data);
    }
}
