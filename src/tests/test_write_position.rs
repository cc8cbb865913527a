use pretty_assertions::assert_eq;

use crate::errors::WalError;
use crate::lsn::Lsn;
use crate::testing::RecordData;
use crate::tests::context::new_testing;

/// Rewinding within the current segment makes later appends overwrite the
/// trailing bytes, in the buffer and in the file.
#[test]
fn test_rewind_within_segment() -> Result<(), WalError> {
    let (ctx, mut writer, mut reader) = new_testing()?;

    let r1 = RecordData::insert("a", vec![1], vec![0; 975]);
    let r2 = RecordData::insert("b", vec![2], vec![1; 975]);
    let r3 = RecordData::insert("c", vec![3], vec![2; 1475]);

    let lsn1 = writer.append(&r1.record())?;
    let lsn2 = writer.append(&r2.record())?;
    assert_eq!(lsn2, Lsn::new(0, 2 * r1.encoded_size()));

    // A checkpoint decides r2 never happened.
    writer.set_write_lsn(lsn1)?;

    let lsn3 = writer.append(&r3.record())?;
    assert_eq!(
        lsn3,
        Lsn::new(0, r1.encoded_size() + r3.encoded_size())
    );
    assert_eq!(ctx.segment_size(0), lsn3.offset() as u64);

    let entry = reader.next(lsn3)?.expect("r1 available");
    assert_eq!(entry.lsn, lsn1);
    r1.assert_matches(&entry);

    let entry = reader.next(lsn3)?.expect("r3 replaced r2");
    assert_eq!(entry.lsn, lsn3);
    r3.assert_matches(&entry);

    assert!(reader.next(lsn3)?.is_none());
    Ok(())
}

/// Moving the write position back into the segment the reader still
/// occupies re-shares the reader's buffer and continues that file.
#[test]
fn test_rewind_onto_reader_segment() -> Result<(), WalError> {
    let (ctx, mut writer, mut reader) = new_testing()?;

    let big = RecordData::with_encoded_size(400_000);
    let size = big.encoded_size();

    let lsn1 = writer.append(&big.record())?;
    let lsn2 = writer.append(&big.record())?;
    let lsn3 = writer.append(&big.record())?; // rolls over to segment 1
    assert_eq!(lsn3.file_no(), 1);

    // The consumer has applied only r1; the reader is still on segment 0.
    reader.next(lsn1)?.expect("r1 available");
    assert_eq!(reader.read_lsn(), lsn1);

    // A checkpoint discards segment 1 and rewinds to the end of segment 0.
    writer.set_write_lsn(lsn2)?;

    let small = RecordData::insert("t", vec![7], vec![3; 100]);
    let lsn4 = writer.append(&small.record())?;
    assert_eq!(lsn4, Lsn::new(0, 2 * size + small.encoded_size()));
    assert_eq!(ctx.segment_size(0), lsn4.offset() as u64);

    // The reader continues seamlessly: r2, then the new record.
    let entry = reader.next(lsn4)?.expect("r2 available");
    assert_eq!(entry.lsn, lsn2);
    big.assert_matches(&entry);

    let entry = reader.next(lsn4)?.expect("new record available");
    assert_eq!(entry.lsn, lsn4);
    small.assert_matches(&entry);

    assert!(reader.next(lsn4)?.is_none());
    Ok(())
}

/// Reset discards everything buffered and opens a fresh segment on the
/// next file number; the reader is carried along.
#[test]
fn test_reset_after_append() -> Result<(), WalError> {
    let (ctx, mut writer, mut reader) = new_testing()?;

    let r1 = RecordData::insert("t", vec![1], vec![0; 100]);
    let lsn1 = writer.append(&r1.record())?;
    assert_eq!(lsn1.file_no(), 0);

    writer.reset(&mut reader, lsn1)?;

    assert!(ctx.segment_exists(1));
    assert_eq!(ctx.segment_size(1), 0);
    assert_eq!(reader.read_lsn(), Lsn::new(1, 0));
    assert!(reader.next(lsn1)?.is_none());

    let r2 = RecordData::insert("u", vec![2], vec![1; 80]);
    let lsn2 = writer.append(&r2.record())?;
    assert_eq!(lsn2, Lsn::new(1, r2.encoded_size()));

    let entry = reader.next(lsn2)?.expect("record available");
    r2.assert_matches(&entry);
    Ok(())
}
