use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use std::path::PathBuf;

/// How a segment file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create a fresh segment, truncating any stale file of the same name.
    Write,
    /// Read and write an existing segment without truncating it.
    Update,
    /// Read only.
    Read,
}

/// Driver for one segment file at a time, bound to the WAL directory.
///
/// Writes are strictly sequential: `write` appends at the current file
/// position and never seeks. `load` is positional and leaves the position at
/// the end of the loaded range, so a load of `[0, n)` followed by writes
/// continues the file at byte `n`.
#[derive(Debug)]
pub struct SegmentFileHandler {
    dir: PathBuf,
    name: String,
    mode: OpenMode,
    file: Option<File>,
}

impl SegmentFileHandler {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            name: String::new(),
            mode: OpenMode::Read,
            file: None,
        }
    }

    pub fn set_name(&mut self, name: impl ToString) {
        self.name = name.to_string();
    }

    pub fn set_mode(&mut self, mode: OpenMode) {
        self.mode = mode;
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Opens the current file with the current mode. A no-op if already open.
    pub fn open(&mut self) -> Result<(), io::Error> {
        if self.file.is_some() {
            return Ok(());
        }

        let mut options = OpenOptions::new();
        match self.mode {
            OpenMode::Write => {
                options.read(true).write(true).create(true).truncate(true)
            }
            OpenMode::Update => options.read(true).write(true),
            OpenMode::Read => options.read(true),
        };

        let f = options.open(self.path())?;
        self.file = Some(f);
        Ok(())
    }

    pub fn close(&mut self) {
        self.file = None;
    }

    /// Size of the current file on disk, whether or not it is open.
    pub fn size(&self) -> Result<u64, io::Error> {
        let meta = fs::metadata(self.path())?;
        Ok(meta.len())
    }

    fn file_mut(&mut self) -> Result<&mut File, io::Error> {
        self.open()?;
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("segment file not open"))
    }

    /// Reads exactly `dst.len()` bytes starting at `file_offset`.
    pub fn load(
        &mut self,
        dst: &mut [u8],
        file_offset: u64,
    ) -> Result<(), io::Error> {
        let f = self.file_mut()?;
        f.seek(io::SeekFrom::Start(file_offset))?;
        f.read_exact(dst)
    }

    /// Appends `src` at the current file position.
    pub fn write(&mut self, src: &[u8]) -> Result<(), io::Error> {
        self.file_mut()?.write_all(src)
    }

    /// Closes the current file and opens `name` in `mode`, as one logical
    /// operation. This is the segment rollover primitive.
    pub fn reborn(
        &mut self,
        name: impl ToString,
        mode: OpenMode,
    ) -> Result<(), io::Error> {
        self.close();
        self.set_name(name);
        self.set_mode(mode);
        self.open()
    }
}

#[cfg(test)]
mod tests {
    use super::OpenMode;
    use super::SegmentFileHandler;

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = SegmentFileHandler::new(dir.path());

        h.set_name("0.wal");
        assert!(!h.exists());

        h.set_mode(OpenMode::Write);
        h.open().unwrap();
        h.write(b"hello").unwrap();
        h.write(b" world").unwrap();
        assert!(h.exists());
        assert_eq!(h.size().unwrap(), 11);

        let mut got = [0u8; 5];
        h.load(&mut got, 6).unwrap();
        assert_eq!(&got, b"world");
    }

    #[test]
    fn test_load_positions_next_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = SegmentFileHandler::new(dir.path());

        h.set_name("1.wal");
        h.set_mode(OpenMode::Write);
        h.write(b"abcdef").unwrap();
        h.close();

        // Reopen without truncation, replay a prefix, keep appending.
        h.set_mode(OpenMode::Update);
        let mut prefix = [0u8; 3];
        h.load(&mut prefix, 0).unwrap();
        assert_eq!(&prefix, b"abc");

        h.write(b"XYZ").unwrap();

        let mut all = [0u8; 6];
        h.load(&mut all, 0).unwrap();
        assert_eq!(&all, b"abcXYZ");
    }

    #[test]
    fn test_reborn_switches_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = SegmentFileHandler::new(dir.path());

        h.set_name("0.wal");
        h.set_mode(OpenMode::Write);
        h.write(b"first").unwrap();

        h.reborn("1.wal", OpenMode::Write).unwrap();
        h.write(b"second").unwrap();

        assert_eq!(h.size().unwrap(), 6);
        assert!(dir.path().join("0.wal").exists());
        assert!(dir.path().join("1.wal").exists());
    }

    #[test]
    fn test_update_mode_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = SegmentFileHandler::new(dir.path());

        h.set_name("9.wal");
        h.set_mode(OpenMode::Update);
        assert!(h.open().is_err());
    }
}
