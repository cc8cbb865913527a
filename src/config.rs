use crate::errors::InvalidWalFileName;

/// Smallest buffer capacity the log buffer will run with.
pub const MIN_BUFFER_SIZE: u32 = 1024 * 1024;

/// Largest buffer capacity; a segment can never exceed this.
pub const MAX_BUFFER_SIZE: u32 = 2 * 1024 * 1024 * 1024;

const DEFAULT_BUFFER_SIZE: u32 = 256 * 1024 * 1024;

/// Name of the exclusive lock file kept next to the segments.
const LOCK_FILE_NAME: &str = "wal.lock";

/// Configuration for the log buffer.
///
/// Optional parameters are `Option<T>` in this struct; default values and
/// range clamping are evaluated when a getter method is called.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Directory for `.wal` segment files.
    pub dir: String,

    /// Desired capacity of each of the two in-memory buffers, in bytes.
    ///
    /// Clamped to `[MIN_BUFFER_SIZE, MAX_BUFFER_SIZE]`. Recovery may grow
    /// the effective capacity beyond this if an on-disk segment is larger.
    pub buffer_size: Option<u32>,
}

impl Config {
    /// Creates a new Config with the specified directory and default values
    /// for other fields.
    pub fn new(dir: impl ToString) -> Self {
        Self {
            dir: dir.to_string(),
            ..Default::default()
        }
    }

    /// Returns the configured buffer capacity clamped to the legal range
    /// (defaults to 256 MiB).
    pub fn buffer_size(&self) -> u32 {
        let size = self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        if size < MIN_BUFFER_SIZE {
            log::info!(
                "configured wal buffer size {} is too small, using {}",
                size,
                MIN_BUFFER_SIZE
            );
            MIN_BUFFER_SIZE
        } else if size > MAX_BUFFER_SIZE {
            log::info!(
                "configured wal buffer size {} is too large, using {}",
                size,
                MAX_BUFFER_SIZE
            );
            MAX_BUFFER_SIZE
        } else {
            size
        }
    }

    /// Returns the full path for a given segment file number.
    pub fn wal_path(&self, file_no: u32) -> String {
        format!("{}/{}", self.dir, Self::wal_file_name(file_no))
    }

    /// Returns the path of the directory's exclusive lock file. It never
    /// collides with a segment: its name does not parse as a file number.
    pub(crate) fn lock_path(&self) -> String {
        format!("{}/{}", self.dir, LOCK_FILE_NAME)
    }

    /// Generates the file name for a given segment number.
    ///
    /// The file name format is `{file_no}.wal`, decimal, no padding.
    pub(crate) fn wal_file_name(file_no: u32) -> String {
        format!("{}.wal", file_no)
    }

    /// Parses a segment file name back into its file number.
    pub(crate) fn parse_wal_file_name(
        file_name: &str,
    ) -> Result<u32, InvalidWalFileName> {
        let digits = file_name.strip_suffix(".wal").ok_or_else(|| {
            InvalidWalFileName::new(file_name, "has no '.wal' suffix")
        })?;

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(InvalidWalFileName::new(
                file_name,
                "stem is not a decimal number",
            ));
        }

        digits.parse::<u32>().map_err(|e| {
            InvalidWalFileName::new(
                file_name,
                format!("cannot parse as u32: {}", e),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use super::MAX_BUFFER_SIZE;
    use super::MIN_BUFFER_SIZE;

    #[test]
    fn test_buffer_size_clamping() {
        let mut config = Config::new("/tmp/wal");

        config.buffer_size = Some(0);
        assert_eq!(config.buffer_size(), MIN_BUFFER_SIZE);

        config.buffer_size = Some(MAX_BUFFER_SIZE);
        assert_eq!(config.buffer_size(), MAX_BUFFER_SIZE);

        config.buffer_size = Some(MIN_BUFFER_SIZE + 1);
        assert_eq!(config.buffer_size(), MIN_BUFFER_SIZE + 1);
    }

    #[test]
    fn test_wal_file_name() {
        assert_eq!(Config::wal_file_name(0), "0.wal");
        assert_eq!(Config::wal_file_name(17), "17.wal");

        let config = Config::new("/tmp/wal");
        assert_eq!(config.wal_path(3), "/tmp/wal/3.wal");
        assert_eq!(config.lock_path(), "/tmp/wal/wal.lock");
        assert!(Config::parse_wal_file_name("wal.lock").is_err());
    }

    #[test]
    fn test_parse_wal_file_name() {
        assert_eq!(Config::parse_wal_file_name("0.wal"), Ok(0));
        assert_eq!(Config::parse_wal_file_name("4294967295.wal"), Ok(u32::MAX));

        assert!(Config::parse_wal_file_name("4294967296.wal").is_err());
        assert!(Config::parse_wal_file_name("1.wall").is_err());
        assert!(Config::parse_wal_file_name(".wal").is_err());
        assert!(Config::parse_wal_file_name("a1.wal").is_err());
        assert!(Config::parse_wal_file_name("-1.wal").is_err());
    }
}
