use crate::*;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only hash logs, one hex hash per line: `received.log` for
/// every submitted ballot and `counted.log` for every ballot recorded
/// as CAST. An audit trail independent of the ballot box itself.
pub struct AuditLog {
    received_path: PathBuf,
    counted_path: PathBuf,
}

impl AuditLog {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, Error> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        Ok(AuditLog {
            received_path: dir.join("received.log"),
            counted_path: dir.join("counted.log"),
        })
    }

    pub fn append_received(&self, hash: &[u8; 32]) -> Result<(), Error> {
        Self::append(&self.received_path, hash)
    }

    pub fn append_counted(&self, hash: &[u8; 32]) -> Result<(), Error> {
        Self::append(&self.counted_path, hash)
    }

    fn append(path: &Path, hash: &[u8; 32]) -> Result<(), Error> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", hex::encode(hash))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_one_hash_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path()).unwrap();

        log.append_received(&[1u8; 32]).unwrap();
        log.append_received(&[2u8; 32]).unwrap();
        log.append_counted(&[1u8; 32]).unwrap();

        let received = std::fs::read_to_string(dir.path().join("received.log")).unwrap();
        let lines: Vec<&str> = received.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], hex::encode([1u8; 32]));

        let counted = std::fs::read_to_string(dir.path().join("counted.log")).unwrap();
        assert_eq!(counted.lines().count(), 1);
    }
}
