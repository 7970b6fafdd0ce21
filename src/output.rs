//! Crash-safe output files.
//!
//! The reconciler writes the merged dump page by page, so an aborted pass
//! would otherwise leave a truncated file that looks like a finished merge.
//! Writes go to a `.partial` sidecar instead, which only moves to the real
//! path once the pass has fully succeeded.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// A file that only appears at its final path on [`commit`](Self::commit).
/// Dropping it uncommitted removes the sidecar again.
#[derive(Debug)]
pub struct PendingFile {
    out: BufWriter<File>,
    final_path: PathBuf,
    partial_path: PathBuf,
    committed: bool,
}

impl PendingFile {
    /// Create `<path>.partial`, truncating any stale leftover from an
    /// earlier aborted run.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let final_path = path.as_ref().to_path_buf();

        let mut partial_path = final_path.clone().into_os_string();
        partial_path.push(".partial");
        let partial_path = PathBuf::from(partial_path);

        let out = BufWriter::new(File::create(&partial_path)?);

        Ok(Self {
            out,
            final_path,
            partial_path,
            committed: false,
        })
    }

    /// Flush everything and move the file to its final path.
    pub fn commit(mut self) -> io::Result<()> {
        self.out.flush()?;
        self.committed = true;
        fs::rename(&self.partial_path, &self.final_path)
    }
}

impl Write for PendingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.partial_path);
        }
    }
}

#[cfg(test)]
fn test_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("nand-reconcile-{tag}-{}", std::process::id()))
}

#[test]
fn test_abandoned_output_never_appears() -> io::Result<()> {
    let path = test_path("abandoned");

    {
        let mut pending = PendingFile::create(&path)?;
        pending.write_all(b"half a dump")?;
        // Dropped here, as if the merge died partway.
    }

    assert!(!path.exists());
    let mut partial = path.into_os_string();
    partial.push(".partial");
    assert!(!PathBuf::from(partial).exists());
    Ok(())
}

#[test]
fn test_committed_output_appears_complete() -> io::Result<()> {
    let path = test_path("committed");

    let mut pending = PendingFile::create(&path)?;
    pending.write_all(b"a whole dump")?;
    pending.commit()?;

    assert_eq!(fs::read(&path)?, b"a whole dump");
    fs::remove_file(&path)?;
    Ok(())
}
