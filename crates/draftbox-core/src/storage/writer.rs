//! Sequential writer for a part file.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Part file being filled by one transfer. Writes are sequential; the worker
/// owns it exclusively until it is finalized or discarded.
pub struct PartFile {
    writer: BufWriter<File>,
    temp_path: PathBuf,
    len: u64,
}

impl PartFile {
    /// Create (or truncate) the part file, creating the parent directory if needed.
    pub fn create(temp_path: &Path, buffer_size: Option<usize>) -> io::Result<Self> {
        if let Some(parent) = temp_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)?;
        let writer = match buffer_size {
            Some(cap) => BufWriter::with_capacity(cap, file),
            None => BufWriter::new(file),
        };
        Ok(PartFile {
            writer,
            temp_path: temp_path.to_path_buf(),
            len: 0,
        })
    }

    pub fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.len += data.len() as u64;
        Ok(())
    }

    /// Bytes appended so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flush buffered bytes and sync file data to disk. Call before `finalize`.
    pub fn sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Rename the part file to `final_path`, replacing any existing file.
    /// Fails if `final_path` is on a different filesystem.
    pub fn finalize(mut self, final_path: &Path) -> io::Result<()> {
        self.writer.flush()?;
        let PartFile { writer, temp_path, .. } = self;
        drop(writer);
        std::fs::rename(&temp_path, final_path)
    }

    /// Close and delete the part file. A file that is already gone is not an error.
    pub fn discard(self) -> io::Result<()> {
        let PartFile { writer, temp_path, .. } = self;
        // Buffered bytes are thrown away with the file.
        let (file, _unflushed) = writer.into_parts();
        drop(file);
        match std::fs::remove_file(&temp_path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
