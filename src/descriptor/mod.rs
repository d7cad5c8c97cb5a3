//! `FileDescriptor`: what to upload, and the bookkeeping the orchestrator
//! and drivers attach to it as the upload proceeds.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::checksum::{self, Algorithm};
use crate::error::{Error, Result};

/// An open, readable byte source supplied by the caller instead of a path.
///
/// Boxed so callers can hand in anything `Read + Seek`, e.g. an in-memory
/// cursor over bytes that never touched disk.
pub type Handle = Box<dyn ReadSeek + Send>;

pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// One file's full journey through classification and upload.
pub struct FileDescriptor {
    pub filepath: Option<PathBuf>,
    pub handle: Option<Handle>,
    pub size: u64,
    pub display_name: String,
    pub directory_label: String,
    pub mime_type: String,
    pub categories: Vec<String>,
    pub restrict: bool,
    pub tab_ingest: bool,
    pub description: String,
    pub checksum_algo: Algorithm,
    pub checksum_value: Option<String>,
    pub storage_identifier: Option<String>,
    pub to_replace: bool,
    pub file_id: Option<u64>,
    pub unchanged_data: bool,
    pub inside_zip: bool,
    pub enforce_metadata_update: bool,

    checksum_state: Option<checksum::State>,
}

impl FileDescriptor {
    /// A descriptor backed by a file on disk.
    pub fn from_path<P: Into<PathBuf>>(filepath: P) -> Self {
        FileDescriptor {
            filepath: Some(filepath.into()),
            handle: None,
            size: 0,
            display_name: String::new(),
            directory_label: String::new(),
            mime_type: "application/octet-stream".to_string(),
            categories: Vec::new(),
            restrict: false,
            tab_ingest: true,
            description: String::new(),
            checksum_algo: Algorithm::default(),
            checksum_value: None,
            storage_identifier: None,
            to_replace: false,
            file_id: None,
            unchanged_data: false,
            inside_zip: false,
            enforce_metadata_update: false,
            checksum_state: None,
        }
    }

    /// A descriptor backed by an in-memory handle rather than a path.
    pub fn from_handle(display_name: impl Into<String>, handle: Handle) -> Self {
        let mut d = Self::from_path(PathBuf::new());
        d.filepath = None;
        d.handle = Some(handle);
        d.display_name = display_name.into();
        d
    }

    /// True when this descriptor has no backing path, only an in-memory
    /// handle. Such descriptors cannot use multipart direct upload (§4.5).
    pub fn is_in_memory(&self) -> bool {
        self.filepath.is_none()
    }

    /// Validates the source, fills in `size` and `display_name`, and
    /// initializes a fresh checksum state. Does not read the whole file.
    pub fn prepare(&mut self) -> Result<()> {
        match (&self.filepath, &mut self.handle) {
            (_, Some(handle)) => {
                let len = handle.seek(SeekFrom::End(0))?;
                handle.seek(SeekFrom::Start(0))?;
                self.size = len;
            }
            (Some(path), None) => {
                let meta = std::fs::metadata(path)?;
                if !meta.is_file() {
                    return Err(Error::validation(format!(
                        "{} is not a regular file",
                        path.display()
                    )));
                }
                self.size = meta.len();
            }
            (None, None) => {
                return Err(Error::configuration(
                    "descriptor has neither a filepath nor a handle",
                ));
            }
        }

        if self.display_name.is_empty() {
            if let Some(path) = &self.filepath {
                self.display_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        Error::configuration(format!("{} has no file name", path.display()))
                    })?;
            }
        }
        if self.display_name.is_empty() {
            return Err(Error::configuration(
                "descriptor display_name is empty after prepare()",
            ));
        }

        self.checksum_state = Some(self.checksum_algo.new_state());
        Ok(())
    }

    /// Returns the descriptor's handle if caller-provided, otherwise opens
    /// the backing file read-only.
    pub fn open_handle(&mut self) -> Result<Handle> {
        if let Some(handle) = self.handle.take() {
            return Ok(handle);
        }
        let path = self
            .filepath
            .as_ref()
            .ok_or_else(|| Error::configuration("descriptor has no filepath to open"))?;
        Ok(Box::new(File::open(path)?))
    }

    /// Streams the whole handle through the checksum state in fixed-size
    /// chunks. Restores the caller-provided handle's position to the start;
    /// a handle this call opened itself is simply dropped.
    pub fn update_checksum_chunked(&mut self, blocksize: usize) -> Result<()> {
        let caller_provided = self.handle.is_some();
        let mut handle = self.open_handle()?;
        handle.seek(SeekFrom::Start(0))?;

        let state = self
            .checksum_state
            .as_mut()
            .ok_or_else(|| Error::configuration("update_checksum_chunked before prepare()"))?;

        let mut buf = vec![0u8; blocksize];
        loop {
            let n = handle.read(&mut buf)?;
            if n == 0 {
                break;
            }
            state.update(&buf[..n]);
        }

        if caller_provided {
            handle.seek(SeekFrom::Start(0))?;
            self.handle = Some(handle);
        }
        Ok(())
    }

    /// Finalizes the running checksum into `checksum_value`. One-shot.
    pub fn apply_checksum(&mut self) -> Result<()> {
        let state = self
            .checksum_state
            .take()
            .ok_or_else(|| Error::configuration("apply_checksum called twice, or before prepare()"))?;
        self.checksum_value = Some(state.finalize());
        Ok(())
    }

    /// Feeds one chunk of bytes already read elsewhere (e.g. while
    /// streaming a PUT body) into the running checksum, without touching
    /// the handle. Used by the upload drivers so the checksum is computed
    /// from the exact bytes transmitted.
    pub fn feed_checksum(&mut self, chunk: &[u8]) -> Result<()> {
        let state = self
            .checksum_state
            .as_mut()
            .ok_or_else(|| Error::configuration("feed_checksum before prepare()"))?;
        state.update(chunk);
        Ok(())
    }

    /// The dataset-relative path used to match against inventory entries
    /// and to name archive members: `join(directory_label, display_name)`.
    pub fn relative_path(&self) -> PathBuf {
        if self.directory_label.is_empty() {
            PathBuf::from(&self.display_name)
        } else {
            Path::new(&self.directory_label).join(&self.display_name)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prepare_sets_size_and_display_name_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello world").unwrap();

        let mut d = FileDescriptor::from_path(&path);
        d.prepare().unwrap();

        assert_eq!(d.size, 11);
        assert_eq!(d.display_name, "hello.txt");
    }

    #[test]
    fn prepare_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = FileDescriptor::from_path(dir.path());
        assert!(d.prepare().is_err());
    }

    #[test]
    fn update_checksum_chunked_matches_whole_buffer_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"the quick brown fox").unwrap();

        let mut d = FileDescriptor::from_path(&path);
        d.checksum_algo = Algorithm::Sha256;
        d.prepare().unwrap();
        d.update_checksum_chunked(4).unwrap();
        d.apply_checksum().unwrap();

        let mut expect = Algorithm::Sha256.new_state();
        expect.update(b"the quick brown fox");
        assert_eq!(d.checksum_value.unwrap(), expect.finalize());
    }

    #[test]
    fn caller_provided_handle_position_is_restored() {
        let mut cursor = std::io::Cursor::new(b"restored".to_vec());
        cursor.seek(SeekFrom::Start(0)).unwrap();
        let mut d = FileDescriptor::from_handle("mem.bin", Box::new(cursor));
        d.prepare().unwrap();
        d.update_checksum_chunked(3).unwrap();

        let mut handle = d.open_handle().unwrap();
        let mut buf = Vec::new();
        handle.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"restored");
    }

    #[test]
    fn relative_path_joins_directory_label_and_display_name() {
        let mut d = FileDescriptor::from_path("unused");
        d.display_name = "data.csv".to_string();
        d.directory_label = "subdir".to_string();
        assert_eq!(d.relative_path(), PathBuf::from("subdir/data.csv"));

        d.directory_label.clear();
        assert_eq!(d.relative_path(), PathBuf::from("data.csv"));
    }

    #[test]
    fn apply_checksum_twice_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.bin");
        std::fs::write(&path, b"x").unwrap();
        let mut d = FileDescriptor::from_path(&path);
        d.prepare().unwrap();
        d.update_checksum_chunked(16).unwrap();
        d.apply_checksum().unwrap();
        assert!(d.apply_checksum().is_err());
    }
}
