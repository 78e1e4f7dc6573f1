//! FTP store over a plain control/data connection.
//!
//! Sessions run in passive mode with binary transfers. Directory listings
//! come from the LIST command; owner and group are only present when the
//! server reports them in the listing.

use std::io::Read;

use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Mode};

use crate::error::{FileStoreError, Result};
use crate::record::{system_time_secs, FileRecord};
use crate::store::{join_path, FileStore};

pub struct FtpFileStore {
    host: String,
    port: u16,
    username: String,
    password: String,
    session: Option<FtpStream>,
}

impl FtpFileStore {
    pub fn new(host: &str, port: u16, username: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            username: username.to_string(),
            password: password.to_string(),
            session: None,
        }
    }

    fn session(&mut self) -> Result<&mut FtpStream> {
        self.session
            .as_mut()
            .ok_or_else(|| FileStoreError::connection("ftp session is not open"))
    }
}

impl FileStore for FtpFileStore {
    fn open(&mut self) -> Result<()> {
        tracing::debug!(host = %self.host, port = self.port, user = %self.username, "opening ftp connection");

        let mut stream = FtpStream::connect((self.host.as_str(), self.port))
            .map_err(FileStoreError::connection)?;
        stream
            .login(&self.username, &self.password)
            .map_err(FileStoreError::connection)?;
        stream.set_mode(Mode::Passive);
        stream
            .transfer_type(FileType::Binary)
            .map_err(FileStoreError::connection)?;

        self.session = Some(stream);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.session.take() {
            if let Err(error) = stream.quit() {
                tracing::debug!(host = %self.host, %error, "ftp quit failed");
            }
        }
    }

    fn list(&mut self, path: &str) -> Result<Vec<FileRecord>> {
        let lines = self
            .session()?
            .list(Some(path))
            .map_err(|error| classify(error, || FileStoreError::list(path, "listing failed")))?;

        let mut records = Vec::with_capacity(lines.len());
        for line in &lines {
            match suppaftp::list::File::try_from(line.as_str()) {
                Ok(file) => {
                    if file.name() == "." || file.name() == ".." {
                        continue;
                    }
                    records.push(record_from_listing(path, &file));
                }
                Err(error) => {
                    tracing::debug!(%line, %error, "unparseable LIST line skipped");
                }
            }
        }
        Ok(records)
    }

    fn read(&mut self, record: &FileRecord) -> Result<Box<dyn Read + Send>> {
        // RETR into a buffer; streaming straight off the data socket would
        // tie the reader's lifetime to the control connection.
        let cursor = self
            .session()?
            .retr_as_buffer(&record.path)
            .map_err(|error| {
                classify(error, || {
                    FileStoreError::read(&record.path, "file vanished before read")
                })
            })?;
        Ok(Box::new(cursor))
    }

    fn exists(&mut self, path: &str) -> Result<bool> {
        // FTP has no cheap stat; a non-empty LIST of the path means it is
        // there (a file lists itself, a directory lists its children).
        match self.session()?.list(Some(path)) {
            Ok(lines) => Ok(!lines.is_empty()),
            Err(FtpError::ConnectionError(error)) => Err(FileStoreError::connection(error)),
            Err(_) => Ok(false),
        }
    }
}

/// Maps a transport-level failure to `Connection` and anything else (missing
/// path, permission refusal) to the caller-provided per-path error.
fn classify(error: FtpError, per_path: impl FnOnce() -> FileStoreError) -> FileStoreError {
    match error {
        FtpError::ConnectionError(io_error) => FileStoreError::connection(io_error),
        other => {
            tracing::debug!(error = %other, "ftp command failed");
            per_path()
        }
    }
}

fn record_from_listing(parent: &str, file: &suppaftp::list::File) -> FileRecord {
    FileRecord {
        path: join_path(parent, file.name()),
        name: file.name().to_string(),
        is_directory: file.is_directory(),
        size: file.size() as u64,
        last_modified: system_time_secs(file.modified()),
        owner: file.uid().map(|uid| uid.to_string()),
        group: file.gid().map(|gid| gid.to_string()),
    }
}
