//! SSH store backed by an SFTP channel.
//!
//! Authentication is password or private-key file. Owner and group are the
//! numeric ids SFTP reports; `resolve` uses the server-side realpath so the
//! traversal's symlink guard works on remote links too.

use std::io::Read;
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use ssh2::{ErrorCode, FileStat, Session, Sftp};

use crate::error::{FileStoreError, Result};
use crate::record::FileRecord;
use crate::store::FileStore;

// SFTP status codes from the protocol: the two "that path is not there"
// answers, which `exists` must not treat as errors.
const SFTP_NO_SUCH_FILE: i32 = 2;
const SFTP_NO_SUCH_PATH: i32 = 10;

pub struct SshFileStore {
    host: String,
    port: u16,
    username: String,
    password: Option<String>,
    pem_path: Option<PathBuf>,
    session: Option<Session>,
    sftp: Option<Sftp>,
}

impl SshFileStore {
    pub fn new(
        host: &str,
        port: u16,
        username: &str,
        password: Option<&str>,
        pem_path: Option<&Path>,
    ) -> Self {
        Self {
            host: host.to_string(),
            port,
            username: username.to_string(),
            password: password.map(str::to_string),
            pem_path: pem_path.map(Path::to_path_buf),
            session: None,
            sftp: None,
        }
    }

    fn sftp(&mut self) -> Result<&Sftp> {
        self.sftp
            .as_ref()
            .ok_or_else(|| FileStoreError::connection("sftp session is not open"))
    }
}

impl FileStore for SshFileStore {
    fn open(&mut self) -> Result<()> {
        tracing::debug!(host = %self.host, port = self.port, user = %self.username, "opening ssh connection");

        let tcp = TcpStream::connect((self.host.as_str(), self.port))
            .map_err(FileStoreError::connection)?;
        let mut session = Session::new().map_err(FileStoreError::connection)?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(FileStoreError::connection)?;

        match (&self.pem_path, &self.password) {
            (Some(pem), _) => session
                .userauth_pubkey_file(&self.username, None, pem, None)
                .map_err(FileStoreError::connection)?,
            (None, Some(password)) => session
                .userauth_password(&self.username, password)
                .map_err(FileStoreError::connection)?,
            (None, None) => {
                return Err(FileStoreError::connection(
                    "ssh requires a password or a pem file",
                ))
            }
        }

        let sftp = session.sftp().map_err(FileStoreError::connection)?;
        self.session = Some(session);
        self.sftp = Some(sftp);
        Ok(())
    }

    fn close(&mut self) {
        self.sftp = None;
        if let Some(session) = self.session.take() {
            if let Err(error) = session.disconnect(None, "closing", None) {
                tracing::debug!(host = %self.host, %error, "ssh disconnect failed");
            }
        }
    }

    fn list(&mut self, path: &str) -> Result<Vec<FileRecord>> {
        // readdir already filters the . and .. pseudo-entries
        let entries = self
            .sftp()?
            .readdir(Path::new(path))
            .map_err(|error| classify(error, || FileStoreError::list(path, "listing failed")))?;

        let mut records = Vec::with_capacity(entries.len());
        for (entry_path, stat) in entries {
            let Some(name) = entry_path.file_name() else {
                continue;
            };
            records.push(record_from_stat(
                entry_path.to_string_lossy().into_owned(),
                name.to_string_lossy().into_owned(),
                &stat,
            ));
        }
        Ok(records)
    }

    fn read(&mut self, record: &FileRecord) -> Result<Box<dyn Read + Send>> {
        let file = self
            .sftp()?
            .open(Path::new(&record.path))
            .map_err(|error| {
                classify(error, || {
                    FileStoreError::read(&record.path, "file vanished before read")
                })
            })?;
        Ok(Box::new(file))
    }

    fn exists(&mut self, path: &str) -> Result<bool> {
        match self.sftp()?.stat(Path::new(path)) {
            Ok(_) => Ok(true),
            Err(error) => match error.code() {
                ErrorCode::SFTP(SFTP_NO_SUCH_FILE) | ErrorCode::SFTP(SFTP_NO_SUCH_PATH) => {
                    Ok(false)
                }
                _ => Err(FileStoreError::connection(error)),
            },
        }
    }

    fn resolve(&mut self, path: &str) -> String {
        match self.sftp.as_ref().map(|sftp| sftp.realpath(Path::new(path))) {
            Some(Ok(resolved)) => resolved.to_string_lossy().into_owned(),
            _ => path.to_string(),
        }
    }
}

/// Session-level failures become `Connection`; SFTP status answers (missing
/// path, permission refusal) become the caller's per-path error.
fn classify(error: ssh2::Error, per_path: impl FnOnce() -> FileStoreError) -> FileStoreError {
    match error.code() {
        ErrorCode::SFTP(_) => {
            tracing::debug!(%error, "sftp command failed");
            per_path()
        }
        ErrorCode::Session(_) => FileStoreError::connection(error),
    }
}

fn record_from_stat(path: String, name: String, stat: &FileStat) -> FileRecord {
    FileRecord {
        path,
        name,
        is_directory: stat.is_dir(),
        size: if stat.is_dir() {
            0
        } else {
            stat.size.unwrap_or(0)
        },
        last_modified: stat.mtime.unwrap_or(0),
        owner: stat.uid.map(|uid| uid.to_string()),
        group: stat.gid.map(|gid| gid.to_string()),
    }
}
