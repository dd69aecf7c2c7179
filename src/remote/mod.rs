pub mod local;
pub mod session;
pub mod shell;
pub mod ssh;

#[cfg(test)]
pub mod mock;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;

pub use local::LocalTransport;
pub use session::RemoteSession;
pub use ssh::SshTransport;

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors raised by a transport or a remote session
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Not supported by this transport: {0}")]
    Unsupported(String),

    #[error("Session is closed")]
    Closed,
}

/// libssh2 codes for a dead socket or session: SOCKET_SEND, TIMEOUT,
/// SOCKET_DISCONNECT, SOCKET_TIMEOUT and SOCKET_RECV
const SESSION_LOST_CODES: [i32; 5] = [-7, -9, -13, -30, -43];

impl RemoteError {
    /// Whether the error means the session itself is unusable, as opposed to
    /// one command, path or file failing
    pub fn is_connection_lost(&self) -> bool {
        match self {
            RemoteError::Connection(_) | RemoteError::Closed => true,
            RemoteError::Ssh(e) => {
                matches!(e.code(), ssh2::ErrorCode::Session(code) if SESSION_LOST_CODES.contains(&code))
            }
            RemoteError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}

/// Remote shell environment, used to pick command syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Windows,
    Unix,
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Windows => write!(f, "Windows"),
            OsFamily::Unix => write!(f, "Linux/Unix"),
        }
    }
}

/// Raw output of a command run through a transport
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_status: Option<i32>,
}

impl CommandOutput {
    pub fn stdout_text(&self) -> String {
        crate::search::decode::decode_bytes(&self.stdout)
    }

    pub fn stderr_text(&self) -> String {
        crate::search::decode::decode_bytes(&self.stderr)
    }

    /// A command counts as failed when it printed only to stderr
    pub fn is_error_only(&self) -> bool {
        self.stdout_text().trim().is_empty() && !self.stderr_text().trim().is_empty()
    }
}

/// One entry returned by a structured directory listing
#[derive(Debug, Clone)]
pub struct RemoteEntry {
    pub name: String,
    pub size: Option<u64>,
    /// Seconds since the Unix epoch
    pub mtime: Option<u64>,
    pub is_dir: bool,
}

/// Result of a remote stat call
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteStat {
    pub size: Option<u64>,
    pub mtime: Option<u64>,
    pub is_dir: bool,
}

/// The channel a session talks through.
///
/// `SshTransport` drives a real host over SSH/SFTP; `LocalTransport` serves the
/// local filesystem so a whole job can run without a network.
pub trait Transport: Send {
    /// Run a shell command and capture its raw output
    fn exec(&mut self, command: &str) -> RemoteResult<CommandOutput>;

    /// Structured directory listing (SFTP `readdir` or `fs::read_dir`)
    fn read_dir(&mut self, path: &str) -> RemoteResult<Vec<RemoteEntry>>;

    fn stat(&mut self, path: &str) -> RemoteResult<RemoteStat>;

    /// Primary byte-stream download. `progress` receives the running byte count.
    fn fetch(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        progress: &mut dyn FnMut(u64),
    ) -> RemoteResult<u64>;

    /// Secondary, command-based download with no granular progress
    fn fetch_fallback(&mut self, remote_path: &str, local_path: &Path) -> RemoteResult<u64>;

    /// Release the transport. Must be safe to call more than once.
    fn close(&mut self);

    /// Human readable endpoint, for logs
    fn endpoint(&self) -> String;
}
