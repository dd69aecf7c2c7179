//! SSH transport
//!
//! Password-authenticated `ssh2` session with an SFTP sub-channel for listing,
//! stat and streaming downloads, and SCP as the command-based fallback.

use super::{CommandOutput, RemoteEntry, RemoteError, RemoteResult, RemoteStat, Transport};
use ssh2::{Channel, Session, Sftp};
use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const CHUNK_SIZE: usize = 32 * 1024;

/// Pause between polls while a command produces no output
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct SshTransport {
    endpoint: String,
    session: Option<Session>,
    sftp: Option<Sftp>,
    timeout: Duration,
}

impl SshTransport {
    /// Open an authenticated session. Failures are returned immediately, never retried.
    pub fn connect(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let endpoint = format!("{}@{}:{}", username, host, port);
        debug!("SSH connect START {}", endpoint);

        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| RemoteError::Connection(format!("cannot resolve {}:{}: {}", host, port, e)))?
            .next()
            .ok_or_else(|| RemoteError::Connection(format!("no address found for {}:{}", host, port)))?;

        let tcp = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|e| RemoteError::Connection(format!("TCP connect to {} failed: {}", addr, e)))?;

        let mut session = Session::new()
            .map_err(|e| RemoteError::Connection(format!("SSH session init failed: {}", e)))?;
        session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| RemoteError::Connection(format!("SSH handshake with {} failed: {}", addr, e)))?;

        session
            .userauth_password(username, password)
            .map_err(|e| RemoteError::Authentication(e.to_string()))?;
        if !session.authenticated() {
            return Err(RemoteError::Authentication(format!(
                "server rejected credentials for '{}'",
                username
            )));
        }

        // Listing and streaming downloads need SFTP, but shell-only hosts still
        // work through the command fallbacks.
        let sftp = match session.sftp() {
            Ok(sftp) => Some(sftp),
            Err(e) => {
                warn!("SFTP subsystem unavailable on {}: {}", endpoint, e);
                None
            }
        };

        debug!("SSH connect OK {}", endpoint);
        Ok(Self {
            endpoint,
            session: Some(session),
            sftp,
            timeout,
        })
    }

    fn session(&self) -> RemoteResult<&Session> {
        self.session.as_ref().ok_or(RemoteError::Closed)
    }

    fn sftp(&self) -> RemoteResult<&Sftp> {
        if self.session.is_none() {
            return Err(RemoteError::Closed);
        }
        self.sftp
            .as_ref()
            .ok_or_else(|| RemoteError::Unsupported("SFTP subsystem is not available".to_string()))
    }
}

/// Non-blocking access to both output streams of a running command
trait CommandStreams {
    fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn at_eof(&self) -> bool;
}

impl CommandStreams for Channel {
    fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }

    fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stderr().read(buf)
    }

    fn at_eof(&self) -> bool {
        self.eof()
    }
}

/// Read stdout and stderr until the remote side signals EOF and both streams
/// are empty
fn drain_streams(streams: &mut impl CommandStreams, timeout: Duration) -> io::Result<(Vec<u8>, Vec<u8>)> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut last_activity = Instant::now();

    loop {
        let read = streams.read_stdout(&mut buf);
        let mut progressed = append_available(read, &buf, &mut stdout)?;
        let read = streams.read_stderr(&mut buf);
        progressed |= append_available(read, &buf, &mut stderr)?;

        if progressed {
            last_activity = Instant::now();
            continue;
        }
        if streams.at_eof() {
            return Ok((stdout, stderr));
        }
        if !timeout.is_zero() && last_activity.elapsed() > timeout {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no command output for {:?}", timeout),
            ));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn append_available(read: io::Result<usize>, buf: &[u8], out: &mut Vec<u8>) -> io::Result<bool> {
    match read {
        Ok(0) => Ok(false),
        Ok(n) => {
            out.extend_from_slice(&buf[..n]);
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e),
    }
}

impl Transport for SshTransport {
    fn exec(&mut self, command: &str) -> RemoteResult<CommandOutput> {
        let session = self.session()?;
        let mut channel = session.channel_session()?;
        channel.exec(command)?;

        // Both streams are drained together; reading one to EOF first stalls
        // once the other fills the channel window.
        session.set_blocking(false);
        let drained = drain_streams(&mut channel, self.timeout);
        session.set_blocking(true);
        let (stdout, stderr) = drained?;

        channel.wait_close().ok();
        let exit_status = channel.exit_status().ok();
        debug!("exec '{}' -> status {:?}, {} bytes", command, exit_status, stdout.len());

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_status,
        })
    }

    fn read_dir(&mut self, path: &str) -> RemoteResult<Vec<RemoteEntry>> {
        let entries = self.sftp()?.readdir(Path::new(path))?;
        Ok(entries
            .into_iter()
            .filter_map(|(entry_path, stat)| {
                let name = entry_path.file_name()?.to_string_lossy().into_owned();
                if name == "." || name == ".." {
                    return None;
                }
                Some(RemoteEntry {
                    name,
                    size: stat.size,
                    mtime: stat.mtime,
                    is_dir: stat.is_dir(),
                })
            })
            .collect())
    }

    fn stat(&mut self, path: &str) -> RemoteResult<RemoteStat> {
        let stat = self.sftp()?.stat(Path::new(path))?;
        Ok(RemoteStat {
            size: stat.size,
            mtime: stat.mtime,
            is_dir: stat.is_dir(),
        })
    }

    fn fetch(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        progress: &mut dyn FnMut(u64),
    ) -> RemoteResult<u64> {
        let mut remote = self.sftp()?.open(Path::new(remote_path))?;
        let mut local = File::create(local_path)?;

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut transferred = 0u64;
        loop {
            let n = remote.read(&mut buf)?;
            if n == 0 {
                break;
            }
            local.write_all(&buf[..n])?;
            transferred += n as u64;
            progress(transferred);
        }
        local.flush()?;

        Ok(transferred)
    }

    fn fetch_fallback(&mut self, remote_path: &str, local_path: &Path) -> RemoteResult<u64> {
        let (mut channel, stat) = self.session()?.scp_recv(Path::new(remote_path))?;
        let expected = stat.size();

        let mut local = File::create(local_path)?;
        let copied = io::copy(&mut (&mut channel).take(expected), &mut local)?;
        local.flush()?;

        channel.send_eof().ok();
        channel.wait_eof().ok();
        channel.close().ok();
        channel.wait_close().ok();

        if copied != expected {
            return Err(RemoteError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("SCP transfer of {} ended after {} of {} bytes", remote_path, copied, expected),
            )));
        }
        Ok(copied)
    }

    fn close(&mut self) {
        // Sub-channel first, then the session itself
        self.sftp.take();
        if let Some(session) = self.session.take() {
            if let Err(e) = session.disconnect(None, "wclog closing session", None) {
                debug!("SSH disconnect from {} reported: {}", self.endpoint, e);
            }
            debug!("SSH session to {} closed", self.endpoint);
        }
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

impl Drop for SshTransport {
    fn drop(&mut self) {
        self.close();
    }
}
