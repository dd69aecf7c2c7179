use super::{CommandOutput, RemoteEntry, RemoteResult, RemoteStat, Transport};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::process::Command;
use std::time::UNIX_EPOCH;
use tracing::debug;

/// Transport over the local filesystem and the local shell.
///
/// Paths handed to it are plain local paths; everything else in a job behaves
/// exactly as it would against a remote host.
#[derive(Debug, Default)]
pub struct LocalTransport {
    closed: bool,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self { closed: false }
    }
}

fn mtime_secs(metadata: &fs::Metadata) -> Option<u64> {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
}

impl Transport for LocalTransport {
    fn exec(&mut self, command: &str) -> RemoteResult<CommandOutput> {
        let output = if cfg!(windows) {
            Command::new("cmd").arg("/C").arg(command).output()?
        } else {
            Command::new("sh").arg("-c").arg(command).output()?
        };
        debug!("local exec '{}' -> {:?}", command, output.status.code());

        Ok(CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_status: output.status.code(),
        })
    }

    fn read_dir(&mut self, path: &str) -> RemoteResult<Vec<RemoteEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            entries.push(RemoteEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: Some(metadata.len()),
                mtime: mtime_secs(&metadata),
                is_dir: metadata.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn stat(&mut self, path: &str) -> RemoteResult<RemoteStat> {
        let metadata = fs::metadata(path)?;
        Ok(RemoteStat {
            size: Some(metadata.len()),
            mtime: mtime_secs(&metadata),
            is_dir: metadata.is_dir(),
        })
    }

    fn fetch(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        progress: &mut dyn FnMut(u64),
    ) -> RemoteResult<u64> {
        let mut source = File::open(remote_path)?;
        let mut target = File::create(local_path)?;

        let mut buf = vec![0u8; 64 * 1024];
        let mut transferred = 0u64;
        loop {
            let n = source.read(&mut buf)?;
            if n == 0 {
                break;
            }
            target.write_all(&buf[..n])?;
            transferred += n as u64;
            progress(transferred);
        }
        target.flush()?;
        Ok(transferred)
    }

    fn fetch_fallback(&mut self, remote_path: &str, local_path: &Path) -> RemoteResult<u64> {
        Ok(fs::copy(remote_path, local_path)?)
    }

    fn close(&mut self) {
        if !self.closed {
            debug!("local transport closed");
            self.closed = true;
        }
    }

    fn endpoint(&self) -> String {
        "local filesystem".to_string()
    }
}
