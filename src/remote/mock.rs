//! Scripted in-memory transport for tests

use super::{CommandOutput, RemoteEntry, RemoteError, RemoteResult, RemoteStat, Transport};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Everything the mock was asked to do
#[derive(Debug, Default)]
pub struct MockState {
    pub commands: Vec<String>,
    pub stats: Vec<String>,
    pub fetches: Vec<String>,
    pub fallback_fetches: Vec<String>,
    pub closed: usize,
}

#[derive(Debug, Clone)]
struct MockFile {
    content: Vec<u8>,
    mtime: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    files: BTreeMap<String, MockFile>,
    listings: BTreeMap<String, Vec<String>>,
    responses: HashMap<String, CommandOutput>,
    pub fail_fetch: bool,
    pub fail_fallback: bool,
    pub fail_stat: bool,
    /// Primary transfers fail as if the peer reset the connection
    pub lose_connection_on_fetch: bool,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Arc<Mutex<MockState>> {
        Arc::clone(&self.state)
    }

    pub fn with_file(mut self, path: &str, content: &[u8], mtime: Option<u64>) -> Self {
        self.files.insert(
            path.to_string(),
            MockFile {
                content: content.to_vec(),
                mtime,
            },
        );
        self
    }

    /// Make `path` listable through `read_dir` with the given entry names
    pub fn with_listing(mut self, path: &str, names: &[&str]) -> Self {
        self.listings
            .insert(path.to_string(), names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn with_response(self, command: &str, stdout: &str) -> Self {
        self.with_output(command, stdout, "")
    }

    pub fn with_output(mut self, command: &str, stdout: &str, stderr: &str) -> Self {
        self.responses.insert(
            command.to_string(),
            CommandOutput {
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
                exit_status: Some(if stderr.is_empty() { 0 } else { 1 }),
            },
        );
        self
    }

    fn lookup(&self, path: &str) -> RemoteResult<&MockFile> {
        self.files.get(path).ok_or_else(|| {
            RemoteError::Io(io::Error::new(io::ErrorKind::NotFound, format!("no such file: {}", path)))
        })
    }
}

impl Transport for MockTransport {
    fn exec(&mut self, command: &str) -> RemoteResult<CommandOutput> {
        self.state.lock().unwrap().commands.push(command.to_string());
        self.responses
            .get(command)
            .cloned()
            .ok_or_else(|| RemoteError::CommandFailed(format!("unknown command: {}", command)))
    }

    fn read_dir(&mut self, path: &str) -> RemoteResult<Vec<RemoteEntry>> {
        let names = self
            .listings
            .get(path)
            .ok_or_else(|| RemoteError::Unsupported(format!("no listing for {}", path)))?;
        Ok(names
            .iter()
            .map(|name| {
                let full = format!("{}/{}", path.trim_end_matches('/'), name);
                let file = self.files.get(&full);
                RemoteEntry {
                    name: name.clone(),
                    size: file.map(|f| f.content.len() as u64),
                    mtime: file.and_then(|f| f.mtime),
                    is_dir: false,
                }
            })
            .collect())
    }

    fn stat(&mut self, path: &str) -> RemoteResult<RemoteStat> {
        self.state.lock().unwrap().stats.push(path.to_string());
        if self.fail_stat {
            return Err(RemoteError::Unsupported("stat disabled".to_string()));
        }
        let file = self.lookup(path)?;
        Ok(RemoteStat {
            size: Some(file.content.len() as u64),
            mtime: file.mtime,
            is_dir: false,
        })
    }

    fn fetch(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        progress: &mut dyn FnMut(u64),
    ) -> RemoteResult<u64> {
        self.state.lock().unwrap().fetches.push(remote_path.to_string());
        if self.lose_connection_on_fetch {
            return Err(RemoteError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        if self.fail_fetch {
            return Err(RemoteError::Unsupported("primary transfer disabled".to_string()));
        }
        let content = self.lookup(remote_path)?.content.clone();
        fs::write(local_path, &content)?;
        let mut sent = 0u64;
        for chunk in content.chunks(1024) {
            sent += chunk.len() as u64;
            progress(sent);
        }
        Ok(sent)
    }

    fn fetch_fallback(&mut self, remote_path: &str, local_path: &Path) -> RemoteResult<u64> {
        self.state
            .lock()
            .unwrap()
            .fallback_fetches
            .push(remote_path.to_string());
        if self.fail_fallback {
            return Err(RemoteError::CommandFailed("scp disabled".to_string()));
        }
        let content = self.lookup(remote_path)?.content.clone();
        fs::write(local_path, &content)?;
        Ok(content.len() as u64)
    }

    fn close(&mut self) {
        self.state.lock().unwrap().closed += 1;
    }

    fn endpoint(&self) -> String {
        "mock".to_string()
    }
}
