use super::{
    CommandOutput, OsFamily, RemoteEntry, RemoteError, RemoteResult, RemoteStat, SshTransport,
    Transport,
};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};

/// Default timeout for TCP connect and blocking SSH operations
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Marker printed by `ver` on Windows hosts
const WINDOWS_MARKER: &str = "Windows";

/// An open connection to one host, exclusively owned by the job using it.
///
/// The OS family is probed once and cached for the lifetime of the session;
/// it is never re-detected, even if the first answer was wrong.
///
/// Once any call reports that the connection is gone the session is marked
/// lost and every later call fails with `RemoteError::Connection`.
pub struct RemoteSession {
    transport: Box<dyn Transport>,
    os_family: Option<OsFamily>,
    closed: bool,
    lost: bool,
}

impl RemoteSession {
    /// Connect over SSH with username/password authentication
    pub fn connect(host: &str, port: u16, username: &str, password: &str) -> RemoteResult<Self> {
        Self::connect_with_timeout(host, port, username, password, DEFAULT_TIMEOUT)
    }

    pub fn connect_with_timeout(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let transport = SshTransport::connect(host, port, username, password, timeout)?;
        info!("Connected to server {}", host);
        Ok(Self::with_transport(Box::new(transport)))
    }

    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            os_family: None,
            closed: false,
            lost: false,
        }
    }

    pub fn endpoint(&self) -> String {
        self.transport.endpoint()
    }

    /// Cached OS family, if already detected
    pub fn os_family(&self) -> Option<OsFamily> {
        self.os_family
    }

    /// Probe the remote shell: `ver` first, then `uname`, defaulting to Unix.
    pub fn detect_os_family(&mut self) -> OsFamily {
        if let Some(family) = self.os_family {
            return family;
        }

        let family = match self.exec_command("ver") {
            Ok(output) if output.stdout_text().contains(WINDOWS_MARKER) => OsFamily::Windows,
            probe => {
                if let Err(e) = probe {
                    debug!("Windows probe failed: {}", e);
                }
                match self.exec_command("uname") {
                    Ok(output) => debug!("uname reported '{}'", output.stdout_text().trim()),
                    Err(e) => debug!("uname probe failed, assuming Unix: {}", e),
                }
                OsFamily::Unix
            }
        };

        info!("Remote system type: {}", family);
        self.os_family = Some(family);
        family
    }

    /// Fails when the session was closed or its connection was lost
    pub fn ensure_connected(&self) -> RemoteResult<()> {
        if self.closed {
            Err(RemoteError::Closed)
        } else if self.lost {
            Err(RemoteError::Connection(format!(
                "connection to {} was lost",
                self.transport.endpoint()
            )))
        } else {
            Ok(())
        }
    }

    fn track<T>(&mut self, result: RemoteResult<T>) -> RemoteResult<T> {
        if let Err(e) = &result {
            if !self.lost && e.is_connection_lost() {
                error!("Connection to {} lost: {}", self.transport.endpoint(), e);
                self.lost = true;
            }
        }
        result
    }

    /// Run a command and return its raw stdout/stderr; decoding is up to the caller
    pub fn exec_command(&mut self, command: &str) -> RemoteResult<CommandOutput> {
        self.ensure_connected()?;
        let result = self.transport.exec(command);
        self.track(result)
    }

    pub fn read_dir(&mut self, path: &str) -> RemoteResult<Vec<RemoteEntry>> {
        self.ensure_connected()?;
        let result = self.transport.read_dir(path);
        self.track(result)
    }

    pub fn stat(&mut self, path: &str) -> RemoteResult<RemoteStat> {
        self.ensure_connected()?;
        let result = self.transport.stat(path);
        self.track(result)
    }

    pub fn fetch(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        progress: &mut dyn FnMut(u64),
    ) -> RemoteResult<u64> {
        self.ensure_connected()?;
        let result = self.transport.fetch(remote_path, local_path, progress);
        self.track(result)
    }

    pub fn fetch_fallback(&mut self, remote_path: &str, local_path: &Path) -> RemoteResult<u64> {
        self.ensure_connected()?;
        let result = self.transport.fetch_fallback(remote_path, local_path);
        self.track(result)
    }

    /// Release the transport; safe to call any number of times
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.transport.close();
        self.closed = true;
        info!("Connection to {} closed", self.transport.endpoint());
    }
}

impl Drop for RemoteSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mock::MockTransport;

    #[test]
    fn test_detects_windows_from_ver() {
        let mock = MockTransport::new().with_response("ver", "\r\nMicrosoft Windows [Version 10.0.19045]\r\n");
        let state = mock.state();
        let mut session = RemoteSession::with_transport(Box::new(mock));

        assert_eq!(session.detect_os_family(), OsFamily::Windows);
        assert_eq!(state.lock().unwrap().commands, vec!["ver"]);
    }

    #[test]
    fn test_falls_back_to_unix() {
        let mock = MockTransport::new().with_response("uname", "Linux\n");
        let state = mock.state();
        let mut session = RemoteSession::with_transport(Box::new(mock));

        assert_eq!(session.detect_os_family(), OsFamily::Unix);
        assert_eq!(state.lock().unwrap().commands, vec!["ver", "uname"]);
    }

    #[test]
    fn test_both_probes_failing_defaults_to_unix() {
        let mut session = RemoteSession::with_transport(Box::new(MockTransport::new()));
        assert_eq!(session.detect_os_family(), OsFamily::Unix);
    }

    #[test]
    fn test_detection_is_cached() {
        let mock = MockTransport::new().with_response("ver", "Microsoft Windows [Version 6.1]");
        let state = mock.state();
        let mut session = RemoteSession::with_transport(Box::new(mock));

        session.detect_os_family();
        session.detect_os_family();
        session.detect_os_family();

        assert_eq!(state.lock().unwrap().commands.len(), 1);
        assert_eq!(session.os_family(), Some(OsFamily::Windows));
    }

    #[test]
    fn test_close_is_idempotent_and_blocks_further_use() {
        let mock = MockTransport::new().with_response("uname", "Linux");
        let state = mock.state();
        let mut session = RemoteSession::with_transport(Box::new(mock));

        session.close();
        session.close();
        drop(session);

        assert_eq!(state.lock().unwrap().closed, 1);
    }

    #[test]
    fn test_lost_connection_fails_every_later_call() {
        let mut mock = MockTransport::new()
            .with_file("/logs/a.log", b"a", None)
            .with_response("uname", "Linux");
        mock.lose_connection_on_fetch = true;
        let state = mock.state();
        let mut session = RemoteSession::with_transport(Box::new(mock));

        assert!(session.ensure_connected().is_ok());
        let err = session.fetch("/logs/a.log", Path::new("/nonexistent/a.log"), &mut |_| {}).unwrap_err();
        assert!(err.is_connection_lost());

        assert!(matches!(session.ensure_connected(), Err(RemoteError::Connection(_))));
        assert!(matches!(session.exec_command("uname"), Err(RemoteError::Connection(_))));
        assert!(matches!(session.stat("/logs/a.log"), Err(RemoteError::Connection(_))));
        // the later calls never reached the transport
        assert!(state.lock().unwrap().commands.is_empty());
        assert!(state.lock().unwrap().stats.is_empty());
    }

    #[test]
    fn test_ordinary_failures_keep_the_session_usable() {
        let mock = MockTransport::new().with_response("uname", "Linux");
        let mut session = RemoteSession::with_transport(Box::new(mock));

        assert!(session.exec_command("no-such-command").is_err());
        assert!(session.ensure_connected().is_ok());
        assert!(session.exec_command("uname").is_ok());
    }

    #[test]
    fn test_exec_after_close_fails() {
        let mut session = RemoteSession::with_transport(Box::new(MockTransport::new()));
        session.close();
        assert!(matches!(session.exec_command("uname"), Err(RemoteError::Closed)));
        assert!(matches!(session.ensure_connected(), Err(RemoteError::Closed)));
    }
}
