use std::fs;
use std::path::Path;
use tracing::{info, warn};

use super::{CollectError, CollectResult};
use crate::remote::{RemoteError, RemoteSession};

/// Download one remote file.
///
/// The primary path stats the file for its size and streams it over the
/// structured sub-channel, reporting `(bytes, total)` as it goes. If that fails
/// the same file is fetched once through the command-based fallback, which only
/// reports 0% and 100%. A lost connection is returned as
/// `CollectError::Connection` without trying the fallback.
pub fn download(
    session: &mut RemoteSession,
    remote_path: &str,
    local_path: &Path,
    on_progress: &mut dyn FnMut(u64, u64),
) -> CollectResult<u64> {
    match download_primary(session, remote_path, local_path, on_progress) {
        Ok(bytes) => {
            info!("Downloaded {} ({} bytes)", remote_path, bytes);
            return Ok(bytes);
        }
        Err(e) => {
            warn!("Primary transfer of {} failed: {}", remote_path, e);
            remove_partial(local_path);
            if e.is_connection_lost() {
                return Err(CollectError::Connection(e));
            }
        }
    }

    info!("Retrying {} with the fallback transfer", remote_path);
    on_progress(0, 100);
    match session.fetch_fallback(remote_path, local_path) {
        Ok(bytes) => {
            on_progress(100, 100);
            info!("Downloaded {} via fallback ({} bytes)", remote_path, bytes);
            Ok(bytes)
        }
        Err(e) => {
            remove_partial(local_path);
            Err(CollectError::from_remote(remote_path, e))
        }
    }
}

fn download_primary(
    session: &mut RemoteSession,
    remote_path: &str,
    local_path: &Path,
    on_progress: &mut dyn FnMut(u64, u64),
) -> Result<u64, RemoteError> {
    let total = session.stat(remote_path)?.size.unwrap_or(0);
    on_progress(0, total);
    session.fetch(remote_path, local_path, &mut |transferred| {
        on_progress(transferred, total.max(transferred))
    })
}

fn remove_partial(local_path: &Path) {
    if local_path.exists() {
        if let Err(e) = fs::remove_file(local_path) {
            warn!("Could not remove partial file {}: {}", local_path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mock::MockTransport;
    use tempfile::TempDir;

    #[test]
    fn test_primary_transfer_reports_granular_progress() {
        let content = vec![b'a'; 5000];
        let mock = MockTransport::new().with_file("/logs/a.log", &content, None);
        let state = mock.state();
        let mut session = RemoteSession::with_transport(Box::new(mock));
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a.log");

        let mut calls = Vec::new();
        let bytes = download(&mut session, "/logs/a.log", &target, &mut |t, total| calls.push((t, total)))
            .unwrap();

        assert_eq!(bytes, 5000);
        assert_eq!(calls.first(), Some(&(0, 5000)));
        assert_eq!(calls.last(), Some(&(5000, 5000)));
        assert!(calls.len() > 2);
        assert!(state.lock().unwrap().fallback_fetches.is_empty());
        assert_eq!(fs::read(&target).unwrap(), content);
    }

    #[test]
    fn test_fallback_after_primary_failure() {
        let mut mock = MockTransport::new().with_file("/logs/a.log", b"hello", None);
        mock.fail_fetch = true;
        let state = mock.state();
        let mut session = RemoteSession::with_transport(Box::new(mock));
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a.log");

        let mut calls = Vec::new();
        download(&mut session, "/logs/a.log", &target, &mut |t, total| calls.push((t, total))).unwrap();

        // the primary attempt announced 0 of 5 before failing
        assert_eq!(calls, vec![(0, 5), (0, 100), (100, 100)]);
        assert_eq!(state.lock().unwrap().fallback_fetches, vec!["/logs/a.log"]);
        assert_eq!(fs::read(&target).unwrap(), b"hello");
    }

    #[test]
    fn test_both_paths_failing_is_a_transfer_error() {
        let mut mock = MockTransport::new().with_file("/logs/a.log", b"hello", None);
        mock.fail_fetch = true;
        mock.fail_fallback = true;
        let mut session = RemoteSession::with_transport(Box::new(mock));
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a.log");

        let err = download(&mut session, "/logs/a.log", &target, &mut |_, _| {}).unwrap_err();
        assert!(matches!(err, CollectError::Transfer { .. }));
        assert!(!target.exists());
    }

    #[test]
    fn test_lost_connection_skips_the_fallback() {
        let mut mock = MockTransport::new().with_file("/logs/a.log", b"hello", None);
        mock.lose_connection_on_fetch = true;
        let state = mock.state();
        let mut session = RemoteSession::with_transport(Box::new(mock));
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a.log");

        let err = download(&mut session, "/logs/a.log", &target, &mut |_, _| {}).unwrap_err();
        assert!(err.is_connection_lost());
        assert!(state.lock().unwrap().fallback_fetches.is_empty());
        assert!(!target.exists());
    }
}
