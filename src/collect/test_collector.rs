#[cfg(test)]
mod tests {
    use crate::collect::*;
    use crate::remote::mock::MockTransport;
    use crate::remote::{LocalTransport, RemoteSession};
    use crate::search::archive::read_archive;
    use chrono::NaiveDate;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn profile(paths: &[&str]) -> HostProfile {
        HostProfile {
            name: "lane-01".to_string(),
            host: "localhost".to_string(),
            port: 22,
            username: "tester".to_string(),
            password: String::new(),
            log_paths: paths.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn local_session() -> RemoteSession {
        RemoteSession::with_transport(Box::new(LocalTransport::new()))
    }

    fn path_str(p: &Path) -> &str {
        p.to_str().unwrap()
    }

    #[test]
    fn test_collects_only_files_in_range() {
        let remote = TempDir::new().unwrap();
        fs::write(remote.path().join("app_2024-01-01.log"), "10:00:00 boot\n").unwrap();
        fs::write(remote.path().join("app_2024-01-05.log"), "10:00:00 later\n").unwrap();
        fs::write(remote.path().join("notes.txt"), "ignored").unwrap();
        let output = TempDir::new().unwrap();

        let range = DateRange::new(date("2024-01-01"), date("2024-01-03")).unwrap();
        let job = CollectionJob::new(profile(&[path_str(remote.path())]), output.path())
            .with_date_range(Some(range));
        let mut session = local_session();

        let report = LogCollector::new(job).run(&mut session, &mut |_, _, _| {}).unwrap();

        let archive = report.archive.expect("archive produced");
        assert_eq!(archive, output.path().join("wcLog_2024-01-03.zip"));
        assert_eq!(report.downloaded.len(), 1);
        assert_eq!(report.skipped_by_date, 1);

        let entries = read_archive(&archive).unwrap();
        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["app_2024-01-01.log"]);

        // only the archive is left in the output directory
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_single_zip_result_is_passed_through() {
        let remote = TempDir::new().unwrap();
        let bytes = b"PK\x03\x04 pretend bundle".to_vec();
        fs::write(remote.path().join("lane_2024-01-02.zip"), &bytes).unwrap();
        let output = TempDir::new().unwrap();

        let job = CollectionJob::new(profile(&[path_str(remote.path())]), output.path())
            .with_date_range(Some(DateRange::single(date("2024-01-02"))));
        let mut session = local_session();

        let report = LogCollector::new(job).run(&mut session, &mut |_, _, _| {}).unwrap();
        let archive = report.archive.unwrap();
        assert_eq!(archive.file_name().unwrap(), "wcLog_2024-01-02.zip");
        assert_eq!(fs::read(archive).unwrap(), bytes);
    }

    #[test]
    fn test_nothing_matched_returns_no_archive() {
        let remote = TempDir::new().unwrap();
        fs::write(remote.path().join("app_2023-06-01.log"), "old").unwrap();
        let output = TempDir::new().unwrap();

        let job = CollectionJob::new(profile(&[path_str(remote.path())]), output.path())
            .with_date_range(Some(DateRange::single(date("2024-01-02"))));
        let mut session = local_session();

        let report = LogCollector::new(job).run(&mut session, &mut |_, _, _| {}).unwrap();
        assert!(report.archive.is_none());
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_file_does_not_stop_the_job() {
        // b is listed but missing, so both transfer paths fail for it
        let mock = MockTransport::new()
            .with_file("/logs/a_2024-01-01.log", b"10:00:00 a", None)
            .with_listing("/logs", &["a_2024-01-01.log", "b_2024-01-01.log"])
            .with_response("uname", "Linux");
        let output = TempDir::new().unwrap();
        let job = CollectionJob::new(profile(&["/logs", "/missing"]), output.path());
        let mut session = RemoteSession::with_transport(Box::new(mock));

        let report = LogCollector::new(job).run(&mut session, &mut |_, _, _| {}).unwrap();

        assert_eq!(report.downloaded, vec!["/logs/a_2024-01-01.log"]);
        assert_eq!(report.failed, vec!["/logs/b_2024-01-01.log"]);
        assert_eq!(report.empty_paths, vec!["/missing"]);
        assert!(report.archive.is_some());
    }

    #[test]
    fn test_repeated_remote_path_is_fetched_once_per_job() {
        let mock = MockTransport::new()
            .with_file("/logs/a.log", b"10:00:00 a", None)
            .with_listing("/logs", &["a.log"]);
        let state = mock.state();
        let output = TempDir::new().unwrap();

        // no cache configured: the job itself must not download /logs/a.log twice
        let job = CollectionJob::new(profile(&["/logs", "/logs"]), output.path());
        let mut session = RemoteSession::with_transport(Box::new(mock));

        let report = LogCollector::new(job).run(&mut session, &mut |_, _, _| {}).unwrap();

        assert_eq!(state.lock().unwrap().fetches, vec!["/logs/a.log"]);
        assert_eq!(report.downloaded.len(), 2);
        assert_eq!(report.bytes_transferred, 10);
        let entries = read_archive(&report.archive.unwrap()).unwrap();
        assert_eq!(entries.get("a.log").map(String::as_str), Some("10:00:00 a"));
        assert_eq!(entries.get("dir_2/a.log").map(String::as_str), Some("10:00:00 a"));
    }

    #[test]
    fn test_cache_serves_later_runs() {
        let mock = MockTransport::new()
            .with_file("/logs/a.log", b"10:00:00 a", None)
            .with_listing("/logs", &["a.log"]);
        let state = mock.state();
        let cache_dir = TempDir::new().unwrap();
        let mut session = RemoteSession::with_transport(Box::new(mock));

        let mut reports = Vec::new();
        for _ in 0..2 {
            let output = TempDir::new().unwrap();
            let job = CollectionJob::new(profile(&["/logs"]), output.path()).with_cache(true);
            let collector = LogCollector::new(job).with_cache(LogCache::new(cache_dir.path()));
            let report = collector.run(&mut session, &mut |_, _, _| {}).unwrap();
            assert!(report.archive.is_some());
            reports.push(report);
        }

        assert_eq!(state.lock().unwrap().fetches.len(), 1);
        assert_eq!(reports[0].bytes_transferred, 10);
        // served from the cache, nothing crossed the network
        assert_eq!(reports[1].bytes_transferred, 0);
        assert_eq!(reports[1].downloaded, vec!["/logs/a.log"]);
    }

    #[test]
    fn test_closed_session_fails_the_job() {
        let mock = MockTransport::new()
            .with_file("/logs/a.log", b"10:00:00 a", None)
            .with_listing("/logs", &["a.log"]);
        let state = mock.state();
        let output = TempDir::new().unwrap();
        let job = CollectionJob::new(profile(&["/logs"]), output.path());
        let mut session = RemoteSession::with_transport(Box::new(mock));
        session.close();

        let err = LogCollector::new(job).run(&mut session, &mut |_, _, _| {}).unwrap_err();

        assert!(matches!(err, CollectError::Connection(_)));
        assert!(state.lock().unwrap().fetches.is_empty());
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_connection_lost_mid_job_fails_the_job() {
        let mut mock = MockTransport::new()
            .with_file("/logs/a.log", b"10:00:00 a", None)
            .with_file("/logs/b.log", b"10:00:00 b", None)
            .with_listing("/logs", &["a.log", "b.log"])
            .with_response("uname", "Linux");
        mock.lose_connection_on_fetch = true;
        let state = mock.state();
        let output = TempDir::new().unwrap();
        let job = CollectionJob::new(profile(&["/logs", "/more"]), output.path());
        let mut session = RemoteSession::with_transport(Box::new(mock));

        let err = LogCollector::new(job).run(&mut session, &mut |_, _, _| {}).unwrap_err();

        assert!(err.is_connection_lost());
        let state = state.lock().unwrap();
        // the job stopped at the first file: no fallback, no second file, no second path
        assert_eq!(state.fetches, vec!["/logs/a.log"]);
        assert!(state.fallback_fetches.is_empty());
        // working directory cleaned up, no archive
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_progress_is_reported_per_file() {
        let mock = MockTransport::new()
            .with_file("/logs/a.log", &[b'x'; 3000], None)
            .with_listing("/logs", &["a.log"]);
        let output = TempDir::new().unwrap();
        let job = CollectionJob::new(profile(&["/logs"]), output.path());
        let mut session = RemoteSession::with_transport(Box::new(mock));

        let mut seen = Vec::new();
        LogCollector::new(job)
            .run(&mut session, &mut |name, done, total| seen.push((name.to_string(), done, total)))
            .unwrap();

        assert!(seen.iter().all(|(name, _, _)| name == "a.log"));
        assert_eq!(seen.last().unwrap(), &("a.log".to_string(), 3000, 3000));
    }
}
