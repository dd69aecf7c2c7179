//! Remote directory listing.
//!
//! Structured SFTP listing first, then `dir`/`ls` output parsing, then the
//! configured path itself as a single file.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::{is_supported_file, CollectError, CollectResult};
use super::types::{FileDescriptor, Listing};
use crate::remote::shell::{join_remote, quote_path, remote_basename};
use crate::remote::{OsFamily, RemoteSession};

/// Banner markers that precede the file table in `dir` output
const DIR_MARKER_EN: &str = "Directory of";
const DIR_MARKER_ZH: &str = "的目录";

/// Enumerate files under `path`.
///
/// Listing problems fall through to the next strategy, the last resort being a
/// single-file listing. Only a lost connection is returned as an error.
pub fn list_files(session: &mut RemoteSession, path: &str, family: OsFamily) -> CollectResult<Listing> {
    match session.read_dir(path) {
        Ok(entries) => {
            let files: Vec<FileDescriptor> = entries
                .into_iter()
                .filter(|e| !e.is_dir)
                .map(|e| FileDescriptor {
                    remote_path: join_remote(path, &e.name, family),
                    name: e.name,
                    size: e.size,
                    modified: None,
                    mtime: e.mtime,
                    directory: path.to_string(),
                    from_directory: true,
                })
                .collect();
            info!("Found {} files in directory {}", files.len(), path);
            return Ok(Listing::Directory(files));
        }
        Err(e) if e.is_connection_lost() => return Err(CollectError::Connection(e)),
        Err(e) => warn!("Structured listing of {} failed: {}", path, e),
    }

    match list_with_shell(session, path, family) {
        Ok(listing) => Ok(listing),
        Err(err) if err.is_connection_lost() => Err(err),
        Err(err) => {
            warn!("{}; treating the path as a single file", err);
            Ok(Listing::SingleFile(single_file(path)))
        }
    }
}

/// List `path` and keep only supported files; an empty result is logged, not fatal
pub fn collect_candidates(
    session: &mut RemoteSession,
    path: &str,
    family: OsFamily,
) -> CollectResult<Vec<FileDescriptor>> {
    let files: Vec<FileDescriptor> = list_files(session, path, family)?
        .into_files()
        .into_iter()
        .filter(|f| is_supported_file(&f.name))
        .collect();

    if files.is_empty() {
        warn!("No supported log files found in {}", path);
    } else {
        info!("Found {} supported log files in {}", files.len(), path);
    }
    Ok(files)
}

fn single_file(path: &str) -> FileDescriptor {
    let directory = path
        .trim_end_matches(['\\', '/'])
        .rsplit_once(['\\', '/'])
        .map(|(dir, _)| dir.to_string())
        .unwrap_or_default();
    FileDescriptor {
        name: remote_basename(path),
        remote_path: path.to_string(),
        size: None,
        modified: None,
        mtime: None,
        directory,
        from_directory: false,
    }
}

fn list_with_shell(session: &mut RemoteSession, path: &str, family: OsFamily) -> CollectResult<Listing> {
    let quoted = quote_path(path, family);
    let command = match family {
        OsFamily::Windows => format!("dir {}", quoted),
        OsFamily::Unix => format!(
            "ls -la --time-style=long-iso {q} 2>/dev/null || ls -la {q}",
            q = quoted
        ),
    };

    let output = session.exec_command(&command).map_err(|e| {
        if e.is_connection_lost() {
            CollectError::Connection(e)
        } else {
            CollectError::Listing {
                path: path.to_string(),
                reason: e.to_string(),
            }
        }
    })?;
    if output.is_error_only() {
        return Err(CollectError::Listing {
            path: path.to_string(),
            reason: output.stderr_text().trim().to_string(),
        });
    }

    let text = output.stdout_text();
    let listing = match family {
        OsFamily::Windows => parse_dir_output(&text, path),
        OsFamily::Unix => parse_ls_output(&text, path),
    };
    if let Listing::Directory(files) = &listing {
        debug!("Shell listing of {} returned {} files", path, files.len());
    }
    Ok(listing)
}

/// Parse cmd.exe `dir` output.
///
/// Everything before the "Directory of" line is banner. File lines look like
/// `01/05/2024  10:00 AM     1,234 app log.log`; the name is every token after
/// the size, re-joined with single spaces.
pub fn parse_dir_output(output: &str, requested: &str) -> Listing {
    let mut directory: Option<String> = None;
    let mut files = Vec::new();

    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(idx) = trimmed.find(DIR_MARKER_EN) {
            directory = Some(trimmed[idx + DIR_MARKER_EN.len()..].trim().to_string());
            continue;
        }
        if let Some(dir) = trimmed.strip_suffix(DIR_MARKER_ZH) {
            directory = Some(dir.trim().to_string());
            continue;
        }
        let Some(dir) = directory.as_deref() else {
            continue;
        };
        if let Some(file) = parse_dir_line(trimmed, dir) {
            files.push(file);
        }
    }

    let listed_dir = directory.unwrap_or_else(|| requested.to_string());
    let same_dir = listed_dir.trim_end_matches('\\').eq_ignore_ascii_case(requested.trim_end_matches(['\\', '/']));
    if !same_dir && files.len() == 1 && files[0].name.eq_ignore_ascii_case(&remote_basename(requested)) {
        // `dir` on a file lists its parent directory
        let mut file = files.remove(0);
        file.from_directory = false;
        return Listing::SingleFile(file);
    }
    Listing::Directory(files)
}

fn looks_like_date(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_ascii_digit())
        && token.contains(['/', '-', '.'])
}

fn parse_dir_line(line: &str, directory: &str) -> Option<FileDescriptor> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 || !looks_like_date(tokens[0]) {
        return None;
    }

    let mut idx = 1;
    let mut time = Vec::new();
    while idx < tokens.len()
        && (tokens[idx].contains(':') || matches!(tokens[idx], "AM" | "PM" | "上午" | "下午"))
    {
        time.push(tokens[idx]);
        idx += 1;
    }
    let size_token = *tokens.get(idx)?;
    if size_token.starts_with('<') {
        return None;
    }
    let size: u64 = size_token.replace([',', '.'], "").parse().ok()?;
    let name = tokens[idx + 1..].join(" ");
    if name.is_empty() {
        return None;
    }

    Some(FileDescriptor {
        remote_path: join_remote(directory, &name, OsFamily::Windows),
        name,
        size: Some(size),
        modified: Some(format!("{} {}", tokens[0], time.join(" "))),
        mtime: None,
        directory: directory.to_string(),
        from_directory: true,
    })
}

/// Parse `ls -la` output in long-iso or default time style
pub fn parse_ls_output(output: &str, requested: &str) -> Listing {
    let mut files = Vec::new();

    for line in output.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 8 || tokens[0] == "total" {
            continue;
        }
        let kind = tokens[0].chars().next().unwrap_or('?');
        if kind != '-' && kind != 'l' {
            continue;
        }
        let size = tokens[4].parse::<u64>().ok();

        let long_iso = NaiveDate::parse_from_str(tokens[5], "%Y-%m-%d").is_ok();
        let (modified, name_start) = if long_iso {
            (format!("{} {}", tokens[5], tokens[6]), 7)
        } else {
            if tokens.len() < 9 {
                continue;
            }
            (tokens[5..8].join(" "), 8)
        };

        let mut name = tokens[name_start..].join(" ");
        if kind == 'l' {
            if let Some((link, _)) = name.split_once(" -> ") {
                name = link.to_string();
            }
        }

        // `ls` on a file prints the path it was given
        if name.contains('/') {
            return Listing::SingleFile(FileDescriptor {
                modified: Some(modified),
                size,
                ..single_file(requested)
            });
        }

        files.push(FileDescriptor {
            remote_path: join_remote(requested, &name, OsFamily::Unix),
            name,
            size,
            modified: Some(modified),
            mtime: None,
            directory: requested.to_string(),
            from_directory: true,
        });
    }

    Listing::Directory(files)
}
