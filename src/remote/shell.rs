use super::OsFamily;

/// Quote a path for a POSIX shell
pub fn quote_unix(path: &str) -> String {
    format!("'{}'", path.replace('\'', r"'\''"))
}

/// Quote a path for cmd.exe
pub fn quote_windows(path: &str) -> String {
    format!("\"{}\"", path.replace('"', ""))
}

pub fn quote_path(path: &str, family: OsFamily) -> String {
    match family {
        OsFamily::Windows => quote_windows(path),
        OsFamily::Unix => quote_unix(path),
    }
}

/// Join a directory and a file name using the remote separator
pub fn join_remote(dir: &str, name: &str, family: OsFamily) -> String {
    match family {
        OsFamily::Windows => format!("{}\\{}", dir.trim_end_matches(['\\', '/']), name),
        OsFamily::Unix => {
            if dir.is_empty() {
                name.to_string()
            } else {
                format!("{}/{}", dir.trim_end_matches('/'), name)
            }
        }
    }
}

/// Last path component, accepting both separators
pub fn remote_basename(path: &str) -> String {
    path.trim_end_matches(['\\', '/'])
        .rsplit(['\\', '/'])
        .next()
        .unwrap_or(path)
        .to_string()
}
