//! Matching a local path against the `FullName` of open documents

use std::fs::OpenOptions;
use std::path::Path;

/// Canonical Windows form of a path: backslashes, `.`/`..` resolved, repeated
/// separators collapsed and an upper-case drive letter
pub(crate) fn normalize_path(path: &str) -> String {
    let unified = path.trim().replace('/', "\\");
    let (prefix, rest) = if unified.starts_with("\\\\") {
        ("\\\\".to_string(), &unified[2..])
    } else {
        match unified.split_once(':') {
            Some((drive, rest)) if drive.len() == 1 => (format!("{}:", drive.to_ascii_uppercase()), rest),
            _ => (String::new(), unified.as_str()),
        }
    };
    let rooted = rest.starts_with('\\');

    let mut parts: Vec<&str> = Vec::new();
    for part in rest.split('\\') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            part => parts.push(part),
        }
    }

    let mut out = prefix;
    if rooted && !out.starts_with("\\\\") {
        out.push('\\');
    }
    out.push_str(&parts.join("\\"));
    out
}

pub(crate) fn is_web_path(full_name: &str) -> bool {
    let lower = full_name.trim().to_ascii_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://")
}

/// Last component of a local path or URL
pub(crate) fn file_name(path: &str) -> &str {
    let path = path.trim().trim_end_matches(['/', '\\']);
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Whether the file can be opened for writing right now
///
/// A document synced from the web and open in the application is locked, so
/// a failure here is what confirms a web `FullName` refers to this file.
pub(crate) fn is_locally_writable(path: &Path) -> bool {
    OpenOptions::new().write(true).open(path).is_ok()
}

/// Does an open document's `FullName` refer to `host_path`?
///
/// `host_path` is the path as the application sees it; `local_path` is used
/// for the writability check of web-backed documents.
pub(crate) fn matches_document(full_name: &str, host_path: &str, local_path: &Path) -> bool {
    if is_web_path(full_name) {
        let name = file_name(full_name).replace("%20", " ");
        return name.eq_ignore_ascii_case(file_name(host_path)) && !is_locally_writable(local_path);
    }
    normalize_path(full_name).to_lowercase() == normalize_path(host_path).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("c:/Users/me/./Book1.xlsx"), "C:\\Users\\me\\Book1.xlsx");
        assert_eq!(normalize_path("C:\\a\\\\b\\..\\c.xlsx"), "C:\\a\\c.xlsx");
        assert_eq!(normalize_path("z:\\tmp\\..\\..\\x.xlsx"), "Z:\\x.xlsx");
        assert_eq!(normalize_path("\\\\server\\share\\x.xlsx"), "\\\\server\\share\\x.xlsx");
        assert_eq!(normalize_path("dir/../x.xlsx"), "x.xlsx");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for path in ["c:/a/b/../c", "\\\\h\\s\\.\\f", "rel\\..\\..\\f"] {
            let once = normalize_path(path);
            assert_eq!(normalize_path(&once), once);
        }
    }

    #[test]
    fn test_local_documents_match_case_insensitively() {
        let local = Path::new("/nonexistent/book.xlsx");
        assert!(matches_document("C:\\Data\\Book.xlsx", "c:/data/book.XLSX", local));
        assert!(!matches_document("C:\\Data\\Other.xlsx", "C:\\Data\\Book.xlsx", local));
    }

    #[test]
    fn test_web_documents_need_a_locked_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("Budget 2024.xlsx");
        let url = "https://contoso.sharepoint.com/Shared%20Documents/Budget%202024.xlsx";
        let host = "C:\\Sync\\Budget 2024.xlsx";

        // a missing file cannot be opened for writing
        assert!(matches_document(url, host, &local));

        std::fs::write(&local, b"").unwrap();
        assert!(!matches_document(url, host, &local));
        assert!(!matches_document(url, "C:\\Sync\\Other.xlsx", &local));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("https://x/y/Book.xlsx"), "Book.xlsx");
        assert_eq!(file_name("C:\\dir\\Book.xlsx"), "Book.xlsx");
        assert_eq!(file_name("Book.xlsx"), "Book.xlsx");
    }
}
