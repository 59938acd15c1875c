//! Lexical path sanitization.
//!
//! [`normalize`] is the first of two traversal gates; the second, symlink-
//! aware gate lives in [`crate::local::LocalStorage::resolve`]. Fails
//! closed: anything ambiguous is treated as traversal.

use filedepot_core::{AppError, AppResult};

/// Windows device names that must never appear as a path segment, with or
/// without an extension.
const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Normalize a user-supplied path into a clean root-relative form.
///
/// Backslashes fold to `/`, empty and `.` segments collapse, `..` pops the
/// previous segment and fails with `PathTraversal` when there is nothing
/// left to pop. NUL bytes, `:` (drive letters, alternate data streams), and
/// reserved device names are rejected outright. The result never starts or
/// ends with a separator; the storage root itself normalizes to `""`.
pub fn normalize(user_path: &str) -> AppResult<String> {
    if user_path.contains('\0') {
        return Err(AppError::path_traversal("Path contains a NUL byte"));
    }

    let cleaned = user_path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();

    for segment in cleaned.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if segments.pop().is_none() {
                    return Err(AppError::path_traversal(format!(
                        "Path escapes the storage root: {user_path}"
                    )));
                }
            }
            seg => {
                validate_segment(seg)?;
                segments.push(seg);
            }
        }
    }

    Ok(segments.join("/"))
}

/// Normalize and require the result to be non-empty (i.e. not the root).
pub fn normalize_non_root(user_path: &str) -> AppResult<String> {
    let normalized = normalize(user_path)?;
    if normalized.is_empty() {
        return Err(AppError::validation(
            "The storage root itself cannot be the target of this operation",
        ));
    }
    Ok(normalized)
}

/// The folder string stored on file records: `"/"` for the root, otherwise
/// the normalized relative path.
pub fn folder_key(normalized: &str) -> String {
    if normalized.is_empty() {
        "/".to_string()
    } else {
        normalized.to_string()
    }
}

/// Join a record folder key and filename back into a normalized relative
/// path.
pub fn join_folder(folder_key: &str, filename: &str) -> AppResult<String> {
    let folder = normalize(folder_key)?;
    validate_segment(filename)?;
    if filename.is_empty() || filename == "." || filename == ".." || filename.contains('/') {
        return Err(AppError::path_traversal(format!(
            "Invalid filename: {filename}"
        )));
    }
    if folder.is_empty() {
        Ok(filename.to_string())
    } else {
        Ok(format!("{folder}/{filename}"))
    }
}

fn validate_segment(segment: &str) -> AppResult<()> {
    if segment.contains(':') {
        return Err(AppError::path_traversal(format!(
            "Path segment contains a reserved character: {segment}"
        )));
    }
    let stem = segment.split('.').next().unwrap_or(segment);
    if RESERVED_NAMES
        .iter()
        .any(|r| r.eq_ignore_ascii_case(stem))
    {
        return Err(AppError::path_traversal(format!(
            "Reserved file name: {segment}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filedepot_core::ErrorKind;

    #[test]
    fn test_normalize_plain_paths() {
        assert_eq!(normalize("/Operation/report.pdf").unwrap(), "Operation/report.pdf");
        assert_eq!(normalize("Operation//Subteam/").unwrap(), "Operation/Subteam");
        assert_eq!(normalize("/").unwrap(), "");
        assert_eq!(normalize("").unwrap(), "");
        assert_eq!(normalize("./a/./b").unwrap(), "a/b");
    }

    #[test]
    fn test_dotdot_within_bounds_collapses() {
        assert_eq!(normalize("a/b/../c").unwrap(), "a/c");
    }

    #[test]
    fn test_escape_attempts_fail_closed() {
        for path in [
            "/Operation/../../etc/passwd",
            "../etc/passwd",
            "a/../../b",
            "..\\..\\windows\\system32",
        ] {
            let err = normalize(path).unwrap_err();
            assert_eq!(err.kind, ErrorKind::PathTraversal, "path: {path}");
        }
    }

    #[test]
    fn test_null_bytes_and_drive_letters_rejected() {
        assert_eq!(
            normalize("a\0b").unwrap_err().kind,
            ErrorKind::PathTraversal
        );
        assert_eq!(
            normalize("C:/windows").unwrap_err().kind,
            ErrorKind::PathTraversal
        );
    }

    #[test]
    fn test_reserved_names_rejected() {
        for path in ["CON", "con.pdf", "Operation/NUL.docx", "lpt1"] {
            let err = normalize(path).unwrap_err();
            assert_eq!(err.kind, ErrorKind::PathTraversal, "path: {path}");
        }
    }

    #[test]
    fn test_folder_key_round_trip() {
        assert_eq!(folder_key(""), "/");
        assert_eq!(folder_key("Operation"), "Operation");
        assert_eq!(join_folder("/", "a.pdf").unwrap(), "a.pdf");
        assert_eq!(
            join_folder("Operation/Subteam", "a.pdf").unwrap(),
            "Operation/Subteam/a.pdf"
        );
        assert!(join_folder("Operation", "../a.pdf").is_err());
        assert!(join_folder("Operation", "b/a.pdf").is_err());
    }
}
