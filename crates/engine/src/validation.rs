use std::path::{Component, Path};

use crate::EngineError;

/// Validates a client-supplied file name for use in a stored upload name.
///
/// The stored name is always a single path component under the uploads
/// directory, so anything that is not a plain file name is rejected:
/// empty names, absolute paths, parent-directory traversal, Windows prefix
/// components, and names containing directory separators.
pub fn sanitize_file_name(file_name: &str) -> Result<String, EngineError> {
    if file_name.is_empty() {
        return Err(EngineError::InvalidFileName("empty file name".into()));
    }

    let path = Path::new(file_name);
    if path.is_absolute() {
        return Err(EngineError::InvalidFileName(format!(
            "absolute path not allowed: {file_name}"
        )));
    }

    let mut name = None;
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(EngineError::InvalidFileName(format!(
                    "parent directory traversal not allowed: {file_name}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(EngineError::InvalidFileName(format!(
                    "path prefix not allowed: {file_name}"
                )));
            }
            Component::CurDir => {}
            Component::Normal(part) => {
                if name.is_some() {
                    return Err(EngineError::InvalidFileName(format!(
                        "directory separators not allowed: {file_name}"
                    )));
                }
                name = Some(part);
            }
        }
    }

    match name.and_then(|n| n.to_str()) {
        Some(n) => Ok(n.to_string()),
        None => Err(EngineError::InvalidFileName(format!(
            "no usable file name in: {file_name}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_name() {
        assert!(sanitize_file_name("").is_err());
    }

    #[test]
    fn rejects_parent_dir_traversal() {
        assert!(sanitize_file_name("../../../etc/passwd").is_err());
        assert!(sanitize_file_name("..").is_err());
    }

    #[test]
    fn rejects_absolute_path() {
        assert!(sanitize_file_name("/tmp/malicious").is_err());
    }

    #[test]
    fn rejects_subdirectory_path() {
        assert!(sanitize_file_name("sub/dir/file.txt").is_err());
    }

    #[test]
    fn accepts_simple_name() {
        assert_eq!(sanitize_file_name("video.mp4").unwrap(), "video.mp4");
    }

    #[test]
    fn accepts_dotfile() {
        assert_eq!(sanitize_file_name(".hidden").unwrap(), ".hidden");
    }

    #[test]
    fn accepts_current_dir_prefix() {
        assert_eq!(sanitize_file_name("./video.mp4").unwrap(), "video.mp4");
    }
}
