//! Boundary checks shared by the coordinator and the chunk servers.

use std::path::{Path, PathBuf};

pub const MAX_IDENTIFIER_LEN: usize = 255;
pub const MAX_FILENAME_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("identifier must not be empty")]
    EmptyIdentifier,
    #[error("identifier is {len} bytes, limit is {max}")]
    IdentifierTooLong { len: usize, max: usize },
    #[error("identifier contains control characters")]
    MalformedIdentifier,
    #[error("filename must not be empty")]
    EmptyFilename,
    #[error("filename is {len} bytes, limit is {max}")]
    FilenameTooLong { len: usize, max: usize },
    #[error("filename {filename:?} rejected: {reason}")]
    UnsafeFilename {
        filename: String,
        reason: &'static str,
    },
}

/// Chunk-server identifiers are opaque, but must be non-empty, bounded and printable.
pub fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::EmptyIdentifier);
    }
    if id.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::IdentifierTooLong {
            len: id.len(),
            max: MAX_IDENTIFIER_LEN,
        });
    }
    if id.chars().any(char::is_control) {
        return Err(ValidationError::MalformedIdentifier);
    }
    Ok(())
}

/// Length and NUL checks only. The name may still contain path segments.
pub fn validate_filename(filename: &str) -> Result<(), ValidationError> {
    if filename.is_empty() {
        return Err(ValidationError::EmptyFilename);
    }
    if filename.len() > MAX_FILENAME_LEN {
        return Err(ValidationError::FilenameTooLong {
            len: filename.len(),
            max: MAX_FILENAME_LEN,
        });
    }
    if filename.contains('\0') {
        return Err(unsafe_filename(filename, "contains a NUL byte"));
    }
    Ok(())
}

/// Validates `filename` and checks that it names a single entry directly
/// beneath a storage root: no separators, no `.`/`..`, not absolute.
pub fn sanitize_filename(filename: &str) -> Result<&str, ValidationError> {
    validate_filename(filename)?;

    if filename.contains('/') || filename.contains('\\') {
        return Err(unsafe_filename(filename, "contains a path separator"));
    }
    if filename == "." || filename == ".." {
        return Err(unsafe_filename(filename, "is a relative directory reference"));
    }
    Ok(filename)
}

/// Resolves `filename` under `root`. With `sandboxed` unset, the name is
/// joined as given (absolute names and `..` included).
pub fn resolve_destination(
    root: &Path,
    filename: &str,
    sandboxed: bool,
) -> Result<PathBuf, ValidationError> {
    if sandboxed {
        let name = sanitize_filename(filename)?;
        return Ok(root.join(name));
    }

    validate_filename(filename)?;
    // Path::join replaces the root when the name is absolute.
    Ok(root.join(filename))
}

fn unsafe_filename(filename: &str, reason: &'static str) -> ValidationError {
    ValidationError::UnsafeFilename {
        filename: filename.to_string(),
        reason,
    }
}
