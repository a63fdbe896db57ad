//! Utility functions for OpinionLens

use bytesize::ByteSize;

/// Formats a byte size into a human-readable string
///
/// # Examples
///
/// ```
/// use common::utils::format_bytes;
///
/// assert_eq!(format_bytes(1024), "1.0 KiB");
/// assert_eq!(format_bytes(0), "0 B");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    ByteSize(bytes).to_string_as(true)
}
