use crate::repository::StorageError;

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Converts a `SUM(...)` result to a byte count; negative sums are corrupt rows.
pub(crate) fn bytes_from_i64(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} out of range")))
}

/// Escape `%`, `_` and the escape char itself for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_prefix(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}
