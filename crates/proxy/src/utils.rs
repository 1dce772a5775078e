//! Internal helper macros.

/// Early-returns with an error when a condition does not hold.
///
/// Like `assert!`, but produces an `Err` instead of panicking; used for
/// validation checks in the framing scanners.
///
/// # Example
///
/// ```ignore
/// ensure!(line_len <= MAX_CHUNK_LINE, ParseError::chunk_line_too_long(MAX_CHUNK_LINE));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
