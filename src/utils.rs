//! # Utility Functions Module
//!
//! Small helpers shared by the argument builders and the CLI reporting.

/// Converts any iterable of string-like items to `Vec<String>`.
///
/// Used to build external command lines without repeating `.to_string()`:
///
/// ```rust
/// use clip_transformer::utils::to_string_vec;
///
/// let crf = 23;
/// let args = to_string_vec(["-crf", &crf.to_string(), "-preset", "veryfast"]);
/// assert_eq!(args[1], "23");
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Builds an argument vector from mixed literals and values.
///
/// ```rust
/// use clip_transformer::args;
///
/// let args = args!["-c:v", "libx264", "-crf", 23];
/// assert_eq!(args, vec!["-c:v", "libx264", "-crf", "23"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_string_vec([$($item.to_string()),*])
    };
}

/// Returns the last `count` lines of `text`, joined with newlines.
///
/// Transcoder diagnostics can be thousands of lines long; only the tail is
/// worth showing to a user when a run fails.
pub fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}
