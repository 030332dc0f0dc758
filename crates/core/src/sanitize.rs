use std::collections::HashSet;

pub const FALLBACK_BASE_NAME: &str = "unknown";

const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingOptions {
    pub sanitize: bool,
    pub max_filename_len: usize,
}

impl Default for NamingOptions {
    fn default() -> Self {
        Self {
            sanitize: true,
            max_filename_len: 240,
        }
    }
}

/// Joins a rendered base name with the original extension and makes it safe to write.
/// Path separators are replaced even when `sanitize` is off.
pub fn finalize_filename(base: &str, extension: Option<&str>, options: &NamingOptions) -> String {
    let extension_with_dot = extension.map(|ext| format!(".{ext}")).unwrap_or_default();
    let base = if options.sanitize {
        sanitize_filename(base)
    } else {
        flatten_path(base)
    };
    let base = truncate_filename_if_needed(&base, &extension_with_dot, options.max_filename_len);
    format!("{base}{extension_with_dot}")
}

pub fn sanitize_filename(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if is_disallowed_char(ch) {
            out.push('_');
        } else {
            out.push(ch);
        }
    }

    let mut out = out.trim_end_matches([' ', '.']).trim().to_string();

    if out.is_empty() {
        out = FALLBACK_BASE_NAME.to_string();
    }

    if is_windows_reserved(&out) {
        out.push_str("_file");
    }

    out
}

pub fn truncate_filename_if_needed(
    filename_without_ext: &str,
    extension_with_dot: &str,
    limit: usize,
) -> String {
    let ext_len = extension_with_dot.chars().count();
    if filename_without_ext.chars().count() + ext_len <= limit {
        return filename_without_ext.to_string();
    }

    let mut tokens: Vec<&str> = filename_without_ext.split('_').collect();
    while tokens.len() > 1 {
        tokens.pop();
        let candidate = tokens.join("_");
        if candidate.chars().count() + ext_len <= limit {
            return candidate;
        }
    }

    filename_without_ext
        .chars()
        .take(limit.saturating_sub(ext_len))
        .collect()
}

/// Reserves `name` in `taken`, appending `_001`, `_002`, ... before the extension on collision.
pub fn reserve_unique_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (name, None),
    };

    let mut n = 1usize;
    loop {
        let mut candidate = format!("{}_{:03}", stem, n);
        if let Some(ext) = extension {
            candidate.push('.');
            candidate.push_str(ext);
        }
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// True when `name` is a single plain path component (no separators, not `.`/`..`, not empty).
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.chars().any(is_path_separator)
}

fn flatten_path(value: &str) -> String {
    let out: String = value
        .chars()
        .map(|ch| if is_path_separator(ch) { '_' } else { ch })
        .collect();
    if is_plain_file_name(&out) {
        out
    } else {
        FALLBACK_BASE_NAME.to_string()
    }
}

fn is_path_separator(ch: char) -> bool {
    matches!(ch, '/' | '\\' | ':' | '\0')
}

fn is_disallowed_char(ch: char) -> bool {
    matches!(ch, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
        || ch == '\0'
        || ch.is_control()
}

fn is_windows_reserved(value: &str) -> bool {
    let stem = value
        .split('.')
        .next()
        .unwrap_or(value)
        .to_ascii_uppercase();
    WINDOWS_RESERVED_NAMES
        .iter()
        .any(|reserved| reserved == &stem)
}
