//! Path helpers for staging: destination layout, shell escaping and scratch
//! locations. All remote paths use `/` as the separator.

use std::path::{Path, PathBuf};

pub const SEPARATOR: char = '/';

const SHELL_META_CHARACTERS: [char; 12] =
    ['\\', '^', '$', '{', '}', '[', ']', '(', ')', '?', '&', '%'];

/// Backslash-escape shell metacharacters: `\ ^ $ { } [ ] ( ) ? & %`
pub fn escape_special_characters(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if SHELL_META_CHARACTERS.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Single-quote a path for a POSIX shell, escaping embedded quotes
pub fn shell_quote(path: &str) -> String {
    format!("'{}'", path.replace('\'', "'\"'\"'"))
}

fn with_trailing_separator(path: &str) -> String {
    if path.ends_with(SEPARATOR) {
        path.to_string()
    } else {
        format!("{path}{SEPARATOR}")
    }
}

/// `root + experiment_data_dir + file_name`
///
/// A leading separator on the data dir is dropped so it stays relative to
/// `root`. Without a data dir the layout is `root + process_id + / + file_name`.
pub fn build_destination_file_path(
    storage_root: &str,
    experiment_data_dir: Option<&str>,
    process_id: &str,
    file_name: &str,
) -> String {
    let root = with_trailing_separator(storage_root.trim());

    let data_dir = experiment_data_dir
        .map(str::trim)
        .filter(|dir| !dir.is_empty());

    match data_dir {
        None => format!("{root}{process_id}{SEPARATOR}{file_name}"),
        Some(dir) => {
            let relative = dir.strip_prefix(SEPARATOR).unwrap_or(dir);
            format!("{root}{}{file_name}", with_trailing_separator(relative))
        }
    }
}

/// Last path segment
pub fn file_name(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Everything before the last separator; `/` for top-level absolute paths
pub fn parent_path(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "",
    }
}

pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}{name}", with_trailing_separator(parent))
    }
}

/// `<local_data_location>/<process_id>/temp_inputs/<file_name>`
pub fn scratch_path(local_data_location: &Path, process_id: &str, file_name: &str) -> PathBuf {
    local_data_location
        .join(process_id)
        .join("temp_inputs")
        .join(file_name)
}
