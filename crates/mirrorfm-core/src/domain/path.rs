//! Slash-delimited path helpers
//!
//! Remote paths are absolute, `/`-separated and directories carry a trailing
//! `/`. Everything in here is a pure function: no I/O and no failure modes.

/// Components of a path as returned by [`split`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParts {
    /// Parent directory, always ending in `/` (empty for a bare relative name)
    pub dir: String,
    /// Final segment without its extension
    pub name: String,
    /// Extension after the last `.` (empty if none)
    pub ext: String,
    /// Final segment including the extension, without trailing `/`
    pub full_name: String,
}

/// Normalizes a path.
///
/// Backslashes become slashes, runs of slashes collapse, `.` segments are
/// dropped and `..` removes the preceding segment. A leading `/` and a
/// trailing `/` (or a trailing `.`/`..` segment) are preserved.
pub fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    if unified.is_empty() {
        return String::new();
    }

    let absolute = unified.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    let mut trailing = unified.ends_with('/');

    for segment in unified.split('/') {
        match segment {
            "" => {}
            "." => trailing = true,
            ".." => {
                segments.pop();
                trailing = true;
            }
            other => {
                segments.push(other);
                trailing = unified.ends_with('/');
            }
        }
    }

    let mut out = String::with_capacity(unified.len());
    if absolute {
        out.push('/');
    }
    out.push_str(&segments.join("/"));
    if trailing && !segments.is_empty() {
        out.push('/');
    }
    out
}

/// Splits a path into its parent directory, name and extension.
///
/// For directory paths the trailing `/` is skipped when locating the last
/// separator, so `/a/b/` yields `dir = "/a/"` and `full_name = "b"`.
pub fn split(path: &str) -> PathParts {
    let path = normalize(path);
    if path.is_empty() || path == "/" {
        return PathParts {
            dir: "/".to_string(),
            name: String::new(),
            ext: String::new(),
            full_name: String::new(),
        };
    }

    let search_end = if path.ends_with('/') {
        path.len() - 1
    } else {
        path.len()
    };

    let (dir, full_name) = match path[..search_end].rfind('/') {
        Some(idx) => (path[..=idx].to_string(), path[idx + 1..search_end].to_string()),
        None => (String::new(), path[..search_end].to_string()),
    };

    // A leading dot marks a hidden file, not an extension
    let (name, ext) = match full_name.rfind('.') {
        Some(idx) if idx > 0 => (
            full_name[..idx].to_string(),
            full_name[idx + 1..].to_string(),
        ),
        _ => (full_name.clone(), String::new()),
    };

    PathParts {
        dir,
        name,
        ext,
        full_name,
    }
}

/// Returns the non-empty segments of a normalized path
pub fn segments(path: &str) -> Vec<String> {
    normalize(path)
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builds the path of a direct child of `dir`
pub fn child_path(dir: &str, name: &str, is_dir: bool) -> String {
    let mut out = as_dir(dir);
    out.push_str(name);
    if is_dir {
        out.push('/');
    }
    out
}

/// Normalizes `path` and guarantees a trailing `/`
pub fn as_dir(path: &str) -> String {
    let mut out = normalize(path);
    if !out.ends_with('/') {
        out.push('/');
    }
    out
}

/// Normalizes `path` and strips any trailing `/` (except for the root)
pub fn trim_dir(path: &str) -> String {
    let out = normalize(path);
    if out.len() > 1 && out.ends_with('/') {
        out[..out.len() - 1].to_string()
    } else {
        out
    }
}

/// Returns true if `ancestor` is `path` itself or one of its parents
pub fn is_within(path: &str, ancestor: &str) -> bool {
    let ancestor = as_dir(ancestor);
    let path = as_dir(path);
    path.starts_with(&ancestor)
}
