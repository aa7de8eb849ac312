//! Pure, stateless path helpers for the virtual filesystem.
//!
//! Nothing in this crate touches the host filesystem except
//! [`contains_symlink`], which only ever `lstat`s — it never opens,
//! reads, or follows a symlink.

use std::io;
use std::path::{Path, PathBuf};

/// `true` iff `p` starts with `/`.
pub fn is_absolute(p: &str) -> bool {
    p.starts_with('/')
}

/// `true` iff `p` is non-empty and both starts and ends with `/`.
pub fn is_directory_string(p: &str) -> bool {
    !p.is_empty() && p.starts_with('/') && p.ends_with('/')
}

/// Removes trailing `/` characters in place. May reduce `"/"` to `""`,
/// which is the root's alternate stored form (see [`pathcmp`]).
pub fn trim_trailing_slash(path: &mut String) {
    while !path.is_empty() && path.ends_with('/') {
        path.pop();
    }
}

/// Canonical form used for path equality and as a map key: trailing
/// slashes removed, with the root collapsing to the empty string (the
/// same collapse [`trim_trailing_slash`] performs on `"/"`). `pathcmp`
/// and `InodeStore`'s path keying both go through this, so there is a
/// single definition of "same path" shared by both.
pub fn canonical_key(path: &str) -> String {
    let mut owned = path.to_string();
    trim_trailing_slash(&mut owned);
    owned
}

/// Compares two paths treating a single trailing slash as equivalent
/// to none, and the empty string as equivalent to `/`.
pub fn pathcmp(a: &str, b: &str) -> bool {
    canonical_key(a) == canonical_key(b)
}

/// The final path component. Basename of `/` is the empty string.
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// `true` iff any `/`-separated component of an already-canonical path
/// begins with `.`.
pub fn contains_hidden(canonical_path: &str) -> bool {
    canonical_path
        .split('/')
        .any(|component| !component.is_empty() && component.starts_with('.'))
}

/// Resolves `input` against `cwd` without touching the host filesystem:
/// drops `.` and empty components, pops one component per `..` (never
/// below `/`), and returns an absolute path with no trailing slash
/// (except `/` itself).
pub fn sanitize(cwd: &str, input: &str) -> String {
    let full = if is_absolute(input) {
        input.to_string()
    } else {
        format!("{cwd}/{input}")
    };

    let mut stack: Vec<&str> = Vec::new();
    for token in full.split('/') {
        match token {
            "" | "." => continue,
            ".." => {
                stack.pop();
            }
            component => stack.push(component),
        }
    }

    if stack.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", stack.join("/"))
    }
}

/// Yields progressive prefixes of a path, root-to-leaf. For an
/// absolute path `/a/b/c` this yields `("/", false)`, `("/a", false)`,
/// `("/a/b", false)`, `("/a/b/c", true)`. For a relative path `a/b`
/// this yields `("a", false)`, `("a/b", true)`. Consumed by both
/// inode addition and lookup so the walk logic lives in one place.
pub fn split(path: &str) -> PathSplit<'_> {
    PathSplit::new(path)
}

pub struct PathSplit<'a> {
    is_absolute: bool,
    emitted_root: bool,
    segments: Vec<&'a str>,
    next_index: usize,
    prefix: String,
}

impl<'a> PathSplit<'a> {
    fn new(path: &'a str) -> Self {
        let is_absolute = is_absolute(path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        Self {
            is_absolute,
            emitted_root: false,
            segments,
            next_index: 0,
            prefix: if is_absolute {
                String::from("/")
            } else {
                String::new()
            },
        }
    }
}

impl Iterator for PathSplit<'_> {
    type Item = (String, bool);

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_absolute && !self.emitted_root {
            self.emitted_root = true;
            let is_full = self.segments.is_empty();
            return Some((self.prefix.clone(), is_full));
        }

        if self.next_index >= self.segments.len() {
            return None;
        }

        let segment = self.segments[self.next_index];
        if self.is_absolute {
            if self.prefix == "/" {
                self.prefix.push_str(segment);
            } else {
                self.prefix.push('/');
                self.prefix.push_str(segment);
            }
        } else if self.prefix.is_empty() {
            self.prefix.push_str(segment);
        } else {
            self.prefix.push('/');
            self.prefix.push_str(segment);
        }

        self.next_index += 1;
        let is_full = self.next_index == self.segments.len();
        Some((self.prefix.clone(), is_full))
    }
}

/// Result of walking a host path ancestor-by-ancestor looking for a
/// symlink anywhere along it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymlinkCheck {
    /// Some prefix of the path does not exist. Non-critical.
    pub not_found: bool,
    /// Some prefix (including the full path) is itself a symlink.
    pub contains_symlink: bool,
}

/// Walks `host_path` from the root, `lstat`-ing each prefix in turn.
/// A missing prefix is reported as `not_found` rather than an error;
/// any other `lstat` failure is propagated, since the caller cannot
/// safely assume containment when the check itself is unreliable.
pub fn contains_symlink(host_path: &Path) -> io::Result<SymlinkCheck> {
    let mut current = PathBuf::new();
    for component in host_path.components() {
        current.push(component);
        match std::fs::symlink_metadata(&current) {
            Ok(meta) => {
                if meta.file_type().is_symlink() {
                    return Ok(SymlinkCheck {
                        not_found: false,
                        contains_symlink: true,
                    });
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(SymlinkCheck {
                    not_found: true,
                    contains_symlink: false,
                });
            }
            Err(err) => return Err(err),
        }
    }
    Ok(SymlinkCheck {
        not_found: false,
        contains_symlink: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_detection() {
        assert!(is_absolute("/a/b"));
        assert!(!is_absolute("a/b"));
        assert!(!is_absolute(""));
    }

    #[test]
    fn directory_string_detection() {
        assert!(is_directory_string("/"));
        assert!(is_directory_string("/a/"));
        assert!(!is_directory_string("/a"));
        assert!(!is_directory_string(""));
    }

    #[test]
    fn trims_trailing_slashes() {
        let mut p = String::from("/a/b/");
        trim_trailing_slash(&mut p);
        assert_eq!(p, "/a/b");

        let mut root = String::from("/");
        trim_trailing_slash(&mut root);
        assert_eq!(root, "");
    }

    #[test]
    fn pathcmp_is_trailing_slash_insensitive() {
        assert!(pathcmp("/a/b", "/a/b/"));
        assert!(pathcmp("", "/"));
        assert!(pathcmp("/", ""));
        assert!(!pathcmp("/a", "/b"));
    }

    #[test]
    fn pathcmp_is_commutative() {
        for (a, b) in [("/a/b", "/a/b/"), ("", "/"), ("/x", "/y")] {
            assert_eq!(pathcmp(a, b), pathcmp(b, a));
        }
    }

    #[test]
    fn basename_of_root_is_empty() {
        assert_eq!(basename("/"), "");
        assert_eq!(basename("/a/b/c"), "c");
        assert_eq!(basename("plain"), "plain");
    }

    #[test]
    fn hidden_component_detection() {
        assert!(contains_hidden("/a/.b/c"));
        assert!(contains_hidden("/.ssh"));
        assert!(!contains_hidden("/a/b/c"));
    }

    #[test]
    fn sanitize_collapses_dot_dot_and_repeated_slashes() {
        assert_eq!(
            sanitize("/", "/foo//bar/../moo/./blubb/../../../maeh"),
            "/maeh"
        );
        assert_eq!(sanitize("/moo", "foo/bar/../../.."), "/");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize("/", "/foo//bar/../moo");
        let twice = sanitize("/", &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn sanitize_relative_matches_absolute_equivalent() {
        let cwd = "/moo";
        let rel = "foo/bar";
        assert_eq!(sanitize(cwd, rel), sanitize("/", &format!("{cwd}/{rel}")));
    }

    #[test]
    fn sanitize_never_escapes_root() {
        assert_eq!(sanitize("/", "../../.."), "/");
    }

    #[test]
    fn split_absolute_yields_progressive_prefixes() {
        let got: Vec<_> = split("/a/b/c").collect();
        assert_eq!(
            got,
            vec![
                ("/".to_string(), false),
                ("/a".to_string(), false),
                ("/a/b".to_string(), false),
                ("/a/b/c".to_string(), true),
            ]
        );
    }

    #[test]
    fn split_root_yields_single_full_entry() {
        let got: Vec<_> = split("/").collect();
        assert_eq!(got, vec![("/".to_string(), true)]);
    }

    #[test]
    fn split_relative_has_no_root_prefix() {
        let got: Vec<_> = split("a/b").collect();
        assert_eq!(
            got,
            vec![("a".to_string(), false), ("a/b".to_string(), true)]
        );
    }

    #[test]
    fn symlink_containment_detects_missing_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope").join("child");
        let result = contains_symlink(&missing).unwrap();
        assert!(result.not_found);
        assert!(!result.contains_symlink);
    }

    #[test]
    fn symlink_containment_detects_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        std::fs::create_dir(&target).unwrap();
        let link = dir.path().join("link");
        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, &link).unwrap();
        let result = contains_symlink(&link).unwrap();
        assert!(result.contains_symlink);
    }

    #[test]
    fn symlink_containment_clean_tree_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        let result = contains_symlink(&nested).unwrap();
        assert!(!result.contains_symlink);
        assert!(!result.not_found);
    }
}
