//! Parser for Makefile-style dep-info files written next to the artifact.
//!
//! ```text
//! /out/example.wasm: /src/lib.rs /src/with\ space.rs \
//!     /src/util.rs
//! ```

use std::path::{Path, PathBuf};

/// Every dependency listed in `content`, in first-seen order, deduplicated.
pub fn parse(content: &str) -> Vec<PathBuf> {
    let mut deps: Vec<PathBuf> = Vec::new();

    for rule in logical_lines(content) {
        let Some(deps_part) = split_rule(&rule) else {
            continue;
        };
        for dep in split_escaped(deps_part) {
            let path = PathBuf::from(dep);
            if !deps.contains(&path) {
                deps.push(path);
            }
        }
    }

    deps
}

/// Read and parse a dep-info file. A missing file yields no inputs.
pub fn read(path: &Path) -> Vec<PathBuf> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse(&content),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "no dep-info file");
            Vec::new()
        }
    }
}

/// Join backslash-continued lines.
fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for line in content.lines() {
        let trailing = line.len() - line.trim_end_matches('\\').len();
        // An odd number of trailing backslashes continues the line
        if trailing % 2 == 1 {
            current.push_str(&line[..line.len() - 1]);
            current.push(' ');
        } else {
            current.push_str(line);
            lines.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

/// Returns the dependency list of a rule, skipping comments and env lines.
fn split_rule(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    // The target separator is a colon followed by whitespace or end of line,
    // which keeps drive letters like `C:\` intact.
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b':' if bytes.get(i + 1).is_none_or(|b| b.is_ascii_whitespace()) => {
                return Some(&line[i + 1..]);
            }
            _ => i += 1,
        }
    }
    None
}

/// Split on unescaped whitespace, unescaping `\ `, `\#` and `$$`.
fn split_escaped(deps: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = deps.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some(' ') | Some('#')) => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '$' if chars.peek() == Some(&'$') => {
                chars.next();
                current.push('$');
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(current);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_rule() {
        let deps = parse("/out/example.wasm: /src/lib.rs /src/util.rs\n");
        assert_eq!(
            deps,
            vec![PathBuf::from("/src/lib.rs"), PathBuf::from("/src/util.rs")]
        );
    }

    #[test]
    fn handles_escaped_spaces_and_continuations() {
        let content = "/out/a.wasm: /src/my\\ file.rs \\\n  /src/b.rs\n";
        assert_eq!(
            parse(content),
            vec![PathBuf::from("/src/my file.rs"), PathBuf::from("/src/b.rs")]
        );
    }

    #[test]
    fn merges_rules_without_duplicates() {
        let content = "\
/out/a.wasm: /src/lib.rs /src/a.rs

/out/a.rlib: /src/lib.rs /src/b.rs
";
        assert_eq!(
            parse(content),
            vec![
                PathBuf::from("/src/lib.rs"),
                PathBuf::from("/src/a.rs"),
                PathBuf::from("/src/b.rs"),
            ]
        );
    }

    #[test]
    fn empty_dependency_rules_and_comments() {
        let content = "# env-dep:CARGO_PKG_NAME=example\n/src/lib.rs:\n";
        assert!(parse(content).is_empty());
    }

    #[test]
    fn windows_drive_letters_are_not_separators() {
        let deps = parse("C:\\out\\a.wasm: C:\\src\\lib.rs\n");
        assert_eq!(deps, vec![PathBuf::from("C:\\src\\lib.rs")]);
    }
}
