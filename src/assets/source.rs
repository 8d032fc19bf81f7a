//! Shader source loading.
//!
//! GLSL has no include mechanism of its own, so [`load_source`] provides a
//! textual one: a line starting with `#include "name"` is replaced by the
//! named file's expanded content, resolved relative to the directory of the
//! including file. Expansion is recursive and a file including itself,
//! directly or through a chain, is an error rather than a hang.
//!
//! [`load_source_with`] additionally splices a caller-supplied fragment in
//! right after the first line, which keeps a `#version` directive first while
//! letting macro definitions land before any real code.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{NimbusError, Result};

/// Read a shader source file and expand its `#include` directives.
///
/// # Errors
///
/// [`NimbusError::SourceReadError`] when a file cannot be read and
/// [`NimbusError::IncludeCycleError`] when expansion revisits a file that is
/// still being expanded.
pub fn load_source(path: impl AsRef<Path>) -> Result<String> {
    let mut in_progress = Vec::new();
    expand(path.as_ref(), &mut in_progress)
}

/// [`load_source`], then insert `fragment` verbatim after the first line.
///
/// The fragment is taken as-is, so multi-line fragments should end with a
/// newline.
///
/// # Errors
///
/// Same as [`load_source`].
pub fn load_source_with(path: impl AsRef<Path>, fragment: &str) -> Result<String> {
    let expanded = load_source(path)?;
    Ok(inject_after_first_line(&expanded, fragment))
}

/// Insert `fragment` between the first line of `source` and the rest.
#[must_use]
pub fn inject_after_first_line(source: &str, fragment: &str) -> String {
    match source.split_once('\n') {
        Some((first, rest)) => format!("{first}\n{fragment}{rest}"),
        None => format!("{source}\n{fragment}"),
    }
}

fn expand(path: &Path, in_progress: &mut Vec<PathBuf>) -> Result<String> {
    if in_progress.iter().any(|p| p == path) {
        return Err(NimbusError::IncludeCycleError(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|source| NimbusError::SourceReadError {
        path: path.to_path_buf(),
        source,
    })?;
    in_progress.push(path.to_path_buf());

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if let Some(name) = include_target(line) {
            out.push_str(&expand(&dir.join(name), in_progress)?);
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }

    in_progress.pop();
    Ok(out)
}

/// The quoted file name of an include directive, if `line` is one.
fn include_target(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("#include \"")?;
    rest.split_once('"').map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_lands_after_first_line() {
        let source = "#version 430\nvoid main() {}\n";
        let injected = inject_after_first_line(source, "#define CLOUDS 1\n");
        assert_eq!(injected, "#version 430\n#define CLOUDS 1\nvoid main() {}\n");
    }

    #[test]
    fn test_inject_into_single_line_source() {
        let injected = inject_after_first_line("#version 430", "#define A\n");
        assert_eq!(injected, "#version 430\n#define A\n");
    }

    #[test]
    fn test_include_directive_parsing() {
        assert_eq!(include_target("#include \"common.glsl\""), Some("common.glsl"));
        assert_eq!(include_target("#include \"dir/common.glsl\""), Some("dir/common.glsl"));
        // Not at the start of the line, wrong quoting, or unterminated.
        assert_eq!(include_target("  #include \"common.glsl\""), None);
        assert_eq!(include_target("#include <common.glsl>"), None);
        assert_eq!(include_target("#include \"common.glsl"), None);
        assert_eq!(include_target("#define FOO"), None);
    }
}
