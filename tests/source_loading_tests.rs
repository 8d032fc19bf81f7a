//! Shader Source Loading Tests
//!
//! Tests for:
//! - Include expansion, resolved relative to the including file
//! - Cycle and missing-file failures
//! - Fragment injection below the version directive
//! - The shader sources shipped with the crate expanding cleanly

use std::fs;
use std::path::{Path, PathBuf};

use nimbus::errors::NimbusError;
use nimbus::{load_source, load_source_with};

/// Per-test scratch directory, removed when the test finishes.
struct Scratch(PathBuf);

impl Scratch {
    fn new(tag: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("nimbus-src-{tag}-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("scratch dir is creatable");
        Scratch(dir)
    }

    fn file(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.0.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("scratch subdir is creatable");
        }
        fs::write(&path, contents).expect("scratch file is writable");
        path
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

// ============================================================================
// Include Expansion
// ============================================================================

#[test]
fn includes_expand_in_place_and_in_order() {
    let scratch = Scratch::new("expand");
    scratch.file("lib/noise.glsl", "float noise_fn() { return 0.0; }\n");
    let root = scratch.file(
        "main.frag",
        "#version 430\n#include \"lib/noise.glsl\"\nvoid main() { noise_fn(); }\n",
    );

    let source = load_source(&root).expect("expansion succeeds");

    let version = source.find("#version 430").expect("version survives");
    let body = source.find("float noise_fn").expect("include body present");
    let main = source.find("void main").expect("trailing code survives");
    assert!(version < body && body < main, "expansion keeps source order");
    assert!(
        !source.contains("#include"),
        "no directive survives expansion"
    );
}

#[test]
fn nested_includes_resolve_against_the_including_file() {
    let scratch = Scratch::new("nested");
    // inner.glsl names a sibling; the path only works if it is resolved
    // against lib/, not against the root file's directory.
    scratch.file("lib/consts.glsl", "const float K = 2.0;\n");
    scratch.file("lib/inner.glsl", "#include \"consts.glsl\"\nfloat k() { return K; }\n");
    let root = scratch.file("main.frag", "#include \"lib/inner.glsl\"\nvoid main() {}\n");

    let source = load_source(&root).expect("nested expansion succeeds");

    assert!(source.contains("const float K"));
    assert!(source.contains("float k()"));
    assert!(!source.contains("#include"));
}

#[test]
fn non_directive_lines_pass_through_verbatim() {
    let scratch = Scratch::new("verbatim");
    let root = scratch.file(
        "plain.vert",
        "#version 430\n// #include \"commented-out.glsl\"\nin vec3 position;\n",
    );

    let source = load_source(&root).expect("plain file loads");

    assert!(
        source.contains("// #include \"commented-out.glsl\""),
        "directives are only honored at the start of a line"
    );
}

// ============================================================================
// Failure Modes
// ============================================================================

#[test]
fn include_cycles_are_reported() {
    let scratch = Scratch::new("cycle");
    scratch.file("a.glsl", "#include \"b.glsl\"\n");
    let b = scratch.file("b.glsl", "#include \"a.glsl\"\n");

    let err = load_source(&b).expect_err("cycle must not recurse forever");
    assert!(
        matches!(err, NimbusError::IncludeCycleError(_)),
        "unexpected error: {err}"
    );
}

#[test]
fn missing_files_report_their_path() {
    let scratch = Scratch::new("missing");
    let ghost = scratch.path().join("nowhere.glsl");

    let err = load_source(&ghost).expect_err("missing file must fail");
    match err {
        NimbusError::SourceReadError { path, .. } => assert_eq!(path, ghost),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_include_target_reports_the_target() {
    let scratch = Scratch::new("missing-inc");
    let root = scratch.file("main.frag", "#include \"not-there.glsl\"\n");

    let err = load_source(&root).expect_err("broken include must fail");
    match err {
        NimbusError::SourceReadError { path, .. } => {
            assert!(path.ends_with("not-there.glsl"), "got {}", path.display());
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Fragment Injection
// ============================================================================

#[test]
fn fragments_land_below_the_version_line() {
    let scratch = Scratch::new("inject");
    let root = scratch.file("main.frag", "#version 430\nvoid main() {}\n");

    let source =
        load_source_with(&root, "#define STEPS 64\n").expect("injection succeeds");

    let mut lines = source.lines();
    assert_eq!(lines.next(), Some("#version 430"));
    assert_eq!(
        lines.next(),
        Some("#define STEPS 64"),
        "the fragment goes right after the first line"
    );
    assert_eq!(lines.next(), Some("void main() {}"));
}

// ============================================================================
// Shipped Shaders
// ============================================================================

#[test]
fn shipped_shaders_expand_cleanly() {
    for name in ["shaders/cloudbox.vert", "shaders/cloudbox.frag"] {
        let source = load_source(name).expect("shipped shader loads");
        assert!(
            source.starts_with("#version 430"),
            "{name} must lead with its version directive"
        );
        assert!(!source.contains("#include"), "{name} left a directive");
    }
}

#[test]
fn fragment_shader_carries_the_shared_cloud_functions() {
    let source = load_source("shaders/cloudbox.frag").expect("fragment shader loads");
    for symbol in ["density_at", "shade", "box_falloff"] {
        assert!(source.contains(symbol), "expanded source misses {symbol}");
    }
}
