//! Uniform Cache Tests
//!
//! Tests for:
//! - One-time resolution per uniform name
//! - Cached "absent" sentinel short-circuiting later loads
//! - Independence of entries across names

use nimbus::gpu::program::UniformCache;

fn location(value: u32) -> glow::UniformLocation {
    glow::NativeUniformLocation(value)
}

// ============================================================================
// Resolution Counting
// ============================================================================

#[test]
fn absent_name_queries_the_program_once() {
    let mut cache = UniformCache::new();
    let mut lookups = 0;

    for _ in 0..10 {
        let resolved = cache.resolve_or_cached("fog_density", || {
            lookups += 1;
            None
        });
        assert!(resolved.is_none(), "absent name must stay absent");
    }

    assert_eq!(lookups, 1, "every call after the first must hit the cache");
}

#[test]
fn present_name_queries_the_program_once() {
    let mut cache = UniformCache::new();
    let mut lookups = 0;

    for _ in 0..10 {
        let resolved = cache
            .resolve_or_cached("view_proj", || {
                lookups += 1;
                Some(location(3))
            })
            .copied();
        assert_eq!(resolved, Some(location(3)));
    }

    assert_eq!(lookups, 1);
}

#[test]
fn location_zero_is_a_valid_present_entry() {
    // Location 0 is a perfectly good uniform location and must not be
    // confused with "absent".
    let mut cache = UniformCache::new();
    let resolved = cache.resolve_or_cached("backside", || Some(location(0)));
    assert_eq!(resolved, Some(&location(0)));
}

// ============================================================================
// Entry Independence
// ============================================================================

#[test]
fn names_resolve_independently() {
    let mut cache = UniformCache::new();

    cache.resolve_or_cached("eye", || Some(location(1)));
    cache.resolve_or_cached("ghost", || None);
    cache.resolve_or_cached("time", || Some(location(7)));

    // Re-resolving must not consult the lookups again; give each a lookup
    // that would change the answer if it ran.
    assert_eq!(cache.resolve_or_cached("eye", || None), Some(&location(1)));
    assert!(cache.resolve_or_cached("ghost", || Some(location(9))).is_none());
    assert_eq!(cache.resolve_or_cached("time", || None), Some(&location(7)));
}

#[test]
fn default_cache_is_empty_and_usable() {
    let mut cache = UniformCache::default();
    assert!(cache.resolve_or_cached("anything", || None).is_none());
}
