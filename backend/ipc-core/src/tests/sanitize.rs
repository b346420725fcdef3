use crate::guard::sanitize::{sanitize_str, sanitize_value};

use serde_json::json;

/// **VALUE**: Verifies script blocks are removed in any case and across lines.
///
/// **WHY THIS MATTERS**: Handler arguments end up rendered in the front-end.
///
/// **BUG THIS CATCHES**: Would catch a case-sensitive or single-line pattern.
#[test]
fn given_script_blocks_when_sanitizing_then_removed_and_trimmed() {
    // GIVEN/WHEN/THEN
    assert_eq!(sanitize_str("  <script>alert(1)</script>hello  "), "hello");
    assert_eq!(
        sanitize_str("a<SCRIPT type=\"text/javascript\">\nsteal()\n</Script >b"),
        "ab"
    );
    assert_eq!(sanitize_str("x<script>1</script>y<script>2</script>z"), "xyz");
}

/// **VALUE**: Verifies every `javascript:`, `data:` and `vbscript:` marker goes.
///
/// **WHY THIS MATTERS**: Scheme prefixes turn plain strings into executable links.
///
/// **BUG THIS CATCHES**: Would catch stripping only a leading, lowercase prefix.
#[test]
fn given_script_schemes_when_sanitizing_then_stripped_everywhere() {
    // GIVEN/WHEN/THEN
    assert_eq!(sanitize_str("javascript:alert(1)"), "alert(1)");
    assert_eq!(sanitize_str("JavaScript:void(0)"), "void(0)");
    assert_eq!(sanitize_str(" DATA:text/html,hi "), "text/html,hi");
    assert_eq!(sanitize_str("see vbscript:run and javascript:go"), "see run and go");
    assert_eq!(sanitize_str("https://example.com"), "https://example.com");
}

/// **VALUE**: Verifies nested arrays and objects are sanitized and other values
/// pass through untouched.
///
/// **WHY THIS MATTERS**: Real payloads are objects with string fields several
/// levels down.
///
/// **BUG THIS CATCHES**: Would catch top-level-only sanitizing or keys being rewritten.
#[test]
fn given_nested_payload_when_sanitizing_then_strings_cleaned_and_rest_unchanged() {
    // GIVEN
    let payload = json!({
        "title": "  Home <script>x()</script> ",
        "javascript:key": "kept key",
        "count": 3,
        "published": true,
        "missing": null,
        "tags": ["a", " javascript:b ", ["<script></script>c"]],
    });

    // WHEN
    let cleaned = sanitize_value(payload);

    // THEN
    assert_eq!(
        cleaned,
        json!({
            "title": "Home",
            "javascript:key": "kept key",
            "count": 3,
            "published": true,
            "missing": null,
            "tags": ["a", "b", ["c"]],
        })
    );
}
