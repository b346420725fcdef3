use crate::ErrorLocation;

use std::panic::Location;

#[track_caller]
fn capture_location() -> ErrorLocation {
    ErrorLocation::from(Location::caller())
}

/// **VALUE**: Verifies that `ErrorLocation` points at the call site, not at the helper.
///
/// **WHY THIS MATTERS**: Every guard and transport error in the bridge carries an
/// `ErrorLocation`. If the location points inside a conversion helper, every log line
/// about a rejected IPC call points at the same useless spot.
///
/// **BUG THIS CATCHES**: Would catch if `#[track_caller]` is dropped from a helper
/// that builds locations, or if file/line capture breaks.
#[test]
fn given_track_caller_helper_when_capturing_location_then_reports_call_site() {
    // GIVEN: The line of the call site
    let expected_line = line!() + 3;

    // WHEN: Capturing through a #[track_caller] helper
    let location = capture_location();

    // THEN: File and line are those of this test
    assert!(
        location.file.contains("error_location.rs"),
        "Should capture file path"
    );
    assert_eq!(location.line, expected_line, "Should capture the call-site line");
    assert!(location.column > 0, "Should capture column number");
}

/// **VALUE**: Verifies the `[file:line:column]` display format.
///
/// **WHY THIS MATTERS**: Error messages crossing the process boundary in development
/// builds include this suffix; tooling greps for the bracketed form.
///
/// **BUG THIS CATCHES**: Would catch if the Display implementation drops the brackets
/// or one of the three components.
#[test]
fn given_error_location_when_formatted_then_produces_bracketed_format() {
    // GIVEN: An ErrorLocation
    let location = capture_location();

    // WHEN: Formatting as string
    let formatted = location.to_string();

    // THEN: Should produce "[file:line:column]"
    assert!(formatted.starts_with('['), "Should start with '['");
    assert!(formatted.ends_with(']'), "Should end with ']'");
    assert!(formatted.contains(&format!(":{}:", location.line)));
    assert_eq!(formatted.matches(':').count(), 2, "Should have exactly 2 colons");
}
