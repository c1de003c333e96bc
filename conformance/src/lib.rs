//! Golden-file harness for the companion generator.

use declgen::{generate, scan::scan};

/// Scan one header and render its companion, panicking on any scan or
/// generation failure so the golden tests read as plain assertions.
pub fn companion(source: &str, include_name: &str) -> Option<String> {
    let model = scan(source).unwrap_or_else(|error| panic!("scan failed: {error}"));
    generate(&model, include_name).unwrap_or_else(|error| panic!("generation failed: {error}"))
}
