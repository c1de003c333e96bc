use conformance::companion;
use declgen::error::ScanError;
use declgen::scan::scan;

const TURRET_H: &str = include_str!("fixtures/turret.h");
const TURRET_GEN: &str = include_str!("fixtures/turret.gen.cpp");
const COMBAT_API_H: &str = include_str!("fixtures/combat_api.h");
const COMBAT_API_GEN: &str = include_str!("fixtures/combat_api.gen.cpp");

#[test]
fn turret_companion_matches_the_golden_file() {
    assert_eq!(companion(TURRET_H, "turret.h").as_deref(), Some(TURRET_GEN));
}

#[test]
fn combat_api_companion_matches_the_golden_file() {
    assert_eq!(
        companion(COMBAT_API_H, "combat_api.h").as_deref(),
        Some(COMBAT_API_GEN)
    );
}

#[test]
fn regeneration_is_byte_stable() {
    assert_eq!(
        companion(TURRET_H, "turret.h"),
        companion(TURRET_H, "turret.h")
    );
    assert_eq!(
        companion(COMBAT_API_H, "combat_api.h"),
        companion(COMBAT_API_H, "combat_api.h")
    );
}

#[test]
fn markerless_header_produces_no_companion() {
    let src = "\
#pragma once

struct PlainOldStruct
{
    int x;
};
";
    assert_eq!(companion(src, "plain.h"), None);
}

#[test]
fn scanned_model_serializes_with_order_preserved() {
    let model = scan(TURRET_H).unwrap();
    let dump = serde_json::to_string_pretty(&model).unwrap();
    assert!(dump.contains("\"Turret\""), "{dump}");
    let yaw = dump.find("yaw_speed").unwrap();
    let tags = dump.find("\"tags\"").unwrap();
    assert!(yaw < tags);
}

#[test]
fn scan_errors_carry_the_offending_position() {
    let src = "\
CONFIG_SPEC(Broken)
struct BrokenConfig
{
    String mode; //! IN_LIST(\"a\", \"b\"
};
";
    let err = scan(src).unwrap_err();
    assert!(matches!(err, ScanError::UnterminatedAnnotation { .. }), "{err}");
    assert_eq!(err.location().line, 4);
}
