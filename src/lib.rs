//! declgen: companion-source generator for annotated C++ headers.
//!
//! The pipeline is scan → model → generate. `scan` walks one header for
//! `CONFIG_SPEC` / `SCRIPT_API` markers and produces a [`model::Model`];
//! [`generate`] renders that model into the text of the companion
//! `<stem>.gen.cpp`: validation-spec builders and extraction routines for
//! every tagged struct, then a scripting binding for every marked
//! function.

pub mod error;
pub mod lex;
pub mod ty;
pub mod naming;
pub mod model;
pub mod scan;
pub mod emit;
pub mod spec_gen;
pub mod script_gen;
pub mod cli;

use error::GenError;
use model::Model;

/// Render the complete companion source for one scanned translation unit.
///
/// `include_name` is the header's file name as it should appear in the
/// banner and the `#include` line. Returns `None` when the unit carries no
/// markers; constants and enums alone never produce a companion.
pub fn generate(model: &Model, include_name: &str) -> Result<Option<String>, GenError> {
    if model.is_empty() {
        return Ok(None);
    }

    let mut spec = spec_gen::SpecGen::new();
    for st in &model.structs {
        spec.emit(st)?;
    }
    let mut script = script_gen::ScriptGen::new();
    for f in &model.functions {
        script.emit(f)?;
    }

    let mut out = String::new();
    out.push_str(&format!(
        "// Generated by declgen from {include_name}. Do not edit.\n"
    ));
    out.push('\n');
    out.push_str(&format!("#include \"{include_name}\"\n"));
    if !spec.is_empty() {
        out.push('\n');
        out.push_str(&spec.into_string());
    }
    if !script.is_empty() {
        out.push('\n');
        out.push_str(&script.into_string());
    }
    Ok(Some(out))
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str, include_name: &str) -> Option<String> {
        let model = scan::scan(src).unwrap();
        generate(&model, include_name).unwrap()
    }

    #[test]
    fn markerless_source_generates_nothing() {
        assert!(run("int x = 1;\n", "empty.h").is_none());
        assert!(run("enum Mode { Idle, Active };\n", "modes.h").is_none());
    }

    #[test]
    fn companion_opens_with_banner_and_include() {
        let out = run(
            "CONFIG_SPEC(Turret)\nstruct TurretConfig\n{\n    Float yaw_speed;\n};\n",
            "turret.h",
        )
        .unwrap();
        assert!(out.starts_with(
            "// Generated by declgen from turret.h. Do not edit.\n\n#include \"turret.h\"\n\n"
        ));
        assert!(out.ends_with("}\n"));
        assert!(!out.contains("\n\n\n"));
    }

    #[test]
    fn spec_sections_precede_binding_sections() {
        let out = run(
            "\
CONFIG_SPEC(Turret)
struct TurretConfig
{
    Float yaw_speed;
};

SCRIPT_API()
void fire_at(Int2 cell);
",
            "turret.h",
        )
        .unwrap();
        let build = out.find("spec::Tree BuildTurretSpec()").unwrap();
        let extract = out.find("bool ExtractTurretConfig(").unwrap();
        let bind = out.find("script::FunctionDef BindFireAt()").unwrap();
        assert!(build < extract && extract < bind);
        assert!(out.contains("}\n\nscript::FunctionDef BindFireAt()"));
    }

    #[test]
    fn consecutive_structs_are_blank_separated() {
        let out = run(
            "\
CONFIG_SPEC(A)
struct AConfig
{
    Integer x;
};

CONFIG_SPEC(B)
struct BConfig
{
    Integer y;
};
",
            "ab.h",
        )
        .unwrap();
        assert!(out.contains("}\n\nspec::Tree BuildBSpec()"));
    }

    #[test]
    fn generation_is_idempotent() {
        let src = "\
CONFIG_SPEC(Turret)
struct TurretConfig
{
    //! IN_RANGE(0.0, 360.0)
    Float yaw_speed = 90.0;
    Array<String> tags;
};

SCRIPT_API()
Nullable<Double> distance_to(Int2 cell);
";
        assert_eq!(run(src, "turret.h"), run(src, "turret.h"));
    }
}
