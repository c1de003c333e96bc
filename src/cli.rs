//! Minimal CLI: scan annotated headers → (gen | check | model)
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// scan C++ headers for CONFIG_SPEC/SCRIPT_API markers and generate companion sources
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// scan and write a companion <stem>.gen.cpp next to each input
    Gen(GenOut),
    /// scan and report problems without writing anything
    Check(CheckOut),
    /// scan and dump the scanned model as JSON
    Model(ModelOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct GenOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// directory for generated files (beside each input if omitted)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    #[command(flatten)]
    input_settings: InputSettings,
}

#[derive(clap::Parser, Debug)]
struct ModelOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

/// Per-input outcome, reported in input order after the parallel pass.
enum Outcome {
    Written(PathBuf),
    Checked,
    Skipped,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) {
        let failures = match &self.cmd {
            Command::Gen(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return;
                }
                run_generate(target)
            }
            Command::Check(target) => run_check(target),
            Command::Model(target) => run_model(target),
        };
        if failures > 0 {
            std::process::exit(1);
        }
    }
}

fn run_generate(target: &GenOut) -> usize {
    let sources = match resolve_inputs(&target.input_settings) {
        Ok(xs) => xs,
        Err(_) => return 1,
    };
    let outcomes: Vec<anyhow::Result<Outcome>> = sources
        .par_iter()
        .map(|path| process_unit(path, Some(target.out_dir.as_deref())))
        .collect();
    report(&sources, outcomes)
}

fn run_check(target: &CheckOut) -> usize {
    let sources = match resolve_inputs(&target.input_settings) {
        Ok(xs) => xs,
        Err(_) => return 1,
    };
    let outcomes: Vec<anyhow::Result<Outcome>> = sources
        .par_iter()
        .map(|path| process_unit(path, None))
        .collect();
    report(&sources, outcomes)
}

fn run_model(target: &ModelOut) -> usize {
    let sources = match resolve_inputs(&target.input_settings) {
        Ok(xs) => xs,
        Err(_) => return 1,
    };
    let scans: Vec<anyhow::Result<crate::model::Model>> = sources
        .par_iter()
        .map(|path| {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let model = crate::scan::scan(&source)
                .with_context(|| format!("failed to scan {}", path.display()))?;
            Ok(model)
        })
        .collect();

    let mut failures = 0;
    let mut entries = Vec::new();
    for (path, scanned) in sources.iter().zip(scans) {
        match scanned {
            Ok(model) => {
                entries.push(serde_json::json!({
                    "path": path.to_string_lossy(),
                    "model": model,
                }));
            }
            Err(error) => {
                failures += 1;
                eprintln!("{} {error:#}", "error:".red().bold());
            }
        }
    }
    if failures > 0 {
        return failures;
    }

    let dump = match serde_json::to_string_pretty(&entries) {
        Ok(src) => src,
        Err(error) => {
            eprintln!(
                "{} failed to serialize model dump: {error}",
                "error:".red().bold()
            );
            return 1;
        }
    };
    match target.out.as_ref() {
        Some(out) => {
            if let Err(error) = write_output(out, &dump) {
                eprintln!("{} {error:#}", "error:".red().bold());
                return 1;
            }
        }
        None => println!("{dump}"),
    }
    0
}

/// Scan one header and, in gen mode, write its companion file.
///
/// `destination` is `None` for check mode, `Some(out_dir)` for gen mode.
/// All-or-nothing per unit: any scan or generation error leaves no partial
/// companion behind.
fn process_unit(path: &Path, destination: Option<Option<&Path>>) -> anyhow::Result<Outcome> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let include_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .with_context(|| format!("input path has no usable file name: {}", path.display()))?;
    let model = crate::scan::scan(&source)
        .with_context(|| format!("failed to scan {}", path.display()))?;
    let generated = crate::generate(&model, include_name)
        .with_context(|| format!("failed to generate for {}", path.display()))?;
    let Some(generated) = generated else {
        return Ok(Outcome::Skipped);
    };
    let Some(out_dir) = destination else {
        return Ok(Outcome::Checked);
    };
    let out_path = companion_path(path, out_dir)?;
    write_output(&out_path, &generated)?;
    Ok(Outcome::Written(out_path))
}

fn report(sources: &[PathBuf], outcomes: Vec<anyhow::Result<Outcome>>) -> usize {
    let mut failures = 0;
    for (path, outcome) in sources.iter().zip(outcomes) {
        match outcome {
            Ok(Outcome::Written(out_path)) => {
                eprintln!(
                    "{} {} -> {}",
                    "ok".green().bold(),
                    path.display(),
                    out_path.display()
                );
            }
            Ok(Outcome::Checked) => {
                eprintln!("{} {}", "ok".green().bold(), path.display());
            }
            Ok(Outcome::Skipped) => {
                eprintln!("{} {} (no markers)", "skip".dimmed(), path.display());
            }
            Err(error) => {
                failures += 1;
                eprintln!("{} {error:#}", "error:".red().bold());
            }
        }
    }
    failures
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn resolve_inputs(settings: &InputSettings) -> Result<Vec<PathBuf>, ()> {
    match resolve_file_path_patterns(&settings.input) {
        Ok(xs) => Ok(xs),
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            Err(())
        }
    }
}

/// Companion file path: `<stem>.gen.cpp`, beside the input unless an output
/// directory was given.
fn companion_path(input: &Path, out_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("input path has no usable file stem: {}", input.display()))?;
    let file_name = format!("{stem}.gen.cpp");
    Ok(match out_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    })
}

fn write_output(out: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            // Treat as a glob pattern
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                match entry {
                    Ok(p) => {
                        matched_any = true;
                        out.push(p);
                    }
                    Err(e) => return Err(Box::new(e)),
                }
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                return Err(format!("glob pattern matched no files: {pattern}").into());
            }
        } else {
            // Treat as a literal path
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn companion_path_sits_beside_the_input() {
        let path = companion_path(Path::new("configs/turret.h"), None).unwrap();
        assert_eq!(path, PathBuf::from("configs/turret.gen.cpp"));
    }

    #[test]
    fn companion_path_honors_the_output_directory() {
        let path =
            companion_path(Path::new("configs/turret.h"), Some(Path::new("build/gen"))).unwrap();
        assert_eq!(path, PathBuf::from("build/gen/turret.gen.cpp"));
    }

    #[test]
    fn literal_paths_pass_through_unresolved() {
        let paths = resolve_file_path_patterns(["configs/turret.h"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("configs/turret.h")]);
    }

    #[test]
    fn empty_glob_matches_are_an_error() {
        assert!(resolve_file_path_patterns(["no_such_dir/*.zzz"]).is_err());
    }
}
