//! Named-constant collection: a pre-pass over the whole unit that runs
//! before any annotated declaration is parsed, so annotation operands can
//! reference constants declared later in the file.
//!
//! Two sources feed the table: enumerations (top level or nested) and
//! `const`/`constexpr` declarations whose initializer is a plain literal.
//! Outside annotated blocks the pass is best-effort — anything it cannot
//! parse is skipped, never an error. First registration of a name wins.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use ordered_float::OrderedFloat;
use regex::Regex;

use crate::error::ScanError;
use crate::lex::{Lexer, Tok, Tokens};
use crate::model::{Enumeration, Enumerator, Literal};

use super::{expect_ident, expect_keyword, expect_tok};

// ————————————————————————————————————————————————————————————————————————————
// COMMENT/STRING SWEEP
// ————————————————————————————————————————————————————————————————————————————

/// Per-byte map of which source positions sit inside a comment, string or
/// character literal. Regex hits are checked against this before anything
/// is parsed at them.
pub struct Sweep {
    mask: Vec<bool>,
}

#[derive(PartialEq)]
enum SweepState {
    Code,
    Line,
    Block,
    Str,
    Chr,
}

impl Sweep {
    pub fn new(src: &str) -> Self {
        let bytes = src.as_bytes();
        let mut mask = vec![false; bytes.len()];
        let mut state = SweepState::Code;
        let mut i = 0;
        while i < bytes.len() {
            match state {
                SweepState::Code => match bytes[i] {
                    b'/' if bytes.get(i + 1) == Some(&b'/') => {
                        mask[i] = true;
                        mask[i + 1] = true;
                        state = SweepState::Line;
                        i += 2;
                    }
                    b'/' if bytes.get(i + 1) == Some(&b'*') => {
                        mask[i] = true;
                        mask[i + 1] = true;
                        state = SweepState::Block;
                        i += 2;
                    }
                    b'"' => {
                        mask[i] = true;
                        state = SweepState::Str;
                        i += 1;
                    }
                    b'\'' => {
                        mask[i] = true;
                        state = SweepState::Chr;
                        i += 1;
                    }
                    _ => i += 1,
                },
                SweepState::Line => {
                    if bytes[i] == b'\n' {
                        state = SweepState::Code;
                    } else {
                        mask[i] = true;
                    }
                    i += 1;
                }
                SweepState::Block => {
                    mask[i] = true;
                    if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                        mask[i + 1] = true;
                        state = SweepState::Code;
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                SweepState::Str | SweepState::Chr => {
                    let close = if state == SweepState::Str { b'"' } else { b'\'' };
                    mask[i] = true;
                    if bytes[i] == b'\\' && i + 1 < bytes.len() {
                        mask[i + 1] = true;
                        i += 2;
                    } else {
                        if bytes[i] == close || bytes[i] == b'\n' {
                            state = SweepState::Code;
                        }
                        i += 1;
                    }
                }
            }
        }
        Sweep { mask }
    }

    pub fn masked(&self, offset: usize) -> bool {
        self.mask.get(offset).copied().unwrap_or(true)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// COLLECTION
// ————————————————————————————————————————————————————————————————————————————

static ENUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\benum\b").unwrap());

static CONST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*(?:static\s+|inline\s+)*const(?:expr)?\s+(?:bool|int|float|double|auto|String)\s+([A-Za-z_][A-Za-z0-9_]*)\s*=\s*([^;\n]+);",
    )
    .unwrap()
});

/// Collect every named constant in the unit. Returns the table plus all
/// enumerations found, keyed by byte offset so the caller can decide which
/// ones belong to an annotated struct.
pub fn collect(src: &str, sweep: &Sweep) -> (IndexMap<String, Literal>, Vec<(usize, Enumeration)>) {
    let mut table = IndexMap::new();
    let mut enums = Vec::new();

    for site in ENUM_RE.find_iter(src) {
        if sweep.masked(site.start()) {
            continue;
        }
        let mut ts = Tokens::new(Lexer::at(src, site.start()));
        if let Ok(e) = parse_enum(&mut ts) {
            register_enum(&mut table, None, &e);
            enums.push((site.start(), e));
        }
    }

    for cap in CONST_RE.captures_iter(src) {
        let whole = cap.get(0).map(|m| m.start()).unwrap_or(0);
        if sweep.masked(cap.get(1).map(|m| m.start()).unwrap_or(whole)) {
            continue;
        }
        let name = &cap[1];
        if let Some(value) = literal_of(&cap[2]) {
            table.entry(name.to_string()).or_insert(value);
        }
    }

    (table, enums)
}

/// Parse a literal initializer; `None` for anything fancier.
fn literal_of(text: &str) -> Option<Literal> {
    let mut ts = Tokens::new(Lexer::new(text.trim()));
    let negative = ts.eat(&Tok::Minus);
    let t = ts.next();
    let lit = match t.tok {
        Tok::Int(v) => Literal::Int(if negative { -v } else { v }),
        Tok::Float(v) => Literal::Float(OrderedFloat(if negative { -v } else { v })),
        Tok::Str(s) if !negative => Literal::Str(s),
        Tok::Ident(ref w) if w == "true" && !negative => Literal::Bool(true),
        Tok::Ident(ref w) if w == "false" && !negative => Literal::Bool(false),
        _ => return None,
    };
    if ts.peek().tok != Tok::Eof {
        return None;
    }
    Some(lit)
}

/// Register an enumeration's values. Unscoped enums export the bare
/// enumerator name; `enum class` values resolve only through the enum
/// name. `owner` adds the struct-qualified form for nested enums.
pub fn register_enum(
    table: &mut IndexMap<String, Literal>,
    owner: Option<&str>,
    e: &Enumeration,
) {
    for en in &e.enumerators {
        if !e.scoped {
            table.entry(en.name.clone()).or_insert(Literal::Int(en.value));
        }
        table
            .entry(format!("{}::{}", e.name, en.name))
            .or_insert(Literal::Int(en.value));
        if let Some(owner) = owner {
            table
                .entry(format!("{}::{}::{}", owner, e.name, en.name))
                .or_insert(Literal::Int(en.value));
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ENUM GRAMMAR
// ————————————————————————————————————————————————————————————————————————————

/// Parse `enum [class|struct] Name [: underlying] { A [= n], .. };` with the
/// stream positioned at the `enum` keyword. Values auto-increment from the
/// previous enumerator, starting at zero.
pub fn parse_enum(ts: &mut Tokens<'_>) -> Result<Enumeration, ScanError> {
    expect_keyword(ts, "enum")?;
    let scoped = matches!(&ts.peek().tok, Tok::Ident(w) if w == "class" || w == "struct");
    if scoped {
        ts.next();
    }
    let (name, _) = expect_ident(ts, "enumeration name")?;
    if ts.eat(&Tok::Colon) {
        expect_ident(ts, "underlying type")?;
    }
    expect_tok(ts, Tok::LBrace, "{")?;

    let mut enumerators = Vec::new();
    let mut next_value = 0i64;
    loop {
        while matches!(ts.peek().tok, Tok::Doc(_)) {
            ts.next();
        }
        if ts.eat(&Tok::RBrace) {
            break;
        }
        let (ename, _) = expect_ident(ts, "enumerator name")?;
        let value = if ts.eat(&Tok::Eq) {
            let negative = ts.eat(&Tok::Minus);
            let t = ts.next();
            match t.tok {
                Tok::Int(v) => {
                    if negative {
                        -v
                    } else {
                        v
                    }
                }
                other => {
                    return Err(ScanError::Expected {
                        expected: "integer enumerator value".to_string(),
                        found: other.to_string(),
                        location: t.loc,
                    });
                }
            }
        } else {
            next_value
        };
        enumerators.push(Enumerator { name: ename, value });
        next_value = value + 1;
        ts.eat(&Tok::Comma);
    }
    expect_tok(ts, Tok::Semi, ";")?;
    Ok(Enumeration { name, scoped, enumerators })
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;

    fn table_of(src: &str) -> IndexMap<String, Literal> {
        let sweep = Sweep::new(src);
        collect(src, &sweep).0
    }

    #[test]
    fn sweep_masks_comments_and_strings() {
        let src = "int a; // enum inside\nconst char* s = \"enum\";\n/* enum */ enum E { A };";
        let sweep = Sweep::new(src);
        let hits: Vec<usize> = ENUM_RE.find_iter(src).map(|m| m.start()).collect();
        assert_eq!(hits.len(), 4);
        assert!(sweep.masked(hits[0]));
        assert!(sweep.masked(hits[1]));
        assert!(sweep.masked(hits[2]));
        assert!(!sweep.masked(hits[3]));
    }

    #[test]
    fn enum_values_auto_increment_and_register_both_names() {
        let t = table_of("enum Damage { Kinetic = 1, Energy, Splash = 8 };");
        assert_eq!(t.get("Kinetic"), Some(&Literal::Int(1)));
        assert_eq!(t.get("Energy"), Some(&Literal::Int(2)));
        assert_eq!(t.get("Splash"), Some(&Literal::Int(8)));
        assert_eq!(t.get("Damage::Energy"), Some(&Literal::Int(2)));
    }

    #[test]
    fn enum_class_registers_qualified_names_only() {
        let t = table_of("enum class Mode : int { Off, On };");
        assert_eq!(t.get("Mode::Off"), Some(&Literal::Int(0)));
        assert_eq!(t.get("Mode::On"), Some(&Literal::Int(1)));
        assert_eq!(t.get("Off"), None);
    }

    #[test]
    fn const_lines_with_literal_initializers_register() {
        let src = "\
const double MAX_YAW = 6.28318;
static const int LIMIT = 12;
constexpr bool STRICT = true;
constexpr auto NAME = \"turret\";
const int DERIVED = LIMIT * 2;
";
        let t = table_of(src);
        assert_eq!(t.get("MAX_YAW"), Some(&Literal::Float(OrderedFloat(6.28318))));
        assert_eq!(t.get("LIMIT"), Some(&Literal::Int(12)));
        assert_eq!(t.get("STRICT"), Some(&Literal::Bool(true)));
        assert_eq!(t.get("NAME"), Some(&Literal::Str("turret".to_string())));
        // Expression initializers are not constant-folded.
        assert_eq!(t.get("DERIVED"), None);
    }

    #[test]
    fn first_registration_wins() {
        let t = table_of("enum A { Dup = 1 };\nenum B { Dup = 2 };");
        assert_eq!(t.get("Dup"), Some(&Literal::Int(1)));
        assert_eq!(t.get("B::Dup"), Some(&Literal::Int(2)));
    }

    #[test]
    fn negative_and_float_suffix_initializers() {
        let t = table_of("const int FLOOR = -4;\nconst float RATE = 0.5f;");
        assert_eq!(t.get("FLOOR"), Some(&Literal::Int(-4)));
        assert_eq!(t.get("RATE"), Some(&Literal::Float(OrderedFloat(0.5))));
    }

    #[test]
    fn malformed_enum_is_skipped_not_fatal() {
        let t = table_of("enum { Anon = 1 };\nenum Ok { Fine = 3 };");
        assert_eq!(t.get("Anon"), None);
        assert_eq!(t.get("Fine"), Some(&Literal::Int(3)));
    }
}
