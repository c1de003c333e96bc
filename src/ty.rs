//! The closed type grammar shared by both generators.
//!
//! A member or parameter type is one of: a basic kind from a fixed catalog,
//! `Nullable<T>`, `Array<T>`, `Map<String, T>`, `Variant<T1, ..>` (two or
//! more alternatives) or `Tuple<T1, ..>` (whole return types only — that
//! placement rule is enforced by the generators, not here). The grammar is
//! closed: anything outside it is rejected at parse time, never passed
//! through.
//!
//! `Display` renders the canonical spelling, which is also the native
//! spelling used in generated code; `parse` of a rendered type yields the
//! same value back.

use std::fmt;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::{Location, TypeError};
use crate::lex::{Lexer, Tok, Tokens};

// ————————————————————————————————————————————————————————————————————————————
// BASIC CATALOG
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BasicKind {
    Boolean,
    Integer,
    Float,
    Double,
    String,
    Path,
    Int2,
    Int3,
    Int4,
    Float2,
    Float3,
    Float4,
    Mat2,
    Mat3,
    Mat4,
    DMat2,
    DMat3,
    DMat4,
    Dictionary,
}

/// Canonical names first, lowercase aliases after. Aliases are accepted on
/// input only; rendering always uses the canonical name.
static CATALOG: Lazy<IndexMap<&'static str, BasicKind>> = Lazy::new(|| {
    use BasicKind::*;
    IndexMap::from([
        ("Boolean", Boolean),
        ("Integer", Integer),
        ("Float", Float),
        ("Double", Double),
        ("String", String),
        ("Path", Path),
        ("Int2", Int2),
        ("Int3", Int3),
        ("Int4", Int4),
        ("Float2", Float2),
        ("Float3", Float3),
        ("Float4", Float4),
        ("Mat2", Mat2),
        ("Mat3", Mat3),
        ("Mat4", Mat4),
        ("DMat2", DMat2),
        ("DMat3", DMat3),
        ("DMat4", DMat4),
        ("Dictionary", Dictionary),
        ("bool", Boolean),
        ("int", Integer),
        ("float", Float),
        ("double", Double),
    ])
});

impl BasicKind {
    pub fn lookup(name: &str) -> Option<BasicKind> {
        CATALOG.get(name).copied()
    }

    pub fn canonical_name(self) -> &'static str {
        use BasicKind::*;
        match self {
            Boolean => "Boolean",
            Integer => "Integer",
            Float => "Float",
            Double => "Double",
            String => "String",
            Path => "Path",
            Int2 => "Int2",
            Int3 => "Int3",
            Int4 => "Int4",
            Float2 => "Float2",
            Float3 => "Float3",
            Float4 => "Float4",
            Mat2 => "Mat2",
            Mat3 => "Mat3",
            Mat4 => "Mat4",
            DMat2 => "DMat2",
            DMat3 => "DMat3",
            DMat4 => "DMat4",
            Dictionary => "Dictionary",
        }
    }

    /// Human-facing name used in parameter displays and mismatch messages.
    /// Scripts see one number type, so both float widths collapse.
    pub fn display_name(self) -> &'static str {
        match self {
            BasicKind::Float | BasicKind::Double => "Number",
            other => other.canonical_name(),
        }
    }

    pub fn is_numeric_scalar(self) -> bool {
        matches!(self, BasicKind::Integer | BasicKind::Float | BasicKind::Double)
    }

    pub fn is_float_scalar(self) -> bool {
        matches!(self, BasicKind::Float | BasicKind::Double)
    }

    pub fn is_stringish(self) -> bool {
        matches!(self, BasicKind::String | BasicKind::Path)
    }

    /// Component count for integer vectors.
    pub fn int_vector_arity(self) -> Option<usize> {
        match self {
            BasicKind::Int2 => Some(2),
            BasicKind::Int3 => Some(3),
            BasicKind::Int4 => Some(4),
            _ => None,
        }
    }

    /// Component count for float vectors.
    pub fn float_vector_arity(self) -> Option<usize> {
        match self {
            BasicKind::Float2 => Some(2),
            BasicKind::Float3 => Some(3),
            BasicKind::Float4 => Some(4),
            _ => None,
        }
    }

    pub fn is_matrix(self) -> bool {
        use BasicKind::*;
        matches!(self, Mat2 | Mat3 | Mat4 | DMat2 | DMat3 | DMat4)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TYPE TREE
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum VariableType {
    Basic(BasicKind),
    Nullable(Box<VariableType>),
    Sequence(Box<VariableType>),
    /// Keys are always `String`; only the value type is stored.
    Mapping(Box<VariableType>),
    Sum(Vec<VariableType>),
    Tuple(Vec<VariableType>),
}

impl VariableType {
    /// Split one optional `Nullable` layer off the top.
    pub fn peel_nullable(&self) -> (bool, &VariableType) {
        match self {
            VariableType::Nullable(inner) => (true, inner),
            other => (false, other),
        }
    }

    /// Innermost non-container type: unwraps `Nullable`, `Array` and `Map`
    /// layers. Constraint annotations attach here.
    pub fn core(&self) -> &VariableType {
        match self {
            VariableType::Nullable(inner)
            | VariableType::Sequence(inner)
            | VariableType::Mapping(inner) => inner.core(),
            other => other,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, VariableType::Sequence(_) | VariableType::Mapping(_))
    }

    /// Human-facing display string: `T?`, `T[]`, `String -> T`,
    /// `A | B`, `A, B`, and `Number` for both float widths.
    pub fn display_string(&self) -> String {
        match self {
            VariableType::Basic(k) => k.display_name().to_string(),
            VariableType::Nullable(inner) => format!("{}?", inner.display_string()),
            VariableType::Sequence(inner) => format!("{}[]", inner.display_string()),
            VariableType::Mapping(value) => format!("String -> {}", value.display_string()),
            VariableType::Sum(alts) => {
                let parts: Vec<String> = alts.iter().map(|a| a.display_string()).collect();
                parts.join(" | ")
            }
            VariableType::Tuple(elems) => {
                let parts: Vec<String> = elems.iter().map(|e| e.display_string()).collect();
                parts.join(", ")
            }
        }
    }
}

impl fmt::Display for VariableType {
    /// Canonical spelling. Parsing the result yields the same type back.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableType::Basic(k) => write!(f, "{}", k.canonical_name()),
            VariableType::Nullable(inner) => write!(f, "Nullable<{inner}>"),
            VariableType::Sequence(inner) => write!(f, "Array<{inner}>"),
            VariableType::Mapping(value) => write!(f, "Map<String, {value}>"),
            VariableType::Sum(alts) => {
                write!(f, "Variant<")?;
                for (i, a) in alts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ">")
            }
            VariableType::Tuple(elems) => {
                write!(f, "Tuple<")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ">")
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PARSING
// ————————————————————————————————————————————————————————————————————————————

/// Parse one type expression off the front of a token stream.
pub fn parse_type(ts: &mut Tokens<'_>) -> Result<VariableType, TypeError> {
    let head = ts.next();
    let Tok::Ident(name) = &head.tok else {
        return Err(TypeError::UnsupportedType {
            token: head.tok.to_string(),
            location: head.loc,
        });
    };

    match name.as_str() {
        "Nullable" => {
            let mut args = angle_list(ts, "Nullable", head.loc)?;
            if args.len() != 1 {
                return Err(TypeError::IllegalNesting {
                    detail: format!("Nullable takes one argument, got {}", args.len()),
                    location: head.loc,
                });
            }
            let inner = args.remove(0);
            if matches!(inner, VariableType::Nullable(_)) {
                return Err(TypeError::IllegalNesting {
                    detail: "Nullable<Nullable<..>> collapses nothing".to_string(),
                    location: head.loc,
                });
            }
            Ok(VariableType::Nullable(Box::new(inner)))
        }
        "Array" => {
            let mut args = angle_list(ts, "Array", head.loc)?;
            if args.len() != 1 {
                return Err(TypeError::IllegalNesting {
                    detail: format!("Array takes one argument, got {}", args.len()),
                    location: head.loc,
                });
            }
            Ok(VariableType::Sequence(Box::new(args.remove(0))))
        }
        "Map" => {
            let mut args = angle_list(ts, "Map", head.loc)?;
            if args.len() != 2 {
                return Err(TypeError::IllegalNesting {
                    detail: format!("Map takes two arguments, got {}", args.len()),
                    location: head.loc,
                });
            }
            if args[0] != VariableType::Basic(BasicKind::String) {
                return Err(TypeError::IllegalNesting {
                    detail: format!("Map key must be String, got {}", args[0]),
                    location: head.loc,
                });
            }
            Ok(VariableType::Mapping(Box::new(args.remove(1))))
        }
        "Variant" => {
            let args = angle_list(ts, "Variant", head.loc)?;
            if args.len() < 2 {
                return Err(TypeError::IllegalNesting {
                    detail: format!("Variant needs at least two alternatives, got {}", args.len()),
                    location: head.loc,
                });
            }
            Ok(VariableType::Sum(args))
        }
        "Tuple" => {
            let args = angle_list(ts, "Tuple", head.loc)?;
            if args.is_empty() {
                return Err(TypeError::IllegalNesting {
                    detail: "Tuple needs at least one element".to_string(),
                    location: head.loc,
                });
            }
            Ok(VariableType::Tuple(args))
        }
        other => match BasicKind::lookup(other) {
            Some(kind) => Ok(VariableType::Basic(kind)),
            None => Err(TypeError::UnsupportedType {
                token: other.to_string(),
                location: head.loc,
            }),
        },
    }
}

fn angle_list(
    ts: &mut Tokens<'_>,
    wrapper: &str,
    at: Location,
) -> Result<Vec<VariableType>, TypeError> {
    if !ts.eat(&Tok::Lt) {
        return Err(TypeError::IllegalNesting {
            detail: format!("{wrapper} requires `<...>` type arguments"),
            location: at,
        });
    }
    let mut out = Vec::new();
    if ts.eat(&Tok::Gt) {
        return Ok(out);
    }
    loop {
        out.push(parse_type(ts)?);
        if ts.eat(&Tok::Comma) {
            continue;
        }
        if ts.eat(&Tok::Gt) {
            return Ok(out);
        }
        let t = ts.peek();
        return Err(TypeError::IllegalNesting {
            detail: format!("expected `,` or `>` in {wrapper} arguments, found `{}`", t.tok),
            location: t.loc,
        });
    }
}

/// Parse a standalone type expression; the whole string must be consumed.
pub fn parse_str(src: &str) -> Result<VariableType, TypeError> {
    let mut ts = Tokens::new(Lexer::new(src));
    let ty = parse_type(&mut ts)?;
    let rest = ts.peek();
    if rest.tok != Tok::Eof {
        return Err(TypeError::IllegalNesting {
            detail: format!("trailing `{}` after type", rest.tok),
            location: rest.loc,
        });
    }
    Ok(ty)
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
