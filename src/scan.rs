//! Declaration scanner.
//!
//! A unit is plain source text. The scanner finds `CONFIG_SPEC(Tag)` and
//! `SCRIPT_API()` marker sites (skipping occurrences inside comments,
//! strings and preprocessor lines), then walks each annotated declaration
//! with the restricted tokenizer: struct members with trailing `//!`
//! annotation lists, nested enumerations, or one free-function signature.
//! Everything between annotated declarations is ignored; inside them the
//! grammar is strict and any deviation is a [`ScanError`] with a position.
//!
//! Named constants (enumerators and literal `const`s) are collected in a
//! pre-pass over the whole unit, so annotation operands can reference
//! constants declared later in the file.

pub mod consts;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use ordered_float::OrderedFloat;
use regex::Regex;

use crate::error::{Location, ScanError};
use crate::lex::{Lexer, Tok, Token, Tokens};
use crate::model::{Constraint, Enumeration, Function, Literal, Model, Param, Struct, Variable};
use crate::ty::{BasicKind, VariableType, parse_type};

// ————————————————————————————————————————————————————————————————————————————
// ENTRY
// ————————————————————————————————————————————————————————————————————————————

static MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(CONFIG_SPEC|SCRIPT_API)\b").unwrap());

/// Scan one translation unit into a model. Declaration order is preserved
/// per kind; it is the order the generators emit in.
pub fn scan(source: &str) -> Result<Model, ScanError> {
    let sweep = consts::Sweep::new(source);
    let (constants, found_enums) = consts::collect(source, &sweep);
    let mut model = Model { constants, ..Model::default() };
    let mut struct_spans: Vec<(usize, usize)> = Vec::new();

    for site in MARKER_RE.find_iter(source) {
        if sweep.masked(site.start()) || on_preprocessor_line(source, site.start()) {
            continue;
        }
        let doc = doc_above(source, site.start());
        let mut ts = Tokens::new(Lexer::at(source, site.start()));
        if site.as_str() == "CONFIG_SPEC" {
            let (decl, end) = scan_struct(&mut ts, doc, &mut model.constants)?;
            struct_spans.push((site.start(), end));
            model.structs.push(decl);
        } else {
            let decl = scan_function(&mut ts, doc, &model.constants)?;
            model.functions.push(decl);
        }
    }

    // Enumerations inside an annotated struct belong to that struct.
    model.enums = found_enums
        .into_iter()
        .filter(|(off, _)| !struct_spans.iter().any(|&(s, e)| *off >= s && *off < e))
        .map(|(_, e)| e)
        .collect();
    Ok(model)
}

fn on_preprocessor_line(source: &str, offset: usize) -> bool {
    let start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    source[start..offset].trim_start().starts_with('#')
}

/// Contiguous `//` lines directly above `offset`'s line, joined with single
/// spaces. A blank line, code, or a stray annotation line breaks the run.
fn doc_above(source: &str, offset: usize) -> String {
    let mut line_start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let mut parts: Vec<String> = Vec::new();
    while line_start > 0 {
        let prev_end = line_start - 1;
        let prev_start = source[..prev_end].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line = source[prev_start..prev_end].trim();
        if line.starts_with("//!") || !line.starts_with("//") {
            break;
        }
        let text = line
            .strip_prefix("///")
            .or_else(|| line.strip_prefix("//"))
            .unwrap_or("")
            .trim();
        if !text.is_empty() {
            parts.push(text.to_string());
        }
        line_start = prev_start;
    }
    parts.reverse();
    parts.join(" ")
}

// ————————————————————————————————————————————————————————————————————————————
// STRUCTS
// ————————————————————————————————————————————————————————————————————————————

fn scan_struct(
    ts: &mut Tokens<'_>,
    doc: String,
    constants: &mut IndexMap<String, Literal>,
) -> Result<(Struct, usize), ScanError> {
    expect_keyword(ts, "CONFIG_SPEC")?;
    marker_tok(ts, Tok::LParen, "CONFIG_SPEC expects `(Tag)`")?;
    let tag_tok = ts.next();
    let tag = match tag_tok.tok {
        Tok::Ident(s) => s,
        other => {
            return Err(ScanError::Marker {
                detail: format!("expected a tag identifier, found `{other}`"),
                location: tag_tok.loc,
            });
        }
    };
    marker_tok(ts, Tok::RParen, "unclosed CONFIG_SPEC argument list")?;
    expect_keyword(ts, "struct")?;
    let (name, _) = expect_ident(ts, "struct name")?;
    expect_tok(ts, Tok::LBrace, "`{` opening struct body")?;

    let mut members: Vec<Variable> = Vec::new();
    let mut enums: Vec<Enumeration> = Vec::new();
    let mut pending_doc: Vec<String> = Vec::new();
    let mut last_member_line = 0u32;
    loop {
        let head = ts.peek().tok.clone();
        match head {
            Tok::Doc(text) => {
                let t = ts.next();
                // A remark trailing the previous member is not the next
                // member's documentation.
                if t.loc.line != last_member_line && !text.is_empty() {
                    pending_doc.push(text);
                }
                continue;
            }
            Tok::RBrace => {
                ts.next();
                break;
            }
            Tok::Eof => {
                let t = ts.next();
                return Err(ScanError::Expected {
                    expected: "`}` closing struct body".to_string(),
                    found: t.tok.to_string(),
                    location: t.loc,
                });
            }
            Tok::AnnotStart => {
                let t = ts.next();
                return Err(ScanError::Expected {
                    expected: "member declaration (annotations share the member's line)"
                        .to_string(),
                    found: t.tok.to_string(),
                    location: t.loc,
                });
            }
            Tok::Ident(ref w) if w == "enum" => {
                let e = consts::parse_enum(ts)?;
                consts::register_enum(constants, Some(&name), &e);
                enums.push(e);
                pending_doc.clear();
                continue;
            }
            Tok::Ident(ref w) if w == "public" || w == "private" || w == "protected" => {
                if ts.peek2().tok == Tok::Colon {
                    ts.next();
                    ts.next();
                    pending_doc.clear();
                    continue;
                }
            }
            _ => {}
        }
        let member_doc = pending_doc.join(" ");
        pending_doc.clear();
        let (member, line) = parse_member(ts, member_doc, constants)?;
        last_member_line = line;
        members.push(member);
    }
    let semi = expect_tok(ts, Tok::Semi, "`;` after struct")?;
    Ok((Struct { name, tag: Some(tag), doc, members, enums }, semi.offset + 1))
}

fn parse_member(
    ts: &mut Tokens<'_>,
    doc: String,
    constants: &IndexMap<String, Literal>,
) -> Result<(Variable, u32), ScanError> {
    let ty = parse_type(ts)?;
    let (name, _) = expect_ident(ts, "member name")?;
    let default = if ts.eat(&Tok::Eq) {
        Some(parse_literal(ts, constants, None)?.0)
    } else {
        None
    };
    let semi = expect_tok(ts, Tok::Semi, "`;` after member")?;

    let mut var = Variable { name, ty, doc, rename: None, constraints: Vec::new(), default };
    if ts.peek().tok == Tok::AnnotStart && ts.peek().loc.line == semi.loc.line {
        parse_annotations(ts, &mut var, constants)?;
    }
    Ok((var, semi.loc.line))
}

// ————————————————————————————————————————————————————————————————————————————
// ANNOTATIONS
// ————————————————————————————————————————————————————————————————————————————

fn parse_annotations(
    ts: &mut Tokens<'_>,
    var: &mut Variable,
    constants: &IndexMap<String, Literal>,
) -> Result<(), ScanError> {
    let start = ts.next(); // AnnotStart, caller checked
    loop {
        let t = ts.next();
        match t.tok {
            Tok::AnnotEnd => break,
            Tok::Ident(tag) => parse_one_annotation(ts, &tag, t.loc, var, constants)?,
            other => {
                return Err(expected_err("annotation tag", &other, t.loc));
            }
        }
    }
    if var.external_ref().is_some() && var.constraints.len() > 1 {
        return Err(ScanError::OperandType {
            tag: "REF".to_string(),
            member: var.name.clone(),
            detail: "REF replaces the verifier and cannot combine with other constraints"
                .to_string(),
            location: start.loc,
        });
    }
    Ok(())
}

fn parse_one_annotation(
    ts: &mut Tokens<'_>,
    tag: &str,
    tag_loc: Location,
    var: &mut Variable,
    constants: &IndexMap<String, Literal>,
) -> Result<(), ScanError> {
    match tag {
        "RENAME" => {
            expect_tok(ts, Tok::LParen, "`(` after RENAME")?;
            let t = ts.next();
            let key = match t.tok {
                Tok::Ident(s) | Tok::Str(s) => s,
                Tok::AnnotEnd => return Err(unterminated(tag, t.loc)),
                other => return Err(expected_err("dictionary key", &other, t.loc)),
            };
            close_annot_paren(ts, tag)?;
            var.rename = Some(key);
            Ok(())
        }
        "DESC" => {
            expect_tok(ts, Tok::LParen, "`(` after DESC")?;
            let t = ts.next();
            match t.tok {
                Tok::Str(s) => var.doc = s,
                Tok::AnnotEnd => return Err(unterminated(tag, t.loc)),
                other => return Err(expected_err("string literal", &other, t.loc)),
            }
            close_annot_paren(ts, tag)?;
            Ok(())
        }
        "REF" => {
            expect_tok(ts, Tok::LParen, "`(` after REF")?;
            let t = ts.next();
            let target = match t.tok {
                Tok::Ident(s) | Tok::Str(s) => s,
                Tok::AnnotEnd => return Err(unterminated(tag, t.loc)),
                other => return Err(expected_err("spec tag", &other, t.loc)),
            };
            close_annot_paren(ts, tag)?;
            var.constraints.push(Constraint::ExternalRef { tag: target });
            Ok(())
        }
        "DATE_TIME" => {
            let ops = parse_operand_list(ts, tag, constants)?;
            let kind = constraint_core(var, tag, tag_loc)?;
            check_tag_applies(tag, kind, &var.name, tag_loc)?;
            match ops.len() {
                0 => {
                    var.constraints.push(Constraint::DateTime { earliest: None, latest: None });
                    Ok(())
                }
                2 => {
                    let mut bounds = Vec::with_capacity(2);
                    for (lit, loc) in ops {
                        match lit {
                            Literal::Str(s) => {
                                check_datetime(&s, &var.name, loc)?;
                                bounds.push(s);
                            }
                            other => {
                                return Err(operand_err(
                                    tag,
                                    &var.name,
                                    format!("expected a timestamp string, got {}", other.kind_name()),
                                    loc,
                                ));
                            }
                        }
                    }
                    let latest = bounds.pop();
                    let earliest = bounds.pop();
                    var.constraints.push(Constraint::DateTime { earliest, latest });
                    Ok(())
                }
                n => Err(operand_err(
                    tag,
                    &var.name,
                    format!("DATE_TIME takes zero or two operands, got {n}"),
                    tag_loc,
                )),
            }
        }
        "NOT_EMPTY" | "ANNOTATION" | "COLOR" => {
            let ops = parse_operand_list(ts, tag, constants)?;
            if !ops.is_empty() {
                return Err(operand_err(
                    tag,
                    &var.name,
                    format!("{tag} takes no operands"),
                    tag_loc,
                ));
            }
            let kind = constraint_core(var, tag, tag_loc)?;
            check_tag_applies(tag, kind, &var.name, tag_loc)?;
            var.constraints.push(match tag {
                "NOT_EMPTY" => Constraint::NotEmpty,
                "ANNOTATION" => Constraint::Annotation,
                _ => Constraint::Color,
            });
            Ok(())
        }
        "IN_RANGE" | "NOT_IN_RANGE" | "LESS" | "LESS_EQ" | "GREATER" | "GREATER_EQ"
        | "UNEQUAL" | "IN_LIST" => {
            let ops = parse_operand_list(ts, tag, constants)?;
            let kind = constraint_core(var, tag, tag_loc)?;
            check_tag_applies(tag, kind, &var.name, tag_loc)?;
            let mut lits = Vec::with_capacity(ops.len());
            for (lit, loc) in ops {
                lits.push(coerce_operand(lit, kind, tag, &var.name, loc)?);
            }
            let constraint = match tag {
                "IN_RANGE" | "NOT_IN_RANGE" => {
                    if lits.len() != 2 {
                        return Err(operand_err(
                            tag,
                            &var.name,
                            format!("{tag} takes two operands, got {}", lits.len()),
                            tag_loc,
                        ));
                    }
                    let hi = lits.pop().unwrap_or(Literal::Int(0));
                    let lo = lits.pop().unwrap_or(Literal::Int(0));
                    if tag == "IN_RANGE" {
                        Constraint::InRange { lo, hi }
                    } else {
                        Constraint::NotInRange { lo, hi }
                    }
                }
                "IN_LIST" => {
                    if lits.is_empty() {
                        return Err(operand_err(
                            tag,
                            &var.name,
                            "IN_LIST needs at least one operand".to_string(),
                            tag_loc,
                        ));
                    }
                    Constraint::InList(lits)
                }
                single => {
                    if lits.len() != 1 {
                        return Err(operand_err(
                            tag,
                            &var.name,
                            format!("{tag} takes one operand, got {}", lits.len()),
                            tag_loc,
                        ));
                    }
                    let op = lits.pop().unwrap_or(Literal::Int(0));
                    match single {
                        "LESS" => Constraint::Less(op),
                        "LESS_EQ" => Constraint::LessEq(op),
                        "GREATER" => Constraint::Greater(op),
                        "GREATER_EQ" => Constraint::GreaterEq(op),
                        _ => Constraint::Unequal(op),
                    }
                }
            };
            var.constraints.push(constraint);
            Ok(())
        }
        other => Err(ScanError::Expected {
            expected: "annotation tag".to_string(),
            found: other.to_string(),
            location: tag_loc,
        }),
    }
}

fn parse_operand_list(
    ts: &mut Tokens<'_>,
    tag: &str,
    constants: &IndexMap<String, Literal>,
) -> Result<Vec<(Literal, Location)>, ScanError> {
    expect_tok(ts, Tok::LParen, "`(` opening the annotation argument list")?;
    let mut ops = Vec::new();
    if ts.eat(&Tok::RParen) {
        return Ok(ops);
    }
    loop {
        let (is_end, ploc) = {
            let p = ts.peek();
            (p.tok == Tok::AnnotEnd, p.loc)
        };
        if is_end {
            return Err(unterminated(tag, ploc));
        }
        ops.push(parse_literal(ts, constants, Some(tag))?);
        if ts.eat(&Tok::Comma) {
            continue;
        }
        let t = ts.next();
        match t.tok {
            Tok::RParen => return Ok(ops),
            Tok::AnnotEnd => return Err(unterminated(tag, t.loc)),
            other => return Err(expected_err("`,` or `)`", &other, t.loc)),
        }
    }
}

fn close_annot_paren(ts: &mut Tokens<'_>, tag: &str) -> Result<(), ScanError> {
    let t = ts.next();
    match t.tok {
        Tok::RParen => Ok(()),
        Tok::AnnotEnd => Err(unterminated(tag, t.loc)),
        other => Err(expected_err("`)`", &other, t.loc)),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// OPERAND TYPING
// ————————————————————————————————————————————————————————————————————————————

/// Constraints attach to the innermost non-container type; that type must
/// be a basic kind.
fn constraint_core(var: &Variable, tag: &str, loc: Location) -> Result<BasicKind, ScanError> {
    match var.ty.core() {
        VariableType::Basic(k) => Ok(*k),
        other => Err(operand_err(
            tag,
            &var.name,
            format!("constraints are not supported on `{other}` members"),
            loc,
        )),
    }
}

fn check_tag_applies(
    tag: &str,
    kind: BasicKind,
    member: &str,
    loc: Location,
) -> Result<(), ScanError> {
    let ok = match tag {
        "IN_RANGE" | "NOT_IN_RANGE" | "LESS" | "LESS_EQ" | "GREATER" | "GREATER_EQ" => {
            kind.is_numeric_scalar()
                || kind.int_vector_arity().is_some()
                || kind.float_vector_arity().is_some()
        }
        "UNEQUAL" | "IN_LIST" => !kind.is_matrix() && kind != BasicKind::Dictionary,
        "NOT_EMPTY" => kind.is_stringish(),
        "ANNOTATION" | "COLOR" | "DATE_TIME" => kind == BasicKind::String,
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(operand_err(
            tag,
            member,
            format!("{tag} does not apply to {} members", kind.canonical_name()),
            loc,
        ))
    }
}

/// Check an operand against the member's core kind, folding integer
/// literals into doubles where the member is float-valued.
fn coerce_operand(
    lit: Literal,
    kind: BasicKind,
    tag: &str,
    member: &str,
    loc: Location,
) -> Result<Literal, ScanError> {
    use BasicKind::*;
    let mismatch = |lit: &Literal, wanted: &str| {
        Err(operand_err(
            tag,
            member,
            format!("expected {wanted}, got a {} operand", lit.kind_name()),
            loc,
        ))
    };
    match kind {
        Integer => match lit {
            Literal::Int(_) => Ok(lit),
            other => mismatch(&other, "an integer"),
        },
        Float | Double => match lit {
            Literal::Int(v) => Ok(Literal::Float(OrderedFloat(v as f64))),
            Literal::Float(_) => Ok(lit),
            other => mismatch(&other, "a number"),
        },
        Boolean => match lit {
            Literal::Bool(_) => Ok(lit),
            other => mismatch(&other, "a boolean"),
        },
        String | Path => match lit {
            Literal::Str(_) => Ok(lit),
            other => mismatch(&other, "a string"),
        },
        Int2 | Int3 | Int4 | Float2 | Float3 | Float4 => {
            let arity = kind
                .int_vector_arity()
                .or_else(|| kind.float_vector_arity())
                .unwrap_or(0);
            let comps = match lit {
                Literal::Vector(v) => v,
                other => return mismatch(&other, "a component list"),
            };
            if comps.len() != arity {
                return Err(operand_err(
                    tag,
                    member,
                    format!(
                        "{} takes {arity} components, got {}",
                        kind.canonical_name(),
                        comps.len()
                    ),
                    loc,
                ));
            }
            let comp_kind = if kind.int_vector_arity().is_some() { Integer } else { Double };
            let mut out = Vec::with_capacity(comps.len());
            for c in comps {
                out.push(coerce_operand(c, comp_kind, tag, member, loc)?);
            }
            Ok(Literal::Vector(out))
        }
        Mat2 | Mat3 | Mat4 | DMat2 | DMat3 | DMat4 | Dictionary => Err(operand_err(
            tag,
            member,
            format!("no constraint operands apply to {} members", kind.canonical_name()),
            loc,
        )),
    }
}

fn check_datetime(s: &str, member: &str, loc: Location) -> Result<(), ScanError> {
    match chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        Ok(_) => Ok(()),
        Err(e) => Err(operand_err(
            "DATE_TIME",
            member,
            format!("`{s}` is not a `%Y-%m-%dT%H:%M:%S` timestamp: {e}"),
            loc,
        )),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// FUNCTIONS
// ————————————————————————————————————————————————————————————————————————————

fn scan_function(
    ts: &mut Tokens<'_>,
    doc: String,
    constants: &IndexMap<String, Literal>,
) -> Result<Function, ScanError> {
    expect_keyword(ts, "SCRIPT_API")?;
    marker_tok(ts, Tok::LParen, "SCRIPT_API expects `()`")?;
    marker_tok(ts, Tok::RParen, "SCRIPT_API expects `()`")?;

    let ret = if matches!(&ts.peek().tok, Tok::Ident(w) if w == "void") {
        ts.next();
        None
    } else {
        Some(parse_type(ts)?)
    };
    let (name, _) = expect_ident(ts, "function name")?;
    expect_tok(ts, Tok::LParen, "`(` opening the parameter list")?;
    let mut params = Vec::new();
    if !ts.eat(&Tok::RParen) {
        loop {
            params.push(parse_param(ts, constants)?);
            if ts.eat(&Tok::Comma) {
                continue;
            }
            expect_tok(ts, Tok::RParen, "`)` after parameters")?;
            break;
        }
    }
    expect_tok(ts, Tok::Semi, "`;` after declaration")?;
    Ok(Function { name, doc, ret, params })
}

fn parse_param(
    ts: &mut Tokens<'_>,
    constants: &IndexMap<String, Literal>,
) -> Result<Param, ScanError> {
    let mut ty = parse_type(ts)?;
    let (name, _) = expect_ident(ts, "parameter name")?;
    let default = if ts.eat(&Tok::Eq) {
        let (lit, loc) = parse_literal(ts, constants, None)?;
        let (_, inner) = ty.peel_nullable();
        let lit = match inner {
            VariableType::Basic(k) if !k.is_matrix() && *k != BasicKind::Dictionary => {
                coerce_operand(lit, *k, "default", &name, loc)?
            }
            VariableType::Sum(_) => lit,
            other => {
                return Err(operand_err(
                    "default",
                    &name,
                    format!("defaults are not supported on `{other}` parameters"),
                    loc,
                ));
            }
        };
        Some(lit)
    } else {
        None
    };
    // A defaulted parameter may be omitted by the caller, so it is nullable
    // on the wire.
    if default.is_some() && !matches!(ty, VariableType::Nullable(_)) {
        ty = VariableType::Nullable(Box::new(ty));
    }
    Ok(Param { name, ty, default })
}

// ————————————————————————————————————————————————————————————————————————————
// LITERALS
// ————————————————————————————————————————————————————————————————————————————

/// Literal operand: number (optionally negated), string, boolean, a named
/// constant (possibly `A::B`-qualified), or a parenthesized component list.
/// `annot` carries the annotation tag so an end-of-line inside the operand
/// reports as an unterminated annotation.
fn parse_literal(
    ts: &mut Tokens<'_>,
    constants: &IndexMap<String, Literal>,
    annot: Option<&str>,
) -> Result<(Literal, Location), ScanError> {
    let t = ts.next();
    let loc = t.loc;
    match t.tok {
        Tok::AnnotEnd if annot.is_some() => Err(unterminated(annot.unwrap_or(""), loc)),
        Tok::Int(v) => Ok((Literal::Int(v), loc)),
        Tok::Float(v) => Ok((Literal::Float(OrderedFloat(v)), loc)),
        Tok::Str(s) => Ok((Literal::Str(s), loc)),
        Tok::Minus => {
            let n = ts.next();
            match n.tok {
                Tok::Int(v) => Ok((Literal::Int(-v), loc)),
                Tok::Float(v) => Ok((Literal::Float(OrderedFloat(-v)), loc)),
                other => Err(expected_err("number after `-`", &other, n.loc)),
            }
        }
        Tok::Ident(w) if w == "true" => Ok((Literal::Bool(true), loc)),
        Tok::Ident(w) if w == "false" => Ok((Literal::Bool(false), loc)),
        Tok::Ident(first) => {
            let mut path = first;
            while ts.eat(&Tok::ColonColon) {
                let (seg, _) = expect_ident(ts, "identifier after `::`")?;
                path.push_str("::");
                path.push_str(&seg);
            }
            match constants.get(&path) {
                Some(lit) => Ok((lit.clone(), loc)),
                None => Err(ScanError::UnknownConstant { name: path, location: loc }),
            }
        }
        Tok::LParen => {
            let mut comps = Vec::new();
            loop {
                let (is_end, ploc) = {
                    let p = ts.peek();
                    (p.tok == Tok::AnnotEnd, p.loc)
                };
                if is_end {
                    if let Some(tag) = annot {
                        return Err(unterminated(tag, ploc));
                    }
                }
                let (c, _) = parse_literal(ts, constants, annot)?;
                comps.push(c);
                if ts.eat(&Tok::Comma) {
                    continue;
                }
                let t2 = ts.next();
                match t2.tok {
                    Tok::RParen => break,
                    Tok::AnnotEnd if annot.is_some() => {
                        return Err(unterminated(annot.unwrap_or(""), t2.loc));
                    }
                    other => return Err(expected_err("`,` or `)` in component list", &other, t2.loc)),
                }
            }
            Ok((Literal::Vector(comps), loc))
        }
        other => Err(expected_err("literal", &other, loc)),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TOKEN HELPERS
// ————————————————————————————————————————————————————————————————————————————

pub(crate) fn expect_tok(ts: &mut Tokens<'_>, want: Tok, what: &str) -> Result<Token, ScanError> {
    let t = ts.next();
    if t.tok == want {
        Ok(t)
    } else {
        Err(ScanError::Expected {
            expected: what.to_string(),
            found: t.tok.to_string(),
            location: t.loc,
        })
    }
}

pub(crate) fn expect_ident(
    ts: &mut Tokens<'_>,
    what: &str,
) -> Result<(String, Location), ScanError> {
    let t = ts.next();
    match t.tok {
        Tok::Ident(s) => Ok((s, t.loc)),
        other => Err(ScanError::Expected {
            expected: what.to_string(),
            found: other.to_string(),
            location: t.loc,
        }),
    }
}

pub(crate) fn expect_keyword(ts: &mut Tokens<'_>, kw: &str) -> Result<Token, ScanError> {
    let t = ts.next();
    match &t.tok {
        Tok::Ident(w) if w == kw => Ok(t),
        other => Err(ScanError::Expected {
            expected: format!("`{kw}`"),
            found: other.to_string(),
            location: t.loc,
        }),
    }
}

fn marker_tok(ts: &mut Tokens<'_>, want: Tok, detail: &str) -> Result<Token, ScanError> {
    let t = ts.next();
    if t.tok == want {
        Ok(t)
    } else {
        Err(ScanError::Marker {
            detail: format!("{detail}, found `{}`", t.tok),
            location: t.loc,
        })
    }
}

fn expected_err(expected: &str, found: &Tok, location: Location) -> ScanError {
    ScanError::Expected {
        expected: expected.to_string(),
        found: found.to_string(),
        location,
    }
}

fn unterminated(tag: &str, location: Location) -> ScanError {
    ScanError::UnterminatedAnnotation { tag: tag.to_string(), location }
}

fn operand_err(tag: &str, member: &str, detail: String, location: Location) -> ScanError {
    ScanError::OperandType {
        tag: tag.to_string(),
        member: member.to_string(),
        detail,
        location,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::parse_str;

    fn scan_ok(src: &str) -> Model {
        match scan(src) {
            Ok(m) => m,
            Err(e) => panic!("scan failed: {e}"),
        }
    }

    const TURRET: &str = r#"
#pragma once

const double MAX_YAW = 6.28318;

// Turret placement and tuning.
// Read from the entity dictionary.
CONFIG_SPEC(Turret)
struct TurretSettings {
    // Yaw speed in radians per second.
    double yaw_speed; //! IN_RANGE(0.1, MAX_YAW)

    Nullable<String> label; //! NOT_EMPTY() RENAME(DisplayLabel)

    enum Mount { Fixed = 1, Gimbal = 2 };

    int mount = 1; //! IN_LIST(Fixed, Gimbal)

    Map<String, Double> damage_scale; //! GREATER(0.0)
};
"#;

    #[test]
    fn struct_scan_collects_members_in_declaration_order() {
        let m = scan_ok(TURRET);
        assert_eq!(m.structs.len(), 1);
        let st = &m.structs[0];
        assert_eq!(st.tag.as_deref(), Some("Turret"));
        assert_eq!(st.name, "TurretSettings");
        assert_eq!(st.doc, "Turret placement and tuning. Read from the entity dictionary.");
        let names: Vec<&str> = st.members.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["yaw_speed", "label", "mount", "damage_scale"]);
    }

    #[test]
    fn constant_operands_resolve_and_coerce() {
        let m = scan_ok(TURRET);
        let yaw = &m.structs[0].members[0];
        assert_eq!(yaw.doc, "Yaw speed in radians per second.");
        assert_eq!(
            yaw.constraints,
            vec![Constraint::InRange {
                lo: Literal::Float(OrderedFloat(0.1)),
                hi: Literal::Float(OrderedFloat(6.28318)),
            }]
        );
        let mount = &m.structs[0].members[2];
        assert_eq!(
            mount.constraints,
            vec![Constraint::InList(vec![Literal::Int(1), Literal::Int(2)])]
        );
        assert_eq!(mount.default, Some(Literal::Int(1)));
    }

    #[test]
    fn rename_overrides_the_derived_key() {
        let m = scan_ok(TURRET);
        let label = &m.structs[0].members[1];
        assert_eq!(label.key(), "DisplayLabel");
        assert_eq!(label.constraints, vec![Constraint::NotEmpty]);
    }

    #[test]
    fn nested_enum_belongs_to_the_struct_and_registers_qualified_names() {
        let m = scan_ok(TURRET);
        assert_eq!(m.structs[0].enums.len(), 1);
        assert!(m.enums.is_empty());
        assert_eq!(m.constants.get("Mount::Gimbal"), Some(&Literal::Int(2)));
        assert_eq!(
            m.constants.get("TurretSettings::Mount::Gimbal"),
            Some(&Literal::Int(2))
        );
    }

    #[test]
    fn trailing_remark_on_a_member_is_not_the_next_members_doc() {
        let src = "\
CONFIG_SPEC(T)
struct S {
    int a; // tweak later
    int b;
};
";
        let m = scan_ok(src);
        assert_eq!(m.structs[0].members[1].doc, "");
    }

    #[test]
    fn markers_in_comments_strings_and_preprocessor_lines_are_ignored() {
        let src = "\
// CONFIG_SPEC(Ghost) in prose
#define CONFIG_SPEC(Tag)
#define SCRIPT_API()
const char* s = \"SCRIPT_API() text\";
/* SCRIPT_API() */
";
        let m = scan_ok(src);
        assert!(m.is_empty());
    }

    #[test]
    fn marker_without_argument_list_is_a_marker_error() {
        let err = scan("CONFIG_SPEC Turret\nstruct T {};").unwrap_err();
        assert!(matches!(err, ScanError::Marker { .. }), "{err}");
    }

    #[test]
    fn unknown_constant_operand_is_an_error() {
        let src = "\
CONFIG_SPEC(T)
struct S {
    double v; //! LESS(UNDECLARED)
};
";
        let err = scan(src).unwrap_err();
        match err {
            ScanError::UnknownConstant { name, location } => {
                assert_eq!(name, "UNDECLARED");
                assert_eq!(location.line, 3);
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn operand_kind_mismatches_are_rejected() {
        let string_on_double = "\
CONFIG_SPEC(T)
struct S {
    double v; //! IN_RANGE(\"a\", \"b\")
};
";
        assert!(matches!(
            scan(string_on_double).unwrap_err(),
            ScanError::OperandType { .. }
        ));

        let range_on_string = "\
CONFIG_SPEC(T)
struct S {
    String v; //! IN_RANGE(1, 2)
};
";
        assert!(matches!(
            scan(range_on_string).unwrap_err(),
            ScanError::OperandType { .. }
        ));

        let not_empty_on_int = "\
CONFIG_SPEC(T)
struct S {
    int v; //! NOT_EMPTY()
};
";
        assert!(matches!(
            scan(not_empty_on_int).unwrap_err(),
            ScanError::OperandType { .. }
        ));
    }

    #[test]
    fn vector_operands_check_component_count() {
        let good = "\
CONFIG_SPEC(T)
struct S {
    Int2 v; //! IN_RANGE((1, 0), (4, 2))
};
";
        let m = scan_ok(good);
        assert_eq!(
            m.structs[0].members[0].constraints,
            vec![Constraint::InRange {
                lo: Literal::Vector(vec![Literal::Int(1), Literal::Int(0)]),
                hi: Literal::Vector(vec![Literal::Int(4), Literal::Int(2)]),
            }]
        );

        let bad = "\
CONFIG_SPEC(T)
struct S {
    Int2 v; //! IN_RANGE((1, 0, 9), (4, 2))
};
";
        assert!(matches!(scan(bad).unwrap_err(), ScanError::OperandType { .. }));
    }

    #[test]
    fn unterminated_annotation_reports_the_tag() {
        let src = "\
CONFIG_SPEC(T)
struct S {
    double v; //! IN_RANGE(0.1,
};
";
        let err = scan(src).unwrap_err();
        match err {
            ScanError::UnterminatedAnnotation { tag, location } => {
                assert_eq!(tag, "IN_RANGE");
                assert_eq!(location.line, 3);
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn annotation_on_its_own_line_is_rejected() {
        let src = "\
CONFIG_SPEC(T)
struct S {
    double v;
    //! LESS(1.0)
};
";
        assert!(matches!(scan(src).unwrap_err(), ScanError::Expected { .. }));
    }

    #[test]
    fn ref_does_not_combine_with_other_constraints() {
        let src = "\
CONFIG_SPEC(T)
struct S {
    Dictionary hull; //! REF(Material)
    double x; //! GREATER(0.0) REF(Other)
};
";
        let err = scan(src).unwrap_err();
        match err {
            ScanError::OperandType { tag, .. } => assert_eq!(tag, "REF"),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn map_member_with_non_string_key_fails_type_parse() {
        let src = "\
CONFIG_SPEC(T)
struct S {
    Map<Integer, Double> m;
};
";
        assert!(matches!(scan(src).unwrap_err(), ScanError::Type(_)));
    }

    #[test]
    fn date_time_bounds_are_validated() {
        let good = "\
CONFIG_SPEC(T)
struct S {
    String t; //! DATE_TIME(\"2000-01-01T00:00:00\", \"2099-12-31T23:59:59\")
};
";
        let m = scan_ok(good);
        assert_eq!(
            m.structs[0].members[0].constraints,
            vec![Constraint::DateTime {
                earliest: Some("2000-01-01T00:00:00".to_string()),
                latest: Some("2099-12-31T23:59:59".to_string()),
            }]
        );

        let bad = "\
CONFIG_SPEC(T)
struct S {
    String t; //! DATE_TIME(\"not-a-date\", \"2099-12-31T23:59:59\")
};
";
        assert!(matches!(scan(bad).unwrap_err(), ScanError::OperandType { .. }));
    }

    #[test]
    fn desc_overrides_the_comment_doc() {
        let src = "\
CONFIG_SPEC(T)
struct S {
    // From the comment.
    double v; //! DESC(\"From the annotation.\")
};
";
        let m = scan_ok(src);
        assert_eq!(m.structs[0].members[0].doc, "From the annotation.");
    }

    #[test]
    fn function_scan_reads_signature_docs_and_defaults() {
        let src = "\
// Spawns a wave of the given archetype.
// Returns success and the spawned count.
SCRIPT_API()
Tuple<Boolean, Integer> spawn_wave(String archetype, Float3 origin, Integer count = 1);

SCRIPT_API()
void clear_waves();
";
        let m = scan_ok(src);
        assert_eq!(m.functions.len(), 2);
        let f = &m.functions[0];
        assert_eq!(f.name, "spawn_wave");
        assert_eq!(f.derived_name(), "SpawnWave");
        assert_eq!(
            f.doc,
            "Spawns a wave of the given archetype. Returns success and the spawned count."
        );
        assert_eq!(f.ret, Some(parse_str("Tuple<Boolean, Integer>").unwrap()));
        assert_eq!(f.params.len(), 3);
        assert_eq!(f.params[2].ty, parse_str("Nullable<Integer>").unwrap());
        assert_eq!(f.params[2].default, Some(Literal::Int(1)));
        assert_eq!(m.functions[1].ret, None);
        assert!(m.functions[1].params.is_empty());
    }

    #[test]
    fn defaulted_double_parameter_coerces_integer_literal() {
        let src = "SCRIPT_API()\nvoid set_scale(double factor = 2);";
        let m = scan_ok(src);
        assert_eq!(
            m.functions[0].params[0].default,
            Some(Literal::Float(OrderedFloat(2.0)))
        );
        assert_eq!(
            m.functions[0].params[0].ty,
            parse_str("Nullable<Double>").unwrap()
        );
    }

    #[test]
    fn already_nullable_defaulted_parameter_is_not_rewrapped() {
        let src = "SCRIPT_API()\nvoid f(Nullable<Integer> n = 3);";
        let m = scan_ok(src);
        assert_eq!(m.functions[0].params[0].ty, parse_str("Nullable<Integer>").unwrap());
    }

    #[test]
    fn access_specifiers_are_skipped() {
        let src = "\
CONFIG_SPEC(T)
struct S {
public:
    int a;
private:
    int b;
};
";
        let m = scan_ok(src);
        assert_eq!(m.structs[0].members.len(), 2);
    }

    #[test]
    fn doc_runs_stop_at_blank_lines() {
        let src = "\
// Unrelated remark.

// Actual doc.
SCRIPT_API()
void f();
";
        let m = scan_ok(src);
        assert_eq!(m.functions[0].doc, "Actual doc.");
    }
}
