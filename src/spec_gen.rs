//! Validation-spec generator.
//!
//! For every tagged struct this emits two functions into the companion
//! file:
//!
//! * `spec::Tree Build<Tag>Spec()` — one `tree.Add(key, optional,
//!   verifier)` entry per member, in declaration order. The verifier is the
//!   member's base verifier (chosen by its core kind), wrapped by one
//!   constraint decorator per annotation in written order, and wrapped by
//!   one `spec::Container` per `Array`/`Map` layer. `Dictionary` cores and
//!   `REF` members validate through `spec::Reference`.
//! * `bool Extract<Struct>(const spec::Dict&, <Struct>&)` — validates
//!   against the built tree, then fills the native struct member by member.
//!   Absent nullable members are skipped; containers loop with
//!   depth-numbered locals so nesting never collides.
//!
//! Output depends only on the model, so generation is deterministic and
//! idempotent.

use crate::emit::{SourceWriter, fmt_double, quote};
use crate::error::GenError;
use crate::model::{Constraint, Literal, Struct, Variable};
use crate::ty::{BasicKind, VariableType};

pub struct SpecGen {
    w: SourceWriter,
}

impl SpecGen {
    pub fn new() -> Self {
        SpecGen { w: SourceWriter::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.w.is_empty()
    }

    pub fn into_string(self) -> String {
        self.w.into_string()
    }

    /// Emit the build and extract functions for one struct, separated by a
    /// blank line.
    pub fn emit(&mut self, st: &Struct) -> Result<(), GenError> {
        let tag = match st.tag.as_deref() {
            Some(tag) => tag,
            None => return Err(GenError::UntaggedStruct { name: st.name.clone() }),
        };
        if !self.w.is_empty() {
            self.w.blank();
        }
        self.emit_build(tag, st)?;
        self.w.blank();
        self.emit_extract(tag, st)?;
        Ok(())
    }

    // ————————————————————————————————————————————————————————————————————
    // BUILD FUNCTION
    // ————————————————————————————————————————————————————————————————————

    fn emit_build(&mut self, tag: &str, st: &Struct) -> Result<(), GenError> {
        self.w.open(&format!("spec::Tree Build{tag}Spec()"));
        self.w.line(&format!("spec::Tree tree({});", quote(tag)));
        for m in &st.members {
            let (optional, inner) = m.ty.peel_nullable();
            let verifier = verifier_expr(inner, m, &st.name)?;
            self.w.line(&format!(
                "tree.Add({}, {}, {});",
                quote(&m.key()),
                bool_lit(optional),
                verifier
            ));
        }
        self.w.line("return tree;");
        self.w.close("}");
        Ok(())
    }

    // ————————————————————————————————————————————————————————————————————
    // EXTRACT FUNCTION
    // ————————————————————————————————————————————————————————————————————

    fn emit_extract(&mut self, tag: &str, st: &Struct) -> Result<(), GenError> {
        self.w.open(&format!(
            "bool Extract{}(const spec::Dict& data, {}& out)",
            st.name, st.name
        ));
        self.w.open(&format!("if (!spec::Validate(Build{tag}Spec(), data))"));
        self.w.line("return false;");
        self.w.close("}");
        for m in &st.members {
            self.emit_member_extract(m)?;
        }
        self.w.line("return true;");
        self.w.close("}");
        Ok(())
    }

    fn emit_member_extract(&mut self, m: &Variable) -> Result<(), GenError> {
        let key = m.key();
        let get = format!("spec::Get(data, {})", quote(&key));
        let dst = format!("out.{}", m.name);
        let (nullable, inner) = m.ty.peel_nullable();
        if nullable {
            self.w.open(&format!("if (spec::Has(data, {}))", quote(&key)));
            if inner.is_container() {
                self.w.line(&format!("{inner} t0;"));
                self.extract_into(inner, &get, "t0", 0)?;
                self.w.line(&format!("{dst} = t0;"));
            } else {
                self.extract_into(inner, &get, &dst, 0)?;
            }
            self.w.close("}");
        } else if inner.is_container() {
            self.w.open_block();
            self.extract_into(inner, &get, &dst, 0)?;
            self.w.close("}");
        } else {
            self.extract_into(inner, &get, &dst, 0)?;
        }
        Ok(())
    }

    /// Fill `dst` (a native lvalue of type `ty`, nullability already peeled
    /// by the caller) from the spec value expression `src`.
    fn extract_into(
        &mut self,
        ty: &VariableType,
        src: &str,
        dst: &str,
        depth: usize,
    ) -> Result<(), GenError> {
        match ty {
            VariableType::Basic(kind) => {
                self.w.line(&format!(
                    "{dst} = spec::As{}({src});",
                    kind.canonical_name()
                ));
                Ok(())
            }
            VariableType::Nullable(inner) => self.extract_into(inner, src, dst, depth),
            VariableType::Sequence(elem_ty) | VariableType::Mapping(elem_ty) => {
                let mapping = matches!(ty, VariableType::Mapping(_));
                let v = format!("v{depth}");
                let i = format!("i{depth}");
                let e = format!("e{depth}");
                self.w.line(&format!("const spec::Value& {v} = {src};"));
                self.w.open(&format!(
                    "for (int {i} = 0; {i} < spec::Count({v}); ++{i})"
                ));
                self.w.line(&format!("{elem_ty} {e};"));
                let at = format!("spec::At({v}, {i})");
                let (elem_null, elem) = elem_ty.peel_nullable();
                if elem_null {
                    self.w.open(&format!("if (spec::IsNull({at}))"));
                    self.w.line(&format!("{e}.Clear();"));
                    self.w.close("}");
                    self.w.open("else");
                    if matches!(elem, VariableType::Basic(_)) {
                        self.extract_into(elem, &at, &e, depth + 1)?;
                    } else {
                        let t = format!("t{}", depth + 1);
                        self.w.line(&format!("{elem} {t};"));
                        self.extract_into(elem, &at, &t, depth + 1)?;
                        self.w.line(&format!("{e} = {t};"));
                    }
                    self.w.close("}");
                } else {
                    self.extract_into(elem, &at, &e, depth + 1)?;
                }
                if mapping {
                    self.w
                        .line(&format!("{dst}.Insert(spec::KeyAt({v}, {i}), {e});"));
                } else {
                    self.w.line(&format!("{dst}.Append({e});"));
                }
                self.w.close("}");
                Ok(())
            }
            VariableType::Sum(_) => Err(unrepresentable("a Variant member", dst)),
            VariableType::Tuple(_) => Err(unrepresentable("a Tuple member", dst)),
        }
    }
}

impl Default for SpecGen {
    fn default() -> Self {
        SpecGen::new()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// VERIFIER EXPRESSIONS
// ————————————————————————————————————————————————————————————————————————————

fn verifier_expr(ty: &VariableType, m: &Variable, owner: &str) -> Result<String, GenError> {
    match ty {
        VariableType::Sequence(inner) | VariableType::Mapping(inner) => {
            let (optional, elem) = inner.peel_nullable();
            let child = verifier_expr(elem, m, owner)?;
            Ok(format!(
                "spec::Container(\"*\", {}, {child})",
                bool_lit(optional)
            ))
        }
        VariableType::Nullable(inner) => verifier_expr(inner, m, owner),
        VariableType::Basic(kind) => Ok(base_with_wrappers(*kind, m)),
        VariableType::Sum(_) => Err(GenError::Unrepresentable {
            what: "a Variant member".to_string(),
            context: format!("struct `{owner}` member `{}`", m.name),
        }),
        VariableType::Tuple(_) => Err(GenError::Unrepresentable {
            what: "a Tuple member".to_string(),
            context: format!("struct `{owner}` member `{}`", m.name),
        }),
    }
}

/// Base verifier for the member's core kind, decorated by one wrapper per
/// constraint in written order (the last annotation is the outermost
/// wrapper). `REF` members validate through a reference instead; the
/// scanner guarantees `REF` stands alone.
fn base_with_wrappers(kind: BasicKind, m: &Variable) -> String {
    if let Some(tag) = m.external_ref() {
        return format!("spec::Reference({})", quote(tag));
    }
    let mut expr = match base_ctor(kind) {
        Some(name) => format!("spec::{name}()"),
        None => "spec::Reference(\"\")".to_string(),
    };
    for c in &m.constraints {
        expr = wrap_constraint(expr, c, kind);
    }
    expr
}

/// `None` for `Dictionary`, which validates as a reference to the open
/// dictionary spec.
fn base_ctor(kind: BasicKind) -> Option<&'static str> {
    use BasicKind::*;
    Some(match kind {
        Boolean => "BaseBoolean",
        Integer => "BaseInteger",
        Float | Double => "BaseDouble",
        String => "BaseString",
        Path => "BasePath",
        Int2 => "BaseInt2",
        Int3 => "BaseInt3",
        Int4 => "BaseInt4",
        Float2 => "BaseFloat2",
        Float3 => "BaseFloat3",
        Float4 => "BaseFloat4",
        Mat2 => "BaseMat2",
        Mat3 => "BaseMat3",
        Mat4 => "BaseMat4",
        DMat2 => "BaseDMat2",
        DMat3 => "BaseDMat3",
        DMat4 => "BaseDMat4",
        Dictionary => return None,
    })
}

fn wrap_constraint(inner: String, c: &Constraint, kind: BasicKind) -> String {
    match c {
        Constraint::InRange { lo, hi } => {
            format!("spec::InRange({inner}, {}, {})", operand(lo, kind), operand(hi, kind))
        }
        Constraint::NotInRange { lo, hi } => {
            format!("spec::NotInRange({inner}, {}, {})", operand(lo, kind), operand(hi, kind))
        }
        Constraint::Less(v) => format!("spec::Less({inner}, {})", operand(v, kind)),
        Constraint::LessEq(v) => format!("spec::LessEq({inner}, {})", operand(v, kind)),
        Constraint::Greater(v) => format!("spec::Greater({inner}, {})", operand(v, kind)),
        Constraint::GreaterEq(v) => format!("spec::GreaterEq({inner}, {})", operand(v, kind)),
        Constraint::Unequal(v) => format!("spec::Unequal({inner}, {})", operand(v, kind)),
        Constraint::InList(items) => {
            let parts: Vec<String> = items.iter().map(|v| operand(v, kind)).collect();
            format!("spec::InList({inner}, {{ {} }})", parts.join(", "))
        }
        Constraint::NotEmpty => format!("spec::NotEmpty({inner})"),
        Constraint::Annotation => format!("spec::Annotation({inner})"),
        Constraint::Color => format!("spec::Color({inner})"),
        Constraint::DateTime { earliest: Some(e), latest: Some(l) } => {
            format!("spec::DateTime({inner}, {}, {})", quote(e), quote(l))
        }
        Constraint::DateTime { .. } => format!("spec::DateTime({inner})"),
        // REF never coexists with wrappers; handled in base_with_wrappers.
        Constraint::ExternalRef { .. } => inner,
    }
}

/// Render one operand. Component lists become the vector constructor for
/// the member's kind, e.g. `spec::Int2(1, 0)`.
fn operand(lit: &Literal, kind: BasicKind) -> String {
    match lit {
        Literal::Int(v) => v.to_string(),
        Literal::Float(v) => fmt_double(v.into_inner()),
        Literal::Bool(b) => b.to_string(),
        Literal::Str(s) => quote(s),
        Literal::Vector(comps) => {
            let comp_kind = if kind.int_vector_arity().is_some() {
                BasicKind::Integer
            } else {
                BasicKind::Double
            };
            let parts: Vec<String> = comps.iter().map(|c| operand(c, comp_kind)).collect();
            format!("spec::{}({})", kind.canonical_name(), parts.join(", "))
        }
    }
}

fn bool_lit(b: bool) -> &'static str {
    if b { "true" } else { "false" }
}

fn unrepresentable(what: &str, context: &str) -> GenError {
    GenError::Unrepresentable { what: what.to_string(), context: context.to_string() }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
