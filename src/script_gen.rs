//! Scripting-binding generator.
//!
//! For every annotated free function this emits a
//! `script::FunctionDef Bind<Name>()` factory: metadata first (original
//! name, help text, result display, one `AddParam` per parameter), then a
//! `callable` lambda that reads arguments off the script stack, calls the
//! native function and pushes the result back, returning the pushed value
//! count. Any argument that fails its check reports through
//! `script::ArgError` with the parameter's display string.
//!
//! Variants marshal by stack shape: each alternative claims the incoming
//! shapes it can absorb (nil, boolean, number, string, array, map) and two
//! alternatives claiming the same shape are rejected at generation time.
//! Tuples are legal only as the whole return type and expand to one push
//! per element.

use crate::emit::{SourceWriter, fmt_double, quote};
use crate::error::GenError;
use crate::model::{Function, Literal, Param};
use crate::ty::{BasicKind, VariableType};

pub struct ScriptGen {
    w: SourceWriter,
}

impl ScriptGen {
    pub fn new() -> Self {
        ScriptGen { w: SourceWriter::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.w.is_empty()
    }

    pub fn into_string(self) -> String {
        self.w.into_string()
    }

    pub fn emit(&mut self, f: &Function) -> Result<(), GenError> {
        validate(f)?;

        if !self.w.is_empty() {
            self.w.blank();
        }
        self.w.open(&format!("script::FunctionDef Bind{}()", f.derived_name()));
        self.w.line(&format!("script::FunctionDef def({});", quote(&f.name)));
        self.w.line(&format!("def.help = {};", quote(&f.doc)));
        if let Some(ret) = &f.ret {
            self.w.line(&format!("def.result = {};", quote(&ret.display_string())));
        }
        for p in &f.params {
            self.w.line(&format!(
                "def.AddParam({}, {});",
                quote(&p.name),
                quote(&p.ty.display_string())
            ));
        }

        self.w.open("def.callable = [](script::Stack& st) -> int");
        if f.params.is_empty() && f.ret.is_none() {
            self.w.line("(void)st;");
        }
        for (idx, p) in f.params.iter().enumerate() {
            self.emit_param(idx, p)?;
        }
        self.emit_call(f)?;
        self.w.close("};");
        self.w.line("return def;");
        self.w.close("}");
        Ok(())
    }

    // ————————————————————————————————————————————————————————————————————
    // ARGUMENT READS
    // ————————————————————————————————————————————————————————————————————

    fn emit_param(&mut self, idx: usize, p: &Param) -> Result<(), GenError> {
        let arg = idx + 1;
        let a = format!("a{idx}");
        let ctx = ArgCtx { index: arg, display: p.ty.display_string() };
        self.w.line(&format!("{} {a};", p.ty));
        let (nullable, inner) = p.ty.peel_nullable();
        if nullable {
            // Absent or nil leaves the parameter empty (or applies the
            // recorded default).
            self.w.open(&format!("if (script::Top(st) >= {arg})"));
            self.w.line(&format!("const script::Value& v0 = script::Arg(st, {arg});"));
            self.w.open("if (script::IsNil(v0))");
            self.w.line(&format!("{a}.Clear();"));
            self.w.close("}");
            self.w.open("else");
            self.w.line(&format!("{inner} t0;"));
            self.emit_read(inner, "v0", "t0", 1, &ctx)?;
            self.w.line(&format!("{a} = t0;"));
            self.w.close("}");
            self.w.close("}");
            if let Some(def) = &p.default {
                self.w.open("else");
                self.w.line(&format!("{a} = {};", default_expr(def, &p.ty)));
                self.w.close("}");
            }
        } else {
            self.w.open(&format!("if (script::Top(st) < {arg})"));
            self.w.line(&format!(
                "return script::ArgError(st, {arg}, {});",
                quote(&ctx.display)
            ));
            self.w.close("}");
            self.w.open_block();
            self.w.line(&format!("const script::Value& v0 = script::Arg(st, {arg});"));
            self.emit_read(inner, "v0", &a, 0, &ctx)?;
            self.w.close("}");
        }
        Ok(())
    }

    /// Read a script value through the bound handle `handle` into the
    /// native lvalue `dst` of type `ty`. Loop and temporary names carry
    /// `depth` so nesting never collides.
    fn emit_read(
        &mut self,
        ty: &VariableType,
        handle: &str,
        dst: &str,
        depth: usize,
        ctx: &ArgCtx,
    ) -> Result<(), GenError> {
        match ty {
            VariableType::Basic(kind) => {
                self.w.open(&format!("if (!script::{}({handle}, {dst}))", to_fn(*kind)));
                self.arg_error(ctx);
                self.w.close("}");
                Ok(())
            }
            VariableType::Nullable(inner) => {
                self.w.open(&format!("if (script::IsNil({handle}))"));
                self.w.line(&format!("{dst}.Clear();"));
                self.w.close("}");
                self.w.open("else");
                let t = format!("t{depth}");
                self.w.line(&format!("{inner} {t};"));
                self.emit_read(inner, handle, &t, depth + 1, ctx)?;
                self.w.line(&format!("{dst} = {t};"));
                self.w.close("}");
                Ok(())
            }
            VariableType::Sequence(_) | VariableType::Mapping(_) => {
                let probe = if matches!(ty, VariableType::Mapping(_)) {
                    "IsMap"
                } else {
                    "IsArray"
                };
                self.w.open(&format!("if (!script::{probe}({handle}))"));
                self.arg_error(ctx);
                self.w.close("}");
                self.emit_element_loop(ty, handle, dst, depth, ctx)
            }
            VariableType::Sum(alts) => {
                let mut first = true;
                for alt in alts {
                    let (alt_null, value_ty) = alt.peel_nullable();
                    if alt_null {
                        self.open_branch(&mut first, &format!("script::IsNil({handle})"));
                        self.w.line(&format!("{dst} = {alt}();"));
                        self.w.close("}");
                    }
                    self.open_branch(&mut first, &probe_expr(value_ty, handle));
                    let t = format!("t{depth}");
                    self.w.line(&format!("{alt} {t};"));
                    if alt_null {
                        let u = format!("t{}", depth + 1);
                        self.w.line(&format!("{value_ty} {u};"));
                        self.read_sum_value(value_ty, handle, &u, depth + 1, ctx)?;
                        self.w.line(&format!("{t} = {u};"));
                    } else {
                        self.read_sum_value(value_ty, handle, &t, depth + 1, ctx)?;
                    }
                    self.w.line(&format!("{dst} = {t};"));
                    self.w.close("}");
                }
                self.w.open("else");
                self.arg_error(ctx);
                self.w.close("}");
                Ok(())
            }
            VariableType::Tuple(_) => Err(GenError::Unrepresentable {
                what: "a Tuple".to_string(),
                context: format!("argument {}", ctx.index),
            }),
        }
    }

    /// Element loop shared by plain container reads and matched container
    /// alternatives (the latter arrive with their shape already probed).
    fn emit_element_loop(
        &mut self,
        ty: &VariableType,
        handle: &str,
        dst: &str,
        depth: usize,
        ctx: &ArgCtx,
    ) -> Result<(), GenError> {
        let (elem_ty, mapping) = match ty {
            VariableType::Sequence(elem) => (elem, false),
            VariableType::Mapping(elem) => (elem, true),
            _ => {
                return Err(GenError::Unrepresentable {
                    what: ty.to_string(),
                    context: format!("argument {}", ctx.index),
                });
            }
        };
        let i = format!("i{depth}");
        let e = format!("e{depth}");
        self.w.open(&format!(
            "for (int {i} = 0; {i} < script::Count({handle}); ++{i})"
        ));
        self.w.line(&format!("{elem_ty} {e};"));
        let at = format!("script::At({handle}, {i})");
        if let VariableType::Basic(kind) = elem_ty.as_ref() {
            self.w.open(&format!("if (!script::{}({at}, {e}))", to_fn(*kind)));
            self.arg_error(ctx);
            self.w.close("}");
        } else {
            let v = format!("v{}", depth + 1);
            self.w.line(&format!("const script::Value& {v} = {at};"));
            self.emit_read(elem_ty, &v, &e, depth + 1, ctx)?;
        }
        if mapping {
            self.w.line(&format!("{dst}.Insert(script::KeyAt({handle}, {i}), {e});"));
        } else {
            self.w.line(&format!("{dst}.Append({e});"));
        }
        self.w.close("}");
        Ok(())
    }

    /// Convert a non-nullable sum alternative after its shape probe has
    /// matched. Basic kinds still run their checked conversion; a number
    /// shape can hold a non-integral value. Containers skip the redundant
    /// shape gate.
    fn read_sum_value(
        &mut self,
        ty: &VariableType,
        handle: &str,
        dst: &str,
        depth: usize,
        ctx: &ArgCtx,
    ) -> Result<(), GenError> {
        match ty {
            VariableType::Basic(kind) => {
                self.w.open(&format!("if (!script::{}({handle}, {dst}))", to_fn(*kind)));
                self.arg_error(ctx);
                self.w.close("}");
                Ok(())
            }
            VariableType::Sequence(_) | VariableType::Mapping(_) => {
                self.emit_element_loop(ty, handle, dst, depth, ctx)
            }
            other => self.emit_read(other, handle, dst, depth, ctx),
        }
    }

    fn open_branch(&mut self, first: &mut bool, cond: &str) {
        if *first {
            self.w.open(&format!("if ({cond})"));
            *first = false;
        } else {
            self.w.open(&format!("else if ({cond})"));
        }
    }

    fn arg_error(&mut self, ctx: &ArgCtx) {
        self.w.line(&format!(
            "return script::ArgError(st, {}, {});",
            ctx.index,
            quote(&ctx.display)
        ));
    }

    // ————————————————————————————————————————————————————————————————————
    // CALL AND RESULT PUSHES
    // ————————————————————————————————————————————————————————————————————

    fn emit_call(&mut self, f: &Function) -> Result<(), GenError> {
        let args: Vec<String> = (0..f.params.len()).map(|i| format!("a{i}")).collect();
        let call = format!("{}({})", f.name, args.join(", "));
        let Some(ret) = &f.ret else {
            self.w.line(&format!("{call};"));
            self.w.line("return 0;");
            return Ok(());
        };
        self.w.line(&format!("{ret} r = {call};"));
        match ret {
            VariableType::Nullable(inner) => {
                self.w.open("if (r.IsNull())");
                self.w.line("return 0;");
                self.w.close("}");
                self.emit_push(inner, "r.Get()", 0)?;
                self.w.line("return 1;");
            }
            VariableType::Tuple(elems) => {
                for (k, elem) in elems.iter().enumerate() {
                    self.emit_push(elem, &format!("r.Get<{k}>()"), 0)?;
                }
                self.w.line(&format!("return {};", elems.len()));
            }
            other => {
                self.emit_push(other, "r", 0)?;
                self.w.line("return 1;");
            }
        }
        Ok(())
    }

    /// Push one native value onto the stack. Containers push exactly one
    /// collected value; tuples never reach here.
    fn emit_push(&mut self, ty: &VariableType, src: &str, depth: usize) -> Result<(), GenError> {
        match ty {
            VariableType::Basic(kind) => {
                self.w.line(&format!("script::{}(st, {src});", push_fn(*kind)));
                Ok(())
            }
            VariableType::Nullable(inner) => {
                self.w.open(&format!("if ({src}.IsNull())"));
                self.w.line("script::PushNil(st);");
                self.w.close("}");
                self.w.open("else");
                self.emit_push(inner, &format!("{src}.Get()"), depth)?;
                self.w.close("}");
                Ok(())
            }
            VariableType::Sequence(elem) | VariableType::Mapping(elem) => {
                let mapping = matches!(ty, VariableType::Mapping(_));
                let holder = self.bind_push_source(ty, src, depth);
                if mapping {
                    self.w.line("script::BeginMap(st);");
                } else {
                    self.w.line("script::BeginArray(st);");
                }
                let i = format!("i{depth}");
                self.w.open(&format!(
                    "for (int {i} = 0; {i} < {holder}.Count(); ++{i})"
                ));
                self.emit_push(elem, &format!("{holder}.At({i})"), depth + 1)?;
                if mapping {
                    self.w.line(&format!("script::InsertMap(st, {holder}.KeyAt({i}));"));
                } else {
                    self.w.line("script::AppendArray(st);");
                }
                self.w.close("}");
                Ok(())
            }
            VariableType::Sum(alts) => {
                let holder = self.bind_push_source(ty, src, depth);
                for (k, alt) in alts.iter().enumerate() {
                    let cond = format!("{holder}.Holds<{alt}>()");
                    if k == 0 {
                        self.w.open(&format!("if ({cond})"));
                    } else {
                        self.w.open(&format!("else if ({cond})"));
                    }
                    self.emit_push(alt, &format!("{holder}.Get<{alt}>()"), depth + 1)?;
                    self.w.close("}");
                }
                Ok(())
            }
            VariableType::Tuple(_) => Err(GenError::Unrepresentable {
                what: "a Tuple".to_string(),
                context: "a nested result position".to_string(),
            }),
        }
    }

    /// Containers and sums re-read their source several times; bind a
    /// reference once unless the source is already a plain name.
    fn bind_push_source(&mut self, ty: &VariableType, src: &str, depth: usize) -> String {
        if src.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return src.to_string();
        }
        let u = format!("u{depth}");
        self.w.line(&format!("const {ty}& {u} = {src};"));
        u
    }
}

impl Default for ScriptGen {
    fn default() -> Self {
        ScriptGen::new()
    }
}

struct ArgCtx {
    index: usize,
    display: String,
}

// ————————————————————————————————————————————————————————————————————————————
// MARSHALING TABLES
// ————————————————————————————————————————————————————————————————————————————

fn to_fn(kind: BasicKind) -> &'static str {
    use BasicKind::*;
    match kind {
        Boolean => "ToBoolean",
        Integer => "ToInteger",
        Float | Double => "ToNumber",
        String => "ToString",
        Path => "ToPath",
        Int2 => "ToInt2",
        Int3 => "ToInt3",
        Int4 => "ToInt4",
        Float2 => "ToFloat2",
        Float3 => "ToFloat3",
        Float4 => "ToFloat4",
        Mat2 => "ToMat2",
        Mat3 => "ToMat3",
        Mat4 => "ToMat4",
        DMat2 => "ToDMat2",
        DMat3 => "ToDMat3",
        DMat4 => "ToDMat4",
        Dictionary => "ToDictionary",
    }
}

fn push_fn(kind: BasicKind) -> &'static str {
    use BasicKind::*;
    match kind {
        Boolean => "PushBoolean",
        Integer => "PushInteger",
        Float | Double => "PushNumber",
        String => "PushString",
        Path => "PushPath",
        Int2 => "PushInt2",
        Int3 => "PushInt3",
        Int4 => "PushInt4",
        Float2 => "PushFloat2",
        Float3 => "PushFloat3",
        Float4 => "PushFloat4",
        Mat2 => "PushMat2",
        Mat3 => "PushMat3",
        Mat4 => "PushMat4",
        DMat2 => "PushDMat2",
        DMat3 => "PushDMat3",
        DMat4 => "PushDMat4",
        Dictionary => "PushDictionary",
    }
}

/// Stack-shape probe for a non-nullable sum alternative.
fn probe_expr(ty: &VariableType, handle: &str) -> String {
    let probe = match ty {
        VariableType::Basic(BasicKind::Boolean) => "IsBoolean",
        VariableType::Basic(k) if k.is_numeric_scalar() => "IsNumber",
        VariableType::Basic(k) if k.is_stringish() => "IsString",
        VariableType::Basic(BasicKind::Dictionary) => "IsMap",
        VariableType::Sequence(_) => "IsArray",
        VariableType::Mapping(_) => "IsMap",
        // Validation rejects everything else before emission.
        _ => "IsNil",
    };
    format!("script::{probe}({handle})")
}

/// Default literal as a native expression; component lists use the
/// parameter's vector constructor.
fn default_expr(lit: &Literal, ty: &VariableType) -> String {
    match lit {
        Literal::Int(v) => v.to_string(),
        Literal::Float(v) => fmt_double(v.into_inner()),
        Literal::Bool(b) => b.to_string(),
        Literal::Str(s) => quote(s),
        Literal::Vector(comps) => {
            let parts: Vec<String> = comps.iter().map(|c| default_expr(c, ty)).collect();
            if let VariableType::Basic(kind) = ty.peel_nullable().1 {
                format!("{}({})", kind.canonical_name(), parts.join(", "))
            } else {
                format!("{{ {} }}", parts.join(", "))
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// VALIDATION
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Nil,
    Bool,
    Number,
    Str,
    Array,
    Map,
}

/// Reject constructs with no stack rendering before anything is written:
/// tuples off the whole-return position, variants whose alternatives
/// cannot be told apart, vector/matrix alternatives, directly nested
/// variants.
fn validate(f: &Function) -> Result<(), GenError> {
    for p in &f.params {
        check_ty(&p.ty, f)?;
    }
    match &f.ret {
        Some(VariableType::Tuple(elems)) => {
            for e in elems {
                check_ty(e, f)?;
            }
        }
        Some(other) => check_ty(other, f)?,
        None => {}
    }
    Ok(())
}

fn check_ty(ty: &VariableType, f: &Function) -> Result<(), GenError> {
    match ty {
        VariableType::Basic(_) => Ok(()),
        VariableType::Nullable(inner)
        | VariableType::Sequence(inner)
        | VariableType::Mapping(inner) => check_ty(inner, f),
        VariableType::Tuple(_) => Err(GenError::Unrepresentable {
            what: "a Tuple".to_string(),
            context: format!(
                "function `{}` (tuples may only be the whole return type)",
                f.name
            ),
        }),
        VariableType::Sum(alts) => {
            let mut seen: Vec<(Shape, String)> = Vec::new();
            for alt in alts {
                check_sum_alt(alt, f)?;
                for shape in alt_shapes(alt) {
                    if let Some((_, prev)) = seen.iter().find(|(s, _)| *s == shape) {
                        return Err(GenError::AmbiguousSum {
                            function: f.name.clone(),
                            first: prev.clone(),
                            second: alt.to_string(),
                        });
                    }
                    seen.push((shape, alt.to_string()));
                }
            }
            Ok(())
        }
    }
}

fn check_sum_alt(alt: &VariableType, f: &Function) -> Result<(), GenError> {
    match alt {
        VariableType::Basic(k)
            if k.int_vector_arity().is_some()
                || k.float_vector_arity().is_some()
                || k.is_matrix() =>
        {
            Err(GenError::Unrepresentable {
                what: format!("a {} alternative", k.canonical_name()),
                context: format!("function `{}` (no distinct stack shape)", f.name),
            })
        }
        VariableType::Basic(_) => Ok(()),
        VariableType::Nullable(inner) => check_sum_alt(inner, f),
        VariableType::Sequence(inner) | VariableType::Mapping(inner) => check_ty(inner, f),
        VariableType::Sum(_) => Err(GenError::Unrepresentable {
            what: "a Variant alternative".to_string(),
            context: format!("function `{}` (variants do not nest directly)", f.name),
        }),
        VariableType::Tuple(_) => Err(GenError::Unrepresentable {
            what: "a Tuple".to_string(),
            context: format!(
                "function `{}` (tuples may only be the whole return type)",
                f.name
            ),
        }),
    }
}

fn alt_shapes(alt: &VariableType) -> Vec<Shape> {
    match alt {
        VariableType::Nullable(inner) => {
            let mut shapes = vec![Shape::Nil];
            shapes.extend(alt_shapes(inner));
            shapes
        }
        VariableType::Basic(BasicKind::Boolean) => vec![Shape::Bool],
        VariableType::Basic(k) if k.is_numeric_scalar() => vec![Shape::Number],
        VariableType::Basic(k) if k.is_stringish() => vec![Shape::Str],
        VariableType::Basic(BasicKind::Dictionary) => vec![Shape::Map],
        VariableType::Sequence(_) => vec![Shape::Array],
        VariableType::Mapping(_) => vec![Shape::Map],
        // Rejected by check_sum_alt before shapes are consulted.
        _ => Vec::new(),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::scan;

    fn r#gen(src: &str) -> String {
        let model = scan(src).unwrap();
        let mut g = ScriptGen::new();
        for f in &model.functions {
            g.emit(f).unwrap();
        }
        g.into_string()
    }

    fn gen_err(src: &str) -> GenError {
        let model = scan(src).unwrap();
        let mut g = ScriptGen::new();
        for f in &model.functions {
            if let Err(e) = g.emit(f) {
                return e;
            }
        }
        panic!("expected a generation error");
    }

    #[test]
    fn void_function_without_parameters() {
        let out = r#gen("SCRIPT_API()\nvoid clear_waves();\n");
        let expected = "\
script::FunctionDef BindClearWaves()
{
    script::FunctionDef def(\"clear_waves\");
    def.help = \"\";
    def.callable = [](script::Stack& st) -> int
    {
        (void)st;
        clear_waves();
        return 0;
    };
    return def;
}
";
        assert_eq!(out, expected);
    }

    #[test]
    fn metadata_lists_params_with_display_strings() {
        let out = r#gen("\
// Spawns a wave.
SCRIPT_API()
Tuple<Boolean, Integer> spawn_wave(String archetype, Float3 origin, Integer count = 1);
");
        assert!(out.contains("script::FunctionDef def(\"spawn_wave\");"));
        assert!(out.contains("def.help = \"Spawns a wave.\";"));
        assert!(out.contains("def.result = \"Boolean, Integer\";"));
        assert!(out.contains("def.AddParam(\"archetype\", \"String\");"));
        assert!(out.contains("def.AddParam(\"origin\", \"Float3\");"));
        assert!(out.contains("def.AddParam(\"count\", \"Integer?\");"));
    }

    #[test]
    fn required_scalar_parameter_checks_top_and_converts() {
        let out = r#gen("SCRIPT_API()\nvoid f(String name);\n");
        let expected = "\
        String a0;
        if (script::Top(st) < 1)
        {
            return script::ArgError(st, 1, \"String\");
        }
        {
            const script::Value& v0 = script::Arg(st, 1);
            if (!script::ToString(v0, a0))
            {
                return script::ArgError(st, 1, \"String\");
            }
        }
        f(a0);
        return 0;
";
        assert!(out.contains(expected), "got:\n{out}");
    }

    #[test]
    fn defaulted_parameter_applies_the_literal_when_absent() {
        let out = r#gen("SCRIPT_API()\nvoid f(Integer count = 1);\n");
        let expected = "\
        Nullable<Integer> a0;
        if (script::Top(st) >= 1)
        {
            const script::Value& v0 = script::Arg(st, 1);
            if (script::IsNil(v0))
            {
                a0.Clear();
            }
            else
            {
                Integer t0;
                if (!script::ToInteger(v0, t0))
                {
                    return script::ArgError(st, 1, \"Integer?\");
                }
                a0 = t0;
            }
        }
        else
        {
            a0 = 1;
        }
";
        assert!(out.contains(expected), "got:\n{out}");
    }

    #[test]
    fn nullable_parameter_without_default_has_no_else_branch() {
        let out = r#gen("SCRIPT_API()\nvoid f(Nullable<String> squad);\n");
        assert!(!out.contains("else\n        {\n            a0 ="), "got:\n{out}");
    }

    #[test]
    fn array_parameter_gates_on_shape_and_loops() {
        let out = r#gen("SCRIPT_API()\nInteger sum_all(Array<Integer> values);\n");
        let expected = "\
            const script::Value& v0 = script::Arg(st, 1);
            if (!script::IsArray(v0))
            {
                return script::ArgError(st, 1, \"Integer[]\");
            }
            for (int i0 = 0; i0 < script::Count(v0); ++i0)
            {
                Integer e0;
                if (!script::ToInteger(script::At(v0, i0), e0))
                {
                    return script::ArgError(st, 1, \"Integer[]\");
                }
                a0.Append(e0);
            }
";
        assert!(out.contains(expected), "got:\n{out}");
    }

    #[test]
    fn map_return_pushes_one_value_with_inserts() {
        let out = r#gen("\
// Per-squad health report.
SCRIPT_API()
Map<String, Integer> squad_health(Nullable<String> squad);
");
        assert!(out.contains("def.result = \"String -> Integer\";"));
        let expected = "\
        Map<String, Integer> r = squad_health(a0);
        script::BeginMap(st);
        for (int i0 = 0; i0 < r.Count(); ++i0)
        {
            script::PushInteger(st, r.At(i0));
            script::InsertMap(st, r.KeyAt(i0));
        }
        return 1;
";
        assert!(out.contains(expected), "got:\n{out}");
    }

    #[test]
    fn tuple_return_pushes_elements_in_order() {
        let out = r#gen("SCRIPT_API()\nTuple<Boolean, Integer> roll();\n");
        let expected = "\
        Tuple<Boolean, Integer> r = roll();
        script::PushBoolean(st, r.Get<0>());
        script::PushInteger(st, r.Get<1>());
        return 2;
";
        assert!(out.contains(expected), "got:\n{out}");
    }

    #[test]
    fn variant_return_pushes_exactly_one_alternative() {
        let out = r#gen("SCRIPT_API()\nVariant<Double, String> tuning_value(String path);\n");
        assert!(out.contains("def.result = \"Number | String\";"));
        let expected = "\
        Variant<Double, String> r = tuning_value(a0);
        if (r.Holds<Double>())
        {
            script::PushNumber(st, r.Get<Double>());
        }
        else if (r.Holds<String>())
        {
            script::PushString(st, r.Get<String>());
        }
        return 1;
";
        assert!(out.contains(expected), "got:\n{out}");
    }

    #[test]
    fn nullable_return_pushes_nothing_when_empty() {
        let out = r#gen("SCRIPT_API()\nNullable<Double> distance_to(Int2 cell);\n");
        let expected = "\
        Nullable<Double> r = distance_to(a0);
        if (r.IsNull())
        {
            return 0;
        }
        script::PushNumber(st, r.Get());
        return 1;
";
        assert!(out.contains(expected), "got:\n{out}");
    }

    #[test]
    fn variant_parameter_dispatches_by_stack_shape() {
        let out = r#gen("SCRIPT_API()\nvoid set_target(Variant<Integer, String> key);\n");
        let expected = "\
            const script::Value& v0 = script::Arg(st, 1);
            if (script::IsNumber(v0))
            {
                Integer t0;
                if (!script::ToInteger(v0, t0))
                {
                    return script::ArgError(st, 1, \"Integer | String\");
                }
                a0 = t0;
            }
            else if (script::IsString(v0))
            {
                String t0;
                if (!script::ToString(v0, t0))
                {
                    return script::ArgError(st, 1, \"Integer | String\");
                }
                a0 = t0;
            }
            else
            {
                return script::ArgError(st, 1, \"Integer | String\");
            }
";
        assert!(out.contains(expected), "got:\n{out}");
    }

    #[test]
    fn nullable_alternative_claims_the_nil_shape() {
        let out = r#gen("SCRIPT_API()\nvoid f(Variant<Nullable<Integer>, String> v);\n");
        assert!(out.contains("if (script::IsNil(v0))"), "got:\n{out}");
        assert!(out.contains("a0 = Nullable<Integer>();"), "got:\n{out}");
    }

    #[test]
    fn container_alternative_reads_through_a_loop() {
        let out = r#gen("SCRIPT_API()\nvoid f(Variant<Array<Double>, String> v);\n");
        assert!(out.contains("if (script::IsArray(v0))"), "got:\n{out}");
        assert!(out.contains("Array<Double> t0;"), "got:\n{out}");
        assert!(out.contains("t0.Append(e1);"), "got:\n{out}");
    }

    #[test]
    fn ambiguous_sums_are_rejected() {
        let err = gen_err("SCRIPT_API()\nvoid f(Variant<Integer, Double> v);\n");
        assert!(matches!(err, GenError::AmbiguousSum { .. }), "{err}");

        let err = gen_err("SCRIPT_API()\nvoid f(Variant<String, Path> v);\n");
        assert!(matches!(err, GenError::AmbiguousSum { .. }), "{err}");

        let err = gen_err("SCRIPT_API()\nVariant<Map<String, Integer>, Dictionary> g();\n");
        assert!(matches!(err, GenError::AmbiguousSum { .. }), "{err}");
    }

    #[test]
    fn tuples_outside_the_whole_return_are_rejected() {
        let err = gen_err("SCRIPT_API()\nvoid f(Tuple<Boolean, Integer> t);\n");
        assert!(matches!(err, GenError::Unrepresentable { .. }), "{err}");

        let err = gen_err("SCRIPT_API()\nArray<Tuple<Boolean, Integer>> g();\n");
        assert!(matches!(err, GenError::Unrepresentable { .. }), "{err}");
    }

    #[test]
    fn vector_and_nested_variant_alternatives_are_rejected() {
        let err = gen_err("SCRIPT_API()\nvoid f(Variant<Float3, String> v);\n");
        assert!(matches!(err, GenError::Unrepresentable { .. }), "{err}");

        let err = gen_err("SCRIPT_API()\nvoid f(Variant<Variant<Integer, String>, Boolean> v);\n");
        assert!(matches!(err, GenError::Unrepresentable { .. }), "{err}");
    }

    #[test]
    fn generation_is_deterministic() {
        let src = "\
SCRIPT_API()
Tuple<Boolean, Integer> spawn_wave(String archetype, Float3 origin, Integer count = 1);

SCRIPT_API()
Map<String, Array<Double>> zones();
";
        assert_eq!(r#gen(src), r#gen(src));
    }
}
