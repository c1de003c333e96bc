//! Scanned declaration model.
//!
//! Everything the scanner extracts from one translation unit lands here, in
//! declaration order, with annotation operands already resolved to literals.
//! The generators read this model and nothing else — no token or source text
//! survives past the scan.

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::naming;
use crate::ty::VariableType;

// ————————————————————————————————————————————————————————————————————————————
// LITERALS
// ————————————————————————————————————————————————————————————————————————————

/// Resolved annotation operand or default value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
    /// Parenthesized component list, e.g. `(1, 0)` for an `Int2` member.
    Vector(Vec<Literal>),
}

impl Literal {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Literal::Bool(_) => "boolean",
            Literal::Int(_) => "integer",
            Literal::Float(_) => "number",
            Literal::Str(_) => "string",
            Literal::Vector(_) => "vector",
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRAINTS
// ————————————————————————————————————————————————————————————————————————————

/// One validation annotation, operands resolved. Stored in written order;
/// the spec generator wraps the base verifier in this order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Constraint {
    InRange { lo: Literal, hi: Literal },
    NotInRange { lo: Literal, hi: Literal },
    Less(Literal),
    LessEq(Literal),
    Greater(Literal),
    GreaterEq(Literal),
    Unequal(Literal),
    InList(Vec<Literal>),
    NotEmpty,
    Annotation,
    Color,
    DateTime { earliest: Option<String>, latest: Option<String> },
    /// `REF(Tag)` — validate against another registered spec instead of the
    /// declared type.
    ExternalRef { tag: String },
}

impl Constraint {
    /// The annotation tag this constraint was written as.
    pub fn tag(&self) -> &'static str {
        match self {
            Constraint::InRange { .. } => "IN_RANGE",
            Constraint::NotInRange { .. } => "NOT_IN_RANGE",
            Constraint::Less(_) => "LESS",
            Constraint::LessEq(_) => "LESS_EQ",
            Constraint::Greater(_) => "GREATER",
            Constraint::GreaterEq(_) => "GREATER_EQ",
            Constraint::Unequal(_) => "UNEQUAL",
            Constraint::InList(_) => "IN_LIST",
            Constraint::NotEmpty => "NOT_EMPTY",
            Constraint::Annotation => "ANNOTATION",
            Constraint::Color => "COLOR",
            Constraint::DateTime { .. } => "DATE_TIME",
            Constraint::ExternalRef { .. } => "REF",
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DECLARATIONS
// ————————————————————————————————————————————————————————————————————————————

/// One struct member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub name: String,
    pub ty: VariableType,
    /// Joined text of the contiguous `//` lines above the member.
    pub doc: String,
    /// `RENAME(..)` override for the dictionary key.
    pub rename: Option<String>,
    pub constraints: Vec<Constraint>,
    /// Member initializer, kept for the model dump.
    pub default: Option<Literal>,
}

impl Variable {
    /// Dictionary key: the `RENAME` override if present, otherwise derived
    /// from the member name.
    pub fn key(&self) -> String {
        match &self.rename {
            Some(key) => key.clone(),
            None => naming::derived_key(&self.name),
        }
    }

    pub fn external_ref(&self) -> Option<&str> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::ExternalRef { tag } => Some(tag.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enumerator {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enumeration {
    pub name: String,
    /// `enum class` — enumerators resolve only through the qualified name.
    pub scoped: bool,
    pub enumerators: Vec<Enumerator>,
}

/// One `CONFIG_SPEC`-annotated struct.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Struct {
    pub name: String,
    /// Dictionary tag from the marker argument.
    pub tag: Option<String>,
    pub doc: String,
    pub members: Vec<Variable>,
    pub enums: Vec<Enumeration>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub ty: VariableType,
    /// Defaulted parameters are nullable on the wire; the recorded literal
    /// is applied when the argument is absent.
    pub default: Option<Literal>,
}

/// One `SCRIPT_API`-annotated free function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Function {
    pub name: String,
    pub doc: String,
    /// `None` for `void`.
    pub ret: Option<VariableType>,
    pub params: Vec<Param>,
}

impl Function {
    /// PascalCase form used in the generated binding name.
    pub fn derived_name(&self) -> String {
        naming::derived_name(&self.name)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// MODEL
// ————————————————————————————————————————————————————————————————————————————

/// Everything scanned from one translation unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Model {
    pub structs: Vec<Struct>,
    pub functions: Vec<Function>,
    /// Enumerations not owned by any annotated struct.
    pub enums: Vec<Enumeration>,
    /// Named constants usable as annotation operands, first registration
    /// wins. Iteration order is registration order.
    pub constants: IndexMap<String, Literal>,
}

impl Model {
    /// A unit with no annotated declarations produces no companion file.
    pub fn is_empty(&self) -> bool {
        self.structs.is_empty() && self.functions.is_empty()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::BasicKind;

    fn member(name: &str) -> Variable {
        Variable {
            name: name.to_string(),
            ty: VariableType::Basic(BasicKind::Double),
            doc: String::new(),
            rename: None,
            constraints: Vec::new(),
            default: None,
        }
    }

    #[test]
    fn key_is_derived_unless_renamed() {
        let plain = member("yaw_speed");
        assert_eq!(plain.key(), "YawSpeed");

        let mut renamed = member("label");
        renamed.rename = Some("DisplayLabel".to_string());
        assert_eq!(renamed.key(), "DisplayLabel");
    }

    #[test]
    fn external_ref_found_among_constraints() {
        let mut m = member("hull");
        m.constraints.push(Constraint::Greater(Literal::Int(0)));
        m.constraints.push(Constraint::ExternalRef { tag: "Material".to_string() });
        assert_eq!(m.external_ref(), Some("Material"));
        assert_eq!(member("plain").external_ref(), None);
    }

    #[test]
    fn unit_with_only_constants_is_empty() {
        let mut model = Model::default();
        model.constants.insert("MAX".to_string(), Literal::Int(3));
        model.enums.push(Enumeration {
            name: "Damage".to_string(),
            scoped: false,
            enumerators: vec![Enumerator { name: "Kinetic".to_string(), value: 1 }],
        });
        assert!(model.is_empty());
    }
}
