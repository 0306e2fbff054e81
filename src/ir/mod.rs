//! The intermediate representation: modules, type definitions, fields, and
//! expressions.
//!
//! Every named entity resolves to a [`CanonicalName`]: the owning module's file
//! name plus the dotted path of enclosing type names down to the leaf. Cross-tree
//! references are always by canonical name, never by pointer into another subtree
//! — this keeps the IR a single owned tree even though its dependency structure is
//! a general graph (see [`crate::passes::dependency_checker`]).

pub mod builders;

use crate::diagnostics::SourceLocation;
use serde::{Deserialize, Serialize};

/// `(module_file, [outer_type_name, ..., leaf_name])`. The prelude module's file is
/// the empty string.
pub type CanonicalName = (String, Vec<String>);

pub fn canonical_name_to_string(name: &CanonicalName) -> String {
    if name.1.is_empty() {
        name.0.clone()
    } else {
        format!("{}:{}", name.0, name.1.join("."))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub source_location: SourceLocation,
}

impl Word {
    /// Builds a `Word` with a placeholder (but non-synthetic) location. Callers
    /// that need a real source span should set `source_location` explicitly;
    /// this default keeps fixture-built names from being mistaken for
    /// pass-inserted ones (see [`SourceLocation::is_synthetic`]).
    pub fn new(text: impl Into<String>) -> Self {
        Word {
            text: text.into(),
            source_location: SourceLocation::new(
                crate::diagnostics::Position::new(0, 0),
                crate::diagnostics::Position::new(0, 0),
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameDefinition {
    pub name: Word,
    pub abbreviation: Option<Word>,
    pub is_anonymous: bool,
    pub canonical_name: CanonicalName,
}

impl NameDefinition {
    pub fn new(text: impl Into<String>) -> Self {
        NameDefinition {
            name: Word::new(text),
            abbreviation: None,
            is_anonymous: false,
            canonical_name: (String::new(), Vec::new()),
        }
    }
}

/// Addressable granularity of a type: `BIT` for `bits` blocks, `BYTE` for `struct`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressableUnit {
    Bit,
    Byte,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub back_end: Option<String>,
    pub name: Word,
    pub value: AttributeValue,
    pub source_location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttributeValue {
    String(String),
    Integer(String),
    Boolean(bool),
    /// `[(foo): $default]` — defer to the nearest enclosing scope's value.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionKind {
    Addition,
    Subtraction,
    Multiplication,
    Equality,
    Inequality,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
    Choice,
    Presence,
    UpperBound,
    LowerBound,
    Maximum,
}

/// A single segment (or full path) of a dotted reference. `canonical_name` is
/// populated by [`crate::passes::symbol_resolver`]; before that pass runs it is
/// `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub source_name: Vec<Word>,
    pub canonical_name: Option<CanonicalName>,
}

impl Reference {
    pub fn new(path: Vec<&str>) -> Self {
        Reference {
            source_name: path.into_iter().map(Word::new).collect(),
            canonical_name: None,
        }
    }

    pub fn path_text(&self) -> Vec<String> {
        self.source_name.iter().map(|w| w.text.clone()).collect()
    }
}

/// Expression type classification, assigned during [`crate::passes::type_check`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExpressionType {
    Unknown,
    Integer(IntegerBounds),
    Boolean { value: Option<bool> },
    Enumeration { enum_name: CanonicalName, value: Option<String> },
    Opaque,
}

/// `(minimum, maximum, modulus, modular_value)` for an integer-typed expression.
/// `minimum`/`maximum` may be `"infinity"`/`"-infinity"`; `modulus` may be
/// `"infinity"` (meaning "no constraint").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerBounds {
    pub minimum: String,
    pub maximum: String,
    pub modulus: String,
    pub modular_value: String,
}

impl IntegerBounds {
    pub fn exact(value: impl Into<String>) -> Self {
        let v = value.into();
        IntegerBounds {
            minimum: v.clone(),
            maximum: v.clone(),
            modulus: "infinity".to_string(),
            modular_value: v,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expression {
    pub value: ExpressionValue,
    pub source_location: SourceLocation,
    pub expression_type: ExpressionType,
}

impl Expression {
    /// Builds an `Expression` with a placeholder (but non-synthetic) location;
    /// see [`Word::new`] for why fixture-built nodes default to non-synthetic.
    pub fn new(value: ExpressionValue) -> Self {
        Expression {
            value,
            source_location: SourceLocation::new(
                crate::diagnostics::Position::new(0, 0),
                crate::diagnostics::Position::new(0, 0),
            ),
            expression_type: ExpressionType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExpressionValue {
    Constant { value: String },
    BooleanConstant { value: bool },
    FieldReference { path: Vec<Reference> },
    ConstantReference { reference: Reference },
    BuiltinReference { reference: Reference },
    Function { function: FunctionKind, args: Vec<Expression> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteMethod {
    Physical,
    ReadOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WriteMethodDetail {
    None,
    Alias {
        path: Vec<String>,
    },
    /// The inverted expression computing the physical destination from
    /// `$logical_value`.
    Transform {
        destination: String,
        function_body: Expression,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldLocation {
    pub start: Expression,
    pub size: Expression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldType {
    Atomic {
        reference: Reference,
        runtime_parameters: Vec<Expression>,
    },
    Array {
        element_type: Box<FieldType>,
        element_count: Option<Expression>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldKind {
    Physical {
        location: FieldLocation,
        field_type: FieldType,
    },
    Virtual {
        read_transform: Expression,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: NameDefinition,
    pub existence_condition: Expression,
    pub attributes: Vec<Attribute>,
    pub kind: FieldKind,
    pub write_method: WriteMethod,
    pub write_method_detail: WriteMethodDetail,
    /// Names of the sub-fields of an anonymous inline `bits:`/`struct:` block,
    /// populated when the field is itself anonymous. Consumed by the desugaring
    /// pass to build alias virtual fields (`SPEC_FULL.md` §4.E).
    pub anonymous_subfields: Vec<String>,
}

impl Field {
    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, FieldKind::Virtual { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Structure {
    pub name: NameDefinition,
    pub fields: Vec<Field>,
    /// Populated by [`crate::passes::dependency_checker`]: a permutation of
    /// `0..fields.len()` such that every field's dependencies appear earlier.
    pub fields_in_dependency_order: Vec<usize>,
    pub runtime_parameters: Vec<RuntimeParameter>,
    pub attributes: Vec<Attribute>,
    pub subtypes: Vec<TypeDefinition>,
    pub addressable_unit: AddressableUnit,
}

impl Structure {
    pub fn new(name: impl Into<String>, addressable_unit: AddressableUnit) -> Self {
        Structure {
            name: NameDefinition::new(name),
            fields: Vec::new(),
            fields_in_dependency_order: Vec::new(),
            runtime_parameters: Vec::new(),
            attributes: Vec::new(),
            subtypes: Vec::new(),
            addressable_unit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeParameter {
    pub name: NameDefinition,
    pub physical_type: Reference,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: NameDefinition,
    pub value: Expression,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enumeration {
    pub name: NameDefinition,
    pub values: Vec<EnumValue>,
    pub attributes: Vec<Attribute>,
    pub subtypes: Vec<TypeDefinition>,
    pub is_signed: bool,
    pub maximum_bits: u32,
}

impl Enumeration {
    pub fn new(name: impl Into<String>) -> Self {
        Enumeration {
            name: NameDefinition::new(name),
            values: Vec::new(),
            attributes: Vec::new(),
            subtypes: Vec::new(),
            is_signed: false,
            maximum_bits: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct External {
    pub name: NameDefinition,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeDefinition {
    Structure(Structure),
    Enumeration(Enumeration),
    External(External),
}

impl TypeDefinition {
    pub fn name_definition(&self) -> &NameDefinition {
        match self {
            TypeDefinition::Structure(s) => &s.name,
            TypeDefinition::Enumeration(e) => &e.name,
            TypeDefinition::External(x) => &x.name,
        }
    }

    pub fn name_definition_mut(&mut self) -> &mut NameDefinition {
        match self {
            TypeDefinition::Structure(s) => &mut s.name,
            TypeDefinition::Enumeration(e) => &mut e.name,
            TypeDefinition::External(x) => &mut x.name,
        }
    }

    pub fn subtypes(&self) -> &[TypeDefinition] {
        match self {
            TypeDefinition::Structure(s) => &s.subtypes,
            TypeDefinition::Enumeration(e) => &e.subtypes,
            TypeDefinition::External(_) => &[],
        }
    }

    pub fn subtypes_mut(&mut self) -> &mut Vec<TypeDefinition> {
        match self {
            TypeDefinition::Structure(s) => &mut s.subtypes,
            TypeDefinition::Enumeration(e) => &mut e.subtypes,
            TypeDefinition::External(x) => {
                // Externals never have subtypes; route through a leaked empty
                // vector is wasteful, so externals simply cannot be asked for
                // mutable subtypes in well-formed IR.
                unreachable!("External type {:?} has no subtypes", x.name.name.text)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignImport {
    pub file_name: String,
    pub local_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub source_file_name: String,
    pub source_text: String,
    pub types: Vec<TypeDefinition>,
    pub foreign_imports: Vec<ForeignImport>,
    pub attributes: Vec<Attribute>,
}

impl Module {
    pub fn new(source_file_name: impl Into<String>) -> Self {
        let file_name = source_file_name.into();
        Module {
            source_file_name: file_name.clone(),
            source_text: String::new(),
            types: Vec::new(),
            foreign_imports: vec![ForeignImport {
                file_name,
                local_name: None,
            }],
            attributes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Ir {
    pub modules: Vec<Module>,
}

impl Ir {
    pub fn new() -> Self {
        Ir { modules: Vec::new() }
    }

    pub fn prelude_index(&self) -> Option<usize> {
        self.modules.iter().position(|m| m.source_file_name.is_empty())
    }

    pub fn module(&self, file_name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.source_file_name == file_name)
    }

    pub fn module_mut(&mut self, file_name: &str) -> Option<&mut Module> {
        self.modules.iter_mut().find(|m| m.source_file_name == file_name)
    }
}
