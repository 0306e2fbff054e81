//! Fluent builders for constructing IR fixtures.
//!
//! The tokenizer and parser that would normally produce an initial IR from source
//! text are out of scope for this crate (see `SPEC_FULL.md` §6). These builders
//! stand in for that boundary: they let tests, the prelude module, and the CLI demo
//! construct well-formed IR trees directly, the same way production code would
//! build a fixture for a unit test.
//!
//! ## Example
//!
//! ```
//! use embossc_front::ir::builders::{FieldBuilder, StructureBuilder};
//!
//! let foo = StructureBuilder::new("Foo")
//!     .physical_field(FieldBuilder::new("bar").start_constant(0).size_constant(4).type_name("UInt"))
//!     .build();
//! ```

use super::{
    AddressableUnit, Attribute, AttributeValue, EnumValue, Enumeration, Expression, ExpressionValue, Field,
    FieldKind, FieldLocation, FieldType, ForeignImport, FunctionKind, Module, NameDefinition, Reference,
    RuntimeParameter, Structure, TypeDefinition, WriteMethod, WriteMethodDetail,
};
use crate::diagnostics::SourceLocation;

pub fn constant(value: impl Into<String>) -> Expression {
    Expression::new(ExpressionValue::Constant { value: value.into() })
}

pub fn boolean_constant(value: bool) -> Expression {
    Expression::new(ExpressionValue::BooleanConstant { value })
}

pub fn field_reference(path: Vec<&str>) -> Expression {
    Expression::new(ExpressionValue::FieldReference {
        path: path.into_iter().map(|segment| Reference::new(vec![segment])).collect(),
    })
}

pub fn function(kind: FunctionKind, args: Vec<Expression>) -> Expression {
    Expression::new(ExpressionValue::Function { function: kind, args })
}

pub fn builtin(name: &str) -> Expression {
    Expression::new(ExpressionValue::BuiltinReference {
        reference: Reference::new(vec![name]),
    })
}

#[derive(Debug, Clone)]
pub struct FieldBuilder {
    name: String,
    abbreviation: Option<String>,
    start: Option<Expression>,
    size: Option<Expression>,
    type_name: Option<String>,
    read_transform: Option<Expression>,
    existence_condition: Option<Expression>,
    is_anonymous: bool,
    anonymous_subfields: Vec<String>,
}

impl FieldBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        FieldBuilder {
            name: name.into(),
            abbreviation: None,
            start: None,
            size: None,
            type_name: None,
            read_transform: None,
            existence_condition: None,
            is_anonymous: false,
            anonymous_subfields: Vec::new(),
        }
    }

    pub fn anonymous(subfields: Vec<&str>) -> Self {
        let mut builder = FieldBuilder::new("emboss_reserved_anonymous");
        builder.is_anonymous = true;
        builder.anonymous_subfields = subfields.into_iter().map(String::from).collect();
        builder
    }

    pub fn abbreviation(mut self, abbreviation: impl Into<String>) -> Self {
        self.abbreviation = Some(abbreviation.into());
        self
    }

    pub fn start(mut self, expression: Expression) -> Self {
        self.start = Some(expression);
        self
    }

    pub fn start_constant(self, value: i64) -> Self {
        self.start(constant(value.to_string()))
    }

    pub fn size(mut self, expression: Expression) -> Self {
        self.size = Some(expression);
        self
    }

    pub fn size_constant(self, value: i64) -> Self {
        self.size(constant(value.to_string()))
    }

    pub fn type_name(mut self, name: impl Into<String>) -> Self {
        self.type_name = Some(name.into());
        self
    }

    pub fn read_transform(mut self, expression: Expression) -> Self {
        self.read_transform = Some(expression);
        self
    }

    pub fn existence_condition(mut self, expression: Expression) -> Self {
        self.existence_condition = Some(expression);
        self
    }

    pub fn build(self) -> Field {
        let mut name = NameDefinition::new(self.name);
        name.is_anonymous = self.is_anonymous;
        if let Some(abbreviation) = self.abbreviation {
            name.abbreviation = Some(super::Word::new(abbreviation));
        }

        let kind = if let Some(read_transform) = self.read_transform {
            FieldKind::Virtual { read_transform }
        } else {
            FieldKind::Physical {
                location: FieldLocation {
                    start: self.start.unwrap_or_else(|| constant("0")),
                    size: self.size.unwrap_or_else(|| constant("0")),
                },
                field_type: FieldType::Atomic {
                    reference: Reference::new(vec![self.type_name.as_deref().unwrap_or("UInt")]),
                    runtime_parameters: Vec::new(),
                },
            }
        };

        Field {
            name,
            existence_condition: self.existence_condition.unwrap_or_else(|| boolean_constant(true)),
            attributes: Vec::new(),
            kind,
            write_method: WriteMethod::Physical,
            write_method_detail: WriteMethodDetail::None,
            anonymous_subfields: self.anonymous_subfields,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StructureBuilder {
    structure: Structure,
}

impl StructureBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        StructureBuilder {
            structure: Structure::new(name, AddressableUnit::Byte),
        }
    }

    pub fn bits(name: impl Into<String>) -> Self {
        StructureBuilder {
            structure: Structure::new(name, AddressableUnit::Bit),
        }
    }

    pub fn physical_field(mut self, field: FieldBuilder) -> Self {
        self.structure.fields.push(field.build());
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.structure.fields.push(field);
        self
    }

    pub fn runtime_parameter(mut self, name: impl Into<String>, physical_type: &str) -> Self {
        self.structure.runtime_parameters.push(RuntimeParameter {
            name: NameDefinition::new(name),
            physical_type: Reference::new(vec![physical_type]),
        });
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.structure.attributes.push(Attribute {
            back_end: None,
            name: super::Word::new(name),
            value,
            source_location: SourceLocation::new(crate::diagnostics::Position::new(0, 0), crate::diagnostics::Position::new(0, 0)),
        });
        self
    }

    pub fn build(self) -> Structure {
        self.structure
    }

    pub fn build_type(self) -> TypeDefinition {
        TypeDefinition::Structure(self.structure)
    }
}

#[derive(Debug, Clone)]
pub struct EnumerationBuilder {
    enumeration: Enumeration,
}

impl EnumerationBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        EnumerationBuilder {
            enumeration: Enumeration::new(name),
        }
    }

    pub fn value(mut self, name: impl Into<String>, value: i64) -> Self {
        self.enumeration.values.push(EnumValue {
            name: NameDefinition::new(name),
            value: constant(value.to_string()),
            attributes: Vec::new(),
        });
        self
    }

    pub fn build_type(self) -> TypeDefinition {
        TypeDefinition::Enumeration(self.enumeration)
    }
}

#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new(source_file_name: impl Into<String>) -> Self {
        ModuleBuilder {
            module: Module::new(source_file_name),
        }
    }

    pub fn import(mut self, file_name: impl Into<String>, local_name: impl Into<String>) -> Self {
        self.module.foreign_imports.push(ForeignImport {
            file_name: file_name.into(),
            local_name: Some(local_name.into()),
        });
        self
    }

    pub fn type_definition(mut self, type_definition: TypeDefinition) -> Self {
        self.module.types.push(type_definition);
        self
    }

    pub fn build(self) -> Module {
        self.module
    }
}

/// Builds the prelude module's IR directly, since parsing its embedded source text
/// is out of scope here. Contains the primitive types referenced throughout
/// `SPEC_FULL.md`: `UInt`, `Int`, `Flag`.
pub fn prelude_module() -> Module {
    let mut module = Module::new("");
    module.types.push(TypeDefinition::External(super::External {
        name: NameDefinition::new("UInt"),
        attributes: Vec::new(),
    }));
    module.types.push(TypeDefinition::External(super::External {
        name: NameDefinition::new("Int"),
        attributes: Vec::new(),
    }));
    module.types.push(TypeDefinition::External(super::External {
        name: NameDefinition::new("Flag"),
        attributes: Vec::new(),
    }));
    module.types.push(TypeDefinition::External(super::External {
        name: NameDefinition::new("Bcd"),
        attributes: Vec::new(),
    }));
    module.types.push(TypeDefinition::External(super::External {
        name: NameDefinition::new("Float"),
        attributes: Vec::new(),
    }));
    module
}
