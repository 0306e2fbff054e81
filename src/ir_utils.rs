//! Small stateless helpers shared across passes: attribute lookup, constant
//! evaluation, canonical-name lookup, and field classification.

use crate::ir::{
    Attribute, AttributeValue, CanonicalName, Expression, ExpressionType, ExpressionValue, Field, Ir, TypeDefinition,
};

pub fn get_attribute<'a>(attributes: &'a [Attribute], back_end: Option<&str>, name: &str) -> Option<&'a Attribute> {
    attributes
        .iter()
        .find(|attribute| attribute.name.text == name && attribute.back_end.as_deref() == back_end)
}

/// Evaluates a fully-reduced constant expression to a literal value. Returns
/// `None` for any expression that is not a bare constant (field references,
/// unresolved builtins, and compound arithmetic are not reduced here; the bounds
/// engine in [`crate::passes::bounds`] is the authority on their value ranges).
pub fn constant_value(expression: &Expression) -> Option<ConstantValue> {
    match &expression.value {
        ExpressionValue::Constant { value } => Some(ConstantValue::Integer(value.clone())),
        ExpressionValue::BooleanConstant { value } => Some(ConstantValue::Boolean(*value)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstantValue {
    Integer(String),
    Boolean(bool),
}

pub fn field_is_virtual(field: &Field) -> bool {
    field.is_virtual()
}

/// Produces a canonical, hashable key for a reference's resolved name, for use as
/// a dependency-graph node identifier.
pub fn hashable_form_of_reference(name: &CanonicalName) -> (String, Vec<String>) {
    (name.0.clone(), name.1.clone())
}

/// Looks up a canonical name in the IR, returning the matched type definition if
/// the path resolves to one (fields are not separately addressable by this
/// function; callers that need a field look it up within the returned structure).
pub fn find_type<'a>(ir: &'a Ir, name: &CanonicalName) -> Option<&'a TypeDefinition> {
    let module = ir.module(&name.0)?;
    let mut candidates = &module.types;
    let mut found: Option<&TypeDefinition> = None;
    for segment in &name.1 {
        found = candidates.iter().find(|t| &t.name_definition().name.text == segment);
        match found {
            Some(type_definition) => candidates = type_definition.subtypes(),
            None => return None,
        }
    }
    found
}

/// Finds the field a fully-qualified field canonical name refers to: the last
/// path segment is the field's own name, everything before it is the enclosing
/// structure's type path (as used by [`find_type`]).
pub fn find_field<'a>(ir: &'a Ir, name: &CanonicalName) -> Option<&'a Field> {
    let (field_name, type_path) = name.1.split_last()?;
    let type_definition = find_type(ir, &(name.0.clone(), type_path.to_vec()))?;
    match type_definition {
        TypeDefinition::Structure(structure) => structure.fields.iter().find(|f| &f.name.name.text == field_name),
        _ => None,
    }
}

/// Returns an integer-typed expression's value in bits when its bounds (set by
/// [`crate::passes::bounds`]) are exact, i.e. `minimum == maximum`.
pub fn exact_bits(expression: &Expression) -> Option<u64> {
    match &expression.expression_type {
        ExpressionType::Integer(bounds) if bounds.minimum == bounds.maximum => bounds.maximum.parse::<u64>().ok(),
        _ => None,
    }
}

pub fn attribute_bool(attribute: &Attribute) -> Option<bool> {
    match &attribute.value {
        AttributeValue::Boolean(b) => Some(*b),
        _ => None,
    }
}

pub fn attribute_string(attribute: &Attribute) -> Option<&str> {
    match &attribute.value {
        AttributeValue::String(s) => Some(s.as_str()),
        _ => None,
    }
}
