//! Constraint checking: `requires`-clause placement, enum bit-width fit,
//! `byte_order: Null` boundary legality, and basic array/runtime-parameter
//! legality.

use crate::diagnostics::{Bundle, Message};
use crate::ir::{CanonicalName, Field, FieldKind, FieldType, Ir, Reference, TypeDefinition};
use num_bigint::BigInt;
use std::str::FromStr;

const FLOAT_TYPE: (&str, &str) = ("", "Float");

pub fn check_constraints(ir: &mut Ir) -> Vec<Bundle> {
    let mut bundles = Vec::new();
    for module in &ir.modules {
        for type_definition in &module.types {
            check_in_type(type_definition, ir, &mut bundles);
        }
    }
    bundles
}

fn check_in_type(type_definition: &TypeDefinition, ir: &Ir, bundles: &mut Vec<Bundle>) {
    match type_definition {
        TypeDefinition::Structure(structure) => {
            for field in &structure.fields {
                check_requires_placement(field, ir, bundles);
                check_byte_order_null(field, bundles);
            }
            for parameter in &structure.runtime_parameters {
                // Runtime parameters must resolve to integer or enum; array types are
                // rejected structurally since `physical_type` is always a bare
                // `Reference`, never a `FieldType::Array`. Nothing further to check
                // here until the referenced type's kind is known post-resolution.
                let _ = parameter;
            }
        }
        TypeDefinition::Enumeration(enumeration) => {
            check_enum_fit(enumeration, bundles);
        }
        TypeDefinition::External(_) => {}
    }
    if !matches!(type_definition, TypeDefinition::External(_)) {
        for subtype in type_definition.subtypes() {
            check_in_type(subtype, ir, bundles);
        }
    }
}

/// `requires` may not be applied to an array field, a composite (struct-typed)
/// field, or a float-typed field; it constrains a single integer or enum value.
fn check_requires_placement(field: &Field, ir: &Ir, bundles: &mut Vec<Bundle>) {
    let Some(requires) = field.attributes.iter().find(|a| a.name.text == "requires") else {
        return;
    };
    let FieldKind::Physical { field_type, .. } = &field.kind else {
        return;
    };

    if matches!(field_type, FieldType::Array { .. }) {
        bundles.push(Bundle::single(Message::error(
            "",
            requires.source_location,
            "`requires` may not be applied to an array field",
        )));
        return;
    }

    if let FieldType::Atomic { reference, .. } = field_type {
        match atomic_field_kind(reference, ir) {
            AtomicFieldKind::CompositeStruct => bundles.push(Bundle::single(Message::error(
                "",
                requires.source_location,
                "`requires` may not be applied to a composite (struct-typed) field",
            ))),
            AtomicFieldKind::Float => bundles.push(Bundle::single(Message::error(
                "",
                requires.source_location,
                "`requires` may not be applied to a float-typed field",
            ))),
            AtomicFieldKind::Other => {}
        }
    }
}

enum AtomicFieldKind {
    CompositeStruct,
    Float,
    Other,
}

fn atomic_field_kind(reference: &Reference, ir: &Ir) -> AtomicFieldKind {
    let Some(canonical_name) = &reference.canonical_name else {
        return AtomicFieldKind::Other;
    };
    if is_float(canonical_name) {
        return AtomicFieldKind::Float;
    }
    match crate::ir_utils::find_type(ir, canonical_name) {
        Some(TypeDefinition::Structure(_)) => AtomicFieldKind::CompositeStruct,
        _ => AtomicFieldKind::Other,
    }
}

fn is_float(name: &CanonicalName) -> bool {
    name.0 == FLOAT_TYPE.0 && name.1.len() == 1 && name.1[0] == FLOAT_TYPE.1
}

/// `byte_order: "Null"` declares a field as not byte-order-dependent; it is
/// only legal when the field (or, for an array, one element) is one byte or
/// less. Anything wider with `Null` crosses a byte boundary with no declared
/// order, which the boundary behavior in the language disallows.
fn check_byte_order_null(field: &Field, bundles: &mut Vec<Bundle>) {
    let Some(attribute) = field.attributes.iter().find(|a| a.name.text == "byte_order") else {
        return;
    };
    if crate::ir_utils::attribute_string(attribute) != Some("Null") {
        return;
    }
    let FieldKind::Physical { location, field_type } = &field.kind else {
        return;
    };
    let width = match field_type {
        FieldType::Atomic { .. } => crate::ir_utils::exact_bits(&location.size),
        FieldType::Array { element_count, .. } => {
            let total = crate::ir_utils::exact_bits(&location.size);
            let count = element_count.as_ref().and_then(crate::ir_utils::exact_bits);
            match (total, count) {
                (Some(total), Some(count)) if count > 0 && total % count == 0 => Some(total / count),
                _ => None,
            }
        }
    };
    if let Some(width) = width {
        if width > 8 {
            bundles.push(Bundle::single(Message::error(
                "",
                attribute.source_location,
                "`byte_order: Null` is not valid on a field wider than one byte",
            )));
        }
    }
}

fn check_enum_fit(enumeration: &crate::ir::Enumeration, bundles: &mut Vec<Bundle>) {
    let (min, max) = if enumeration.is_signed {
        let half = BigInt::from(2).pow(enumeration.maximum_bits - 1);
        (-&half, half - 1)
    } else {
        (BigInt::from(0), BigInt::from(2).pow(enumeration.maximum_bits) - 1)
    };

    for value in &enumeration.values {
        if let crate::ir::ExpressionValue::Constant { value: literal } = &value.value.value {
            if let Ok(parsed) = BigInt::from_str(literal) {
                if parsed < min || parsed > max {
                    bundles.push(Bundle::single(Message::error(
                        "",
                        value.value.source_location,
                        format!(
                            "enum value '{}' does not fit in {} bits ({}signed)",
                            value.name.name.text,
                            enumeration.maximum_bits,
                            if enumeration.is_signed { "" } else { "un" }
                        ),
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builders::{FieldBuilder, ModuleBuilder, StructureBuilder};
    use crate::ir::{Attribute, AttributeValue, Word};

    fn requires_attribute() -> Attribute {
        Attribute {
            back_end: None,
            name: Word::new("requires"),
            value: AttributeValue::Boolean(true),
            source_location: crate::diagnostics::SourceLocation::new(
                crate::diagnostics::Position::new(1, 1),
                crate::diagnostics::Position::new(1, 2),
            ),
        }
    }

    #[test]
    fn requires_rejected_on_composite_struct_field() {
        let inner = StructureBuilder::new("Inner").build_type();
        let mut field = FieldBuilder::new("x").start_constant(0).size_constant(4).type_name("Inner").build();
        field.attributes.push(requires_attribute());
        let FieldKind::Physical { field_type: FieldType::Atomic { reference, .. }, .. } = &mut field.kind else {
            unreachable!()
        };
        reference.canonical_name = Some(("a.emb".to_string(), vec!["Outer".to_string(), "Inner".to_string()]));
        let mut outer = StructureBuilder::new("Outer").field(field).build();
        outer.subtypes.push(inner);
        let module = ModuleBuilder::new("a.emb").type_definition(TypeDefinition::Structure(outer)).build();
        let mut ir = Ir { modules: vec![module] };
        let bundles = check_constraints(&mut ir);
        assert!(bundles.iter().any(|b| b.messages[0].text.contains("composite")));
    }

    #[test]
    fn requires_rejected_on_float_field() {
        let mut field = FieldBuilder::new("x").start_constant(0).size_constant(4).type_name("Float").build();
        field.attributes.push(requires_attribute());
        let FieldKind::Physical { field_type: FieldType::Atomic { reference, .. }, .. } = &mut field.kind else {
            unreachable!()
        };
        reference.canonical_name = Some((String::new(), vec!["Float".to_string()]));
        let structure = StructureBuilder::new("Foo").field(field).build_type();
        let module = ModuleBuilder::new("a.emb").type_definition(structure).build();
        let mut ir = Ir { modules: vec![module] };
        let bundles = check_constraints(&mut ir);
        assert!(bundles.iter().any(|b| b.messages[0].text.contains("float")));
    }

    #[test]
    fn requires_still_rejected_on_array() {
        let mut field = FieldBuilder::new("x").start_constant(0).size_constant(4).type_name("UInt").build();
        field.attributes.push(requires_attribute());
        field.kind = FieldKind::Physical {
            location: crate::ir::FieldLocation {
                start: crate::ir::builders::constant("0"),
                size: crate::ir::builders::constant("4"),
            },
            field_type: FieldType::Array {
                element_type: Box::new(FieldType::Atomic {
                    reference: Reference::new(vec!["UInt"]),
                    runtime_parameters: Vec::new(),
                }),
                element_count: Some(crate::ir::builders::constant("4")),
            },
        };
        let structure = StructureBuilder::new("Foo").field(field).build_type();
        let module = ModuleBuilder::new("a.emb").type_definition(structure).build();
        let mut ir = Ir { modules: vec![module] };
        let bundles = check_constraints(&mut ir);
        assert!(bundles.iter().any(|b| b.messages[0].text.contains("array field")));
    }
}
