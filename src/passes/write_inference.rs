//! Write-method inference: classifies each virtual field as a plain alias, an
//! algebraically invertible transform of a physical field, or read-only.

use crate::ir::{Expression, ExpressionValue, Field, FieldKind, FunctionKind, Ir, TypeDefinition, WriteMethod, WriteMethodDetail};

pub fn infer_write_methods(ir: &mut Ir) -> Vec<crate::diagnostics::Bundle> {
    for module in &mut ir.modules {
        for type_definition in &mut module.types {
            infer_in_type(type_definition);
        }
    }
    Vec::new()
}

fn infer_in_type(type_definition: &mut TypeDefinition) {
    if let TypeDefinition::Structure(structure) = type_definition {
        for field in &mut structure.fields {
            infer_field(field);
        }
    }
    if !matches!(type_definition, TypeDefinition::External(_)) {
        for subtype in type_definition.subtypes_mut() {
            infer_in_type(subtype);
        }
    }
}

fn infer_field(field: &mut Field) {
    let FieldKind::Virtual { read_transform } = &field.kind else {
        field.write_method = WriteMethod::Physical;
        return;
    };

    field.write_method = WriteMethod::ReadOnly;

    if let ExpressionValue::FieldReference { path } = &read_transform.value {
        field.write_method_detail = WriteMethodDetail::Alias {
            path: path.iter().flat_map(|r| r.source_name.iter().map(|w| w.text.clone())).collect(),
        };
        return;
    }

    if let Some((destination, inverted)) = invert_transform(read_transform) {
        field.write_method_detail = WriteMethodDetail::Transform {
            destination,
            function_body: inverted,
        };
    }
}

/// Attempts to algebraically invert `expression`, which must be of the form
/// `f(logical_subexpression, complex_subexpression)` with `f` an invertible
/// operator (`+`/`-`) and exactly one operand a bare reference to a physical
/// field. Returns `(destination_field_name, inverted_expression)` where the
/// inverted expression computes the physical value from `$logical_value`.
fn invert_transform(expression: &Expression) -> Option<(String, Expression)> {
    let ExpressionValue::Function { function, args } = &expression.value else {
        return None;
    };
    if args.len() != 2 {
        return None;
    }

    let field_name = |e: &Expression| -> Option<String> {
        if let ExpressionValue::FieldReference { path } = &e.value {
            if path.len() == 1 {
                return path[0].source_name.first().map(|w| w.text.clone());
            }
        }
        None
    };

    let logical_value = || Expression::new(ExpressionValue::BuiltinReference {
        reference: crate::ir::Reference::new(vec!["logical_value"]),
    });

    match function {
        FunctionKind::Addition => {
            // y = a + b; if a is the physical field: a = y - b. If b is: b = y - a.
            if let Some(name) = field_name(&args[0]) {
                let inverted = Expression::new(ExpressionValue::Function {
                    function: FunctionKind::Subtraction,
                    args: vec![logical_value(), args[1].clone()],
                });
                return Some((name, inverted));
            }
            if let Some(name) = field_name(&args[1]) {
                let inverted = Expression::new(ExpressionValue::Function {
                    function: FunctionKind::Subtraction,
                    args: vec![logical_value(), args[0].clone()],
                });
                return Some((name, inverted));
            }
            None
        }
        FunctionKind::Subtraction => {
            // y = a - b; if a is the physical field: a = y + b. If b is: b = a - y.
            if let Some(name) = field_name(&args[0]) {
                let inverted = Expression::new(ExpressionValue::Function {
                    function: FunctionKind::Addition,
                    args: vec![logical_value(), args[1].clone()],
                });
                return Some((name, inverted));
            }
            if let Some(name) = field_name(&args[1]) {
                let inverted = Expression::new(ExpressionValue::Function {
                    function: FunctionKind::Subtraction,
                    args: vec![args[0].clone(), logical_value()],
                });
                return Some((name, inverted));
            }
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builders::{constant, field_reference, function, FieldBuilder, StructureBuilder};
    use crate::ir::FunctionKind as FK;

    #[test]
    fn invertible_subtraction_from_constant() {
        // y = 50 - x
        let transform = function(FK::Subtraction, vec![constant("50"), field_reference(vec!["x"])]);
        let structure = StructureBuilder::new("Foo")
            .physical_field(FieldBuilder::new("x").start_constant(0).size_constant(1))
            .field(FieldBuilder::new("y").read_transform(transform).build())
            .build();

        let mut structure = structure;
        infer_field(&mut structure.fields[1]);

        match &structure.fields[1].write_method_detail {
            WriteMethodDetail::Transform { destination, .. } => assert_eq!(destination, "x"),
            other => panic!("expected Transform, got {other:?}"),
        }
    }

    #[test]
    fn plain_alias_is_detected() {
        let structure = StructureBuilder::new("Foo")
            .physical_field(FieldBuilder::new("real").start_constant(0).size_constant(1))
            .field(FieldBuilder::new("alias").read_transform(field_reference(vec!["real"])).build())
            .build();
        let mut structure = structure;
        infer_field(&mut structure.fields[1]);
        assert!(matches!(structure.fields[1].write_method_detail, WriteMethodDetail::Alias { .. }));
    }
}
