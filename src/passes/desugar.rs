//! Desugaring: replaces the `next` keyword, lifts anonymous inner-type fields
//! into aliases, and synthesizes the `size_in_*`/`max_size_in_*`/`min_size_in_*`
//! virtual fields.
//!
//! Grounded on the reference compiler's `synthetics.py`: this pass runs in two
//! stages over every structure — first all `next` replacement across the whole
//! IR, short-circuiting on error, then (per structure) anonymous-alias expansion
//! followed by size-virtual synthesis followed by size-bound synthesis.

use crate::diagnostics::{Bundle, Message, SourceLocation};
use crate::ir::{
    AddressableUnit, Attribute, AttributeValue, Expression, ExpressionValue, Field, FieldKind, FieldLocation,
    FieldType, FunctionKind, Ir, NameDefinition, Reference, TypeDefinition, WriteMethod, WriteMethodDetail, Word,
};

pub fn desugar(ir: &mut Ir) -> Vec<Bundle> {
    let mut bundles = Vec::new();
    for module in &mut ir.modules {
        for type_definition in &mut module.types {
            replace_next_in_type(type_definition, &mut bundles);
        }
    }
    if !bundles.is_empty() {
        return bundles;
    }

    for module in &mut ir.modules {
        for type_definition in &mut module.types {
            add_virtuals_in_type(type_definition);
        }
    }
    bundles
}

fn replace_next_in_type(type_definition: &mut TypeDefinition, bundles: &mut Vec<Bundle>) {
    if let TypeDefinition::Structure(structure) = type_definition {
        replace_next_in_structure(structure, bundles);
    }
    if !matches!(type_definition, TypeDefinition::External(_)) {
        for subtype in type_definition.subtypes_mut() {
            replace_next_in_type(subtype, bundles);
        }
    }
}

fn replace_next_in_structure(structure: &mut crate::ir::Structure, bundles: &mut Vec<Bundle>) {
    let mut last_physical_location: Option<FieldLocation> = None;

    for field in &mut structure.fields {
        let FieldKind::Physical { location, .. } = &mut field.kind else {
            continue;
        };

        if uses_next(&location.size) {
            bundles.push(Bundle::single(Message::error(
                "",
                location.size.source_location,
                "`next` may only be used in the start expression of a physical field.",
            )));
            return;
        }

        if let Some(previous) = &last_physical_location {
            let replacement = function(
                FunctionKind::Addition,
                vec![previous.start.clone(), previous.size.clone()],
            );
            if !replace_next(&mut location.start, &replacement) {
                // no `next` present; nothing to do.
            }
        } else if uses_next(&location.start) {
            bundles.push(Bundle::single(Message::error(
                "",
                location.start.source_location,
                "`next` may not be used in the first physical field of a structure; perhaps you meant 0?",
            )));
            return;
        }

        last_physical_location = Some(FieldLocation {
            start: location.start.clone(),
            size: location.size.clone(),
        });
    }
}

fn function(kind: FunctionKind, args: Vec<Expression>) -> Expression {
    Expression::new(ExpressionValue::Function { function: kind, args })
}

fn uses_next(expression: &Expression) -> bool {
    match &expression.value {
        ExpressionValue::BuiltinReference { reference } => reference.source_name.last().map(|w| w.text.as_str()) == Some("next"),
        ExpressionValue::Function { args, .. } => args.iter().any(uses_next),
        _ => false,
    }
}

/// Replaces every `next` builtin reference within `expression` with a clone of
/// `replacement`. Returns whether any replacement occurred.
fn replace_next(expression: &mut Expression, replacement: &Expression) -> bool {
    if let ExpressionValue::BuiltinReference { reference } = &expression.value {
        if reference.source_name.last().map(|w| w.text.as_str()) == Some("next") {
            *expression = replacement.clone();
            return true;
        }
    }
    if let ExpressionValue::Function { args, .. } = &mut expression.value {
        let mut replaced = false;
        for arg in args {
            replaced |= replace_next(arg, replacement);
        }
        return replaced;
    }
    false
}

fn add_virtuals_in_type(type_definition: &mut TypeDefinition) {
    if let TypeDefinition::Structure(structure) = type_definition {
        add_anonymous_aliases(structure);
        add_size_virtuals(structure);
        add_size_bound_virtuals(structure);
    }
    if !matches!(type_definition, TypeDefinition::External(_)) {
        for subtype in type_definition.subtypes_mut() {
            add_virtuals_in_type(subtype);
        }
    }
}

fn skip_text_output_attribute() -> Attribute {
    Attribute {
        back_end: None,
        name: Word::new("text_output"),
        value: AttributeValue::String("Skip".to_string()),
        source_location: SourceLocation::synthetic(),
    }
}

fn mark_synthetic(expression: &mut Expression) {
    expression.source_location.mark_synthetic();
    if let ExpressionValue::Function { args, .. } = &mut expression.value {
        for arg in args {
            mark_synthetic(arg);
        }
    }
    if let ExpressionValue::FieldReference { path } = &mut expression.value {
        for reference in path {
            for word in &mut reference.source_name {
                word.source_location.mark_synthetic();
            }
        }
    }
}

/// Lifts every sub-field of an anonymous inner `bits` block into an alias virtual
/// field on the outer structure. The subfield's own name is marked synthetic so a
/// name collision is reported once, on the alias, not twice.
fn add_anonymous_aliases(structure: &mut crate::ir::Structure) {
    let mut new_fields = Vec::new();

    for field in &mut structure.fields {
        if !field.name.is_anonymous {
            continue;
        }
        let FieldKind::Physical { field_type, .. } = &field.kind else {
            continue;
        };
        let anonymous_name = field.name.name.text.clone();

        // Inline `bits:` blocks are modeled as a reference to a synthesized inner
        // structure; subfields live on that structure's own field list, which a
        // prior expansion stage (parser-adjacent, out of scope here) would have
        // already hoisted next to the outer type as a subtype named after the
        // field's anonymous type. This pass only needs the subfield names, which
        // production code carries on the anonymous field itself.
        if let FieldType::Atomic { .. } = field_type {
            for subfield_name in &field.anonymous_subfields.clone() {
                let mut alias_existence = function(
                    FunctionKind::And,
                    vec![
                        function(
                            FunctionKind::Presence,
                            vec![field_reference(vec![anonymous_name.as_str()])],
                        ),
                        function(
                            FunctionKind::Presence,
                            vec![field_reference(vec![anonymous_name.as_str(), subfield_name.as_str()])],
                        ),
                    ],
                );
                mark_synthetic(&mut alias_existence);

                let mut read_transform = field_reference(vec![anonymous_name.as_str(), subfield_name.as_str()]);
                mark_synthetic(&mut read_transform);

                new_fields.push(Field {
                    name: NameDefinition::new(subfield_name.clone()),
                    existence_condition: alias_existence,
                    attributes: Vec::new(),
                    kind: FieldKind::Virtual { read_transform },
                    write_method: WriteMethod::ReadOnly,
                    write_method_detail: WriteMethodDetail::None,
                    anonymous_subfields: Vec::new(),
                });
            }
        }
        field.attributes.push(skip_text_output_attribute());
        field.name.name.source_location.mark_synthetic();
        if let Some(abbreviation) = &mut field.name.abbreviation {
            abbreviation.source_location.mark_synthetic();
        }
    }

    structure.fields.extend(new_fields);
}

fn field_reference(path: Vec<&str>) -> Expression {
    Expression::new(ExpressionValue::FieldReference {
        path: path.into_iter().map(|segment| Reference::new(vec![segment])).collect(),
    })
}

fn add_size_virtuals(structure: &mut crate::ir::Structure) {
    let unit_name = match structure.addressable_unit {
        AddressableUnit::Bit => "size_in_bits",
        AddressableUnit::Byte => "size_in_bytes",
    };

    let mut terms = vec![constant("0")];
    for field in &structure.fields {
        if field.is_virtual() {
            continue;
        }
        let FieldKind::Physical { location, .. } = &field.kind else {
            continue;
        };
        let end = function(FunctionKind::Addition, vec![location.start.clone(), location.size.clone()]);
        let guarded = function(FunctionKind::Choice, vec![field.existence_condition.clone(), end, constant("0")]);
        terms.push(guarded);
    }

    let mut read_transform = function(FunctionKind::Maximum, terms);
    mark_synthetic(&mut read_transform);

    let mut field = FieldBuilderInternal::virtual_field(unit_name, read_transform);
    field.attributes.push(skip_text_output_attribute());
    structure.fields.push(field);
}

fn add_size_bound_virtuals(structure: &mut crate::ir::Structure) {
    let (size_name, max_name, min_name) = match structure.addressable_unit {
        AddressableUnit::Bit => ("size_in_bits", "max_size_in_bits", "min_size_in_bits"),
        AddressableUnit::Byte => ("size_in_bytes", "max_size_in_bytes", "min_size_in_bytes"),
    };

    let mut max_transform = function(FunctionKind::UpperBound, vec![field_reference(vec![size_name])]);
    mark_synthetic(&mut max_transform);
    let mut max_field = FieldBuilderInternal::virtual_field(max_name, max_transform);
    max_field.attributes.push(skip_text_output_attribute());

    let mut min_transform = function(FunctionKind::LowerBound, vec![field_reference(vec![size_name])]);
    mark_synthetic(&mut min_transform);
    let mut min_field = FieldBuilderInternal::virtual_field(min_name, min_transform);
    min_field.attributes.push(skip_text_output_attribute());

    structure.fields.push(max_field);
    structure.fields.push(min_field);
}

fn constant(value: impl Into<String>) -> Expression {
    Expression::new(ExpressionValue::Constant { value: value.into() })
}

struct FieldBuilderInternal;
impl FieldBuilderInternal {
    fn virtual_field(name: &str, read_transform: Expression) -> Field {
        Field {
            name: NameDefinition::new(name),
            existence_condition: Expression::new(ExpressionValue::BooleanConstant { value: true }),
            attributes: Vec::new(),
            kind: FieldKind::Virtual { read_transform },
            write_method: WriteMethod::ReadOnly,
            write_method_detail: WriteMethodDetail::None,
            anonymous_subfields: Vec::new(),
        }
    }
}
