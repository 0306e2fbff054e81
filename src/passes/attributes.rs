//! Attribute normalization: known-attribute validation, the `byte_order`
//! module-to-struct-to-field cascade, enum-case and back-end-list validation,
//! and computed attributes (`fixed_size_in_bits`, `is_signed`, `maximum_bits`).

use crate::diagnostics::{Bundle, Message, Position, SourceLocation};
use crate::ir::{
    AddressableUnit, Attribute, AttributeValue, CanonicalName, Field, FieldKind, FieldType, Ir, Structure,
    TypeDefinition, Word,
};
use std::collections::HashSet;

const KNOWN_UNQUALIFIED_ATTRIBUTES: &[&str] = &[
    "byte_order",
    "fixed_size_in_bits",
    "is_signed",
    "maximum_bits",
    "text_output",
    "expected_back_ends",
    "requires",
    "enum_case",
];

const VALID_ENUM_CASES: &[&str] = &["SHOUTY_CASE", "kCamelCase"];

pub fn check_attributes(ir: &mut Ir, config: &crate::config::PipelineConfig) -> Vec<Bundle> {
    let mut bundles = Vec::new();
    let external_names = external_type_names(ir);

    for module in &mut ir.modules {
        check_duplicates(&module.attributes, &mut bundles);
        let mut module_byte_order = None;
        for attribute in &module.attributes {
            check_known(attribute, &mut bundles);
            check_back_end_expected(attribute, config, &mut bundles);
            match attribute.name.text.as_str() {
                "expected_back_ends" => check_expected_back_ends(attribute, &mut bundles),
                "byte_order" => match &attribute.value {
                    AttributeValue::Default => bundles.push(Bundle::single(Message::error(
                        "",
                        attribute.source_location,
                        "`byte_order: $default` has no enclosing scope to inherit from at module level",
                    ))),
                    _ => {
                        if let Some(value) = crate::ir_utils::attribute_string(attribute) {
                            module_byte_order = Some(value.to_string());
                        }
                    }
                },
                _ => {}
            }
        }
        for type_definition in &mut module.types {
            check_in_type(type_definition, config, module_byte_order.clone(), &external_names, &mut bundles);
        }
    }

    bundles
}

/// Collects the canonical name of every `external` type declaration, used to
/// decide whether an atomic field reference is to a primitive (byte-order
/// dependent when wider than a byte) or to a composite struct/enum (never
/// byte-order dependent at this field's level; its own fields carry their own
/// byte order).
fn external_type_names(ir: &Ir) -> HashSet<CanonicalName> {
    let mut set = HashSet::new();
    for module in &ir.modules {
        let mut path = Vec::new();
        collect_external_names(&module.types, &module.source_file_name, &mut path, &mut set);
    }
    set
}

fn collect_external_names(types: &[TypeDefinition], module_name: &str, path: &mut Vec<String>, set: &mut HashSet<CanonicalName>) {
    for type_definition in types {
        path.push(type_definition.name_definition().name.text.clone());
        if matches!(type_definition, TypeDefinition::External(_)) {
            set.insert((module_name.to_string(), path.clone()));
        } else {
            collect_external_names(type_definition.subtypes(), module_name, path, set);
        }
        path.pop();
    }
}

fn check_in_type(
    type_definition: &mut TypeDefinition,
    config: &crate::config::PipelineConfig,
    inherited_byte_order: Option<String>,
    external_names: &HashSet<CanonicalName>,
    bundles: &mut Vec<Bundle>,
) {
    let mut next_inherited = inherited_byte_order.clone();

    match type_definition {
        TypeDefinition::Structure(structure) => {
            check_duplicates(&structure.attributes, bundles);
            for attribute in &structure.attributes {
                check_known(attribute, bundles);
                check_back_end_expected(attribute, config, bundles);
            }

            if structure.addressable_unit == AddressableUnit::Bit {
                if let Some(attribute) = structure.attributes.iter().find(|a| a.name.text == "byte_order") {
                    bundles.push(Bundle::single(Message::error(
                        "",
                        attribute.source_location,
                        "`byte_order` may not be specified on a `bits` block",
                    )));
                }
            } else {
                next_inherited = resolve_struct_byte_order(structure, inherited_byte_order, bundles);
                check_fields_byte_order(structure, next_inherited.as_deref(), external_names, bundles);
            }

            for field in &mut structure.fields {
                check_duplicates(&field.attributes, bundles);
                for attribute in &field.attributes {
                    check_known(attribute, bundles);
                    check_back_end_expected(attribute, config, bundles);
                }
            }
        }
        TypeDefinition::Enumeration(enumeration) => {
            check_duplicates(&enumeration.attributes, bundles);
            for attribute in &enumeration.attributes {
                check_known(attribute, bundles);
                check_back_end_expected(attribute, config, bundles);
                match attribute.name.text.as_str() {
                    "byte_order" => bundles.push(Bundle::single(Message::error(
                        "",
                        attribute.source_location,
                        "`byte_order` may not be specified on an `enum`",
                    ))),
                    "enum_case" => check_enum_case(attribute, bundles),
                    _ => {}
                }
            }
            compute_enum_attributes(enumeration, bundles);
        }
        TypeDefinition::External(external) => {
            check_duplicates(&external.attributes, bundles);
            for attribute in &external.attributes {
                check_known(attribute, bundles);
                check_back_end_expected(attribute, config, bundles);
            }
        }
    }

    if !matches!(type_definition, TypeDefinition::External(_)) {
        for subtype in type_definition.subtypes_mut() {
            check_in_type(subtype, config, next_inherited.clone(), external_names, bundles);
        }
    }
}

/// Resolves a byte-addressable structure's own `byte_order` against the
/// inherited (module, or enclosing structure) default: `$default` or an absent
/// attribute both inherit; a concrete value overrides.
fn resolve_struct_byte_order(structure: &Structure, inherited: Option<String>, bundles: &mut Vec<Bundle>) -> Option<String> {
    let Some(attribute) = structure.attributes.iter().find(|a| a.name.text == "byte_order") else {
        return inherited;
    };
    match &attribute.value {
        AttributeValue::Default => inherited,
        AttributeValue::String(_) => crate::ir_utils::attribute_string(attribute).map(str::to_string),
        _ => {
            bundles.push(Bundle::single(Message::error("", attribute.source_location, "byte_order must be a string")));
            inherited
        }
    }
}

/// Checks every field's `byte_order` against the cascade and the field's
/// computed byte-order dependence (a primitive field wider than one byte).
fn check_fields_byte_order(structure: &mut Structure, struct_default: Option<&str>, external_names: &HashSet<CanonicalName>, bundles: &mut Vec<Bundle>) {
    for field in &mut structure.fields {
        let width = dependent_width(field, external_names);
        let Some(attribute_index) = field.attributes.iter().position(|a| a.name.text == "byte_order") else {
            if let Some(width) = width {
                if width > 8 && struct_default.is_none() {
                    bundles.push(Bundle::single(Message::error(
                        "",
                        field.name.name.source_location,
                        format!(
                            "field '{}' is byte-order-dependent and has no byte_order default in scope",
                            field.name.name.text
                        ),
                    )));
                }
            }
            continue;
        };

        let attribute = &mut field.attributes[attribute_index];
        match &attribute.value {
            AttributeValue::Default => bundles.push(Bundle::single(Message::error(
                "",
                attribute.source_location,
                "`byte_order: $default` is not valid on a field; omit the attribute to inherit the enclosing default",
            ))),
            AttributeValue::String(value) => {
                let is_null = value == "Null";
                if let Some(width) = width {
                    if width > 8 {
                        if is_null {
                            bundles.push(Bundle::single(Message::error(
                                "",
                                attribute.source_location,
                                "`byte_order: Null` is only valid for a field of one byte or less",
                            )));
                        }
                    } else if !is_null {
                        bundles.push(Bundle::single(Message::error(
                            "",
                            attribute.source_location,
                            "field is not byte-order-dependent; `byte_order` here must be `Null` or omitted",
                        )));
                    }
                }
            }
            _ => bundles.push(Bundle::single(Message::error("", attribute.source_location, "byte_order must be a string"))),
        }
    }
}

/// The field's width in bits if it is a primitive (`external`-typed) field or
/// array of such, and that width is known exactly; `None` for composite fields
/// (their own substructure carries byte order, not this field) or fields whose
/// width cannot be computed exactly (e.g. a runtime-variable array length).
fn dependent_width(field: &Field, external_names: &HashSet<CanonicalName>) -> Option<u64> {
    let FieldKind::Physical { location, field_type } = &field.kind else { return None };
    if !innermost_is_external(field_type, external_names) {
        return None;
    }
    match field_type {
        FieldType::Atomic { .. } => crate::ir_utils::exact_bits(&location.size),
        FieldType::Array { element_count, .. } => {
            let total = crate::ir_utils::exact_bits(&location.size)?;
            let count = element_count.as_ref().and_then(crate::ir_utils::exact_bits)?;
            if count == 0 || total % count != 0 {
                return None;
            }
            Some(total / count)
        }
    }
}

fn innermost_is_external(field_type: &FieldType, external_names: &HashSet<CanonicalName>) -> bool {
    match field_type {
        FieldType::Atomic { reference, .. } => reference.canonical_name.as_ref().is_some_and(|name| external_names.contains(name)),
        FieldType::Array { element_type, .. } => innermost_is_external(element_type, external_names),
    }
}

fn check_duplicates(attributes: &[Attribute], bundles: &mut Vec<Bundle>) {
    let mut seen: HashSet<(Option<String>, String)> = HashSet::new();
    for attribute in attributes {
        let key = (attribute.back_end.clone(), attribute.name.text.clone());
        if !seen.insert(key) {
            bundles.push(Bundle::single(Message::error(
                "",
                attribute.source_location,
                format!("Duplicate attribute '{}'", attribute.name.text),
            )));
        }
    }
}

fn check_known(attribute: &Attribute, bundles: &mut Vec<Bundle>) {
    if !KNOWN_UNQUALIFIED_ATTRIBUTES.contains(&attribute.name.text.as_str()) {
        bundles.push(Bundle::single(Message::error(
            "",
            attribute.source_location,
            format!("Unknown attribute '{}'", attribute.name.text),
        )));
    }
}

fn check_back_end_expected(attribute: &Attribute, config: &crate::config::PipelineConfig, bundles: &mut Vec<Bundle>) {
    if let Some(back_end) = &attribute.back_end {
        if !config.expected_back_ends.iter().any(|b| b == back_end) {
            bundles.push(Bundle::single(Message::error(
                "",
                attribute.source_location,
                format!("Attribute specifies back end '{back_end}' which is not in `expected_back_ends`"),
            )));
        }
    }
}

/// `enum_case` takes a comma-separated list drawn from a closed set; an empty
/// entry (leading/trailing/doubled comma) or a duplicate entry is an error
/// pointing at the offending entry's column within the attribute value.
fn check_enum_case(attribute: &Attribute, bundles: &mut Vec<Bundle>) {
    let Some(text) = crate::ir_utils::attribute_string(attribute) else {
        bundles.push(Bundle::single(Message::error("", attribute.source_location, "enum_case must be a string")));
        return;
    };
    let mut seen = HashSet::new();
    let mut column = attribute.source_location.start.column;
    for entry in text.split(',') {
        let entry_column = column + leading_whitespace(entry);
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            bundles.push(Bundle::single(Message::error(
                "",
                column_location(attribute.source_location, entry_column),
                "enum_case has an empty entry",
            )));
        } else if !VALID_ENUM_CASES.contains(&trimmed) {
            bundles.push(Bundle::single(Message::error(
                "",
                column_location(attribute.source_location, entry_column),
                format!("enum_case entry '{trimmed}' must be one of SHOUTY_CASE, kCamelCase"),
            )));
        } else if !seen.insert(trimmed) {
            bundles.push(Bundle::single(Message::error(
                "",
                column_location(attribute.source_location, entry_column),
                format!("duplicate enum_case entry '{trimmed}'"),
            )));
        }
        column += entry.len() as u32 + 1;
    }
}

/// `expected_back_ends` takes a comma-separated list of back-end specifiers
/// (plain identifiers); malformed entries are reported at their column.
fn check_expected_back_ends(attribute: &Attribute, bundles: &mut Vec<Bundle>) {
    let Some(text) = crate::ir_utils::attribute_string(attribute) else {
        bundles.push(Bundle::single(Message::error("", attribute.source_location, "expected_back_ends must be a string")));
        return;
    };
    let mut column = attribute.source_location.start.column;
    for entry in text.split(',') {
        let entry_column = column + leading_whitespace(entry);
        let trimmed = entry.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            bundles.push(Bundle::single(Message::error(
                "",
                column_location(attribute.source_location, entry_column),
                format!("expected_back_ends has an invalid specifier '{trimmed}'"),
            )));
        }
        column += entry.len() as u32 + 1;
    }
}

fn leading_whitespace(entry: &str) -> u32 {
    (entry.len() - entry.trim_start().len()) as u32
}

fn column_location(base: SourceLocation, column: u32) -> SourceLocation {
    SourceLocation::new(Position::new(base.start.line, column), Position::new(base.start.line, column + 1))
}

fn compute_enum_attributes(enumeration: &mut crate::ir::Enumeration, bundles: &mut Vec<Bundle>) {
    enumeration.is_signed = enumeration.values.iter().any(|value| {
        matches!(&value.value.value, crate::ir::ExpressionValue::Constant { value } if value.starts_with('-'))
    });

    if let Some(attribute) = enumeration.attributes.iter().find(|a| a.name.text == "maximum_bits") {
        if let AttributeValue::Integer(text) = &attribute.value {
            match text.parse::<u32>() {
                Ok(bits) if (1..=64).contains(&bits) => enumeration.maximum_bits = bits,
                _ => bundles.push(Bundle::single(Message::error(
                    "",
                    attribute.source_location,
                    "maximum_bits must be between 1 and 64",
                ))),
            }
        }
    }
}

/// Checks (and, when absent, synthesizes) each structure's `fixed_size_in_bits`
/// against its computed size (from the `size_in_bits`/`size_in_bytes` virtual
/// field synthesized by desugaring, once [`crate::passes::bounds`] has resolved
/// its bounds).
pub fn verify_fixed_size(ir: &mut Ir) -> Vec<Bundle> {
    let mut bundles = Vec::new();
    for module in &mut ir.modules {
        for type_definition in &mut module.types {
            verify_fixed_size_in_type(type_definition, &mut bundles);
        }
    }
    bundles
}

fn verify_fixed_size_in_type(type_definition: &mut TypeDefinition, bundles: &mut Vec<Bundle>) {
    if let TypeDefinition::Structure(structure) = type_definition {
        let size_field_name = match structure.addressable_unit {
            AddressableUnit::Bit => "size_in_bits",
            AddressableUnit::Byte => "size_in_bytes",
        };
        let computed_units = structure
            .fields
            .iter()
            .find(|f| f.name.name.text == size_field_name)
            .and_then(|f| match &f.kind {
                FieldKind::Virtual { read_transform } => crate::ir_utils::exact_bits(read_transform),
                FieldKind::Physical { .. } => None,
            });
        let computed_bits = computed_units.map(|units| match structure.addressable_unit {
            AddressableUnit::Bit => units,
            AddressableUnit::Byte => units * 8,
        });

        let existing_index = structure.attributes.iter().position(|a| a.name.text == "fixed_size_in_bits");
        match existing_index {
            Some(index) => {
                let attribute = structure.attributes[index].clone();
                match &attribute.value {
                    AttributeValue::Integer(text) => match text.parse::<u64>() {
                        Ok(declared) => {
                            if let Some(actual) = computed_bits {
                                if declared != actual {
                                    bundles.push(Bundle::single(Message::error(
                                        "",
                                        attribute.source_location,
                                        format!("fixed_size_in_bits declares {declared} bits but the structure's computed size is {actual} bits"),
                                    )));
                                }
                            }
                        }
                        Err(_) => bundles.push(Bundle::single(Message::error(
                            "",
                            attribute.source_location,
                            "fixed_size_in_bits must be a non-negative integer",
                        ))),
                    },
                    _ => bundles.push(Bundle::single(Message::error(
                        "",
                        attribute.source_location,
                        "fixed_size_in_bits must be an integer literal",
                    ))),
                }
            }
            None => {
                if let Some(actual) = computed_bits {
                    structure.attributes.push(Attribute {
                        back_end: None,
                        name: Word::new("fixed_size_in_bits"),
                        value: AttributeValue::Integer(actual.to_string()),
                        source_location: SourceLocation::new(Position::new(0, 0), Position::new(0, 0)),
                    });
                }
            }
        }
    }
    if !matches!(type_definition, TypeDefinition::External(_)) {
        for subtype in type_definition.subtypes_mut() {
            verify_fixed_size_in_type(subtype, bundles);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builders::{FieldBuilder, ModuleBuilder, StructureBuilder};
    use crate::ir::Ir;

    fn config() -> crate::config::PipelineConfig {
        crate::config::PipelineConfig::default()
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        let structure = StructureBuilder::new("Foo").attribute("bogus", AttributeValue::Boolean(true)).build_type();
        let module = ModuleBuilder::new("a.emb").type_definition(structure).build();
        let mut ir = Ir { modules: vec![module] };
        let bundles = check_attributes(&mut ir, &config());
        assert!(bundles.iter().any(|b| b.messages[0].text.contains("Unknown attribute 'bogus'")));
    }

    #[test]
    fn byte_order_default_on_field_is_rejected() {
        let mut field = FieldBuilder::new("x").start_constant(0).size_constant(32).type_name("UInt").build();
        field.attributes.push(Attribute {
            back_end: None,
            name: Word::new("byte_order"),
            value: AttributeValue::Default,
            source_location: SourceLocation::new(Position::new(1, 1), Position::new(1, 2)),
        });
        let structure = StructureBuilder::new("Foo").field(field).build_type();
        let module = ModuleBuilder::new("a.emb").type_definition(structure).build();
        let mut ir = Ir { modules: vec![module] };
        let bundles = check_attributes(&mut ir, &config());
        assert!(bundles.iter().any(|b| b.messages[0].text.contains("not valid on a field")));
    }

    #[test]
    fn byte_order_on_bits_block_is_rejected() {
        let structure = StructureBuilder::bits("Foo").attribute("byte_order", AttributeValue::String("BigEndian".to_string())).build_type();
        let module = ModuleBuilder::new("a.emb").type_definition(structure).build();
        let mut ir = Ir { modules: vec![module] };
        let bundles = check_attributes(&mut ir, &config());
        assert!(bundles.iter().any(|b| b.messages[0].text.contains("bits")));
    }

    #[test]
    fn enum_case_rejects_unknown_entry_and_duplicate() {
        use crate::ir::builders::EnumerationBuilder;
        let mut enumeration = EnumerationBuilder::new("Foo").value("A", 0).build_type();
        let TypeDefinition::Enumeration(e) = &mut enumeration else { unreachable!() };
        e.attributes.push(Attribute {
            back_end: Some("cpp".to_string()),
            name: Word::new("enum_case"),
            value: AttributeValue::String("SHOUTY_CASE,Bogus,SHOUTY_CASE".to_string()),
            source_location: SourceLocation::new(Position::new(1, 1), Position::new(1, 2)),
        });
        let module = ModuleBuilder::new("a.emb").type_definition(enumeration).build();
        let mut ir = Ir { modules: vec![module] };
        let bundles = check_attributes(&mut ir, &config());
        assert!(bundles.iter().any(|b| b.messages[0].text.contains("must be one of SHOUTY_CASE")));
        assert!(bundles.iter().any(|b| b.messages[0].text.contains("duplicate enum_case entry")));
    }

    #[test]
    fn fixed_size_synthesized_when_absent() {
        let structure = StructureBuilder::new("Foo")
            .physical_field(FieldBuilder::new("x").start_constant(0).size_constant(4).type_name("UInt"))
            .build_type();
        let module = ModuleBuilder::new("a.emb").type_definition(structure).build();
        let mut ir = Ir { modules: vec![module] };

        crate::passes::desugar::desugar(&mut ir);
        crate::passes::bounds::compute_bounds_for_ir(&mut ir);
        let bundles = verify_fixed_size(&mut ir);
        assert!(bundles.is_empty());

        let TypeDefinition::Structure(structure) = &ir.modules[0].types[0] else { panic!("expected structure") };
        let attribute = structure.attributes.iter().find(|a| a.name.text == "fixed_size_in_bits").expect("synthesized attribute");
        assert!(matches!(&attribute.value, AttributeValue::Integer(text) if text == "32"));
    }

    #[test]
    fn fixed_size_mismatch_is_reported() {
        let structure = StructureBuilder::new("Foo")
            .physical_field(FieldBuilder::new("x").start_constant(0).size_constant(4).type_name("UInt"))
            .attribute("fixed_size_in_bits", AttributeValue::Integer("16".to_string()))
            .build_type();
        let module = ModuleBuilder::new("a.emb").type_definition(structure).build();
        let mut ir = Ir { modules: vec![module] };

        crate::passes::desugar::desugar(&mut ir);
        crate::passes::bounds::compute_bounds_for_ir(&mut ir);
        let bundles = verify_fixed_size(&mut ir);
        assert!(bundles.iter().any(|b| b.messages[0].text.contains("computed size is 32 bits")));
    }
}
