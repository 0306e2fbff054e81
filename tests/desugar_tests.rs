use embossc_front::ir::builders::{FieldBuilder, StructureBuilder};
use embossc_front::ir::{AddressableUnit, FieldKind, Module, TypeDefinition};
use embossc_front::passes::desugar::desugar;
use embossc_front::Ir;

fn single_module_ir(structure_type: TypeDefinition) -> Ir {
    let mut module = Module::new("a.emb");
    module.types.push(structure_type);
    Ir { modules: vec![module] }
}

#[test]
fn anonymous_bits_block_becomes_skip_marked_field_plus_alias() {
    let anonymous = FieldBuilder::anonymous(vec!["bar"])
        .start_constant(0)
        .size_constant(1)
        .type_name("Bits4")
        .build();
    let structure = StructureBuilder::new("Foo")
        .field(anonymous)
        .build_type();

    let mut ir = single_module_ir(structure);
    let bundles = desugar(&mut ir);
    assert!(bundles.is_empty(), "{bundles:?}");

    let TypeDefinition::Structure(structure) = &ir.modules[0].types[0] else {
        panic!("expected structure");
    };

    let anon_field = structure
        .fields
        .iter()
        .find(|f| f.name.is_anonymous)
        .expect("anonymous field retained");
    assert!(anon_field.attributes.iter().any(|a| a.name.text == "text_output"));

    let alias = structure
        .fields
        .iter()
        .find(|f| f.name.name.text == "bar")
        .expect("alias field synthesized");
    assert!(matches!(alias.kind, FieldKind::Virtual { .. }));
}

#[test]
fn byte_struct_gets_size_in_bytes_and_bound_virtuals() {
    let structure = StructureBuilder::new("Foo")
        .physical_field(FieldBuilder::new("a").start_constant(0).size_constant(4).type_name("UInt"))
        .build_type();
    let mut ir = single_module_ir(structure);
    desugar(&mut ir);

    let TypeDefinition::Structure(structure) = &ir.modules[0].types[0] else {
        panic!("expected structure");
    };
    assert!(structure.fields.iter().any(|f| f.name.name.text == "size_in_bytes"));
    assert!(structure.fields.iter().any(|f| f.name.name.text == "max_size_in_bytes"));
    assert!(structure.fields.iter().any(|f| f.name.name.text == "min_size_in_bytes"));
}

#[test]
fn bit_struct_gets_size_in_bits() {
    let structure = StructureBuilder::bits("Bar")
        .physical_field(FieldBuilder::new("a").start_constant(0).size_constant(4).type_name("UInt"))
        .build_type();
    let mut ir = single_module_ir(structure);
    desugar(&mut ir);

    let TypeDefinition::Structure(structure) = &ir.modules[0].types[0] else {
        panic!("expected structure");
    };
    assert_eq!(structure.addressable_unit, AddressableUnit::Bit);
    assert!(structure.fields.iter().any(|f| f.name.name.text == "size_in_bits"));
}

#[test]
fn next_in_first_field_start_is_rejected() {
    let structure = StructureBuilder::new("Foo")
        .physical_field(
            FieldBuilder::new("a")
                .start(embossc_front::ir::builders::builtin("next"))
                .size_constant(4)
                .type_name("UInt"),
        )
        .build_type();
    let mut ir = single_module_ir(structure);
    let bundles = desugar(&mut ir);
    assert_eq!(bundles.len(), 1);
    assert!(bundles[0].messages[0].text.contains("first physical field"));
}

#[test]
fn next_replaces_with_previous_field_end() {
    let structure = StructureBuilder::new("Foo")
        .physical_field(FieldBuilder::new("a").start_constant(0).size_constant(4).type_name("UInt"))
        .physical_field(
            FieldBuilder::new("b")
                .start(embossc_front::ir::builders::builtin("next"))
                .size_constant(4)
                .type_name("UInt"),
        )
        .build_type();
    let mut ir = single_module_ir(structure);
    let bundles = desugar(&mut ir);
    assert!(bundles.is_empty(), "{bundles:?}");

    let TypeDefinition::Structure(structure) = &ir.modules[0].types[0] else {
        panic!("expected structure");
    };
    let FieldKind::Physical { location, .. } = &structure.fields[1].kind else {
        panic!("expected physical field");
    };
    assert!(matches!(
        location.start.value,
        embossc_front::ir::ExpressionValue::Function { function: embossc_front::ir::FunctionKind::Addition, .. }
    ));
}
