use embossc_front::ir::builders::{field_reference, FieldBuilder, StructureBuilder};
use embossc_front::ir::Module;
use embossc_front::passes::dependency_checker::find_dependency_cycles;
use embossc_front::{Ir, PipelineConfig};

#[test]
fn cross_module_import_cycle_is_reported() {
    let mut m = Module::new("m.emb");
    m.foreign_imports.push(embossc_front::ir::ForeignImport {
        file_name: "n.emb".to_string(),
        local_name: Some("n".to_string()),
    });
    let mut n = Module::new("n.emb");
    n.foreign_imports.push(embossc_front::ir::ForeignImport {
        file_name: "m.emb".to_string(),
        local_name: Some("m".to_string()),
    });

    let ir = Ir { modules: vec![m, n] };
    let bundles = find_dependency_cycles(&ir);
    assert_eq!(bundles.len(), 1);
    assert!(bundles[0].messages[0].text.contains("Import dependency cycle"));
    assert!(bundles[0].messages[0].text.contains("m.emb"));
}

#[test]
fn pipeline_succeeds_on_a_well_formed_module() {
    let mut module = Module::new("demo.emb");
    let structure = StructureBuilder::new("Foo")
        .physical_field(FieldBuilder::new("header").start_constant(0).size_constant(4).type_name("UInt"))
        .physical_field(FieldBuilder::new("payload").start_constant(4).size_constant(8).type_name("UInt"))
        .build_type();
    module.types.push(structure);

    let mut ir = Ir::new();
    ir.modules.push(embossc_front::external::get_prelude());
    ir.modules.push(module);

    let config = PipelineConfig::default();
    let result = embossc_front::process_ir(ir, &config);
    assert!(result.is_ok(), "{:?}", result.err());
}

#[test]
fn pipeline_reports_field_dependency_cycle() {
    let structure = StructureBuilder::new("Foo")
        .physical_field(FieldBuilder::new("field1").start(field_reference(vec!["field2"])).size_constant(1).type_name("UInt"))
        .physical_field(FieldBuilder::new("field2").start(field_reference(vec!["field1"])).size_constant(1).type_name("UInt"))
        .build_type();
    let mut module = Module::new("demo.emb");
    module.types.push(structure);

    let mut ir = Ir::new();
    ir.modules.push(embossc_front::external::get_prelude());
    ir.modules.push(module);

    let config = PipelineConfig::default();
    let result = embossc_front::process_ir(ir, &config);
    let bundles = result.expect_err("expected a dependency cycle error");
    assert!(bundles.iter().any(|b| b.messages[0].text.contains("Dependency cycle")));
}
