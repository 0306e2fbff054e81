//! Dependency graph construction, cycle detection (Tarjan's algorithm), and
//! per-structure topological field ordering.
//!
//! Grounded directly on the reference compiler's `dependency_checker.py`: the
//! graph is keyed by canonical name strings (never by pointer into the IR), cycle
//! detection runs Tarjan's strongly-connected-components algorithm with an
//! explicit work stack (deeply nested field expressions can otherwise blow the
//! native call stack), and a nontrivial component — size > 1, or a single node
//! with a self-edge — is reported with its lexicographically-smallest member as
//! the primary error and the rest as notes in lexicographic order.

use crate::diagnostics::{Bundle, Message, SourceLocation};
use crate::ir::{Expression, ExpressionValue, FieldKind, FieldType, Ir, Module, TypeDefinition};
use std::collections::{HashMap, HashSet};

/// Reference-keyword builtins that may never appear inside a dependency path.
const FORBIDDEN_IN_DEPENDENCIES: &[&str] = &["is_statically_sized", "static_size_in_bits", "next"];

#[derive(Debug, Default)]
pub struct DependencyGraph {
    pub edges: HashMap<String, Vec<String>>,
    pub locations: HashMap<String, SourceLocation>,
}

impl DependencyGraph {
    fn add_node(&mut self, name: &str, location: SourceLocation) {
        self.edges.entry(name.to_string()).or_default();
        self.locations.entry(name.to_string()).or_insert(location);
    }

    fn add_edge(&mut self, from: &str, to: &str) {
        self.edges.entry(from.to_string()).or_default().push(to.to_string());
    }
}

/// Builds the field-level dependency graph for one structure: an edge `a -> b`
/// means the value of field `a` depends on field `b`.
pub fn build_field_dependency_graph(structure: &crate::ir::Structure) -> (DependencyGraph, Vec<Bundle>) {
    let mut graph = DependencyGraph::default();
    let mut bundles = Vec::new();

    for field in &structure.fields {
        let name = field.name.name.text.clone();
        graph.add_node(&name, field.name.name.source_location);

        collect_dependencies(&field.existence_condition, &name, &mut graph, &mut bundles);
        match &field.kind {
            FieldKind::Physical { location, field_type } => {
                collect_dependencies(&location.start, &name, &mut graph, &mut bundles);
                collect_dependencies(&location.size, &name, &mut graph, &mut bundles);
                if let FieldType::Atomic { runtime_parameters, .. } = field_type {
                    for parameter in runtime_parameters {
                        collect_dependencies(parameter, &name, &mut graph, &mut bundles);
                    }
                }
            }
            FieldKind::Virtual { read_transform } => {
                collect_dependencies(read_transform, &name, &mut graph, &mut bundles);
            }
        }
    }

    (graph, bundles)
}

fn collect_dependencies(expression: &Expression, owner: &str, graph: &mut DependencyGraph, bundles: &mut Vec<Bundle>) {
    match &expression.value {
        ExpressionValue::FieldReference { path } => {
            if let Some(first) = path.first() {
                if let Some(word) = first.source_name.first() {
                    if FORBIDDEN_IN_DEPENDENCIES.contains(&word.text.as_str()) {
                        bundles.push(Bundle::single(Message::error(
                            "",
                            word.source_location,
                            format!("Keyword `{}` may not be used in this context.", word.text),
                        )));
                        return;
                    }
                    graph.add_edge(owner, &word.text);
                }
            }
        }
        ExpressionValue::ConstantReference { reference } | ExpressionValue::BuiltinReference { reference } => {
            if let Some(word) = reference.source_name.first() {
                if !FORBIDDEN_IN_DEPENDENCIES.contains(&word.text.as_str()) {
                    graph.add_edge(owner, &word.text);
                }
            }
        }
        ExpressionValue::Function { args, .. } => {
            for arg in args {
                collect_dependencies(arg, owner, graph, bundles);
            }
        }
        _ => {}
    }
}

/// Runs Tarjan's algorithm over `graph`, returning the strongly-connected
/// components whose size is greater than one, or whose single node has a
/// self-edge. Each component is sorted lexicographically.
pub fn find_nontrivial_cycles(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let nodes: Vec<String> = {
        let mut n: Vec<String> = graph.edges.keys().cloned().collect();
        n.sort();
        n
    };

    let mut index_counter = 0usize;
    let mut indices: HashMap<String, usize> = HashMap::new();
    let mut lowlinks: HashMap<String, usize> = HashMap::new();
    let mut on_stack: HashSet<String> = HashSet::new();
    let mut stack: Vec<String> = Vec::new();
    let mut components: Vec<Vec<String>> = Vec::new();

    // Iterative Tarjan using an explicit work stack of (node, child_index) frames,
    // matching the reference compiler's strategy of avoiding unbounded recursion
    // depth on deeply-dependent field chains.
    for start in &nodes {
        if indices.contains_key(start) {
            continue;
        }
        let mut work: Vec<(String, usize)> = vec![(start.clone(), 0)];

        while let Some((node, child_index)) = work.pop() {
            if child_index == 0 {
                indices.insert(node.clone(), index_counter);
                lowlinks.insert(node.clone(), index_counter);
                index_counter += 1;
                stack.push(node.clone());
                on_stack.insert(node.clone());
            }

            let children = graph.edges.get(&node).cloned().unwrap_or_default();
            let mut advanced = false;
            for (i, child) in children.iter().enumerate().skip(child_index) {
                if !indices.contains_key(child) {
                    work.push((node.clone(), i + 1));
                    work.push((child.clone(), 0));
                    advanced = true;
                    break;
                } else if on_stack.contains(child) {
                    let child_index_value = indices[child];
                    let current_low = lowlinks[&node];
                    lowlinks.insert(node.clone(), current_low.min(child_index_value));
                }
            }
            if advanced {
                continue;
            }

            // All children processed; propagate lowlink to the caller frame and
            // pop an SCC if this node is a root.
            if let Some((parent, _)) = work.last().cloned() {
                let child_low = lowlinks[&node];
                let parent_low = lowlinks[&parent];
                lowlinks.insert(parent, parent_low.min(child_low));
            }

            if lowlinks[&node] == indices[&node] {
                let mut component = Vec::new();
                loop {
                    let member = stack.pop().unwrap();
                    on_stack.remove(&member);
                    let is_root = member == node;
                    component.push(member);
                    if is_root {
                        break;
                    }
                }
                component.sort();
                let has_self_edge = graph.edges.get(&node).map(|edges| edges.contains(&node)).unwrap_or(false);
                if component.len() > 1 || has_self_edge {
                    components.push(component);
                }
            }
        }
    }

    components.sort();
    components
}

fn cycle_bundle(kind: &str, component: &[String], graph: &DependencyGraph) -> Bundle {
    let mut sorted = component.to_vec();
    sorted.sort();
    let primary = &sorted[0];
    let primary_location = graph.locations.get(primary).copied().unwrap_or_else(SourceLocation::synthetic);
    let mut messages = vec![Message::error("", primary_location, format!("Dependency cycle\n{kind}{primary}"))];
    for member in &sorted[1..] {
        let location = graph.locations.get(member).copied().unwrap_or_else(SourceLocation::synthetic);
        messages.push(Message::note("", location, member.clone()));
    }
    Bundle::new(messages)
}

/// Finds cycles in every structure's field dependency graph across the whole IR,
/// plus module-level import cycles.
pub fn find_dependency_cycles(ir: &Ir) -> Vec<Bundle> {
    let mut bundles = Vec::new();

    for module in &ir.modules {
        for type_definition in &module.types {
            find_cycles_in_type(type_definition, &mut bundles);
        }
    }

    bundles.extend(find_module_import_cycles(&ir.modules));
    bundles
}

fn find_cycles_in_type(type_definition: &TypeDefinition, bundles: &mut Vec<Bundle>) {
    if let TypeDefinition::Structure(structure) = type_definition {
        let (graph, mut field_bundles) = build_field_dependency_graph(structure);
        bundles.append(&mut field_bundles);
        for component in find_nontrivial_cycles(&graph) {
            bundles.push(cycle_bundle("", &component, &graph));
        }
    }
    if !matches!(type_definition, TypeDefinition::External(_)) {
        for subtype in type_definition.subtypes() {
            find_cycles_in_type(subtype, bundles);
        }
    }
}

fn find_module_import_cycles(modules: &[Module]) -> Vec<Bundle> {
    let mut graph = DependencyGraph::default();
    let module_location = SourceLocation::new(crate::diagnostics::Position::new(0, 0), crate::diagnostics::Position::new(0, 0));
    for module in modules {
        graph.add_node(&module.source_file_name, module_location);
        for import in &module.foreign_imports {
            if import.local_name.is_some() {
                graph.add_edge(&module.source_file_name, &import.file_name);
            }
        }
    }
    find_nontrivial_cycles(&graph)
        .into_iter()
        .map(|component| cycle_bundle_with_header("Import dependency cycle\n", &component, &graph))
        .collect()
}

fn cycle_bundle_with_header(header: &str, component: &[String], graph: &DependencyGraph) -> Bundle {
    let mut sorted = component.to_vec();
    sorted.sort();
    let primary = &sorted[0];
    let primary_location = graph.locations.get(primary).copied().unwrap_or_else(SourceLocation::synthetic);
    let mut messages = vec![Message::error(primary.clone(), primary_location, format!("{header}{primary}"))];
    for member in &sorted[1..] {
        let location = graph.locations.get(member).copied().unwrap_or_else(SourceLocation::synthetic);
        messages.push(Message::note(member.clone(), location, member.clone()));
    }
    Bundle::new(messages)
}

/// Topologically orders each structure's fields, writing the result into
/// `fields_in_dependency_order`. Only meaningful when [`find_dependency_cycles`]
/// found nothing; callers must check that first.
pub fn set_dependency_order(ir: &mut Ir) -> Vec<Bundle> {
    let mut bundles = Vec::new();
    for module in &mut ir.modules {
        for type_definition in &mut module.types {
            set_order_in_type(type_definition, &mut bundles);
        }
    }
    bundles
}

fn set_order_in_type(type_definition: &mut TypeDefinition, bundles: &mut Vec<Bundle>) {
    if let TypeDefinition::Structure(structure) = type_definition {
        let (graph, _) = build_field_dependency_graph(structure);
        match order_fields(structure, &graph) {
            Ok(order) => structure.fields_in_dependency_order = order,
            Err(_) => bundles.push(Bundle::single(Message::error(
                "",
                SourceLocation::synthetic(),
                format!(
                    "[compiler bug] dependency ordering could not place all fields of '{}'",
                    structure.name.name.text
                ),
            ))),
        }
    }
    if !matches!(type_definition, TypeDefinition::External(_)) {
        for subtype in type_definition.subtypes_mut() {
            set_order_in_type(subtype, bundles);
        }
    }
}

/// Greedy topological sort: repeatedly scan, in input order, for the first
/// not-yet-placed field whose dependencies (among this structure's own fields)
/// are all already placed. Preserves input order among mutually-independent
/// fields, which keeps desugar-synthesized `size_in_*` fields at the tail.
fn order_fields(structure: &crate::ir::Structure, graph: &DependencyGraph) -> Result<Vec<usize>, ()> {
    let field_names: Vec<String> = structure.fields.iter().map(|f| f.name.name.text.clone()).collect();
    let mut placed: HashSet<usize> = HashSet::new();
    let mut order = Vec::with_capacity(structure.fields.len());

    while order.len() < structure.fields.len() {
        let mut progressed = false;
        for (index, name) in field_names.iter().enumerate() {
            if placed.contains(&index) {
                continue;
            }
            let dependencies = graph.edges.get(name).cloned().unwrap_or_default();
            let ready = dependencies.iter().all(|dependency| {
                field_names
                    .iter()
                    .position(|n| n == dependency)
                    .map(|dependency_index| placed.contains(&dependency_index))
                    .unwrap_or(true) // dependency outside this structure: not a local ordering constraint
            });
            if ready {
                placed.insert(index);
                order.push(index);
                progressed = true;
            }
        }
        if !progressed {
            return Err(());
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builders::{field_reference, FieldBuilder, StructureBuilder};

    #[test]
    fn detects_simple_two_field_cycle() {
        let structure = StructureBuilder::new("Foo")
            .field(FieldBuilder::new("field1").start(field_reference(vec!["field2"])).size_constant(1).build())
            .field(FieldBuilder::new("field2").start(field_reference(vec!["field1"])).size_constant(1).build())
            .build();
        let (graph, bundles) = build_field_dependency_graph(&structure);
        assert!(bundles.is_empty());
        let cycles = find_nontrivial_cycles(&graph);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0], vec!["field1".to_string(), "field2".to_string()]);
    }

    #[test]
    fn topological_order_preserves_independent_field_order() {
        let structure = StructureBuilder::new("Foo")
            .field(FieldBuilder::new("a").start(field_reference(vec!["d"])).size_constant(4).build())
            .field(FieldBuilder::new("b").start_constant(4).size_constant(4).build())
            .field(FieldBuilder::new("c").start_constant(8).size_constant(4).build())
            .field(FieldBuilder::new("d").start_constant(12).size_constant(4).build())
            .build();
        let (graph, _) = build_field_dependency_graph(&structure);
        let order = order_fields(&structure, &graph).unwrap();
        assert_eq!(order, vec![1, 2, 3, 0]);
    }
}
