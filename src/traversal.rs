//! Generic top-down traversal over the IR.
//!
//! The IR is a closed set of node kinds (modules, type definitions, fields,
//! expressions), so rather than a single dynamically-typed visitor dispatch, this
//! module exposes one traversal entry point per *target kind* that passes actually
//! walk (expressions, fields, structures). Each shares the same semantics: pre-order
//! visiting in source order, a skip set that prunes descent into named subtrees, and
//! scoped "incidental" context that is pushed on entry to a node and popped on exit.
//!
//! This is the concrete shape the generic traversal engine takes in this crate:
//! children are enumerated by hand per node kind rather than through a shared
//! `children()` trait object, which keeps every walk a plain, checkable match
//! rather than a layer of dynamic dispatch over a handful of kinds that never
//! change.

use crate::ir::{Expression, ExpressionValue, Field, FieldKind, Module, Structure, TypeDefinition};

/// Which subtrees a traversal must not descend into.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipSet {
    pub skip_atomic_type_parameters: bool,
    pub skip_field_reference_paths: bool,
}

/// Scope context threaded through an expression traversal: the canonical path of
/// the enclosing type, used by passes that need to know where an expression lives
/// without re-deriving it from the tree shape at every visit.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub enclosing_type_path: Vec<String>,
}

/// Visits every [`Expression`] reachable from `module`, pre-order, invoking
/// `action` with the expression and the scope of its innermost enclosing type.
pub fn walk_expressions_in_module<F>(module: &mut Module, skip: SkipSet, mut action: F)
where
    F: FnMut(&mut Expression, &Scope),
{
    let mut scope = Scope::default();
    for type_definition in &mut module.types {
        walk_expressions_in_type(type_definition, skip, &mut scope, &mut action);
    }
}

fn walk_expressions_in_type<F>(type_definition: &mut TypeDefinition, skip: SkipSet, scope: &mut Scope, action: &mut F)
where
    F: FnMut(&mut Expression, &Scope),
{
    scope.enclosing_type_path.push(type_definition.name_definition().name.text.clone());

    match type_definition {
        TypeDefinition::Structure(structure) => {
            for field in &mut structure.fields {
                walk_expressions_in_field(field, skip, scope, action);
            }
        }
        TypeDefinition::Enumeration(enumeration) => {
            for enum_value in &mut enumeration.values {
                walk_expression_tree(&mut enum_value.value, action, scope);
            }
        }
        TypeDefinition::External(_) => {}
    }

    let subtypes: &mut Vec<TypeDefinition> = match type_definition {
        TypeDefinition::Structure(s) => &mut s.subtypes,
        TypeDefinition::Enumeration(e) => &mut e.subtypes,
        TypeDefinition::External(_) => {
            scope.enclosing_type_path.pop();
            return;
        }
    };
    for subtype in subtypes {
        walk_expressions_in_type(subtype, skip, scope, action);
    }
    scope.enclosing_type_path.pop();
}

fn walk_expressions_in_field<F>(field: &mut Field, skip: SkipSet, scope: &Scope, action: &mut F)
where
    F: FnMut(&mut Expression, &Scope),
{
    walk_expression_tree(&mut field.existence_condition, action, scope);
    match &mut field.kind {
        FieldKind::Physical { location, field_type } => {
            walk_expression_tree(&mut location.start, action, scope);
            walk_expression_tree(&mut location.size, action, scope);
            if !skip.skip_atomic_type_parameters {
                if let crate::ir::FieldType::Atomic { runtime_parameters, .. } = field_type {
                    for parameter in runtime_parameters {
                        walk_expression_tree(parameter, action, scope);
                    }
                }
            }
        }
        FieldKind::Virtual { read_transform } => {
            walk_expression_tree(read_transform, action, scope);
        }
    }
}

fn walk_expression_tree<F>(expression: &mut Expression, action: &mut F, scope: &Scope)
where
    F: FnMut(&mut Expression, &Scope),
{
    if let ExpressionValue::Function { args, .. } = &mut expression.value {
        for arg in args {
            walk_expression_tree(arg, action, scope);
        }
    }
    action(expression, scope);
}

/// Visits every [`Structure`] reachable from `module`, pre-order, including nested
/// (subtype) structures.
pub fn walk_structures_in_module<F>(module: &mut Module, mut action: F)
where
    F: FnMut(&mut Structure),
{
    for type_definition in &mut module.types {
        walk_structures_in_type(type_definition, &mut action);
    }
}

fn walk_structures_in_type<F>(type_definition: &mut TypeDefinition, action: &mut F)
where
    F: FnMut(&mut Structure),
{
    if let TypeDefinition::Structure(structure) = type_definition {
        action(structure);
    }
    if !matches!(type_definition, TypeDefinition::External(_)) {
        for subtype in type_definition.subtypes_mut() {
            walk_structures_in_type(subtype, action);
        }
    }
}
