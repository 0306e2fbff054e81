//! Expression type annotation and checking.
//!
//! Annotation fills every expression's type slot bottom-up; checking verifies
//! that expressions are used only where their assigned type is legal (field
//! locations and array counts must be integer, existence conditions boolean,
//! comparisons and equality only between same-kind operands).

use crate::diagnostics::{Bundle, Message, SourceLocation};
use crate::ir::{
    Expression, ExpressionType, ExpressionValue, FieldKind, FieldType, FunctionKind, Ir, TypeDefinition,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Integer,
    Boolean,
    Enumeration,
    Opaque,
    Unknown,
}

fn kind_of(expression_type: &ExpressionType) -> Kind {
    match expression_type {
        ExpressionType::Integer(_) => Kind::Integer,
        ExpressionType::Boolean { .. } => Kind::Boolean,
        ExpressionType::Enumeration { .. } => Kind::Enumeration,
        ExpressionType::Opaque => Kind::Opaque,
        ExpressionType::Unknown => Kind::Unknown,
    }
}

pub fn annotate_expression_types(ir: &mut Ir) -> Vec<Bundle> {
    let mut bundles = Vec::new();
    for module in &mut ir.modules {
        for type_definition in &mut module.types {
            annotate_in_type(type_definition, &mut bundles);
        }
    }
    bundles
}

fn annotate_in_type(type_definition: &mut TypeDefinition, bundles: &mut Vec<Bundle>) {
    match type_definition {
        TypeDefinition::Structure(structure) => {
            for field in &mut structure.fields {
                annotate_expression(&mut field.existence_condition, bundles);
                match &mut field.kind {
                    FieldKind::Physical { location, field_type } => {
                        annotate_expression(&mut location.start, bundles);
                        annotate_expression(&mut location.size, bundles);
                        annotate_field_type(field_type, bundles);
                    }
                    FieldKind::Virtual { read_transform } => {
                        annotate_expression(read_transform, bundles);
                    }
                }
            }
        }
        TypeDefinition::Enumeration(enumeration) => {
            for value in &mut enumeration.values {
                annotate_expression(&mut value.value, bundles);
            }
        }
        TypeDefinition::External(_) => {}
    }
    if !matches!(type_definition, TypeDefinition::External(_)) {
        for subtype in type_definition.subtypes_mut() {
            annotate_in_type(subtype, bundles);
        }
    }
}

fn annotate_field_type(field_type: &mut FieldType, bundles: &mut Vec<Bundle>) {
    match field_type {
        FieldType::Atomic { runtime_parameters, .. } => {
            for parameter in runtime_parameters {
                annotate_expression(parameter, bundles);
            }
        }
        FieldType::Array { element_type, element_count } => {
            annotate_field_type(element_type, bundles);
            if let Some(count) = element_count {
                annotate_expression(count, bundles);
            }
        }
    }
}

fn annotate_expression(expression: &mut Expression, bundles: &mut Vec<Bundle>) {
    if let ExpressionValue::Function { args, .. } = &mut expression.value {
        for arg in args {
            annotate_expression(arg, bundles);
        }
    }

    expression.expression_type = match &expression.value {
        ExpressionValue::Constant { value } => ExpressionType::Integer(crate::ir::IntegerBounds::exact(value.clone())),
        ExpressionValue::BooleanConstant { value } => ExpressionType::Boolean { value: Some(*value) },
        ExpressionValue::FieldReference { .. } | ExpressionValue::ConstantReference { .. } => ExpressionType::Unknown,
        ExpressionValue::BuiltinReference { reference } => {
            let name = reference.source_name.last().map(|w| w.text.as_str()).unwrap_or("");
            match name {
                "present" => ExpressionType::Boolean { value: None },
                _ => ExpressionType::Unknown,
            }
        }
        ExpressionValue::Function { function, args } => annotate_function(*function, args, expression.source_location, bundles),
    };
}

fn annotate_function(
    function: FunctionKind,
    args: &[Expression],
    location: SourceLocation,
    bundles: &mut Vec<Bundle>,
) -> ExpressionType {
    let kinds: Vec<Kind> = args.iter().map(|a| kind_of(&a.expression_type)).collect();

    match function {
        FunctionKind::Addition | FunctionKind::Subtraction | FunctionKind::Multiplication | FunctionKind::Maximum => {
            if kinds.iter().any(|k| *k != Kind::Integer && *k != Kind::Unknown) {
                bundles.push(Bundle::single(Message::error("", location, "arithmetic operands must be integer")));
            }
            ExpressionType::Unknown
        }
        FunctionKind::UpperBound | FunctionKind::LowerBound => {
            if let Some(k) = kinds.first() {
                if *k != Kind::Integer && *k != Kind::Unknown {
                    bundles.push(Bundle::single(Message::error("", location, "$upper_bound/$lower_bound require an integer argument")));
                }
            }
            ExpressionType::Unknown
        }
        FunctionKind::Presence => ExpressionType::Boolean { value: None },
        FunctionKind::Equality | FunctionKind::Inequality => {
            ExpressionType::Boolean { value: None }
        }
        FunctionKind::Less | FunctionKind::LessOrEqual | FunctionKind::Greater | FunctionKind::GreaterOrEqual => {
            if kinds.iter().any(|k| *k != Kind::Integer && *k != Kind::Enumeration && *k != Kind::Unknown) {
                bundles.push(Bundle::single(Message::error("", location, "comparison operands must be integer or enumeration")));
            }
            ExpressionType::Boolean { value: None }
        }
        FunctionKind::And | FunctionKind::Or => {
            if kinds.iter().any(|k| *k != Kind::Boolean && *k != Kind::Unknown) {
                bundles.push(Bundle::single(Message::error("", location, "logical operands must be boolean")));
            }
            ExpressionType::Boolean { value: None }
        }
        FunctionKind::Choice => {
            if let Some(condition_kind) = kinds.first() {
                if *condition_kind != Kind::Boolean && *condition_kind != Kind::Unknown {
                    bundles.push(Bundle::single(Message::error("", location, "ternary condition must be boolean")));
                }
            }
            args.get(1).map(|a| a.expression_type.clone()).unwrap_or(ExpressionType::Unknown)
        }
    }
}

pub fn check_expression_types(ir: &mut Ir) -> Vec<Bundle> {
    let mut bundles = Vec::new();
    for module in &mut ir.modules {
        for type_definition in &mut module.types {
            check_in_type(type_definition, &mut bundles);
        }
    }
    bundles
}

fn check_in_type(type_definition: &mut TypeDefinition, bundles: &mut Vec<Bundle>) {
    if let TypeDefinition::Structure(structure) = type_definition {
        for field in &structure.fields {
            check_boolean(&field.existence_condition, bundles);
            if let FieldKind::Physical { location, field_type } = &field.kind {
                check_integer(&location.start, bundles);
                check_integer(&location.size, bundles);
                if let FieldType::Array { element_count: Some(count), .. } = field_type {
                    check_integer(count, bundles);
                }
            }
        }
        for parameter in &structure.runtime_parameters {
            let _ = parameter;
        }
    }
    if !matches!(type_definition, TypeDefinition::External(_)) {
        for subtype in type_definition.subtypes_mut() {
            check_in_type(subtype, bundles);
        }
    }
}

fn check_boolean(expression: &Expression, bundles: &mut Vec<Bundle>) {
    let kind = kind_of(&expression.expression_type);
    if kind != Kind::Boolean && kind != Kind::Unknown {
        bundles.push(Bundle::single(Message::error(
            "",
            expression.source_location,
            "expected a boolean expression here",
        )));
    }
}

fn check_integer(expression: &Expression, bundles: &mut Vec<Bundle>) {
    let kind = kind_of(&expression.expression_type);
    if kind != Kind::Integer && kind != Kind::Unknown {
        bundles.push(Bundle::single(Message::error(
            "",
            expression.source_location,
            "expected an integer expression here",
        )));
    }
}
