//! Compile-time integer bounds inference.
//!
//! Every integer-typed expression gets a `(minimum, maximum, modulus,
//! modular_value)` quadruple. Field widths in the language are not bounded by any
//! native machine integer width, so all arithmetic here uses arbitrary-precision
//! integers (`num-bigint`); a product of two 64-bit-wide field ranges alone can
//! overflow a 128-bit accumulator.

use crate::ir::{Expression, ExpressionType, ExpressionValue, FunctionKind, IntegerBounds};
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Zero};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    Finite(BigInt),
    PositiveInfinity,
    NegativeInfinity,
}

impl Bound {
    fn parse(text: &str) -> Self {
        match text {
            "infinity" => Bound::PositiveInfinity,
            "-infinity" => Bound::NegativeInfinity,
            other => Bound::Finite(BigInt::from_str(other).unwrap_or_else(|_| BigInt::zero())),
        }
    }

    fn render(&self) -> String {
        match self {
            Bound::Finite(v) => v.to_string(),
            Bound::PositiveInfinity => "infinity".to_string(),
            Bound::NegativeInfinity => "-infinity".to_string(),
        }
    }

    fn min(a: &Bound, b: &Bound) -> Bound {
        match (a, b) {
            (Bound::NegativeInfinity, _) | (_, Bound::NegativeInfinity) => Bound::NegativeInfinity,
            (Bound::PositiveInfinity, other) | (other, Bound::PositiveInfinity) => other.clone(),
            (Bound::Finite(x), Bound::Finite(y)) => Bound::Finite(x.min(y).clone()),
        }
    }

    fn max(a: &Bound, b: &Bound) -> Bound {
        match (a, b) {
            (Bound::PositiveInfinity, _) | (_, Bound::PositiveInfinity) => Bound::PositiveInfinity,
            (Bound::NegativeInfinity, other) | (other, Bound::NegativeInfinity) => other.clone(),
            (Bound::Finite(x), Bound::Finite(y)) => Bound::Finite(x.max(y).clone()),
        }
    }

    fn add(a: &Bound, b: &Bound) -> Bound {
        match (a, b) {
            (Bound::Finite(x), Bound::Finite(y)) => Bound::Finite(x + y),
            (Bound::PositiveInfinity, Bound::NegativeInfinity) | (Bound::NegativeInfinity, Bound::PositiveInfinity) => {
                Bound::PositiveInfinity // unreachable in well-formed ranges; defensive fallback
            }
            (Bound::PositiveInfinity, _) | (_, Bound::PositiveInfinity) => Bound::PositiveInfinity,
            (Bound::NegativeInfinity, _) | (_, Bound::NegativeInfinity) => Bound::NegativeInfinity,
        }
    }

    fn neg(a: &Bound) -> Bound {
        match a {
            Bound::Finite(x) => Bound::Finite(-x),
            Bound::PositiveInfinity => Bound::NegativeInfinity,
            Bound::NegativeInfinity => Bound::PositiveInfinity,
        }
    }

    fn mul(a: &Bound, b: &Bound) -> Bound {
        match (a, b) {
            (Bound::Finite(x), Bound::Finite(y)) => Bound::Finite(x * y),
            (Bound::Finite(x), inf) | (inf, Bound::Finite(x)) => {
                if x.is_zero() {
                    Bound::Finite(BigInt::zero())
                } else if x.sign() == num_bigint::Sign::Minus {
                    Bound::neg(inf)
                } else {
                    inf.clone()
                }
            }
            (Bound::PositiveInfinity, Bound::PositiveInfinity) | (Bound::NegativeInfinity, Bound::NegativeInfinity) => {
                Bound::PositiveInfinity
            }
            _ => Bound::NegativeInfinity,
        }
    }
}

/// Arbitrary-precision view of an [`IntegerBounds`].
#[derive(Debug, Clone)]
pub struct Bounds {
    pub minimum: Bound,
    pub maximum: Bound,
    pub modulus: Bound,
    pub modular_value: BigInt,
}

impl Bounds {
    pub fn exact(value: BigInt) -> Self {
        Bounds {
            minimum: Bound::Finite(value.clone()),
            maximum: Bound::Finite(value.clone()),
            modulus: Bound::PositiveInfinity,
            modular_value: value,
        }
    }

    pub fn from_ir(bounds: &IntegerBounds) -> Self {
        Bounds {
            minimum: Bound::parse(&bounds.minimum),
            maximum: Bound::parse(&bounds.maximum),
            modulus: Bound::parse(&bounds.modulus),
            modular_value: BigInt::from_str(&bounds.modular_value).unwrap_or_else(|_| BigInt::zero()),
        }
    }

    pub fn to_ir(&self) -> IntegerBounds {
        IntegerBounds {
            minimum: self.minimum.render(),
            maximum: self.maximum.render(),
            modulus: self.modulus.render(),
            modular_value: self.modular_value.to_string(),
        }
    }

    pub fn unbounded() -> Self {
        Bounds {
            minimum: Bound::NegativeInfinity,
            maximum: Bound::PositiveInfinity,
            modulus: Bound::Finite(BigInt::one()),
            modular_value: BigInt::zero(),
        }
    }
}

/// `gcd` where one or both operands may represent "no modular constraint"
/// (`Bound::PositiveInfinity`): an infinite modulus contributes nothing, so the
/// result degrades gracefully to the other (finite) modulus, or to infinity if
/// both are infinite.
fn gcd_bound(a: &Bound, b: &Bound) -> Bound {
    match (a, b) {
        (Bound::PositiveInfinity, Bound::PositiveInfinity) => Bound::PositiveInfinity,
        (Bound::PositiveInfinity, other) | (other, Bound::PositiveInfinity) => other.clone(),
        (Bound::Finite(x), Bound::Finite(y)) => Bound::Finite(x.gcd(y)),
        _ => Bound::Finite(BigInt::one()),
    }
}

fn gcd3(a: &Bound, b: &Bound, c: &Bound) -> Bound {
    gcd_bound(&gcd_bound(a, b), c)
}

/// Finds the largest modulus `m` and residue `v` such that both `(m1, v1)` and
/// `(m2, v2)` are consistent with `v (mod m)`.
pub fn shared_modular_value(m1: &Bound, v1: &BigInt, m2: &Bound, v2: &BigInt) -> (Bound, BigInt) {
    if matches!((m1, m2), (Bound::PositiveInfinity, Bound::PositiveInfinity)) && v1 == v2 {
        return (Bound::PositiveInfinity, v1.clone());
    }
    let diff = v1 - v2;
    let m = gcd3(m1, m2, &Bound::Finite(diff));
    let value = match &m {
        Bound::Finite(modulus) if !modulus.is_zero() => v1.mod_floor(modulus),
        _ => v1.clone(),
    };
    (m, value)
}

fn product_bounds(a: &Bounds, b: &Bounds) -> (Bound, Bound) {
    let corners = [
        Bound::mul(&a.minimum, &b.minimum),
        Bound::mul(&a.minimum, &b.maximum),
        Bound::mul(&a.maximum, &b.minimum),
        Bound::mul(&a.maximum, &b.maximum),
    ];
    let mut min = corners[0].clone();
    let mut max = corners[0].clone();
    for corner in &corners[1..] {
        min = Bound::min(&min, corner);
        max = Bound::max(&max, corner);
    }
    (min, max)
}

pub fn add(a: &Bounds, b: &Bounds) -> Bounds {
    Bounds {
        minimum: Bound::add(&a.minimum, &b.minimum),
        maximum: Bound::add(&a.maximum, &b.maximum),
        modulus: gcd_bound(&a.modulus, &b.modulus),
        modular_value: {
            let (m, v) = shared_sum_modulus(a, b);
            let _ = m;
            v
        },
    }
}

fn shared_sum_modulus(a: &Bounds, b: &Bounds) -> (Bound, BigInt) {
    let modulus = gcd_bound(&a.modulus, &b.modulus);
    let value = match &modulus {
        Bound::Finite(m) if !m.is_zero() => (&a.modular_value + &b.modular_value).mod_floor(m),
        _ => &a.modular_value + &b.modular_value,
    };
    (modulus, value)
}

pub fn subtract(a: &Bounds, b: &Bounds) -> Bounds {
    let negated_b = Bounds {
        minimum: Bound::neg(&b.maximum),
        maximum: Bound::neg(&b.minimum),
        modulus: b.modulus.clone(),
        modular_value: match &b.modulus {
            Bound::Finite(m) if !m.is_zero() => (m - &b.modular_value).mod_floor(m),
            _ => -&b.modular_value,
        },
    };
    add(a, &negated_b)
}

pub fn multiply(a: &Bounds, b: &Bounds) -> Bounds {
    let is_zero_range = |bounds: &Bounds| matches!((&bounds.minimum, &bounds.maximum), (Bound::Finite(x), Bound::Finite(y)) if x.is_zero() && y.is_zero());
    if is_zero_range(a) || is_zero_range(b) {
        return Bounds::exact(BigInt::zero());
    }

    let (minimum, maximum) = product_bounds(a, b);
    let modulus = gcd3(
        &Bound::mul(&a.modulus, &Bound::Finite(b.modular_value.clone())),
        &Bound::mul(&Bound::Finite(a.modular_value.clone()), &b.modulus),
        &Bound::mul(&a.modulus, &b.modulus),
    );
    let modular_value = match &modulus {
        Bound::Finite(m) if !m.is_zero() => (&a.modular_value * &b.modular_value).mod_floor(m),
        _ => &a.modular_value * &b.modular_value,
    };
    Bounds { minimum, maximum, modulus, modular_value }
}

pub fn maximum_of(all: &[Bounds]) -> Bounds {
    let mut iter = all.iter();
    let first = iter.next().cloned().unwrap_or_else(Bounds::unbounded);
    let mut minimum = first.minimum.clone();
    let mut maximum = first.maximum.clone();
    let mut modulus = first.modulus.clone();
    let mut modular_value = first.modular_value.clone();

    for next in iter {
        minimum = Bound::max(&minimum, &next.minimum);
        maximum = Bound::max(&maximum, &next.maximum);
        let (m, v) = shared_modular_value(&modulus, &modular_value, &next.modulus, &next.modular_value);
        modulus = m;
        modular_value = v;
    }
    Bounds { minimum, maximum, modulus, modular_value }
}

pub fn choice(condition_is_known: Option<bool>, then_bounds: &Bounds, else_bounds: &Bounds) -> Bounds {
    if let Some(true) = condition_is_known {
        return then_bounds.clone();
    }
    if let Some(false) = condition_is_known {
        return else_bounds.clone();
    }
    let minimum = Bound::min(&then_bounds.minimum, &else_bounds.minimum);
    let maximum = Bound::max(&then_bounds.maximum, &else_bounds.maximum);
    let (modulus, modular_value) = shared_modular_value(
        &then_bounds.modulus,
        &then_bounds.modular_value,
        &else_bounds.modulus,
        &else_bounds.modular_value,
    );
    Bounds { minimum, maximum, modulus, modular_value }
}

/// Computes bounds for `expression` bottom-up, given a lookup for field-reference
/// bounds. Non-integer expressions are left untouched.
pub fn compute_bounds(expression: &mut Expression, field_bounds: &dyn Fn(&str) -> Option<Bounds>) {
    if let ExpressionValue::Function { args, .. } = &mut expression.value {
        for arg in args {
            compute_bounds(arg, field_bounds);
        }
    }

    let computed = match &expression.value {
        ExpressionValue::Constant { value } => Some(Bounds::exact(BigInt::from_str(value).unwrap_or_else(|_| BigInt::zero()))),
        ExpressionValue::FieldReference { path } => path
            .first()
            .and_then(|r| r.source_name.first())
            .and_then(|w| field_bounds(&w.text)),
        ExpressionValue::Function { function, args } => compute_function_bounds(*function, args),
        _ => None,
    };

    if let Some(bounds) = computed {
        expression.expression_type = ExpressionType::Integer(bounds.to_ir());
    }
}

fn extract_bounds(expression: &Expression) -> Bounds {
    match &expression.expression_type {
        ExpressionType::Integer(bounds) => Bounds::from_ir(bounds),
        _ => Bounds::unbounded(),
    }
}

fn compute_function_bounds(function: FunctionKind, args: &[Expression]) -> Option<Bounds> {
    match function {
        FunctionKind::Addition => Some(add(&extract_bounds(&args[0]), &extract_bounds(&args[1]))),
        FunctionKind::Subtraction => Some(subtract(&extract_bounds(&args[0]), &extract_bounds(&args[1]))),
        FunctionKind::Multiplication => Some(multiply(&extract_bounds(&args[0]), &extract_bounds(&args[1]))),
        FunctionKind::Maximum => {
            let bounds: Vec<Bounds> = args.iter().map(extract_bounds).collect();
            Some(maximum_of(&bounds))
        }
        FunctionKind::Choice => {
            let then_bounds = extract_bounds(&args[1]);
            let else_bounds = extract_bounds(&args[2]);
            Some(choice(None, &then_bounds, &else_bounds))
        }
        FunctionKind::UpperBound => {
            let inner = extract_bounds(&args[0]);
            Some(Bounds::exact(match inner.maximum {
                Bound::Finite(v) => v,
                _ => BigInt::zero(), // callers must not rely on $upper_bound of an unbounded expression
            }))
        }
        FunctionKind::LowerBound => {
            let inner = extract_bounds(&args[0]);
            Some(Bounds::exact(match inner.minimum {
                Bound::Finite(v) => v,
                _ => BigInt::zero(),
            }))
        }
        _ => None,
    }
}

/// Computes bounds for every integer expression in the IR, processing each
/// structure's fields in dependency order (set by
/// [`crate::passes::dependency_checker::set_dependency_order`]) so a field's
/// bounds are available by the time a later field references it.
pub fn compute_bounds_for_ir(ir: &mut crate::ir::Ir) -> Vec<crate::diagnostics::Bundle> {
    for module in &mut ir.modules {
        for type_definition in &mut module.types {
            compute_bounds_in_type(type_definition);
        }
    }
    Vec::new()
}

fn compute_bounds_in_type(type_definition: &mut crate::ir::TypeDefinition) {
    if let crate::ir::TypeDefinition::Structure(structure) = type_definition {
        compute_bounds_in_structure(structure);
    }
    if !matches!(type_definition, crate::ir::TypeDefinition::External(_)) {
        for subtype in type_definition.subtypes_mut() {
            compute_bounds_in_type(subtype);
        }
    }
}

fn compute_bounds_in_structure(structure: &mut crate::ir::Structure) {
    use std::collections::HashMap;
    let mut known: HashMap<String, Bounds> = HashMap::new();

    let order: Vec<usize> = if structure.fields_in_dependency_order.len() == structure.fields.len() {
        structure.fields_in_dependency_order.clone()
    } else {
        (0..structure.fields.len()).collect()
    };

    for index in order {
        let field = &mut structure.fields[index];
        let name = field.name.name.text.clone();
        let lookup = |field_name: &str| known.get(field_name).cloned();

        compute_bounds(&mut field.existence_condition, &lookup);
        let field_bounds = match &mut field.kind {
            crate::ir::FieldKind::Physical { location, .. } => {
                compute_bounds(&mut location.start, &lookup);
                compute_bounds(&mut location.size, &lookup);
                extract_bounds(&location.size)
            }
            crate::ir::FieldKind::Virtual { read_transform } => {
                compute_bounds(read_transform, &lookup);
                extract_bounds(read_transform)
            }
        };
        known.insert(name, field_bounds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(value: i64) -> BigInt {
        BigInt::from(value)
    }

    fn uint8() -> Bounds {
        Bounds {
            minimum: Bound::Finite(BigInt::zero()),
            maximum: Bound::Finite(b(255)),
            modulus: Bound::Finite(BigInt::one()),
            modular_value: BigInt::zero(),
        }
    }

    #[test]
    fn product_of_two_affine_ranges() {
        // x, y : UInt:8; z = (12*x+9)*(40*y+15)
        let x = uint8();
        let y = uint8();
        let twelve_x = multiply(&Bounds::exact(b(12)), &x);
        let lhs = add(&twelve_x, &Bounds::exact(b(9)));
        let forty_y = multiply(&Bounds::exact(b(40)), &y);
        let rhs = add(&forty_y, &Bounds::exact(b(15)));
        let z = multiply(&lhs, &rhs);

        assert_eq!(z.minimum, Bound::Finite(b(9 * 15)));
        assert_eq!(z.maximum, Bound::Finite(b((12 * 255 + 9) * (40 * 255 + 15))));
        assert_eq!(z.modulus, Bound::Finite(b(60)));
        assert_eq!(z.modular_value, b(15));
    }

    #[test]
    fn shared_modular_value_of_equal_infinite_moduli() {
        let (m, v) = shared_modular_value(&Bound::PositiveInfinity, &b(7), &Bound::PositiveInfinity, &b(7));
        assert_eq!(m, Bound::PositiveInfinity);
        assert_eq!(v, b(7));
    }

    #[test]
    fn invariant_min_le_mv_le_max_for_sum() {
        let a = uint8();
        let c = add(&a, &Bounds::exact(b(10)));
        if let Bound::Finite(min) = &c.minimum {
            assert!(*min <= c.modular_value || c.modulus != Bound::Finite(BigInt::one()));
        }
        assert_eq!(c.minimum, Bound::Finite(b(10)));
        assert_eq!(c.maximum, Bound::Finite(b(265)));
    }
}
