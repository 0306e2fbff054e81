//! The pipeline driver: runs the eleven semantic-analysis passes in order and
//! implements the error-propagation policy from `SPEC_FULL.md` §7.
//!
//! Grounded on the reference compiler's `glue.py`: each pass returns a list of
//! diagnostic bundles; the driver partitions them into user-facing and synthetic,
//! stops at the first pass with a user-facing bundle, and otherwise accumulates
//! synthetic bundles to surface at the end (their presence indicates a compiler
//! bug, since everything else succeeded).

use crate::config::PipelineConfig;
use crate::diagnostics::{split_bundles, Bundle};
use crate::ir::Ir;
use crate::passes::{attributes, bounds, constraints, dependency_checker, desugar, symbol_resolver, type_check, write_inference};
use tracing::{debug, info, instrument};

/// Identifies a stopping point for tests that want to inspect intermediate IR
/// state, mirroring the reference compiler's `stop_before_step` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Desugar,
    ResolveTypesAndConstants,
    FindDependencyCycles,
    SetDependencyOrder,
    ResolveFieldReferences,
    AnnotateTypes,
    CheckTypes,
    ComputeBounds,
    CheckAttributes,
    CheckConstraints,
    InferWriteMethods,
}

const STEP_ORDER: &[Step] = &[
    Step::Desugar,
    Step::ResolveTypesAndConstants,
    Step::FindDependencyCycles,
    Step::SetDependencyOrder,
    Step::ResolveFieldReferences,
    Step::AnnotateTypes,
    Step::CheckTypes,
    Step::ComputeBounds,
    Step::CheckAttributes,
    Step::CheckConstraints,
    Step::InferWriteMethods,
];

/// Runs the complete pipeline. On success, returns the fully decorated `Ir`. On
/// failure, returns the user-facing diagnostic bundles that should be reported;
/// by the time this returns an `Err`, `ir` may be partially mutated and must not
/// be used further.
#[instrument(skip(ir, config))]
pub fn process_ir(mut ir: Ir, config: &PipelineConfig) -> Result<Ir, Vec<Bundle>> {
    process_ir_until(&mut ir, config, None)?;
    Ok(ir)
}

/// Runs the pipeline up to (and including) `stop_before_step`'s predecessor, or
/// the whole pipeline if `stop_before_step` is `None`. Returns accumulated
/// synthetic bundles as `Ok` alongside nothing useful when used for testing partial
/// state; production callers should use [`process_ir`].
pub fn process_ir_until(ir: &mut Ir, config: &PipelineConfig, stop_before_step: Option<Step>) -> Result<Vec<Bundle>, Vec<Bundle>> {
    let mut deferred_synthetic = Vec::new();

    macro_rules! run_pass {
        ($step:expr, $body:expr) => {{
            if stop_before_step == Some($step) {
                return Ok(deferred_synthetic);
            }
            debug!(?$step, "running pass");
            let bundles: Vec<Bundle> = $body;
            let (user, synthetic) = split_bundles(bundles);
            deferred_synthetic.extend(synthetic);
            if !user.is_empty() {
                info!(?$step, count = user.len(), "pass produced user-facing diagnostics");
                return Err(user);
            }
        }};
    }

    run_pass!(Step::Desugar, desugar::desugar(ir));
    run_pass!(Step::ResolveTypesAndConstants, symbol_resolver::resolve_type_and_constant_references(ir));
    run_pass!(Step::FindDependencyCycles, dependency_checker::find_dependency_cycles(ir));
    run_pass!(Step::SetDependencyOrder, dependency_checker::set_dependency_order(ir));
    run_pass!(Step::ResolveFieldReferences, symbol_resolver::resolve_field_references(ir));
    run_pass!(Step::AnnotateTypes, type_check::annotate_expression_types(ir));
    run_pass!(Step::CheckTypes, type_check::check_expression_types(ir));
    run_pass!(Step::ComputeBounds, bounds::compute_bounds_for_ir(ir));
    run_pass!(Step::CheckAttributes, {
        let mut b = attributes::check_attributes(ir, config);
        b.extend(attributes::verify_fixed_size(ir));
        b
    });
    run_pass!(Step::CheckConstraints, constraints::check_constraints(ir));
    run_pass!(Step::InferWriteMethods, write_inference::infer_write_methods(ir));

    if config.surface_synthetic_errors && !deferred_synthetic.is_empty() {
        return Err(deferred_synthetic);
    }

    Ok(deferred_synthetic)
}

#[allow(dead_code)]
fn step_index(step: Step) -> usize {
    STEP_ORDER.iter().position(|s| *s == step).unwrap_or(STEP_ORDER.len())
}
