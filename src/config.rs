//! Pipeline-level configuration.
//!
//! This is the only externally-configurable behavior of the core pipeline itself;
//! everything else (import directories, color mode, debug dumps) belongs to the
//! CLI (`src/main.rs`) and is never read from the environment or a config file by
//! this crate's library code.

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Back-end specifiers this compilation expects to generate code for. A
    /// back-end-qualified attribute whose specifier is absent from this list is
    /// rejected by the attribute checker.
    pub expected_back_ends: Vec<String>,
    /// When true, synthetic (compiler-bug) diagnostics are surfaced even when the
    /// pipeline otherwise completed without a user-facing error. A debugging aid;
    /// production callers should leave this false.
    pub surface_synthetic_errors: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            expected_back_ends: vec!["cpp".to_string()],
            surface_synthetic_errors: false,
        }
    }
}
