//! The upstream boundary: how an initial, freshly-parsed IR reaches the pipeline.
//!
//! The tokenizer and LR(1) parser that would normally turn source text into an
//! initial [`Module`] are out of scope for this crate (`SPEC_FULL.md` §1, §6). This
//! module expresses the boundary as a trait, so a real grammar-driven parser can be
//! plugged in later without touching the pipeline, plus a minimal implementation
//! used by this crate's own tests and CLI demonstration.

use crate::diagnostics::Bundle;
use crate::ir::{builders::prelude_module, Module};
use std::collections::HashMap;

/// Loads module source text by file name. Implementations typically search a list
/// of import directories, returning the first match (later directories are
/// shadowed silently, matching upstream behavior).
pub trait ModuleReader {
    fn read(&self, file_name: &str) -> Result<String, Bundle>;
}

/// A `ModuleReader` backed by an in-memory map, for tests and for the CLI's
/// `--demo` mode. Not a substitute for a production grammar-driven parser.
#[derive(Debug, Clone, Default)]
pub struct MemoryModuleReader {
    files: HashMap<String, String>,
}

impl MemoryModuleReader {
    pub fn new() -> Self {
        MemoryModuleReader { files: HashMap::new() }
    }

    pub fn with_file(mut self, file_name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.insert(file_name.into(), contents.into());
        self
    }
}

impl ModuleReader for MemoryModuleReader {
    fn read(&self, file_name: &str) -> Result<String, Bundle> {
        self.files
            .get(file_name)
            .cloned()
            .ok_or_else(|| Bundle::single(crate::diagnostics::Message::error(
                file_name,
                crate::diagnostics::SourceLocation::synthetic(),
                format!("could not find file '{file_name}' in any import directory"),
            )))
    }
}

/// A source-directory-backed `ModuleReader`, searching a list of import
/// directories in order and returning the first hit.
#[derive(Debug, Clone)]
pub struct FilesystemModuleReader {
    pub import_dirs: Vec<std::path::PathBuf>,
}

impl ModuleReader for FilesystemModuleReader {
    fn read(&self, file_name: &str) -> Result<String, Bundle> {
        for dir in &self.import_dirs {
            let candidate = dir.join(file_name);
            if let Ok(contents) = std::fs::read_to_string(&candidate) {
                return Ok(contents);
            }
        }
        Err(Bundle::single(crate::diagnostics::Message::error(
            file_name,
            crate::diagnostics::SourceLocation::synthetic(),
            format!("could not find file '{file_name}' in any import directory"),
        )))
    }
}

/// Returns the prelude module's IR, built directly rather than parsed from
/// embedded source text (see `SPEC_FULL.md` §6, Open Question 4 in `DESIGN.md`).
pub fn get_prelude() -> Module {
    prelude_module()
}
