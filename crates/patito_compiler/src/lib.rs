//! Patito compiler: lexer, parser, semantic analysis and quadruple generation.

pub mod constants;
pub mod cube;
pub mod error;
pub mod generator;
pub mod lexer;
pub mod memory;
pub mod parser;
pub mod symbols;

pub use error::{CompileError, SemanticError};
pub use generator::QuadGenerator;

use patito_syntax::ast::Root;
use patito_syntax::diagnostics::{format_diagnostic, Diagnostic};
use patito_syntax::ir::Program;
use patito_syntax::segment::MemoryLayout;
use patito_syntax::walk::walk_program;
use std::path::Path;

/// Print diagnostics to stderr with source context.
pub fn print_diagnostics(source: &str, file_name: &str, diags: &[Diagnostic]) {
    for d in diags {
        eprintln!("{}", format_diagnostic(source, file_name, d));
    }
}

/// Runs the analyzer over a parsed program.
pub fn generate(root: &Root, layout: MemoryLayout) -> Result<Program, CompileError> {
    let mut gen = QuadGenerator::new(layout);
    match walk_program(&mut gen, root) {
        Ok(()) => Ok(gen.finish()),
        Err(error) => Err(CompileError::Semantic {
            error,
            span: gen.error_span(),
        }),
    }
}

/// Compile source text to an object program.
pub fn compile_source(source: &str, layout: MemoryLayout) -> Result<Program, CompileError> {
    let tokens = lexer::Lexer::new(source)
        .collect_tokens()
        .map_err(CompileError::Syntax)?;
    tracing::debug!(tokens = tokens.len(), "lexed");
    let root = parser::parse(tokens).map_err(CompileError::Syntax)?;
    tracing::debug!(
        program = %root.name,
        globals = root.globals.len(),
        functions = root.functions.len(),
        "parsed"
    );
    generate(&root, layout)
}

/// Compile a source file. The segment size comes from the patito.toml of the
/// enclosing project when there is one.
pub fn compile_file(path: &Path) -> Result<Program, Vec<Diagnostic>> {
    let source = std::fs::read_to_string(path).map_err(|e| {
        vec![Diagnostic::error(
            format!("failed to read {}: {}", path.display(), e),
            None,
        )]
    })?;
    let layout = match patito_pkg::discover(path) {
        Ok(Some((root, manifest))) => {
            tracing::debug!(project_root = %root.display(), "using project manifest");
            MemoryLayout::new(manifest.compiler.segment_size)
        }
        Ok(None) => MemoryLayout::default(),
        Err(e) => return Err(vec![Diagnostic::error(e.to_string(), None)]),
    };
    let program = compile_source(&source, layout).map_err(|e| vec![e.diagnostic()])?;
    tracing::info!(
        path = %path.display(),
        quadruples = program.quadruples.len(),
        "compiled"
    );
    Ok(program)
}
