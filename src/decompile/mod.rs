//! Bytecode to source decompilation.
//!
//! The pipeline runs once over a whole program:
//!
//! 1. `analysis`: resolve script references and recover printf formats.
//! 2. `types`: infer variable and return types.
//! 3. per script, `structure` then `reconstruct` into statement trees.
//!
//! A failure inside one script is caught at the function boundary and that
//! function's body is replaced by an error comment.

pub mod analysis;
pub mod boolean;
pub mod error;
pub mod reconstruct;
pub mod structure;
pub mod types;

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::bytecode::{Program, Script};
use crate::config::DecompilerConfig;
use crate::lang::{Decl, FuncDef, Node, SourceFile, ValueType};
use crate::symbols::global_name;

pub use analysis::AnalysisReport;
pub use error::{DecompileError, Result};
use reconstruct::{referenced_labels, ProgramContext, Reconstructor};
use types::{frame_size, return_types, VariableTypes};

/// Result of decompiling a program.
#[derive(Debug, Clone)]
pub struct Decompilation {
    pub source: SourceFile,
    pub report: AnalysisReport,
    /// Scripts whose body was replaced by an error comment.
    pub failed: Vec<(String, DecompileError)>,
}

/// Decompile every script of `program`.
pub fn decompile_program(program: &Program, config: &DecompilerConfig) -> Decompilation {
    let mut program = program.clone();
    program.rename_entry_point();
    let report = analyze_program(&mut program, config);

    let vars = VariableTypes::infer(&program);
    let returns = return_types(&program, &vars, config);
    let symbols = config.symbols.as_ref();

    let context = ProgramContext {
        function_names: program.scripts.iter().map(|s| s.name.clone()).collect(),
        global_names: vars
            .globals
            .keys()
            .map(|&slot| (slot, global_name(symbols, slot)))
            .collect(),
        symbols,
    };

    let globals = vars
        .globals
        .iter()
        .map(|(slot, ty)| Decl::new(*ty, context.global_names[slot].clone()))
        .collect();

    let mut failed = Vec::new();
    let functions = program
        .scripts
        .iter()
        .enumerate()
        .map(|(index, script)| {
            let ret = returns.get(index).copied().unwrap_or(ValueType::Int);
            let locals = vars.locals.get(index).map(Vec::as_slice).unwrap_or(&[]);
            let (func, error) = decompile_function(script, ret, locals, &context, config);
            if let Some(error) = error {
                failed.push((script.name.clone(), error));
            }
            func
        })
        .collect();

    Decompilation {
        source: SourceFile { globals, functions },
        report,
        failed,
    }
}

fn analyze_program(program: &mut Program, config: &DecompilerConfig) -> AnalysisReport {
    let report = analysis::analyze_program(program, config);
    for underflow in &report.underflows {
        warn!(
            script = %underflow.script,
            position = underflow.position,
            needed = underflow.needed,
            available = underflow.available,
            "stack underflow during analysis"
        );
    }
    report
}

/// Decompile one script. On failure the body is a single error comment and
/// the error is returned alongside.
pub fn decompile_function(
    script: &Script,
    ret: ValueType,
    local_types: &[ValueType],
    context: &ProgramContext,
    config: &DecompilerConfig,
) -> (FuncDef, Option<DecompileError>) {
    debug!(script = %script.name, instructions = script.instructions.len(), "decompiling");

    let frame = frame_size(script);
    let (argc, varc) = frame.unwrap_or((0, 0));
    let ty = |slot: usize| local_types.get(slot).copied().unwrap_or(ValueType::Int);
    let names: Vec<String> = (0..varc)
        .map(|slot| {
            if slot < argc {
                format!("arg{}", slot)
            } else {
                format!("var{}", slot)
            }
        })
        .collect();

    let mut func = FuncDef {
        ret,
        name: script.name.clone(),
        params: (0..argc).map(|slot| Decl::new(ty(slot), names[slot].clone())).collect(),
        body: Vec::new(),
    };

    let body = match frame {
        Some(_) => function_body(script, names.clone(), context, config),
        None => Err(DecompileError::MissingBegin(script.name.clone())),
    };

    match body {
        Ok(body) => {
            func.body = (argc..varc)
                .map(|slot| Node::Decl(Decl::new(ty(slot), names[slot].clone())))
                .chain(body)
                .collect();
            (func, None)
        }
        Err(error) => {
            warn!(script = %script.name, %error, "replacing function body with error comment");
            func.body = vec![Node::Comment(format!(
                "Error occurred while decompiling:\n{}",
                error
            ))];
            (func, Some(error))
        }
    }
}

fn function_body(
    script: &Script,
    names: Vec<String>,
    context: &ProgramContext,
    config: &DecompilerConfig,
) -> Result<Vec<Node>> {
    let items = structure::structure_script(script, config.max_nesting)?;
    let labels: HashSet<u32> = referenced_labels(&items);
    Reconstructor::new(context, names, labels, config.max_nesting).block(&items, 0)
}
