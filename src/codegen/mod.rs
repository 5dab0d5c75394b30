//! Loop generation and printing.
//!
//! - [`names`]: dimension names
//! - [`block`]: statement blocks and their arena
//! - [`loops`]: the loop tree, its generation and enumeration
//! - [`program`]: building a program from statements and scatterings
//! - [`c`] and [`structure`]: printers

pub mod names;
pub mod block;
pub mod loops;
pub mod program;
pub mod c;
pub mod structure;

pub use block::{Block, BlockArena, BlockId, Statement};
pub use c::CCodeGen;
pub use loops::{Loop, LoopBody, Stride};
pub use names::Names;
pub use program::{Language, Program, ProgramInput};
pub use structure::print_structure;

/// Output format of the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    /// C loop nest
    Code,
    /// Tree dump
    Structure,
    /// The input, re-printed in the textual format
    Input,
    /// JSON dump of the program
    Json,
}

/// Render a program in one of the text formats.
pub fn render(program: &Program, emit: Emit) -> anyhow::Result<String> {
    match emit {
        Emit::Code => Ok(CCodeGen::new(program).generate()),
        Emit::Structure => Ok(print_structure(program)),
        Emit::Json => Ok(serde_json::to_string_pretty(&program.dump())?),
        Emit::Input => anyhow::bail!("the input format is printed from a ProgramInput, not a Program"),
    }
}
