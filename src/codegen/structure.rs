//! Indented dump of a program and its loop tree.

use crate::codegen::loops::{Loop, LoopBody};
use crate::codegen::program::Program;
use crate::polyhedral::Domain;
use crate::utils::pretty::CodeFormatter;

/// Print the tree with `+--` nodes and `|` rails.
pub fn print_structure(program: &Program) -> String {
    let names = program.names();
    let mut f = CodeFormatter::new("|\t");
    f.line("+-- Program");
    f.indent();
    f.line(&format!("Language: {}", program.language()));
    f.line(&format!("Scattering dimensions: {}", program.nb_scattdims()));
    if program.scaldims().iter().any(|&s| s) {
        let flags: Vec<String> = program
            .scaldims()
            .iter()
            .enumerate()
            .map(|(i, &s)| format!("{}:{}", i, u8::from(s)))
            .collect();
        f.line(&format!("Scalar dimensions: {}", flags.join(" ")));
    }
    f.line(&format!("Parameters: {}", names.parameters.join(" ")));
    f.line(&format!("Iterators: {}", names.iterators.join(" ")));
    if !names.scattering.is_empty() || !names.scalars.is_empty() {
        f.line(&format!("Scattering: {}", names.scattering.join(" ")));
        f.line(&format!("Scalars: {}", names.scalars.join(" ")));
    }
    f.line(&format!("Context: {}", domain_text(program.context(), &names.parameters)));
    for node in program.loops() {
        print_loop(&mut f, program, node);
    }
    f.dedent();
    f.finish()
}

fn print_loop(f: &mut CodeFormatter, program: &Program, node: &Loop) {
    let names = program.names();
    let depth = node.domain.dim() - program.nb_parameters();
    match node.level {
        Some(level) => f.line(&format!("+-- Loop {} (level {})", names.level(level), level)),
        None => f.line("+-- Guard"),
    }
    f.indent();
    f.line(&format!("Domain: {}", domain_text(&node.domain, &names.columns(depth))));
    if !node.stride.is_unit() {
        f.line(&format!("Stride: {} (offset {})", node.stride.step, node.stride.offset));
    }
    match &node.body {
        LoopBody::Inner(inner) => {
            for child in inner {
                print_loop(f, program, child);
            }
        }
        LoopBody::Block(id) => {
            let block = program.blocks().get(*id);
            f.line("+-- Block");
            f.indent();
            f.line(&format!("Depth: {}", block.depth()));
            if !block.scalars().is_empty() {
                let values: Vec<String> = block.scalars().iter().map(|v| v.to_string()).collect();
                f.line(&format!("Scalar values: {}", values.join(" ")));
            }
            for stmt in block.statements() {
                f.line(&format!("+-- Statement {}", stmt.number));
            }
            f.dedent();
        }
    }
    f.dedent();
}

fn domain_text(domain: &Domain, columns: &[String]) -> String {
    format!("[{}] : {}", columns.join(", "), domain.to_string_with_names(columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::program::ProgramInput;
    use crate::polyhedral::Constraint;
    use crate::GenerationOptions;

    #[test]
    fn test_structure_of_single_loop() {
        let domain =
            Domain::from_constraints(1, vec![Constraint::lower_bound(0, 0, 1), Constraint::upper_bound(0, 3, 1)])
                .unwrap();
        let input = ProgramInput::new(Domain::universe(0)).with_statement(domain);
        let program = Program::build(&input, &GenerationOptions::default()).unwrap();
        let text = print_structure(&program);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "+-- Program");
        assert_eq!(lines[1], "|\tLanguage: C");
        assert!(lines.contains(&"|\t+-- Loop i (level 1)"));
        assert!(lines.contains(&"|\t|\t|\t+-- Block"));
        assert!(lines.contains(&"|\t|\t|\t|\t+-- Statement 1"));
    }
}
