//! Writer for the textual program format.

use std::fmt;

use crate::codegen::program::ProgramInput;
use crate::polyhedral::constraint::ConstraintKind;
use crate::polyhedral::{Domain, Polyhedron};

/// Print `input` so that [`read_program`](super::reader::read_program)
/// reads back the same domains.
pub fn write_program(input: &ProgramInput) -> String {
    ProgramText(input).to_string()
}

/// Display adapter printing a program input in the textual format.
pub struct ProgramText<'a>(pub &'a ProgramInput);

impl fmt::Display for ProgramText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let input = self.0;
        writeln!(f, "# language")?;
        writeln!(f, "{}", input.language.tag())?;
        writeln!(f)?;

        writeln!(f, "# context")?;
        write_single(f, &input.context)?;
        write_names(f, input.parameter_names.as_deref())?;
        writeln!(f)?;

        writeln!(f, "# statements")?;
        writeln!(f, "{}", input.statements.len())?;
        for (i, domain) in input.statements.iter().enumerate() {
            writeln!(f, "# statement {}", i + 1)?;
            write_union(f, domain)?;
            writeln!(f, "0 0 0")?;
        }
        write_names(f, input.iterator_names.as_deref())?;
        writeln!(f)?;

        writeln!(f, "# scattering functions")?;
        writeln!(f, "{}", input.scatterings.len())?;
        for scattering in &input.scatterings {
            write_single(f, scattering)?;
        }
        if !input.scatterings.is_empty() {
            write_names(f, input.scattering_names.as_deref())?;
        }
        Ok(())
    }
}

fn write_names(f: &mut fmt::Formatter<'_>, names: Option<&[String]>) -> fmt::Result {
    match names {
        None => writeln!(f, "0"),
        Some(names) => writeln!(f, "1\n{}", names.join(" ")),
    }
}

/// A union as its member count followed by the members.
fn write_union(f: &mut fmt::Formatter<'_>, domain: &Domain) -> fmt::Result {
    if domain.members().is_empty() {
        writeln!(f, "1")?;
        return write_polyhedron(f, &Polyhedron::empty(domain.dim()));
    }
    writeln!(f, "{}", domain.nb_members())?;
    for member in domain.members() {
        write_polyhedron(f, member)?;
    }
    Ok(())
}

/// A convex domain as one matrix. Unions fall back to their first member.
fn write_single(f: &mut fmt::Formatter<'_>, domain: &Domain) -> fmt::Result {
    match domain.members().first() {
        Some(member) => write_polyhedron(f, member),
        None => write_polyhedron(f, &Polyhedron::empty(domain.dim())),
    }
}

fn write_polyhedron(f: &mut fmt::Formatter<'_>, poly: &Polyhedron) -> fmt::Result {
    let rows = poly.homogeneous_rows();
    writeln!(f, "{} {}", rows.len(), poly.dim() + 2)?;
    for (kind, values) in rows {
        let flag = match kind {
            ConstraintKind::Equality => 0,
            ConstraintKind::Inequality => 1,
        };
        write!(f, "{}", flag)?;
        for v in &values {
            write!(f, " {:>3}", v)?;
        }
        writeln!(f)?;
    }
    Ok(())
}
