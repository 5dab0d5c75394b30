//! Frontend: the textual program format.
//!
//! A program file lists the language, the parameter context, one union of
//! polyhedra per statement and optionally one scattering function per
//! statement, each section followed by its dimension names. Matrices are
//! written row by row as `flag coeffs... constant`, with flag `0` for an
//! equality and `1` for an inequality.

pub mod reader;
pub mod writer;

pub use reader::{read_program, Reader};
pub use writer::{write_program, ProgramText};
pub use crate::utils::errors::ParseError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_read() {
        let source = "\
c
1 3
1 1 -2
0
2
1
2 4
1 1 0 0
1 -1 1 0
0 0 0
2
1 3
1 1 -5
1 3
1 -1 3
0 0 0
0
0
";
        let first = read_program(source).unwrap();
        let second = read_program(&write_program(&first)).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.statements[1].nb_members(), 2);
    }
}
