//! Reader for the textual program format.
//!
//! The format is line oriented and whitespace separated; `#` starts a
//! comment running to the end of the line:
//!
//! ```text
//! c                  # language
//! 1 3                # context: rows cols
//! 1 1 -1             #   M - 1 >= 0
//! 0                  # generate parameter names
//! 1                  # statements
//! 1                  #   members of the first domain
//! 4 4                #   rows cols
//! 1  1  0 0          #   i >= 0
//! 1 -1  1 0          #   M - i >= 0
//! ...
//! 0 0 0              #   options (ignored)
//! 0                  # generate iterator names
//! 0                  # no scattering
//! ```

use log::debug;

use crate::codegen::program::{Language, ProgramInput};
use crate::polyhedral::{AffineExpr, Constraint, ConstraintKind, Domain, Polyhedron, Value};
use crate::utils::errors::{ParseError, ParseErrorKind};
use crate::utils::location::{SourceLocation, Span};

/// A whitespace-separated word with its position.
#[derive(Debug, Clone)]
struct Word<'a> {
    text: &'a str,
    span: Span,
}

/// Reader over the words of an input text.
pub struct Reader<'a> {
    words: Vec<Word<'a>>,
    pos: usize,
    end: Span,
}

impl<'a> Reader<'a> {
    /// Split `source` into words, dropping comments.
    pub fn new(source: &'a str) -> Self {
        let mut words = Vec::new();
        let mut offset = 0;
        let mut last_line = 1;
        for (index, raw_line) in source.split_inclusive('\n').enumerate() {
            let line = index + 1;
            last_line = line;
            let content = raw_line.split('#').next().unwrap_or("");
            let mut rest = content;
            let mut column = 1;
            while let Some(start) = rest.find(|c: char| !c.is_whitespace()) {
                let after = &rest[start..];
                let len = after.find(char::is_whitespace).unwrap_or(after.len());
                let text = &after[..len];
                let col = column + rest[..start].chars().count();
                let begin = SourceLocation::new(line, col, offset + (content.len() - rest.len()) + start);
                let finish = SourceLocation::new(line, col + text.chars().count(), begin.offset + len);
                words.push(Word { text, span: Span::new(begin, finish) });
                column = col + text.chars().count();
                rest = &after[len..];
            }
            offset += raw_line.len();
        }
        let end_location = SourceLocation::new(last_line, 1, source.len());
        Self { words, pos: 0, end: Span::point(end_location) }
    }

    fn remaining(&self) -> usize {
        self.words.len().saturating_sub(self.pos)
    }

    fn peek(&self) -> Option<&Word<'a>> {
        self.words.get(self.pos)
    }

    fn next_word(&mut self, what: &str) -> Result<Word<'a>, ParseError> {
        let word = self.words.get(self.pos).cloned().ok_or_else(|| {
            ParseError::new(ParseErrorKind::UnexpectedEof, "unexpected end of input", self.end).expected(what)
        })?;
        self.pos += 1;
        Ok(word)
    }

    fn next_value(&mut self, what: &str) -> Result<(Value, Span), ParseError> {
        let word = self.next_word(what)?;
        let value = word.text.parse::<Value>().map_err(|_| {
            ParseError::new(ParseErrorKind::InvalidNumber, "invalid number", word.span)
                .expected(what)
                .found(word.text)
        })?;
        Ok((value, word.span))
    }

    fn next_count(&mut self, what: &str) -> Result<(usize, Span), ParseError> {
        let word = self.next_word(what)?;
        let value = word.text.parse::<usize>().map_err(|_| {
            ParseError::new(ParseErrorKind::InvalidNumber, "invalid count", word.span)
                .expected(what)
                .found(word.text)
        })?;
        Ok((value, word.span))
    }

    /// Every remaining word on the line of the next word.
    fn rest_of_line(&mut self) -> Vec<Word<'a>> {
        let Some(line) = self.peek().map(|w| w.span.start.line) else {
            return Vec::new();
        };
        let mut words = Vec::new();
        while let Some(word) = self.peek() {
            if word.span.start.line != line {
                break;
            }
            words.push(word.clone());
            self.pos += 1;
        }
        words
    }

    /// Read a whole program.
    pub fn read_program(&mut self) -> Result<ProgramInput, ParseError> {
        let tag = self.next_word("language tag")?;
        let language = tag
            .text
            .chars()
            .next()
            .filter(|_| tag.text.chars().count() == 1)
            .and_then(Language::from_tag)
            .ok_or_else(|| {
                ParseError::new(ParseErrorKind::InvalidLanguage, "unknown language", tag.span)
                    .expected("'c' or 'f'")
                    .found(tag.text)
            })?;

        let context = self.read_matrix(None)?;
        let nb_par = context.dim();
        let parameter_names = self.read_names(nb_par, "parameter names")?;

        let (nb_statements, _) = self.next_count("number of statements")?;
        let mut statements = Vec::new();
        for _ in 0..nb_statements {
            let domain = self.read_union(nb_par)?;
            // Per-statement options line.
            self.rest_of_line();
            statements.push(domain);
        }
        let nb_iterators = statements.iter().map(|d| d.dim() - nb_par).max().unwrap_or(0);
        let iterator_names = self.read_names(nb_iterators, "iterator names")?;

        let mut scatterings = Vec::new();
        let mut scattering_names = None;
        if self.peek().is_some() {
            let (nb_scatterings, span) = self.next_count("number of scattering functions")?;
            if nb_scatterings > 0 && nb_scatterings != nb_statements {
                return Err(ParseError::new(
                    ParseErrorKind::InconsistentDimensions,
                    "one scattering function per statement is required",
                    span,
                )
                .expected(nb_statements.to_string())
                .found(nb_scatterings.to_string()));
            }
            for statement in &statements {
                if scatterings.len() == nb_scatterings {
                    break;
                }
                scatterings.push(self.read_matrix(Some(statement.dim()))?);
            }
            if let (Some(first), Some(stmt)) = (scatterings.first(), statements.first()) {
                let nb_scattdims = first.dim() - stmt.dim();
                if self.peek().is_some() {
                    scattering_names = self.read_names(nb_scattdims, "scattering names")?;
                }
            }
        }
        debug!(
            "read {} statement(s), {} parameter(s), {} scattering function(s)",
            statements.len(),
            nb_par,
            scatterings.len()
        );
        Ok(ProgramInput {
            language,
            context,
            parameter_names,
            statements,
            iterator_names,
            scatterings,
            scattering_names,
        })
    }

    /// `0` or `1` followed by a line of `count` names.
    fn read_names(&mut self, count: usize, what: &str) -> Result<Option<Vec<String>>, ParseError> {
        let (flag, span) = self.next_value(what)?;
        if flag == Value::from(0) {
            return Ok(None);
        }
        if flag != Value::from(1) {
            return Err(ParseError::new(ParseErrorKind::InvalidFlag, "name flag must be 0 or 1", span)
                .found(flag.to_string()));
        }
        if count == 0 {
            return Ok(Some(Vec::new()));
        }
        let words = self.rest_of_line();
        if words.len() < count {
            let span = words.last().map(|w| w.span).unwrap_or(span);
            return Err(ParseError::new(ParseErrorKind::MissingNames, format!("too few {}", what), span)
                .expected(count.to_string())
                .found(words.len().to_string()));
        }
        Ok(Some(words.iter().take(count).map(|w| w.text.to_string()).collect()))
    }

    /// A member count followed by that many matrices of equal width.
    fn read_union(&mut self, nb_par: usize) -> Result<Domain, ParseError> {
        let (nb_members, _) = self.next_count("number of domain members")?;
        let mut members: Vec<Polyhedron> = Vec::new();
        let mut dim = None;
        for _ in 0..nb_members {
            let start = self.peek().map(|w| w.span).unwrap_or(self.end);
            let member = self.read_polyhedron(dim)?;
            if member.dim() < nb_par {
                return Err(ParseError::new(
                    ParseErrorKind::InconsistentDimensions,
                    "domain has fewer columns than the parameter context",
                    start,
                ));
            }
            dim = Some(member.dim());
            members.push(member);
        }
        let dim = dim.unwrap_or(nb_par);
        Domain::from_members(dim, members).map_err(|e| {
            ParseError::new(ParseErrorKind::InconsistentDimensions, e.to_string(), self.end)
        })
    }

    /// A single matrix as a domain, optionally of a minimum width.
    fn read_matrix(&mut self, at_least: Option<usize>) -> Result<Domain, ParseError> {
        let start = self.peek().map(|w| w.span).unwrap_or(self.end);
        let poly = self.read_polyhedron(None)?;
        if let Some(min) = at_least {
            if poly.dim() < min {
                return Err(ParseError::new(
                    ParseErrorKind::InconsistentDimensions,
                    "scattering function is narrower than its statement domain",
                    start,
                )
                .expected(format!("at least {} columns", min + 2))
                .found(format!("{} columns", poly.dim() + 2)));
            }
        }
        Ok(Domain::from_polyhedron(poly))
    }

    /// `rows cols` then the rows, each `flag coeffs... constant`.
    fn read_polyhedron(&mut self, dim: Option<usize>) -> Result<Polyhedron, ParseError> {
        let (rows, _) = self.next_count("row count")?;
        let (cols, span) = self.next_count("column count")?;
        if cols < 2 {
            return Err(ParseError::new(ParseErrorKind::InvalidShape, "a matrix needs at least two columns", span)
                .found(cols.to_string()));
        }
        let width = cols - 2;
        if let Some(expected) = dim {
            if expected != width {
                return Err(ParseError::new(
                    ParseErrorKind::InconsistentDimensions,
                    "union members differ in width",
                    span,
                )
                .expected((expected + 2).to_string())
                .found(cols.to_string()));
            }
        }
        let needed = rows.checked_mul(cols - 1);
        if needed.map_or(true, |n| n > self.remaining()) {
            return Err(ParseError::new(
                ParseErrorKind::UnexpectedEof,
                "matrix is larger than the rest of the input",
                span,
            )
            .expected(format!("{} rows of {} columns", rows, cols))
            .found(format!("{} word(s)", self.remaining())));
        }
        let mut constraints = Vec::with_capacity(rows);
        for _ in 0..rows {
            let (flag, flag_span) = self.next_value("row flag")?;
            let kind = if flag == Value::from(0) {
                ConstraintKind::Equality
            } else if flag == Value::from(1) {
                ConstraintKind::Inequality
            } else {
                return Err(ParseError::new(ParseErrorKind::InvalidFlag, "row flag must be 0 or 1", flag_span)
                    .found(flag.to_string()));
            };
            let mut coeffs = Vec::with_capacity(width);
            for _ in 0..width {
                coeffs.push(self.next_value("coefficient")?.0);
            }
            let constant = self.next_value("constant")?.0;
            constraints.push(Constraint::new(AffineExpr { coeffs, constant }, kind));
        }
        Polyhedron::from_constraints(width, constraints)
            .map_err(|e| ParseError::new(ParseErrorKind::InvalidShape, e.to_string(), span))
    }
}

/// Read a program from text.
pub fn read_program(source: &str) -> Result<ProgramInput, ParseError> {
    Reader::new(source).read_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = "\
# A 10x10 square
c

1 2
1 1

0

1
1
4 4
1  1  0  0
1 -1  0  9
1  0  1  0
1  0 -1  9
0 0 0
1
i j
0
";

    #[test]
    fn test_read_square() {
        let input = read_program(SQUARE).unwrap();
        assert_eq!(input.language, Language::C);
        assert_eq!(input.context.dim(), 0);
        assert_eq!(input.statements.len(), 1);
        assert_eq!(input.statements[0].dim(), 2);
        assert!(input.statements[0].contains_i64(&[9, 0]));
        assert!(!input.statements[0].contains_i64(&[10, 0]));
        assert_eq!(input.iterator_names, Some(vec!["i".to_string(), "j".to_string()]));
        assert!(input.scatterings.is_empty());
    }

    #[test]
    fn test_scattering_and_names() {
        let source = "\
c
1 3
1 1 -1
1
N
1
1
2 4
1 1 0 0
1 -1 1 -1
0 0 0
0
1
2 5
0 1 -1 0 0
0 0 0 0 0
1
t
";
        let input = read_program(source).unwrap();
        assert_eq!(input.parameter_names, Some(vec!["N".to_string()]));
        assert_eq!(input.scatterings.len(), 1);
        assert_eq!(input.scatterings[0].dim(), 3);
        assert_eq!(input.scattering_names, Some(vec!["t".to_string()]));
    }

    #[test]
    fn test_bad_language() {
        let err = read_program("x\n1 2\n1 1\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidLanguage);
        assert_eq!(err.span.start.line, 1);
    }

    #[test]
    fn test_bad_flag_and_eof() {
        let err = read_program("c\n1 3\n2 1 0\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidFlag);
        assert_eq!(err.span.start.line, 3);
        let err = read_program("c\n1 3\n1 1").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_huge_counts_are_errors() {
        let err = read_program("c\n0 2\n0\n18446744073709551615\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedEof);

        let err = read_program("c\n100000000000000 3\n1 1 0\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedEof);
        assert_eq!(err.span.start.line, 2);

        let err = read_program("c\n1 18446744073709551615\n1 1 0\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedEof);

        let err = read_program("c\n0 2\n0\n1\n18446744073709551615\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_missing_names() {
        let err = read_program("c\n1 4\n1 1 1 0\n1\nM\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingNames);
    }
}
