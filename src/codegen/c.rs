//! C code generation.
//!
//! Prints a generated loop tree as a C loop nest: `for` loops with
//! `max`/`min` and `ceild`/`floord` bounds, `if` guards, assignments for
//! levels fixed by an equality and one call `S<n>(...)` per statement.

use log::warn;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use std::sync::Arc;

use crate::codegen::block::Statement;
use crate::codegen::loops::{Loop, LoopBody, Stride};
use crate::codegen::names::Names;
use crate::codegen::program::{Language, Program};
use crate::polyhedral::constraint::ConstraintKind;
use crate::polyhedral::{AffineExpr, Constraint, Domain, Polyhedron, Value};
use crate::utils::pretty::CodeFormatter;

/// C code generator.
pub struct CCodeGen<'p> {
    program: &'p Program,
    names: Arc<Names>,
    indent: String,
    source: Option<String>,
    compilable: Option<i64>,
}

impl<'p> CCodeGen<'p> {
    /// Printer for `program`, compilable when the program was built so.
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            names: Arc::clone(program.names()),
            indent: "  ".to_string(),
            source: None,
            compilable: program.compilable(),
        }
    }

    /// Use another indentation string.
    pub fn with_indent(mut self, indent: &str) -> Self {
        self.indent = indent.to_string();
        self
    }

    /// Start with a comment naming the input, in the program's language.
    pub fn with_source(mut self, name: &str) -> Self {
        self.source = Some(name.to_string());
        self
    }

    /// Wrap the loop nest in a complete program with every parameter set to
    /// `value`, or print the bare loop nest for `None`.
    pub fn compilable(mut self, value: Option<i64>) -> Self {
        self.compilable = value;
        self
    }

    /// Generate the loop nest.
    pub fn generate(&self) -> String {
        let language = self.program.language();
        if language == Language::Fortran {
            warn!("Fortran output is not supported, printing C");
        }
        let mut f = CodeFormatter::new(&self.indent);
        if let Some(source) = &self.source {
            let text = format!("Generated from {} by polyscan {}.", source, crate::VERSION);
            match language {
                Language::C => f.line(&format!("/* {} */", text)),
                Language::Fortran => f.line(&format!("! {}", text)),
            }
        }
        match self.compilable {
            Some(value) if language == Language::C => {
                self.preamble(&mut f, value);
                f.nested(|f| self.emit_loops(f));
                f.line("");
                f.nested(|f| {
                    f.line("printf(\"Number of integral points: %d.\\n\",total) ;");
                    f.line("return 0 ;");
                });
                f.line("}");
            }
            Some(_) => {
                warn!("compilable output is only printed for C programs");
                self.emit_loops(&mut f);
            }
            None => self.emit_loops(&mut f),
        }
        f.finish()
    }

    fn emit_loops(&self, f: &mut CodeFormatter) {
        for node in self.program.loops() {
            self.emit(f, node, &[]);
        }
    }

    /// Includes, rounding and statement macros, then the opening of `main`
    /// with every dimension declared.
    fn preamble(&self, f: &mut CodeFormatter, value: i64) {
        let names = &self.names;
        f.line("#include <stdio.h>");
        f.line("#include <stdlib.h>");
        f.line("");
        f.line("/* Parameter values. */");
        for k in 1..=names.parameters.len() {
            f.line(&format!("#define PARVAL{} {}", k, value));
        }
        f.line("");
        f.line("/* Integer rounding and bounds. */");
        f.line("#define floord(n,d) (((n)<0) ? -((-(n)+(d)-1)/(d)) : (n)/(d))");
        f.line("#define ceild(n,d)  (((n)<0) ? -((-(n))/(d)) : ((n)+(d)-1)/(d))");
        f.line("#define max(x,y)    ((x) > (y) ? (x) : (y))");
        f.line("#define min(x,y)    ((x) < (y) ? (x) : (y))");
        f.line("");
        f.line("/* Statement macros (edit as needed). */");
        for &id in self.program.block_list() {
            let block = self.program.blocks().get(id);
            let first = names.scattering.len();
            let args: Vec<String> = (1..=block.depth()).map(|k| names.level(first + k)).collect();
            for stmt in block.statements() {
                let body = if args.is_empty() {
                    "{total++;}".to_string()
                } else {
                    format!(
                        "{{total++; printf(\"{}{}\\n\",{});}}",
                        stmt,
                        " %d".repeat(args.len()),
                        args.join(",")
                    )
                };
                f.line(&format!("#define {}({}) {}", stmt, args.join(","), body));
            }
        }
        f.line("");
        f.line("int main() {");
        f.nested(|f| {
            let declare = |f: &mut CodeFormatter, comment: &str, list: &[String]| {
                if !list.is_empty() {
                    f.line(&format!("/* {} */", comment));
                    f.line(&format!("int {} ;", list.join(", ")));
                }
            };
            declare(f, "Scalar dimensions.", &names.scalars);
            declare(f, "Scattering iterators.", &names.scattering);
            declare(f, "Statement iterators.", &names.iterators);
            if !names.parameters.is_empty() {
                let params: Vec<String> =
                    names.parameters.iter().enumerate().map(|(k, p)| format!("{}=PARVAL{}", p, k + 1)).collect();
                f.line("/* Parameters. */");
                f.line(&format!("int {};", params.join(", ")));
            }
            f.line("int total=0;");
            f.line("");
        });
    }

    /// `strides` holds the steps of the enclosing levels, outermost first.
    fn emit(&self, f: &mut CodeFormatter, node: &Loop, strides: &[Stride]) {
        match node.level {
            Some(level) => self.emit_loop(f, node, level, strides),
            None => {
                let depth = node.domain.dim() - self.program.nb_parameters();
                let columns = self.names.columns(depth);
                match guard(&node.domain, &columns) {
                    Some(cond) => f.block(&format!("if ({})", cond), |f| self.emit_body(f, node, strides)),
                    None => self.emit_body(f, node, strides),
                }
            }
        }
    }

    fn emit_body(&self, f: &mut CodeFormatter, node: &Loop, strides: &[Stride]) {
        match &node.body {
            LoopBody::Block(id) => {
                let block = self.program.blocks().get(*id);
                for stmt in block.statements() {
                    f.line(&self.call(*stmt, block.depth()));
                }
            }
            LoopBody::Inner(inner) => {
                for child in inner {
                    self.emit(f, child, strides);
                }
            }
        }
    }

    /// `S<n>(iterators);`: the iterators follow the scattering levels.
    fn call(&self, stmt: Statement, depth: usize) -> String {
        let first = self.names.scattering.len();
        let args: Vec<String> = (1..=depth).map(|k| self.names.level(first + k)).collect();
        format!("{}({});", stmt, args.join(","))
    }

    fn emit_loop(&self, f: &mut CodeFormatter, node: &Loop, level: usize, strides: &[Stride]) {
        let columns = self.names.columns(level);
        let name = self.names.level(level);
        let mut inner_strides = strides.to_vec();
        inner_strides.resize(level - 1, Stride::default());
        inner_strides.push(node.stride.clone());
        for member in node.domain.members() {
            let col = level - 1;
            let mut outer = Vec::new();
            let mut bounds = Vec::new();
            let mut fixed = None;
            for row in member.constraints() {
                if row.expr.coeff(col).is_zero() {
                    outer.push(condition(row, &columns));
                } else if row.is_equality() && fixed.is_none() {
                    fixed = Some(row);
                } else {
                    bounds.push(row);
                }
            }
            match fixed {
                Some(eq) => {
                    let (value, divisible) = solve(eq, col, &columns, &inner_strides[..col]);
                    outer.extend(divisible);
                    let inner: Vec<String> = bounds.iter().map(|r| condition(r, &columns)).collect();
                    with_guard(f, &outer, |f| {
                        f.line(&format!("{} = {};", name, value));
                        with_guard(f, &inner, |f| self.emit_inner(f, node, &inner_strides));
                    });
                }
                None => {
                    let header = loop_header(member, col, &name, &columns, &node.stride);
                    with_guard(f, &outer, |f| match header {
                        Header::Single(value) => {
                            f.line(&format!("{} = {};", name, value));
                            self.emit_inner(f, node, &inner_strides);
                        }
                        Header::For(text) => f.block(&text, |f| self.emit_inner(f, node, &inner_strides)),
                    });
                }
            }
        }
    }

    fn emit_inner(&self, f: &mut CodeFormatter, node: &Loop, strides: &[Stride]) {
        for child in node.inner() {
            self.emit(f, child, strides);
        }
    }
}

enum Header {
    /// The level takes a single value
    Single(String),
    /// A `for` header without the brace
    For(String),
}

fn with_guard<F: FnOnce(&mut CodeFormatter)>(f: &mut CodeFormatter, conds: &[String], inner: F) {
    if conds.is_empty() {
        inner(f);
    } else {
        f.block(&format!("if ({})", conds.join(" && ")), inner);
    }
}

/// Condition of a domain, `None` for the universe.
fn guard(domain: &Domain, columns: &[String]) -> Option<String> {
    let members: Vec<String> = domain
        .members()
        .iter()
        .map(|m| m.constraints().iter().map(|r| condition(r, columns)).collect::<Vec<_>>().join(" && "))
        .collect();
    if members.iter().any(String::is_empty) {
        return None;
    }
    match members.len() {
        0 => Some("0".to_string()),
        1 => members.into_iter().next(),
        _ => Some(members.iter().map(|m| format!("({})", m)).collect::<Vec<_>>().join(" || ")),
    }
}

/// A row as a C comparison, positive terms on the left.
fn condition(row: &Constraint, columns: &[String]) -> String {
    let dim = row.expr.dim();
    let mut left = AffineExpr::zero(dim);
    let mut right = AffineExpr::constant(-&row.expr.constant, dim);
    for (i, c) in row.expr.coeffs.iter().enumerate() {
        if c.is_positive() {
            left.coeffs[i] = c.clone();
        } else if c.is_negative() {
            right.coeffs[i] = -c;
        }
    }
    let op = if row.kind == ConstraintKind::Equality { "==" } else { ">=" };
    if left.is_zero() {
        // -right >= 0 reads right <= 0 with the constant moved over.
        let mut lhs = right.clone();
        lhs.constant = Value::zero();
        let rhs = AffineExpr::constant(-&right.constant, dim);
        let op = if row.kind == ConstraintKind::Equality { "==" } else { "<=" };
        return format!("{} {} {}", lhs.to_string_with_names(columns), op, rhs.to_string_with_names(columns));
    }
    format!("{} {} {}", left.to_string_with_names(columns), op, right.to_string_with_names(columns))
}

/// Value of column `col` fixed by `eq`, plus a divisibility condition when
/// its coefficient is not a unit and the enclosing `strides` do not already
/// guarantee it.
fn solve(eq: &Constraint, col: usize, columns: &[String], strides: &[Stride]) -> (String, Option<String>) {
    let a = eq.expr.coeff(col);
    let mut rest = eq.expr.clone();
    rest.set_coeff(col, 0);
    // a x + rest = 0  =>  x = num / |a| with num = -sign(a) rest.
    let num = if a.is_positive() { rest.scale(&-Value::one()) } else { rest };
    let text = num.to_string_with_names(columns);
    let magnitude = a.abs();
    if magnitude.is_one() {
        return (text, None);
    }
    let atom = parenthesize(&text);
    let check = if divisible_by_strides(&num, &magnitude, strides) {
        None
    } else {
        Some(format!("{}%{} == 0", atom, magnitude))
    };
    (format!("{}/{}", atom, magnitude), check)
}

/// True when every point on the lattices of the enclosing loops makes `num`
/// a multiple of `m`. Columns past `strides` must carry multiples of `m`.
fn divisible_by_strides(num: &AffineExpr, m: &Value, strides: &[Stride]) -> bool {
    let mut residue = num.constant.clone();
    for (col, c) in num.coeffs.iter().enumerate() {
        if c.is_multiple_of(m) {
            continue;
        }
        match strides.get(col) {
            Some(s) if !s.is_unit() && (c * &s.step).is_multiple_of(m) => residue += c * &s.offset,
            _ => return false,
        }
    }
    residue.is_multiple_of(m)
}

fn loop_header(member: &Polyhedron, col: usize, name: &str, columns: &[String], stride: &Stride) -> Header {
    let mut lowers: Vec<(String, Option<Value>)> = Vec::new();
    let mut uppers: Vec<String> = Vec::new();
    for row in member.constraints() {
        let a = row.expr.coeff(col);
        if a.is_zero() {
            continue;
        }
        let mut rest = row.expr.clone();
        rest.set_coeff(col, 0);
        if a.is_positive() {
            // x >= ceil(-rest / a)
            let num = rest.scale(&-Value::one());
            let exact = if num.is_constant() { num_constant_ceil(&num.constant, &a) } else { None };
            lowers.push((bound_text(&num, &a, "ceild", columns), exact));
        } else {
            // x <= floor(rest / -a)
            uppers.push(bound_text(&rest, &-a, "floord", columns));
        }
    }

    let lower = if stride.is_unit() {
        fold("max", lowers.iter().map(|(t, _)| t.clone()).collect())
    } else if let [(_, Some(lo))] = lowers.as_slice() {
        Some(stride.first_from(lo).to_string())
    } else {
        fold("max", lowers.iter().map(|(t, _)| t.clone()).collect()).map(|lb| {
            let shifted = if stride.offset.is_zero() { lb } else { format!("{}-{}", lb, stride.offset) };
            let base = format!("{}*ceild({},{})", stride.step, shifted, stride.step);
            if stride.offset.is_zero() { base } else { format!("{}+{}", base, stride.offset) }
        })
    };
    let upper = fold("min", uppers);

    if let (Some(lo), Some(hi)) = (&lower, &upper) {
        if lo == hi {
            return Header::Single(lo.clone());
        }
    }
    let init = lower.map(|lo| format!("{}={}", name, lo)).unwrap_or_default();
    let test = upper.map(|hi| format!("{}<={}", name, hi)).unwrap_or_default();
    let step = if stride.is_unit() { format!("{}++", name) } else { format!("{}+={}", name, stride.step) };
    Header::For(format!("for ({};{};{})", init, test, step))
}

fn num_constant_ceil(num: &Value, a: &Value) -> Option<Value> {
    crate::polyhedral::value::ceil_div(num, a).ok()
}

/// `num` for a unit divisor, `ceild(num,d)`/`floord(num,d)` otherwise.
fn bound_text(num: &AffineExpr, divisor: &Value, rounding: &str, columns: &[String]) -> String {
    if num.is_constant() && !divisor.is_one() {
        let rounded = if rounding == "ceild" {
            crate::polyhedral::value::ceil_div(&num.constant, divisor)
        } else {
            crate::polyhedral::value::floor_div(&num.constant, divisor)
        };
        if let Ok(v) = rounded {
            return v.to_string();
        }
    }
    let text = num.to_string_with_names(columns);
    if divisor.is_one() {
        text
    } else {
        format!("{}({},{})", rounding, text, divisor)
    }
}

/// `max(max(a,b),c)` style nesting.
fn fold(op: &str, items: Vec<String>) -> Option<String> {
    let mut iter = items.into_iter();
    let first = iter.next()?;
    Some(iter.fold(first, |acc, next| format!("{}({},{})", op, acc, next)))
}

fn parenthesize(text: &str) -> String {
    if text.chars().skip(1).any(|c| c == '+' || c == '-') {
        format!("({})", text)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::program::ProgramInput;
    use crate::GenerationOptions;
    use pretty_assertions::assert_eq;

    fn square(n: i64) -> Domain {
        Domain::from_constraints(
            2,
            vec![
                Constraint::lower_bound(0, 0, 2),
                Constraint::upper_bound(0, n, 2),
                Constraint::lower_bound(1, 0, 2),
                Constraint::upper_bound(1, n, 2),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_square_loop_nest() {
        let input = ProgramInput::new(Domain::universe(0)).with_statement(square(9));
        let program = Program::build(&input, &GenerationOptions::default()).unwrap();
        let code = CCodeGen::new(&program).generate();
        let expected = "\
for (i=0;i<=9;i++) {
  for (j=0;j<=9;j++) {
    S1(i,j);
  }
}
";
        assert_eq!(code, expected);
    }

    #[test]
    fn test_parametric_bounds() {
        // { [i] : 0 <= i <= M - 1 } with M >= 1
        let context = Domain::from_constraints(1, vec![Constraint::lower_bound(0, 1, 1)]).unwrap();
        let domain = Domain::from_constraints(
            2,
            vec![
                Constraint::lower_bound(0, 0, 2),
                Constraint::from_i64(ConstraintKind::Inequality, &[-1, 1], -1),
            ],
        )
        .unwrap();
        let input = ProgramInput::new(context).with_statement(domain);
        let program = Program::build(&input, &GenerationOptions::default()).unwrap();
        let code = CCodeGen::new(&program).generate();
        assert_eq!(code, "for (i=0;i<=M-1;i++) {\n  S1(i);\n}\n");
    }

    #[test]
    fn test_conditions() {
        let columns = vec!["i".to_string(), "M".to_string()];
        let ge = Constraint::from_i64(ConstraintKind::Inequality, &[1, 0], -5);
        assert_eq!(condition(&ge, &columns), "i >= 5");
        let le = Constraint::from_i64(ConstraintKind::Inequality, &[-1, 0], 9);
        assert_eq!(condition(&le, &columns), "i <= 9");
        let eq = Constraint::from_i64(ConstraintKind::Equality, &[1, -1], 0);
        assert_eq!(condition(&eq, &columns), "i == M");
    }

    #[test]
    fn test_strided_level_assignment() {
        let domain = Domain::from_constraints(
            2,
            vec![
                Constraint::from_i64(ConstraintKind::Equality, &[1, -2], 0),
                Constraint::lower_bound(0, 0, 2),
                Constraint::upper_bound(0, 10, 2),
            ],
        )
        .unwrap();
        let input = ProgramInput::new(Domain::universe(0)).with_statement(domain);
        let program = Program::build(&input, &GenerationOptions::default()).unwrap();
        let code = CCodeGen::new(&program).generate();
        assert!(code.contains("i+=2"), "{}", code);
        assert!(code.contains("j = i/2;"), "{}", code);
        assert!(!code.contains("i%2"), "{}", code);
        assert!(code.contains("S1(i,j);"), "{}", code);
    }

    #[test]
    fn test_stride_implies_divisibility() {
        // i = 2j + 1 with 1 <= i <= 11: the loop on i already steps over odd values.
        let domain = Domain::from_constraints(
            2,
            vec![
                Constraint::from_i64(ConstraintKind::Equality, &[1, -2], -1),
                Constraint::lower_bound(0, 1, 2),
                Constraint::upper_bound(0, 11, 2),
            ],
        )
        .unwrap();
        let input = ProgramInput::new(Domain::universe(0)).with_statement(domain);
        let program = Program::build(&input, &GenerationOptions::default()).unwrap();
        let code = CCodeGen::new(&program).generate();
        assert!(code.contains("i+=2"), "{}", code);
        assert!(code.contains("j = (i-1)/2;"), "{}", code);
        assert!(!code.contains('%'), "{}", code);
    }

    #[test]
    fn test_divisible_by_strides() {
        let two = Value::from(2);
        let odd = Stride { step: two.clone(), offset: Value::one() };
        // i - 1 over i = 1 (mod 2)
        let num = AffineExpr::from_i64(&[1, 0], -1);
        assert!(divisible_by_strides(&num, &two, &[odd.clone()]));
        assert!(!divisible_by_strides(&num, &two, &[Stride::default()]));
        assert!(!divisible_by_strides(&AffineExpr::from_i64(&[1, 0], 0), &two, &[odd.clone()]));
        // A parameter column with an odd coefficient is never covered.
        assert!(!divisible_by_strides(&AffineExpr::from_i64(&[0, 1], 0), &two, &[odd]));
        assert!(divisible_by_strides(&AffineExpr::from_i64(&[0, 4], 2), &two, &[]));
    }

    #[test]
    fn test_compilable_preamble() {
        let context = Domain::from_constraints(1, vec![Constraint::lower_bound(0, 1, 1)]).unwrap();
        let domain = Domain::from_constraints(
            2,
            vec![Constraint::lower_bound(0, 0, 2), Constraint::from_i64(ConstraintKind::Inequality, &[-1, 1], -1)],
        )
        .unwrap();
        let input = ProgramInput::new(context).with_statement(domain);
        let program = Program::build(&input, &GenerationOptions::default()).unwrap();
        let code = CCodeGen::new(&program).compilable(Some(8)).with_source("loop.scan").generate();
        let expected_head = "/* Generated from loop.scan by polyscan ";
        assert!(code.starts_with(expected_head), "{}", code);
        for line in [
            "#define PARVAL1 8",
            "#define floord(n,d) (((n)<0) ? -((-(n)+(d)-1)/(d)) : (n)/(d))",
            "#define max(x,y)    ((x) > (y) ? (x) : (y))",
            "#define S1(i) {total++; printf(\"S1 %d\\n\",i);}",
            "int main() {",
            "  int i ;",
            "  int M=PARVAL1;",
            "  int total=0;",
            "  for (i=0;i<=M-1;i++) {",
            "    S1(i);",
            "  printf(\"Number of integral points: %d.\\n\",total) ;",
        ] {
            assert!(code.lines().any(|l| l == line), "missing {:?} in\n{}", line, code);
        }
        assert!(code.ends_with("  return 0 ;\n}\n"));
        assert!(!code.lines().any(|l| !l.is_empty() && l.trim().is_empty()));
    }

    #[test]
    fn test_source_comment_follows_language() {
        let input = ProgramInput::new(Domain::universe(0)).with_statement(square(1));
        let fortran = Program::build(&input, &GenerationOptions::default().language(Language::Fortran)).unwrap();
        let code = CCodeGen::new(&fortran).with_source("sq.scan").compilable(Some(1)).generate();
        assert!(code.starts_with("! Generated from sq.scan by polyscan "), "{}", code);
        assert!(!code.contains("int main"));
    }

    #[test]
    fn test_fold() {
        assert_eq!(fold("max", vec!["a".into(), "b".into(), "c".into()]).unwrap(), "max(max(a,b),c)");
        assert_eq!(fold("min", Vec::new()), None);
    }
}
