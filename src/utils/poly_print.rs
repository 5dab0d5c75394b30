//! Human-readable printing of domains and program inputs.

use pretty::{DocAllocator, DocBuilder};

use crate::codegen::names::{self, FIRST_ITERATOR, FIRST_PARAMETER, SCATTERING_PREFIX};
use crate::codegen::program::ProgramInput;
use crate::polyhedral::Domain;
use crate::utils::pretty::{CodeFormatter, PrettyPrint, DEFAULT_WIDTH};

/// A domain together with the names of its dimensions.
pub struct NamedDomain<'d> {
    domain: &'d Domain,
    names: &'d [String],
}

impl<'d> NamedDomain<'d> {
    /// Pair a domain with its column names.
    pub fn new(domain: &'d Domain, names: &'d [String]) -> Self {
        Self { domain, names }
    }
}

impl PrettyPrint for NamedDomain<'_> {
    /// `{ [i, j] : rows or rows }`, breaking between rows when too wide.
    fn to_doc<'a, D: DocAllocator<'a>>(&self, allocator: &'a D) -> DocBuilder<'a, D> {
        let header = allocator.text(format!("{{ [{}] :", self.names.join(", ")));
        let mut body = allocator.nil();
        if self.domain.members().is_empty() {
            body = body.append(allocator.text("false"));
        }
        for (k, member) in self.domain.members().iter().enumerate() {
            if k > 0 {
                body = body.append(allocator.line()).append(allocator.text("or "));
            }
            let rows = member.to_system().constraints;
            let mut member_doc = allocator.text("(");
            if rows.is_empty() {
                member_doc = member_doc.append(allocator.text("true"));
            }
            for (i, row) in rows.iter().enumerate() {
                if i > 0 {
                    member_doc = member_doc.append(allocator.text(" and")).append(allocator.line());
                }
                member_doc = member_doc.append(allocator.text(row.to_string_with_names(self.names)));
            }
            body = body.append(member_doc.append(allocator.text(")")).nest(1).group());
        }
        header
            .append(allocator.line().append(body).nest(2))
            .append(allocator.line())
            .append(allocator.text("}"))
            .group()
    }
}

/// Writes a program input section by section, one level of indentation per nesting.
#[derive(Debug, Clone)]
pub struct PolyPrinter {
    out: CodeFormatter,
    depth: usize,
}

impl PolyPrinter {
    /// Empty printer.
    pub fn new() -> Self {
        Self { out: CodeFormatter::new("  "), depth: 0 }
    }

    /// Everything printed so far.
    pub fn take_output(self) -> String {
        self.out.finish()
    }

    /// Emit `label` followed by `domain`, wrapped to fit the remaining width.
    pub fn print_domain(&mut self, label: &str, domain: &Domain, names: &[String]) {
        let width = DEFAULT_WIDTH.saturating_sub(2 * self.depth + label.len()).max(20);
        let text = NamedDomain::new(domain, names).render(width);
        self.out.line(&format!("{}{}", label, text));
    }

    fn deeper<F: FnOnce(&mut Self)>(&mut self, f: F) {
        self.out.indent();
        self.depth += 1;
        f(self);
        self.depth -= 1;
        self.out.dedent();
    }

    /// Print every section of a program input.
    pub fn print_input(&mut self, input: &ProgramInput) {
        let nb_par = input.nb_parameters();
        let parameters = input
            .parameter_names
            .clone()
            .unwrap_or_else(|| names::generate_letters(FIRST_PARAMETER, nb_par));
        self.out.line(&format!("Language: {}", input.language));
        self.print_domain("Context: ", &input.context, &parameters);
        self.out.line(&format!("Statements ({}):", input.statements.len()));

        self.deeper(|p| {
            for (i, domain) in input.statements.iter().enumerate() {
                let depth = domain.dim().saturating_sub(nb_par);
                let mut columns = complete(input.iterator_names.as_deref(), depth, |n| {
                    names::generate_letters(FIRST_ITERATOR, n)
                });
                columns.extend(parameters.iter().cloned());
                p.print_domain(&format!("S{}: ", i + 1), domain, &columns);

                if let Some(scattering) = input.scatterings.get(i) {
                    let nb_scatt = scattering.dim().saturating_sub(domain.dim());
                    let mut scatt_columns = complete(input.scattering_names.as_deref(), nb_scatt, |n| {
                        names::generate_prefixed(SCATTERING_PREFIX, n)
                    });
                    scatt_columns.extend(columns);
                    p.deeper(|p| p.print_domain("scattering: ", scattering, &scatt_columns));
                }
            }
        });
    }
}

impl Default for PolyPrinter {
    fn default() -> Self {
        Self::new()
    }
}

/// The first `count` user names, padded with generated ones.
fn complete(given: Option<&[String]>, count: usize, generate: impl Fn(usize) -> Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = given.unwrap_or(&[]).iter().take(count).cloned().collect();
    let have = out.len();
    out.extend(generate(count).into_iter().skip(have));
    out
}

/// Render a domain on one line if it fits.
pub fn print_domain(domain: &Domain, names: &[String]) -> String {
    NamedDomain::new(domain, names).render(DEFAULT_WIDTH)
}

/// Print a program input to a string.
pub fn print_input(input: &ProgramInput) -> String {
    let mut printer = PolyPrinter::new();
    printer.print_input(input);
    printer.take_output()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::Constraint;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_print_domain() {
        let domain =
            Domain::from_constraints(1, vec![Constraint::lower_bound(0, 0, 1), Constraint::upper_bound(0, 9, 1)])
                .unwrap();
        let text = print_domain(&domain, &names(&["i"]));
        assert_eq!(text, "{ [i] : (i >= 0 and -i+9 >= 0) }");
        assert_eq!(print_domain(&Domain::empty(1), &names(&["i"])), "{ [i] : false }");
    }

    #[test]
    fn test_long_domain_breaks() {
        let rows: Vec<Constraint> = (0..8).map(|k| Constraint::lower_bound(k, 0, 8)).collect();
        let domain = Domain::from_constraints(8, rows).unwrap();
        let columns: Vec<String> = (0..8).map(|k| format!("iterator{}", k)).collect();
        let text = NamedDomain::new(&domain, &columns).render(40);
        assert!(text.lines().count() > 1);
        assert!(text.starts_with("{ [iterator0"));
    }

    #[test]
    fn test_print_input() {
        let domain =
            Domain::from_constraints(1, vec![Constraint::lower_bound(0, 0, 1), Constraint::upper_bound(0, 3, 1)])
                .unwrap();
        let input = ProgramInput::new(Domain::universe(0)).with_statement(domain);
        let text = print_input(&input);
        assert!(text.contains("Statements (1):"));
        assert!(text.contains("  S1: { [i] : (i >= 0 and -i+3 >= 0) }"));
    }
}
