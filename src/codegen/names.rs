//! Dimension names used by the printers.

use serde::{Serialize, Deserialize};

/// First generated parameter name.
pub const FIRST_PARAMETER: char = 'M';
/// First generated iterator name.
pub const FIRST_ITERATOR: char = 'i';
/// Prefix of generated scattering names.
pub const SCATTERING_PREFIX: &str = "c";

/// Names of scalar, scattering, iterator and parameter dimensions.
///
/// Shared through `Arc` between a program and its printers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Names {
    /// Scalar scattering dimensions (removed from the loop nest)
    pub scalars: Vec<String>,
    /// Scattering dimensions
    pub scattering: Vec<String>,
    /// Statement iterators, shared by depth
    pub iterators: Vec<String>,
    /// Parameters
    pub parameters: Vec<String>,
}

impl Names {
    /// Generated names for the given counts.
    pub fn generate(nb_scattering: usize, nb_iterators: usize, nb_parameters: usize) -> Self {
        Self {
            scalars: Vec::new(),
            scattering: generate_prefixed(SCATTERING_PREFIX, nb_scattering),
            iterators: generate_letters(FIRST_ITERATOR, nb_iterators),
            parameters: generate_letters(FIRST_PARAMETER, nb_parameters),
        }
    }

    /// Move the names of scalar scattering dimensions into `scalars`.
    pub fn scalarize(&self, scaldims: &[bool]) -> Names {
        let mut result = Names {
            scalars: self.scalars.clone(),
            scattering: Vec::with_capacity(self.scattering.len()),
            iterators: self.iterators.clone(),
            parameters: self.parameters.clone(),
        };
        for (i, name) in self.scattering.iter().enumerate() {
            if scaldims.get(i).copied().unwrap_or(false) {
                result.scalars.push(name.clone());
            } else {
                result.scattering.push(name.clone());
            }
        }
        result
    }

    /// Name of loop level `level` (1-based): scattering first, then iterators.
    pub fn level(&self, level: usize) -> String {
        let index = level - 1;
        if index < self.scattering.len() {
            return self.scattering[index].clone();
        }
        let iter = index - self.scattering.len();
        self.iterators
            .get(iter)
            .cloned()
            .unwrap_or_else(|| generated_letter(FIRST_ITERATOR, iter))
    }

    /// Column names of a domain with `depth` loop dimensions and the parameters.
    pub fn columns(&self, depth: usize) -> Vec<String> {
        (1..=depth)
            .map(|l| self.level(l))
            .chain(self.parameters.iter().cloned())
            .collect()
    }
}

/// `first`, `first+1`, ... falling back to `first` plus the index past `z`.
pub fn generate_letters(first: char, count: usize) -> Vec<String> {
    (0..count).map(|i| generated_letter(first, i)).collect()
}

/// `prefix1`, `prefix2`, ...
pub fn generate_prefixed(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{}{}", prefix, i)).collect()
}

fn generated_letter(first: char, index: usize) -> String {
    let last = if first.is_ascii_uppercase() { 'Z' } else { 'z' };
    let code = first as u32 + index as u32;
    match char::from_u32(code) {
        Some(c) if c <= last => c.to_string(),
        _ => format!("{}{}", first, index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names() {
        let names = Names::generate(2, 3, 2);
        assert_eq!(names.scattering, vec!["c1", "c2"]);
        assert_eq!(names.iterators, vec!["i", "j", "k"]);
        assert_eq!(names.parameters, vec!["M", "N"]);
    }

    #[test]
    fn test_letters_past_the_alphabet() {
        let names = generate_letters(FIRST_ITERATOR, 20);
        assert_eq!(names[17], "z");
        assert_eq!(names[18], "i18");
        let params = generate_letters(FIRST_PARAMETER, 15);
        assert_eq!(params[13], "Z");
        assert_eq!(params[14], "M14");
    }

    #[test]
    fn test_scalarize_and_levels() {
        let names = Names::generate(3, 1, 1).scalarize(&[true, false, true]);
        assert_eq!(names.scalars, vec!["c1", "c3"]);
        assert_eq!(names.scattering, vec!["c2"]);
        assert_eq!(names.level(1), "c2");
        assert_eq!(names.level(2), "i");
        assert_eq!(names.columns(2), vec!["c2", "i", "M"]);
    }
}
