//! Generator form of a convex polyhedron.
//!
//! A polyhedron is the set `conv(points) + cone(rays) + span(lines)`. Points
//! carry a positive common divisor so that rational vertices stay exact.

use num_integer::Integer;
use num_traits::{Signed, Zero};
use serde::{Serialize, Deserialize};

use crate::polyhedral::map::AffineMap;
use crate::polyhedral::value::Value;

/// A rational point `coords / divisor`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Numerators
    pub coords: Vec<Value>,
    /// Positive denominator
    pub divisor: Value,
}

impl Point {
    /// True when every coordinate is an integer.
    pub fn is_integral(&self) -> bool {
        self.coords.iter().all(|c| c.is_multiple_of(&self.divisor))
    }
}

/// Points, rays and lines spanning a polyhedron.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorSystem {
    /// Ambient dimension
    pub dim: usize,
    /// Vertices
    pub points: Vec<Point>,
    /// Extreme rays
    pub rays: Vec<Vec<Value>>,
    /// Lineality directions
    pub lines: Vec<Vec<Value>>,
}

impl GeneratorSystem {
    /// An empty generator system (the empty polyhedron).
    pub fn new(dim: usize) -> Self {
        Self { dim, ..Self::default() }
    }

    /// True when there is no point: the polyhedron is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True when the polyhedron is bounded.
    pub fn is_bounded(&self) -> bool {
        self.rays.is_empty() && self.lines.is_empty()
    }

    /// Split homogeneous cone generators `(x, t)` into points and rays.
    pub fn from_cone(dim: usize, rays: Vec<Vec<Value>>, lines: Vec<Vec<Value>>) -> Self {
        let mut gens = Self::new(dim);
        for mut r in rays {
            let t = r.pop().unwrap_or_else(Value::zero);
            if t.is_positive() {
                gens.points.push(Point { coords: r, divisor: t });
            } else {
                gens.rays.push(r);
            }
        }
        gens.lines = lines
            .into_iter()
            .map(|mut l| {
                l.pop();
                l
            })
            .collect();
        gens
    }

    /// Homogeneous cone generators `(x, t)`: returns `(rays, lines)`.
    pub fn to_cone(&self) -> (Vec<Vec<Value>>, Vec<Vec<Value>>) {
        let mut rays = Vec::with_capacity(self.points.len() + self.rays.len());
        for p in &self.points {
            let mut v = p.coords.clone();
            v.push(p.divisor.clone());
            rays.push(v);
        }
        for r in &self.rays {
            let mut v = r.clone();
            v.push(Value::zero());
            rays.push(v);
        }
        let lines = self
            .lines
            .iter()
            .map(|l| {
                let mut v = l.clone();
                v.push(Value::zero());
                v
            })
            .collect();
        (rays, lines)
    }

    /// Image of every generator under `map`.
    pub fn apply(&self, map: &AffineMap) -> GeneratorSystem {
        let linear = |v: &[Value]| -> Vec<Value> {
            map.outputs
                .iter()
                .map(|e| e.coeffs.iter().zip(v).map(|(a, x)| a * x).sum())
                .collect()
        };
        let points = self
            .points
            .iter()
            .map(|p| {
                let coords = map
                    .outputs
                    .iter()
                    .zip(linear(p.coords.as_slice()))
                    .map(|(e, lin)| lin + &e.constant * &p.divisor)
                    .collect();
                Point { coords, divisor: p.divisor.clone() }
            })
            .collect();
        GeneratorSystem {
            dim: map.n_out(),
            points,
            rays: self.rays.iter().map(|r| linear(r.as_slice())).collect(),
            lines: self.lines.iter().map(|l| linear(l.as_slice())).collect(),
        }
    }

    /// Keep only the listed coordinates.
    pub fn select(&self, columns: &[usize]) -> GeneratorSystem {
        self.apply(&AffineMap::selection(self.dim, columns))
    }

    /// Union of two generator systems (generators of the convex hull).
    pub fn merge(&mut self, other: GeneratorSystem) {
        self.points.extend(other.points);
        self.rays.extend(other.rays);
        self.lines.extend(other.lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::value::int;

    #[test]
    fn test_cone_round_trip() {
        let gens = GeneratorSystem {
            dim: 1,
            points: vec![Point { coords: vec![int(3)], divisor: int(2) }],
            rays: vec![vec![int(1)]],
            lines: vec![],
        };
        let (rays, lines) = gens.to_cone();
        assert_eq!(GeneratorSystem::from_cone(1, rays, lines), gens);
        assert!(!gens.points[0].is_integral());
        assert!(!gens.is_bounded());
    }

    #[test]
    fn test_apply_translates_points_only() {
        let gens = GeneratorSystem {
            dim: 1,
            points: vec![Point { coords: vec![int(1)], divisor: int(1) }],
            rays: vec![vec![int(1)]],
            lines: vec![],
        };
        let shift = AffineMap::from_outputs(
            1,
            vec![crate::polyhedral::expr::AffineExpr::from_i64(&[1], 5)],
        )
        .unwrap();
        let img = gens.apply(&shift);
        assert_eq!(img.points[0].coords, vec![int(6)]);
        assert_eq!(img.rays[0], vec![int(1)]);
    }
}
