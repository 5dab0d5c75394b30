//! Integration tests for the scanning pipeline.

use polyscan::prelude::*;
use polyscan::codegen::block::{BlockArena, BlockId};
use polyscan::codegen::{print_structure, render};
use polyscan::{build, generate_code, read_program};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashSet;

const SQUARE: &str = r#"
# 10x10 square
c

0 2
0

1
1
4 4
1  1  0  0
1 -1  0  9
1  0  1  0
1  0 -1  9
0 0 0
0

0
"#;

fn interval(lo: i64, hi: i64) -> Domain {
    Domain::from_constraints(1, vec![Constraint::lower_bound(0, lo, 1), Constraint::upper_bound(0, hi, 1)])
        .expect("interval")
}

fn rectangle(i: (i64, i64), j: (i64, i64)) -> Polyhedron {
    Polyhedron::from_constraints(
        2,
        vec![
            Constraint::lower_bound(0, i.0, 2),
            Constraint::upper_bound(0, i.1, 2),
            Constraint::lower_bound(1, j.0, 2),
            Constraint::upper_bound(1, j.1, 2),
        ],
    )
    .expect("rectangle")
}

fn statements_of(points: &[(Statement, Vec<i64>)], number: usize) -> Vec<Vec<i64>> {
    points.iter().filter(|(s, _)| s.number == number).map(|(_, c)| c.clone()).collect()
}

#[test]
fn test_square_pipeline() {
    let code = generate_code(SQUARE, &GenerationOptions::default()).expect("Failed to generate");
    assert_eq!(code, "for (i=0;i<=9;i++) {\n  for (j=0;j<=9;j++) {\n    S1(i,j);\n  }\n}\n");

    let input = read_program(SQUARE).expect("Failed to read");
    let program = build(&input, &GenerationOptions::default()).expect("Failed to build");
    assert_eq!(program.loops().len(), 1);
    let outer = &program.loops()[0];
    assert_eq!(outer.level, Some(1));
    assert_eq!(outer.inner().len(), 1);
    assert_eq!(outer.inner()[0].level, Some(2));

    let points = program.points(&[]).expect("Failed to enumerate");
    assert_eq!(points.len(), 100);
    let coords: Vec<Vec<i64>> = points.iter().map(|(_, c)| c.clone()).collect();
    let mut sorted = coords.clone();
    sorted.sort();
    assert_eq!(coords, sorted);
}

#[test]
fn test_split_square_gives_sibling_loops() {
    let domain = Domain::from_members(2, vec![rectangle((0, 4), (0, 9)), rectangle((5, 9), (0, 9))]).unwrap();
    let input = ProgramInput::new(Domain::universe(0)).with_statement(domain);
    let program = Program::build(&input, &GenerationOptions::default()).unwrap();

    assert_eq!(program.loops().len(), 2);
    assert!(program.loops().iter().all(|l| l.level == Some(1)));

    let points = program.points(&[]).unwrap();
    let unique: HashSet<Vec<i64>> = points.iter().map(|(_, c)| c.clone()).collect();
    assert_eq!(points.len(), 100);
    assert_eq!(unique.len(), 100);
    assert!((0..10).all(|i| (0..10).all(|j| unique.contains(&vec![i, j]))));

    // The outer loops cover the projection of the square exactly and do not overlap.
    let ctx = PolyContext::default();
    let first = &program.loops()[0].domain;
    let second = &program.loops()[1].domain;
    let covered = ctx.union(first, second).unwrap();
    let projected = ctx.project(&domain_of_square(), 1, 0).unwrap();
    assert!(ctx.is_empty(&ctx.difference(&projected, &covered).unwrap()).unwrap());
    assert!(ctx.is_empty(&ctx.difference(&covered, &projected).unwrap()).unwrap());
    assert!(ctx.is_empty(&ctx.intersection(first, second).unwrap()).unwrap());
}

fn domain_of_square() -> Domain {
    Domain::from_polyhedron(rectangle((0, 9), (0, 9)))
}

#[test]
fn test_scattering_with_bounded_time_dimension() {
    // Each scattering bounds c and i before fixing c, so the fixing row comes last.
    let at = |k: i64| {
        Domain::from_constraints(
            2,
            vec![
                Constraint::lower_bound(0, 0, 2),
                Constraint::upper_bound(0, 10, 2),
                Constraint::lower_bound(1, 0, 2),
                Constraint::upper_bound(1, 20, 2),
                Constraint::from_i64(ConstraintKind::Equality, &[1, 0], -k),
            ],
        )
        .unwrap()
    };
    let input = ProgramInput::new(Domain::universe(0))
        .with_statement(interval(0, 3))
        .with_statement(interval(0, 3))
        .with_scattering(at(0))
        .with_scattering(at(1));
    for options in [GenerationOptions::default(), GenerationOptions::default().noscalars(true)] {
        let program = Program::build(&input, &options).unwrap();
        let points = program.points(&[]).unwrap();
        assert_eq!(points.len(), 8);
        let numbers: Vec<usize> = points.iter().map(|(s, _)| s.number).collect();
        assert_eq!(numbers, vec![1, 1, 1, 1, 2, 2, 2, 2]);
    }
}

#[test]
fn test_compilable_program_without_separation() {
    let input = ProgramInput::new(Domain::universe(0))
        .with_statement(interval(0, 5))
        .with_statement(interval(3, 8));
    let options = GenerationOptions::default().last_level(0).compilable(1);
    let program = Program::build(&input, &options).unwrap();
    assert_eq!(program.loops().len(), 1);
    assert_eq!(program.points(&[]).unwrap().len(), 12);

    let code = render(&program, Emit::Code).unwrap();
    assert!(code.contains("#define S2(i) {total++; printf(\"S2 %d\\n\",i);}"), "{}", code);
    assert!(code.contains("  for (i=0;i<=8;i++) {\n"), "{}", code);
    assert_eq!(code.matches("for (").count(), 1);
    assert!(code.ends_with("  return 0 ;\n}\n"));
}

#[test]
fn test_parametric_loop() {
    let source = "\
c
1 3
1 1 -1
0
1
1
2 4
1  1 0 0
1 -1 1 -1
0 0 0
0
0
";
    let code = generate_code(source, &GenerationOptions::default()).unwrap();
    assert_eq!(code, "for (i=0;i<=M-1;i++) {\n  S1(i);\n}\n");

    let program = build(&read_program(source).unwrap(), &GenerationOptions::default()).unwrap();
    assert_eq!(program.points(&[5]).unwrap().len(), 5);
    // M = 0 lies outside the context.
    assert!(program.points(&[0]).unwrap().is_empty());
    assert!(matches!(program.points(&[]), Err(PolyError::DimensionMismatch { .. })));
}

#[test]
fn test_overlapping_statements_execute_once() {
    let input = ProgramInput::new(Domain::universe(0))
        .with_statement(interval(0, 5))
        .with_statement(interval(3, 8));
    let program = Program::build(&input, &GenerationOptions::default()).unwrap();
    let points = program.points(&[]).unwrap();

    assert_eq!(statements_of(&points, 1), (0..=5).map(|i| vec![i]).collect::<Vec<_>>());
    assert_eq!(statements_of(&points, 2), (3..=8).map(|i| vec![i]).collect::<Vec<_>>());
    let is: Vec<i64> = points.iter().map(|(_, c)| c[0]).collect();
    assert!(is.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_scattering_interleaves_statements() {
    // S1 at time i, S2 at time j + 2.
    let at = |offset: i64| {
        Domain::from_constraints(2, vec![Constraint::from_i64(ConstraintKind::Equality, &[1, -1], -offset)]).unwrap()
    };
    let input = ProgramInput::new(Domain::universe(0))
        .with_statement(interval(0, 3))
        .with_statement(interval(0, 3))
        .with_scattering(at(0))
        .with_scattering(at(2));
    let program = Program::build(&input, &GenerationOptions::default()).unwrap();
    assert_eq!(program.nb_scattdims(), 1);

    let points = program.points(&[]).unwrap();
    assert_eq!(points.len(), 8);
    let times: Vec<i64> = points.iter().map(|(_, c)| c[0]).collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    for (statement, coords) in &points {
        let offset = if statement.number == 1 { 0 } else { 2 };
        assert_eq!(coords[0], coords[1] + offset);
    }
}

#[test]
fn test_cross_check_agrees_on_scenarios() {
    let overlap = ProgramInput::new(Domain::universe(0))
        .with_statement(interval(0, 5))
        .with_statement(interval(3, 8));
    for input in [read_program(SQUARE).unwrap(), overlap] {
        let dd = Program::build(&input, &GenerationOptions::default()).unwrap();
        let fm = Program::build(&input, &GenerationOptions::default().backend(BackendChoice::FourierMotzkin))
            .unwrap();
        let checked =
            Program::build(&input, &GenerationOptions::default().backend(BackendChoice::CrossCheck)).unwrap();
        let expected = dd.points(&[]).unwrap();
        assert_eq!(fm.points(&[]).unwrap(), expected);
        assert_eq!(checked.points(&[]).unwrap(), expected);
    }
}

#[test]
fn test_unbounded_level_fails_enumeration() {
    let domain = Domain::from_constraints(1, vec![Constraint::lower_bound(0, 0, 1)]).unwrap();
    let input = ProgramInput::new(Domain::universe(0)).with_statement(domain);
    let program = Program::build(&input, &GenerationOptions::default()).unwrap();
    assert!(matches!(program.points(&[]), Err(PolyError::Unbounded { level: 1 })));
}

#[test]
fn test_renderers() {
    let input = read_program(SQUARE).unwrap();
    let program = Program::build(&input, &GenerationOptions::default()).unwrap();

    let structure = print_structure(&program);
    assert!(structure.starts_with("+-- Program\n"));
    assert!(structure.contains("+-- Loop i (level 1)"));
    assert!(structure.contains("+-- Loop j (level 2)"));

    let json: serde_json::Value = serde_json::from_str(&render(&program, Emit::Json).unwrap()).unwrap();
    assert_eq!(json["language"], "C");
    assert_eq!(json["loops"].as_array().map(|l| l.len()), Some(1));

    assert!(render(&program, Emit::Input).is_err());
}

#[test]
fn test_reader_writer_round_trip() {
    let input = read_program(SQUARE).unwrap();
    let text = write_program(&input);
    assert_eq!(read_program(&text).unwrap(), input);
}

#[test]
fn test_image_preimage_round_trip() {
    let ctx = PolyContext::default();
    let domain = Domain::from_polyhedron(rectangle((0, 3), (1, 4)));
    // Skew (i, j) -> (i + j, j).
    let skew = AffineMap::from_outputs(2, vec![AffineExpr::from_i64(&[1, 1], 0), AffineExpr::from_i64(&[0, 1], 0)])
        .unwrap();
    let image = ctx.image(&domain, &skew).unwrap();
    assert!(image.contains_i64(&[7, 4]));
    assert!(!image.contains_i64(&[0, 1]));

    let back = ctx.preimage(&image, &skew).unwrap();
    assert!(ctx.equivalent(&back, &domain).unwrap());
    let inverse = skew.inverse().unwrap();
    assert!(ctx.equivalent(&ctx.image(&image, &inverse).unwrap(), &domain).unwrap());
}

#[test]
fn test_convex_hull_contains_union() {
    let ctx = PolyContext::default();
    let union = ctx.union(&interval(0, 2), &interval(5, 7)).unwrap();
    let hull = ctx.convex_hull(&union).unwrap();
    assert!(ctx.is_subset(&union, &hull).unwrap());
    assert!(hull.contains_i64(&[3]));
    assert!(!union.contains_i64(&[3]));
}

#[test]
fn test_block_merge_identity_and_associativity() {
    let numbers = |arena: &BlockArena, id: BlockId| {
        let mut list: Vec<usize> = arena.get(id).statements().iter().map(|s| s.number).collect();
        list.sort();
        list
    };

    let mut arena = BlockArena::new();
    let a = arena.alloc(vec![Statement::new(1), Statement::new(2)], 1);
    let empty = arena.alloc(Vec::new(), 1);
    let into = arena.merge(a, empty).unwrap();
    assert_eq!(numbers(&arena, into), vec![1, 2]);

    let mut left = BlockArena::new();
    let (a, b, c) = (
        left.alloc(vec![Statement::new(1)], 1),
        left.alloc(vec![Statement::new(2)], 1),
        left.alloc(vec![Statement::new(3)], 1),
    );
    let ab = left.merge(a, b).unwrap();
    let ab_c = left.merge(ab, c).unwrap();

    let mut right = BlockArena::new();
    let (a, b, c) = (
        right.alloc(vec![Statement::new(1)], 1),
        right.alloc(vec![Statement::new(2)], 1),
        right.alloc(vec![Statement::new(3)], 1),
    );
    let bc = right.merge(b, c).unwrap();
    let a_bc = right.merge(a, bc).unwrap();

    assert_eq!(numbers(&left, ab_c), numbers(&right, a_bc));
    assert_eq!(numbers(&left, ab_c), vec![1, 2, 3]);
}

#[test]
fn test_block_merge_rejects_depth_mismatch() {
    let mut arena = BlockArena::new();
    let a = arena.alloc(vec![Statement::new(1)], 1);
    let b = arena.alloc(vec![Statement::new(2)], 2);
    assert!(matches!(arena.merge(a, b), Err(PolyError::BlockMismatch { .. })));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_difference_and_intersection(a in 0i64..8, la in 0i64..6, b in 0i64..8, lb in 0i64..6) {
        let ctx = PolyContext::default();
        let d1 = interval(a, a + la);
        let d2 = interval(b, b + lb);
        let diff = ctx.difference(&d1, &d2).unwrap();
        let inter = ctx.intersection(&d1, &d2).unwrap();

        prop_assert_eq!(ctx.is_empty(&diff).unwrap(), ctx.is_subset(&d1, &d2).unwrap());
        let rebuilt = ctx.union(&diff, &inter).unwrap();
        prop_assert!(ctx.equivalent(&rebuilt, &d1).unwrap());
        for x in -1..16 {
            prop_assert_eq!(diff.contains_i64(&[x]), d1.contains_i64(&[x]) && !d2.contains_i64(&[x]));
        }
    }

    #[test]
    fn prop_rectangle_difference_and_intersection(
        a in 0i64..5, la in 0i64..4, b in 0i64..5, lb in 0i64..4,
        c in 0i64..5, lc in 0i64..4, d in 0i64..5, ld in 0i64..4,
    ) {
        let ctx = PolyContext::default();
        let r1 = Domain::from_polyhedron(rectangle((a, a + la), (b, b + lb)));
        let r2 = Domain::from_polyhedron(rectangle((c, c + lc), (d, d + ld)));
        let diff = ctx.difference(&r1, &r2).unwrap();
        let inter = ctx.intersection(&r1, &r2).unwrap();

        prop_assert!(ctx.is_empty(&ctx.intersection(&diff, &r2).unwrap()).unwrap());
        prop_assert!(ctx.equivalent(&ctx.union(&diff, &inter).unwrap(), &r1).unwrap());
        for x in -1..10 {
            for y in -1..10 {
                let p = [x, y];
                prop_assert_eq!(diff.contains_i64(&p), r1.contains_i64(&p) && !r2.contains_i64(&p));
                prop_assert_eq!(inter.contains_i64(&p), r1.contains_i64(&p) && r2.contains_i64(&p));
            }
        }
    }

    #[test]
    fn prop_every_point_executed_once(a in 0i64..6, la in 0i64..5, b in 0i64..6, lb in 0i64..5) {
        let input = ProgramInput::new(Domain::universe(0))
            .with_statement(interval(a, a + la))
            .with_statement(interval(b, b + lb));
        let program = Program::build(&input, &GenerationOptions::default()).unwrap();
        let points = program.points(&[]).unwrap();

        let first = statements_of(&points, 1);
        let second = statements_of(&points, 2);
        prop_assert_eq!(first, (a..=a + la).map(|i| vec![i]).collect::<Vec<_>>());
        prop_assert_eq!(second, (b..=b + lb).map(|i| vec![i]).collect::<Vec<_>>());
    }
}
