//! End-to-end checks of the evaluation and differentiation engine:
//! literal scenarios, algebraic identities, and central-difference
//! validation of the analytic rules.

use gradgraph_core::{Graph, NodeRef};

fn wire(g: &mut Graph, src: NodeRef, dst: NodeRef) {
    g.create_edge(None, src, dst, None).unwrap();
}

#[test]
fn constant_gradient_scenario() {
    // a = 2, b = 3, s = a + b, m = s * a
    let mut g = Graph::new();
    let (a, b, s, m) = {
        let mut f = g.factory(None);
        (f.constant(2.0), f.constant(3.0), f.add(), f.mult())
    };
    wire(&mut g, a, s);
    wire(&mut g, b, s);
    wire(&mut g, s, m);
    wire(&mut g, a, m);

    assert_eq!(g.value(m).unwrap(), 10.0);

    // The terminal caches gradient 1, then the leaves see the chain rule.
    assert_eq!(g.grad(m).unwrap(), 1.0);
    assert_eq!(g.grad(a).unwrap(), 7.0); // s + a
    assert_eq!(g.grad(b).unwrap(), 2.0); // a
}

#[test]
fn sigmoid_derivative_at_zero() {
    let mut g = Graph::new();
    let (x, y) = {
        let mut f = g.factory(None);
        (f.constant(0.0), f.sigmoid())
    };
    wire(&mut g, x, y);

    assert_eq!(g.value(y).unwrap(), 0.5);
    assert_eq!(g.grad(y).unwrap(), 1.0);
    assert_eq!(g.grad(x).unwrap(), 0.25);
}

#[test]
fn cache_invalidation_reaches_intermediates() {
    // t = (a + b) * a; after rewriting a, the cached sum must refresh.
    let mut g = Graph::new();
    let (a, b, s, t) = {
        let mut f = g.factory(None);
        (f.constant(1.0), f.constant(2.0), f.add(), f.mult())
    };
    wire(&mut g, a, s);
    wire(&mut g, b, s);
    wire(&mut g, s, t);
    wire(&mut g, a, t);

    assert_eq!(g.value(t).unwrap(), 3.0);
    assert_eq!(g.value(s).unwrap(), 3.0);

    g.set_constant(a, 4.0).unwrap();
    assert_eq!(g.value(t).unwrap(), 24.0);
    assert_eq!(g.value(s).unwrap(), 6.0);
}

#[test]
fn evaluation_is_bitwise_idempotent() {
    let mut g = Graph::new();
    let (x, e, l) = {
        let mut f = g.factory(None);
        (f.constant(0.7), f.exp(), f.ln())
    };
    wire(&mut g, x, e);
    wire(&mut g, e, l);

    let first = g.value(l).unwrap();
    let second = g.value(l).unwrap();
    assert_eq!(first.to_bits(), second.to_bits());

    // Explicit invalidation recomputes to the same value when nothing
    // upstream changed.
    g.invalidate(l).unwrap();
    let third = g.value(l).unwrap();
    assert_eq!(first, third);
}

#[test]
fn algebraic_identities() {
    let mut g = Graph::new();
    let (x, y, id, unit, single, inner, outer) = {
        let mut f = g.factory(None);
        (
            f.constant(1.25),
            f.constant(4.5),
            f.identity(),
            f.cte_mult(1.0),
            f.add(),
            f.sub(),
            f.sub(),
        )
    };
    g.create_edge(None, x, id, None).unwrap();
    g.create_edge(None, x, unit, None).unwrap();
    g.create_edge(None, x, single, None).unwrap();
    // outer = x - (x - y) == y
    g.create_edge(None, x, inner, Some(0)).unwrap();
    g.create_edge(None, y, inner, Some(1)).unwrap();
    g.create_edge(None, x, outer, Some(0)).unwrap();
    g.create_edge(None, inner, outer, Some(1)).unwrap();

    assert_eq!(g.value(id).unwrap(), 1.25);
    assert_eq!(g.value(unit).unwrap(), 1.25);
    assert_eq!(g.value(single).unwrap(), 1.25);
    assert!((g.value(outer).unwrap() - 4.5).abs() < 1e-12);
}

#[test]
fn cte_power_gradient_matches_central_difference() {
    for p in [2, 3, 4] {
        for step in 0..=6 {
            let x0 = 0.5 + 0.25 * step as f64;
            let mut g = Graph::new();
            let (x, y) = {
                let mut f = g.factory(None);
                (f.constant(x0), f.cte_power(p))
            };
            wire(&mut g, x, y);

            let numeric = g.central_difference(y, x, 1e-6).unwrap();
            let analytic = g.grad(x).unwrap();
            assert!(
                (numeric - analytic).abs() < 1e-5,
                "p={} x={}: numeric {} vs analytic {}",
                p,
                x0,
                numeric,
                analytic
            );
        }
    }
}

#[test]
fn smooth_kinds_match_central_difference() {
    // y = sigmoid(exp(x) / (x + 2)) at a few probe points.
    for step in 0..5 {
        let x0 = -1.0 + 0.6 * step as f64;
        let mut g = Graph::new();
        let (x, two, sum, e, d, s) = {
            let mut f = g.factory(None);
            (
                f.constant(x0),
                f.constant(2.0),
                f.add(),
                f.exp(),
                f.divide(),
                f.sigmoid(),
            )
        };
        wire(&mut g, x, e);
        wire(&mut g, x, sum);
        wire(&mut g, two, sum);
        g.create_edge(None, e, d, Some(0)).unwrap();
        g.create_edge(None, sum, d, Some(1)).unwrap();
        wire(&mut g, d, s);

        let numeric = g.central_difference(s, x, 1e-6).unwrap();
        let analytic = g.grad(x).unwrap();
        assert!(
            (numeric - analytic).abs() < 1e-5,
            "x={}: numeric {} vs analytic {}",
            x0,
            numeric,
            analytic
        );
    }
}

#[test]
fn non_finite_values_taint_downstream() {
    let mut g = Graph::new();
    let (x, zero, d, s) = {
        let mut f = g.factory(None);
        (f.constant(1.0), f.constant(0.0), f.divide(), f.sigmoid())
    };
    g.create_edge(None, x, d, Some(0)).unwrap();
    g.create_edge(None, zero, d, Some(1)).unwrap();
    g.create_edge(None, d, s, None).unwrap();

    assert!(g.value(d).unwrap().is_infinite());
    // sigmoid(inf) saturates instead of erroring; the engine never traps.
    assert_eq!(g.value(s).unwrap(), 1.0);
}
