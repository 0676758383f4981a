//! End-to-end training scenarios: exact update arithmetic on a trivial
//! network, permutation behaviour of the stochastic optimiser, and
//! teardown of builder sub-graphs.

use std::collections::HashSet;

use gradgraph_core::Graph;
use gradgraph_nn::{
    ActivationKind, BatchOptimizer, DataSet, DataTable, LayerSpec, LossKind, MlpBuilder,
    Optimizer, SgdOptimizer,
};

#[test]
fn mse_on_a_trivial_network() {
    // One identity neuron with bias; dataset {x = 2 -> y = 5}.
    let mut g = Graph::new();
    let mlp = MlpBuilder::new()
        .layer(LayerSpec::new(1, ActivationKind::Identity, true))
        .seed(0)
        .build(&mut g)
        .unwrap();

    // Weight order per neuron: bias first (created with the layer), then
    // the input feed. Fix w = 1, b = 0.
    assert_eq!(mlp.nb_weights(), 2);
    mlp.set_weight(&mut g, 0.0, 0).unwrap();
    mlp.set_weight(&mut g, 1.0, 1).unwrap();

    let mut opt = BatchOptimizer::new(&mut g, &mlp, LossKind::Mse, 0.1, 0.0).unwrap();
    let data = DataSet::new(DataTable::new(1, vec![2.0]), DataTable::new(1, vec![5.0]));
    opt.set_dataset(&mlp, data).unwrap();

    // Predicted = 1*2 + 0*1 = 2, MSE = (5 - 2)^2 / 1 = 9.
    let in_progress = opt.step(&mut g, &mlp).unwrap();
    assert!(!in_progress, "the one-row epoch completes immediately");
    assert_eq!(opt.last_loss(), 9.0);

    // dMSE/dw = -2 (5 - 2) * 2 = -12; update = -0.1 * -12 = 1.2.
    assert!((mlp.weight(&g, 1).unwrap() - 2.2).abs() < 1e-12);
    // dMSE/db = -2 (5 - 2) * 1 = -6; bias weight moves to 0.6.
    assert!((mlp.weight(&g, 0).unwrap() - 0.6).abs() < 1e-12);
}

#[test]
fn sgd_visits_a_fresh_permutation_each_epoch() {
    let mut g = Graph::new();
    let mlp = MlpBuilder::new()
        .layer(LayerSpec::new(1, ActivationKind::Identity, false))
        .seed(0)
        .build(&mut g)
        .unwrap();

    let mut opt = SgdOptimizer::new(&mut g, &mlp, LossKind::Mse, 0.0, 0.0).unwrap();
    opt.reseed(99);
    let data = DataSet::new(
        DataTable::new(1, vec![0.0, 1.0, 2.0, 3.0]),
        DataTable::new(1, vec![0.0, 0.0, 0.0, 0.0]),
    );
    opt.set_dataset(&mlp, data).unwrap();

    let mut visited = Vec::new();
    let mut boundaries = Vec::new();
    for call in 1..=8 {
        visited.push(opt.next_row());
        let in_progress = opt.step(&mut g, &mlp).unwrap();
        if !in_progress {
            boundaries.push(call);
        }
    }

    // The boundary is crossed exactly at calls 4 and 8.
    assert_eq!(boundaries, vec![4, 8]);

    // Each half is a permutation of {0, 1, 2, 3}.
    let first: HashSet<usize> = visited[..4].iter().copied().collect();
    let second: HashSet<usize> = visited[4..].iter().copied().collect();
    assert_eq!(first, (0..4).collect::<HashSet<_>>());
    assert_eq!(second, (0..4).collect::<HashSet<_>>());

    // And every index appears exactly twice overall.
    for i in 0..4 {
        assert_eq!(visited.iter().filter(|&&v| v == i).count(), 2);
    }
}

#[test]
fn seeded_runs_reproduce_their_visiting_order() {
    let data = || {
        DataSet::new(
            DataTable::new(1, vec![0.0, 1.0, 2.0, 3.0, 4.0]),
            DataTable::new(1, vec![0.0; 5]),
        )
    };
    let mut orders = Vec::new();
    for _ in 0..2 {
        let mut g = Graph::new();
        let mlp = MlpBuilder::new()
            .layer(LayerSpec::new(1, ActivationKind::Identity, false))
            .seed(0)
            .build(&mut g)
            .unwrap();
        let mut opt = SgdOptimizer::new(&mut g, &mlp, LossKind::L2, 0.0, 0.0).unwrap();
        opt.reseed(123);
        opt.set_dataset(&mlp, data()).unwrap();
        let mut order = Vec::new();
        for _ in 0..10 {
            order.push(opt.next_row());
            opt.step(&mut g, &mlp).unwrap();
        }
        orders.push(order);
    }
    assert_eq!(orders[0], orders[1]);
}

#[test]
fn layer_teardown_leaves_no_orphans() {
    use gradgraph_nn::Layer;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    let mut g = Graph::new();
    let x = g.factory(None).constant(1.0);
    let nodes_before = g.node_count();
    let edges_before = g.edge_count();

    let mut rng = StdRng::seed_from_u64(6);
    let mut layer: Layer = LayerSpec::new(4, ActivationKind::ReLU, true)
        .build(&mut g, None, &mut rng)
        .unwrap();
    layer.add_input(&mut g, x, &mut rng).unwrap();
    assert!(g.node_count() > nodes_before);

    layer.release(&mut g);
    assert_eq!(g.node_count(), nodes_before);
    assert_eq!(g.edge_count(), edges_before);
    for edge in g.edges() {
        assert!(g.contains(edge.src) && g.contains(edge.dst));
    }
    assert_eq!(g.nb_outputs(x).unwrap(), 0);
}

#[test]
fn deep_network_trains_through_nonlinearities() {
    // A 2-4-1 ReLU/identity net fitting y = x0 + x1 should drive its
    // loss down without any numeric fault.
    let mut g = Graph::new();
    let mlp = MlpBuilder::new()
        .layer(LayerSpec::new(2, ActivationKind::Identity, false))
        .layer(LayerSpec::new(4, ActivationKind::ReLU, true))
        .layer(LayerSpec::new(1, ActivationKind::Identity, true))
        .seed(21)
        .build(&mut g)
        .unwrap();

    let mut opt = SgdOptimizer::new(&mut g, &mlp, LossKind::Mse, 0.01, 0.0).unwrap();
    opt.reseed(21);
    let data = DataSet::new(
        DataTable::new(2, vec![0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0]),
        DataTable::new(1, vec![0.0, 1.0, 1.0, 2.0]),
    );
    opt.set_dataset(&mlp, data).unwrap();

    let mut first_epoch = f64::NAN;
    let mut last_epoch = f64::NAN;
    for epoch in 0..60 {
        let mut sum = 0.0;
        let mut steps = 0;
        loop {
            let in_progress = opt.step(&mut g, &mlp).unwrap();
            sum += opt.last_loss();
            steps += 1;
            if !in_progress {
                break;
            }
        }
        let mean = sum / steps as f64;
        assert!(mean.is_finite(), "epoch {} produced a non-finite loss", epoch);
        if epoch == 0 {
            first_epoch = mean;
        }
        last_epoch = mean;
    }
    assert!(last_epoch <= first_epoch);
}
