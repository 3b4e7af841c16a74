use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::Tensor;
use nanospec_core::{
    DopantSpec, GraphBuilder, HeteroBatch, HeteroGraph, NanoSpecError, NanoparticleDescription,
    ReadoutConfig, RepresentationConfig,
};
use nanospec_models::ops::to_vec;
use nanospec_models::{HeteroInputs, SpectrumModel};

type B = NdArray<f32>;
type AD = Autodiff<B>;

fn build(radii: &[f32], dopants: Vec<DopantSpec>) -> HeteroGraph {
    GraphBuilder::default()
        .build(&NanoparticleDescription::from_radii(radii, dopants))
        .unwrap()
}

fn two_shell() -> HeteroGraph {
    build(
        &[10.0, 20.0],
        vec![
            DopantSpec::new(0, 0.02, "Yb"),
            DopantSpec::new(0, 0.01, "Er"),
            DopantSpec::new(1, 0.05, "Yb"),
        ],
    )
}

fn three_shell() -> HeteroGraph {
    build(
        &[4.0, 7.5, 12.0],
        vec![
            DopantSpec::new(0, 0.3, "Yb"),
            DopantSpec::new(0, 0.02, "Er"),
            DopantSpec::new(1, 0.1, "Nd"),
            DopantSpec::new(2, 0.2, "Yb"),
            DopantSpec::new(2, 0.05, "Nd"),
        ],
    )
}

/// One dopant per shell: no intraaction nodes at all.
fn one_per_shell() -> HeteroGraph {
    build(
        &[5.0, 9.0, 14.0],
        vec![
            DopantSpec::new(0, 0.2, "Yb"),
            DopantSpec::new(1, 0.02, "Er"),
            DopantSpec::new(2, 0.1, "Nd"),
        ],
    )
}

fn config() -> RepresentationConfig {
    RepresentationConfig::default()
        .with_embed_dim(8)
        .with_inverse_concentration(true)
        .with_interaction_volume_normalization(true)
}

fn model() -> SpectrumModel<B> {
    SpectrumModel::new(&config(), &ReadoutConfig::default().with_n_output(12), &Default::default())
        .unwrap()
}

/// A model moved away from its initialisation by a few Adam steps, so the
/// attention biases are no longer zero. Returned in evaluation mode.
fn trained_model() -> SpectrumModel<B> {
    let device = Default::default();
    let mut model: SpectrumModel<AD> =
        SpectrumModel::new(&config(), &ReadoutConfig::default().with_n_output(12), &device).unwrap();
    let mut optim = AdamConfig::new().init();
    let batch = HeteroBatch::from_graphs(&[two_shell(), three_shell(), one_per_shell()]);
    for _ in 0..3 {
        let inputs = model.prepare(&batch, &device).unwrap();
        let diff = model.forward(&inputs).unwrap().sub_scalar(1.0);
        let loss = (diff.clone() * diff).mean();
        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optim.step(0.05, model, grads);
    }
    model.valid()
}

fn run(model: &SpectrumModel<B>, graphs: &[HeteroGraph]) -> Vec<f32> {
    let inputs = model
        .prepare(&HeteroBatch::from_graphs(graphs), &Default::default())
        .unwrap();
    to_vec(model.forward(&inputs).unwrap())
}

fn assert_close(a: &[f32], b: &[f32], tol: f32) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        assert!((x - y).abs() <= tol * (1.0 + y.abs()), "{x} vs {y}");
    }
}

/// Reverse the interaction node order and the order of every edge list.
fn permuted(graph: &HeteroGraph) -> HeteroGraph {
    let mut g = graph.clone();
    let n = g.interaction.len();
    let new_index = |k: usize| n - 1 - k;
    g.interaction.types.reverse();
    g.interaction.type_pairs.reverse();
    g.interaction.dopant_indices.reverse();
    for d in g.edges.dopant_to_interaction.dst.iter_mut() {
        *d = new_index(*d);
    }
    for s in g.edges.interaction_to_dopant.src.iter_mut() {
        *s = new_index(*s);
    }
    for list in [
        &mut g.edges.dopant_to_interaction,
        &mut g.edges.interaction_to_dopant,
        &mut g.edges.dopant_to_intraaction,
        &mut g.edges.intraaction_to_dopant,
    ] {
        list.src.reverse();
        list.dst.reverse();
    }
    g
}

#[test]
fn test_two_shell_scenario() {
    let graph = two_shell();
    assert_eq!(graph.n_dopants(), 3);
    assert_eq!(graph.interaction.len(), 2);
    assert_eq!(graph.intraaction.len(), 1);

    let out = run(&model(), &[graph]);
    assert_eq!(out.len(), 12);
    assert!(out.iter().all(|v| v.is_finite()));
}

#[test]
fn test_pair_order_invariance() {
    let model = model();
    let graph = three_shell();
    let device = Default::default();
    let a = model.prepare(&HeteroBatch::single(graph.clone()), &device).unwrap();
    let b = model.prepare(&HeteroBatch::single(permuted(&graph)), &device).unwrap();
    let ra = to_vec(model.get_representation(&a).unwrap());
    let rb = to_vec(model.get_representation(&b).unwrap());
    assert_close(&ra, &rb, 1e-4);
}

#[test]
fn test_batch_matches_individual_graphs() {
    let model = model();
    let graphs = vec![two_shell(), three_shell()];
    let batched = run(&model, &graphs);
    let single: Vec<f32> = graphs
        .iter()
        .flat_map(|g| run(&model, std::slice::from_ref(g)))
        .collect();
    assert_close(&batched, &single, 1e-4);
}

#[test]
fn test_batch_consistency_with_and_without_intraaction_nodes() {
    let model = trained_model();
    let lonely = one_per_shell();
    let alone = run(&model, std::slice::from_ref(&lonely));
    let partner = run(&model, &[two_shell()]);

    let batched = run(&model, &[lonely.clone(), two_shell()]);
    assert_close(&batched[..12], &alone, 1e-4);
    assert_close(&batched[12..], &partner, 1e-4);

    let reversed = run(&model, &[two_shell(), lonely]);
    assert_close(&reversed[..12], &partner, 1e-4);
    assert_close(&reversed[12..], &alone, 1e-4);
}

#[test]
fn test_trained_batch_matches_individual_graphs() {
    let model = trained_model();
    let graphs = vec![two_shell(), one_per_shell(), three_shell()];
    let batched = run(&model, &graphs);
    let single: Vec<f32> = graphs
        .iter()
        .flat_map(|g| run(&model, std::slice::from_ref(g)))
        .collect();
    assert_close(&batched, &single, 1e-4);
}

#[test]
fn test_single_shell_and_one_dopant_per_shell() {
    let model = model();
    let single_shell = build(
        &[8.0],
        vec![DopantSpec::new(0, 0.2, "Yb"), DopantSpec::new(0, 0.02, "Er")],
    );
    assert_eq!(single_shell.interaction.len(), 0);
    assert_eq!(single_shell.intraaction.len(), 1);

    let one_per_shell = one_per_shell();
    assert_eq!(one_per_shell.intraaction.len(), 0);

    for graph in [single_shell, one_per_shell] {
        let out = run(&model, &[graph]);
        assert!(out.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn test_zero_width_shell_stays_finite() {
    let model = model();
    let mut graph = build(
        &[6.0, 8.0, 10.0],
        vec![
            DopantSpec::new(0, 0.2, "Yb"),
            DopantSpec::new(1, 0.1, "Er"),
            DopantSpec::new(1, 0.1, "Nd"),
        ],
    );
    // collapse the middle shell to [6, 6]
    graph.radii[2] = 6.0;
    let out = run(&model, &[graph]);
    assert!(out.iter().all(|v| v.is_finite()));
}

#[test]
fn test_representation_is_idempotent() {
    let model = model();
    let inputs = model
        .prepare(&HeteroBatch::from_graphs(&[two_shell(), three_shell()]), &Default::default())
        .unwrap();
    let first = to_vec(model.get_representation(&inputs).unwrap());
    let second = to_vec(model.get_representation(&inputs).unwrap());
    assert_eq!(first, second);
}

#[test]
fn test_shape_mismatch_names_tensor() {
    let model = model();
    let device = Default::default();
    let mut inputs = model.prepare(&HeteroBatch::single(two_shell()), &device).unwrap();
    inputs.dopant_batch = nanospec_models::ops::index_tensor(&[0, 0], &device);
    match model.forward(&inputs) {
        Err(NanoSpecError::ShapeMismatch { tensor, .. }) => assert_eq!(tensor, "dopant_batch"),
        other => panic!("expected shape mismatch, got {:?}", other.map(|t| t.dims())),
    }
}

#[test]
fn test_training_mode_gradients_and_valid_module() {
    let device = Default::default();
    let model: SpectrumModel<AD> =
        SpectrumModel::new(&config(), &ReadoutConfig::default().with_n_output(6), &device).unwrap();
    let batch = HeteroBatch::from_graphs(&[two_shell(), three_shell()]);

    let inputs: HeteroInputs<AD> = model.prepare(&batch, &device).unwrap();
    let out = model.forward(&inputs).unwrap();
    assert_eq!(out.dims(), [2, 6]);
    let loss = (out.clone() * out).mean();
    let grads = loss.backward();
    let loss_value: f32 = loss.into_scalar();
    assert!(loss_value.is_finite());
    drop(grads);

    let eval = model.valid();
    let eval_inputs = eval.prepare(&batch, &device).unwrap();
    let eval_out: Tensor<B, 2> = eval.forward(&eval_inputs).unwrap();
    assert!(to_vec(eval_out).iter().all(|v| v.is_finite()));
}
