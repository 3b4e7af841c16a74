use nanospec_core::{
    DopantSpec, DopantVocabulary, GraphBuilder, GraphBuilderConfig, HeteroBatch,
    NanoSpecConfig, NanoparticleDescription, NodeType, Relation,
};

/// 10 nm core with 2 % Yb and 1 % Er, 20 nm shell with 5 % Yb.
fn scenario() -> NanoparticleDescription {
    toml::from_str(
        r#"
        [[constraints]]
        radius = 10.0
        [[constraints]]
        radius = 20.0

        [[dopant_specification]]
        shell = 0
        concentration = 0.02
        element = "Yb"
        [[dopant_specification]]
        shell = 0
        concentration = 0.01
        element = "Er"
        [[dopant_specification]]
        shell = 1
        concentration = 0.05
        element = "Yb"
        "#,
    )
    .unwrap()
}

#[test]
fn test_two_shell_scenario_end_to_end() {
    let np = scenario();
    let graph = GraphBuilder::default().build(&np).unwrap();

    assert_eq!(graph.n_nodes(NodeType::Dopant), 3);
    assert_eq!(graph.n_nodes(NodeType::Interaction), 2);
    assert_eq!(graph.n_nodes(NodeType::Intraaction), 1);

    let volumes = graph.shell_volumes();
    let pi = std::f32::consts::PI;
    assert!((volumes[0] - 4.0 / 3.0 * pi * 1000.0).abs() < 1e-1);
    assert!((volumes[1] - 4.0 / 3.0 * pi * 7000.0).abs() < 1.0);

    // every pair node talks to exactly its two dopants, both ways
    for relation in Relation::ALL {
        let expected = 2 * graph.n_nodes(if relation.source() == NodeType::Dopant {
            relation.target()
        } else {
            relation.source()
        });
        assert_eq!(graph.edges.get(relation).len(), expected);
    }
}

#[test]
fn test_custom_vocabulary_from_config() {
    let config = NanoSpecConfig::from_toml_str(
        r#"
        [graph]
        elements = ["Er", "Tm"]
        [representation]
        n_dopant_types = 2
        "#,
    )
    .unwrap();
    let builder = GraphBuilder::new(&config.graph);
    let np = NanoparticleDescription::from_radii(
        &[5.0],
        vec![DopantSpec::new(0, 0.1, "Tm"), DopantSpec::new(0, 0.3, "Er")],
    );
    let graph = builder.build(&np).unwrap();
    assert_eq!(graph.dopant_types, vec![0, 1]);
    assert_eq!(graph.intraaction.types, vec![1]);
    assert!(GraphBuilder::default().build(&np).is_err());

    let default_builder = GraphBuilder::new(&GraphBuilderConfig::default());
    assert_eq!(default_builder.vocabulary(), &DopantVocabulary::default());
}

#[test]
fn test_batch_of_mixed_particles_validates() {
    let builder = GraphBuilder::default();
    let graphs: Vec<_> = [
        scenario(),
        NanoparticleDescription::from_radii(&[3.0], vec![DopantSpec::new(0, 0.5, "Nd")]),
        NanoparticleDescription::from_radii(
            &[2.0, 4.0, 6.0],
            vec![DopantSpec::new(1, 0.1, "Er"), DopantSpec::new(2, 0.2, "Yb")],
        ),
    ]
    .iter()
    .map(|np| builder.build(np).unwrap())
    .collect();

    let batch = HeteroBatch::from_graphs(&graphs);
    batch.validate(3).unwrap();
    assert_eq!(batch.num_graphs, 3);
    assert_eq!(batch.dopant_counts(), vec![3, 1, 2]);
    assert_eq!(batch.graph.n_shells(), 6);
}
