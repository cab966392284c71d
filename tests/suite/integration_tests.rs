//! End-to-end runs of the factorization pass.

use cubek_einsum_chain::chain::extract_chain;
use cubek_einsum_chain::graph::{
    Contraction, ContractionLayout, ElemType, Graph, Op, TensorType, contraction_view,
};
use cubek_einsum_chain::{
    ChainError, ChainFactorizer, ChainGraph, ChainOutcome, ChainProgram, DimSpec, FactorizeConfig,
};
use pretty_assertions::assert_eq;

use super::test_utils::{evaluate_root, random_inputs};

#[test]
fn test_cheap_chain_is_left_alone() {
    let mut program =
        ChainProgram::build_static("ij,jk,kl->il", &[&[10, 20], &[20, 5], &[5, 100]]).unwrap();
    let before = program.graph.to_string();

    let report = ChainFactorizer::default().run(&mut program.graph).unwrap();

    let Some(ChainOutcome::Unchanged { operands, cost }) = report.outcome(program.root) else {
        panic!("expected an unchanged chain");
    };
    assert_eq!(*operands, 3);
    assert_eq!(cost.total, 6000);
    assert!(report.is_noop());
    assert_eq!(program.graph.to_string(), before);
}

#[test]
fn test_single_tensor_is_not_a_chain() {
    let mut program = ChainProgram::build_static("ij->ji", &[&[3, 4]]).unwrap();
    let before = program.graph.to_string();

    let outcome = ChainFactorizer::default()
        .optimize(&mut program.graph, program.root)
        .unwrap();

    assert_eq!(outcome, ChainOutcome::NotAChain);
    assert_eq!(program.graph.to_string(), before);
}

#[test]
fn test_two_tensor_chain_is_unchanged() {
    let mut program = ChainProgram::build_static("ij,jk->ik", &[&[30, 1], &[1, 30]]).unwrap();

    let outcome = ChainFactorizer::default()
        .optimize(&mut program.graph, program.root)
        .unwrap();

    assert!(matches!(outcome, ChainOutcome::Unchanged { operands: 2, .. }));
}

#[test]
fn test_expensive_chain_is_reordered() {
    let mut program =
        ChainProgram::build_static("ij,jk,kl->il", &[&[20, 20], &[20, 20], &[20, 1]]).unwrap();
    let inputs = random_inputs(&program, 7);
    let expected = evaluate_root(&program.graph, program.root, &inputs);

    let report = ChainFactorizer::default().run(&mut program.graph).unwrap();

    assert_eq!(report.num_reordered(), 1);
    let Some(ChainOutcome::Reordered {
        old_cost,
        new_cost,
        new_root,
        ..
    }) = report.outcome(program.root)
    else {
        panic!("expected a reordered chain");
    };
    assert_eq!(old_cost.total, 8400);
    assert_eq!(new_cost.total, 800);

    // Free labels and their layout are preserved.
    let top = program.graph.operands(*new_root).unwrap()[0];
    let view = contraction_view(&program.graph, top).unwrap().unwrap();
    assert_eq!(
        view.result_labels().collect::<Vec<_>>(),
        vec![program.label('i').unwrap(), program.label('l').unwrap()]
    );
    assert_eq!(program.graph.operands(*new_root).unwrap()[1], program.destination);

    let actual = evaluate_root(&program.graph, *new_root, &inputs);
    assert!(actual.approx_eq(&expected, 1e-9));
}

#[test]
fn test_second_run_is_noop() {
    let mut program = ChainProgram::build_static(
        "ab,bc,cd,de->ae",
        &[&[16, 16], &[16, 16], &[16, 16], &[16, 1]],
    )
    .unwrap();
    let factorizer = ChainFactorizer::default();

    let first = factorizer.run(&mut program.graph).unwrap();
    assert_eq!(first.num_reordered(), 1);
    let after_first = program.graph.to_string();

    let second = factorizer.run(&mut program.graph).unwrap();
    assert!(second.is_noop());
    assert!(second.diagnostics.is_empty());
    assert_eq!(program.graph.to_string(), after_first);
}

#[test]
fn test_unresolvable_chain_is_reported_and_skipped() {
    let mut program = ChainProgram::build(
        "ij,jk,kl->il",
        &[
            &[DimSpec::Static(20), DimSpec::Static(20)],
            &[DimSpec::Static(20), DimSpec::Unknown],
            &[DimSpec::Static(20), DimSpec::Static(1)],
        ],
    )
    .unwrap();
    let before = program.graph.to_string();

    let report = ChainFactorizer::default().run(&mut program.graph).unwrap();

    assert!(report.outcomes.is_empty());
    assert_eq!(
        report.diagnostics[0].error,
        ChainError::UnresolvableSize {
            operand: program.inputs[1],
            dim: 1
        }
    );
    assert_eq!(program.graph.to_string(), before);
}

#[test]
fn test_dynamic_dims_with_constant_sizes_are_reordered() {
    let mut program = ChainProgram::build(
        "ij,jk,kl->il",
        &[
            &[DimSpec::Dynamic(20), DimSpec::Static(20)],
            &[DimSpec::Static(20), DimSpec::Dynamic(20)],
            &[DimSpec::Dynamic(20), DimSpec::Static(1)],
        ],
    )
    .unwrap();

    let report = ChainFactorizer::default().run(&mut program.graph).unwrap();

    assert_eq!(report.num_reordered(), 1);
}

#[test]
fn test_shared_intermediate_is_not_erased() {
    let mut program =
        ChainProgram::build_static("ij,jk,kl->il", &[&[20, 20], &[20, 20], &[20, 1]]).unwrap();
    let top = program.graph.operands(program.root).unwrap()[0];
    let inner = program.graph.operands(top).unwrap()[0];
    let ty = program.graph.tensor_type(inner).unwrap().clone();
    let other = program.graph.argument(3, ty);
    let side = program.graph.set(inner, other, 0.0).unwrap();

    let report = ChainFactorizer::default().run(&mut program.graph).unwrap();

    assert!(report.is_noop());
    assert_eq!(report.outcome(side), Some(&ChainOutcome::NotAChain));
    assert!(program.graph.contains(inner));
    assert!(program.graph.contains(program.root));
}

#[test]
fn test_disabled_config_keeps_graph() {
    let mut program =
        ChainProgram::build_static("ij,jk,kl->il", &[&[20, 20], &[20, 20], &[20, 1]]).unwrap();
    let before = program.graph.to_string();

    let report = ChainFactorizer::new(FactorizeConfig::disabled())
        .run(&mut program.graph)
        .unwrap();

    assert_eq!(report.outcome(program.root), Some(&ChainOutcome::Disabled));
    assert_eq!(program.graph.to_string(), before);
}

#[test]
fn test_rewritten_chain_extracts_with_same_free_labels() {
    let mut program =
        ChainProgram::build_static("ij,jk,kl->il", &[&[20, 20], &[20, 20], &[20, 1]]).unwrap();
    let original = extract_chain(&program.graph, program.root).unwrap().unwrap();
    let free: Vec<_> = original
        .chain
        .free
        .iter()
        .map(|&id| original.labels.value(id).unwrap())
        .collect();

    let outcome = ChainFactorizer::default()
        .optimize(&mut program.graph, program.root)
        .unwrap();
    let ChainOutcome::Reordered { new_root, .. } = outcome else {
        panic!("expected a reordered chain");
    };

    let rewritten = extract_chain(&program.graph, new_root).unwrap().unwrap();
    let rewritten_free: Vec<_> = rewritten
        .chain
        .free
        .iter()
        .map(|&id| rewritten.labels.value(id).unwrap())
        .collect();
    assert_eq!(rewritten_free, free);
    assert_eq!(rewritten.chain.len(), 3);
}

#[test]
fn test_non_tensor_operand_fails_without_rewrite() {
    let mut graph = Graph::new();
    let [i, j, k, l] = ["i", "j", "k", "l"].map(|name| graph.label(name));
    let a = graph.argument(0, TensorType::with_static_shape(&[2, 3], ElemType::F32));
    let constant = graph.constant(3);
    let inner_layout = ContractionLayout::new([0, 1], [1, 2], [0, 2]);
    let inner = graph
        .add(
            Op::Contract(Contraction::new(
                inner_layout,
                TensorType::with_static_shape(&[2, 4], ElemType::F32),
            )),
            &[a, constant, i, j, k],
        )
        .unwrap();
    let b = graph.argument(1, TensorType::with_static_shape(&[4, 5], ElemType::F32));
    let result = TensorType::with_static_shape(&[2, 5], ElemType::F32);
    let top = graph
        .contract(
            inner,
            b,
            &[i, k, l],
            Contraction::new(ContractionLayout::new([0, 1], [1, 2], [0, 2]), result.clone()),
        )
        .unwrap();
    let destination = graph.argument(2, result);
    let root = graph.set(top, destination, 0.0).unwrap();
    let before = graph.to_string();

    let err = ChainFactorizer::default()
        .optimize(&mut graph, root)
        .unwrap_err();

    assert_eq!(err, ChainError::NotATensor { node: constant });
    assert!(err.is_recoverable());
    assert_eq!(graph.to_string(), before);
}

#[test]
fn test_consumed_set_node_is_reported_and_kept() {
    let mut program =
        ChainProgram::build_static("ij,jk,kl->il", &[&[20, 20], &[20, 20], &[20, 1]]).unwrap();
    let ty = program.graph.tensor_type(program.destination).unwrap().clone();
    let other = program.graph.argument(3, ty);
    program
        .graph
        .add(Op::Set { beta: 0.0 }, &[program.root, other])
        .unwrap();
    let before = program.graph.to_string();

    let report = ChainFactorizer::default().run(&mut program.graph).unwrap();

    assert!(report.is_noop());
    let diagnostic = report
        .diagnostics
        .iter()
        .find(|d| d.root == program.root)
        .expect("diagnostic for the consumed set node");
    assert!(matches!(diagnostic.error, ChainError::InvalidChain { .. }));
    assert_eq!(program.graph.to_string(), before);
}
