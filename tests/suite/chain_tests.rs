//! Extraction, rebuilding and erasure of contraction chains.

use cubek_einsum_chain::chain::{erase_with_users, extract_chain, plan_rebuild, rebuild_chain};
use cubek_einsum_chain::graph::{Op, contraction_view};
use cubek_einsum_chain::optimization::{CostModel, FoldOrder, simulate_fold};
use cubek_einsum_chain::{ChainError, ChainGraph, ChainProgram, DimSpec};
use pretty_assertions::assert_eq;

#[test]
fn test_extract_records_operands_outermost_first() {
    let program =
        ChainProgram::build_static("ij,jk,kl,lm->im", &[&[2, 3], &[3, 4], &[4, 5], &[5, 6]])
            .unwrap();
    let extracted = extract_chain(&program.graph, program.root).unwrap().unwrap();
    let chain = &extracted.chain;

    let values: Vec<_> = chain.operands.iter().map(|o| o.value).collect();
    let expected: Vec<_> = program.inputs.iter().rev().copied().collect();
    assert_eq!(values, expected);
    assert_eq!(chain.nodes.len(), 3);
    assert_eq!(chain.natural_order(), FoldOrder::new([3, 2, 1, 0]));

    let label = |c| extracted.labels.id_of(program.label(c).unwrap()).unwrap();
    assert_eq!(label('i').index(), 0);
    assert_eq!(label('m').index(), 1);
    assert_eq!(extracted.labels.sizes(), Some(vec![2, 6, 5, 4, 3]));
}

#[test]
fn test_two_operand_chain_is_extracted() {
    let program = ChainProgram::build_static("ij,jk->ik", &[&[2, 3], &[3, 4]]).unwrap();
    let extracted = extract_chain(&program.graph, program.root).unwrap().unwrap();

    assert_eq!(extracted.chain.len(), 2);
    assert_eq!(extracted.chain.free.len(), 2);
}

#[test]
fn test_shared_intermediate_stops_extraction() {
    let mut program =
        ChainProgram::build_static("ij,jk,kl->il", &[&[2, 3], &[3, 4], &[4, 5]]).unwrap();
    let top = program.graph.operands(program.root).unwrap()[0];
    let inner = program.graph.operands(top).unwrap()[0];
    let ty = program.graph.tensor_type(inner).unwrap().clone();
    let other = program.graph.argument(9, ty);
    program.graph.set(inner, other, 0.0).unwrap();

    let extracted = extract_chain(&program.graph, program.root).unwrap().unwrap();
    let values: Vec<_> = extracted.chain.operands.iter().map(|o| o.value).collect();

    assert_eq!(values, vec![program.inputs[2], inner]);
    assert_eq!(extracted.chain.nodes, vec![top]);
}

#[test]
fn test_scaled_contraction_is_a_leaf() {
    let program = ChainProgram::build_static("ij,jk->ik", &[&[2, 3], &[3, 4]]).unwrap();
    let mut graph = program.graph.clone();
    let top = graph.operands(program.root).unwrap()[0];
    let view = contraction_view(&graph, top).unwrap().unwrap();
    let contraction = view.contraction.clone().with_alpha(2.0);
    let (lhs, rhs, labels) = (view.lhs, view.rhs, view.labels.to_vec());
    let scaled = graph.contract(lhs, rhs, &labels, contraction).unwrap();
    let ty = graph.tensor_type(scaled).unwrap().clone();
    let destination = graph.argument(5, ty);
    let root = graph.set(scaled, destination, 0.0).unwrap();

    assert!(extract_chain(&graph, root).unwrap().is_none());
}

#[test]
fn test_dynamic_dim_without_constant_fails() {
    let program = ChainProgram::build(
        "ij,jk,kl->il",
        &[
            &[DimSpec::Unknown, DimSpec::Static(3)],
            &[DimSpec::Static(3), DimSpec::Static(4)],
            &[DimSpec::Static(4), DimSpec::Static(5)],
        ],
    )
    .unwrap();

    let err = extract_chain(&program.graph, program.root).unwrap_err();
    assert_eq!(
        err,
        ChainError::UnresolvableSize {
            operand: program.inputs[0],
            dim: 0
        }
    );
}

#[test]
fn test_rebuild_plan_uses_first_appearance_numbering() {
    let program =
        ChainProgram::build_static("ij,jk,kl->il", &[&[8, 8], &[8, 8], &[8, 1]]).unwrap();
    let extracted = extract_chain(&program.graph, program.root).unwrap().unwrap();
    let chain = &extracted.chain;
    let plan = simulate_fold(
        &FoldOrder::new([1, 0, 2]),
        &chain.operands,
        &chain.free_set(),
        &extracted.labels.sizes().unwrap(),
        &CostModel::default(),
    );

    let rebuild = plan_rebuild(&program.graph, &extracted, &plan).unwrap();
    let label = |c| program.label(c).unwrap();

    assert_eq!(rebuild.first, program.inputs[1]);
    // B(j,k) then C(k,l): touched j k l.
    let first = &rebuild.steps[0];
    assert_eq!(first.rhs, program.inputs[2]);
    assert_eq!(first.labels.to_vec(), vec![label('j'), label('k'), label('l')]);
    assert_eq!(first.contraction.layout.lhs.to_vec(), vec![0, 1]);
    assert_eq!(first.contraction.layout.rhs.to_vec(), vec![1, 2]);
    assert_eq!(first.contraction.layout.out.to_vec(), vec![2, 0]);
    // (l,j) then A(i,j): touched l j i, result (i,l).
    let second = &rebuild.steps[1];
    assert_eq!(second.rhs, program.inputs[0]);
    assert_eq!(second.labels.to_vec(), vec![label('l'), label('j'), label('i')]);
    assert_eq!(second.contraction.layout.out.to_vec(), vec![2, 0]);
}

#[test]
fn test_rebuild_writes_original_destination() {
    let mut program =
        ChainProgram::build_static("ij,jk,kl->il", &[&[8, 8], &[8, 8], &[8, 1]]).unwrap();
    let extracted = extract_chain(&program.graph, program.root).unwrap().unwrap();
    let chain = &extracted.chain;
    let plan = simulate_fold(
        &FoldOrder::new([0, 1, 2]),
        &chain.operands,
        &chain.free_set(),
        &extracted.labels.sizes().unwrap(),
        &CostModel::default(),
    );

    let rebuilt = rebuild_chain(&mut program.graph, &extracted, &plan)
        .unwrap()
        .unwrap();

    assert_eq!(
        program.graph.operands(rebuilt.root).unwrap(),
        &[rebuilt.contractions[1], program.destination]
    );
    assert_eq!(program.graph.set_nodes(), vec![rebuilt.root]);
    for node in &chain.nodes {
        assert!(!program.graph.contains(*node));
    }
    assert_eq!(program.graph.users(program.destination).unwrap(), &[rebuilt.root]);
}

#[test]
fn test_erase_with_users_reaches_the_set_node() {
    let mut program = ChainProgram::build_static("ij,jk->ik", &[&[2, 3], &[3, 4]]).unwrap();
    let top = program.graph.operands(program.root).unwrap()[0];

    let erased = erase_with_users(&mut program.graph, &[top]).unwrap();

    assert_eq!(erased, 2);
    assert!(program.graph.set_nodes().is_empty());
    assert!(
        program
            .graph
            .live_nodes()
            .all(|node| !matches!(program.graph.op(node), Ok(Op::Contract(_))))
    );
}
