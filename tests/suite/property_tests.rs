//! Property tests over randomly generated chains.

use std::collections::BTreeSet;

use cubek_einsum_chain::chain::extract_chain;
use cubek_einsum_chain::optimization::{
    CostModel, FoldOrder, exhaustive_search, next_permutation, simulate_fold,
};
use cubek_einsum_chain::{ChainFactorizer, ChainGraph, ChainProgram};
use proptest::prelude::*;

use super::test_utils::{evaluate_root, random_inputs};

const ALPHABET: [char; 6] = ['a', 'b', 'c', 'd', 'e', 'f'];

/// A chain over up to six labels, with at least one label per input.
#[derive(Debug, Clone)]
struct ChainCase {
    notation: String,
    shapes: Vec<Vec<u64>>,
}

impl ChainCase {
    fn build(&self) -> ChainProgram {
        let shapes: Vec<&[u64]> = self.shapes.iter().map(Vec::as_slice).collect();
        ChainProgram::build_static(&self.notation, &shapes).unwrap()
    }
}

fn chain_case() -> impl Strategy<Value = ChainCase> {
    let inputs =
        prop::collection::vec(prop::sample::subsequence(ALPHABET.to_vec(), 1..=3), 2..=5);
    let output_mask = prop::collection::vec(any::<bool>(), ALPHABET.len());
    let sizes = prop::collection::vec(1u64..=4, ALPHABET.len());

    (inputs, output_mask, sizes).prop_map(|(inputs, output_mask, sizes)| {
        let used: BTreeSet<char> = inputs.iter().flatten().copied().collect();
        let output: String = ALPHABET
            .iter()
            .zip(&output_mask)
            .filter(|(c, keep)| **keep && used.contains(*c))
            .map(|(c, _)| *c)
            .collect();
        let size_of = |c: &char| sizes[ALPHABET.iter().position(|a| a == c).unwrap_or(0)];

        let subscripts: Vec<String> = inputs.iter().map(|s| s.iter().collect()).collect();
        ChainCase {
            notation: format!("{}->{}", subscripts.join(","), output),
            shapes: inputs
                .iter()
                .map(|s| s.iter().map(size_of).collect())
                .collect(),
        }
    })
}

/// Matrix chains `ab,bc,cd,...` with a vector-like last factor now and then.
fn matrix_chain() -> impl Strategy<Value = ChainCase> {
    prop::collection::vec(1u64..=6, 4..=6).prop_map(|dims| {
        let n = dims.len() - 1;
        let subscripts: Vec<String> = (0..n)
            .map(|k| [ALPHABET[k], ALPHABET[k + 1]].iter().collect())
            .collect();
        ChainCase {
            notation: format!("{}->{}{}", subscripts.join(","), ALPHABET[0], ALPHABET[n]),
            shapes: (0..n).map(|k| vec![dims[k], dims[k + 1]]).collect(),
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every fold order ends with exactly the chain's free labels.
    #[test]
    fn every_order_keeps_free_labels(case in chain_case()) {
        let program = case.build();
        let extracted = extract_chain(&program.graph, program.root).unwrap().unwrap();
        let chain = &extracted.chain;
        let sizes = extracted.labels.sizes().unwrap();
        let free = chain.free_set();

        let mut perm: Vec<usize> = (0..chain.len()).collect();
        loop {
            let plan = simulate_fold(
                &FoldOrder::new(perm.iter().copied()),
                &chain.operands,
                &free,
                &sizes,
                &CostModel::default(),
            );
            let result: BTreeSet<_> = plan.result_labels(&chain.operands).iter().copied().collect();
            prop_assert_eq!(&result, &free);
            if !next_permutation(&mut perm) {
                break;
            }
        }
    }

    /// The search is a pure function of its inputs.
    #[test]
    fn search_is_deterministic(case in chain_case(), weight in 0u64..4) {
        let program = case.build();
        let extracted = extract_chain(&program.graph, program.root).unwrap().unwrap();
        let chain = &extracted.chain;
        let sizes = extracted.labels.sizes().unwrap();
        let model = CostModel::layout_aware(weight);

        let run = || {
            exhaustive_search(&chain.operands, &chain.free_set(), &sizes, &model, None)
                .unwrap()
                .plan
        };
        prop_assert_eq!(run(), run());
    }

    /// The winning order is never more expensive than the current one.
    #[test]
    fn search_never_regresses(case in chain_case()) {
        let program = case.build();
        let extracted = extract_chain(&program.graph, program.root).unwrap().unwrap();
        let chain = &extracted.chain;

        let result = exhaustive_search(
            &chain.operands,
            &chain.free_set(),
            &extracted.labels.sizes().unwrap(),
            &CostModel::default(),
            None,
        )
        .unwrap();
        prop_assert!(result.plan.total <= result.natural_cost);
        prop_assert_eq!(result.is_natural(), result.plan.total == result.natural_cost);
    }

    /// Rewriting preserves the computed values, and a second run is a no-op.
    #[test]
    fn rewrite_preserves_values(
        case in prop_oneof![chain_case(), matrix_chain()],
        seed in any::<u64>(),
    ) {
        let mut program = case.build();
        let inputs = random_inputs(&program, seed);
        let expected = evaluate_root(&program.graph, program.root, &inputs);
        let factorizer = ChainFactorizer::default();

        let report = factorizer.run(&mut program.graph).unwrap();
        prop_assert!(report.diagnostics.is_empty());
        let roots = program.graph.set_nodes();
        prop_assert_eq!(roots.len(), 1);

        let actual = evaluate_root(&program.graph, roots[0], &inputs);
        prop_assert!(actual.approx_eq(&expected, 1e-9));

        let snapshot = program.graph.to_string();
        let second = factorizer.run(&mut program.graph).unwrap();
        prop_assert!(second.is_noop());
        prop_assert_eq!(program.graph.to_string(), snapshot);
    }
}
