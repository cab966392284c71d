//! Einsum notation parser.
//!
//! Parses strings like "ij,jk,kl->il" into structured EinsumNotation.

use alloc::vec::Vec;

use super::notation::EinsumNotation;
use super::subscript::Subscript;
use crate::error::{ChainError, ChainResult};

/// Parses an einsum notation string.
///
/// # Grammar
///
/// ```text
/// einsum      ::= inputs '->' output | inputs
/// inputs      ::= subscript (',' subscript)*
/// output      ::= subscript
/// subscript   ::= index*
/// index       ::= [a-zA-Z]
/// ```
///
/// Every output label must appear in some input. Without `->` the output is
/// inferred: labels appearing exactly once, sorted.
pub fn parse_einsum(notation: &str) -> ChainResult<EinsumNotation> {
    let notation = notation.trim();

    if notation.is_empty() {
        return Err(ChainError::parse("empty notation"));
    }

    let (inputs_str, output_str) = match notation.find("->") {
        Some(arrow_pos) => (&notation[..arrow_pos], Some(&notation[arrow_pos + 2..])),
        None => (notation, None),
    };

    let inputs = inputs_str
        .split(',')
        .map(|s| parse_subscript(s.trim()))
        .collect::<ChainResult<Vec<_>>>()?;

    let output = match output_str {
        Some(out_str) => parse_subscript(out_str.trim())?,
        None => infer_output(&inputs),
    };

    for c in output.iter() {
        if !inputs.iter().any(|input| input.contains(c)) {
            return Err(ChainError::parse(alloc::format!(
                "output index '{}' not found in any input",
                c
            )));
        }
        if output.count(c) > 1 {
            return Err(ChainError::parse(alloc::format!(
                "output index '{}' repeated",
                c
            )));
        }
    }

    Ok(EinsumNotation::new(inputs, output))
}

fn parse_subscript(s: &str) -> ChainResult<Subscript> {
    let mut subscript = Subscript::new();

    for c in s.chars() {
        match c {
            'a'..='z' | 'A'..='Z' => subscript.push(c),
            ' ' | '\t' => continue,
            _ => {
                return Err(ChainError::parse(alloc::format!(
                    "invalid character '{}' in subscript",
                    c
                )));
            }
        }
    }

    Ok(subscript)
}

/// Infers the output subscript (NumPy convention).
fn infer_output(inputs: &[Subscript]) -> Subscript {
    use hashbrown::HashMap;

    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in inputs.iter().flat_map(Subscript::iter) {
        *counts.entry(c).or_insert(0) += 1;
    }

    let mut output_indices: Vec<char> = counts
        .iter()
        .filter(|&(_, count)| *count == 1)
        .map(|(&c, _)| c)
        .collect();
    output_indices.sort();

    Subscript::from_chars(output_indices)
}
