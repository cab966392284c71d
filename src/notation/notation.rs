//! Complete einsum notation representation.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::fmt;

use super::subscript::Subscript;

/// Parsed einsum notation: input subscripts and the output subscript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EinsumNotation {
    inputs: Vec<Subscript>,
    output: Subscript,
}

impl EinsumNotation {
    pub fn new(inputs: Vec<Subscript>, output: Subscript) -> Self {
        Self { inputs, output }
    }

    #[inline]
    pub fn inputs(&self) -> &[Subscript] {
        &self.inputs
    }

    #[inline]
    pub fn output(&self) -> &Subscript {
        &self.output
    }

    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Labels in order of first appearance across inputs.
    pub fn labels(&self) -> Vec<char> {
        let mut seen = BTreeSet::new();
        self.inputs
            .iter()
            .flat_map(Subscript::iter)
            .filter(|&c| seen.insert(c))
            .collect()
    }

    /// Result labels after left-folding inputs `0..=step` together.
    ///
    /// A label survives if the output or any later input still needs it.
    /// After the last input the result is exactly the output subscript.
    pub fn fold_output(&self, step: usize) -> Subscript {
        if step + 1 >= self.inputs.len() {
            return self.output.clone();
        }

        let needed: BTreeSet<char> = self.inputs[step + 1..]
            .iter()
            .flat_map(Subscript::iter)
            .chain(self.output.iter())
            .collect();

        let mut seen = BTreeSet::new();
        Subscript::from_chars(
            self.inputs[..=step]
                .iter()
                .flat_map(Subscript::iter)
                .filter(|c| needed.contains(c))
                .filter(|&c| seen.insert(c)),
        )
    }
}

impl fmt::Display for EinsumNotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, input) in self.inputs.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", input)?;
        }
        write!(f, "->{}", self.output)
    }
}
