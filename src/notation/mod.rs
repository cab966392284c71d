//! Einsum notation used to describe contraction chains.
//!
//! Supports explicit (`ij,jk,kl->il`) and implicit (`ij,jk`) output.

mod notation;
mod parser;
mod subscript;

pub use notation::EinsumNotation;
pub use parser::parse_einsum;
pub use subscript::Subscript;
