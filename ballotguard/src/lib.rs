#[macro_use]
extern crate serde;

mod audit;
mod ballot;
mod ballot_box;
mod ceremony;
mod context;
mod decryption;
mod ecies;
mod election;
mod elgamal;
mod encrypt;
mod error;
mod group;
mod guardian;
mod manifest;
mod proofs;
mod shamir;
mod tally;

pub use audit::*;
pub use ballot::*;
pub use ballot_box::*;
pub use ceremony::*;
pub use context::*;
pub use decryption::*;
pub use ecies::*;
pub use election::*;
pub use elgamal::*;
pub use encrypt::*;
pub use error::*;
pub use group::*;
pub use guardian::*;
pub use manifest::*;
pub use proofs::*;
pub use shamir::*;
pub use tally::*;

#[cfg(test)]
mod tests;
