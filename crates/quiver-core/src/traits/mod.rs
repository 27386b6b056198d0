//! Collaborator traits consumed by the capability index engine.

mod catalog;
mod graph;
mod similarity;
mod validator;

pub use catalog::*;
pub use graph::*;
pub use similarity::*;
pub use validator::*;
