// Library exports for clonemark
pub mod annotate;
pub mod cigar;
pub mod clone_builder;
pub mod contig;
pub mod error;
pub mod flags;
pub mod mapping;
pub mod naming;
pub mod pairing;
pub mod sam;
pub mod scheduler;

pub use error::{Error, Result};
