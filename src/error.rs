//! Error taxonomy for clone assembly and annotation.
//!
//! Every error here is fatal to the run: the input is assumed to be
//! pre-validated, so a violation means corrupt or mismatched data.

use thiserror::Error;

/// Result type alias for clonemark operations
pub type Result<T> = std::result::Result<T, Error>;

/// Violations of the clone/mate data-integrity contract.
#[derive(Error, Debug)]
pub enum IntegrityError {
    /// A clone group had the wrong number of records
    #[error("incorrect number of mappings for clone [{clone}]: expected {expected}, found {found}")]
    MateCount {
        clone: String,
        expected: usize,
        found: usize,
    },

    /// A mate carried two or more reference mappings
    #[error("clone [{clone}] has multiple reference mappings for mate [{mate}]")]
    MultipleMappings { clone: String, mate: usize },

    /// A mate had no sequence and was not a declared single-base read
    #[error("missing read sequence from clone [{clone}], mate [{mate}]")]
    MissingSequence { clone: String, mate: usize },

    /// A repeat mapping group never matched a reference group
    #[error("clone [{clone}] has repeat mappings but no reference mappings")]
    OrphanRepeat { clone: String },

    /// The clone's read group is not in the configured set
    #[error("missing read group [{read_group}] of clone [{clone}]")]
    UnknownReadGroup { clone: String, read_group: String },

    /// A record names a contig absent from the header dictionary
    #[error("record [{record}] references unknown contig [{contig}]")]
    UnknownContig { record: String, contig: String },

    /// The header declared the same contig twice
    #[error("contig [{name}] already exists")]
    DuplicateContig { name: String },
}

/// Malformed input text.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("empty CIGAR on mapped record [{record}]")]
    EmptyCigar { record: String },

    #[error("unrecognized operation '{op}' in CIGAR [{cigar}]")]
    UnknownCigarOp { cigar: String, op: char },

    #[error("malformed CIGAR [{cigar}]")]
    MalformedCigar { cigar: String },

    #[error("did not find contig name and len in @SQ line: {line}")]
    SequenceLine { line: String },

    #[error("line {line_no}: expected at least 11 SAM fields, found {found}")]
    RecordFields { line_no: u64, found: usize },

    #[error("line {line_no}: invalid {field} [{value}]")]
    Field {
        line_no: u64,
        field: &'static str,
        value: String,
    },

    #[error("cannot parse structured read name [{name}]")]
    ReadName { name: String },

    #[error("pairing file line {line_no}: {reason}")]
    PairingLine { line_no: usize, reason: String },
}

/// Top-level error for library operations
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A shared lock was poisoned or the worker pool could not be built
    #[error("worker pool failure: {0}")]
    WorkerPool(String),
}
