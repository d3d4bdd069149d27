/// Reference contig dictionary built from SAM `@SQ` header lines
///
/// The registry is filled once, single-threaded, while the header is read and
/// is only shared by reference afterwards.
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{IntegrityError, ParseError, Result};

/// A named reference sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contig {
    pub name: String,
    pub len: u64,
    /// Insertion order in the header
    pub idx: usize,
}

/// Maps contig names to shared contig handles
#[derive(Debug, Default)]
pub struct ContigRegistry {
    /// All contigs (ID is the index in this vec)
    contigs: Vec<Arc<Contig>>,
    /// Map from name to ID for fast lookup
    name_to_id: HashMap<String, usize>,
}

impl ContigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new contig, rejecting duplicate names
    pub fn add(&mut self, name: &str, len: u64) -> Result<Arc<Contig>> {
        if self.name_to_id.contains_key(name) {
            return Err(IntegrityError::DuplicateContig { name: name.to_string() }.into());
        }
        let idx = self.contigs.len();
        let contig = Arc::new(Contig { name: name.to_string(), len, idx });
        self.contigs.push(Arc::clone(&contig));
        self.name_to_id.insert(name.to_string(), idx);
        log::debug!("added contig [{name}] of length [{len}]");
        Ok(contig)
    }

    /// Get the contig handle for a name
    pub fn get(&self, name: &str) -> Option<&Arc<Contig>> {
        self.name_to_id.get(name).map(|&idx| &self.contigs[idx])
    }

    /// Get a contig by insertion index
    pub fn by_idx(&self, idx: usize) -> Option<&Arc<Contig>> {
        self.contigs.get(idx)
    }

    pub fn len(&self) -> usize {
        self.contigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contigs.is_empty()
    }

    /// Register the contig described by a header line, if it is an `@SQ` line
    pub fn add_header_line(&mut self, line: &str) -> Result<Option<Arc<Contig>>> {
        match parse_sq_line(line)? {
            Some((name, len)) => self.add(&name, len).map(Some),
            None => Ok(None),
        }
    }
}

/// Extract `(SN, LN)` from an `@SQ` header line.
///
/// Returns `Ok(None)` for other header lines. A zero length counts as missing.
pub fn parse_sq_line(line: &str) -> std::result::Result<Option<(String, u64)>, ParseError> {
    let mut fields = line.trim_end_matches(&['\r', '\n'][..]).split('\t');
    if fields.next() != Some("@SQ") {
        return Ok(None);
    }

    let mut name = None;
    let mut len = 0u64;
    for field in fields {
        if let Some(value) = field.strip_prefix("SN:") {
            name = Some(value.to_string());
        } else if let Some(value) = field.strip_prefix("LN:") {
            len = value.parse().unwrap_or(0);
        }
    }

    match name {
        Some(name) if !name.is_empty() && len > 0 => Ok(Some((name, len))),
        _ => Err(ParseError::SequenceLine { line: line.trim_end().to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_registry() {
        let mut registry = ContigRegistry::new();

        let chr1 = registry.add("chr1", 1000).unwrap();
        let chr2 = registry.add("chr2", 2000).unwrap();
        assert_eq!(chr1.idx, 0);
        assert_eq!(chr2.idx, 1);

        assert_eq!(registry.get("chr2").map(|c| c.len), Some(2000));
        assert!(registry.get("chr3").is_none());
        assert_eq!(registry.by_idx(0).map(|c| c.name.as_str()), Some("chr1"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_contig() {
        let mut registry = ContigRegistry::new();
        registry.add("chr1", 1000).unwrap();
        let err = registry.add("chr1", 5).unwrap_err();
        assert!(matches!(
            err,
            Error::Integrity(IntegrityError::DuplicateContig { .. })
        ));
    }

    #[test]
    fn test_parse_sq_line() {
        assert_eq!(
            parse_sq_line("@SQ\tSN:chr1\tLN:248956422\n").unwrap(),
            Some(("chr1".to_string(), 248956422))
        );
        // field order does not matter
        assert_eq!(
            parse_sq_line("@SQ\tLN:10\tAS:x\tSN:c").unwrap(),
            Some(("c".to_string(), 10))
        );
        assert_eq!(parse_sq_line("@HD\tVN:1.6").unwrap(), None);
        assert!(parse_sq_line("@SQ\tSN:chr1").is_err());
        assert!(parse_sq_line("@SQ\tLN:100").is_err());
    }

    #[test]
    fn test_add_header_line() {
        let mut registry = ContigRegistry::new();
        assert!(registry.add_header_line("@PG\tID:bwa").unwrap().is_none());
        let contig = registry.add_header_line("@SQ\tSN:chrM\tLN:16569").unwrap();
        assert_eq!(contig.map(|c| c.len), Some(16569));
    }
}
