/// Clone, mate and mapping model
use std::ops::Range;
use std::sync::Arc;

use crate::cigar;
use crate::contig::Contig;
use crate::error::Result;
use crate::pairing::ReadGroup;
use crate::sam::AlignmentRecord;

/// Alignment strand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward = 0,
    Reverse = 1,
}

impl Strand {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn of(record: &AlignmentRecord) -> Self {
        if record.flags.reverse {
            Strand::Reverse
        } else {
            Strand::Forward
        }
    }
}

/// One normalized alignment of a mate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub contig: Arc<Contig>,
    pub strand: Strand,
    pub mapq: u8,
    /// Half-open interval on the forward-strand read
    pub query: Range<u32>,
    /// Half-open, 0-based
    pub reference: Range<i64>,
    /// Alignment to the reference (as opposed to a repeat element)
    pub is_ref: bool,
    /// Index of the owning mate within its clone
    pub mate: usize,
}

impl Mapping {
    /// Build a mapping from a mapped record via its CIGAR
    pub fn from_record(record: &AlignmentRecord, contig: Arc<Contig>, mate: usize) -> Result<Self> {
        let projection = cigar::project(&record.cigar, record.ref_start, &record.name)?;
        let strand = Strand::of(record);
        let query = match strand {
            Strand::Forward => projection.query_start..projection.query_end,
            Strand::Reverse => {
                projection.read_len - projection.query_end
                    ..projection.read_len - projection.query_start
            }
        };

        Ok(Mapping {
            contig,
            strand,
            mapq: record.mapq,
            query,
            reference: projection.ref_start..projection.ref_end,
            is_ref: true,
            mate,
        })
    }

    pub fn ref_len(&self) -> i64 {
        self.reference.end - self.reference.start
    }
}

/// One mate's sequence data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Read {
    /// Sequence on the forward strand of the original read
    pub seq: String,
    pub qual: String,
    /// Declared read length
    pub len: u32,
    pub mapping: Option<Mapping>,
    /// Whether this mate also hit a repeat element, per strand
    pub mapped_to_repeat: [bool; 2],
}

impl Read {
    pub fn is_mapped(&self) -> bool {
        self.mapping.is_some()
    }
}

/// Fragment span derived once both mates are assembled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClonePosition {
    pub contig: Arc<Contig>,
    pub span: Range<i64>,
}

/// One sequenced fragment and its two mates
#[derive(Debug, Clone)]
pub struct DnaClone<'a> {
    pub name: String,
    pub reads: [Read; 2],
    pub read_group: Option<&'a ReadGroup>,
    pub position: Option<ClonePosition>,
}

impl<'a> DnaClone<'a> {
    pub fn new(name: impl Into<String>) -> Self {
        DnaClone {
            name: name.into(),
            reads: [Read::default(), Read::default()],
            read_group: None,
            position: None,
        }
    }

    /// Derive the fragment span: both mates mapped to one contig
    pub fn compute_position(&mut self) {
        self.position = match (&self.reads[0].mapping, &self.reads[1].mapping) {
            (Some(m0), Some(m1)) if m0.contig == m1.contig => Some(ClonePosition {
                contig: Arc::clone(&m0.contig),
                span: m0.reference.start.min(m1.reference.start)
                    ..m0.reference.end.max(m1.reference.end),
            }),
            _ => None,
        };
    }

    /// Concordance of the two mates under this clone's read group.
    ///
    /// `None` when there is no read group or a mate is unmapped.
    pub fn is_concordant(&self) -> Option<bool> {
        let read_group = self.read_group?;
        let m0 = self.reads[0].mapping.as_ref()?;
        let m1 = self.reads[1].mapping.as_ref()?;
        Some(read_group.pair_concordant(m0, m1))
    }

    /// Estimated fragment length, `None` unless both mates map to one contig
    pub fn template_length(&self) -> Option<i64> {
        let read_group = self.read_group?;
        let m0 = self.reads[0].mapping.as_ref()?;
        let m1 = self.reads[1].mapping.as_ref()?;
        read_group.template_length(m0, m1)
    }
}

/// Reverse complement of a nucleotide string; IUPAC codes other than
/// A/C/G/T/U/N pass through unchanged
pub fn reverse_complement(seq: &str) -> String {
    seq.chars()
        .rev()
        .map(|c| match c {
            'A' => 'T',
            'T' | 'U' => 'A',
            'C' => 'G',
            'G' => 'C',
            'a' => 't',
            't' | 'u' => 'a',
            'c' => 'g',
            'g' => 'c',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contig::ContigRegistry;

    fn record(line: &str) -> AlignmentRecord {
        let mut registry = ContigRegistry::new();
        registry.add("chr1", 100_000).unwrap();
        AlignmentRecord::parse(line, &registry, 1).unwrap()
    }

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement("ACGT"), "ACGT");
        assert_eq!(reverse_complement("AACGN"), "NCGTT");
        assert_eq!(reverse_complement("acgtt"), "aacgt");
    }

    #[test]
    fn test_forward_mapping() {
        let rec = record("r\t0\tchr1\t101\t30\t5S45M\t*\t0\t0\t*\t*");
        let contig = rec.contig.clone().unwrap();
        let m = Mapping::from_record(&rec, contig, 0).unwrap();
        assert_eq!(m.strand, Strand::Forward);
        assert_eq!(m.reference, 100..145);
        assert_eq!(m.query, 5..50);
        assert_eq!(m.ref_len(), 45);
    }

    #[test]
    fn test_reverse_mapping_query_is_mirrored() {
        // alignment orientation: 5 clipped, 45 aligned; read forward: 45 aligned, 5 clipped
        let rec = record("r\t16\tchr1\t101\t30\t5S45M\t*\t0\t0\t*\t*");
        let contig = rec.contig.clone().unwrap();
        let m = Mapping::from_record(&rec, contig, 1).unwrap();
        assert_eq!(m.strand, Strand::Reverse);
        assert_eq!(m.query, 0..45);
        assert_eq!(m.mate, 1);
    }

    #[test]
    fn test_clone_always_has_two_reads() {
        let clone = DnaClone::new("X");
        assert_eq!(clone.reads.len(), 2);
        assert!(clone.is_concordant().is_none());
    }
}
