//! SAM flag field as named booleans, and the per-mate annotation bits.
//!
//! Bits 0x1 through 0x800 are the standard SAM flags. The annotation pass adds
//! five bits above them:
//!
//! | bit | field |
//! |---|---|
//! | 0x1000 | `quality_pass` |
//! | 0x2000 | `tail_pass_5` |
//! | 0x4000 | `tail_pass_3` |
//! | 0x8000 | `concordant` |
//! | 0x10000 | `length_fail` |
//!
//! [`SamFlags::to_bits`] is the only place those positions are written down.

use crate::cigar::tail_insert_sizes;
use crate::error::Result;
use crate::mapping::Read;
use crate::sam::AlignmentRecord;

/// Flag field of one alignment record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamFlags {
    pub paired: bool,
    pub proper_pair: bool,
    pub unmapped: bool,
    pub mate_unmapped: bool,
    pub reverse: bool,
    pub mate_reverse: bool,
    pub first_in_pair: bool,
    pub second_in_pair: bool,
    pub secondary: bool,
    pub qc_fail: bool,
    pub duplicate: bool,
    pub supplementary: bool,
    pub quality_pass: bool,
    pub tail_pass_5: bool,
    pub tail_pass_3: bool,
    pub concordant: bool,
    pub length_fail: bool,
    /// Bits above 0x10000, carried through untouched
    pub other: u32,
}

const KNOWN_BITS: u32 = 0x1FFFF;

impl SamFlags {
    pub fn from_bits(bits: u32) -> Self {
        let bit = |n: u32| bits & (1 << n) != 0;
        SamFlags {
            paired: bit(0),
            proper_pair: bit(1),
            unmapped: bit(2),
            mate_unmapped: bit(3),
            reverse: bit(4),
            mate_reverse: bit(5),
            first_in_pair: bit(6),
            second_in_pair: bit(7),
            secondary: bit(8),
            qc_fail: bit(9),
            duplicate: bit(10),
            supplementary: bit(11),
            quality_pass: bit(12),
            tail_pass_5: bit(13),
            tail_pass_3: bit(14),
            concordant: bit(15),
            length_fail: bit(16),
            other: bits & !KNOWN_BITS,
        }
    }

    pub fn to_bits(&self) -> u32 {
        let fields = [
            self.paired,
            self.proper_pair,
            self.unmapped,
            self.mate_unmapped,
            self.reverse,
            self.mate_reverse,
            self.first_in_pair,
            self.second_in_pair,
            self.secondary,
            self.qc_fail,
            self.duplicate,
            self.supplementary,
            self.quality_pass,
            self.tail_pass_5,
            self.tail_pass_3,
            self.concordant,
            self.length_fail,
        ];
        fields
            .iter()
            .enumerate()
            .fold(self.other, |acc, (n, &set)| if set { acc | (1 << n) } else { acc })
    }
}

/// Thresholds for the per-mate annotation bits
#[derive(Debug, Clone)]
pub struct AnnotationConfig {
    pub min_read_len: u32,
    pub min_mapq: u8,
    /// 0 disables the tail bits
    pub min_tail_insert_size: u32,
    pub min_tail_match_len: u32,
    /// Read group used when a record carries no `RG` tag
    pub default_read_group: String,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        AnnotationConfig {
            min_read_len: 20,
            min_mapq: 5,
            min_tail_insert_size: 15,
            min_tail_match_len: 5,
            default_read_group: "00".to_string(),
        }
    }
}

/// Bits derived for a single mate record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MateAnnotation {
    pub length_fail: bool,
    pub quality_pass: bool,
    pub tail_pass_5: bool,
    pub tail_pass_3: bool,
}

impl MateAnnotation {
    /// Set (never clear) the derived bits on a flag field
    pub fn apply(&self, flags: &mut SamFlags) {
        flags.length_fail |= self.length_fail;
        flags.quality_pass |= self.quality_pass;
        flags.tail_pass_5 |= self.tail_pass_5;
        flags.tail_pass_3 |= self.tail_pass_3;
    }
}

/// Computes annotation bits from a record and its assembled mate
#[derive(Debug, Clone, Default)]
pub struct FlagAnnotator {
    config: AnnotationConfig,
}

impl FlagAnnotator {
    pub fn new(config: AnnotationConfig) -> Self {
        FlagAnnotator { config }
    }

    pub fn config(&self) -> &AnnotationConfig {
        &self.config
    }

    pub fn annotate_mate(&self, record: &AlignmentRecord, read: &Read) -> Result<MateAnnotation> {
        let mut result = MateAnnotation {
            length_fail: read.len < self.config.min_read_len,
            ..Default::default()
        };

        if record.is_mapped() {
            result.quality_pass = record.mapq >= self.config.min_mapq;
            if self.config.min_tail_insert_size > 0 {
                let tails = tail_insert_sizes(&record.cigar, self.config.min_tail_match_len)?;
                result.tail_pass_5 = tails[0] >= self.config.min_tail_insert_size;
                result.tail_pass_3 = tails[1] >= self.config.min_tail_insert_size;
            }
        }

        Ok(result)
    }
}

/// Mark every record of a concordant pair
pub fn mark_concordant(records: &mut [AlignmentRecord]) {
    for record in records {
        record.flags.concordant = true;
    }
}
