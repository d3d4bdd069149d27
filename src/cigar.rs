/// CIGAR parsing and coordinate projection
use crate::error::ParseError;

/// CIGAR operation type
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CigarOp {
    Match,     // M
    Insertion, // I
    Deletion,  // D
    Skip,      // N
    SoftClip,  // S
    HardClip,  // H
    Padding,   // P
    SeqMatch,  // =
    Mismatch,  // X
}

impl CigarOp {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'M' => Some(Self::Match),
            'I' => Some(Self::Insertion),
            'D' => Some(Self::Deletion),
            'N' => Some(Self::Skip),
            'S' => Some(Self::SoftClip),
            'H' => Some(Self::HardClip),
            'P' => Some(Self::Padding),
            '=' => Some(Self::SeqMatch),
            'X' => Some(Self::Mismatch),
            _ => None,
        }
    }

    /// Returns true if this operation consumes query bases
    pub fn consumes_query(self) -> bool {
        matches!(
            self,
            Self::Match | Self::Insertion | Self::SoftClip | Self::SeqMatch | Self::Mismatch
        )
    }

    /// Returns true if this operation consumes reference bases
    pub fn consumes_ref(self) -> bool {
        matches!(
            self,
            Self::Match | Self::Deletion | Self::Skip | Self::SeqMatch | Self::Mismatch
        )
    }

    pub fn is_clip(self) -> bool {
        matches!(self, Self::SoftClip | Self::HardClip)
    }

    /// Match-class operation (aligned base pair, identical or not)
    pub fn is_match(self) -> bool {
        matches!(self, Self::Match | Self::SeqMatch | Self::Mismatch)
    }
}

/// Parse a CIGAR string into (operation, length) pairs.
///
/// `*` and the empty string parse to an empty list; callers that require an
/// alignment decide whether that is an error.
pub fn parse_cigar(cigar: &str) -> Result<Vec<(CigarOp, u32)>, ParseError> {
    let mut ops = Vec::new();
    if cigar == "*" {
        return Ok(ops);
    }

    let mut num_str = String::new();
    for ch in cigar.chars() {
        if ch.is_ascii_digit() {
            num_str.push(ch);
            continue;
        }
        let op = CigarOp::from_char(ch).ok_or_else(|| ParseError::UnknownCigarOp {
            cigar: cigar.to_string(),
            op: ch,
        })?;
        let len: u32 = num_str.parse().map_err(|_| ParseError::MalformedCigar {
            cigar: cigar.to_string(),
        })?;
        num_str.clear();
        ops.push((op, len));
    }

    // Length with no operation after it
    if !num_str.is_empty() {
        return Err(ParseError::MalformedCigar { cigar: cigar.to_string() });
    }

    Ok(ops)
}

/// Query and reference spans consumed by one alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarProjection {
    /// Bases clipped (soft or hard) before the first aligned base
    pub query_start: u32,
    /// `query_start` plus aligned query length (M/I/=/X)
    pub query_end: u32,
    /// Total query-consuming length, soft clips included
    pub query_len: u32,
    /// Query length including hard clips, i.e. the original read length
    pub read_len: u32,
    pub ref_start: i64,
    pub ref_end: i64,
}

/// Project a CIGAR string from a 0-based reference start.
///
/// `record` names the owning record in the error raised for an empty CIGAR.
pub fn project(cigar: &str, ref_start: i64, record: &str) -> Result<CigarProjection, ParseError> {
    let ops = parse_cigar(cigar)?;
    if ops.is_empty() {
        return Err(ParseError::EmptyCigar { record: record.to_string() });
    }

    let mut projection = CigarProjection {
        query_start: 0,
        query_end: 0,
        query_len: 0,
        read_len: 0,
        ref_start,
        ref_end: ref_start,
    };
    let mut seen_aligned = false;
    let mut aligned = 0u32;

    for &(op, len) in &ops {
        if op.is_clip() && !seen_aligned {
            projection.query_start += len;
        }
        if !op.is_clip() {
            seen_aligned = true;
        }
        if op.consumes_query() {
            projection.query_len += len;
            if !op.is_clip() {
                aligned += len;
            }
        }
        if op.consumes_query() || op == CigarOp::HardClip {
            projection.read_len += len;
        }
        if op.consumes_ref() {
            projection.ref_end += i64::from(len);
        }
    }
    projection.query_end = projection.query_start + aligned;

    Ok(projection)
}

/// Measure the unaligned tails at both ends of an alignment.
///
/// Walking inward from each end, query bases from soft clips, insertions and
/// match runs shorter than `min_match_len` are summed until a match run of at
/// least `min_match_len` is reached. Index 0 is the leading (CIGAR start)
/// end, index 1 the trailing end.
pub fn tail_insert_sizes(cigar: &str, min_match_len: u32) -> Result<[u32; 2], ParseError> {
    let ops = parse_cigar(cigar)?;
    Ok([
        tail_len(ops.iter(), min_match_len),
        tail_len(ops.iter().rev(), min_match_len),
    ])
}

fn tail_len<'a, I>(ops: I, min_match_len: u32) -> u32
where
    I: Iterator<Item = &'a (CigarOp, u32)>,
{
    let mut total = 0;
    for &(op, len) in ops {
        if op.is_match() && len >= min_match_len {
            break;
        }
        if op.consumes_query() {
            total += len;
        }
    }
    total
}
