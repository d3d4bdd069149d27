//! Read groups and their mate-pairing model.
//!
//! A read group carries the insert-size statistics and orientation
//! convention of one sequencing library. Concordance is decided purely from
//! strands and coordinate order; the insert-size statistics are carried for
//! downstream consumers and for [`ReadGroup::template_length`] callers that
//! want to threshold on their own.

use std::collections::HashMap;
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::error::{ParseError, Result};
use crate::mapping::{Mapping, Strand};

/// Expected relative orientation of the two mates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Paired-end: mates face each other, forward-strand mate upstream (FR)
    Inward,
    /// Mate-pair: mates face away, reverse-strand mate upstream (RF)
    Outward,
    /// Both mates on one strand, mate 0 first along that strand (FF)
    Tandem,
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fr" | "inward" => Ok(Orientation::Inward),
            "rf" | "outward" => Ok(Orientation::Outward),
            "ff" | "tandem" => Ok(Orientation::Tandem),
            other => Err(format!("unknown orientation '{other}'")),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Orientation::Inward => "fr",
            Orientation::Outward => "rf",
            Orientation::Tandem => "ff",
        };
        f.write_str(s)
    }
}

/// One library's pairing model
#[derive(Debug, Clone, PartialEq)]
pub struct ReadGroup {
    pub name: String,
    pub num_id: u32,
    pub orientation: Orientation,
    pub mean: f64,
    pub stddev: f64,
}

impl ReadGroup {
    /// Whether two mates' relative strand and order match the orientation.
    ///
    /// `m0` must belong to mate 0 and `m1` to mate 1. Mates on different
    /// contigs are never concordant.
    pub fn pair_concordant(&self, m0: &Mapping, m1: &Mapping) -> bool {
        if m0.contig != m1.contig {
            return false;
        }

        match self.orientation {
            Orientation::Inward | Orientation::Outward => {
                if m0.strand == m1.strand {
                    return false;
                }
                let (fwd, rev) = if m0.strand == Strand::Forward { (m0, m1) } else { (m1, m0) };
                match self.orientation {
                    Orientation::Inward => fwd.reference.start <= rev.reference.start,
                    _ => rev.reference.start <= fwd.reference.start,
                }
            }
            Orientation::Tandem => {
                if m0.strand != m1.strand {
                    return false;
                }
                match m0.strand {
                    Strand::Forward => m0.reference.start <= m1.reference.start,
                    Strand::Reverse => m1.reference.end <= m0.reference.end,
                }
            }
        }
    }

    /// Estimated fragment length from the outer coordinates of both mates
    pub fn template_length(&self, m0: &Mapping, m1: &Mapping) -> Option<i64> {
        if m0.contig != m1.contig {
            return None;
        }
        let start = m0.reference.start.min(m1.reference.start);
        let end = m0.reference.end.max(m1.reference.end);
        Some(end - start)
    }
}

/// Immutable set of read groups keyed by name and by numeric id
#[derive(Debug, Default)]
pub struct ReadGroupSet {
    by_name: IndexMap<String, ReadGroup>,
    by_num_id: HashMap<u32, usize>,
}

impl ReadGroupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from read groups, rejecting duplicate names or ids
    pub fn from_groups<I>(groups: I) -> Result<Self>
    where
        I: IntoIterator<Item = ReadGroup>,
    {
        let mut set = ReadGroupSet::new();
        for (i, group) in groups.into_iter().enumerate() {
            set.insert(group, i + 1)?;
        }
        Ok(set)
    }

    fn insert(&mut self, group: ReadGroup, line_no: usize) -> Result<()> {
        if self.by_name.contains_key(&group.name) {
            return Err(ParseError::PairingLine {
                line_no,
                reason: format!("duplicate read group name [{}]", group.name),
            }
            .into());
        }
        if self.by_num_id.contains_key(&group.num_id) {
            return Err(ParseError::PairingLine {
                line_no,
                reason: format!("duplicate read group id [{}]", group.num_id),
            }
            .into());
        }
        self.by_num_id.insert(group.num_id, self.by_name.len());
        self.by_name.insert(group.name.clone(), group);
        Ok(())
    }

    /// Load `name num_id orientation mean stddev` lines; `#` starts a comment
    pub fn load<R: BufRead>(reader: R) -> Result<Self> {
        let mut set = ReadGroupSet::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = i + 1;
            let content = line.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }

            let fields: Vec<&str> = content.split_whitespace().collect();
            if fields.len() != 5 {
                return Err(ParseError::PairingLine {
                    line_no,
                    reason: format!("expected 5 fields, found {}", fields.len()),
                }
                .into());
            }
            let bad = |what: &str, value: &str| ParseError::PairingLine {
                line_no,
                reason: format!("invalid {what} [{value}]"),
            };

            let group = ReadGroup {
                name: fields[0].to_string(),
                num_id: fields[1].parse().map_err(|_| bad("id", fields[1]))?,
                orientation: fields[2].parse().map_err(|_| bad("orientation", fields[2]))?,
                mean: fields[3].parse().map_err(|_| bad("mean", fields[3]))?,
                stddev: fields[4].parse().map_err(|_| bad("stddev", fields[4]))?,
            };
            set.insert(group, line_no)?;
        }

        log::info!("loaded {} read groups", set.len());
        Ok(set)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ReadGroup> {
        self.by_name.get(name)
    }

    pub fn find_by_num_id(&self, num_id: u32) -> Option<&ReadGroup> {
        self.by_num_id.get(&num_id).and_then(|&idx| self.by_name.get_index(idx)).map(|(_, g)| g)
    }

    /// Position of a read group in load order
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get_index_of(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReadGroup> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// No read groups means unpaired input
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
