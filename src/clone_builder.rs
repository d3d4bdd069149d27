//! Assembly of clones from grouped alignment records.
//!
//! Pulling and assembly are split so the parallel engine can pull under its
//! intake lock and assemble outside it: [`CloneSource`] owns the stateful,
//! ordered sources, while [`CloneAssembler`] is a pure function of one
//! [`CloneGroup`]. [`CloneBuilder`] glues the two for sequential callers.

use crate::error::{IntegrityError, Result};
use crate::mapping::{reverse_complement, DnaClone, Mapping, Strand};
use crate::naming::ReadNaming;
use crate::pairing::{ReadGroup, ReadGroupSet};
use crate::sam::{AlignmentRecord, GroupSource, RecordGroup};

/// A reference group plus the repeat group carrying the same clone name
#[derive(Debug, Clone)]
pub struct CloneGroup {
    pub reference: RecordGroup,
    pub repeat: Option<RecordGroup>,
}

impl CloneGroup {
    pub fn name(&self) -> &str {
        &self.reference.name
    }

    pub fn records(&self) -> &[AlignmentRecord] {
        &self.reference.records
    }

    pub fn records_mut(&mut self) -> &mut [AlignmentRecord] {
        &mut self.reference.records
    }
}

/// Ordered pull from the reference source and the optional repeat source.
///
/// The repeat source is read one group ahead; its cached group is attached to
/// the reference group of the same name.
pub struct CloneSource<S, T = S> {
    reference: S,
    repeat: Option<T>,
    pending_repeat: Option<RecordGroup>,
}

impl<S: GroupSource, T: GroupSource> CloneSource<S, T> {
    pub fn new(reference: S, repeat: Option<T>) -> Self {
        CloneSource {
            reference,
            repeat,
            pending_repeat: None,
        }
    }

    /// Next clone group, `None` once the reference source is exhausted.
    ///
    /// A repeat group still cached at that point never matched any
    /// reference group, which is an integrity error.
    pub fn next_group(&mut self) -> Result<Option<CloneGroup>> {
        let next_ref = self.reference.next_group()?;
        if self.pending_repeat.is_none() {
            if let Some(repeat) = self.repeat.as_mut() {
                self.pending_repeat = repeat.next_group()?;
            }
        }

        let reference = match next_ref {
            Some(group) => group,
            None => {
                return match self.pending_repeat.take() {
                    Some(orphan) => Err(IntegrityError::OrphanRepeat { clone: orphan.name }.into()),
                    None => Ok(None),
                }
            }
        };

        let repeat = match &self.pending_repeat {
            Some(cached) if cached.name == reference.name => self.pending_repeat.take(),
            _ => None,
        };

        Ok(Some(CloneGroup { reference, repeat }))
    }
}

/// Builds validated clones from clone groups
#[derive(Debug, Clone, Copy)]
pub struct CloneAssembler<'a> {
    naming: ReadNaming,
    read_groups: &'a ReadGroupSet,
    default_read_group: &'a str,
}

impl<'a> CloneAssembler<'a> {
    pub fn new(naming: ReadNaming, read_groups: &'a ReadGroupSet, default_read_group: &'a str) -> Self {
        CloneAssembler {
            naming,
            read_groups,
            default_read_group,
        }
    }

    /// Paired mode: read groups are configured and both mates must be present
    pub fn paired(&self) -> bool {
        !self.read_groups.is_empty()
    }

    pub fn naming(&self) -> ReadNaming {
        self.naming
    }

    pub fn assemble(&self, group: &CloneGroup) -> Result<DnaClone<'a>> {
        let mut clone = DnaClone::new(group.name());
        let mut mappings: [Vec<Mapping>; 2] = Default::default();
        let mut seen = [false; 2];
        let mut embedded_read_group = None;

        for record in group.records() {
            let info = self.naming.resolve(record)?;
            let mate = info.mate;
            seen[mate] = true;
            embedded_read_group = embedded_read_group.or(info.read_group_id);

            let read = &mut clone.reads[mate];
            read.len = read.len.max(info.declared_len);

            // The first record with sequence data fixes the mate's sequence,
            // stored on the forward strand of the original read
            if read.seq.is_empty() && record.has_seq() {
                if record.is_mapped() && record.flags.reverse {
                    read.seq = reverse_complement(&record.seq);
                    read.qual = record.qual.chars().rev().collect();
                } else {
                    read.seq = record.seq.clone();
                    read.qual = record.qual.clone();
                }
            }

            if record.is_mapped() {
                let contig = record.contig.clone().ok_or_else(|| IntegrityError::UnknownContig {
                    record: record.name.clone(),
                    contig: "*".to_string(),
                })?;
                mappings[mate].push(Mapping::from_record(record, contig, mate)?);
            }
        }

        for (mate, list) in mappings.into_iter().enumerate() {
            if list.len() >= 2 {
                return Err(IntegrityError::MultipleMappings {
                    clone: clone.name.clone(),
                    mate,
                }
                .into());
            }
            let read = &mut clone.reads[mate];
            read.mapping = list.into_iter().next();

            if !(self.paired() || seen[mate]) || !read.seq.is_empty() {
                continue;
            }
            // A declared single-base read without sequence is a placeholder mate
            if read.len == 1 {
                read.seq = "N".to_string();
                read.qual = "!".to_string();
            } else {
                return Err(IntegrityError::MissingSequence {
                    clone: clone.name.clone(),
                    mate,
                }
                .into());
            }
        }

        if let Some(repeat) = &group.repeat {
            for record in repeat.records.iter().filter(|r| r.is_mapped()) {
                let mate = self.naming.resolve(record)?.mate;
                clone.reads[mate].mapped_to_repeat[Strand::of(record).index()] = true;
            }
        }

        if self.paired() {
            clone.read_group = Some(self.resolve_read_group(group, embedded_read_group)?);
        }

        clone.compute_position();
        Ok(clone)
    }

    /// Embedded numeric id first, then the first `RG` tag, then the default
    fn resolve_read_group(&self, group: &CloneGroup, embedded: Option<u32>) -> Result<&'a ReadGroup> {
        let missing = |read_group: String| IntegrityError::UnknownReadGroup {
            clone: group.name().to_string(),
            read_group,
        };

        if let Some(num_id) = embedded {
            return self
                .read_groups
                .find_by_num_id(num_id)
                .ok_or_else(|| missing(num_id.to_string()).into());
        }

        let name = group
            .records()
            .iter()
            .find_map(|r| r.tag("RG"))
            .unwrap_or(self.default_read_group);
        self.read_groups
            .find_by_name(name)
            .ok_or_else(|| missing(name.to_string()).into())
    }
}

/// Sequential clone builder over a reference and an optional repeat source
pub struct CloneBuilder<'a, S, T = S> {
    source: CloneSource<S, T>,
    assembler: CloneAssembler<'a>,
}

impl<'a, S: GroupSource, T: GroupSource> CloneBuilder<'a, S, T> {
    pub fn new(source: CloneSource<S, T>, assembler: CloneAssembler<'a>) -> Self {
        CloneBuilder { source, assembler }
    }

    /// Next fully built clone, `None` at end of stream
    pub fn next_clone(&mut self) -> Result<Option<DnaClone<'a>>> {
        match self.source.next_group()? {
            Some(group) => self.assembler.assemble(&group).map(Some),
            None => Ok(None),
        }
    }
}
