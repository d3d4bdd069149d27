/// Read-name resolution: clone identity, mate index, declared length
use crate::error::{ParseError, Result};
use crate::sam::AlignmentRecord;

/// How record names map onto clones and mates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadNaming {
    /// Clone name is the record name; mate index comes from flag 0x80 and the
    /// declared length is the observed sequence length.
    #[default]
    Plain,
    /// Record names are `<clone>:<read group id>:<mate 1|2>:<read length>`.
    Structured,
}

/// What the name resolver learns about one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MateInfo {
    pub mate: usize,
    pub declared_len: u32,
    /// Numeric read-group id embedded in the name, if any
    pub read_group_id: Option<u32>,
}

struct StructuredName<'a> {
    clone: &'a str,
    read_group_id: u32,
    mate: usize,
    len: u32,
}

fn parse_structured(name: &str) -> Option<StructuredName<'_>> {
    // Split from the right so clone names may themselves contain ':'
    let mut parts = name.rsplitn(4, ':');
    let len = parts.next()?.parse().ok()?;
    let mate = match parts.next()? {
        "1" => 0,
        "2" => 1,
        _ => return None,
    };
    let read_group_id = parts.next()?.parse().ok()?;
    let clone = parts.next().filter(|c| !c.is_empty())?;
    Some(StructuredName { clone, read_group_id, mate, len })
}

impl ReadNaming {
    /// Name of the clone a record belongs to
    pub fn clone_name<'a>(&self, record_name: &'a str) -> Result<&'a str> {
        match self {
            ReadNaming::Plain => Ok(record_name),
            ReadNaming::Structured => parse_structured(record_name)
                .map(|n| n.clone)
                .ok_or_else(|| ParseError::ReadName { name: record_name.to_string() }.into()),
        }
    }

    pub fn resolve(&self, record: &AlignmentRecord) -> Result<MateInfo> {
        match self {
            ReadNaming::Plain => Ok(MateInfo {
                mate: usize::from(record.flags.second_in_pair),
                declared_len: record.seq_len() as u32,
                read_group_id: None,
            }),
            ReadNaming::Structured => {
                let parsed = parse_structured(&record.name)
                    .ok_or_else(|| ParseError::ReadName { name: record.name.clone() })?;
                Ok(MateInfo {
                    mate: parsed.mate,
                    declared_len: parsed.len,
                    read_group_id: Some(parsed.read_group_id),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_clone_name() {
        let naming = ReadNaming::Structured;
        assert_eq!(naming.clone_name("frag17:3:1:100").unwrap(), "frag17");
        assert_eq!(
            naming.clone_name("M0:12:FC:1:1101:1000:2000:0:2:151").unwrap(),
            "M0:12:FC:1:1101:1000:2000"
        );
        assert!(naming.clone_name("frag17/1").is_err());
        assert!(naming.clone_name("frag17:3:3:100").is_err());
        assert!(naming.clone_name(":3:1:100").is_err());
    }

    #[test]
    fn test_plain_clone_name() {
        assert_eq!(ReadNaming::Plain.clone_name("frag17").unwrap(), "frag17");
    }
}
