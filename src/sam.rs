/// SAM text records: parsing, formatting, and reading grouped by clone
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use flate2::read::MultiGzDecoder;
use noodles::bgzf;

use crate::contig::{Contig, ContigRegistry};
use crate::error::{IntegrityError, ParseError, Result};
use crate::flags::SamFlags;
use crate::naming::ReadNaming;

/// Open a SAM input, `-` meaning stdin.
///
/// `.bgz` files go through the BGZF reader, `.gz` through a multi-member
/// gzip decoder; anything else is read as plain text.
pub fn open_sam_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }

    let file = File::open(path)?;
    let ext = path.extension().and_then(|ext| ext.to_str());
    match ext {
        Some("bgz") => Ok(Box::new(BufReader::new(bgzf::io::reader::Reader::new(file)))),
        Some("gz") => Ok(Box::new(BufReader::new(MultiGzDecoder::new(file)))),
        _ => Ok(Box::new(BufReader::new(file))),
    }
}

/// Optional `key:type:value` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub tag_type: String,
    pub value: String,
}

/// One SAM alignment line
#[derive(Debug, Clone)]
pub struct AlignmentRecord {
    pub name: String,
    pub flags: SamFlags,
    pub contig: Option<Arc<Contig>>,
    /// 0-based; -1 when the record has no position
    pub ref_start: i64,
    pub mapq: u8,
    pub cigar: String,
    pub mate_contig: Option<Arc<Contig>>,
    /// 0-based; -1 when the mate has no position
    pub mate_ref_start: i64,
    pub template_len: i64,
    pub seq: String,
    pub qual: String,
    pub tags: Vec<Tag>,
}

fn parse_field<T: std::str::FromStr>(
    value: &str,
    field: &'static str,
    line_no: u64,
) -> std::result::Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::Field {
        line_no,
        field,
        value: value.to_string(),
    })
}

fn lookup_contig(
    registry: &ContigRegistry,
    name: &str,
    record: &str,
) -> Result<Option<Arc<Contig>>> {
    if name == "*" {
        return Ok(None);
    }
    registry.get(name).cloned().map(Some).ok_or_else(|| {
        IntegrityError::UnknownContig {
            record: record.to_string(),
            contig: name.to_string(),
        }
        .into()
    })
}

impl AlignmentRecord {
    /// Parse one tab-separated SAM record line
    pub fn parse(line: &str, registry: &ContigRegistry, line_no: u64) -> Result<Self> {
        let fields: Vec<&str> = line.trim_end_matches(&['\r', '\n'][..]).split('\t').collect();
        if fields.len() < 11 {
            return Err(ParseError::RecordFields { line_no, found: fields.len() }.into());
        }

        let name = fields[0].to_string();
        let flags = SamFlags::from_bits(parse_field(fields[1], "FLAG", line_no)?);
        let contig = lookup_contig(registry, fields[2], &name)?;
        let pos: i64 = parse_field(fields[3], "POS", line_no)?;
        let mapq = parse_field(fields[4], "MAPQ", line_no)?;
        let mate_contig = match fields[6] {
            "=" => contig.clone(),
            other => lookup_contig(registry, other, &name)?,
        };
        let mate_pos: i64 = parse_field(fields[7], "PNEXT", line_no)?;
        let template_len = parse_field(fields[8], "TLEN", line_no)?;

        let mut tags = Vec::with_capacity(fields.len() - 11);
        for field in &fields[11..] {
            let mut parts = field.splitn(3, ':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(tag_type), Some(value)) => tags.push(Tag {
                    key: key.to_string(),
                    tag_type: tag_type.to_string(),
                    value: value.to_string(),
                }),
                _ => {
                    return Err(ParseError::Field {
                        line_no,
                        field: "tag",
                        value: field.to_string(),
                    }
                    .into())
                }
            }
        }

        Ok(AlignmentRecord {
            name,
            flags,
            contig,
            ref_start: pos - 1,
            mapq,
            cigar: fields[5].to_string(),
            mate_contig,
            mate_ref_start: mate_pos - 1,
            template_len,
            seq: fields[9].to_string(),
            qual: fields[10].to_string(),
            tags,
        })
    }

    pub fn is_mapped(&self) -> bool {
        !self.flags.unmapped
    }

    pub fn has_seq(&self) -> bool {
        !self.seq.is_empty() && self.seq != "*"
    }

    /// Observed sequence length, 0 for `*`
    pub fn seq_len(&self) -> usize {
        if self.has_seq() {
            self.seq.len()
        } else {
            0
        }
    }

    /// Value of the first tag with this key
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|t| t.key == key).map(|t| t.value.as_str())
    }
}

impl fmt::Display for AlignmentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let contig = self.contig.as_ref().map_or("*", |c| c.name.as_str());
        let mate_contig = match (&self.mate_contig, &self.contig) {
            (None, _) => "*",
            (Some(m), Some(c)) if Arc::ptr_eq(m, c) => "=",
            (Some(m), _) => m.name.as_str(),
        };
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.name,
            self.flags.to_bits(),
            contig,
            self.ref_start + 1,
            self.mapq,
            self.cigar,
            mate_contig,
            self.mate_ref_start + 1,
            self.template_len,
            self.seq,
            self.qual
        )?;

        for tag in &self.tags {
            write!(f, "\t{}:{}:{}", tag.key, tag.tag_type, tag.value)?;
        }

        Ok(())
    }
}

/// Consecutive records sharing one clone name
#[derive(Debug, Clone)]
pub struct RecordGroup {
    pub name: String,
    pub records: Vec<AlignmentRecord>,
}

/// An ordered source of clone groups
pub trait GroupSource {
    /// Pull the next group, `None` at end of stream
    fn next_group(&mut self) -> Result<Option<RecordGroup>>;
}

impl<I> GroupSource for I
where
    I: Iterator<Item = RecordGroup>,
{
    fn next_group(&mut self) -> Result<Option<RecordGroup>> {
        Ok(self.next())
    }
}

/// Reads a SAM stream and yields records grouped by clone name.
///
/// The header is consumed on construction: every header line is kept for
/// echoing and `@SQ` lines populate the contig registry, which is frozen
/// before the first record is parsed.
pub struct SamGroupReader<R: BufRead> {
    reader: R,
    registry: Arc<ContigRegistry>,
    header: Vec<String>,
    naming: ReadNaming,
    lookahead: Option<AlignmentRecord>,
    line: String,
    line_no: u64,
}

impl<R: BufRead> SamGroupReader<R> {
    pub fn new(mut reader: R, naming: ReadNaming) -> Result<Self> {
        let mut registry = ContigRegistry::new();
        let mut header = Vec::new();
        let mut line = String::new();
        let mut line_no = 0;

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            line_no += 1;
            if !line.starts_with('@') {
                break;
            }
            registry.add_header_line(&line)?;
            header.push(line.trim_end_matches(&['\r', '\n'][..]).to_string());
        }

        // First non-header line, or empty at end of stream
        let pending = std::mem::take(&mut line);
        let mut sam = SamGroupReader {
            reader,
            registry: Arc::new(registry),
            header,
            naming,
            lookahead: None,
            line,
            line_no,
        };
        sam.lookahead = if pending.trim().is_empty() {
            sam.read_record()?
        } else {
            Some(AlignmentRecord::parse(&pending, &sam.registry, line_no)?)
        };

        Ok(sam)
    }

    /// Header lines, without line terminators
    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn registry(&self) -> &Arc<ContigRegistry> {
        &self.registry
    }

    fn read_record(&mut self) -> Result<Option<AlignmentRecord>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            if self.line.trim().is_empty() {
                continue;
            }
            return AlignmentRecord::parse(&self.line, &self.registry, self.line_no).map(Some);
        }
    }
}

impl<R: BufRead> GroupSource for SamGroupReader<R> {
    fn next_group(&mut self) -> Result<Option<RecordGroup>> {
        let first = match self.lookahead.take() {
            Some(record) => record,
            None => return Ok(None),
        };
        let name = self.naming.clone_name(&first.name)?.to_string();
        let mut records = vec![first];

        while let Some(record) = self.read_record()? {
            if self.naming.clone_name(&record.name)? != name {
                self.lookahead = Some(record);
                break;
            }
            records.push(record);
        }

        Ok(Some(RecordGroup { name, records }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> ContigRegistry {
        let mut registry = ContigRegistry::new();
        registry.add("chr1", 10_000).unwrap();
        registry.add("chr2", 20_000).unwrap();
        registry
    }

    #[test]
    fn test_parse_and_format_roundtrip() {
        let line = "r1\t99\tchr1\t101\t60\t50M\t=\t401\t350\tACGT\t!!!!\tRG:Z:lib1\tNM:i:0";
        let record = AlignmentRecord::parse(line, &registry(), 1).unwrap();
        assert_eq!(record.ref_start, 100);
        assert_eq!(record.mate_ref_start, 400);
        assert!(record.flags.paired && record.flags.mate_reverse);
        assert_eq!(record.tag("RG"), Some("lib1"));
        assert_eq!(record.to_string(), line);
    }

    #[test]
    fn test_format_other_mate_contig_and_unmapped() {
        let line = "r2\t4\t*\t0\t0\t*\tchr2\t7\t0\tNNNN\t####";
        let record = AlignmentRecord::parse(line, &registry(), 1).unwrap();
        assert!(!record.is_mapped());
        assert!(record.contig.is_none());
        assert_eq!(record.to_string(), line);
    }

    #[test]
    fn test_tag_value_with_colons() {
        let line = "r3\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tIIII\tXA:Z:chr2,+5,4M,0;\tCO:Z:a:b";
        let record = AlignmentRecord::parse(line, &registry(), 1).unwrap();
        assert_eq!(record.tags[1].value, "a:b");
        assert_eq!(record.to_string(), line);
    }

    #[test]
    fn test_unknown_contig() {
        let line = "r1\t0\tchrZ\t1\t60\t4M\t*\t0\t0\tACGT\tIIII";
        assert!(AlignmentRecord::parse(line, &registry(), 1).is_err());
    }

    #[test]
    fn test_too_few_fields() {
        assert!(AlignmentRecord::parse("r1\t0\tchr1", &registry(), 3).is_err());
    }

    #[test]
    fn test_group_reader() {
        let sam = "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:1000\n\
                   a\t65\tchr1\t1\t60\t4M\t=\t10\t0\tACGT\tIIII\n\
                   a\t129\tchr1\t10\t60\t4M\t=\t1\t0\tACGT\tIIII\n\
                   b\t65\tchr1\t20\t60\t4M\t=\t30\t0\tACGT\tIIII\n\
                   b\t129\tchr1\t30\t60\t4M\t=\t20\t0\tACGT\tIIII\n\
                   a\t0\tchr1\t50\t60\t4M\t*\t0\t0\tACGT\tIIII\n";
        let mut reader = SamGroupReader::new(sam.as_bytes(), ReadNaming::Plain).unwrap();
        assert_eq!(reader.header().len(), 2);
        assert_eq!(reader.registry().len(), 1);

        let mut names = Vec::new();
        let mut sizes = Vec::new();
        while let Some(group) = reader.next_group().unwrap() {
            names.push(group.name);
            sizes.push(group.records.len());
        }
        // only consecutive records are grouped
        assert_eq!(names, vec!["a", "b", "a"]);
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_header_only() {
        let sam = "@SQ\tSN:chr1\tLN:1000\n";
        let mut reader = SamGroupReader::new(sam.as_bytes(), ReadNaming::Plain).unwrap();
        assert!(reader.next_group().unwrap().is_none());
    }
}
