//! Per-group annotation and the end-to-end pipeline driver.

use std::io::Write;
use std::path::PathBuf;

use crate::clone_builder::{CloneAssembler, CloneGroup, CloneSource};
use crate::error::{IntegrityError, Result};
use crate::flags::{mark_concordant, AnnotationConfig, FlagAnnotator};
use crate::naming::ReadNaming;
use crate::pairing::ReadGroupSet;
use crate::sam::{open_sam_input, SamGroupReader};
use crate::scheduler::{Chunk, ChunkScheduler, SchedulerConfig, SchedulerStats};

/// Annotates the records of one clone group in place
pub struct Annotator<'a> {
    assembler: CloneAssembler<'a>,
    flags: FlagAnnotator,
    verbose: bool,
}

impl<'a> Annotator<'a> {
    pub fn new(assembler: CloneAssembler<'a>, flags: FlagAnnotator, verbose: bool) -> Self {
        Annotator {
            assembler,
            flags,
            verbose,
        }
    }

    /// Set the annotation bits on every record of `group`.
    ///
    /// Diagnostic lines are appended to `diag` when verbose.
    pub fn annotate(&self, group: &mut CloneGroup, diag: &mut Vec<u8>) -> Result<()> {
        let paired = self.assembler.paired();
        let expected = if paired { 2 } else { 1 };
        if group.records().len() != expected {
            return Err(IntegrityError::MateCount {
                clone: group.name().to_string(),
                expected,
                found: group.records().len(),
            }
            .into());
        }

        let clone = self.assembler.assemble(group)?;
        let naming = self.assembler.naming();

        for record in group.records_mut() {
            let mate = naming.resolve(record)?.mate;
            let annotation = self.flags.annotate_mate(record, &clone.reads[mate])?;
            annotation.apply(&mut record.flags);
        }

        if !paired {
            return Ok(());
        }
        if let Some(concordant) = clone.is_concordant() {
            if concordant {
                mark_concordant(group.records_mut());
            }
            if self.verbose {
                let verdict = if concordant { "concordant" } else { "discordant" };
                write!(diag, "clone s={}: {verdict}", clone.name)?;
                if let Some(tlen) = clone.template_length() {
                    write!(diag, " tlen={tlen}")?;
                }
                writeln!(diag)?;
            }
        }

        Ok(())
    }

    /// Scheduler callback: annotate a batch and format it into the chunk
    pub fn process_chunk(&self, mut groups: Vec<CloneGroup>, chunk: &mut Chunk) -> Result<()> {
        if self.verbose {
            if let (Some(first), Some(last)) = (groups.first(), groups.last()) {
                writeln!(
                    chunk.diag,
                    "tid={} chunk_id={} start:{} end:{}",
                    chunk.worker,
                    chunk.id,
                    first.name(),
                    last.name()
                )?;
            }
        }

        for group in &mut groups {
            self.annotate(group, &mut chunk.diag)?;
            for record in group.records() {
                writeln!(chunk.out, "{record}")?;
            }
        }
        Ok(())
    }
}

/// Everything one annotation run needs besides the read groups
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// SAM input, `-` for stdin
    pub input: PathBuf,
    /// Optional SAM of alignments to repeat elements, grouped like `input`
    pub repeat: Option<PathBuf>,
    pub naming: ReadNaming,
    pub annotation: AnnotationConfig,
    pub scheduler: SchedulerConfig,
    pub verbose: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            input: PathBuf::from("-"),
            repeat: None,
            naming: ReadNaming::Plain,
            annotation: AnnotationConfig::default(),
            scheduler: SchedulerConfig::default(),
            verbose: false,
        }
    }
}

/// Annotate a SAM stream: echo its header to `out`, then every record with
/// the derived flag bits set, in input order.
pub fn run<W, D>(options: &RunOptions, read_groups: &ReadGroupSet, mut out: W, diag: D) -> Result<SchedulerStats>
where
    W: Write + Send,
    D: Write + Send,
{
    let reference = SamGroupReader::new(open_sam_input(&options.input)?, options.naming)?;
    log::info!(
        "{}: {} header lines, {} contigs",
        options.input.display(),
        reference.header().len(),
        reference.registry().len()
    );
    for line in reference.header() {
        writeln!(out, "{line}")?;
    }

    let repeat = match &options.repeat {
        Some(path) => {
            let reader = SamGroupReader::new(open_sam_input(path)?, options.naming)?;
            log::info!("{}: {} repeat contigs", path.display(), reader.registry().len());
            Some(reader)
        }
        None => None,
    };

    let assembler = CloneAssembler::new(
        options.naming,
        read_groups,
        &options.annotation.default_read_group,
    );
    if !assembler.paired() {
        log::info!("no read groups configured, expecting unpaired input");
    }
    let annotator = Annotator::new(
        assembler,
        FlagAnnotator::new(options.annotation.clone()),
        options.verbose,
    );

    let stats = ChunkScheduler::new(options.scheduler.clone()).run(
        CloneSource::new(reference, repeat),
        |groups, chunk| annotator.process_chunk(groups, chunk),
        out,
        diag,
    )?;
    log::info!("annotated {} clones in {} chunks", stats.items, stats.chunks);
    Ok(stats)
}
