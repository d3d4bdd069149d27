//! Order-preserving parallel chunk processing.
//!
//! Every worker runs the same loop:
//!
//! 1. **Intake** (intake lock): pull up to `chunk_size` consecutive items from
//!    the shared source and stamp the batch with the next chunk id. An empty
//!    pull retires the worker without consuming an id.
//! 2. **Processing** (no lock): run the caller's closure over the batch,
//!    which fills the chunk's main and diagnostic buffers.
//! 3. **Release** (release lock): push the chunk on a min-heap keyed by id,
//!    then emit from the top of the heap for as long as the top is the next
//!    id expected on output.
//!
//! Chunk ids are dense, so every chunk reaches the top of the heap once all
//! lower ids have been emitted. No thread ever holds both locks.
//!
//! A processing or intake error is fatal: the failing worker raises a shared
//! flag, other workers stop pulling, and the failed chunk never reaches the
//! heap, so nothing past it is written.

use std::cmp::Ordering;
use std::collections::binary_heap::PeekMut;
use std::collections::BinaryHeap;
use std::io::Write;
use std::sync::atomic::{self, AtomicBool};
use std::sync::{Mutex, MutexGuard};

use crate::clone_builder::{CloneGroup, CloneSource};
use crate::error::{Error, Result};
use crate::sam::GroupSource;

/// A shared, ordered source the scheduler pulls batches from
pub trait ChunkSource {
    type Item;

    /// Next item, `None` once exhausted
    fn pull(&mut self) -> Result<Option<Self::Item>>;
}

impl<S: GroupSource, T: GroupSource> ChunkSource for CloneSource<S, T> {
    type Item = CloneGroup;

    fn pull(&mut self) -> Result<Option<CloneGroup>> {
        self.next_group()
    }
}

/// Plain iterators are infallible sources
pub struct IterSource<I>(pub I);

impl<I: Iterator> ChunkSource for IterSource<I> {
    type Item = I::Item;

    fn pull(&mut self) -> Result<Option<I::Item>> {
        Ok(self.0.next())
    }
}

/// One processed batch and its buffered output
#[derive(Debug)]
pub struct Chunk {
    pub id: u64,
    /// Index of the worker that processed it
    pub worker: usize,
    pub items: usize,
    pub out: Vec<u8>,
    pub diag: Vec<u8>,
}

impl Chunk {
    fn new(id: u64, worker: usize, items: usize) -> Self {
        Chunk {
            id,
            worker,
            items,
            out: Vec::new(),
            diag: Vec::new(),
        }
    }
}

// BinaryHeap is a max-heap; reverse the id order so the lowest id is on top
impl Ord for Chunk {
    fn cmp(&self, other: &Self) -> Ordering {
        other.id.cmp(&self.id)
    }
}

impl PartialOrd for Chunk {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Chunk {}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub threads: usize,
    /// Items per chunk
    pub chunk_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            threads: 1,
            chunk_size: 1000,
        }
    }
}

/// Totals reported after a successful run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub chunks: u64,
    pub items: u64,
}

struct Intake<S> {
    source: S,
    next_chunk_in: u64,
}

struct Release<O, D> {
    heap: BinaryHeap<Chunk>,
    next_chunk_out: u64,
    out: O,
    diag: D,
    stats: SchedulerStats,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| Error::WorkerPool("a worker panicked while holding a lock".to_string()))
}

pub struct ChunkScheduler {
    config: SchedulerConfig,
}

impl ChunkScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        ChunkScheduler { config }
    }

    /// Process `source` with `process` on a fixed pool of workers.
    ///
    /// Chunk main buffers are written to `out` and diagnostic buffers to
    /// `diag`, each in source order.
    pub fn run<S, F, O, D>(&self, source: S, process: F, out: O, diag: D) -> Result<SchedulerStats>
    where
        S: ChunkSource + Send,
        S::Item: Send,
        F: Fn(Vec<S::Item>, &mut Chunk) -> Result<()> + Sync,
        O: Write + Send,
        D: Write + Send,
    {
        let threads = self.config.threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()))?;
        log::info!("number of threads: {threads}");

        let intake = Mutex::new(Intake {
            source,
            next_chunk_in: 0,
        });
        let release = Mutex::new(Release {
            heap: BinaryHeap::new(),
            next_chunk_out: 0,
            out,
            diag,
            stats: SchedulerStats::default(),
        });
        let failed = AtomicBool::new(false);

        let results = pool.broadcast(|ctx| {
            let result = self.worker(ctx.index(), &intake, &release, &failed, &process);
            if result.is_err() {
                failed.store(true, atomic::Ordering::SeqCst);
            }
            result
        });

        if let Some(err) = results.into_iter().find_map(|r| r.err()) {
            return Err(err);
        }

        let mut release = release
            .into_inner()
            .map_err(|_| Error::WorkerPool("release lock poisoned".to_string()))?;
        debug_assert!(release.heap.is_empty(), "chunks left unreleased");
        release.out.flush()?;
        release.diag.flush()?;
        Ok(release.stats)
    }

    fn worker<S, F, O, D>(
        &self,
        worker: usize,
        intake: &Mutex<Intake<S>>,
        release: &Mutex<Release<O, D>>,
        failed: &AtomicBool,
        process: &F,
    ) -> Result<()>
    where
        S: ChunkSource,
        F: Fn(Vec<S::Item>, &mut Chunk) -> Result<()>,
        O: Write,
        D: Write,
    {
        loop {
            if failed.load(atomic::Ordering::SeqCst) {
                return Ok(());
            }

            let (id, items) = {
                let mut intake = lock(intake)?;
                let mut items = Vec::with_capacity(self.config.chunk_size);
                while items.len() < self.config.chunk_size {
                    match intake.source.pull()? {
                        Some(item) => items.push(item),
                        None => break,
                    }
                }
                if items.is_empty() {
                    return Ok(());
                }
                let id = intake.next_chunk_in;
                intake.next_chunk_in += 1;
                (id, items)
            };

            let mut chunk = Chunk::new(id, worker, items.len());
            process(items, &mut chunk)?;

            let mut guard = lock(release)?;
            let Release {
                heap,
                next_chunk_out,
                out,
                diag,
                stats,
            } = &mut *guard;
            heap.push(chunk);

            while let Some(top) = heap.peek_mut() {
                debug_assert!(top.id >= *next_chunk_out);
                if top.id != *next_chunk_out {
                    break;
                }
                let chunk = PeekMut::pop(top);
                out.write_all(&chunk.out)?;
                out.flush()?;
                diag.write_all(&chunk.diag)?;
                diag.flush()?;
                log::debug!(
                    "chunk={} work_thread={} print_thread={}",
                    chunk.id,
                    chunk.worker,
                    worker
                );
                stats.chunks += 1;
                stats.items += chunk.items as u64;
                *next_chunk_out += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IntegrityError, ParseError};
    use std::io::Write as _;

    fn numbers(n: u32) -> IterSource<std::ops::Range<u32>> {
        IterSource(0..n)
    }

    #[test]
    fn test_chunk_heap_is_min_ordered() {
        let mut heap = BinaryHeap::new();
        for id in [3, 0, 2, 1] {
            heap.push(Chunk::new(id, 0, 0));
        }
        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|c| c.id)).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_output_in_source_order() {
        let scheduler = ChunkScheduler::new(SchedulerConfig { threads: 4, chunk_size: 3 });
        let mut out = Vec::new();
        let mut diag = Vec::new();
        let stats = scheduler
            .run(
                numbers(100),
                |items, chunk| {
                    for i in items {
                        writeln!(chunk.out, "{i}")?;
                    }
                    writeln!(chunk.diag, "chunk {}", chunk.id)?;
                    Ok(())
                },
                &mut out,
                &mut diag,
            )
            .unwrap();

        let expected: String = (0..100).map(|i| format!("{i}\n")).collect();
        assert_eq!(String::from_utf8(out).unwrap(), expected);
        let expected_diag: String = (0..34).map(|i| format!("chunk {i}\n")).collect();
        assert_eq!(String::from_utf8(diag).unwrap(), expected_diag);
        assert_eq!(stats, SchedulerStats { chunks: 34, items: 100 });
    }

    #[test]
    fn test_empty_source() {
        let scheduler = ChunkScheduler::new(SchedulerConfig { threads: 3, chunk_size: 10 });
        let mut out = Vec::new();
        let stats = scheduler
            .run(numbers(0), |_, _| Ok(()), &mut out, std::io::sink())
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(stats.chunks, 0);
    }

    #[test]
    fn test_processing_error_stops_output() {
        let scheduler = ChunkScheduler::new(SchedulerConfig { threads: 1, chunk_size: 2 });
        let mut out = Vec::new();
        let err = scheduler
            .run(
                numbers(10),
                |items, chunk| {
                    for i in items {
                        if i == 5 {
                            return Err(IntegrityError::MateCount {
                                clone: i.to_string(),
                                expected: 2,
                                found: 3,
                            }
                            .into());
                        }
                        writeln!(chunk.out, "{i}")?;
                    }
                    Ok(())
                },
                &mut out,
                std::io::sink(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
        // chunks [0,1] and [2,3] precede the failure; [4,5] fails whole
        assert_eq!(String::from_utf8(out).unwrap(), "0\n1\n2\n3\n");
    }

    struct FailingSource {
        remaining: u32,
    }

    impl ChunkSource for FailingSource {
        type Item = u32;

        fn pull(&mut self) -> Result<Option<u32>> {
            if self.remaining == 0 {
                return Err(ParseError::MalformedCigar { cigar: "5".to_string() }.into());
            }
            self.remaining -= 1;
            Ok(Some(self.remaining))
        }
    }

    #[test]
    fn test_source_error_is_fatal() {
        let scheduler = ChunkScheduler::new(SchedulerConfig { threads: 2, chunk_size: 4 });
        let err = scheduler
            .run(
                FailingSource { remaining: 6 },
                |_, _| Ok(()),
                std::io::sink(),
                std::io::sink(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
