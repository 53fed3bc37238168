//! Chunk table: partitioning of a file into byte ranges and their state.
//!
//! The table is built once per download session. Chunk ranges are sorted,
//! disjoint and contiguous, and together cover exactly `[0, file_size)`.
//!
//! # State Machine
//!
//! ```text
//! Pending --[mark_in_progress]--> InProgress(server)
//! InProgress --[mark_done]--> Done
//! InProgress --[mark_pending]--> Pending
//! ```
//!
//! `Done` is terminal.

use std::fmt;

use super::error::StrategyError;
use super::range::ByteRange;
use super::servers::ServerId;

/// Index of a chunk within its [`ChunkTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(pub usize);

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Transfer state of a single chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// Waiting for a server.
    Pending,
    /// Assigned to exactly one live server.
    InProgress(ServerId),
    /// Downloaded successfully.
    Done,
}

/// A byte range of the target file together with its transfer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Bytes covered by this chunk.
    pub range: ByteRange,
    /// Current transfer state.
    pub state: ChunkState,
}

/// Partition of a file into chunks.
#[derive(Debug, Clone)]
pub struct ChunkTable {
    chunks: Vec<Chunk>,
    file_size: u64,
}

impl ChunkTable {
    /// Partition `[0, file_size)` into chunks of `chunk_size` bytes.
    ///
    /// The last chunk may be shorter than `chunk_size`. A zero-sized file
    /// produces no chunks at all.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::ZeroChunkSize`] if `chunk_size` is zero.
    pub fn new(file_size: u64, chunk_size: u64) -> Result<Self, StrategyError> {
        if chunk_size == 0 {
            return Err(StrategyError::ZeroChunkSize);
        }

        let count = file_size.div_ceil(chunk_size);
        let chunks = (0..count)
            .map(|i| {
                // i < count, so begin < file_size and neither step overflows
                let begin = i * chunk_size;
                let end = begin + chunk_size.min(file_size - begin);
                Chunk {
                    range: ByteRange::new(begin, end),
                    state: ChunkState::Pending,
                }
            })
            .collect();

        Ok(Self { chunks, file_size })
    }

    /// Size of the partitioned file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of chunks in the table.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Check whether the table has no chunks (zero-sized file).
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Get a chunk by id.
    pub fn get(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.get(id.0)
    }

    /// Iterate over all chunks in ascending range order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    /// Lowest-indexed chunk still waiting for a server.
    pub fn next_pending(&self) -> Option<ChunkId> {
        self.chunks
            .iter()
            .position(|c| c.state == ChunkState::Pending)
            .map(ChunkId)
    }

    /// Whether any chunk is still pending or in progress.
    pub fn has_outstanding_work(&self) -> bool {
        self.chunks.iter().any(|c| c.state != ChunkState::Done)
    }

    /// Number of chunks that are not yet done.
    pub fn outstanding_count(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| c.state != ChunkState::Done)
            .count()
    }

    /// Number of chunks that are done.
    pub fn done_count(&self) -> usize {
        self.chunks.len() - self.outstanding_count()
    }

    /// Total bytes covered by chunks that are done.
    pub fn done_bytes(&self) -> u64 {
        self.chunks
            .iter()
            .filter(|c| c.state == ChunkState::Done)
            .map(|c| c.range.len())
            .sum()
    }

    /// Resolve `range` to the in-progress chunk with exactly that range.
    ///
    /// Returns the chunk id and the server it is assigned to, or `None` if no
    /// chunk with this range is currently in progress.
    pub fn find_in_progress(&self, range: ByteRange) -> Option<(ChunkId, ServerId)> {
        let index = self
            .chunks
            .binary_search_by_key(&range.begin, |c| c.range.begin)
            .ok()?;
        let chunk = &self.chunks[index];
        match chunk.state {
            ChunkState::InProgress(server) if chunk.range == range => {
                Some((ChunkId(index), server))
            }
            _ => None,
        }
    }

    /// Assign a pending chunk to `server`.
    pub fn mark_in_progress(&mut self, id: ChunkId, server: ServerId) -> Result<(), StrategyError> {
        let chunk = self.chunk_mut(id)?;
        match chunk.state {
            ChunkState::Pending => {
                chunk.state = ChunkState::InProgress(server);
                Ok(())
            }
            from => Err(StrategyError::InvalidChunkTransition {
                chunk: id,
                from,
                to: "in progress",
            }),
        }
    }

    /// Mark an in-progress chunk as downloaded.
    pub fn mark_done(&mut self, id: ChunkId) -> Result<(), StrategyError> {
        let chunk = self.chunk_mut(id)?;
        match chunk.state {
            ChunkState::InProgress(_) => {
                chunk.state = ChunkState::Done;
                Ok(())
            }
            from => Err(StrategyError::InvalidChunkTransition {
                chunk: id,
                from,
                to: "done",
            }),
        }
    }

    /// Return an in-progress chunk to the pending queue.
    pub fn mark_pending(&mut self, id: ChunkId) -> Result<(), StrategyError> {
        let chunk = self.chunk_mut(id)?;
        match chunk.state {
            ChunkState::InProgress(_) => {
                chunk.state = ChunkState::Pending;
                Ok(())
            }
            from => Err(StrategyError::InvalidChunkTransition {
                chunk: id,
                from,
                to: "pending",
            }),
        }
    }

    fn chunk_mut(&mut self, id: ChunkId) -> Result<&mut Chunk, StrategyError> {
        self.chunks
            .get_mut(id.0)
            .ok_or(StrategyError::NoSuchChunk(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(table: &ChunkTable) -> Vec<(u64, u64)> {
        table.iter().map(|c| (c.range.begin, c.range.end)).collect()
    }

    #[test]
    fn test_partition_with_short_tail() {
        let table = ChunkTable::new(800, 250).unwrap();
        assert_eq!(
            ranges(&table),
            vec![(0, 250), (250, 500), (500, 750), (750, 800)]
        );
        assert!(table.iter().all(|c| c.state == ChunkState::Pending));
    }

    #[test]
    fn test_partition_exact_multiple() {
        let table = ChunkTable::new(1000, 250).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.get(ChunkId(3)).unwrap().range, ByteRange::new(750, 1000));
    }

    #[test]
    fn test_partition_chunk_larger_than_file() {
        let table = ChunkTable::new(5, 2048).unwrap();
        assert_eq!(ranges(&table), vec![(0, 5)]);
    }

    #[test]
    fn test_partition_of_largest_file() {
        let half = u64::MAX / 2 + 1;
        let table = ChunkTable::new(u64::MAX, half).unwrap();
        assert_eq!(ranges(&table), vec![(0, half), (half, u64::MAX)]);

        let table = ChunkTable::new(u64::MAX, u64::MAX).unwrap();
        assert_eq!(ranges(&table), vec![(0, u64::MAX)]);
    }

    #[test]
    fn test_zero_sized_file_has_no_chunks() {
        let table = ChunkTable::new(0, 250).unwrap();
        assert!(table.is_empty());
        assert!(!table.has_outstanding_work());
        assert_eq!(table.next_pending(), None);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert_eq!(
            ChunkTable::new(800, 0).unwrap_err(),
            StrategyError::ZeroChunkSize
        );
    }

    #[test]
    fn test_next_pending_is_lowest_index() {
        let mut table = ChunkTable::new(800, 250).unwrap();
        assert_eq!(table.next_pending(), Some(ChunkId(0)));

        table.mark_in_progress(ChunkId(0), ServerId(0)).unwrap();
        assert_eq!(table.next_pending(), Some(ChunkId(1)));

        table.mark_pending(ChunkId(0)).unwrap();
        assert_eq!(table.next_pending(), Some(ChunkId(0)));
    }

    #[test]
    fn test_outstanding_work_tracks_done() {
        let mut table = ChunkTable::new(300, 250).unwrap();
        for id in [ChunkId(0), ChunkId(1)] {
            table.mark_in_progress(id, ServerId(0)).unwrap();
            assert!(table.has_outstanding_work());
            table.mark_done(id).unwrap();
        }
        assert!(!table.has_outstanding_work());
        assert_eq!(table.done_count(), 2);
        assert_eq!(table.done_bytes(), 300);
    }

    #[test]
    fn test_find_in_progress_requires_exact_range() {
        let mut table = ChunkTable::new(800, 250).unwrap();
        table.mark_in_progress(ChunkId(1), ServerId(2)).unwrap();

        assert_eq!(
            table.find_in_progress(ByteRange::new(250, 500)),
            Some((ChunkId(1), ServerId(2)))
        );
        assert_eq!(table.find_in_progress(ByteRange::new(250, 499)), None);
        assert_eq!(table.find_in_progress(ByteRange::new(0, 250)), None);
        assert_eq!(table.find_in_progress(ByteRange::new(260, 500)), None);
    }

    #[test]
    fn test_done_never_regresses() {
        let mut table = ChunkTable::new(250, 250).unwrap();
        table.mark_in_progress(ChunkId(0), ServerId(0)).unwrap();
        table.mark_done(ChunkId(0)).unwrap();

        assert!(table.mark_pending(ChunkId(0)).is_err());
        assert!(table.mark_in_progress(ChunkId(0), ServerId(1)).is_err());
        assert!(table.mark_done(ChunkId(0)).is_err());
        assert_eq!(table.get(ChunkId(0)).unwrap().state, ChunkState::Done);
    }

    #[test]
    fn test_in_progress_cannot_be_reassigned() {
        let mut table = ChunkTable::new(250, 250).unwrap();
        table.mark_in_progress(ChunkId(0), ServerId(0)).unwrap();

        let err = table.mark_in_progress(ChunkId(0), ServerId(1)).unwrap_err();
        assert_eq!(
            err,
            StrategyError::InvalidChunkTransition {
                chunk: ChunkId(0),
                from: ChunkState::InProgress(ServerId(0)),
                to: "in progress",
            }
        );
    }

    #[test]
    fn test_pending_cannot_finish() {
        let mut table = ChunkTable::new(250, 250).unwrap();
        assert!(table.mark_done(ChunkId(0)).is_err());
        assert!(table.mark_pending(ChunkId(0)).is_err());
    }

    #[test]
    fn test_unknown_chunk_id() {
        let mut table = ChunkTable::new(250, 250).unwrap();
        assert_eq!(
            table.mark_done(ChunkId(7)).unwrap_err(),
            StrategyError::NoSuchChunk(ChunkId(7))
        );
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_ranges_partition_file(
                file_size in 0u64..100_000,
                chunk_size in 1u64..10_000
            ) {
                let table = ChunkTable::new(file_size, chunk_size)?;

                prop_assert_eq!(table.len() as u64, file_size.div_ceil(chunk_size));

                let mut cursor = 0;
                for chunk in table.iter() {
                    prop_assert_eq!(chunk.range.begin, cursor);
                    prop_assert!(chunk.range.begin < chunk.range.end);
                    prop_assert!(chunk.range.len() <= chunk_size);
                    cursor = chunk.range.end;
                }
                prop_assert_eq!(cursor, file_size);
            }

            #[test]
            fn test_partition_near_u64_max(chunk_size in (u64::MAX / 4)..=u64::MAX) {
                let table = ChunkTable::new(u64::MAX, chunk_size)?;

                let mut cursor = 0;
                for chunk in table.iter() {
                    prop_assert_eq!(chunk.range.begin, cursor);
                    prop_assert!(chunk.range.len() <= chunk_size);
                    cursor = chunk.range.end;
                }
                prop_assert_eq!(cursor, u64::MAX);
            }

            #[test]
            fn test_every_chunk_resolves_by_range(
                file_size in 1u64..50_000,
                chunk_size in 1u64..5_000
            ) {
                let mut table = ChunkTable::new(file_size, chunk_size)?;
                let all: Vec<ByteRange> = table.iter().map(|c| c.range).collect();

                for (i, range) in all.iter().enumerate() {
                    table.mark_in_progress(ChunkId(i), ServerId(i % 3))?;
                    prop_assert_eq!(
                        table.find_in_progress(*range),
                        Some((ChunkId(i), ServerId(i % 3)))
                    );
                }
            }
        }
    }
}
