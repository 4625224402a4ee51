use hedron_common::{HedronError, TransactionId};
use thiserror::Error;

use super::TransactionResponse;

/// A payload too large for one transaction, and how to split it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkData {
    pub data: Vec<u8>,
    pub chunk_size: usize,
    pub max_chunks: usize,
}

impl ChunkData {
    pub fn new(chunk_size: usize, max_chunks: usize) -> Self {
        Self {
            data: Vec::new(),
            chunk_size,
            max_chunks,
        }
    }

    /// Number of chunks needed; an empty payload is still one chunk.
    pub fn chunk_count(&self) -> usize {
        let size = self.chunk_size.max(1);
        if self.data.is_empty() {
            1
        } else {
            self.data.len().div_ceil(size)
        }
    }

    pub fn chunk(&self, index: usize) -> &[u8] {
        let size = self.chunk_size.max(1);
        let start = (index * size).min(self.data.len());
        let end = (start + size).min(self.data.len());
        &self.data[start..end]
    }

    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.chunk_count()).map(move |index| self.chunk(index))
    }

    pub(crate) fn check_limit(&self) -> Result<(), HedronError> {
        let chunks = self.chunk_count();
        if chunks > self.max_chunks {
            return Err(HedronError::MaxChunksExceeded {
                chunks,
                max_chunks: self.max_chunks,
            });
        }
        Ok(())
    }
}

/// Position of the chunk being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkContext {
    pub index: usize,
    pub total: usize,
    pub initial_transaction_id: TransactionId,
}

impl ChunkContext {
    pub fn transaction_id(&self) -> TransactionId {
        self.initial_transaction_id.for_chunk(self.index)
    }
}

/// A chunked execution that stopped part way.
///
/// `responses` holds every chunk accepted before the failure; those are
/// not rolled back.
#[derive(Debug, Error)]
#[error("chunked execution stopped after {} accepted chunks: {error}", .responses.len())]
pub struct ChunkedExecutionError {
    pub responses: Vec<TransactionResponse>,
    #[source]
    pub error: HedronError,
}

impl From<ChunkedExecutionError> for HedronError {
    fn from(err: ChunkedExecutionError) -> Self {
        err.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_data(len: usize, chunk_size: usize) -> ChunkData {
        ChunkData {
            data: (0..len).map(|i| (i % 251) as u8).collect(),
            chunk_size,
            max_chunks: 20,
        }
    }

    #[test]
    fn test_split_just_over_boundary() {
        let chunk_size = 1024;
        for n in 1..=5 {
            let data = chunk_data((n - 1) * chunk_size + 1, chunk_size);
            assert_eq!(data.chunk_count(), n);

            let joined: Vec<u8> = data.chunks().flatten().copied().collect();
            assert_eq!(joined, data.data);
            assert_eq!(data.chunk(n - 1).len(), 1);
        }
    }

    #[test]
    fn test_exact_multiple() {
        let data = chunk_data(4096 * 2, 4096);
        assert_eq!(data.chunk_count(), 2);
        assert_eq!(data.chunk(1).len(), 4096);
    }

    #[test]
    fn test_empty_payload_is_one_chunk() {
        let data = chunk_data(0, 4096);
        assert_eq!(data.chunk_count(), 1);
        assert!(data.chunk(0).is_empty());
        assert_eq!(data.chunks().count(), 1);
    }

    #[test]
    fn test_limit() {
        let data = ChunkData {
            max_chunks: 2,
            ..chunk_data(1024 * 2 + 1, 1024)
        };
        match data.check_limit() {
            Err(HedronError::MaxChunksExceeded { chunks, max_chunks }) => {
                assert_eq!(chunks, 3);
                assert_eq!(max_chunks, 2);
            }
            other => panic!("expected MaxChunksExceeded, got {:?}", other),
        }
    }
}
