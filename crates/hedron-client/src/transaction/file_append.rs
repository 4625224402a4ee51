use hedron_common::transport::RpcMethod;
use hedron_common::{FileId, HedronError, Result, TransactionPayload};

use super::{ChunkContext, ChunkData, Transaction, TransactionData};

pub const FILE_APPEND_CHUNK_SIZE: usize = 4096;
pub const FILE_APPEND_MAX_CHUNKS: usize = 20;

/// Appends bytes to a file, in as many chunks as it takes.
pub type FileAppendTransaction = Transaction<FileAppendTransactionData>;

#[derive(Debug, Clone)]
pub struct FileAppendTransactionData {
    file_id: Option<FileId>,
    chunk_data: ChunkData,
}

impl Default for FileAppendTransactionData {
    fn default() -> Self {
        Self {
            file_id: None,
            chunk_data: ChunkData::new(FILE_APPEND_CHUNK_SIZE, FILE_APPEND_MAX_CHUNKS),
        }
    }
}

impl FileAppendTransaction {
    pub fn file_id(&mut self, file_id: FileId) -> &mut Self {
        self.data_mut().file_id = Some(file_id);
        self
    }

    pub fn contents(&mut self, contents: impl Into<Vec<u8>>) -> &mut Self {
        self.data_mut().chunk_data.data = contents.into();
        self
    }

    pub fn chunk_size(&mut self, chunk_size: usize) -> &mut Self {
        self.data_mut().chunk_data.chunk_size = chunk_size.max(1);
        self
    }

    pub fn max_chunks(&mut self, max_chunks: usize) -> &mut Self {
        self.data_mut().chunk_data.max_chunks = max_chunks;
        self
    }
}

impl TransactionData for FileAppendTransactionData {
    const METHOD: RpcMethod = RpcMethod::new("FileService", "appendContent");

    fn chunk_data(&self) -> Option<&ChunkData> {
        Some(&self.chunk_data)
    }

    fn to_payload(&self, chunk: &ChunkContext) -> Result<TransactionPayload> {
        let file_id = self
            .file_id
            .ok_or_else(|| HedronError::InvalidRequest("file id must be set".to_string()))?;

        Ok(TransactionPayload::FileAppend {
            file_id,
            contents: self.chunk_data.chunk(chunk.index).to_vec(),
        })
    }
}
