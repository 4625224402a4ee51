use hedron_common::transport::RpcMethod;
use hedron_common::{ChunkInfo, HedronError, Result, TopicId, TransactionPayload};

use super::{ChunkContext, ChunkData, Transaction, TransactionData};

pub const TOPIC_MESSAGE_CHUNK_SIZE: usize = 1024;
pub const TOPIC_MESSAGE_MAX_CHUNKS: usize = 20;

/// Publishes a message to a consensus topic.
///
/// Messages over one chunk carry [`ChunkInfo`] so subscribers can
/// reassemble them.
pub type TopicMessageSubmitTransaction = Transaction<TopicMessageSubmitTransactionData>;

#[derive(Debug, Clone)]
pub struct TopicMessageSubmitTransactionData {
    topic_id: Option<TopicId>,
    chunk_data: ChunkData,
}

impl Default for TopicMessageSubmitTransactionData {
    fn default() -> Self {
        Self {
            topic_id: None,
            chunk_data: ChunkData::new(TOPIC_MESSAGE_CHUNK_SIZE, TOPIC_MESSAGE_MAX_CHUNKS),
        }
    }
}

impl TopicMessageSubmitTransaction {
    pub fn topic_id(&mut self, topic_id: TopicId) -> &mut Self {
        self.data_mut().topic_id = Some(topic_id);
        self
    }

    pub fn message(&mut self, message: impl Into<Vec<u8>>) -> &mut Self {
        self.data_mut().chunk_data.data = message.into();
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

impl TransactionData for TopicMessageSubmitTransactionData {
    const METHOD: RpcMethod = RpcMethod::new("ConsensusService", "submitMessage");

    fn chunk_data(&self) -> Option<&ChunkData> {
        Some(&self.chunk_data)
    }

    fn to_payload(&self, chunk: &ChunkContext) -> Result<TransactionPayload> {
        let topic_id = self
            .topic_id
            .ok_or_else(|| HedronError::InvalidRequest("topic id must be set".to_string()))?;

        let chunk_info = (chunk.total > 1).then(|| ChunkInfo {
            initial_transaction_id: chunk.initial_transaction_id,
            total: chunk.total as u32,
            number: chunk.index as u32 + 1,
        });

        Ok(TransactionPayload::ConsensusSubmitMessage {
            topic_id,
            message: self.chunk_data.chunk(chunk.index).to_vec(),
            chunk_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hedron_common::{AccountId, Timestamp, TransactionId};

    fn frozen(message_len: usize) -> TopicMessageSubmitTransaction {
        let mut tx = TopicMessageSubmitTransaction::new();
        tx.topic_id(TopicId::from_num(77))
            .message(vec![7u8; message_len])
            .node_account_ids([AccountId::from_num(3)])
            .transaction_id(TransactionId::new(
                AccountId::from_num(1001),
                Timestamp { seconds: 50, nanos: 0 },
            ));
        tx.freeze().unwrap();
        tx
    }

    fn bodies(tx: &TopicMessageSubmitTransaction) -> Vec<hedron_common::TransactionBody> {
        tx.signed_transactions()
            .unwrap()
            .iter()
            .map(|chunk| chunk[0].body().unwrap())
            .collect()
    }

    #[test]
    fn test_single_chunk_has_no_chunk_info() {
        let tx = frozen(10);
        let bodies = bodies(&tx);
        assert_eq!(bodies.len(), 1);
        match &bodies[0].data {
            TransactionPayload::ConsensusSubmitMessage { chunk_info, message, .. } => {
                assert!(chunk_info.is_none());
                assert_eq!(message.len(), 10);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_chunks_are_numbered_with_sequential_ids() {
        let tx = frozen(TOPIC_MESSAGE_CHUNK_SIZE * 2 + 1);
        let bodies = bodies(&tx);
        assert_eq!(bodies.len(), 3);

        let initial = bodies[0].transaction_id;
        let mut reassembled = Vec::new();
        for (index, body) in bodies.iter().enumerate() {
            assert_eq!(body.transaction_id, initial.for_chunk(index));
            match &body.data {
                TransactionPayload::ConsensusSubmitMessage { chunk_info, message, .. } => {
                    let info = chunk_info.unwrap();
                    assert_eq!(info.initial_transaction_id, initial);
                    assert_eq!(info.total, 3);
                    assert_eq!(info.number, index as u32 + 1);
                    reassembled.extend_from_slice(message);
                }
                other => panic!("unexpected payload {:?}", other),
            }
        }
        assert_eq!(reassembled, vec![7u8; TOPIC_MESSAGE_CHUNK_SIZE * 2 + 1]);
    }

    #[test]
    fn test_too_many_chunks_fails_before_building() {
        let mut tx = TopicMessageSubmitTransaction::new();
        tx.topic_id(TopicId::from_num(77))
            .message(vec![0u8; TOPIC_MESSAGE_CHUNK_SIZE * TOPIC_MESSAGE_MAX_CHUNKS + 1])
            .node_account_ids([AccountId::from_num(3)]);

        match tx.freeze() {
            Err(HedronError::MaxChunksExceeded { chunks, max_chunks }) => {
                assert_eq!(chunks, 21);
                assert_eq!(max_chunks, 20);
            }
            other => panic!("expected MaxChunksExceeded, got {:?}", other.map(|_| ())),
        }
        assert!(!tx.is_frozen());
    }
}
