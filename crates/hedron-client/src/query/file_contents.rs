use hedron_common::transport::RpcMethod;
use hedron_common::{AccountId, FileId, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{require, Query, QueryData};

/// Contents of a file. Paid.
pub type FileContentsQuery = Query<FileContentsQueryData>;

#[derive(Debug, Clone, Default)]
pub struct FileContentsQueryData {
    file_id: Option<FileId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContents {
    pub file_id: FileId,
    #[serde(with = "hex::serde")]
    pub contents: Vec<u8>,
}

impl FileContentsQuery {
    pub fn file_id(&mut self, file_id: FileId) -> &mut Self {
        self.data_mut().file_id = Some(file_id);
        self
    }
}

impl QueryData for FileContentsQueryData {
    type Output = FileContents;

    const METHOD: RpcMethod = RpcMethod::new("FileService", "getFileContent");

    fn body(&self) -> Result<Value> {
        Ok(json!({ "file_id": require(self.file_id, "file id")? }))
    }

    fn parse_response(&self, body: Value, _node_account_id: AccountId) -> Result<FileContents> {
        Ok(serde_json::from_value(body)?)
    }
}
