//! The network's published list of nodes.

use hedron_common::AccountId;
use serde::{Deserialize, Serialize};

/// One node as published in the address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    pub node_account_id: AccountId,
    /// Reachable endpoints, `host:port`; the first one is used.
    pub addresses: Vec<String>,
    #[serde(default)]
    pub description: String,
    /// Hex-encoded Ed25519 public key the node signs with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddressBook {
    pub node_addresses: Vec<NodeAddress>,
}

impl NodeAddressBook {
    /// `(account, address)` pairs suitable for [`crate::NodePool::replace_membership`].
    ///
    /// Entries without any endpoint are skipped.
    pub fn entries(&self) -> Vec<(AccountId, String)> {
        self.node_addresses
            .iter()
            .filter_map(|node| {
                node.addresses
                    .first()
                    .map(|address| (node.node_account_id, address.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.node_addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_addresses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entries_use_first_address() {
        let book: NodeAddressBook = serde_json::from_value(json!({
            "node_addresses": [
                {
                    "node_account_id": {"shard": 0, "realm": 0, "num": 3},
                    "addresses": ["10.0.0.1:50211", "10.0.0.1:50212"]
                },
                {
                    "node_account_id": {"shard": 0, "realm": 0, "num": 4},
                    "addresses": [],
                    "description": "decommissioned"
                }
            ]
        }))
        .unwrap();

        assert_eq!(book.len(), 2);
        assert_eq!(
            book.entries(),
            vec![(AccountId::from_num(3), "10.0.0.1:50211".to_string())]
        );
    }
}
