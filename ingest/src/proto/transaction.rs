//! Transaction envelope messages.
//!
//! Only the fields the ingest pipeline reads are declared; prost skips
//! unknown fields on decode.

use super::Timestamp;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignedTransaction {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    /// Serialized signature map, kept opaque.
    #[prost(bytes = "vec", tag = "2")]
    pub sig_map: Vec<u8>,
    #[prost(bool, tag = "3")]
    pub use_serialized_tx_message_hash_algorithm: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransactionBody {
    #[prost(message, optional, tag = "1")]
    pub transaction_id: Option<TransactionId>,
    #[prost(message, optional, tag = "2")]
    pub node_account_id: Option<AccountId>,
    #[prost(uint64, tag = "3")]
    pub transaction_fee: u64,
    #[prost(string, tag = "6")]
    pub memo: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransactionId {
    #[prost(message, optional, tag = "1")]
    pub transaction_valid_start: Option<Timestamp>,
    #[prost(message, optional, tag = "2")]
    pub account_id: Option<AccountId>,
    #[prost(bool, tag = "3")]
    pub scheduled: bool,
    #[prost(int32, tag = "4")]
    pub nonce: i32,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct AccountId {
    #[prost(int64, tag = "1")]
    pub shard_num: i64,
    #[prost(int64, tag = "2")]
    pub realm_num: i64,
    #[prost(int64, tag = "3")]
    pub account_num: i64,
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.shard_num, self.realm_num, self.account_num)
    }
}
