//! Protobuf-framed (v6) signature file messages.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignatureFile {
    #[prost(message, optional, tag = "1")]
    pub file_signature: Option<SignatureObject>,
    #[prost(message, optional, tag = "2")]
    pub metadata_signature: Option<SignatureObject>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignatureObject {
    #[prost(int32, tag = "1")]
    pub signature_type: i32,
    #[prost(int32, tag = "2")]
    pub length: i32,
    #[prost(int32, tag = "3")]
    pub checksum: i32,
    #[prost(bytes = "vec", tag = "4")]
    pub signature: Vec<u8>,
    #[prost(message, optional, tag = "5")]
    pub hash_object: Option<HashObject>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HashObject {
    #[prost(int64, tag = "1")]
    pub class_id: i64,
    #[prost(int32, tag = "2")]
    pub class_version: i32,
    #[prost(int32, tag = "3")]
    pub algorithm: i32,
    #[prost(int32, tag = "4")]
    pub length: i32,
    #[prost(bytes = "vec", tag = "5")]
    pub hash: Vec<u8>,
}
