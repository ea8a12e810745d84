//! `google.spanner.v1` message contents used by the read-write core.

use std::collections::HashMap;

use crate::proto::rpc;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Session {
    /// Server-assigned resource name
    /// `projects/<P>/instances/<I>/databases/<D>/sessions/<S>`.
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(map = "string, string", tag = "2")]
    pub labels: HashMap<String, String>,
    #[prost(message, optional, tag = "3")]
    pub create_time: Option<::prost_types::Timestamp>,
    #[prost(message, optional, tag = "4")]
    pub approximate_last_use_time: Option<::prost_types::Timestamp>,
    #[prost(string, tag = "5")]
    pub creator_role: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateSessionRequest {
    #[prost(string, tag = "1")]
    pub database: String,
    #[prost(message, optional, tag = "2")]
    pub session: Option<Session>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetSessionRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteSessionRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransactionOptions {
    #[prost(oneof = "transaction_options::Mode", tags = "1, 3")]
    pub mode: Option<transaction_options::Mode>,
    /// When `true`, the transaction's writes are not recorded in change
    /// streams with DDL option `allow_txn_exclusion=true`.
    #[prost(bool, tag = "5")]
    pub exclude_txn_from_change_streams: bool,
}

pub mod transaction_options {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ReadWrite {}

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PartitionedDml {}

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Mode {
        #[prost(message, tag = "1")]
        ReadWrite(ReadWrite),
        #[prost(message, tag = "3")]
        PartitionedDml(PartitionedDml),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Transaction {
    /// Opaque transaction id; empty for single-use transactions.
    #[prost(bytes = "vec", tag = "1")]
    pub id: Vec<u8>,
    #[prost(message, optional, tag = "2")]
    pub read_timestamp: Option<::prost_types::Timestamp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransactionSelector {
    #[prost(oneof = "transaction_selector::Selector", tags = "1, 2, 3")]
    pub selector: Option<transaction_selector::Selector>,
}

pub mod transaction_selector {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Selector {
        #[prost(message, tag = "1")]
        SingleUse(super::TransactionOptions),
        #[prost(bytes, tag = "2")]
        Id(Vec<u8>),
        /// Begin a new transaction as part of this request; the chosen id is
        /// returned in `ResultSetMetadata.transaction`.
        #[prost(message, tag = "3")]
        Begin(super::TransactionOptions),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BeginTransactionRequest {
    #[prost(string, tag = "1")]
    pub session: String,
    #[prost(message, optional, tag = "2")]
    pub options: Option<TransactionOptions>,
    #[prost(message, optional, tag = "3")]
    pub request_options: Option<RequestOptions>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestOptions {
    #[prost(enumeration = "request_options::Priority", tag = "1")]
    pub priority: i32,
    #[prost(string, tag = "2")]
    pub request_tag: String,
    #[prost(string, tag = "3")]
    pub transaction_tag: String,
}

pub mod request_options {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Priority {
        Unspecified = 0,
        Low = 1,
        Medium = 2,
        High = 3,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Type {
    #[prost(enumeration = "TypeCode", tag = "1")]
    pub code: i32,
    #[prost(message, optional, boxed, tag = "2")]
    pub array_element_type: Option<Box<Type>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum TypeCode {
    Unspecified = 0,
    Bool = 1,
    Int64 = 2,
    Float64 = 3,
    Timestamp = 4,
    Date = 5,
    String = 6,
    Bytes = 7,
    Array = 8,
    Struct = 9,
    Numeric = 10,
    Json = 11,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecuteSqlRequest {
    #[prost(string, tag = "1")]
    pub session: String,
    #[prost(message, optional, tag = "2")]
    pub transaction: Option<TransactionSelector>,
    #[prost(string, tag = "3")]
    pub sql: String,
    #[prost(message, optional, tag = "4")]
    pub params: Option<::prost_types::Struct>,
    #[prost(map = "string, message", tag = "5")]
    pub param_types: HashMap<String, Type>,
    #[prost(enumeration = "execute_sql_request::QueryMode", tag = "7")]
    pub query_mode: i32,
    /// Dedup sequence number for DML; see `Transaction::execute_update`.
    #[prost(int64, tag = "9")]
    pub seqno: i64,
    #[prost(message, optional, tag = "10")]
    pub query_options: Option<execute_sql_request::QueryOptions>,
    #[prost(message, optional, tag = "11")]
    pub request_options: Option<RequestOptions>,
}

pub mod execute_sql_request {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct QueryOptions {
        #[prost(string, tag = "1")]
        pub optimizer_version: String,
        #[prost(string, tag = "2")]
        pub optimizer_statistics_package: String,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum QueryMode {
        Normal = 0,
        Plan = 1,
        Profile = 2,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecuteBatchDmlRequest {
    #[prost(string, tag = "1")]
    pub session: String,
    #[prost(message, optional, tag = "2")]
    pub transaction: Option<TransactionSelector>,
    #[prost(message, repeated, tag = "3")]
    pub statements: Vec<execute_batch_dml_request::Statement>,
    /// One seqno covers the whole batch.
    #[prost(int64, tag = "4")]
    pub seqno: i64,
    #[prost(message, optional, tag = "5")]
    pub request_options: Option<RequestOptions>,
}

pub mod execute_batch_dml_request {
    use std::collections::HashMap;

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Statement {
        #[prost(string, tag = "1")]
        pub sql: String,
        #[prost(message, optional, tag = "2")]
        pub params: Option<::prost_types::Struct>,
        #[prost(map = "string, message", tag = "3")]
        pub param_types: HashMap<String, super::Type>,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecuteBatchDmlResponse {
    /// One result set per statement that ran, in execution order. On a
    /// non-OK `status` this covers the statements up to and including the
    /// failing one.
    #[prost(message, repeated, tag = "1")]
    pub result_sets: Vec<ResultSet>,
    #[prost(message, optional, tag = "2")]
    pub status: Option<rpc::Status>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadRequest {
    #[prost(string, tag = "1")]
    pub session: String,
    #[prost(message, optional, tag = "2")]
    pub transaction: Option<TransactionSelector>,
    #[prost(string, tag = "3")]
    pub table: String,
    #[prost(string, tag = "4")]
    pub index: String,
    #[prost(string, repeated, tag = "5")]
    pub columns: Vec<String>,
    #[prost(message, optional, tag = "6")]
    pub key_set: Option<KeySet>,
    #[prost(int64, tag = "8")]
    pub limit: i64,
    #[prost(message, optional, tag = "11")]
    pub request_options: Option<RequestOptions>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KeySet {
    #[prost(message, repeated, tag = "1")]
    pub keys: Vec<::prost_types::ListValue>,
    #[prost(message, repeated, tag = "2")]
    pub ranges: Vec<KeyRange>,
    #[prost(bool, tag = "3")]
    pub all: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KeyRange {
    #[prost(oneof = "key_range::StartKeyType", tags = "1, 2")]
    pub start_key_type: Option<key_range::StartKeyType>,
    #[prost(oneof = "key_range::EndKeyType", tags = "3, 4")]
    pub end_key_type: Option<key_range::EndKeyType>,
}

pub mod key_range {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum StartKeyType {
        #[prost(message, tag = "1")]
        StartClosed(::prost_types::ListValue),
        #[prost(message, tag = "2")]
        StartOpen(::prost_types::ListValue),
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum EndKeyType {
        #[prost(message, tag = "3")]
        EndClosed(::prost_types::ListValue),
        #[prost(message, tag = "4")]
        EndOpen(::prost_types::ListValue),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Mutation {
    #[prost(oneof = "mutation::Operation", tags = "1, 2, 3, 4, 5")]
    pub operation: Option<mutation::Operation>,
}

pub mod mutation {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Write {
        #[prost(string, tag = "1")]
        pub table: String,
        #[prost(string, repeated, tag = "2")]
        pub columns: Vec<String>,
        #[prost(message, repeated, tag = "3")]
        pub values: Vec<::prost_types::ListValue>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Delete {
        #[prost(string, tag = "1")]
        pub table: String,
        #[prost(message, optional, tag = "2")]
        pub key_set: Option<super::KeySet>,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Operation {
        #[prost(message, tag = "1")]
        Insert(Write),
        #[prost(message, tag = "2")]
        Update(Write),
        #[prost(message, tag = "3")]
        InsertOrUpdate(Write),
        #[prost(message, tag = "4")]
        Replace(Write),
        #[prost(message, tag = "5")]
        Delete(Delete),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommitRequest {
    #[prost(string, tag = "1")]
    pub session: String,
    /// Applied atomically in list order.
    #[prost(message, repeated, tag = "4")]
    pub mutations: Vec<Mutation>,
    #[prost(bool, tag = "5")]
    pub return_commit_stats: bool,
    #[prost(message, optional, tag = "6")]
    pub request_options: Option<RequestOptions>,
    #[prost(message, optional, tag = "8")]
    pub max_commit_delay: Option<::prost_types::Duration>,
    #[prost(oneof = "commit_request::Transaction", tags = "2, 3")]
    pub transaction: Option<commit_request::Transaction>,
}

pub mod commit_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Transaction {
        #[prost(bytes, tag = "2")]
        TransactionId(Vec<u8>),
        #[prost(message, tag = "3")]
        SingleUseTransaction(super::TransactionOptions),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommitResponse {
    #[prost(message, optional, tag = "1")]
    pub commit_timestamp: Option<::prost_types::Timestamp>,
    #[prost(message, optional, tag = "2")]
    pub commit_stats: Option<commit_response::CommitStats>,
}

pub mod commit_response {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CommitStats {
        #[prost(int64, tag = "1")]
        pub mutation_count: i64,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RollbackRequest {
    #[prost(string, tag = "1")]
    pub session: String,
    #[prost(bytes = "vec", tag = "2")]
    pub transaction_id: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResultSet {
    #[prost(message, optional, tag = "1")]
    pub metadata: Option<ResultSetMetadata>,
    #[prost(message, repeated, tag = "2")]
    pub rows: Vec<::prost_types::ListValue>,
    #[prost(message, optional, tag = "3")]
    pub stats: Option<ResultSetStats>,
}

impl ResultSet {
    /// The id of the transaction this result set began, when the request
    /// carried a `begin` selector.
    pub fn transaction_id(&self) -> Option<&[u8]> {
        self.metadata
            .as_ref()
            .and_then(|m| m.transaction.as_ref())
            .map(|t| t.id.as_slice())
            .filter(|id| !id.is_empty())
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResultSetMetadata {
    #[prost(message, optional, tag = "1")]
    pub row_type: Option<StructType>,
    #[prost(message, optional, tag = "2")]
    pub transaction: Option<Transaction>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StructType {
    #[prost(message, repeated, tag = "1")]
    pub fields: Vec<struct_type::Field>,
}

pub mod struct_type {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Field {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(message, optional, tag = "2")]
        pub r#type: Option<super::Type>,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResultSetStats {
    #[prost(oneof = "result_set_stats::RowCount", tags = "3, 4")]
    pub row_count: Option<result_set_stats::RowCount>,
}

pub mod result_set_stats {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum RowCount {
        #[prost(int64, tag = "3")]
        RowCountExact(i64),
        /// Lower bound reported for partitioned DML.
        #[prost(int64, tag = "4")]
        RowCountLowerBound(i64),
    }
}
