//! `google.rpc` messages carried inside responses and error trailers.

/// Statement-level status returned by ExecuteBatchDml. `code` is a
/// `google.rpc.Code` value; `0` is OK.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Status {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, repeated, tag = "3")]
    pub details: Vec<::prost_types::Any>,
}

impl Status {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Server retry hint decoded from the `google.rpc.retryinfo-bin` trailer of
/// an Aborted error.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RetryInfo {
    #[prost(message, optional, tag = "1")]
    pub retry_delay: Option<::prost_types::Duration>,
}
