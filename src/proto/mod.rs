//! Wire message contents for the Spanner v1 data plane.
//!
//! Only the messages the session/transaction core sends and receives are
//! defined here, with the protobuf field tags of the service definition.
//! Framing and channel construction live behind [`crate::apiv1::service`].

pub mod rpc;
pub mod spanner;
