//! Core read-write transaction machinery for a Cloud Spanner database.
//!
//! The pieces compose bottom-up: [`apiv1::spanner_client::Client`] stamps
//! metadata and transparently retries transport hiccups;
//! [`session::Session`] owns a server-side session and hands out one
//! [`transaction::Transaction`] at a time; the transaction begins lazily on
//! its first data call, buffers mutations, and commits or rolls back; and
//! [`Session::run_in_transaction`] re-runs a whole unit of work whenever
//! the server aborts it.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tonic::Status;
//!
//! use spanner_core::mutation::insert;
//! use spanner_core::session::Session;
//! use spanner_core::statement::Statement;
//!
//! async fn add_member(session: &Session) -> Result<i64, Status> {
//!     session
//!         .run_in_transaction(
//!             |tx| async move {
//!                 let mut stmt = Statement::new("UPDATE Guild SET MemberCount = MemberCount + 1 WHERE GuildId = @id");
//!                 stmt.add_param("id", &"guild-1");
//!                 let updated = tx.execute_update(stmt, None).await?;
//!                 tx.buffer_write(vec![insert("Member", &["GuildId", "UserId"], &[&"guild-1", &"user-7"])])?;
//!                 Ok(updated)
//!             },
//!             None,
//!         )
//!         .await
//! }
//! ```

pub mod apiv1;
pub mod key;
pub mod mutation;
pub mod names;
pub mod proto;
pub mod retry;
pub mod runner;
pub mod session;
pub mod statement;
pub mod transaction;
pub mod value;

pub use session::Session;
pub use transaction::Transaction;
