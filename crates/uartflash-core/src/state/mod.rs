//! State machine module.

pub mod handlers;
pub mod machine;

pub use handlers::{ChunkResponse, HandleResult, HandlerContext, classify_response, handle_failure, handle_response};
pub use machine::{ChunkTracker, TransferContext, TransferState};
