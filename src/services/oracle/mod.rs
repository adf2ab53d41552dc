//! Oracle Service
//!
//! Everything between the orchestrator and the LLM provider: instructions,
//! per-project sessions, response decoding and the retrying gateway.

pub mod decoder;
pub mod gateway;
pub mod prompts;
pub mod session;

pub use decoder::{MalformedResponse, ResponseDecoder};
pub use gateway::{OracleFailure, OracleGateway, OracleRequest, RetryPolicy};
pub use prompts::OracleTask;
pub use session::OracleSession;
