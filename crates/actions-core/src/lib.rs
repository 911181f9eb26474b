//! `actions-core`: the handlers behind an agent's action groups.
//!
//! An agent calls an action group with a flat list of named parameters. Each
//! handler here turns that call into one or two requests against a managed
//! backend and answers with a response envelope the agent runtime accepts.
//!
//! ```text
//! InvocationEvent ──► ActionRequest ──► Operation::resolve
//!                                            │
//!                                            ▼
//!                                  handlers::<kind>::run ──► Backends (traits)
//!                                            │
//!                                            ▼
//!                      ResponseSizer (inline | spill to ObjectStore)
//!                                            │
//!                                            ▼
//!                                  ActionResponse ──► ResponseEnvelope
//! ```
//!
//! Every failure is folded into the envelope by [`router::ActionRouter`]; the
//! caller always receives a response, never a transport error.

pub mod backends;
pub mod config;
pub mod envelope;
pub mod error;
pub mod fs_store;
pub mod generation;
pub mod handlers;
pub mod http;
pub mod params;
pub mod poll;
pub mod router;
pub mod spill;
pub mod storage;

pub use error::{ActionError, Result};
pub use router::ActionRouter;
