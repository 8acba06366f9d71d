//! These models represent the objects passed around by the agent
//!
//! There are a few related formats we need to interact with:
//! - the responses api input/output items, sent between the agent and the LLM
//! - the stream events, sent from the agent to a transport
//! - tool arguments and results, sent between the agent and its collaborators
//!
//! We always immediately convert external data models into the internal structs
//! using to/from helpers, so the internal models are not an exact match to any of them.
pub mod event;
pub mod message;
pub mod role;
pub mod tool;
