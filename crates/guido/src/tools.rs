//! Tools the model may call instead of answering directly.
//!
//! Every tool is a [`ToolHandler`] registered in a [`ToolRegistry`]. The registry
//! is the only thing the agent talks to: it validates arguments, runs the tool and
//! turns whatever happened into text for the transcript.
mod calendar;
mod registry;
mod web_search;

pub use calendar::{CreateEventTool, ReadCalendarTool, UpdateEventTool};
pub use registry::{
    failure_message, parse_arguments, ToolHandler, ToolRegistry, UNKNOWN_TOOL_MESSAGE,
};
pub use web_search::SearchWebTool;
