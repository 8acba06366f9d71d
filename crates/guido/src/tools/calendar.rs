use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::registry::{parse_arguments, ToolHandler};
use crate::calendar::{CalendarBackend, CalendarError, CalendarEvent, EventDateTime};
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;

const TIME_FORMAT_HINT: &str = "in RFC3339 format: YYYY-MM-DDTHH:MM:SSZ";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EventArgs {
    summary: String,
    start: String,
    end: String,
    description: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateArgs {
    id: String,
    summary: String,
    start: String,
    end: String,
    description: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WindowArgs {
    start: String,
    end: String,
}

fn parse_time(field: &str, value: &str) -> AgentResult<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).map_err(|e| {
        AgentError::InvalidParameters(format!(
            "{} must be {}, got '{}' ({})",
            field, TIME_FORMAT_HINT, value, e
        ))
    })
}

/// Both ends parsed and in order
fn parse_window(
    start: &str,
    end: &str,
) -> AgentResult<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let start = parse_time("start", start)?;
    let end = parse_time("end", end)?;
    if end <= start {
        return Err(AgentError::InvalidParameters(
            "end must be later than start".into(),
        ));
    }
    Ok((start, end))
}

fn build_event(
    summary: String,
    start: String,
    end: String,
    description: String,
    location: Option<String>,
) -> AgentResult<CalendarEvent> {
    if summary.trim().is_empty() {
        return Err(AgentError::InvalidParameters("summary must not be empty".into()));
    }
    parse_window(&start, &end)?;
    Ok(CalendarEvent::new(summary, EventDateTime::at(start), EventDateTime::at(end))
        .with_description(description)
        .with_location(location))
}

fn execution_error(error: CalendarError) -> AgentError {
    AgentError::ExecutionError(error.to_string())
}

fn to_value<T: serde::Serialize>(value: &T) -> AgentResult<Value> {
    serde_json::to_value(value).map_err(|e| AgentError::Internal(e.to_string()))
}

fn event_properties() -> Value {
    json!({
        "summary": {
            "type": "string",
            "description": "The title of the event."
        },
        "start": {
            "type": "string",
            "description": format!(
                "The event start time {}. If not provided by the user, estimate based on the type of activity being scheduled.",
                TIME_FORMAT_HINT
            )
        },
        "end": {
            "type": "string",
            "description": format!(
                "The event end time {}. If not provided by the user, estimate based on the type of activity being scheduled.",
                TIME_FORMAT_HINT
            )
        },
        "description": {
            "type": "string",
            "description": "A brief description of the event."
        },
        "location": {
            "type": ["string", "null"],
            "description": "The location of the event. If it is not explicitly provided by the user or you are unable to confidently guess it from the conversation, leave blank."
        }
    })
}

pub struct CreateEventTool {
    tool: Tool,
    calendar: Arc<dyn CalendarBackend>,
}

impl CreateEventTool {
    pub fn new(calendar: Arc<dyn CalendarBackend>) -> Self {
        let tool = Tool::new(
            "create_calendar_event",
            "Create an event in the user's calendar. Use this when you need to schedule \
             something in the user's calendar.",
            json!({
                "type": "object",
                "properties": event_properties(),
                "required": ["summary", "start", "end", "description", "location"],
                "additionalProperties": false
            }),
        );
        Self { tool, calendar }
    }
}

#[async_trait]
impl ToolHandler for CreateEventTool {
    fn declaration(&self) -> &Tool {
        &self.tool
    }

    async fn call(&self, arguments: Value) -> AgentResult<Value> {
        let args: EventArgs = parse_arguments(arguments)?;
        let event = build_event(
            args.summary,
            args.start,
            args.end,
            args.description,
            args.location,
        )?;
        let created = self.calendar.create(&event).await.map_err(execution_error)?;
        to_value(&created)
    }
}

pub struct ReadCalendarTool {
    tool: Tool,
    calendar: Arc<dyn CalendarBackend>,
}

impl ReadCalendarTool {
    pub fn new(calendar: Arc<dyn CalendarBackend>) -> Self {
        let tool = Tool::new(
            "read_calendar",
            "List the events in the user's calendar between two points in time, in \
             chronological order. Use this to answer questions about the user's schedule \
             and to find the id of an event before updating it.",
            json!({
                "type": "object",
                "properties": {
                    "start": {
                        "type": "string",
                        "description": format!("Start of the time window {}.", TIME_FORMAT_HINT)
                    },
                    "end": {
                        "type": "string",
                        "description": format!("End of the time window {}.", TIME_FORMAT_HINT)
                    }
                },
                "required": ["start", "end"],
                "additionalProperties": false
            }),
        );
        Self { tool, calendar }
    }
}

#[async_trait]
impl ToolHandler for ReadCalendarTool {
    fn declaration(&self) -> &Tool {
        &self.tool
    }

    async fn call(&self, arguments: Value) -> AgentResult<Value> {
        let args: WindowArgs = parse_arguments(arguments)?;
        let (start, end) = parse_window(&args.start, &args.end)?;
        let events = self
            .calendar
            .list(start.with_timezone(&Utc), end.with_timezone(&Utc))
            .await
            .map_err(execution_error)?;
        Ok(json!({ "events": to_value(&events)? }))
    }
}

pub struct UpdateEventTool {
    tool: Tool,
    calendar: Arc<dyn CalendarBackend>,
}

impl UpdateEventTool {
    pub fn new(calendar: Arc<dyn CalendarBackend>) -> Self {
        let mut properties = event_properties();
        properties["id"] = json!({
            "type": "string",
            "description": "The id of the event to update, as returned by read_calendar."
        });
        let tool = Tool::new(
            "update_calendar_event",
            "Update an existing event in the user's calendar. Every field is replaced, so \
             pass the current values for anything that should stay the same.",
            json!({
                "type": "object",
                "properties": properties,
                "required": ["id", "summary", "start", "end", "description", "location"],
                "additionalProperties": false
            }),
        );
        Self { tool, calendar }
    }
}

#[async_trait]
impl ToolHandler for UpdateEventTool {
    fn declaration(&self) -> &Tool {
        &self.tool
    }

    async fn call(&self, arguments: Value) -> AgentResult<Value> {
        let args: UpdateArgs = parse_arguments(arguments)?;
        if args.id.trim().is_empty() {
            return Err(AgentError::InvalidParameters("id must not be empty".into()));
        }
        let event = build_event(
            args.summary,
            args.start,
            args.end,
            args.description,
            args.location,
        )?;
        let mut updated = self
            .calendar
            .update(&args.id, &event)
            .await
            .map_err(execution_error)?;
        // the identifier of an existing event never changes
        updated.id = Some(args.id);
        to_value(&updated)
    }
}
