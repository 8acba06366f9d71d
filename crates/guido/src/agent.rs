use anyhow::anyhow;
use chrono::Utc;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::ReplyError;
use crate::mode::Mode;
use crate::models::event::StreamEvent;
use crate::models::message::{Message, ToolRequest};
use crate::providers::base::{Provider, ProviderEvent, Usage};
use crate::speech::{Audio, Synthesizer};
use crate::tools::ToolRegistry;
use crate::transcript::Transcript;

pub const DEFAULT_MAX_TURNS: usize = 5;

/// What the user hears when no answer was reached within the turn budget
pub const EXHAUSTED_APOLOGY: &str =
    "Sorry, I wasn't able to finish that request. Could you try rephrasing it or breaking it into smaller steps?";

/// How a blocking reply ended
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    Answer(String),
    Exhausted,
}

impl ReplyOutcome {
    pub fn into_text(self) -> String {
        match self {
            ReplyOutcome::Answer(text) => text,
            ReplyOutcome::Exhausted => EXHAUSTED_APOLOGY.to_string(),
        }
    }
}

/// Agent drives the completion service through a bounded number of tool rounds
/// until it produces an answer
pub struct Agent {
    provider: Box<dyn Provider>,
    tools: ToolRegistry,
    max_turns: usize,
    synthesizer: Option<Box<dyn Synthesizer>>,
}

/// Non-blank text means the model is done
fn final_text(response: &Message) -> Option<String> {
    let text = response.text();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn log_usage(turn: usize, usage: &Usage) {
    debug!(
        turn,
        input_tokens = ?usage.input_tokens,
        output_tokens = ?usage.output_tokens,
        total_tokens = ?usage.total_tokens,
        "completion usage"
    );
}

impl Agent {
    pub fn new(provider: Box<dyn Provider>, tools: ToolRegistry) -> Self {
        Self {
            provider,
            tools,
            max_turns: DEFAULT_MAX_TURNS,
            synthesizer: None,
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Used to voice final answers when streaming in speech mode
    pub fn with_synthesizer(mut self, synthesizer: Box<dyn Synthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Set the system instruction for the mode and add the user's query
    fn begin(transcript: &mut Transcript, query: &str, mode: Mode) -> Result<(), ReplyError> {
        transcript.set_system_prompt(mode.system_prompt(Utc::now())?);
        transcript.push(Message::user().with_text(query))?;
        Ok(())
    }

    /// Append the assistant turn and its results in one step. A reply dropped
    /// mid-dispatch leaves the transcript without a call it never answered.
    fn record_tool_turn(
        transcript: &mut Transcript,
        response: Message,
        results: Vec<Message>,
    ) -> Result<(), ReplyError> {
        transcript.push(response)?;
        for result in results {
            transcript.push(result)?;
        }
        Ok(())
    }

    async fn run_tool(&self, request: &ToolRequest) -> Message {
        let output = self.tools.dispatch_request(request).await;
        Message::tool().with_tool_response(request.id.clone(), output)
    }

    async fn speak(&self, text: &str) -> Option<Audio> {
        let synthesizer = self.synthesizer.as_ref()?;
        match synthesizer.synthesize(text).await {
            Ok(audio) => Some(audio),
            Err(error) => {
                warn!(%error, "speech synthesis failed, answering with text only");
                None
            }
        }
    }

    /// Answer one query, blocking on each completion.
    ///
    /// Everything exchanged is appended to `transcript`. Running out of turns is
    /// not an error here: the outcome says so and renders as an apology.
    pub async fn reply(
        &self,
        transcript: &mut Transcript,
        query: &str,
        mode: Mode,
        cancel: &CancellationToken,
    ) -> Result<ReplyOutcome, ReplyError> {
        Self::begin(transcript, query, mode)?;
        let tools = self.tools.declarations();

        for turn in 0..self.max_turns {
            if cancel.is_cancelled() {
                return Err(ReplyError::Cancelled);
            }

            let (response, usage) = self.provider.complete(transcript.messages(), &tools).await?;
            log_usage(turn, &usage);

            if let Some(text) = final_text(&response) {
                transcript.push(Message::assistant().with_text(text.clone()))?;
                return Ok(ReplyOutcome::Answer(text));
            }

            let mut results = Vec::new();
            for request in response.tool_requests() {
                results.push(self.run_tool(request).await);
            }
            Self::record_tool_turn(transcript, response, results)?;
        }

        warn!(max_turns = self.max_turns, "no answer within the turn budget");
        Ok(ReplyOutcome::Exhausted)
    }

    /// Answer one query as a stream of events.
    ///
    /// In text mode every delta is forwarded as it arrives. In speech mode deltas
    /// are dropped and the finished answer is sent once, followed by its audio
    /// when a synthesizer is configured. Running out of turns ends the stream
    /// with [`ReplyError::TurnBudgetExhausted`].
    pub fn reply_stream<'a>(
        &'a self,
        transcript: &'a mut Transcript,
        query: String,
        mode: Mode,
        cancel: CancellationToken,
    ) -> BoxStream<'a, Result<StreamEvent, ReplyError>> {
        Box::pin(async_stream::try_stream! {
            Self::begin(transcript, &query, mode)?;
            let tools = self.tools.declarations();

            for turn in 0..self.max_turns {
                if cancel.is_cancelled() {
                    Err::<(), _>(ReplyError::Cancelled)?;
                }

                let mut events = self.provider.stream(transcript.messages(), &tools).await?;
                let mut completed = None;
                while let Some(event) = events.try_next().await? {
                    match event {
                        ProviderEvent::TextDelta(delta) => {
                            if mode == Mode::Text && !delta.is_empty() {
                                yield StreamEvent::text(delta);
                            }
                        }
                        ProviderEvent::Completed(message, usage) => {
                            completed = Some((message, usage));
                            break;
                        }
                    }
                }

                let (response, usage) = completed
                    .ok_or_else(|| anyhow!("Response stream ended without a completed response"))?;
                log_usage(turn, &usage);

                if let Some(text) = final_text(&response) {
                    transcript.push(Message::assistant().with_text(text.clone()))?;
                    if mode == Mode::Speech {
                        yield StreamEvent::text(text.clone());
                        if let Some(audio) = self.speak(&text).await {
                            yield StreamEvent::audio(&audio.data, audio.mime_type);
                        }
                    }
                    return;
                }

                let requests: Vec<ToolRequest> =
                    response.tool_requests().into_iter().cloned().collect();
                let mut results = Vec::with_capacity(requests.len());
                for request in &requests {
                    yield StreamEvent::tool_call(request.tool_call.name.clone());
                    results.push(self.run_tool(request).await);
                }
                Self::record_tool_turn(transcript, response, results)?;
            }

            warn!(max_turns = self.max_turns, "no answer within the turn budget");
            Err::<(), _>(ReplyError::TurnBudgetExhausted {
                max_turns: self.max_turns,
            })?;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{CalendarBackend, CalendarEvent, CalendarResult};
    use crate::models::role::Role;
    use crate::models::tool::{Tool, ToolCall};
    use crate::providers::mock::MockProvider;
    use crate::tools::{CreateEventTool, ToolHandler, UNKNOWN_TOOL_MESSAGE};
    use crate::errors::AgentResult;
    use async_trait::async_trait;
    use chrono::DateTime;
    use futures::StreamExt;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Records the arguments of every call, in order
    #[derive(Clone)]
    struct RecordingTool {
        tool: Tool,
        calls: Arc<Mutex<Vec<Value>>>,
    }

    impl RecordingTool {
        fn new(name: &str) -> Self {
            Self {
                tool: Tool::new(
                    name,
                    "Records its arguments",
                    json!({"type": "object", "properties": {}, "additionalProperties": true}),
                ),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn calls(&self) -> Vec<Value> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolHandler for RecordingTool {
        fn declaration(&self) -> &Tool {
            &self.tool
        }

        async fn call(&self, arguments: Value) -> AgentResult<Value> {
            self.calls.lock().unwrap().push(arguments.clone());
            Ok(json!({"received": arguments}))
        }
    }

    #[derive(Default)]
    struct RecordingCalendar {
        created: Mutex<Vec<CalendarEvent>>,
    }

    #[async_trait]
    impl CalendarBackend for RecordingCalendar {
        async fn create(&self, event: &CalendarEvent) -> CalendarResult<CalendarEvent> {
            let mut created = event.clone();
            created.id = Some("evt_1".to_string());
            self.created.lock().unwrap().push(created.clone());
            Ok(created)
        }

        async fn update(&self, _id: &str, event: &CalendarEvent) -> CalendarResult<CalendarEvent> {
            Ok(event.clone())
        }

        async fn list(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> CalendarResult<Vec<CalendarEvent>> {
            Ok(Vec::new())
        }
    }

    struct FixedSynthesizer(bool);

    #[async_trait]
    impl Synthesizer for FixedSynthesizer {
        async fn synthesize(&self, _text: &str) -> anyhow::Result<Audio> {
            if self.0 {
                Ok(Audio {
                    data: vec![1, 2, 3],
                    mime_type: "audio/mpeg".to_string(),
                })
            } else {
                Err(anyhow!("synthesis unavailable"))
            }
        }
    }

    fn agent(provider: &MockProvider, tools: Vec<Box<dyn ToolHandler>>) -> Agent {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool).unwrap();
        }
        Agent::new(Box::new(provider.clone()), registry)
    }

    fn tool_call(id: &str, name: &str, arguments: Value) -> Message {
        Message::assistant().with_tool_request(id, ToolCall::new(name, arguments))
    }

    async fn collect(
        agent: &Agent,
        transcript: &mut Transcript,
        query: &str,
        mode: Mode,
    ) -> Vec<Result<StreamEvent, ReplyError>> {
        agent
            .reply_stream(transcript, query.to_string(), mode, CancellationToken::new())
            .collect()
            .await
    }

    /// Tool outputs recorded in the transcript, with their call ids
    fn tool_outputs(transcript: &Transcript) -> Vec<(String, String)> {
        transcript
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .flat_map(|m| m.content.iter().filter_map(|c| c.as_tool_response()))
            .map(|r| (r.id.clone(), r.output.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_simple_answer() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("Hello!")]);
        let agent = agent(&provider, Vec::new());
        let mut transcript = Transcript::new("");

        let outcome = agent
            .reply(&mut transcript, "Hi", Mode::Text, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, ReplyOutcome::Answer("Hello!".to_string()));
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.messages()[1].text(), "Hi");
        assert_eq!(transcript.last().unwrap().text(), "Hello!");
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_final_text_stops_dispatch() {
        let tool = RecordingTool::new("record");
        let provider = MockProvider::new(vec![Message::assistant()
            .with_text("Already done.")
            .with_tool_request("call_1", ToolCall::new("record", json!({})))]);
        let agent = agent(&provider, vec![Box::new(tool.clone())]);
        let mut transcript = Transcript::new("");

        let outcome = agent
            .reply(&mut transcript, "Do it", Mode::Text, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.into_text(), "Already done.");
        assert!(tool.calls().is_empty());
        assert!(transcript.last().unwrap().tool_requests().is_empty());
    }

    #[tokio::test]
    async fn test_dentist_appointment() {
        let calendar = Arc::new(RecordingCalendar::default());
        let provider = MockProvider::new(vec![
            tool_call(
                "call_1",
                "create_calendar_event",
                json!({
                    "summary": "Dentist appointment",
                    "start": "2025-03-15T15:00:00Z",
                    "end": "2025-03-15T16:00:00Z",
                    "description": "Dentist appointment",
                    "location": null
                }),
            ),
            Message::assistant().with_text("Your dentist appointment is booked for 3pm tomorrow."),
        ]);
        let agent = agent(&provider, vec![Box::new(CreateEventTool::new(calendar.clone()))]);
        let mut transcript = Transcript::new("");

        let events = collect(
            &agent,
            &mut transcript,
            "Schedule a dentist appointment tomorrow at 3pm for 1 hour",
            Mode::Text,
        )
        .await;
        let events: Vec<StreamEvent> = events.into_iter().map(Result::unwrap).collect();

        let notices: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::ToolCallNotice { .. }))
            .collect();
        assert_eq!(notices, vec![&StreamEvent::tool_call("create_calendar_event")]);
        assert_eq!(events[0], StreamEvent::tool_call("create_calendar_event"));

        let text: String = events.iter().filter_map(|e| e.as_text()).collect();
        assert_eq!(text, "Your dentist appointment is booked for 3pm tomorrow.");

        let created = calendar.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        let start = DateTime::parse_from_rfc3339(created[0].start.date_time.as_deref().unwrap())
            .unwrap();
        let end =
            DateTime::parse_from_rfc3339(created[0].end.date_time.as_deref().unwrap()).unwrap();
        assert_eq!(end - start, chrono::Duration::hours(1));

        assert_eq!(provider.requests().len(), 2);
        let outputs = tool_outputs(&transcript);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].0, "call_1");
        assert!(outputs[0].1.contains("evt_1"));
    }

    #[tokio::test]
    async fn test_tool_calls_run_in_order_with_call_ids() {
        let tool = RecordingTool::new("record");
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("call_a", ToolCall::new("record", json!({"step": 1})))
                .with_tool_request("call_b", ToolCall::new("record", json!({"step": 2})))
                .with_tool_request("call_c", ToolCall::new("record", json!({"step": 3}))),
            Message::assistant().with_text("All three done."),
        ]);
        let agent = agent(&provider, vec![Box::new(tool.clone())]);
        let mut transcript = Transcript::new("");

        agent
            .reply(&mut transcript, "Go", Mode::Text, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            tool.calls(),
            vec![json!({"step": 1}), json!({"step": 2}), json!({"step": 3})]
        );
        let ids: Vec<_> = tool_outputs(&transcript).into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["call_a", "call_b", "call_c"]);

        // the second request carries the assistant turn followed by its results
        let second = &provider.requests()[1];
        assert_eq!(second.len(), 6);
        assert_eq!(second[2].tool_requests().len(), 3);
        assert!(second[3..].iter().all(|m| m.role == Role::Tool));
    }

    #[tokio::test]
    async fn test_tool_failures_are_fed_back() {
        let provider = MockProvider::new(vec![
            tool_call("call_1", "create_calendar_event", json!({"summary": "Dentist"})),
            Message::assistant().with_text("I couldn't book that."),
        ]);
        let calendar = Arc::new(RecordingCalendar::default());
        let agent = agent(&provider, vec![Box::new(CreateEventTool::new(calendar.clone()))]);
        let mut transcript = Transcript::new("");

        let outcome = agent
            .reply(&mut transcript, "Book it", Mode::Text, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.into_text(), "I couldn't book that.");
        let outputs = tool_outputs(&transcript);
        assert!(outputs[0].1.starts_with("The tool call failed"));
        assert!(outputs[0].1.contains("inform the user"));
        assert!(calendar.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_exhausts_budget() {
        let provider = MockProvider::repeating(tool_call("call_x", "teleport", json!({})));
        let agent = agent(&provider, vec![Box::new(RecordingTool::new("record"))]);
        let mut transcript = Transcript::new("");

        let outcome = agent
            .reply(&mut transcript, "Beam me up", Mode::Text, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, ReplyOutcome::Exhausted);
        assert_eq!(outcome.into_text(), EXHAUSTED_APOLOGY);
        assert_eq!(provider.requests().len(), DEFAULT_MAX_TURNS);

        let outputs = tool_outputs(&transcript);
        assert_eq!(outputs.len(), DEFAULT_MAX_TURNS);
        assert!(outputs.iter().all(|(_, output)| output == UNKNOWN_TOOL_MESSAGE));
    }

    #[tokio::test]
    async fn test_stream_exhaustion_is_an_error() {
        let provider = MockProvider::repeating(tool_call("call_x", "teleport", json!({})));
        let agent = agent(&provider, Vec::new()).with_max_turns(3);
        let mut transcript = Transcript::new("");

        let events = collect(&agent, &mut transcript, "Beam me up", Mode::Text).await;

        assert_eq!(events.len(), 4);
        assert!(events[..3]
            .iter()
            .all(|e| matches!(e, Ok(StreamEvent::ToolCallNotice { .. }))));
        assert!(matches!(
            events[3],
            Err(ReplyError::TurnBudgetExhausted { max_turns: 3 })
        ));
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_text_mode_streams_deltas() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("It is sunny today.")]);
        let agent = agent(&provider, Vec::new());
        let mut transcript = Transcript::new("");

        let events = collect(&agent, &mut transcript, "Weather?", Mode::Text).await;

        assert_eq!(events.len(), 4);
        assert_eq!(*events[0].as_ref().unwrap(), StreamEvent::text("It "));
        assert!(!transcript.system_prompt().contains("read aloud"));
    }

    #[tokio::test]
    async fn test_speech_mode_sends_whole_answer_then_audio() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("It is sunny today.")]);
        let agent = agent(&provider, Vec::new())
            .with_synthesizer(Box::new(FixedSynthesizer(true)));
        let mut transcript = Transcript::new("");

        let events: Vec<StreamEvent> = collect(&agent, &mut transcript, "Weather?", Mode::Speech)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(
            events,
            vec![
                StreamEvent::text("It is sunny today."),
                StreamEvent::audio(&[1, 2, 3], "audio/mpeg"),
            ]
        );
        assert!(transcript.system_prompt().contains("read aloud"));
        assert!(provider.requests()[0][0].text().contains("read aloud"));
    }

    #[tokio::test]
    async fn test_speech_mode_survives_synthesis_failure() {
        let provider = MockProvider::new(vec![
            tool_call("call_1", "record", json!({})),
            Message::assistant().with_text("Done."),
        ]);
        let agent = agent(&provider, vec![Box::new(RecordingTool::new("record"))])
            .with_synthesizer(Box::new(FixedSynthesizer(false)));
        let mut transcript = Transcript::new("");

        let events: Vec<StreamEvent> = collect(&agent, &mut transcript, "Go", Mode::Speech)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(
            events,
            vec![StreamEvent::tool_call("record"), StreamEvent::text("Done.")]
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("Hello!")]);
        let agent = agent(&provider, Vec::new());
        let mut transcript = Transcript::new("");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = agent.reply(&mut transcript, "Hi", Mode::Text, &cancel).await;
        assert!(matches!(result, Err(ReplyError::Cancelled)));

        let events: Vec<_> = agent
            .reply_stream(&mut transcript, "Hi".to_string(), Mode::Text, cancel)
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(ReplyError::Cancelled)));
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_transcript_grows_monotonically_across_queries() {
        let provider = MockProvider::new(vec![
            Message::assistant().with_text("Hello!"),
            tool_call("call_1", "record", json!({})),
            Message::assistant().with_text("Recorded."),
        ]);
        let agent = agent(&provider, vec![Box::new(RecordingTool::new("record"))]);
        let mut transcript = Transcript::new("");
        let cancel = CancellationToken::new();

        agent
            .reply(&mut transcript, "Hi", Mode::Text, &cancel)
            .await
            .unwrap();
        let first = transcript.messages()[1..].to_vec();

        collect(&agent, &mut transcript, "Record it", Mode::Speech).await;

        assert_eq!(transcript.len(), 1 + first.len() + 4);
        assert_eq!(&transcript.messages()[1..=first.len()], &first[..]);
        assert_eq!(
            transcript
                .messages()
                .iter()
                .filter(|m| m.role == Role::System)
                .count(),
            1
        );
    }

    struct SlowTool {
        tool: Tool,
    }

    impl SlowTool {
        fn new() -> Self {
            Self {
                tool: Tool::new(
                    "slow",
                    "Takes a long time",
                    json!({"type": "object", "properties": {}, "additionalProperties": false}),
                ),
            }
        }
    }

    #[async_trait]
    impl ToolHandler for SlowTool {
        fn declaration(&self) -> &Tool {
            &self.tool
        }

        async fn call(&self, _arguments: Value) -> AgentResult<Value> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(json!({"done": true}))
        }
    }

    /// Call ids requested by the assistant and answered by tool messages
    fn call_ids(transcript: &Transcript) -> (Vec<String>, Vec<String>) {
        let requested = transcript
            .messages()
            .iter()
            .flat_map(|m| m.tool_requests())
            .map(|r| r.id.clone())
            .collect();
        let answered = tool_outputs(transcript).into_iter().map(|(id, _)| id).collect();
        (requested, answered)
    }

    #[tokio::test]
    async fn test_dropped_reply_leaves_no_unanswered_call() {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("call_1", ToolCall::new("record", json!({})))
                .with_tool_request("call_2", ToolCall::new("slow", json!({}))),
            Message::assistant().with_text("Done."),
        ]);
        let agent = agent(
            &provider,
            vec![Box::new(RecordingTool::new("record")), Box::new(SlowTool::new())],
        );
        let mut transcript = Transcript::new("");

        let dropped = tokio::time::timeout(
            Duration::from_millis(50),
            agent.reply(&mut transcript, "Do both", Mode::Text, &CancellationToken::new()),
        )
        .await;
        assert!(dropped.is_err());

        let (requested, answered) = call_ids(&transcript);
        assert!(requested.is_empty());
        assert!(answered.is_empty());
        assert_eq!(transcript.last().unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn test_dropped_stream_leaves_no_unanswered_call() {
        let provider = MockProvider::new(vec![tool_call("call_1", "slow", json!({}))]);
        let agent = agent(&provider, vec![Box::new(SlowTool::new())]);
        let mut transcript = Transcript::new("");

        {
            let mut stream = agent.reply_stream(
                &mut transcript,
                "Take your time".to_string(),
                Mode::Text,
                CancellationToken::new(),
            );
            assert_eq!(
                stream.next().await.unwrap().unwrap(),
                StreamEvent::tool_call("slow")
            );
            let pending = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
            assert!(pending.is_err());
        }

        let (requested, answered) = call_ids(&transcript);
        assert_eq!(requested, answered);
        assert_eq!(transcript.len(), 2);
    }

    #[tokio::test]
    async fn test_completed_batch_answers_every_call() {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("call_1", ToolCall::new("record", json!({"n": 1})))
                .with_tool_request("call_2", ToolCall::new("record", json!({"n": 2}))),
            Message::assistant().with_text("Done."),
        ]);
        let agent = agent(&provider, vec![Box::new(RecordingTool::new("record"))]);
        let mut transcript = Transcript::new("");

        agent
            .reply(&mut transcript, "Twice", Mode::Text, &CancellationToken::new())
            .await
            .unwrap();

        let (requested, answered) = call_ids(&transcript);
        assert_eq!(requested, vec!["call_1", "call_2"]);
        assert_eq!(answered, requested);
        let roles: Vec<Role> = transcript.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::Tool,
                Role::Assistant
            ]
        );
    }
}
