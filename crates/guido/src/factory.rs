use anyhow::Result;
use std::sync::Arc;

use crate::agent::Agent;
use crate::calendar::{CalendarBackend, GoogleCalendar};
use crate::configuration::Settings;
use crate::credentials::{ClientSecrets, FileCredentialStore, GoogleAuth};
use crate::providers::openai::OpenAiProvider;
use crate::speech::OpenAiSpeech;
use crate::tools::{CreateEventTool, ReadCalendarTool, SearchWebTool, ToolRegistry, UpdateEventTool};

fn credential_store(settings: &Settings) -> FileCredentialStore {
    match &settings.calendar.token_path {
        Some(path) => FileCredentialStore::new(path.clone()),
        None => FileCredentialStore::default(),
    }
}

/// Google credentials for the configured calendar, if there is one
pub fn google_auth(settings: &Settings) -> Result<Option<GoogleAuth>> {
    let Some((_, credentials)) = settings.calendar.account()? else {
        return Ok(None);
    };
    let secrets = ClientSecrets::from_json(credentials)?;
    Ok(Some(GoogleAuth::new(
        secrets,
        Box::new(credential_store(settings)),
    )))
}

pub fn speech(settings: &Settings) -> Result<OpenAiSpeech> {
    let config = settings.openai.clone().into_config();
    Ok(OpenAiSpeech::new(&config)?.with_voice(settings.speech.voice.clone()))
}

/// Every tool whose collaborator is configured
pub fn build_registry(settings: &Settings, provider: &OpenAiProvider) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    if let (Some(auth), Some(calendar_id)) = (google_auth(settings)?, &settings.calendar.id) {
        let calendar: Arc<dyn CalendarBackend> =
            Arc::new(GoogleCalendar::new(calendar_id, Arc::new(auth))?);
        registry.register(Box::new(CreateEventTool::new(calendar.clone())))?;
        registry.register(Box::new(ReadCalendarTool::new(calendar.clone())))?;
        registry.register(Box::new(UpdateEventTool::new(calendar)))?;
    } else {
        tracing::info!("No calendar configured, calendar tools are disabled");
    }

    registry.register(Box::new(SearchWebTool::new(Arc::new(provider.clone()))))?;
    Ok(registry)
}

pub fn build_agent(settings: &Settings) -> Result<Agent> {
    let provider = OpenAiProvider::new(settings.openai.clone().into_config())?;
    let registry = build_registry(settings, &provider)?;

    Ok(Agent::new(Box::new(provider), registry)
        .with_max_turns(settings.agent.max_turns)
        .with_synthesizer(Box::new(speech(settings)?)))
}
