use std::path::{Path, PathBuf};

use vision_contracts::events::{EventWriter, StudioEvent};
use vision_contracts::history::{Citation, GeneratedResult, HistoryStore, EDIT_PROMPT_PREFIX};
use vision_contracts::models::{ModelRegistry, ModelSelector, ModelVariant};
use vision_contracts::options::{AspectRatio, Resolution, StudioMode};

use crate::codec::{self, EncodedImage};
use crate::credentials::CredentialHost;
use crate::download;
use crate::error::ClientError;
use crate::gemini::{GenerateOptions, ImageClient};

const GENERATE_FALLBACK_ERROR: &str = "Failed to generate image.";
const EDIT_FALLBACK_ERROR: &str = "Failed to edit image.";

/// Transient per-session state. Nothing here is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub mode: StudioMode,
    pub selected_model: ModelVariant,
    pub prompt_text: String,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    pub source_image: Option<EncodedImage>,
    pub is_busy: bool,
    pub last_error: Option<String>,
}

impl SessionState {
    fn new(selected_model: ModelVariant) -> Self {
        Self {
            mode: StudioMode::default(),
            selected_model,
            prompt_text: String::new(),
            aspect_ratio: AspectRatio::default(),
            resolution: Resolution::default(),
            source_image: None,
            is_busy: false,
            last_error: None,
        }
    }
}

/// Snapshot of an accepted action, taken when the session turns busy.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    Generate {
        prompt: String,
        model: ModelVariant,
        options: GenerateOptions,
    },
    Edit {
        prompt: String,
        model: ModelVariant,
        source: EncodedImage,
    },
}

impl PendingAction {
    pub fn mode(&self) -> StudioMode {
        match self {
            PendingAction::Generate { .. } => StudioMode::Generate,
            PendingAction::Edit { .. } => StudioMode::Edit,
        }
    }

    pub fn model(&self) -> &ModelVariant {
        match self {
            PendingAction::Generate { model, .. } | PendingAction::Edit { model, .. } => model,
        }
    }

    fn fallback_error(&self) -> &'static str {
        match self {
            PendingAction::Generate { .. } => GENERATE_FALLBACK_ERROR,
            PendingAction::Edit { .. } => EDIT_FALLBACK_ERROR,
        }
    }
}

/// What the client call produced, before it is turned into a history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSuccess {
    pub image_data: String,
    pub citations: Option<Vec<Citation>>,
}

#[derive(Debug)]
pub enum ActionFailure {
    Client(ClientError),
    Host(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Preconditions failed or an action was already in flight; nothing ran.
    Rejected,
    /// A new history entry with this id was prepended.
    Created(String),
    /// The key was rejected and the user was asked to pick another one.
    CredentialReselected,
    /// The action failed; the message is also in `last_error`.
    Failed(String),
}

/// Owns the session state and the history, and drives one action at a time
/// through the image client.
pub struct SessionController<C, H> {
    state: SessionState,
    history: HistoryStore,
    registry: ModelRegistry,
    client: C,
    credentials: H,
    events: Option<EventWriter>,
}

impl<C: ImageClient, H: CredentialHost> SessionController<C, H> {
    pub fn new(history: HistoryStore, client: C, credentials: H) -> anyhow::Result<Self> {
        Self::with_registry(history, client, credentials, ModelRegistry::default())
    }

    pub fn with_registry(
        history: HistoryStore,
        client: C,
        credentials: H,
        registry: ModelRegistry,
    ) -> anyhow::Result<Self> {
        let selection = ModelSelector::new(Some(registry.clone()))
            .select(None)
            .map_err(anyhow::Error::msg)?;
        Ok(Self {
            state: SessionState::new(selection.model),
            history,
            registry,
            client,
            credentials,
            events: None,
        })
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn credentials(&self) -> &H {
        &self.credentials
    }

    pub fn set_mode(&mut self, mode: StudioMode) {
        self.state.mode = mode;
    }

    /// Selects a catalog model by id or alias. Unknown names leave the
    /// selection unchanged and return `None`.
    pub fn select_model(&mut self, alias: &str) -> Option<&ModelVariant> {
        let model = self.registry.find(alias)?.clone();
        self.state.selected_model = model;
        Some(&self.state.selected_model)
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.state.prompt_text = prompt.into();
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: AspectRatio) {
        self.state.aspect_ratio = aspect_ratio;
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.state.resolution = resolution;
    }

    pub fn set_source_image(&mut self, source: EncodedImage) {
        self.state.source_image = Some(source);
    }

    pub fn clear_source_image(&mut self) {
        self.state.source_image = None;
    }

    /// Reads and encodes a source image. A read failure is reported through
    /// `last_error` and leaves the previous source in place.
    pub fn load_source_image(&mut self, path: &Path) -> bool {
        match codec::encode_file(path) {
            Ok(encoded) => {
                self.state.source_image = Some(encoded);
                true
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "source image unreadable");
                self.state.last_error = Some(err.to_string());
                false
            }
        }
    }

    /// Runs the primary action for the current mode to completion.
    pub fn submit(&mut self) -> ActionOutcome {
        let Some(pending) = self.begin() else {
            return ActionOutcome::Rejected;
        };
        let result = self.execute(&pending);
        self.complete(&pending, result)
    }

    /// Checks preconditions and turns the session busy. Returns `None`, with
    /// no state change, when busy, when the prompt is blank, or when editing
    /// without a source image.
    pub fn begin(&mut self) -> Option<PendingAction> {
        if self.state.is_busy {
            tracing::debug!("action rejected: another action is in flight");
            return None;
        }
        let prompt = self.state.prompt_text.trim();
        if prompt.is_empty() {
            return None;
        }
        let prompt = self.state.prompt_text.clone();
        let model = self.state.selected_model.clone();
        let pending = match self.state.mode {
            StudioMode::Generate => PendingAction::Generate {
                prompt,
                options: GenerateOptions {
                    aspect_ratio: self.state.aspect_ratio,
                    resolution: model.supports_high_res.then_some(self.state.resolution),
                },
                model,
            },
            StudioMode::Edit => PendingAction::Edit {
                prompt,
                model,
                source: self.state.source_image.clone()?,
            },
        };

        self.state.is_busy = true;
        self.state.last_error = None;
        self.emit(StudioEvent::ActionStarted {
            mode: pending.mode(),
            model: pending.model().id.clone(),
        });
        Some(pending)
    }

    /// Performs the credential check and the client call for `pending`.
    pub fn execute(&self, pending: &PendingAction) -> Result<ActionSuccess, ActionFailure> {
        self.ensure_credential(pending.model())
            .map_err(ActionFailure::Host)?;
        match pending {
            PendingAction::Generate {
                prompt,
                model,
                options,
            } => self
                .client
                .generate(prompt, model, options)
                .map(|image| ActionSuccess {
                    image_data: image.image_data,
                    citations: image.citations,
                })
                .map_err(ActionFailure::Client),
            PendingAction::Edit {
                prompt,
                model,
                source,
            } => self
                .client
                .edit(prompt, source, model)
                .map(|image_data| ActionSuccess {
                    image_data,
                    citations: None,
                })
                .map_err(ActionFailure::Client),
        }
    }

    /// Records the result of `pending` and returns the session to idle.
    pub fn complete(
        &mut self,
        pending: &PendingAction,
        result: Result<ActionSuccess, ActionFailure>,
    ) -> ActionOutcome {
        let outcome = match result {
            Ok(success) => self.record_success(pending, success),
            Err(ActionFailure::Client(err)) if err.is_credential_error() => {
                tracing::info!(error = %err, "credential rejected; asking for a new key");
                if let Err(prompt_err) = self.credentials.prompt_credential_selection() {
                    tracing::warn!(error = %format!("{prompt_err:#}"), "credential selection failed");
                }
                self.emit(StudioEvent::CredentialReselected {
                    model: pending.model().id.clone(),
                });
                ActionOutcome::CredentialReselected
            }
            Err(ActionFailure::Client(err)) => self.record_failure(pending, err.to_string()),
            Err(ActionFailure::Host(err)) => self.record_failure(pending, format!("{err:#}")),
        };
        self.state.is_busy = false;
        outcome
    }

    pub fn delete_entry(&mut self, id: &str) -> bool {
        match self.history.remove(id) {
            Ok(removed) => {
                if removed {
                    self.emit(StudioEvent::EntryDeleted { id: id.to_string() });
                }
                removed
            }
            Err(err) => {
                self.state.last_error = Some(format!("Failed to delete entry: {err:#}"));
                false
            }
        }
    }

    pub fn download_entry(&mut self, id: &str, dir: &Path) -> Option<PathBuf> {
        let Some(entry) = self.history.get(id) else {
            self.state.last_error = Some(format!("No history entry with id {id}."));
            return None;
        };
        match download::export_entry(entry, dir) {
            Ok(path) => {
                self.emit(StudioEvent::EntryDownloaded {
                    id: id.to_string(),
                    path: path.display().to_string(),
                });
                Some(path)
            }
            Err(err) => {
                self.state.last_error = Some(format!("Failed to download entry: {err:#}"));
                None
            }
        }
    }

    fn ensure_credential(&self, model: &ModelVariant) -> anyhow::Result<()> {
        if !model.is_high_capability() {
            return Ok(());
        }
        if !self.credentials.has_usable_credential()? {
            self.credentials.prompt_credential_selection()?;
        }
        Ok(())
    }

    fn record_success(&mut self, pending: &PendingAction, success: ActionSuccess) -> ActionOutcome {
        let (prompt, model) = match pending {
            PendingAction::Generate { prompt, model, .. } => (prompt.clone(), model),
            PendingAction::Edit { prompt, model, .. } => (format!("{EDIT_PROMPT_PREFIX}{prompt}"), model),
        };
        let entry = GeneratedResult::new(
            success.image_data,
            prompt,
            model.display_name.clone(),
            success.citations,
        );
        let id = entry.id.clone();
        let citation_count = entry.citations.as_ref().map(Vec::len);
        if let Err(err) = self.history.prepend(entry) {
            return self.record_failure(pending, format!("Failed to save history: {err:#}"));
        }
        self.emit(StudioEvent::ResultCreated {
            id: id.clone(),
            mode: pending.mode(),
            model: model.id.clone(),
            citations: citation_count,
        });
        ActionOutcome::Created(id)
    }

    fn record_failure(&mut self, pending: &PendingAction, message: String) -> ActionOutcome {
        let message = if message.trim().is_empty() {
            pending.fallback_error().to_string()
        } else {
            message
        };
        tracing::warn!(mode = %pending.mode(), error = %message, "action failed");
        self.emit(StudioEvent::ActionFailed {
            mode: pending.mode(),
            error: message.clone(),
        });
        self.state.last_error = Some(message.clone());
        ActionOutcome::Failed(message)
    }

    fn emit(&self, event: StudioEvent) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if let Err(err) = events.emit(&event) {
            tracing::warn!(event = event.kind(), error = %format!("{err:#}"), "event log write failed");
        }
    }
}
