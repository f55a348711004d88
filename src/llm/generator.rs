use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::llm::client::{CompletionClient, GeminiClient};
use crate::llm::types::{CompletionRequest, GenerationEvent};
use crate::merge::MergeOptions;
use crate::pipeline::{complete_from_raw, GenerationOutcome};
use crate::prompt::{PromptBuilder, SYSTEM_INSTRUCTION};
use crate::schema::NoteSchema;
use crate::templates::TemplateRegistry;
use log::{debug, info};
use tokio::sync::mpsc::Sender;

/// Transcript in, template-shaped note out. Each call is independent; no retries.
pub struct NoteGenerator<C> {
    client: C,
    model: String,
    options: MergeOptions,
    structured_output: bool,
    temperature: Option<f32>,
}

impl NoteGenerator<GeminiClient> {
    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(GeminiClient::from_config(config), config.model.clone())
            .with_merge_options(config.merge)
            .with_structured_output(config.structured_output)
            .with_temperature(config.temperature)
    }
}

impl<C: CompletionClient> NoteGenerator<C> {
    pub fn new(client: C, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            options: MergeOptions::default(),
            structured_output: false,
            temperature: None,
        }
    }

    pub fn with_merge_options(mut self, options: MergeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_structured_output(mut self, enabled: bool) -> Self {
        self.structured_output = enabled;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Never fails: transport errors and unusable model output come back as an
    /// unsuccessful outcome carrying a default-filled note.
    pub async fn generate(
        &self,
        schema: &NoteSchema,
        transcript: &str,
        context: Option<&str>,
        progress: Option<Sender<GenerationEvent>>,
    ) -> GenerationOutcome {
        self.send_event(&progress, GenerationEvent::Starting).await;
        info!("Generating '{}' note", schema.id);

        self.send_event(&progress, GenerationEvent::BuildingPrompt).await;
        let mut builder = PromptBuilder::new(schema, transcript);
        if let Some(context) = context {
            builder = builder.with_context(context);
        }
        let prompt = match builder.build() {
            Ok(prompt) => prompt,
            Err(e) => return self.fail(schema, e.to_string(), &progress).await,
        };
        debug!("Prompt for '{}' is {} characters", schema.id, prompt.len());

        let request = CompletionRequest {
            model: self.model.clone(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            prompt,
            response_schema: self.structured_output.then(|| schema.response_schema()),
            temperature: self.temperature,
        };

        self.send_event(&progress, GenerationEvent::AwaitingModel).await;
        let raw = match self.client.complete(request).await {
            Ok(raw) => raw,
            Err(e) => return self.fail(schema, e.to_string(), &progress).await,
        };

        self.send_event(&progress, GenerationEvent::ProcessingResponse)
            .await;
        let outcome = complete_from_raw(schema, &raw, self.options);

        let event = match &outcome.error {
            None => GenerationEvent::Completed,
            Some(reason) => GenerationEvent::Failed {
                reason: reason.clone(),
            },
        };
        self.send_event(&progress, event).await;

        outcome
    }

    /// Looks the template up first; an unknown id is the only error.
    pub async fn generate_for_template(
        &self,
        registry: &TemplateRegistry,
        template_id: &str,
        transcript: &str,
        context: Option<&str>,
        progress: Option<Sender<GenerationEvent>>,
    ) -> Result<GenerationOutcome> {
        let schema = registry.get(template_id)?;
        Ok(self.generate(schema, transcript, context, progress).await)
    }

    async fn fail(
        &self,
        schema: &NoteSchema,
        reason: String,
        progress: &Option<Sender<GenerationEvent>>,
    ) -> GenerationOutcome {
        self.send_event(
            progress,
            GenerationEvent::Failed {
                reason: reason.clone(),
            },
        )
        .await;
        GenerationOutcome::failed(schema, self.options, reason)
    }

    async fn send_event(&self, sender: &Option<Sender<GenerationEvent>>, event: GenerationEvent) {
        if let Some(tx) = sender {
            let _ = tx.send(event).await;
        }
    }
}
