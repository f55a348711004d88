use crate::error::{Result, SoapNoteError};
use crate::schema::{NoteSchema, Profession};

pub const SYSTEM_INSTRUCTION: &str =
    "You are a clinical documentation assistant. You convert session transcripts into structured SOAP notes and reply with JSON only.";

pub const NOTE_PREAMBLE: &str = r#"
You are writing a SOAP (Subjective, Objective, Assessment, Plan) note from the transcript of a clinical session.

## RULES
1. Use ONLY information stated or clearly demonstrated in the transcript.
2. The example JSON below shows the required STRUCTURE. Its sample values (test names, results,
   measurements) are illustrations, not findings. Replace them with what happened in this session.
3. If something was not discussed, use an empty string "" for text and [] for lists. Never invent
   test results, measurements, diagnoses or billing codes.
4. Keep every key exactly as shown, in the same order. Copy each "type" value unchanged.
5. Table rows must contain exactly the keys shown for that table. All cell values are strings.
6. Use concise, professional clinical language. Standard abbreviations (ROM, MMT, WNL, HEP) are fine.
7. Return ONLY the JSON object. No Markdown fences, no commentary.
"#;

pub fn profession_label(profession: Profession) -> &'static str {
    match profession {
        Profession::PhysicalTherapy => "physical therapy",
        Profession::Chiropractic => "chiropractic",
    }
}

pub struct PromptBuilder<'a> {
    schema: &'a NoteSchema,
    transcript: &'a str,
    context: Option<&'a str>,
    preamble: &'a str,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(schema: &'a NoteSchema, transcript: &'a str) -> Self {
        Self {
            schema,
            transcript,
            context: None,
            preamble: NOTE_PREAMBLE,
        }
    }

    /// Extra session details (visit number, referring diagnosis, prior notes) placed before the transcript.
    pub fn with_context(mut self, context: &'a str) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_preamble(mut self, preamble: &'a str) -> Self {
        self.preamble = preamble;
        self
    }

    pub fn build(&self) -> Result<String> {
        let transcript = self.transcript.trim();
        if transcript.is_empty() {
            return Err(SoapNoteError::EmptyTranscript);
        }

        let example = serde_json::to_string_pretty(&self.schema.example_json())?;

        let mut prompt = String::new();
        prompt.push_str(self.preamble.trim());
        prompt.push_str("\n\n");

        prompt.push_str(&format!(
            "## NOTE TYPE\n{} ({})\n",
            self.schema.title,
            profession_label(self.schema.profession)
        ));
        if let Some(description) = &self.schema.description {
            prompt.push_str(description.trim());
            prompt.push('\n');
        }
        prompt.push('\n');

        if !self.schema.instructions.is_empty() {
            prompt.push_str("## TEMPLATE INSTRUCTIONS\n");
            for instruction in &self.schema.instructions {
                prompt.push_str(&format!("- {}\n", instruction));
            }
            prompt.push('\n');
        }

        if let Some(context) = self.context.map(str::trim).filter(|c| !c.is_empty()) {
            prompt.push_str(&format!("## SESSION CONTEXT\n{}\n\n", context));
        }

        prompt.push_str(&format!(
            "## TRANSCRIPT\n\"\"\"\n{}\n\"\"\"\n\n",
            transcript
        ));

        prompt.push_str(&format!(
            "## OUTPUT FORMAT\nReturn a JSON object with exactly this structure:\n{}\n",
            example
        ));

        Ok(prompt)
    }
}

pub fn build_note_prompt(schema: &NoteSchema, transcript: &str) -> Result<String> {
    PromptBuilder::new(schema, transcript).build()
}
