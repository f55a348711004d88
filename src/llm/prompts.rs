// Prompts used by the audio pipeline. Note prompts live in `crate::prompt`.

pub const TRANSCRIPTION_SYSTEM_PROMPT: &str =
    "You are a medical transcriptionist. You produce accurate verbatim transcripts of clinical sessions.";

pub const TRANSCRIPTION_PROMPT: &str = r#"
Transcribe the attached recording of a physical therapy or chiropractic session.

## RULES
1. Transcribe verbatim. Do not summarize, reorder or correct what was said.
2. Start each turn on a new line with a speaker label: "Clinician:" or "Patient:". Use "Other:" for anyone else.
3. Keep numbers as spoken values in digits (e.g. "120 degrees", "pain is a 6 out of 10").
4. Mark unclear speech as [inaudible]. Do not guess at clinical terms you cannot hear.
5. Omit long silences and background noise.
6. Return ONLY the transcript text.
"#;
