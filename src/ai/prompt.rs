//! Refill Prompt Construction
//!
//! Section-based builder for generation prompts plus the refill template
//! used when a sub-pool runs dry.

use crate::constants::payload as payload_constants;
use crate::types::GenerationRequest;

/// Prompt section types
#[derive(Debug, Clone)]
pub enum PromptSection {
    /// Role definition with expertise area
    Role { expertise: String, task: String },
    /// Numbered objectives
    Objectives(Vec<String>),
    /// Raw text section with optional header
    Text {
        header: Option<String>,
        content: String,
    },
    /// Required output shape: wrapper field and per-item fields
    OutputSchema { field: String, item_fields: Vec<String> },
}

/// Prompt builder for consistent prompt construction
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a role definition section
    pub fn role(mut self, expertise: &str, task: &str) -> Self {
        self.sections.push(PromptSection::Role {
            expertise: expertise.to_string(),
            task: task.to_string(),
        });
        self
    }

    /// Add objectives section
    pub fn objectives(mut self, objectives: Vec<String>) -> Self {
        self.sections.push(PromptSection::Objectives(objectives));
        self
    }

    /// Add text section with header
    pub fn section(mut self, header: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: Some(header.to_string()),
            content: content.to_string(),
        });
        self
    }

    /// Add text section
    pub fn text(mut self, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: None,
            content: content.to_string(),
        });
        self
    }

    /// Require a JSON object whose `field` holds items with `item_fields`
    pub fn output_schema(mut self, field: &str, item_fields: &[&str]) -> Self {
        self.sections.push(PromptSection::OutputSchema {
            field: field.to_string(),
            item_fields: item_fields.iter().map(|f| f.to_string()).collect(),
        });
        self
    }

    /// Build the final prompt string
    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Role { expertise, task } => {
                    prompt.push_str("<ROLE>\n");
                    prompt.push_str(&format!(
                        "You are an expert {} specializing in {}.\n",
                        expertise, task
                    ));
                    prompt.push_str("</ROLE>\n\n");
                }
                PromptSection::Objectives(objectives) => {
                    prompt.push_str("<OBJECTIVES>\n");
                    for (i, obj) in objectives.iter().enumerate() {
                        prompt.push_str(&format!("{}. {}\n", i + 1, obj));
                    }
                    prompt.push_str("</OBJECTIVES>\n\n");
                }
                PromptSection::Text { header, content } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("# {}\n\n", h));
                    }
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
                PromptSection::OutputSchema { field, item_fields } => {
                    prompt.push_str("<OUTPUT_FORMAT>\n");
                    prompt.push_str(&format!(
                        "Return a JSON object with key '{}' holding an array. Each item has:\n",
                        field
                    ));
                    for item_field in item_fields {
                        prompt.push_str(&format!("- {}\n", item_field));
                    }
                    prompt.push_str("Return JSON only, no commentary.\n");
                    prompt.push_str("</OUTPUT_FORMAT>\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }
}

/// Prompt asking for `request.batch_size` fresh problems on the request's key
pub fn refill_prompt(request: &GenerationRequest) -> String {
    let topic = request.key.topic();
    let difficulty = request.key.difficulty();

    PromptBuilder::new()
        .role("competitive programming author", "data structures and algorithms")
        .objectives(vec![
            format!(
                "Generate {} unique {} level DSA problems on the topic '{}'",
                request.batch_size, difficulty, topic
            ),
            "Each problem must be self-contained and solvable".to_string(),
            "Include a clear approach and a working code snippet".to_string(),
        ])
        .section(
            "Guidelines",
            "Avoid well-known duplicates within the batch. Keep examples small and \
             consistent with the constraints.",
        )
        .output_schema(
            payload_constants::PROBLEMS_FIELD,
            payload_constants::REQUESTED_FIELDS,
        )
        .build()
}
