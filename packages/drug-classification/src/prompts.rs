//! Prompts for drug label classification.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;
use tracing::info;

use crate::document::{DrugDocument, CLASSIFICATION_SECTIONS};
use crate::error::{ClassificationError, Result};

/// Characters kept per label section.
pub const MAX_SECTION_CHARS: usize = 2000;

/// Marker appended to a truncated section.
pub const TRUNCATION_MARKER: &str = "... [content truncated]";

/// Built-in system prompt, used when no prompt file is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a clinical pharmacology expert. Classify the drug described by the FDA label excerpt you are given.

Base every answer on the label text. If the label does not support a value, use "Not specified".

Output a single JSON object:
{
    "primary_therapeutic_class": "broad therapeutic category (e.g. Antidiabetic, Analgesic)",
    "pharmacological_class": "established pharmacologic class (e.g. GLP-1 receptor agonist)",
    "chemical_class": "chemical family of the active ingredient",
    "atc_code": "WHO ATC code if identifiable",
    "controlled_substance_schedule": "DEA schedule (CII-CV) or Not controlled",
    "therapeutic_indication": "primary approved indication in one sentence",
    "mechanism_of_action_summary": "one or two sentences",
    "confidence_level": "High | Medium | Low",
    "source_sections_used": ["label sections you relied on"]
}"#;

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref EXCESS_NEWLINES: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Tag to markdown substitutions applied before remaining tags are stripped.
const HTML_REPLACEMENTS: [(&str, &str); 28] = [
    ("<h1>", "# "),
    ("</h1>", "\n\n"),
    ("<h2>", "## "),
    ("</h2>", "\n\n"),
    ("<h3>", "### "),
    ("</h3>", "\n\n"),
    ("<p>", ""),
    ("</p>", "\n\n"),
    ("<ul>", ""),
    ("</ul>", "\n"),
    ("<ol>", ""),
    ("</ol>", "\n"),
    ("<li>", "- "),
    ("</li>", "\n"),
    ("<br>", "\n"),
    ("<br/>", "\n"),
    ("<strong>", "**"),
    ("</strong>", "**"),
    ("<b>", "**"),
    ("</b>", "**"),
    ("<em>", "*"),
    ("</em>", "*"),
    ("<i>", "*"),
    ("</i>", "*"),
    ("<div>", ""),
    ("</div>", "\n"),
    ("<span>", ""),
    ("</span>", ""),
];

/// Holds the system prompt and renders per-document user prompts.
#[derive(Debug, Clone)]
pub struct PromptManager {
    system_prompt: String,
}

impl Default for PromptManager {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl PromptManager {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    /// Load the system prompt from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let system_prompt = std::fs::read_to_string(path).map_err(|e| {
            ClassificationError::Prompt(format!(
                "failed to read system prompt {}: {}",
                path.display(),
                e
            ))
        })?;
        if system_prompt.trim().is_empty() {
            return Err(ClassificationError::Prompt(format!(
                "system prompt {} is empty",
                path.display()
            )));
        }

        info!(path = %path.display(), "Loaded system prompt");
        Ok(Self::new(system_prompt))
    }

    /// Use the file if given, otherwise the built-in prompt.
    pub fn from_optional_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Render the user prompt for one drug.
    pub fn build_user_prompt(&self, document: &DrugDocument) -> String {
        format!(
            "**Drug Information:**\n\n\
             **Drug Name:** {}\n\
             **Generic Name:** {}\n\
             **Set ID:** {}\n\n\
             **Label Content:**\n\
             {}\n\n\
             Please analyze this drug information and provide the therapeutic classification in the specified JSON format.",
            document.drug_name().unwrap_or("Unknown"),
            document.generic_name().unwrap_or("Unknown"),
            document.set_id().unwrap_or("Unknown"),
            extract_label_content(document),
        )
    }
}

/// Cleaned label sections as `### {name}\n{content}` blocks.
///
/// Sections are emitted in classification priority order; empty or missing
/// sections are skipped.
pub fn extract_label_content(document: &DrugDocument) -> String {
    CLASSIFICATION_SECTIONS
        .iter()
        .filter_map(|(field, name)| {
            let raw = document.label_section(field).filter(|s| !s.is_empty())?;
            Some(format!("### {}\n{}", name, truncate(&clean_html(raw))))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Convert simple label HTML to markdown-ish plain text.
pub fn clean_html(html: &str) -> String {
    let mut text = html.to_string();
    for (tag, replacement) in HTML_REPLACEMENTS {
        text = text.replace(tag, replacement);
    }
    let text = HTML_TAG.replace_all(&text, "");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_SECTION_CHARS) {
        Some((idx, _)) => format!("{}{}", &text[..idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}
