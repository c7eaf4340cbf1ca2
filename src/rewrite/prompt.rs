use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// System message sent ahead of every rewrite request.
pub const SYSTEM_PROMPT: &str = "You are a professional content writer and editor.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Casual,
    Formal,
    Friendly,
    Authoritative,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Formal => "formal",
            Tone::Friendly => "friendly",
            Tone::Authoritative => "authoritative",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Informative,
    Persuasive,
    Narrative,
    Descriptive,
    Analytical,
}

impl Style {
    pub fn as_str(self) -> &'static str {
        match self {
            Style::Informative => "informative",
            Style::Persuasive => "persuasive",
            Style::Narrative => "narrative",
            Style::Descriptive => "descriptive",
            Style::Analytical => "analytical",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Knobs applied to every item of a rewrite batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteOptions {
    pub tone: Tone,
    pub style: Style,
    pub seo: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            tone: Tone::default(),
            style: Style::default(),
            seo: true,
        }
    }
}

/// Build the user message for one rewrite request.
pub fn build_prompt(text: &str, options: &RewriteOptions) -> String {
    let mut prompt = String::from("Rewrite the following content with these requirements:\n");
    prompt.push_str(&format!("- Tone: {}\n", options.tone));
    prompt.push_str(&format!("- Style: {}\n", options.style));
    if options.seo {
        prompt.push_str("- Optimize for SEO\n");
    }
    prompt.push_str("\nOriginal content:\n");
    prompt.push_str(text);
    prompt.push_str("\n\nRewritten content:");
    prompt
}
