/*!
 * Question generation on top of an LLM provider.
 *
 * The model is asked for a JSON array of strings. Models do not always
 * comply, so the reply is parsed leniently: a JSON array anywhere in the text
 * wins, otherwise numbered or bulleted lines are taken, otherwise any line
 * ending with a question mark.
 */

use async_trait::async_trait;
use log::{debug, trace};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::errors::GenerationError;
use crate::providers::Provider;

use super::model::WorkItem;
use super::traits::Generate;

/// `1. text`, `2) text`, `- text`, `* text`, `• text`, `Q3: text`
static LIST_ITEM_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\d+[.)]|[-*•]|Q\d*[:.])\s+(.+?)\s*$").expect("list item pattern")
});

/// Code fence around a JSON answer
static CODE_FENCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("code fence pattern")
});

/// Generates study questions for one segment per call
#[derive(Debug, Clone)]
pub struct QuestionGenerator {
    provider: Arc<dyn Provider>,
    system_prompt: String,
}

impl QuestionGenerator {
    pub fn new(provider: Arc<dyn Provider>, system_prompt: impl Into<String>) -> Self {
        Self {
            provider,
            system_prompt: system_prompt.into(),
        }
    }
}

#[async_trait]
impl Generate for QuestionGenerator {
    type Output = Vec<String>;

    async fn check_ready(&self) -> Result<(), GenerationError> {
        self.provider.test_connection().await?;
        Ok(())
    }

    async fn generate(&self, item: &WorkItem) -> Result<Self::Output, GenerationError> {
        let completion = self
            .provider
            .complete(&self.system_prompt, &item.rendered_prompt)
            .await?;

        trace!("Raw answer for {}: {}", item.label(), completion.text);
        if let (Some(input), Some(output)) = (completion.prompt_tokens, completion.completion_tokens) {
            debug!("{} used {} prompt / {} completion tokens", item.label(), input, output);
        }

        let questions = parse_questions(&completion.text);
        if questions.is_empty() {
            return Err(GenerationError::EmptyResult);
        }
        Ok(questions)
    }
}

/// Extract questions from a model answer
pub fn parse_questions(text: &str) -> Vec<String> {
    let body = CODE_FENCE_REGEX
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(text, |m| m.as_str());

    if let Some(questions) = parse_json_array(body) {
        return questions;
    }

    let listed: Vec<String> = body
        .lines()
        .filter_map(|line| LIST_ITEM_REGEX.captures(line))
        .filter_map(|c| c.get(1).map(|m| clean(m.as_str())))
        .filter(|q| !q.is_empty())
        .collect();
    if !listed.is_empty() {
        return listed;
    }

    body.lines()
        .map(clean)
        .filter(|line| line.ends_with('?'))
        .collect()
}

fn parse_json_array(text: &str) -> Option<Vec<String>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }

    let values: Vec<serde_json::Value> = serde_json::from_str(&text[start..=end]).ok()?;
    let questions: Vec<String> = values
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::String(s) => Some(clean(&s)),
            serde_json::Value::Object(map) => map
                .get("question")
                .and_then(|q| q.as_str())
                .map(clean),
            _ => None,
        })
        .filter(|q| !q.is_empty())
        .collect();

    (!questions.is_empty()).then_some(questions)
}

fn clean(text: &str) -> String {
    text.trim().trim_matches('"').trim().to_string()
}
