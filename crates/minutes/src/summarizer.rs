//! Pluggable summarization: a remote HTTP summarizer and a deterministic
//! local fallback (scored sentence extraction + stopword list + action-item
//! boost). Missing summarizer token forces the local summarizer.

use async_trait::async_trait;
use std::collections::HashSet;

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, transcript_text: &str) -> anyhow::Result<String>;
}

pub struct RemoteSummarizer {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl RemoteSummarizer {
    pub fn new(url: String, token: String) -> Self {
        Self { client: reqwest::Client::new(), url, token }
    }
}

#[derive(serde::Serialize)]
struct SummarizeRequest<'a> {
    text: &'a str,
}

#[derive(serde::Deserialize)]
struct SummarizeResponse {
    summary: String,
}

#[async_trait]
impl Summarizer for RemoteSummarizer {
    async fn summarize(&self, transcript_text: &str) -> anyhow::Result<String> {
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&SummarizeRequest { text: transcript_text })
            .send()
            .await?
            .error_for_status()?
            .json::<SummarizeResponse>()
            .await?;
        Ok(resp.summary)
    }
}

/// Deterministic local fallback: splits into sentences, scores each by word
/// frequency (stopwords excluded) with a boost for action-item phrasing,
/// and keeps the top third (at least one sentence) in original order.
pub struct LocalSummarizer;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "to", "of", "and", "or", "in", "on",
    "at", "for", "with", "it", "this", "that", "as", "by", "from", "we", "you", "i", "they", "he",
    "she", "but", "so", "if", "then", "there", "here", "just", "not", "do", "does", "did",
];

const ACTION_MARKERS: &[&str] = &["will", "action", "todo", "follow up", "next step", "assign", "deadline", "by friday", "due"];

#[async_trait]
impl Summarizer for LocalSummarizer {
    async fn summarize(&self, transcript_text: &str) -> anyhow::Result<String> {
        Ok(summarize_local(transcript_text))
    }
}

pub fn summarize_local(transcript_text: &str) -> String {
    let sentences = split_sentences(transcript_text);
    if sentences.is_empty() {
        return String::new();
    }

    let stopwords: HashSet<&str> = STOPWORDS.iter().copied().collect();
    let scores: Vec<(usize, f64)> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| (i, score_sentence(s, &stopwords)))
        .collect();

    let keep = (sentences.len() / 3).max(1);
    let mut ranked = scores.clone();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let mut chosen: Vec<usize> = ranked.into_iter().take(keep).map(|(i, _)| i).collect();
    chosen.sort_unstable();

    chosen.into_iter().map(|i| sentences[i].trim().to_string()).collect::<Vec<_>>().join(" ")
}

fn score_sentence(sentence: &str, stopwords: &HashSet<&str>) -> f64 {
    let lower = sentence.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }
    let informative = words.iter().filter(|w| !stopwords.contains(*w)).count() as f64;
    let mut score = informative / words.len() as f64;
    if ACTION_MARKERS.iter().any(|m| lower.contains(m)) {
        score += 0.5;
    }
    score
}

fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_input() {
        let text = "We met today. The weather was fine. John will follow up by Friday on the budget. \
                     Nothing else of note happened.";
        let a = summarize_local(text);
        let b = summarize_local(text);
        assert_eq!(a, b);
    }

    #[test]
    fn boosts_action_items() {
        let text = "We discussed lunch options. Sarah will send the report by Friday. The room was cold.";
        let out = summarize_local(text);
        assert!(out.contains("Sarah will send the report by Friday"));
    }

    #[test]
    fn empty_transcript_yields_empty_summary() {
        assert_eq!(summarize_local(""), "");
    }
}
