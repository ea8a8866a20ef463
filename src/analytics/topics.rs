//! Keyword extraction for the `top_question_topics` rollup.
//!
//! Two kinds of keywords are taken from each question: runs of one to four
//! Capitalized Words (likely proper nouns or named concepts) and lowercase
//! words of five or more characters. Both kinds are checked against the
//! stopword list, so a sentence-initial "What" or "Explain" is not a topic.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

lazy_static! {
    static ref CAPITALIZED_PHRASE: Regex =
        Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+){0,3}\b").expect("valid regex");
    static ref LONG_WORD: Regex = Regex::new(r"\b\w{5,}\b").expect("valid regex");
}

const STOPWORDS: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "which", "is", "are", "was", "were", "the", "a",
    "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "from", "about",
    "as", "into", "like", "through", "after", "over", "between", "out", "against", "during",
    "without", "before", "under", "around", "among", "does", "do", "did", "can", "could",
    "should", "would", "will", "may", "might", "must", "shall", "explain", "describe", "tell",
    "me", "you",
];

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// A topic and how many times it was mentioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCount {
    pub topic: String,
    pub count: u64,
}

/// All keywords of one question, in order of appearance.
pub fn extract_keywords(question: &str) -> Vec<String> {
    let mut keywords: Vec<String> = CAPITALIZED_PHRASE
        .find_iter(question)
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|phrase| !is_stopword(&phrase.to_lowercase()))
        .collect();

    let lowered = question.to_lowercase();
    keywords.extend(
        LONG_WORD
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|w| !is_stopword(w))
            .map(str::to_string),
    );

    keywords
}

/// Count keywords across questions; most frequent first, ties alphabetical.
pub fn top_topics<'a>(questions: impl IntoIterator<Item = &'a str>, limit: usize) -> Vec<TopicCount> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for question in questions {
        for keyword in extract_keywords(question) {
            *counts.entry(keyword).or_insert(0) += 1;
        }
    }

    let mut topics: Vec<TopicCount> = counts
        .into_iter()
        .map(|(topic, count)| TopicCount { topic, count })
        .collect();
    topics.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.topic.cmp(&b.topic)));
    topics.truncate(limit);
    topics
}
