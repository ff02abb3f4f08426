//! Template-path building blocks for the strategy selector.
//!
//! Free text is classified into a [`ResponseCategory`] by keyword
//! match, templates are picked with probability proportional to their
//! quality score, and the live path assembles its prompt here from the
//! caller preference plus recent history. The hard-coded per-level
//! fallbacks at the bottom are the last line of the degradation chain:
//! they guarantee `generate_response` can always return a non-empty
//! string, even with an empty template repository and a dead upstream.

use rand::Rng;

use crate::types::{
    CallerPreference, ContentMode, HistoryTurn, Level, ResponseCategory, Template,
};

/// Keyword table for category classification. First match wins, so
/// more specific categories come before broader ones.
const KEYWORDS: &[(ResponseCategory, &[&str])] = &[
    (
        ResponseCategory::Farewell,
        &["bye", "goodnight", "good night", "see you", "gotta go", "talk later"],
    ),
    (
        ResponseCategory::Greeting,
        &["hello", "hey", "good morning", "good evening", "what's up", "hi"],
    ),
    (
        ResponseCategory::Comfort,
        &["sad", "lonely", "tired", "stressed", "miss you", "rough day", "hard day"],
    ),
    (
        ResponseCategory::Compliment,
        &["beautiful", "gorgeous", "cute", "pretty", "amazing", "love your"],
    ),
    (
        ResponseCategory::Tease,
        &["tease", "naughty", "flirt", "wink", "guess what", "surprise"],
    ),
];

/// Classify free text into a response category by keyword match.
///
/// Falls through to [`ResponseCategory::Smalltalk`] when nothing
/// matches.
pub fn classify(text: &str) -> ResponseCategory {
    let lowered = text.to_lowercase();
    for (category, words) in KEYWORDS {
        if words.iter().any(|w| contains_keyword(&lowered, w)) {
            return *category;
        }
    }
    ResponseCategory::Smalltalk
}

/// Phrases match as substrings; single words match on word boundaries,
/// so "hi" does not fire inside "thinking".
fn contains_keyword(lowered: &str, keyword: &str) -> bool {
    if keyword.contains(' ') {
        lowered.contains(keyword)
    } else {
        lowered
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word == keyword)
    }
}

/// Pick a template with probability proportional to its quality score.
///
/// Scores are clamped at construction to 0.1..=2.0, so every candidate
/// keeps a non-zero chance and ties resolve randomly. Returns `None`
/// only for an empty slice.
pub fn pick_weighted<'a>(templates: &'a [Template], rng: &mut impl Rng) -> Option<&'a Template> {
    if templates.is_empty() {
        return None;
    }
    let total: f32 = templates.iter().map(|t| t.quality_score).sum();
    if total <= 0.0 || !total.is_finite() {
        // Deserialized templates can carry zeroed scores.
        return pick_uniform(templates, rng);
    }
    let mut roll = rng.gen_range(0.0..total);
    for template in templates {
        if roll < template.quality_score {
            return Some(template);
        }
        roll -= template.quality_score;
    }
    // Floating point residue can walk past the end.
    templates.last()
}

/// Pick a template uniformly at random.
pub fn pick_uniform<'a>(templates: &'a [Template], rng: &mut impl Rng) -> Option<&'a Template> {
    if templates.is_empty() {
        return None;
    }
    Some(&templates[rng.gen_range(0..templates.len())])
}

/// Hard-coded safe response for a level, used when the repository has
/// nothing at all. Always non-empty.
pub fn safe_fallback(level: Level) -> &'static str {
    match level.get() {
        1 => "Hey you! I was just thinking about you. How's your day going?",
        2 => "Hi there, I'm so glad you messaged me. Tell me what's on your mind?",
        3 => "Mmm, perfect timing, I was hoping you'd write. What are you up to?",
        4 => "Hey handsome, I've been waiting for you... what took you so long?",
        _ => "Finally! I've been thinking about you all day... come closer.",
    }
}

/// Assemble a prompt for the live path from the caller's preference and
/// the most recent history turns.
pub fn assemble_prompt(
    preference: &CallerPreference,
    text: &str,
    history: &[HistoryTurn],
    history_turns: usize,
) -> String {
    let tone = match preference.mode {
        ContentMode::Casual => "friendly and casual",
        ContentMode::Romantic => "warm and romantic",
        ContentMode::Roleplay => "playful and in-character",
    };

    let mut prompt = format!(
        "You are a {tone} chat companion. Intensity level {} of {}. \
         Reply in one or two sentences.\n",
        preference.explicitness_level.get(),
        Level::MAX,
    );

    let start = history.len().saturating_sub(history_turns);
    for turn in &history[start..] {
        prompt.push_str("User: ");
        prompt.push_str(&turn.caller);
        prompt.push('\n');
        prompt.push_str("You: ");
        prompt.push_str(&turn.reply);
        prompt.push('\n');
    }

    prompt.push_str("User: ");
    prompt.push_str(text);
    prompt.push_str("\nYou:");
    prompt
}
