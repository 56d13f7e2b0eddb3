//! Outreach stage: a short personalised cold email per lead.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument, warn};

use leadgen_shared::{
    GenerationRequest, LeadRecord, MAX_OUTREACH_WORDS, OutreachConfig, RecordStage,
    TextGenerationCapability, word_count,
};

/// Sentence end: terminal punctuation, optional closing quotes or brackets,
/// then whitespace or end of text. Group 1 is the sentence end itself.
static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([.!?]+["'”’)\]]*)(?:\s|$)"#).expect("sentence regex")
});

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("word regex"));

const SYSTEM_PROMPT: &str = "You are a cold email copywriter who writes to owners and directors \
of marketing agencies. You write short, specific, conversational emails that read like one \
person writing to another. Reply with the email body only: plain text, no subject line, no \
placeholders, at most 120 words.";

/// Sender details filled into the message.
#[derive(Debug, Clone, Default)]
pub struct OutreachTemplate {
    pub sender_name: String,
    pub sender_company: String,
    pub value_proposition: String,
}

impl From<&OutreachConfig> for OutreachTemplate {
    fn from(config: &OutreachConfig) -> Self {
        Self {
            sender_name: config.sender_name.trim().to_string(),
            sender_company: config.sender_company.trim().to_string(),
            value_proposition: config.value_proposition.trim().to_string(),
        }
    }
}

/// Build the generation request for one lead.
pub fn build_request(record: &LeadRecord, template: &OutreachTemplate) -> GenerationRequest {
    let salutation = match record.contact_name() {
        Some(name) => format!("Hi {name},"),
        None => format!("Hi {} team,", record.agency_name()),
    };

    let mut prompt = String::new();
    let _ = writeln!(prompt, "Write a cold email to this agency.");
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Agency: {}", record.agency_name());
    let _ = writeln!(prompt, "Website: {}", record.website());
    let _ = writeln!(prompt, "Services: {}", record.services().unwrap_or("unknown"));
    if let Some(niche) = record.niche() {
        let _ = writeln!(prompt, "Client niche: {niche}");
    }
    let _ = writeln!(prompt, "Salutation: {salutation}");
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Structure:");
    let _ = writeln!(
        prompt,
        "1. Opening that refers to their services or niche in one sentence."
    );
    if template.value_proposition.is_empty() {
        let _ = writeln!(prompt, "2. One sentence on how we could help them grow.");
    } else {
        let _ = writeln!(
            prompt,
            "2. One sentence conveying: {}",
            template.value_proposition
        );
    }
    let _ = writeln!(prompt, "3. Ask for a 15-minute call. Only one call to action.");
    match (template.sender_name.as_str(), template.sender_company.as_str()) {
        ("", "") => {
            let _ = writeln!(prompt, "4. A short sign-off without a name.");
        }
        (name, "") | ("", name) => {
            let _ = writeln!(prompt, "4. Sign off as {name}.");
        }
        (name, company) => {
            let _ = writeln!(prompt, "4. Sign off as {name}, {company}.");
        }
    }
    let _ = writeln!(prompt);
    let _ = write!(
        prompt,
        "Keep it under {MAX_OUTREACH_WORDS} words. No generic templates, no salesy language, \
         no long paragraphs."
    );

    GenerationRequest {
        system: SYSTEM_PROMPT.to_string(),
        prompt,
    }
}

/// Cut `text` to at most `limit` words.
///
/// Ends at the last sentence boundary that fits; when not even the first
/// sentence fits, cuts after the `limit`-th word.
pub fn truncate_to_word_limit(text: &str, limit: usize) -> String {
    let text = text.trim();
    if word_count(text) <= limit {
        return text.to_string();
    }

    let boundary = SENTENCE_END
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.end()))
        .take_while(|&end| word_count(&text[..end]) <= limit)
        .last();

    match boundary {
        Some(end) => text[..end].trim_end().to_string(),
        None => match WORD.find_iter(text).nth(limit.saturating_sub(1)) {
            Some(word) if limit > 0 => text[..word.end()].to_string(),
            _ => String::new(),
        },
    }
}

/// Generate and attach an outreach message. Returns whether one was stored.
///
/// Generation failures and empty replies leave the message absent.
#[instrument(skip_all, fields(agency = %record.agency_name()))]
pub async fn generate_outreach(
    record: &mut LeadRecord,
    generate: &dyn TextGenerationCapability,
    template: &OutreachTemplate,
) -> bool {
    let request = build_request(record, template);

    let stored = match generate.generate(&request).await {
        Ok(text) => {
            let words = word_count(&text);
            let message = truncate_to_word_limit(&text, MAX_OUTREACH_WORDS);
            if words > MAX_OUTREACH_WORDS {
                debug!(words, kept = word_count(&message), "truncated outreach message");
            }
            match record.set_outreach(message) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "discarding outreach message");
                    false
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "outreach generation failed");
            false
        }
    };

    record.advance_to(RecordStage::MessageDrafted);
    stored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGenerate;

    fn seed() -> LeadRecord {
        let mut record = LeadRecord::new("Pixel Post", "https://pixelpost.fi", "Finland").unwrap();
        record.mark_enriched(
            Some("Social Media Management".into()),
            Some("hospitality".into()),
            None,
        );
        record
    }

    fn sentences(count: usize, words_each: usize) -> String {
        (0..count)
            .map(|i| {
                let body = vec!["word"; words_each - 1].join(" ");
                format!("Sentence{i} {body}.")
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn short_text_is_kept() {
        assert_eq!(truncate_to_word_limit("  Hi there. Bye.  ", 120), "Hi there. Bye.");
    }

    #[test]
    fn truncates_at_last_fitting_sentence() {
        // 20 sentences of 10 words = 200 words
        let text = sentences(20, 10);
        let cut = truncate_to_word_limit(&text, 120);
        assert_eq!(word_count(&cut), 120);
        assert!(cut.ends_with("Sentence11 word word word word word word word word word."));
    }

    #[test]
    fn boundary_may_fall_short_of_limit() {
        // 200 words in sentences of 25: the last fit ends at word 100
        let text = sentences(8, 25);
        let cut = truncate_to_word_limit(&text, 120);
        assert_eq!(word_count(&cut), 100);
        assert!(cut.ends_with('.'));
    }

    #[test]
    fn closing_quotes_stay_with_sentence() {
        let text = format!("He said \"book a call!\" {}", "more ".repeat(200));
        assert_eq!(truncate_to_word_limit(&text, 10), "He said \"book a call!\"");
    }

    #[test]
    fn no_fitting_sentence_cuts_after_limit_words() {
        let text = "word ".repeat(200);
        let cut = truncate_to_word_limit(&text, 120);
        assert_eq!(word_count(&cut), 120);
        assert!(cut.ends_with("word"));
    }

    #[test]
    fn decimal_points_are_not_boundaries() {
        let text = format!("We grew 2.5x in {}", "year ".repeat(150));
        let cut = truncate_to_word_limit(&text, 5);
        assert_eq!(cut, "We grew 2.5x in year");
    }

    #[test]
    fn salutation_falls_back_to_team() {
        let request = build_request(&seed(), &OutreachTemplate::default());
        assert!(request.prompt.contains("Hi Pixel Post team,"));
        assert!(request.prompt.contains("Services: Social Media Management"));
        assert!(request.prompt.contains("Client niche: hospitality"));
        assert!(request.prompt.contains("15-minute call"));
        assert!(request.system.contains("120 words"));
    }

    #[test]
    fn salutation_uses_contact_name_and_sender() {
        let mut record = seed();
        record.record_contact(Some("Jane Virtanen".into()), Some("jane@pixelpost.fi".into()));
        let template = OutreachTemplate {
            sender_name: "Mikko".into(),
            sender_company: "Growth Oy".into(),
            value_proposition: "We fill agency pipelines with qualified B2B leads.".into(),
        };
        let request = build_request(&record, &template);
        assert!(request.prompt.contains("Hi Jane Virtanen,"));
        assert!(request.prompt.contains("Sign off as Mikko, Growth Oy."));
        assert!(request.prompt.contains("qualified B2B leads"));
    }

    #[tokio::test]
    async fn long_generation_is_truncated_and_counted() {
        let generate = FakeGenerate::replying(&sentences(20, 10));
        let mut record = seed();

        assert!(generate_outreach(&mut record, &generate, &OutreachTemplate::default()).await);
        let message = record.outreach_message().unwrap();
        assert_eq!(record.message_length(), Some(word_count(message)));
        assert_eq!(record.message_length(), Some(120));
        assert_eq!(record.stage(), RecordStage::MessageDrafted);
    }

    #[tokio::test]
    async fn generator_receives_personalised_prompt() {
        let generate = FakeGenerate::replying("Hi there. Shall we talk?");
        let template = OutreachTemplate::default();

        let mut named = seed();
        named.record_contact(Some("Anna Korhonen".into()), Some("anna@pixelpost.fi".into()));
        let mut unnamed = seed();
        unnamed.record_contact(None, Some("info@pixelpost.fi".into()));

        assert!(generate_outreach(&mut named, &generate, &template).await);
        assert!(generate_outreach(&mut unnamed, &generate, &template).await);

        let prompts = generate.prompts();
        assert_eq!(prompts.len(), 2);
        for request in &prompts {
            assert!(request.prompt.contains("Pixel Post"));
            assert!(request.prompt.contains("Social Media Management"));
            assert!(request.prompt.contains("hospitality"));
            assert!(!request.system.is_empty());
        }
        assert!(prompts[0].prompt.contains("Hi Anna Korhonen,"));
        assert!(!prompts[0].prompt.contains("team,"));
        assert!(prompts[1].prompt.contains("Hi Pixel Post team,"));
    }

    #[tokio::test]
    async fn failed_generation_leaves_message_absent() {
        let generate = FakeGenerate::failing();
        let mut record = seed();

        assert!(!generate_outreach(&mut record, &generate, &OutreachTemplate::default()).await);
        assert_eq!(record.outreach_message(), None);
        assert_eq!(record.message_length(), None);
        assert_eq!(record.stage(), RecordStage::MessageDrafted);
    }

    #[tokio::test]
    async fn blank_generation_leaves_message_absent() {
        let generate = FakeGenerate::replying("   \n ");
        let mut record = seed();

        assert!(!generate_outreach(&mut record, &generate, &OutreachTemplate::default()).await);
        assert_eq!(record.outreach_message(), None);
    }
}
