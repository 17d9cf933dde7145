//! Rule-based degraded-mode anonymizer.
//!
//! Used only when the external processing webhook is unreachable or stays
//! silent past the escalation threshold. Each distinct matched substring is
//! replaced everywhere it occurs by a `{%{Category-id}%}` placeholder whose
//! 8-hex-char id is random per run but shared across occurrences of that
//! substring. Detectors run independently against the original text;
//! overlapping matches across categories are not deduplicated (the later
//! replacement simply finds nothing left to replace). That mirrors the
//! external workflow's placeholder convention and is an accepted limitation,
//! not a bug to patch here.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;

static PERSON_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-ZÄÖÜ][a-zäöüß]+\s+[A-ZÄÖÜ][a-zäöüß]+\b").expect("person name pattern")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email pattern")
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\+?\d{1,2}[\s.]?)?\(?\d{3,5}\)?[-.\s]?\d{1,5}[-.\s]?\d{2,4}\b")
        .expect("phone pattern")
});

// Number-first street addresses plus the suffix-attached form common in
// German-language documents.
static ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b\d+\s+[A-Za-z]+\s+(?:Street|St|Avenue|Ave|Boulevard|Blvd|Road|Rd|Lane|Drive|Court|Place|Square|Way)\b|\b[A-ZÄÖÜ][a-zäöüß]*(?:straße|strasse|weg|gasse|platz|allee|ring)\s+\d+[a-z]?\b",
    )
    .expect("address pattern")
});

static COMPANY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b[A-ZÄÖÜ][A-Za-zäöüß&.-]*\s+(?:GmbH|AG|KG|SE|Incorporated|Inc\.?|Ltd\.?|LLC|Corporation|Corp\.?|Company|Co\.?|Technologies|Software|Systems)\b",
    )
    .expect("company pattern")
});

/// Replace detected sensitive substrings with placeholder tokens.
///
/// Person names expand into a `FirstName`/`LastName` placeholder pair that
/// shares one id, matching what the external workflow emits for split name
/// fields.
pub fn anonymize(text: &str) -> String {
    let mut output = text.to_string();

    for name in distinct_matches(&PERSON_NAME, text) {
        let id = random_id();
        let replacement = format!(
            "{} {}",
            placeholder("FirstName", &id),
            placeholder("LastName", &id)
        );
        output = output.replace(&name, &replacement);
    }

    let detectors: [(&str, &Regex); 4] = [
        ("Email", &EMAIL),
        ("Phone", &PHONE),
        ("Address", &ADDRESS),
        ("CompanyName", &COMPANY),
    ];
    for (category, regex) in detectors {
        for matched in distinct_matches(regex, text) {
            let id = random_id();
            output = output.replace(&matched, &placeholder(category, &id));
        }
    }

    output
}

fn distinct_matches(regex: &Regex, text: &str) -> BTreeSet<String> {
    regex
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn random_id() -> String {
    format!("{:08x}", rand::thread_rng().gen::<u32>())
}

fn placeholder(category: &str, id: &str) -> String {
    format!("{{%{{{category}-{id}}}%}}")
}
