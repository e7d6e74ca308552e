use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Qualifier terms dropped from ingredient names. Multi-word and hyphenated
/// terms come first so the alternation prefers them over their parts.
pub const QUALIFIER_TERMS: &[&str] = &[
    "extra-large",
    "extra large",
    "free-range",
    "grass-fed",
    "shredded",
    "chopped",
    "organic",
    "minced",
    "sliced",
    "grated",
    "frozen",
    "cooked",
    "medium",
    "canned",
    "diced",
    "dried",
    "fresh",
    "large",
    "small",
    "raw",
];

static QUALIFIERS: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = QUALIFIER_TERMS
        .iter()
        .map(|t| regex::escape(t).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("qualifier pattern should be valid")
});

// Each quantity must stand alone as a token, so "7Up" and "5-Spice" survive.
static LEADING_QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:\d+(?:[.,]\d+)?(?:/\d+)?[½⅓⅔¼¾⅕⅖⅗⅘⅙⅚⅛⅜⅝⅞]?|[½⅓⅔¼¾⅕⅖⅗⅘⅙⅚⅛⅜⅝⅞])(?:\s+|$))+",
    )
    .expect("quantity pattern should be valid")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern should be valid"));

/// Outcome of normalizing one name, with what was taken out of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedName {
    pub name: String,
    pub removed_terms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripped_quantity: Option<String>,
}

impl NormalizedName {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// Canonical lookup key for a raw ingredient name.
///
/// `"2 Fresh Large Diced Tomatoes"` becomes `"Tomatoes"`. An empty result means
/// the row has no usable name.
#[must_use]
pub fn normalize_name(raw: &str) -> String {
    normalize_name_detailed(raw).name
}

#[must_use]
pub fn normalize_name_detailed(raw: &str) -> NormalizedName {
    let mut name = title_case(raw.trim());
    let mut removed_terms = Vec::new();
    let mut stripped_quantity = None;

    // Removing one token can bring two others together ("Extra Fresh Large"),
    // so repeat until nothing changes. Every round strictly shortens the name.
    loop {
        let before = name.len();

        for m in QUALIFIERS.find_iter(&name) {
            let term = WHITESPACE.replace_all(&m.as_str().to_lowercase(), " ").into_owned();
            if !removed_terms.contains(&term) {
                removed_terms.push(term);
            }
        }
        let without_qualifiers = QUALIFIERS.replace_all(&name, " ");
        let collapsed = WHITESPACE.replace_all(without_qualifiers.trim(), " ");

        name = match LEADING_QUANTITY.find(&collapsed) {
            Some(m) if !m.as_str().is_empty() => {
                stripped_quantity.get_or_insert_with(|| m.as_str().trim().to_string());
                collapsed[m.end()..].to_string()
            }
            _ => collapsed.into_owned(),
        };
        name = name
            .trim_matches(|c: char| c.is_whitespace() || c == ',')
            .to_string();

        if name.len() == before {
            break;
        }
    }

    NormalizedName {
        name,
        removed_terms,
        stripped_quantity,
    }
}

/// Upper-case every letter that follows a non-letter, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_letter = true;
        } else {
            out.push(c);
            prev_letter = false;
        }
    }
    out
}
