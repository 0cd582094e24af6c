//! Ordered keyword rules for the classification fallback.
//!
//! The table order is a versioned contract, not incidental code order: the
//! first rule with any keyword hit wins, so a post mentioning both moving and
//! cleaning always lands in Transport / Moving. Review reorderings like a
//! schema change.

/// One fallback rule: a category and the substrings that select it.
pub struct CategoryRule {
    pub category: &'static str,
    pub keywords: &'static [&'static str],
}

/// Category assigned when no rule matches.
pub const DEFAULT_CATEGORY: &str = "Other";

/// Canonical rule order. Keywords are lower-case; matching happens against
/// the lower-cased title+text. Norwegian and English, matching the vocabulary
/// of the monitored groups.
pub static CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        category: "Transport / Moving",
        keywords: &[
            "flytte", "flytting", "flyttejobb", "transport", "frakt", "levering", "sjåfør",
            "kjøre", "kjøring", "hente", "moving", "delivery",
        ],
    },
    CategoryRule {
        category: "Painting / Renovation",
        keywords: &[
            "maling", "male vegg", "maler", "oppussing", "renovering", "tapet", "sparkling",
            "painting", "renovation",
        ],
    },
    CategoryRule {
        category: "Cleaning / Garden",
        keywords: &[
            "vask", "rengjøring", "rydding", "nedvask", "hage", "plen", "hekk", "snømåking",
            "cleaning", "garden",
        ],
    },
    CategoryRule {
        category: "Plumbing",
        keywords: &["rørlegger", "lekkasje", "avløp", "kran", "plumber", "plumbing"],
    },
    CategoryRule {
        category: "Electrical",
        keywords: &[
            "elektriker",
            "elektrisk",
            "sikringsskap",
            "stikkontakt",
            "electrician",
            "electrical",
        ],
    },
    CategoryRule {
        category: "Assembly / Furniture",
        keywords: &["montere", "montering", "ikea", "møbler", "assembly", "furniture"],
    },
    CategoryRule {
        category: "Car Mechanic",
        keywords: &["mekaniker", "bilverksted", "eu-kontroll", "verksted", "mechanic"],
    },
    CategoryRule {
        category: "IT / Tech",
        keywords: &["nettside", "printer", "wifi", "pc-hjelp", "datahjelp", "computer", "laptop"],
    },
    CategoryRule {
        category: "Manual Labor",
        keywords: &["bærehjelp", "graving", "rivning", "tunge løft", "dugnad", "labor"],
    },
    CategoryRule {
        category: "Handyman / Misc",
        keywords: &["handyman", "vaktmester", "altmuligmann", "småjobber", "fikse"],
    },
];

/// Every category name the system knows, in precedence order, ending with the
/// default. This is the list offered to the AI classifier prompt.
#[must_use]
pub fn all_categories() -> Vec<&'static str> {
    CATEGORY_RULES
        .iter()
        .map(|r| r.category)
        .chain(std::iter::once(DEFAULT_CATEGORY))
        .collect()
}

/// First rule (in table order) with any keyword contained in `haystack`.
/// `haystack` must already be lower-cased.
#[must_use]
pub fn match_keywords(haystack: &str) -> Option<&'static str> {
    CATEGORY_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| haystack.contains(kw)))
        .map(|rule| rule.category)
}
