use std::fmt;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

/// Canonical short name for a job role. Identity is the exact lowercase
/// string, so the only way to build one is through [`RoleLabel::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoleLabel(String);

impl RoleLabel {
    pub fn new(s: &str) -> Self {
        RoleLabel(s.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RoleLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rule catalog: label -> raw case-insensitive patterns, in the order the
/// classifier walks them. Content mirrors the production catalog; first
/// match wins for single-label consumers.
const RULES: &[(&str, &[&str])] = &[
    ("barista", &["barista"]),
    ("waiter/waitress", &["waiter|waitress|server"]),
    ("kitchen helper", &["kitchen helper|commis|steward"]),
    ("cook", &[r"\bcook\b"]),
    ("chef", &["chef|commis"]),
    ("baker", &["baker|pastry"]),
    ("receptionist", &["receptionist"]),
    (
        "sales executive",
        &[r"sales(\s|-)?executive|sales rep|salesperson|sales associate"],
    ),
    ("cashier", &["cashier"]),
    ("storekeeper", &["storekeeper|store keeper|warehouse assistant"]),
    ("merchandiser", &["merchandiser"]),
    (
        "telesales/call center agent",
        &["telesales|call center|callcentre|contact center"],
    ),
    (
        "driver (light)",
        &[r"light\s*driver|delivery driver|motorbike|car driver"],
    ),
    (
        "driver (heavy)",
        &[r"heavy\s*driver|trailer|truck driver|crane"],
    ),
    ("electrician", &["electrician"]),
    ("plumber", &["plumber"]),
    ("ac technician", &["ac tech|hvac|air ?conditioning"]),
    ("carpenter", &["carpenter"]),
    ("mason", &["mason"]),
    ("painter", &["painter"]),
    ("welder", &["welder"]),
    ("mechanic", &["mechanic|technician auto"]),
    ("auto electrician", &[r"auto\s*electric"]),
    ("cctv technician", &["cctv"]),
    ("security guard", &["security guard|watchman"]),
    (
        "admin assistant",
        &["admin(istrative)? assistant|office assistant|secretary"],
    ),
    ("data entry clerk", &["data entry"]),
    ("hr assistant", &["hr assistant|human resources"]),
    ("accountant", &["accountant"]),
    (
        "it technician",
        &[r"\bit\b.*(support|technician)|desktop support"],
    ),
    (
        "web developer",
        &["web developer|frontend|front-end|javascript developer"],
    ),
    (
        "software engineer",
        &["software engineer|backend developer|nodejs|java developer"],
    ),
    ("qa/qc engineer", &["qa|qc|quality assurance|quality control"]),
    ("civil engineer", &["civil engineer"]),
    ("mechanical engineer", &["mechanical engineer"]),
    ("electrical engineer", &["electrical engineer"]),
    ("site engineer", &["site engineer"]),
    ("draftsman", &["draftsman|draughtsman|autocad"]),
    ("estimator", &["estimator|quantity surveyor|qs"]),
    ("foreman", &["foreman|supervisor"]),
    ("nurse", &["nurse"]),
    ("pharmacist", &["pharmacist"]),
    ("teacher", &["teacher|tutor"]),
    ("hairdresser", &["hairdresser|barber|stylist"]),
    ("beautician", &["beautician"]),
    ("butcher", &["butcher"]),
    ("printer (offset/gto)", &["gto|offset printer"]),
];

pub struct TaxonomyEntry {
    pub label: RoleLabel,
    pub rules: Vec<Regex>,
}

/// The fixed role catalog, compiled once at first use and never mutated.
pub struct Taxonomy {
    entries: Vec<TaxonomyEntry>,
}

impl Taxonomy {
    fn build() -> Self {
        let entries = RULES
            .iter()
            .map(|(label, patterns)| TaxonomyEntry {
                label: RoleLabel::new(label),
                rules: patterns
                    .iter()
                    .map(|p| {
                        RegexBuilder::new(p)
                            .case_insensitive(true)
                            .build()
                            .unwrap_or_else(|e| panic!("invalid taxonomy pattern {p:?}: {e}"))
                    })
                    .collect(),
            })
            .collect();
        Taxonomy { entries }
    }

    /// All labels in taxonomy order.
    pub fn labels(&self) -> impl Iterator<Item = &RoleLabel> {
        self.entries.iter().map(|e| &e.label)
    }

    pub fn entries(&self) -> &[TaxonomyEntry] {
        &self.entries
    }

    /// Patterns for a label. Unknown labels are non-matching, not errors.
    pub fn rules_for(&self, label: &RoleLabel) -> Option<&[Regex]> {
        self.entries
            .iter()
            .find(|e| &e.label == label)
            .map(|e| e.rules.as_slice())
    }
}

static TAXONOMY: LazyLock<Taxonomy> = LazyLock::new(Taxonomy::build);

pub fn taxonomy() -> &'static Taxonomy {
    &TAXONOMY
}
