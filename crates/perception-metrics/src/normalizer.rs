//! Cleans free-text competitor names and citation domains.
//!
//! Competitor strings arrive comma-separated from the collector and are
//! full of filler ("n/a", "none.", stray initials). Each token is trimmed,
//! checked against the noise rules, mapped through the alias table, and
//! otherwise title-cased. Brands with internal capitals belong in the alias
//! table.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use perception_core::observation::extract_host;
use perception_core::{load_normalizer_overrides, ConfigError, EngineConfig, NormalizerOverrides};
use regex::Regex;

static NULL_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:none|n/?a|null|undefined|nil|unknown)[\s.,;:!?)\]]*$")
        .expect("valid null-marker regex")
});

static NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?[\d.,\s]+%?$").expect("valid numeric regex"));

const ALIASES: &[(&str, &str)] = &[
    ("amazon web services", "AWS"),
    ("aws", "AWS"),
    ("google cloud platform", "Google Cloud"),
    ("gcp", "Google Cloud"),
    ("microsoft azure", "Azure"),
    ("meta platforms", "Meta"),
    ("ibm", "IBM"),
    ("sap", "SAP"),
    ("openai", "OpenAI"),
    ("hubspot", "HubSpot"),
    ("salesforce.com", "Salesforce"),
];

/// Review sites, job boards and aggregators that show up in competitor
/// lists without being competitors.
const NON_COMPETITORS: &[&str] = &[
    "indeed",
    "glassdoor",
    "linkedin",
    "yelp",
    "trustpilot",
    "g2",
    "g2 crowd",
    "capterra",
    "wikipedia",
    "reddit",
    "youtube",
    "ziprecruiter",
    "monster",
    "crunchbase",
    "better business bureau",
    "bbb",
    "quora",
    "gartner peer insights",
];

const DISPLAY_SUFFIXES: &[&str] = &[
    ".com", ".org", ".net", ".io", ".co", ".ai", ".co.uk", ".edu", ".gov",
];

#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Lowercase raw name -> canonical name.
    aliases: HashMap<String, String>,
    noise: HashSet<String>,
    non_competitors: HashSet<String>,
    /// Longest first so `.co.uk` wins over `.co`.
    display_suffixes: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::with_overrides(&NormalizerOverrides::default())
    }
}

impl Normalizer {
    /// Built-in tables extended by `overrides`. Override aliases replace
    /// built-ins with the same key.
    #[must_use]
    pub fn with_overrides(overrides: &NormalizerOverrides) -> Self {
        let mut aliases: HashMap<String, String> = ALIASES
            .iter()
            .map(|(raw, canonical)| ((*raw).to_owned(), (*canonical).to_owned()))
            .collect();
        for (raw, canonical) in &overrides.aliases {
            aliases.insert(raw.trim().to_lowercase(), canonical.trim().to_owned());
        }

        let noise = overrides
            .noise
            .iter()
            .map(|n| n.trim().to_lowercase())
            .collect();

        let non_competitors = NON_COMPETITORS
            .iter()
            .map(|n| (*n).to_owned())
            .chain(overrides.non_competitors.iter().map(|n| n.trim().to_lowercase()))
            .collect();

        let mut display_suffixes: Vec<String> = DISPLAY_SUFFIXES
            .iter()
            .map(|s| (*s).to_owned())
            .chain(overrides.display_suffixes.iter().map(|s| s.trim().to_lowercase()))
            .collect();
        display_suffixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        display_suffixes.dedup();

        Self {
            aliases,
            noise,
            non_competitors,
            display_suffixes,
        }
    }

    /// Built-in tables, extended by the overrides file named in `config`
    /// when there is one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the overrides file cannot be read or is invalid.
    pub fn from_engine_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        let Some(path) = &config.normalizer_path else {
            return Ok(Self::default());
        };
        let overrides = load_normalizer_overrides(path)?;
        tracing::info!(
            path = %path.display(),
            aliases = overrides.aliases.len(),
            noise = overrides.noise.len(),
            non_competitors = overrides.non_competitors.len(),
            "loaded normalizer overrides"
        );
        Ok(Self::with_overrides(&overrides))
    }

    /// Whether a trimmed token carries no name at all.
    #[must_use]
    pub fn is_noise(&self, token: &str) -> bool {
        let token = token.trim();
        if token.is_empty() || NULL_MARKER.is_match(token) || NUMERIC.is_match(token) {
            return true;
        }
        // Purely symbolic tokens and one- or two-character abbreviations.
        let alphanumeric = token.chars().filter(|c| c.is_alphanumeric()).count();
        if alphanumeric <= 2 {
            return true;
        }
        let bare = token.trim_end_matches(|c: char| c.is_ascii_punctuation());
        self.noise.contains(&bare.to_lowercase())
    }

    /// Noise filter, alias table, then title-casing.
    #[must_use]
    pub fn normalize_name(&self, token: &str) -> Option<String> {
        let token = token.trim();
        if self.is_noise(token) {
            return None;
        }
        if let Some(canonical) = self.aliases.get(&token.to_lowercase()) {
            return Some(canonical.clone());
        }
        Some(title_case(token))
    }

    /// [`Self::normalize_name`] plus competitor-only exclusions: the
    /// entity's own name and known non-competitors.
    #[must_use]
    pub fn normalize_competitor(&self, token: &str, entity_name: &str) -> Option<String> {
        let name = self.normalize_name(token)?;
        let key = name.to_lowercase();
        let own = entity_name.trim().to_lowercase();
        if !own.is_empty() && (key == own || token.trim().to_lowercase() == own) {
            return None;
        }
        if self.non_competitors.contains(&key)
            || self.non_competitors.contains(&self.display_name(&key))
        {
            return None;
        }
        Some(name)
    }

    /// Splits a comma-separated competitor field into clean names,
    /// de-duplicated case-insensitively.
    #[must_use]
    pub fn extract_competitors(&self, raw: &str, entity_name: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        raw.split(',')
            .filter_map(|token| self.normalize_competitor(token, entity_name))
            .filter(|name| seen.insert(name.to_lowercase()))
            .collect()
    }

    /// Human-readable name for a citation domain: leading `www.` and one
    /// known TLD suffix removed. The raw domain stays the aggregation key.
    #[must_use]
    pub fn display_name(&self, domain: &str) -> String {
        let mut host = domain.trim().to_lowercase();
        if host.contains("://") {
            if let Some(parsed) = extract_host(&host) {
                host = parsed;
            }
        }
        let host = host.strip_prefix("www.").unwrap_or(&host);
        for suffix in &self.display_suffixes {
            if let Some(stripped) = host.strip_suffix(suffix.as_str()) {
                if !stripped.is_empty() {
                    return stripped.to_owned();
                }
            }
        }
        host.to_owned()
    }
}

fn title_case(token: &str) -> String {
    token
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn noise_tokens_are_dropped() {
        let normalizer = Normalizer::default();
        assert_eq!(
            normalizer.extract_competitors("Acme, n/a, , X, none.", "Initech"),
            vec!["Acme"]
        );
    }

    #[test]
    fn null_markers_with_punctuation_are_noise() {
        let normalizer = Normalizer::default();
        for token in ["None", "N/A.", "na", "NULL;", "undefined!", "  none  "] {
            assert!(normalizer.is_noise(token), "{token:?} should be noise");
        }
    }

    #[test]
    fn numeric_and_symbolic_tokens_are_noise() {
        let normalizer = Normalizer::default();
        for token in ["42", "3.5", "12%", "---", "***", "AB", "x."] {
            assert!(normalizer.is_noise(token), "{token:?} should be noise");
        }
        assert!(!normalizer.is_noise("Acme"));
        assert!(!normalizer.is_noise("7-Eleven"));
    }

    #[test]
    fn aliases_apply_before_title_casing() {
        let normalizer = Normalizer::default();
        assert_eq!(
            normalizer.normalize_name("amazon web services").as_deref(),
            Some("AWS")
        );
        assert_eq!(
            normalizer.normalize_name("Google Cloud Platform").as_deref(),
            Some("Google Cloud")
        );
        assert_eq!(normalizer.normalize_name("acme corp").as_deref(), Some("Acme Corp"));
        assert_eq!(normalizer.normalize_name("openai").as_deref(), Some("OpenAI"));
    }

    #[test]
    fn uppercase_tokens_are_title_cased_too() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.normalize_name("GLOBEX").as_deref(), Some("Globex"));
        assert_eq!(normalizer.normalize_name("acme CORP").as_deref(), Some("Acme Corp"));
    }

    #[test]
    fn own_name_and_non_competitors_are_excluded() {
        let normalizer = Normalizer::default();
        let names = normalizer.extract_competitors(
            "Initech, Globex, Glassdoor, indeed.com, initech, Umbrella",
            "initech",
        );
        assert_eq!(names, vec!["Globex", "Umbrella"]);
    }

    #[test]
    fn case_variants_collapse_to_one_name() {
        let normalizer = Normalizer::default();
        let names = normalizer.extract_competitors("Globex, GLOBEX, globex", "Initech");
        assert_eq!(names, vec!["Globex"]);
    }

    #[test]
    fn display_name_strips_www_and_tld() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.display_name("www.techcrunch.com"), "techcrunch");
        assert_eq!(normalizer.display_name("bbc.co.uk"), "bbc");
        assert_eq!(normalizer.display_name("https://www.wired.com/story"), "wired");
        assert_eq!(normalizer.display_name("example.dev"), "example.dev");
        assert_eq!(normalizer.display_name(".com"), ".com");
    }

    #[test]
    fn overrides_extend_builtin_tables() {
        let overrides = NormalizerOverrides {
            aliases: BTreeMap::from([("alphabet inc".to_owned(), "Google".to_owned())]),
            noise: vec!["tbd".to_owned()],
            non_competitors: vec!["Builtin".to_owned()],
            display_suffixes: vec![".dev".to_owned()],
        };
        let normalizer = Normalizer::with_overrides(&overrides);
        assert_eq!(
            normalizer.extract_competitors("Alphabet Inc, TBD., builtin, Hooli", "Initech"),
            vec!["Google", "Hooli"]
        );
        assert_eq!(normalizer.display_name("example.dev"), "example");
    }
}
