//! Raw observation records: one model's response to one prompt for an entity.
//!
//! Observations are produced by the external collection process and are
//! read-only here. Citations arrive in several shapes depending on the
//! collector version, so decoding is lenient: an array of objects, an
//! array of bare URL/domain strings, or `null` are all accepted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::entity::EntityId;

/// Prompt types (lowercased) that denote the extended / "pro" variant.
const EXTENDED_PROMPT_TYPES: &[&str] = &["pro", "extended", "pro_search"];

/// A single cited source within an observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationEntry {
    pub domain: String,
    pub url: Option<String>,
    pub title: Option<String>,
}

impl CitationEntry {
    /// Builds an entry from a bare string that may be a URL or a domain.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.contains("://") {
            Self {
                domain: extract_host(raw).unwrap_or_default(),
                url: Some(raw.to_owned()),
                title: None,
            }
        } else {
            Self {
                domain: raw.to_owned(),
                url: None,
                title: None,
            }
        }
    }

    /// Aggregation key: the raw domain, trimmed and lowercased.
    ///
    /// Returns `None` for entries with no usable domain.
    #[must_use]
    pub fn domain_key(&self) -> Option<String> {
        let key = self.domain.trim().to_lowercase();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

/// Extracts the host portion of a URL, or `None` if it does not parse.
#[must_use]
pub fn extract_host(url: &str) -> Option<String> {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCitation {
    Plain(String),
    Structured {
        #[serde(default)]
        domain: Option<String>,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        title: Option<String>,
    },
}

impl From<RawCitation> for CitationEntry {
    fn from(raw: RawCitation) -> Self {
        match raw {
            RawCitation::Plain(s) => CitationEntry::from_raw(&s),
            RawCitation::Structured { domain, url, title } => {
                let domain = domain
                    .filter(|d| !d.trim().is_empty())
                    .or_else(|| url.as_deref().and_then(extract_host))
                    .unwrap_or_default();
                CitationEntry { domain, url, title }
            }
        }
    }
}

impl<'de> Deserialize<'de> for CitationEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawCitation::deserialize(deserializer).map(Into::into)
    }
}

fn deserialize_citations<'de, D>(deserializer: D) -> Result<Vec<CitationEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<CitationEntry>> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default())
}

/// Prompt metadata attached to an observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMeta {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default, rename = "type")]
    pub prompt_type: Option<String>,
}

impl PromptMeta {
    /// Whether the prompt type denotes the extended ("pro") variant.
    #[must_use]
    pub fn is_extended(&self) -> bool {
        self.prompt_type.as_deref().is_some_and(|t| {
            let t = t.trim().to_lowercase();
            EXTENDED_PROMPT_TYPES.contains(&t.as_str())
        })
    }
}

/// One raw collected record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: Uuid,
    pub entity_id: EntityId,
    pub prompt_id: Uuid,
    pub model: String,
    pub collected_at: DateTime<Utc>,
    #[serde(default)]
    pub mentioned: bool,
    #[serde(default, deserialize_with = "deserialize_citations")]
    pub citations: Vec<CitationEntry>,
    /// Comma-separated free-text competitor names as detected by the collector.
    #[serde(default)]
    pub competitors: Option<String>,
    #[serde(default)]
    pub prompt: PromptMeta,
}

impl Observation {
    /// Calendar day (UTC) this observation was collected on.
    #[must_use]
    pub fn collection_date(&self) -> NaiveDate {
        self.collected_at.date_naive()
    }

    #[must_use]
    pub fn is_extended(&self) -> bool {
        self.prompt.is_extended()
    }
}
