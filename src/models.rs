use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub url: String,
}

/// A discovered image with its page-level metadata, before any model-driven
/// entity assignment. Identity is the normalized URL.
#[derive(Debug, Serialize, Clone)]
pub struct ImageCandidate {
    pub url: String,
    pub alt: Option<String>,
    pub caption: Option<String>,
    pub context: Option<String>,
    #[serde(rename = "sourcePageUrl")]
    pub source_page_url: String,
    #[serde(rename = "sourcePageTitle")]
    pub source_page_title: String,
}

/// A successfully crawled outbound page, text already truncated to budget.
#[derive(Debug, Serialize, Clone)]
pub struct SourcePage {
    pub url: String,
    pub title: String,
    pub text: String,
}

/// An image candidate attached to an entity, enriched with attribution and
/// the model's annotations.
#[derive(Debug, Serialize, Clone)]
pub struct EntityImage {
    pub url: String,
    pub alt: Option<String>,
    pub caption: Option<String>,
    pub context: Option<String>,
    #[serde(rename = "sourcePageUrl")]
    pub source_page_url: String,
    #[serde(rename = "sourcePageTitle")]
    pub source_page_title: String,
    /// Hostname of the page the image was discovered on.
    pub attribution: String,
    pub relevance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub people_shown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A person, location, or organization identified by the model.
#[derive(Debug, Serialize, Clone)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub role: String,
    pub description: String,
    pub pronouns: String,
    pub images: Vec<EntityImage>,
}

#[derive(Debug, Serialize, Clone)]
pub struct EpisodeMeta {
    pub title: String,
    pub url: String,
}

/// The full, final output of one analysis run.
#[derive(Debug, Serialize, Clone)]
pub struct AnalysisResult {
    pub episode: EpisodeMeta,
    pub summary: String,
    pub entities: Vec<Entity>,
    #[serde(rename = "allImages")]
    pub all_images: Vec<ImageCandidate>,
}

// ── Model output wire types ──────────────────────────────────────────────────
//
// What the LLM is instructed to return. Everything defaults so a model that
// omits an optional field still parses; the prompt rules push "leave unknown
// fields empty" onto the model instead.

#[derive(Debug, Deserialize)]
pub struct ModelResponse {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub entities: Vec<ModelEntity>,
}

#[derive(Debug, Deserialize)]
pub struct ModelEntity {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub entity_type: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pronouns: String,
    #[serde(default)]
    pub images: Vec<ModelImageRef>,
}

#[derive(Debug, Deserialize)]
pub struct ModelImageRef {
    /// Index into the deduplicated candidate list. Parsed loosely: a missing
    /// or negative value is treated as out of range during shaping rather
    /// than failing the whole parse.
    #[serde(default)]
    pub image_index: Option<i64>,
    #[serde(default)]
    pub relevance: String,
    pub people_shown: Option<String>,
    pub date: Option<String>,
    pub location: Option<String>,
}
