use url::Url;

use crate::config::Config;
use crate::error::AnalyzeError;
use crate::models::{
    AnalysisResult, Entity, EntityImage, EpisodeMeta, ImageCandidate, ModelResponse,
};

/// Hostname of the page an image was discovered on.
pub fn attribution(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// Strip an optional markdown code fence from a model response.
pub fn strip_code_fence(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Parse the model's raw text and assemble the final result. A JSON parse
/// failure is fatal; an entity image index outside the candidate list is
/// dropped without comment.
pub fn shape_response(
    raw: &str,
    episode: EpisodeMeta,
    images: &[ImageCandidate],
    cfg: &Config,
) -> Result<AnalysisResult, AnalyzeError> {
    let parsed: ModelResponse =
        serde_json::from_str(strip_code_fence(raw)).map_err(|_| AnalyzeError::ModelParse)?;

    let entities = parsed
        .entities
        .into_iter()
        .map(|entity| Entity {
            name: entity.name,
            entity_type: entity.entity_type,
            role: entity.role,
            description: entity.description,
            pronouns: entity.pronouns,
            images: entity
                .images
                .into_iter()
                .filter_map(|image_ref| {
                    // Missing, negative, and too-large indexes all resolve to
                    // nothing and are dropped without comment.
                    let index = usize::try_from(image_ref.image_index?).ok()?;
                    let candidate = images.get(index)?;
                    Some(EntityImage {
                        url: candidate.url.clone(),
                        alt: candidate.alt.clone(),
                        caption: candidate.caption.clone(),
                        context: candidate.context.clone(),
                        source_page_url: candidate.source_page_url.clone(),
                        source_page_title: candidate.source_page_title.clone(),
                        attribution: attribution(&candidate.source_page_url),
                        relevance: image_ref.relevance,
                        people_shown: image_ref.people_shown.filter(|s| !s.is_empty()),
                        date: image_ref.date.filter(|s| !s.is_empty()),
                        location: image_ref.location.filter(|s| !s.is_empty()),
                    })
                })
                .collect(),
        })
        .collect();

    Ok(AnalysisResult {
        episode,
        summary: parsed.summary,
        entities,
        all_images: images.iter().take(cfg.all_images_cap).cloned().collect(),
    })
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn episode() -> EpisodeMeta {
        EpisodeMeta {
            title: "Episode 42".to_string(),
            url: "https://podcast.example.com/ep/42".to_string(),
        }
    }

    fn candidates(n: usize) -> Vec<ImageCandidate> {
        (0..n)
            .map(|i| ImageCandidate {
                url: format!("https://img.org/{}.jpg", i),
                alt: Some("alt".to_string()),
                caption: None,
                context: None,
                source_page_url: "https://www.guest-site.org/bio".to_string(),
                source_page_title: "Bio".to_string(),
            })
            .collect()
    }

    const MODEL_JSON: &str = r#"{
        "summary": "An episode about rivers.",
        "entities": [
            {
                "name": "Jane Doe",
                "type": "person",
                "role": "guest",
                "description": "A hydrologist.",
                "pronouns": "",
                "images": [
                    {"image_index": 0, "relevance": "portrait from her bio page"},
                    {"image_index": 99, "relevance": "does not exist"}
                ]
            }
        ]
    }"#;

    #[test]
    fn fenced_and_plain_responses_shape_identically() {
        let imgs = candidates(2);
        let cfg = Config::default();
        let plain = shape_response(MODEL_JSON, episode(), &imgs, &cfg).unwrap();
        let fenced = format!("```json\n{}\n```", MODEL_JSON);
        let wrapped = shape_response(&fenced, episode(), &imgs, &cfg).unwrap();
        assert_eq!(
            serde_json::to_value(&plain).unwrap(),
            serde_json::to_value(&wrapped).unwrap()
        );
    }

    #[test]
    fn out_of_range_index_is_dropped_silently() {
        let result =
            shape_response(MODEL_JSON, episode(), &candidates(2), &Config::default()).unwrap();
        assert_eq!(result.entities.len(), 1);
        let entity = &result.entities[0];
        assert_eq!(entity.images.len(), 1);
        assert_eq!(entity.images[0].url, "https://img.org/0.jpg");
    }

    #[test]
    fn negative_or_missing_image_index_is_dropped_silently() {
        let raw = r#"{
            "summary": "s",
            "entities": [{
                "name": "Jane Doe",
                "type": "person",
                "role": "guest",
                "description": "d",
                "pronouns": "",
                "images": [
                    {"image_index": -1, "relevance": "negative"},
                    {"relevance": "field omitted"},
                    {"image_index": 0, "relevance": "valid"}
                ]
            }]
        }"#;
        let result = shape_response(raw, episode(), &candidates(2), &Config::default()).unwrap();
        assert_eq!(result.entities.len(), 1);
        let entity = &result.entities[0];
        assert_eq!(entity.images.len(), 1);
        assert_eq!(entity.images[0].url, "https://img.org/0.jpg");
        assert_eq!(entity.images[0].relevance, "valid");
    }

    #[test]
    fn attribution_is_source_page_host() {
        let result =
            shape_response(MODEL_JSON, episode(), &candidates(1), &Config::default()).unwrap();
        assert_eq!(result.entities[0].images[0].attribution, "www.guest-site.org");
        assert_eq!(attribution("not a url"), "");
    }

    #[test]
    fn all_images_is_capped() {
        let cfg = Config::default();
        let result =
            shape_response(r#"{"summary":"s","entities":[]}"#, episode(), &candidates(80), &cfg)
                .unwrap();
        assert_eq!(result.all_images.len(), cfg.all_images_cap);
        assert_eq!(result.all_images[0].url, "https://img.org/0.jpg");
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = shape_response("not json at all", episode(), &candidates(1), &Config::default())
            .unwrap_err();
        assert!(matches!(err, AnalyzeError::ModelParse));
    }

    #[test]
    fn strip_code_fence_variants() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("{}"), "{}");
    }
}
