use std::fmt::Write;

use crate::config::Config;
use crate::crawl::CrawlOutcome;
use crate::extract::truncate_text;
use crate::shape::attribution;

const INSTRUCTIONS: &str = r#"TASK:
Identify every person, location, and organization substantively discussed in the episode, and match each to candidate images where a clear connection exists.

Respond with JSON only (no prose, no markdown fences) matching exactly this shape:
{
  "summary": "two to three sentence summary of the episode",
  "entities": [
    {
      "name": "entity name",
      "type": "person | location | organization",
      "role": "their role in the episode",
      "description": "one or two sentences about them",
      "pronouns": "pronouns if stated, otherwise empty string",
      "images": [
        {
          "image_index": 0,
          "relevance": "why this image matches the entity",
          "people_shown": "who is visible, if known",
          "date": "when the image was taken, if known",
          "location": "where the image was taken, if known"
        }
      ]
    }
  ]
}

RULES:
- Reference images only by image_index from the numbered candidate list above; never invent image URLs.
- Attach an image to an entity only when its alt text, caption, or context clearly ties it to that entity.
- Leave pronouns and any unknown optional field as an empty string or omit it; never fabricate values.
- Prefer fewer, well-supported entities over exhaustive guessing."#;

/// Render the crawl outcome into one deterministic prompt: episode text,
/// capped source texts, and an index-labeled image candidate list, followed
/// by the fixed instruction block.
pub fn build_prompt(outcome: &CrawlOutcome, cfg: &Config) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "You are analyzing a podcast episode page and pages it links to.\n"
    );
    let _ = writeln!(prompt, "EPISODE: {}\n", outcome.episode_title);
    let _ = writeln!(prompt, "EPISODE PAGE TEXT:\n{}\n", outcome.episode_text);

    if !outcome.sources.is_empty() {
        let _ = writeln!(prompt, "SOURCE PAGES:");
        for (i, source) in outcome
            .sources
            .iter()
            .take(cfg.prompt_max_sources)
            .enumerate()
        {
            let _ = writeln!(
                prompt,
                "--- Source {}: {} ({}) ---\n{}\n",
                i + 1,
                source.title,
                source.url,
                truncate_text(&source.text, cfg.prompt_source_text_cap)
            );
        }
    }

    if !outcome.images.is_empty() {
        let _ = writeln!(prompt, "IMAGE CANDIDATES:");
        for (i, img) in outcome.images.iter().take(cfg.prompt_image_cap).enumerate() {
            let _ = writeln!(prompt, "[{}] {}", i, img.url);
            let _ = writeln!(
                prompt,
                "    alt: {} | caption: {} | context: {} | from: {}",
                img.alt.as_deref().unwrap_or("-"),
                img.caption.as_deref().unwrap_or("-"),
                img.context.as_deref().unwrap_or("-"),
                attribution(&img.source_page_url)
            );
        }
        prompt.push('\n');
    }

    prompt.push_str(INSTRUCTIONS);
    prompt
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageCandidate, SourcePage};

    fn candidate(i: usize) -> ImageCandidate {
        ImageCandidate {
            url: format!("https://img.example.org/{}.jpg", i),
            alt: Some(format!("alt {}", i)),
            caption: None,
            context: Some("seen near the interview".to_string()),
            source_page_url: "https://guest-site.org/bio".to_string(),
            source_page_title: "Bio".to_string(),
        }
    }

    fn outcome(images: usize, sources: usize) -> CrawlOutcome {
        CrawlOutcome {
            episode_title: "Episode 42".to_string(),
            episode_text: "A conversation about rivers.".to_string(),
            sources: (0..sources)
                .map(|i| SourcePage {
                    url: format!("https://s{}.org/p", i),
                    title: format!("Source {}", i),
                    text: "x".repeat(5000),
                })
                .collect(),
            images: (0..images).map(candidate).collect(),
        }
    }

    #[test]
    fn prompt_caps_and_indexes_images() {
        let cfg = Config::default();
        let prompt = build_prompt(&outcome(45, 0), &cfg);
        assert!(prompt.contains("[0] https://img.example.org/0.jpg"));
        let last = cfg.prompt_image_cap - 1;
        assert!(prompt.contains(&format!("[{}] https://img.example.org/{}.jpg", last, last)));
        assert!(!prompt.contains(&format!("[{}]", cfg.prompt_image_cap)));
        assert!(prompt.contains("from: guest-site.org"));
    }

    #[test]
    fn prompt_caps_source_pages_and_their_text() {
        let cfg = Config::default();
        let prompt = build_prompt(&outcome(0, 12), &cfg);
        assert!(prompt.contains(&format!("Source {}:", cfg.prompt_max_sources)));
        assert!(!prompt.contains(&format!("Source {}:", cfg.prompt_max_sources + 1)));
        // Each source contributes at most the per-source budget, not its 5000 chars.
        assert!(!prompt.contains(&"x".repeat(cfg.prompt_source_text_cap + 1)));
    }

    #[test]
    fn prompt_states_schema_and_rules() {
        let prompt = build_prompt(&outcome(1, 1), &Config::default());
        assert!(prompt.contains("\"image_index\""));
        assert!(prompt.contains("Reference images only by image_index"));
        assert!(prompt.contains("EPISODE: Episode 42"));
    }
}
