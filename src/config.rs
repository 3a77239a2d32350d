use std::time::Duration;

/// Process-wide tunables for one analysis run.
///
/// Passed explicitly into the pipeline rather than read as ambient globals,
/// so tests can shrink the caps without touching the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of outbound source links followed from the seed page.
    pub max_sources: usize,
    /// Per-request total timeout for every fetch (seed and sources alike).
    pub fetch_timeout: Duration,
    /// Connect timeout for every fetch.
    pub connect_timeout: Duration,
    /// Pause between consecutive source fetches.
    pub crawl_delay: Duration,
    /// Character budget for the seed page's body text.
    pub seed_text_cap: usize,
    /// Character budget for each source page's body text.
    pub source_text_cap: usize,
    /// Character budget per source page inside the model prompt.
    pub prompt_source_text_cap: usize,
    /// Maximum number of source pages rendered into the prompt.
    pub prompt_max_sources: usize,
    /// Maximum image candidates extracted from a single page.
    pub page_image_cap: usize,
    /// Maximum image candidates enumerated in the prompt.
    pub prompt_image_cap: usize,
    /// Maximum images in the final result's flat list.
    pub all_images_cap: usize,
    /// Declared width/height below this is treated as an icon and skipped.
    pub min_image_dimension: u32,
    /// Characters of enclosing-block text kept as an image's context snippet.
    pub image_context_cap: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_sources: 10,
            fetch_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            crawl_delay: Duration::from_millis(500),
            seed_text_cap: 8000,
            source_text_cap: 4000,
            prompt_source_text_cap: 2500,
            prompt_max_sources: 8,
            page_image_cap: 12,
            prompt_image_cap: 30,
            all_images_cap: 50,
            min_image_dimension: 100,
            image_context_cap: 250,
        }
    }
}
