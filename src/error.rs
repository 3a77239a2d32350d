/// Failure classes for one analysis run.
///
/// Source-page fetch failures are deliberately absent: a source that cannot be
/// fetched or is not HTML is skipped with a warning, never surfaced. Likewise
/// an entity image index that falls outside the candidate list is dropped
/// silently during shaping.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("{0}")]
    InvalidUrl(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("could not fetch episode page: {0}")]
    SeedFetch(String),
    #[error("model service error: {0}")]
    ModelService(String),
    #[error("model response was not valid JSON")]
    ModelParse,
}
