use tokio::sync::mpsc;

use crate::config::Config;
use crate::crawl::{crawl, validate_seed_url};
use crate::error::AnalyzeError;
use crate::llm::ModelClient;
use crate::models::{AnalysisResult, EpisodeMeta};
use crate::prompt::build_prompt;
use crate::shape::shape_response;

// ── Progress channel ─────────────────────────────────────────────────────────

/// One of the two message kinds a streaming client sees: human-readable
/// status lines, then exactly one result (or error) line.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    Status(String),
    Result(String),
    Error(String),
}

impl StreamMessage {
    pub fn into_line(self) -> String {
        match self {
            StreamMessage::Status(message) => format!("STATUS: {}\n", message),
            StreamMessage::Result(json) => format!("RESULT: {}\n", json),
            StreamMessage::Error(message) => format!("ERROR: {}\n", message),
        }
    }
}

/// One-way progress reporting. Status lines are advisory: a closed or absent
/// receiver is ignored, and a full buffer (a client that stopped reading)
/// drops the line instead of stalling the crawl.
pub struct Progress(Option<mpsc::Sender<StreamMessage>>);

impl Progress {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn channel(tx: mpsc::Sender<StreamMessage>) -> Self {
        Self(Some(tx))
    }

    pub fn send(&self, message: impl Into<String>) {
        if let Some(tx) = &self.0 {
            let _ = tx.try_send(StreamMessage::Status(message.into()));
        }
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

/// The whole run, start to finish: validate → crawl → prompt → model →
/// shape. Everything before a usable model response either succeeds or
/// aborts with one error; there is no partial result.
pub async fn analyze(
    url: &str,
    cfg: &Config,
    llm: &ModelClient,
    progress: &Progress,
) -> Result<AnalysisResult, AnalyzeError> {
    let seed_url = validate_seed_url(url)?;

    let outcome = crawl(&seed_url, cfg, progress).await?;
    progress.send(format!(
        "Gathered {} source pages and {} unique images",
        outcome.sources.len(),
        outcome.images.len()
    ));

    let prompt = build_prompt(&outcome, cfg);
    progress.send("Asking the model to identify people and places");
    let raw = llm.complete(&prompt).await?;
    tracing::info!(model = llm.model(), response_len = raw.len(), "model call complete");

    progress.send("Matching images to entities");
    let episode = EpisodeMeta {
        title: outcome.episode_title.clone(),
        url: seed_url.to_string(),
    };
    shape_response(&raw, episode, &outcome.images, cfg)
}

// ── Tests ────────────────────────────────────────────────────────────────────
