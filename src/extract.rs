use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

use crate::config::Config;
use crate::models::ImageCandidate;

// ── Constants ────────────────────────────────────────────────────────────────

const FALLBACK_TITLE: &str = "Untitled page";
const MIN_CONTAINER_TEXT_LEN: usize = 200;
const RASTER_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp"];

// ── Lazy static regexes ──────────────────────────────────────────────────────

static CONTENT_CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(article|content|episode|post|entry|body|main)").unwrap());

static CHROME_CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(navbar|\bnav\b|menu|sidebar|footer|advert|\bads?\b|banner|promo|share|social)")
        .unwrap()
});

// ── Public result type ───────────────────────────────────────────────────────

/// Everything pulled out of one page in a single parse.
#[derive(Debug)]
pub struct PageExtract {
    pub title: String,
    pub text: String,
    pub links: Vec<String>,
    pub images: Vec<ImageCandidate>,
}

// ── URL normalization & filtering ────────────────────────────────────────────

/// Resolve `raw` against `base`, restrict to http/https, and strip the
/// fragment. Returns `None` for anything else (mailto:, javascript:, junk).
pub fn normalize_url(raw: &str, base: &Url) -> Option<String> {
    let mut resolved = base.join(raw.trim()).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

/// True if the URL path (query string ignored) ends in a raster image
/// extension.
pub fn is_raster_image(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let path = parsed.path().to_lowercase();
    RASTER_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Registrable-ish domain of a URL: lowercased host with a leading `www.`
/// stripped.
pub fn domain_of(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// True if `url` lives on `seed_domain` or one of its subdomains.
pub fn on_seed_domain(url: &str, seed_domain: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    match domain_of(&parsed) {
        Some(host) => host == seed_domain || host.ends_with(&format!(".{}", seed_domain)),
        None => false,
    }
}

// ── Page extraction ──────────────────────────────────────────────────────────

/// Parse one page into title, visible text, outbound links, and image
/// candidates. Links on the seed domain are excluded to force outward
/// crawling.
pub fn extract_page(
    html: &str,
    page_url: &str,
    seed_domain: &str,
    text_cap: usize,
    cfg: &Config,
) -> PageExtract {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    let container = find_container(&document);
    let title = page_title(&document, container);

    let text = {
        let body_sel = Selector::parse("body").unwrap();
        let raw = document
            .select(&body_sel)
            .next()
            .map(visible_text)
            .unwrap_or_default();
        truncate_text(&normalize_text(&raw), text_cap).to_string()
    };

    let (links, images) = match &base {
        Some(base) => (
            extract_links(&document, container, base, seed_domain, cfg.max_sources),
            extract_images(&document, base, page_url, &title, cfg),
        ),
        None => (Vec::new(), Vec::new()),
    };

    PageExtract {
        title,
        text,
        links,
        images,
    }
}

// ── Container selection ──────────────────────────────────────────────────────

fn find_container(document: &Html) -> Option<ElementRef<'_>> {
    // 1. Prefer <article>, then <main>.
    for tag in ["article", "main"] {
        let sel = Selector::parse(tag).unwrap();
        if let Some(el) = document.select(&sel).next() {
            return Some(el);
        }
    }

    // 2. Best <div> with a content-like class/id and sufficient text.
    let div_sel = Selector::parse("div").unwrap();
    let mut best: Option<ElementRef<'_>> = None;
    let mut best_len: usize = 0;

    for div in document.select(&div_sel) {
        if !CONTENT_CLASS_RE.is_match(&class_id_of(div)) {
            continue;
        }
        let text_len = visible_text(div).len();
        if text_len > best_len {
            best_len = text_len;
            best = Some(div);
        }
    }

    if best_len >= MIN_CONTAINER_TEXT_LEN {
        return best;
    }

    // 3. Fall back to <body>: links come from the whole document.
    let body_sel = Selector::parse("body").unwrap();
    document.select(&body_sel).next()
}

fn page_title(document: &Html, container: Option<ElementRef<'_>>) -> String {
    let h1_sel = Selector::parse("h1").unwrap();
    if let Some(h1) = container
        .and_then(|c| c.select(&h1_sel).next())
        .or_else(|| document.select(&h1_sel).next())
    {
        let text = normalize_text(&visible_text(h1));
        if !text.is_empty() {
            return text;
        }
    }

    let title_sel = Selector::parse("title").unwrap();
    if let Some(el) = document.select(&title_sel).next() {
        // Site names ride after a pipe: "Episode 12 | Some Podcast".
        let text = visible_text(el);
        let before_pipe = text.split('|').next().unwrap_or("").trim();
        if !before_pipe.is_empty() {
            return before_pipe.to_string();
        }
    }

    FALLBACK_TITLE.to_string()
}

// ── Link extraction ──────────────────────────────────────────────────────────

fn extract_links(
    document: &Html,
    container: Option<ElementRef<'_>>,
    base: &Url,
    seed_domain: &str,
    max: usize,
) -> Vec<String> {
    let anchor_sel = Selector::parse("a").unwrap();
    let mut seen: HashSet<String> = HashSet::new();
    let mut links = Vec::new();

    let anchors: Vec<ElementRef<'_>> = match container {
        Some(c) => c.select(&anchor_sel).collect(),
        None => document.select(&anchor_sel).collect(),
    };

    for anchor in anchors {
        if links.len() >= max {
            break;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(url) = normalize_url(href, base) else {
            continue;
        };
        if on_seed_domain(&url, seed_domain) {
            continue;
        }
        if seen.insert(url.clone()) {
            links.push(url);
        }
    }

    links
}

// ── Image extraction ─────────────────────────────────────────────────────────

fn extract_images(
    document: &Html,
    base: &Url,
    page_url: &str,
    page_title: &str,
    cfg: &Config,
) -> Vec<ImageCandidate> {
    let img_sel = Selector::parse("img").unwrap();
    let mut seen: HashSet<String> = HashSet::new();
    let mut images = Vec::new();

    for img in document.select(&img_sel) {
        if images.len() >= cfg.page_image_cap {
            break;
        }
        if is_in_chrome(img) || is_icon_sized(img, cfg.min_image_dimension) {
            continue;
        }
        let Some(src) = resolve_img_src(img) else {
            continue;
        };
        let Some(url) = normalize_url(src, base).filter(|u| is_raster_image(u)) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }

        let alt = img
            .value()
            .attr("alt")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        images.push(ImageCandidate {
            url,
            alt,
            caption: find_caption(img),
            context: find_context(img, cfg.image_context_cap),
            source_page_url: page_url.to_string(),
            source_page_title: page_title.to_string(),
        });
    }

    // One extra shot from Open Graph metadata if the page was image-poor.
    if images.len() < cfg.page_image_cap {
        if let Some(og) = extract_og_image(document, base) {
            if is_raster_image(&og) && seen.insert(og.clone()) {
                images.push(ImageCandidate {
                    url: og,
                    alt: Some(page_title.to_string()),
                    caption: None,
                    context: None,
                    source_page_url: page_url.to_string(),
                    source_page_title: page_title.to_string(),
                });
            }
        }
    }

    images
}

fn resolve_img_src(el: ElementRef<'_>) -> Option<&str> {
    let v = el.value();
    // Primary src first, then the usual lazy-load stashes.
    ["src", "data-src", "data-lazy-src", "data-original"]
        .iter()
        .find_map(|a| v.attr(a))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn is_in_chrome(el: ElementRef<'_>) -> bool {
    for node in el.ancestors() {
        let Some(ancestor) = ElementRef::wrap(node) else {
            continue;
        };
        if matches!(ancestor.value().name(), "nav" | "footer" | "aside") {
            return true;
        }
        if CHROME_CLASS_RE.is_match(&class_id_of(ancestor)) {
            return true;
        }
    }
    false
}

fn is_icon_sized(el: ElementRef<'_>, min_dimension: u32) -> bool {
    for attr in ["width", "height"] {
        if let Some(value) = el.value().attr(attr) {
            if let Ok(n) = value.trim().parse::<u32>() {
                if n < min_dimension {
                    return true;
                }
            }
        }
    }
    false
}

fn find_caption(img: ElementRef<'_>) -> Option<String> {
    // A wrapping <figure> with a <figcaption> wins.
    for node in img.ancestors() {
        let Some(ancestor) = ElementRef::wrap(node) else {
            continue;
        };
        if ancestor.value().name() == "figure" {
            if let Some(fc) = find_first_tag(ancestor, "figcaption") {
                let text = normalize_text(&visible_text(fc));
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }

    // Otherwise a sibling element carrying a caption class.
    let parent = img.parent()?;
    for sibling in parent.children() {
        let Some(el) = ElementRef::wrap(sibling) else {
            continue;
        };
        let class = el.value().attr("class").unwrap_or("").to_lowercase();
        if class.contains("caption") {
            let text = normalize_text(&visible_text(el));
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn find_context(img: ElementRef<'_>, cap: usize) -> Option<String> {
    for node in img.ancestors() {
        let Some(ancestor) = ElementRef::wrap(node) else {
            continue;
        };
        if matches!(
            ancestor.value().name(),
            "figure" | "p" | "li" | "td" | "section" | "article" | "div"
        ) {
            let text = normalize_text(&visible_text(ancestor));
            if !text.is_empty() {
                return Some(truncate_text(&text, cap).to_string());
            }
        }
    }
    None
}

fn extract_og_image(document: &Html, base: &Url) -> Option<String> {
    let sel = Selector::parse(r#"meta[property="og:image"]"#).unwrap();
    let content = document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|s| !s.is_empty())?;
    normalize_url(content, base)
}

// ── Text helpers ─────────────────────────────────────────────────────────────

/// Recursively collect visible text, skipping script/style-like subtrees.
pub fn visible_text(el: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    collect_visible(el, &mut parts);
    parts.join(" ")
}

fn collect_visible(el: ElementRef<'_>, parts: &mut Vec<String>) {
    use scraper::node::Node;
    if matches!(
        el.value().name(),
        "script" | "style" | "noscript" | "template" | "svg"
    ) {
        return;
    }
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_visible(child_el, parts);
                }
            }
            _ => {}
        }
    }
}

/// Collapse whitespace runs and trim.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max_bytes`, preferring a word boundary and never
/// splitting a UTF-8 character.
pub fn truncate_text(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    match s[..end].rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => &s[..pos],
        _ => &s[..end],
    }
}

/// Depth-first search for the first descendant with the given tag name.
fn find_first_tag<'a>(el: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    use scraper::node::Node;
    for child in el.children() {
        if let Node::Element(_) = child.value() {
            if let Some(child_el) = ElementRef::wrap(child) {
                if child_el.value().name() == tag {
                    return Some(child_el);
                }
                if let Some(found) = find_first_tag(child_el, tag) {
                    return Some(found);
                }
            }
        }
    }
    None
}

fn class_id_of(el: ElementRef<'_>) -> String {
    let id = el.value().id().unwrap_or("");
    let classes = el.value().classes().collect::<Vec<_>>().join(" ");
    format!("{} {}", id, classes)
}

// ── Tests ────────────────────────────────────────────────────────────────────
