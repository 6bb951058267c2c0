//! DOM Analyzer (C2): extracts interactive/form/navigation elements from a
//! live page and scores per-element and per-page confidence.
//!
//! The live page itself is an external collaborator (the Browser Driver
//! queries selectors and reads text/attributes per spec.md §6); this crate
//! only owns the pure scoring and formatting logic, consuming raw candidates
//! through the `PageInspector` trait seam — the same "driver behind a
//! narrower trait" shape `browser-manager` uses for `BrowserDriver`.

use async_trait::async_trait;
use soulbrowser_core_types::{DomAnalysis, DomElement, ElementType, FormInfo};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomAnalyzerError {
    #[error("page inspector error: {0}")]
    Inspector(String),
}

/// One interactive/navigation/content candidate as read off the live page,
/// before confidence scoring or type classification.
#[derive(Clone, Debug, Default)]
pub struct RawCandidate {
    pub tag: String,
    pub text: String,
    pub attributes: HashMap<String, String>,
    pub xpath: String,
    pub selector: String,
}

/// Contract satisfied by whichever concrete browser driver is wired in.
/// Mirrors spec.md §6's "query selectors ... read text/attributes".
#[async_trait]
pub trait PageInspector: Send + Sync {
    async fn title(&self) -> Result<String, DomAnalyzerError>;
    async fn interactive_candidates(&self) -> Result<Vec<RawCandidate>, DomAnalyzerError>;
    async fn forms(&self) -> Result<Vec<FormInfo>, DomAnalyzerError>;
    async fn navigation_candidates(&self) -> Result<Vec<RawCandidate>, DomAnalyzerError>;
    async fn content_candidates(&self) -> Result<Vec<RawCandidate>, DomAnalyzerError>;
}

const INTERACTIVE_TAGS: &[&str] = &["button", "input", "select", "textarea", "a"];

/// Element confidence per spec.md §4.2: 0.3 baseline, +0.2 per identifying
/// attribute (id/name/aria-label), +0.15 for short non-empty visible text,
/// +0.15 for a recognized interactive tag, capped at 1.0.
pub fn element_confidence(candidate: &RawCandidate) -> f64 {
    let mut score: f64 = 0.3;

    for attr in ["id", "name", "aria-label"] {
        if candidate
            .attributes
            .get(attr)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
        {
            score += 0.2;
        }
    }

    let trimmed = candidate.text.trim();
    if !trimmed.is_empty() && trimmed.chars().count() <= 80 {
        score += 0.15;
    }

    if INTERACTIVE_TAGS.contains(&candidate.tag.to_lowercase().as_str()) {
        score += 0.15;
    }

    score.min(1.0)
}

/// Classifies element type from tag + `type` attribute per spec.md §4.2.
pub fn classify_element_type(candidate: &RawCandidate) -> ElementType {
    let tag = candidate.tag.to_lowercase();
    let type_attr = candidate
        .attributes
        .get("type")
        .map(|v| v.to_lowercase())
        .unwrap_or_default();
    let role = candidate
        .attributes
        .get("role")
        .map(|v| v.to_lowercase())
        .unwrap_or_default();

    match tag.as_str() {
        "button" => ElementType::Button,
        "a" => ElementType::Link,
        "select" => ElementType::Select,
        "textarea" => ElementType::TextInput,
        "input" => match type_attr.as_str() {
            "checkbox" => ElementType::Checkbox,
            "radio" => ElementType::Radio,
            "text" | "email" | "password" | "search" | "tel" | "url" | "number" | "" => {
                ElementType::TextInput
            }
            _ => ElementType::Other,
        },
        _ if role == "button" => ElementType::Button,
        _ => ElementType::Other,
    }
}

fn to_dom_element(candidate: RawCandidate) -> DomElement {
    let confidence = element_confidence(&candidate);
    let element_type = classify_element_type(&candidate);
    let is_interactive = INTERACTIVE_TAGS.contains(&candidate.tag.to_lowercase().as_str())
        || candidate.attributes.get("role").map(|r| r == "button").unwrap_or(false);
    DomElement {
        tag: candidate.tag,
        text: candidate.text,
        element_type,
        attributes: candidate.attributes,
        xpath: candidate.xpath,
        selector: candidate.selector,
        is_interactive,
        confidence,
    }
}

/// Page confidence (`analysis_confidence`) per spec.md §4.2's weighted sum,
/// clipped to [0,1].
pub fn page_confidence(
    interactive: &[DomElement],
    has_form: bool,
    navigation_count: usize,
) -> f64 {
    let interactive_count = interactive.len();
    let interactive_term = 0.4 * (interactive_count as f64 / 5.0).min(1.0);
    let form_term = if has_form { 0.25 } else { 0.0 };
    let nav_term = 0.15 * (navigation_count as f64 / 3.0).min(1.0);

    let k = interactive_count.min(10);
    let top_k_mean = if k == 0 {
        0.0
    } else {
        let mut confidences: Vec<f64> = interactive.iter().map(|e| e.confidence).collect();
        confidences.sort_by(|a, b| b.partial_cmp(a).unwrap());
        confidences.iter().take(k).sum::<f64>() / k as f64
    };
    let confidence_term = 0.2 * top_k_mean;

    (interactive_term + form_term + nav_term + confidence_term).clamp(0.0, 1.0)
}

/// Computes a full `DomAnalysis` from raw extracted candidates. Pure and
/// deterministic given the same input ordering (ties in confidence break by
/// extraction order per spec.md §4.2).
pub fn analyze(
    url: &str,
    title: &str,
    interactive_raw: Vec<RawCandidate>,
    forms: Vec<FormInfo>,
    navigation_raw: Vec<RawCandidate>,
    content_raw: Vec<RawCandidate>,
) -> DomAnalysis {
    let interactive_elements: Vec<DomElement> =
        interactive_raw.into_iter().map(to_dom_element).collect();
    let navigation_elements: Vec<DomElement> =
        navigation_raw.into_iter().map(to_dom_element).collect();
    let content_elements: Vec<DomElement> = content_raw.into_iter().map(to_dom_element).collect();

    let analysis_confidence =
        page_confidence(&interactive_elements, !forms.is_empty(), navigation_elements.len());

    let total_element_count =
        interactive_elements.len() + navigation_elements.len() + content_elements.len();

    DomAnalysis {
        url: url.to_string(),
        title: title.to_string(),
        interactive_elements,
        forms,
        navigation_elements,
        content_elements,
        total_element_count,
        analysis_confidence,
    }
}

/// Navigates (via `inspector`, already pointed at a loaded page) and emits
/// a `DomAnalysis`.
pub async fn analyze_page(
    inspector: &dyn PageInspector,
    url: &str,
) -> Result<DomAnalysis, DomAnalyzerError> {
    let title = inspector.title().await?;
    let interactive_raw = inspector.interactive_candidates().await?;
    let forms = inspector.forms().await?;
    let navigation_raw = inspector.navigation_candidates().await?;
    let content_raw = inspector.content_candidates().await?;

    let analysis = analyze(url, &title, interactive_raw, forms, navigation_raw, content_raw);
    tracing::debug!(
        target: "dom_analyzer",
        url,
        confidence = analysis.analysis_confidence,
        elements = analysis.total_element_count,
        "analyzed page"
    );
    Ok(analysis)
}

/// Deterministic textual summary for AI consumption: the `limit` highest
/// confidence interactive elements (descending, ties broken by extraction
/// order), a forms section, then overall confidence.
pub fn format_for_ai(analysis: &DomAnalysis, limit: usize) -> String {
    let mut indexed: Vec<(usize, &DomElement)> = analysis.interactive_elements.iter().enumerate().collect();
    indexed.sort_by(|a, b| {
        b.1.confidence
            .partial_cmp(&a.1.confidence)
            .unwrap()
            .then(a.0.cmp(&b.0))
    });

    let mut out = String::new();
    out.push_str(&format!("Page: {} ({})\n", analysis.title, analysis.url));
    out.push_str("Interactive elements:\n");
    for (_, element) in indexed.into_iter().take(limit) {
        let label = if element.text.trim().is_empty() {
            element
                .attributes
                .get("aria-label")
                .or_else(|| element.attributes.get("name"))
                .cloned()
                .unwrap_or_else(|| "(no text)".to_string())
        } else {
            element.text.trim().to_string()
        };
        out.push_str(&format!(
            "- [{:?}] \"{}\" selector={} confidence={:.2}\n",
            element.element_type, label, element.selector, element.confidence
        ));
    }

    out.push_str("Forms:\n");
    if analysis.forms.is_empty() {
        out.push_str("- (none)\n");
    } else {
        for form in &analysis.forms {
            out.push_str(&format!(
                "- method={} action={} fields={}\n",
                form.method,
                form.action,
                form.fields.join(", ")
            ));
        }
    }

    out.push_str(&format!(
        "Overall confidence: {:.2}\n",
        analysis.analysis_confidence
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(tag: &str, text: &str, attrs: &[(&str, &str)]) -> RawCandidate {
        RawCandidate {
            tag: tag.to_string(),
            text: text.to_string(),
            attributes: attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            xpath: format!("//{tag}"),
            selector: tag.to_string(),
        }
    }

    #[test]
    fn element_confidence_combines_all_bonuses_and_caps_at_one() {
        let c = candidate("button", "Submit", &[("id", "submit-btn"), ("aria-label", "Submit form")]);
        // 0.3 base + 0.2 (id) + 0.2 (aria-label) + 0.15 (text) + 0.15 (tag) = 1.0 (no name bonus)
        assert!((element_confidence(&c) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn element_confidence_baseline_for_bare_div() {
        let c = candidate("div", "", &[]);
        assert!((element_confidence(&c) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn long_text_does_not_earn_the_text_bonus() {
        let long_text = "x".repeat(81);
        let c = candidate("span", &long_text, &[]);
        assert!((element_confidence(&c) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn classifies_input_types() {
        assert_eq!(
            classify_element_type(&candidate("input", "", &[("type", "checkbox")])),
            ElementType::Checkbox
        );
        assert_eq!(
            classify_element_type(&candidate("input", "", &[("type", "email")])),
            ElementType::TextInput
        );
        assert_eq!(classify_element_type(&candidate("a", "", &[])), ElementType::Link);
        assert_eq!(classify_element_type(&candidate("button", "", &[])), ElementType::Button);
    }

    #[test]
    fn page_confidence_is_clipped_to_one() {
        let elements: Vec<DomElement> = (0..12)
            .map(|_| to_dom_element(candidate("button", "Go", &[("id", "x"), ("aria-label", "Go")])))
            .collect();
        let confidence = page_confidence(&elements, true, 5);
        assert!(confidence <= 1.0);
    }

    #[test]
    fn page_confidence_weighs_interactive_forms_nav_and_mean_confidence() {
        let elements: Vec<DomElement> = (0..5).map(|_| to_dom_element(candidate("div", "", &[]))).collect();
        // 0.4*(5/5) + 0.25*0 + 0.15*0 + 0.2*0.3 = 0.46
        let confidence = page_confidence(&elements, false, 0);
        assert!((confidence - 0.46).abs() < 1e-9);
    }

    #[test]
    fn format_for_ai_breaks_ties_by_extraction_order() {
        let analysis = analyze(
            "https://example.com",
            "Example",
            vec![
                candidate("button", "A", &[]),
                candidate("button", "B", &[]),
            ],
            vec![],
            vec![],
            vec![],
        );
        let text = format_for_ai(&analysis, 2);
        let pos_a = text.find("\"A\"").unwrap();
        let pos_b = text.find("\"B\"").unwrap();
        assert!(pos_a < pos_b);
    }

    #[test]
    fn format_for_ai_is_deterministic() {
        let analysis = analyze(
            "https://example.com",
            "Example",
            vec![candidate("button", "Submit", &[("id", "s")])],
            vec![FormInfo { method: "POST".into(), action: "/login".into(), fields: vec!["user".into()] }],
            vec![],
            vec![],
        );
        assert_eq!(format_for_ai(&analysis, 5), format_for_ai(&analysis, 5));
    }

    struct StubInspector;

    #[async_trait]
    impl PageInspector for StubInspector {
        async fn title(&self) -> Result<String, DomAnalyzerError> {
            Ok("Stub Page".to_string())
        }
        async fn interactive_candidates(&self) -> Result<Vec<RawCandidate>, DomAnalyzerError> {
            Ok(vec![candidate("button", "Submit", &[("id", "s")])])
        }
        async fn forms(&self) -> Result<Vec<FormInfo>, DomAnalyzerError> {
            Ok(vec![])
        }
        async fn navigation_candidates(&self) -> Result<Vec<RawCandidate>, DomAnalyzerError> {
            Ok(vec![])
        }
        async fn content_candidates(&self) -> Result<Vec<RawCandidate>, DomAnalyzerError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn analyze_page_drives_inspector_and_scores() {
        let analysis = analyze_page(&StubInspector, "https://example.com").await.unwrap();
        assert_eq!(analysis.title, "Stub Page");
        assert_eq!(analysis.interactive_elements.len(), 1);
    }
}
