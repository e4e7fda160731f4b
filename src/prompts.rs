//! Prompts for inference-backed description generation.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — tightening the alt-text guidelines or the
//!    formula phrasing requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without
//!    spinning up a real provider, making prompt regressions easy to catch.

/// System prompt for figure alt-text generation, parameterised by the
/// document-type hint supplied to the pipeline ("academic paper",
/// "textbook", …).
pub fn alt_text_system_prompt(document_type: &str) -> String {
    format!(
        r#"You are an expert at writing accessible alt-text for images in {document_type}s.

Generate a concise but descriptive alt-text for this image that would help a blind or visually impaired reader understand:
1. What type of figure this is (graph, diagram, photo, chart, etc.)
2. The key information or data being conveyed
3. Any important trends, relationships, or conclusions visible

Guidelines for alt-text:
- Be concise but informative (aim for 1-3 sentences)
- Don't start with "Image of" or "Picture of" - just describe the content
- For graphs/charts: describe the type, axes, and main trends
- For diagrams: describe the structure and key components
- For photos: describe the subject and relevant details
- Include specific numbers/data if they're important to understanding
- If there is text in the image, include the key text content

Respond with ONLY the alt-text, no additional commentary or formatting."#
    )
}

/// User-turn text accompanying the figure image. Carries nearby caption text
/// when the structure backend found any; otherwise empty, since the image
/// itself carries the content.
pub fn figure_user_prompt(caption: Option<&str>) -> String {
    match caption {
        Some(caption) if !caption.is_empty() => {
            format!("Context from the document: {caption}")
        }
        _ => String::new(),
    }
}

/// Fallback document-type hint when the shell supplies none.
pub const DEFAULT_DOCUMENT_TYPE: &str = "document";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_mentions_document_type() {
        let p = alt_text_system_prompt("academic paper");
        assert!(p.contains("academic paper"));
        assert!(p.contains("alt-text"));
    }

    #[test]
    fn user_prompt_includes_caption_when_present() {
        assert!(figure_user_prompt(Some("Figure 3: throughput")).contains("throughput"));
        assert!(figure_user_prompt(None).is_empty());
        assert!(figure_user_prompt(Some("")).is_empty());
    }
}
