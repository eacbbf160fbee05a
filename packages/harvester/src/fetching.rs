//! Extractor wrapper that downloads externally referenced diagram sources.
//!
//! Diagram frames often reference their SVG through a `src`/`data` attribute
//! instead of inlining it. [`FetchingExtractor`] fills those elements in
//! through the page's own fetch (same cookies, same origin), so the stored
//! payload and its fingerprint cover the actual drawing.

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use crate::error::{BrowserError, HarvestError, HarvestResult};
use crate::page::PageHandle;
use crate::traits::extractor::Extractor;
use crate::types::category::ResourceCategory;
use crate::types::payload::{DiagramPayload, Payload};

/// Wraps any [`Extractor`] and resolves empty diagram elements whose source
/// is an `.svg` address.
///
/// A source that answers with an error leaves its element empty, which shows
/// up as a partial extraction. A page that cannot answer at all (timeout,
/// disconnect) fails the extraction so a later signal retries it.
pub struct FetchingExtractor<E: Extractor> {
    inner: E,
}

impl<E: Extractor> FetchingExtractor<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    async fn resolve_sources(&self, page: &PageHandle, payload: Payload) -> HarvestResult<Payload> {
        match payload {
            Payload::Diagram(diagram) => Ok(Payload::Diagram(fill_diagram(page, diagram).await?)),
            other => Ok(other),
        }
    }
}

async fn fill_diagram(page: &PageHandle, mut diagram: DiagramPayload) -> HarvestResult<DiagramPayload> {
    for (index, element) in diagram.elements.iter_mut().enumerate() {
        if !element.content.is_empty() {
            continue;
        }
        let Some(source) = element.source_url.as_deref() else {
            continue;
        };
        if !is_svg_source(source) {
            debug!(element = index, source, "not an svg source, skipping");
            continue;
        }

        match page.fetch(source).await {
            Ok(bytes) => match svg_document(&bytes) {
                Some(svg) => element.content = svg,
                None => warn!(element = index, source, "fetched source holds no svg document"),
            },
            Err(HarvestError::TransientIo(BrowserError::Fetch { url, reason })) => {
                warn!(element = index, url = %url, reason = %reason, "diagram source unavailable");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(diagram)
}

fn is_svg_source(source: &str) -> bool {
    let path = match Url::parse(source) {
        Ok(url) => url.path().to_ascii_lowercase(),
        // Relative to the page; the browser resolves it on fetch.
        Err(_) => source
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase(),
    };
    path.ends_with(".svg")
}

/// The `<svg>...</svg>` document inside a fetched body.
///
/// Bodies are sometimes an HTML wrapper around the drawing; only the outermost
/// svg element is kept. A bare XML document without an `<svg` tag is kept as is.
fn svg_document(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let lower = text.to_ascii_lowercase();
    if let (Some(start), Some(end)) = (lower.find("<svg"), lower.rfind("</svg>")) {
        if end > start {
            return Some(text[start..end + "</svg>".len()].to_string());
        }
    }
    let trimmed = text.trim_start();
    if trimmed.starts_with("<?xml") || trimmed.starts_with("<svg") {
        return Some(text.into_owned());
    }
    None
}

#[async_trait]
impl<E: Extractor> Extractor for FetchingExtractor<E> {
    async fn extract(&self, category: ResourceCategory, page: &PageHandle) -> HarvestResult<Payload> {
        let payload = self.inner.extract(category, page).await?;
        self.resolve_sources(page, payload).await
    }

    /// Sources are resolved here too, so quick checks fingerprint the same
    /// drawing a full extraction would store.
    async fn quick_check(
        &self,
        category: ResourceCategory,
        page: &PageHandle,
    ) -> HarvestResult<Payload> {
        let payload = self.inner.quick_check(category, page).await?;
        self.resolve_sources(page, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrowserResult;
    use crate::fingerprint::fingerprint;
    use crate::interaction::InputKind;
    use crate::scripted::{PageExtractor, ScriptedPage};
    use crate::traits::browser::BrowserPage;
    use crate::types::payload::{DetailPayload, DiagramElement};
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;

    const DIAGRAM: &str = "https://example.com/chain-detail?id=3";

    fn scripted(elements: Vec<DiagramElement>) -> Arc<ScriptedPage> {
        let page = Arc::new(ScriptedPage::new("tab", DIAGRAM));
        page.set_payload(
            DIAGRAM,
            Payload::Diagram(DiagramPayload {
                elements,
                ..Default::default()
            }),
        );
        page
    }

    fn elements(payload: Payload) -> Vec<DiagramElement> {
        match payload {
            Payload::Diagram(diagram) => diagram.elements,
            other => panic!("expected a diagram, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fills_empty_svg_elements_from_their_source() {
        let page = scripted(vec![
            DiagramElement::new(Some("https://cdn.example.com/3/a.svg?v=2"), ""),
            DiagramElement::new(Some("https://cdn.example.com/3/b.svg"), "<svg>inline</svg>"),
            DiagramElement::new(Some("https://cdn.example.com/3/legend.png"), ""),
        ]);
        page.set_resource(
            "https://cdn.example.com/3/a.svg?v=2",
            "<html><body><svg viewBox='0 0 10 10'><g id='up'/></svg></body></html>",
        );
        let handle = PageHandle::new(page.clone(), Duration::from_secs(5));

        let payload = FetchingExtractor::new(PageExtractor)
            .extract(ResourceCategory::DiagramPage, &handle)
            .await
            .unwrap();

        let elements = elements(payload);
        assert_eq!(elements[0].content, "<svg viewBox='0 0 10 10'><g id='up'/></svg>");
        assert_eq!(elements[1].content, "<svg>inline</svg>");
        assert!(elements[2].content.is_empty());
        assert_eq!(page.fetched(), vec!["https://cdn.example.com/3/a.svg?v=2"]);
    }

    #[tokio::test]
    async fn missing_source_is_a_partial_extraction() {
        let page = scripted(vec![DiagramElement::new(Some("/static/3.svg"), "")]);
        let handle = PageHandle::new(page.clone(), Duration::from_secs(5));

        let payload = FetchingExtractor::new(PageExtractor)
            .extract(ResourceCategory::DiagramPage, &handle)
            .await
            .unwrap();

        assert_eq!(payload.missing_fields(), vec!["elements[0].content"]);
        assert_eq!(page.fetched(), vec!["/static/3.svg"]);
    }

    #[tokio::test]
    async fn bodies_without_svg_are_left_out() {
        let page = scripted(vec![DiagramElement::new(Some("/static/3.svg"), "")]);
        page.set_resource("/static/3.svg", "<html>login required</html>");
        let handle = PageHandle::new(page, Duration::from_secs(5));

        let payload = FetchingExtractor::new(PageExtractor)
            .extract(ResourceCategory::DiagramPage, &handle)
            .await
            .unwrap();
        assert!(elements(payload)[0].content.is_empty());
    }

    /// Answers like the wrapped page, except `fetch` never completes.
    struct StalledFetch(Arc<ScriptedPage>);

    #[async_trait]
    impl BrowserPage for StalledFetch {
        fn id(&self) -> &str {
            self.0.id()
        }

        async fn address(&self) -> BrowserResult<String> {
            self.0.address().await
        }

        async fn evaluate(&self, expression: &str) -> BrowserResult<Value> {
            self.0.evaluate(expression).await
        }

        async fn fetch(&self, _url: &str) -> BrowserResult<Vec<u8>> {
            std::future::pending().await
        }

        async fn drain_input(&self) -> BrowserResult<Vec<InputKind>> {
            self.0.drain_input().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_source_fails_the_extraction() {
        let page = scripted(vec![DiagramElement::new(Some("/static/3.svg"), "")]);
        let handle = PageHandle::new(Arc::new(StalledFetch(page)), Duration::from_secs(5));

        let err = FetchingExtractor::new(PageExtractor)
            .extract(ResourceCategory::DiagramPage, &handle)
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Timeout { operation: "fetch", .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn quick_check_sees_the_same_drawing() {
        let page = scripted(vec![DiagramElement::new(Some("/static/3.svg"), "")]);
        page.set_resource("/static/3.svg", "<?xml version='1.0'?><svg><g/></svg>");
        let handle = PageHandle::new(page, Duration::from_secs(5));
        let extractor = FetchingExtractor::new(PageExtractor);

        let full = extractor
            .extract(ResourceCategory::DiagramPage, &handle)
            .await
            .unwrap();
        let quick = extractor
            .quick_check(ResourceCategory::DiagramPage, &handle)
            .await
            .unwrap();
        assert_eq!(elements(full.clone())[0].content, "<svg><g/></svg>");
        assert_eq!(fingerprint(&full), fingerprint(&quick));
    }

    #[tokio::test]
    async fn other_categories_pass_through() {
        let address = "https://example.com/product-details?id=9";
        let page = Arc::new(ScriptedPage::new("tab", address));
        page.set_payload(
            address,
            Payload::Detail(DetailPayload {
                project_name: "Widget".to_string(),
                ..Default::default()
            }),
        );
        let handle = PageHandle::new(page.clone(), Duration::from_secs(5));

        let payload = FetchingExtractor::new(PageExtractor)
            .extract(ResourceCategory::DetailPage, &handle)
            .await
            .unwrap();
        assert_eq!(payload.category(), ResourceCategory::DetailPage);
        assert!(page.fetched().is_empty());
    }

    #[test]
    fn svg_sources_are_recognized_by_path() {
        assert!(is_svg_source("https://cdn.example.com/a.SVG?token=1"));
        assert!(is_svg_source("/static/a.svg#layer"));
        assert!(!is_svg_source("https://cdn.example.com/a.svg.png"));
        assert!(!is_svg_source("https://cdn.example.com/render?format=svg"));
    }
}
