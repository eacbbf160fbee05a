//! Extracted payloads, one shape per collectible category.
//!
//! Extractors build these from the live page. The orchestrator never looks
//! inside them except to fingerprint (see [`crate::fingerprint`]) and to list
//! missing fields for partial-extraction warnings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::category::ResourceCategory;

/// Data extracted from one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Diagram(DiagramPayload),
    Listing(ListingPayload),
    Detail(DetailPayload),
}

impl Payload {
    /// The category this payload shape belongs to.
    pub fn category(&self) -> ResourceCategory {
        match self {
            Payload::Diagram(_) => ResourceCategory::DiagramPage,
            Payload::Listing(_) => ResourceCategory::ListingPage,
            Payload::Detail(_) => ResourceCategory::DetailPage,
        }
    }

    /// Expected fields that came back empty.
    ///
    /// A non-empty result marks a partial extraction: still recorded, but
    /// reported to the sink as warnings.
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        match self {
            Payload::Diagram(diagram) => {
                if diagram.elements.is_empty() {
                    missing.push("elements".to_string());
                }
                for (index, element) in diagram.elements.iter().enumerate() {
                    if element.content.is_empty() {
                        missing.push(format!("elements[{index}].content"));
                    }
                }
            }
            Payload::Listing(listing) => {
                if listing.items.is_empty() {
                    missing.push("items".to_string());
                }
                if listing.items.iter().any(|item| item.detail_url.is_none()) {
                    missing.push("items[].detail_url".to_string());
                }
            }
            Payload::Detail(detail) => {
                if detail.project_name.trim().is_empty() {
                    missing.push("project_name".to_string());
                }
                if detail.company_name.is_none() {
                    missing.push("company_name".to_string());
                }
                if detail.attributes.is_empty() {
                    missing.push("attributes".to_string());
                }
            }
        }
        missing
    }

    /// When the payload was taken, if the extractor stamped it.
    pub fn scraped_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Payload::Diagram(p) => p.scraped_at,
            Payload::Listing(p) => p.scraped_at,
            Payload::Detail(p) => p.scraped_at,
        }
    }
}

/// A rendered diagram: its embedded elements plus page metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub elements: Vec<DiagramElement>,
    #[serde(default)]
    pub page_info: BTreeMap<String, String>,
    #[serde(default)]
    pub scraped_at: Option<DateTime<Utc>>,
}

/// One embedded diagram element (an SVG document, typically).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramElement {
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub content: String,
}

impl DiagramElement {
    pub fn new(source_url: Option<&str>, content: impl Into<String>) -> Self {
        Self {
            source_url: source_url.map(str::to_string),
            content: content.into(),
        }
    }
}

/// A table of items, each usually linking to a detail page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub items: Vec<ListingItem>,
    #[serde(default)]
    pub page_info: BTreeMap<String, String>,
    #[serde(default)]
    pub scraped_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingItem {
    pub name: String,
    #[serde(default)]
    pub detail_url: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl ListingItem {
    pub fn new(name: impl Into<String>, detail_url: Option<&str>) -> Self {
        Self {
            name: name.into(),
            detail_url: detail_url.map(str::to_string),
            fields: BTreeMap::new(),
        }
    }
}

/// A single item's record: identity, registry attributes, free-form sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailPayload {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Tables such as funding rounds or shareholders, kept as raw JSON.
    #[serde(default)]
    pub sections: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub scraped_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_tagged_by_kind() {
        let payload = Payload::Listing(ListingPayload {
            items: vec![ListingItem::new("Acme", Some("/product-details?id=1"))],
            ..Default::default()
        });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "listing");
        assert_eq!(json["items"][0]["name"], "Acme");

        let decoded: Payload = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.category(), ResourceCategory::ListingPage);
    }

    #[test]
    fn missing_fields_flag_partial_extractions() {
        let complete = Payload::Detail(DetailPayload {
            project_name: "Acme".into(),
            company_name: Some("Acme Ltd".into()),
            attributes: BTreeMap::from([("founded".into(), "2019".into())]),
            ..Default::default()
        });
        assert!(complete.missing_fields().is_empty());

        let partial = Payload::Detail(DetailPayload {
            project_name: "Acme".into(),
            ..Default::default()
        });
        assert_eq!(partial.missing_fields(), vec!["company_name", "attributes"]);

        let empty_diagram = Payload::Diagram(DiagramPayload {
            elements: vec![DiagramElement::new(Some("a.svg"), "")],
            ..Default::default()
        });
        assert_eq!(empty_diagram.missing_fields(), vec!["elements[0].content"]);
    }
}
