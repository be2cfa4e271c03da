//! CSS-selector driven site adapter
//!
//! Rules come from the `[adapter]` section of the configuration:
//! - `item-links` picks item references on listing pages
//! - `pagination` gives the last listing page number
//! - `composite` marks a multi-item page whose `composite-links` are children
//! - `[[adapter.fields]]` describe how a simple page becomes a record

use crate::adapter::links::{collect_links, resolve_link};
use crate::adapter::{Extracted, ExtractionError, SiteAdapter};
use crate::config::{AdapterConfig, FieldConfig, FieldKind};
use crate::crawler::{Document, Record, Task};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use url::Url;

struct FieldRule {
    name: String,
    selector: Selector,
    attr: Option<String>,
    kind: FieldKind,
    required: bool,
    default: Option<String>,
}

impl FieldRule {
    fn from_config(config: &FieldConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            name: config.name.clone(),
            selector: parse_selector(&config.selector)?,
            attr: config.attr.clone(),
            kind: config.kind,
            required: config.required,
            default: config.default.clone(),
        })
    }

    /// Reads the cleaned raw value of the first matching element
    fn raw_value(&self, document: &Html) -> Option<String> {
        let element = document.select(&self.selector).next()?;
        let raw = match &self.attr {
            Some(attr) => element.value().attr(attr)?.to_string(),
            None => element_text(&element),
        };
        let cleaned = clean_text(&raw);
        (!cleaned.is_empty()).then_some(cleaned)
    }

    fn convert(&self, raw: &str) -> Result<Value, ExtractionError> {
        match self.kind {
            FieldKind::Text => Ok(Value::String(raw.to_string())),
            FieldKind::Number => parse_number(raw)
                .map(Value::from)
                .ok_or_else(|| ExtractionError::InvalidNumber {
                    field: self.name.clone(),
                    value: raw.to_string(),
                }),
        }
    }
}

/// Site adapter configured entirely by CSS selectors
pub struct SelectorAdapter {
    item_links: Option<Selector>,
    pagination: Option<Selector>,
    page_param: String,
    composite: Option<Selector>,
    composite_links: Option<Selector>,
    identity_field: Option<String>,
    fields: Vec<FieldRule>,
    constants: BTreeMap<String, String>,
}

impl SelectorAdapter {
    /// Compiles the selectors of an adapter configuration
    ///
    /// # Returns
    ///
    /// * `Ok(SelectorAdapter)` - All selectors parsed
    /// * `Err(ConfigError::InvalidSelector)` - A selector is not valid CSS
    pub fn from_config(config: &AdapterConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            item_links: config.item_links.as_deref().map(parse_selector).transpose()?,
            pagination: config.pagination.as_deref().map(parse_selector).transpose()?,
            page_param: config.page_param.clone(),
            composite: config.composite.as_deref().map(parse_selector).transpose()?,
            composite_links: config
                .composite_links
                .as_deref()
                .map(parse_selector)
                .transpose()?,
            identity_field: config.identity_field.clone(),
            fields: config
                .fields
                .iter()
                .map(FieldRule::from_config)
                .collect::<Result<_, _>>()?,
            constants: config.constants.clone(),
        })
    }

    fn record_identity(&self, fields: &Map<String, Value>, task: &Task) -> String {
        self.identity_field
            .as_ref()
            .and_then(|name| fields.get(name))
            .map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| task.identity().to_string())
    }
}

impl SiteAdapter for SelectorAdapter {
    fn discover(&self, document: &Document) -> Result<Vec<String>, ExtractionError> {
        let Some(item_links) = &self.item_links else {
            return Ok(Vec::new());
        };
        let base_url = base_url(document)?;
        let html = Html::parse_document(&document.body);
        Ok(collect_links(&html, item_links, &base_url))
    }

    fn extract_record(
        &self,
        task: &Task,
        document: &Document,
    ) -> Result<Extracted, ExtractionError> {
        let html = Html::parse_document(&document.body);

        if let (Some(marker), Some(links)) = (&self.composite, &self.composite_links) {
            if html.select(marker).next().is_some() {
                let base_url = base_url(document)?;
                let children = collect_links(&html, links, &base_url);
                if children.is_empty() {
                    return Err(ExtractionError::EmptyComposite(document.reference.clone()));
                }
                return Ok(Extracted::References(children));
            }
        }

        let mut fields = Map::new();
        let mut matched = 0;
        let mut missing = Vec::new();

        for rule in &self.fields {
            match rule.raw_value(&html) {
                Some(raw) => {
                    matched += 1;
                    fields.insert(rule.name.clone(), rule.convert(&raw)?);
                }
                None => match &rule.default {
                    Some(default) => {
                        fields.insert(rule.name.clone(), rule.convert(default)?);
                    }
                    None if rule.required => missing.push(rule.name.as_str()),
                    None => {}
                },
            }
        }

        if matched == 0 {
            return Ok(Extracted::Empty);
        }
        if !missing.is_empty() {
            return Err(ExtractionError::MissingField(missing.join(", ")));
        }

        for (name, value) in &self.constants {
            fields.insert(name.clone(), Value::String(value.clone()));
        }

        let mut record = Record::new(self.record_identity(&fields, task), &document.final_url);
        record.fields = fields;
        Ok(Extracted::Record(record))
    }

    fn page_count(&self, document: &Document) -> Option<u32> {
        let pagination = self.pagination.as_ref()?;
        let base_url = base_url(document).ok()?;
        let html = Html::parse_document(&document.body);

        html.select(pagination)
            .filter_map(|link| {
                link.value()
                    .attr("href")
                    .and_then(|href| resolve_link(href, &base_url))
                    .and_then(|href| page_number(&href, &self.page_param))
                    .or_else(|| element_text(&link).trim().parse().ok())
            })
            .max()
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

fn base_url(document: &Document) -> Result<Url, ExtractionError> {
    Url::parse(&document.final_url)
        .or_else(|_| Url::parse(&document.reference))
        .map_err(|e| ExtractionError::InvalidBaseUrl(format!("{}: {}", document.reference, e)))
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

fn page_number(href: &str, page_param: &str) -> Option<u32> {
    let url = Url::parse(href).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == page_param)
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// Replaces non-ASCII characters with spaces and collapses whitespace
pub(crate) fn clean_text(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a price-like number such as `$1,234.50`
fn parse_number(raw: &str) -> Option<f64> {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    digits.parse::<f64>().ok().filter(|n| n.is_finite())
}
