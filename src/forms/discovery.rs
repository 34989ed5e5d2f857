//! Crawls directory-style listing sites for forms that accept link
//! submissions, following "next" pagination up to a page limit.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use crate::forms::FormError;
use crate::modules::fingerprint::FingerprintRandomizer;

/// Field names that mark a form as a link-submission form. A form qualifies
/// when at least one of its fields contains one of these as a substring.
pub const SUBMISSION_KEYWORDS: &[&str] = &["url", "website", "title", "description", "email"];

/// A discovered submission form: absolute action URL, method, and the
/// fields it expects with their default values.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SubmissionForm {
    pub action: String,
    pub method: String,
    pub fields: HashMap<String, String>,
}

/// Fetches listing pages and extracts submission forms from them.
pub struct FormDiscovery {
    client: reqwest::Client,
    fingerprints: Arc<FingerprintRandomizer>,
}

impl FormDiscovery {
    pub fn new(fingerprints: Arc<FingerprintRandomizer>) -> Result<Self, FormError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .cookie_store(true)
            .build()?;
        Ok(Self {
            client,
            fingerprints,
        })
    }

    /// Walk listing pages starting at `start_url`, following "next" links
    /// for at most `max_pages` pages, and collect every submission form.
    /// Pages that fail to fetch end the walk rather than erroring out.
    pub async fn discover(
        &self,
        start_url: &str,
        max_pages: usize,
    ) -> Result<Vec<SubmissionForm>, FormError> {
        let mut forms = Vec::new();
        let mut next = Some(Url::parse(start_url)?);
        let mut visited = 0;

        while let Some(url) = next.take() {
            if visited >= max_pages {
                break;
            }
            visited += 1;

            let fingerprint = self.fingerprints.generate();
            let mut request = self.client.get(url.clone());
            for (name, value) in fingerprint.headers() {
                request = request.header(name, value);
            }

            let html = match request.send().await {
                Ok(response) if response.status().is_success() => match response.text().await {
                    Ok(body) => body,
                    Err(err) => {
                        log::warn!("listing page {url} body read failed: {err}");
                        break;
                    }
                },
                Ok(response) => {
                    log::warn!("listing page {url} answered {}", response.status());
                    break;
                }
                Err(err) => {
                    log::warn!("listing page {url} fetch failed: {err}");
                    break;
                }
            };

            let (page_forms, next_page) = parse_listing_page(&html, &url);
            log::debug!(
                "found {} submission forms on {url} (page {visited})",
                page_forms.len()
            );
            forms.extend(page_forms);
            next = next_page;
        }

        Ok(forms)
    }
}

/// Extract submission forms and the next-page link from one listing page.
/// Synchronous so parsed documents never cross an await point.
pub fn parse_listing_page(html: &str, base: &Url) -> (Vec<SubmissionForm>, Option<Url>) {
    let document = Html::parse_document(html);
    let form_selector = Selector::parse("form").expect("static selector");

    let forms = document
        .select(&form_selector)
        .filter_map(|form| extract_form(form, base))
        .filter(is_submission_form)
        .collect();

    (forms, next_page_link(&document, base))
}

fn extract_form(form: ElementRef<'_>, base: &Url) -> Option<SubmissionForm> {
    let action = form.value().attr("action").unwrap_or("");
    let action = base.join(action).ok()?.to_string();
    let method = form
        .value()
        .attr("method")
        .unwrap_or("get")
        .to_lowercase();

    let mut fields = HashMap::new();

    let input_selector = Selector::parse("input[name], textarea[name]").expect("static selector");
    for input in form.select(&input_selector) {
        let name = input.value().attr("name")?.to_string();
        let value = input.value().attr("value").unwrap_or("").to_string();
        fields.insert(name, value);
    }

    let select_selector = Selector::parse("select[name]").expect("static selector");
    let option_selector = Selector::parse("option").expect("static selector");
    for select in form.select(&select_selector) {
        let name = select.value().attr("name")?.to_string();
        // Default to the first option, as a browser would.
        let value = select
            .select(&option_selector)
            .next()
            .and_then(|option| option.value().attr("value"))
            .unwrap_or("")
            .to_string();
        fields.insert(name, value);
    }

    Some(SubmissionForm {
        action,
        method,
        fields,
    })
}

fn is_submission_form(form: &SubmissionForm) -> bool {
    form.fields.keys().any(|name| {
        let name = name.to_lowercase();
        SUBMISSION_KEYWORDS
            .iter()
            .any(|keyword| name.contains(keyword))
    })
}

fn next_page_link(document: &Html, base: &Url) -> Option<Url> {
    let rel_next = Selector::parse(r#"a[rel="next"]"#).expect("static selector");
    if let Some(anchor) = document.select(&rel_next).next()
        && let Some(href) = anchor.value().attr("href")
    {
        return base.join(href).ok();
    }

    let anchors = Selector::parse("a[href]").expect("static selector");
    for anchor in document.select(&anchors) {
        let text: String = anchor.text().collect::<String>().to_lowercase();
        if text.contains("next")
            && let Some(href) = anchor.value().attr("href")
        {
            return base.join(href).ok();
        }
    }
    None
}
