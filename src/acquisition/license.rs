use std::collections::HashMap;

use anyhow::{Context, anyhow};
use scraper::{Html, Selector};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Finds the anchor on a CMS landing page whose href contains `link_pattern` and returns the
/// absolute URL (§4.3, grounded on `cms_downloader.py::download_msdrg_files` /
/// `download_ioce_files`'s BeautifulSoup scrape).
pub fn find_bundle_link(page_html: &str, page_url: &str, link_pattern: &str) -> anyhow::Result<String> {
    let doc = Html::parse_document(page_html);
    let selector = Selector::parse("a[href]").expect("static selector is always valid");

    for element in doc.select(&selector) {
        if let Some(href) = element.value().attr("href") {
            if href.contains(link_pattern) {
                return resolve_url(page_url, href);
            }
        }
    }
    Err(anyhow!(
        "no link matching '{link_pattern}' found on {page_url}"
    ))
}

/// Locates the license-agreement `<form>` (identified by carrying an `agree` input), extracts
/// every hidden/visible field, sets `agree=Yes`, and returns `(absolute_action_url, form_fields)`
/// ready to submit as a POST body (§4.3, grounded on the same function's form-handling code).
pub fn parse_license_form(page_html: &str, page_url: &str) -> anyhow::Result<(String, HashMap<String, String>)> {
    let doc = Html::parse_document(page_html);
    let form_selector = Selector::parse("form").expect("static selector is always valid");
    let input_selector = Selector::parse("input").expect("static selector is always valid");

    for form in doc.select(&form_selector) {
        let mut fields = HashMap::new();
        let mut has_agree_input = false;

        for input in form.select(&input_selector) {
            let Some(name) = input.value().attr("name") else {
                continue;
            };
            if name == "agree" {
                has_agree_input = true;
            }
            let value = input.value().attr("value").unwrap_or("").to_string();
            fields.insert(name.to_string(), value);
        }

        if !has_agree_input {
            continue;
        }

        let action = form.value().attr("action").unwrap_or("");
        if action.is_empty() {
            return Err(anyhow!("license agreement form has no action URL"));
        }
        let form_url = resolve_url(page_url, action)?;
        fields.insert("agree".to_string(), "Yes".to_string());
        return Ok((form_url, fields));
    }

    Err(anyhow!("no license agreement form found on {page_url}"))
}

fn resolve_url(base: &str, href: &str) -> anyhow::Result<String> {
    let base_url = reqwest::Url::parse(base).with_context(|| format!("parse base url {base}"))?;
    base_url
        .join(href)
        .map(|u| u.to_string())
        .with_context(|| format!("join {base} with {href}"))
}

pub fn user_agent_headers() -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(USER_AGENT),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_bundle_link_by_substring() {
        let html = r#"<html><body><a href="/files/java-standalone-q3-2025.zip">Download</a></body></html>"#;
        let link = find_bundle_link(html, "https://www.cms.gov/page", "java-standalone").unwrap();
        assert_eq!(link, "https://www.cms.gov/files/java-standalone-q3-2025.zip");
    }

    #[test]
    fn parses_license_form_and_sets_agree_yes() {
        let html = r#"
            <html><body>
              <form action="/license/accept">
                <input type="hidden" name="token" value="abc123">
                <input type="checkbox" name="agree" value="No">
              </form>
            </body></html>
        "#;
        let (url, fields) = parse_license_form(html, "https://www.cms.gov/license/page").unwrap();
        assert_eq!(url, "https://www.cms.gov/license/accept");
        assert_eq!(fields.get("token").unwrap(), "abc123");
        assert_eq!(fields.get("agree").unwrap(), "Yes");
    }

    #[test]
    fn errors_when_no_agree_form_present() {
        let html = r#"<html><body><form action="/x"><input name="q" value="1"></form></body></html>"#;
        assert!(parse_license_form(html, "https://www.cms.gov/x").is_err());
    }
}
