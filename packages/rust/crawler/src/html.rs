//! HTML → readable text and same-site link extraction.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use leadgen_shared::PageLink;

/// Subtrees that never contribute readable text.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "svg", "template", "head"];

/// Elements whose boundaries separate words.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p",
    "pre", "section", "table", "td", "th", "tr", "ul",
];

static LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("link selector"));

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Flatten a document to whitespace-collapsed text, at most `max_chars` long.
///
/// `mailto:` targets are written into the text even when the anchor text
/// hides the address, so email extraction sees them.
pub fn html_to_text(doc: &Html, max_chars: usize) -> String {
    let mut raw = String::new();
    collect_text(doc.root_element(), &mut raw);

    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(collapsed, max_chars)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_TAGS.contains(&name) {
        return;
    }
    let block = BLOCK_TAGS.contains(&name);
    if block {
        out.push(' ');
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    collect_text(el, out);
                }
            }
            _ => {}
        }
    }

    if name == "a" {
        if let Some(address) = element.value().attr("href").and_then(mailto_address) {
            let shown = element.text().collect::<String>();
            if !shown.to_lowercase().contains(&address.to_lowercase()) {
                out.push(' ');
                out.push_str(&address);
                out.push(' ');
            }
        }
    }

    if block {
        out.push(' ');
    }
}

/// The address part of a `mailto:` href.
fn mailto_address(href: &str) -> Option<String> {
    let href = href.trim();
    let rest = href
        .get(..7)
        .filter(|scheme| scheme.eq_ignore_ascii_case("mailto:"))
        .map(|_| &href[7..])?;
    let address = rest.split('?').next().unwrap_or_default().trim();
    let address = address.replace("%40", "@");
    (!address.is_empty()).then_some(address)
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Same-site links of a document, resolved against `base_url`, fragments
/// stripped, de-duplicated in document order.
pub fn extract_links(doc: &Html, base_url: &Url) -> Vec<PageLink> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for el in doc.select(&LINK_SEL) {
        let Some(href) = el.value().attr("href").map(str::trim) else {
            continue;
        };

        // Skip anchors, javascript:, mailto:, tel:
        let lower = href.to_lowercase();
        if href.is_empty()
            || href.starts_with('#')
            || lower.starts_with("javascript:")
            || lower.starts_with("mailto:")
            || lower.starts_with("tel:")
        {
            continue;
        }

        let Ok(mut resolved) = base_url.join(href) else {
            continue;
        };
        resolved.set_fragment(None);

        if !same_site(&resolved, base_url) {
            continue;
        }
        if !seen.insert(resolved.to_string()) {
            continue;
        }

        let text = el.text().collect::<Vec<_>>().join(" ");
        links.push(PageLink {
            url: resolved.to_string(),
            text: text.split_whitespace().collect::<Vec<_>>().join(" "),
        });
    }

    links
}

/// Whether two URLs share a host, ignoring a leading `www.`.
pub fn same_site(a: &Url, b: &Url) -> bool {
    if !matches!(a.scheme(), "http" | "https") {
        return false;
    }
    match (a.host_str(), b.host_str()) {
        (Some(ha), Some(hb)) => bare_host(ha).eq_ignore_ascii_case(bare_host(hb)),
        _ => false,
    }
}

fn bare_host(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_skips_scripts_and_collapses_whitespace() {
        let html = r#"<html><head><title>T</title><style>p{}</style></head><body>
            <h1>Pixel   Post</h1><script>var x = 1;</script>
            <p>We do <b>social</b> media.</p><div>Helsinki</div>
        </body></html>"#;
        let doc = Html::parse_document(html);
        assert_eq!(
            html_to_text(&doc, 1000),
            "Pixel Post We do social media. Helsinki"
        );
    }

    #[test]
    fn text_keeps_hidden_mailto_targets() {
        let html = r#"<body><p>Write to <a href="mailto:jane@pixel.fi?subject=Hi">our CEO</a></p>
            <a href="mailto:info@pixel.fi">info@pixel.fi</a></body>"#;
        let doc = Html::parse_document(html);
        let text = html_to_text(&doc, 1000);
        assert!(text.contains("our CEO jane@pixel.fi"));
        assert_eq!(text.matches("info@pixel.fi").count(), 1);
    }

    #[test]
    fn text_is_capped_on_char_boundary() {
        let doc = Html::parse_document("<p>äöå äöå äöå</p>");
        assert_eq!(html_to_text(&doc, 5), "äöå ä");
    }

    #[test]
    fn links_are_same_site_and_deduplicated() {
        let html = r##"<body>
            <a href="/contact#form">Contact us</a>
            <a href="https://www.pixel.fi/contact">Contact again</a>
            <a href="https://other.com/about">Other</a>
            <a href="#top">Top</a>
            <a href="tel:+358">Call</a>
            <a href="javascript:void(0)">JS</a>
            <a href="team/">  Our
                team </a>
        </body>"##;
        let doc = Html::parse_document(html);
        let base = Url::parse("https://pixel.fi/").unwrap();
        let links = extract_links(&doc, &base);

        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            [
                "https://pixel.fi/contact",
                "https://www.pixel.fi/contact",
                "https://pixel.fi/team/"
            ]
        );
        assert_eq!(links[0].text, "Contact us");
        assert_eq!(links[2].text, "Our team");
    }

    #[test]
    fn same_site_ignores_www() {
        let a = Url::parse("https://www.pixel.fi/a").unwrap();
        let b = Url::parse("http://pixel.fi/").unwrap();
        assert!(same_site(&a, &b));
        let c = Url::parse("https://pixel.com/").unwrap();
        assert!(!same_site(&c, &b));
    }
}
