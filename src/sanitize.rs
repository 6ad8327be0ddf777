use std::net::Ipv4Addr;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use url::{Host, Url};

/// Tags whose textual content is meaningless or dangerous when the tag is
/// removed. These are dropped wholesale instead of being demoted to text.
const DROP_CONTENT_TAGS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template", "title", "head",
];

/// Substrings of link text that mark a link as important for students.
const IMPORTANT_KEYWORDS: &[&str] = &["important", "urgent", "required", "deadline"];

/// Inline style applied to every surviving anchor so link affordance does not
/// depend on page stylesheets.
const LINK_STYLE: &str = "color:#2563eb;text-decoration:none;background-color:rgba(37,99,235,0.08);padding:2px 4px;border-radius:3px;border-bottom:1px solid #2563eb";

/// Nesting deeper than this trips the tag-stripping fallback.
const MAX_DEPTH: usize = 64;

static DOMAIN_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?$").expect("regex compiles"));

/// Rich-text tags notice authors may use. Everything else is demoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AllowedTag {
    A,
    B,
    I,
    Strong,
    Em,
    P,
    Br,
    Ul,
    Ol,
    Li,
    Span,
    Button,
}

impl AllowedTag {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "a" => Some(Self::A),
            "b" => Some(Self::B),
            "i" => Some(Self::I),
            "strong" => Some(Self::Strong),
            "em" => Some(Self::Em),
            "p" => Some(Self::P),
            "br" => Some(Self::Br),
            "ul" => Some(Self::Ul),
            "ol" => Some(Self::Ol),
            "li" => Some(Self::Li),
            "span" => Some(Self::Span),
            "button" => Some(Self::Button),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
            Self::I => "i",
            Self::Strong => "strong",
            Self::Em => "em",
            Self::P => "p",
            Self::Br => "br",
            Self::Ul => "ul",
            Self::Ol => "ol",
            Self::Li => "li",
            Self::Span => "span",
            Self::Button => "button",
        }
    }

    fn allowed_attrs(self) -> &'static [&'static str] {
        match self {
            Self::A => &["href", "target", "rel", "class", "style", "title"],
            Self::Span => &["class", "style"],
            Self::Button => &["class", "style", "type"],
            _ => &[],
        }
    }

    fn is_void(self) -> bool {
        matches!(self, Self::Br)
    }
}

#[derive(Debug)]
enum SanitizeFault {
    TooDeep,
}

/// Allow-list sanitizer for notice rich text.
///
/// Never panics and never returns unsanitized markup: inputs the tree walk
/// cannot handle degrade to plain tag stripping.
#[derive(Clone)]
pub struct HtmlSanitizer {
    scheme_re: Regex,
    tag_re: Regex,
}

impl HtmlSanitizer {
    pub fn new() -> Self {
        Self {
            scheme_re: Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").expect("regex compiles"),
            tag_re: Regex::new(r"<[^>]*>").expect("regex compiles"),
        }
    }

    /// Cleans an HTML fragment down to the allow-listed tag and attribute
    /// set, rewriting anchors along the way. Idempotent.
    pub fn sanitize(&self, html: &str) -> String {
        match self.try_sanitize(html) {
            Ok(clean) => clean,
            Err(fault) => {
                tracing::warn!(?fault, "sanitizer walk failed, stripping tags");
                self.strip_tags(html)
            }
        }
    }

    /// Lossy fallback: removes every tag, keeps raw text.
    pub fn strip_tags(&self, html: &str) -> String {
        self.tag_re.replace_all(html, "").to_string()
    }

    fn try_sanitize(&self, html: &str) -> Result<String, SanitizeFault> {
        let fragment = Html::parse_fragment(html);
        let mut out = String::with_capacity(html.len());
        self.emit_children(fragment.root_element(), &mut out, 0)?;
        Ok(out)
    }

    fn emit_children(
        &self,
        element: ElementRef<'_>,
        out: &mut String,
        depth: usize,
    ) -> Result<(), SanitizeFault> {
        if depth > MAX_DEPTH {
            return Err(SanitizeFault::TooDeep);
        }
        for child in element.children() {
            if let Some(el) = ElementRef::wrap(child) {
                self.emit_element(el, out, depth + 1)?;
            } else if let Some(text) = child.value().as_text() {
                push_escaped_text(out, text);
            }
            // comments, doctypes and processing instructions are dropped
        }
        Ok(())
    }

    fn emit_element(
        &self,
        element: ElementRef<'_>,
        out: &mut String,
        depth: usize,
    ) -> Result<(), SanitizeFault> {
        let name = element.value().name();
        let Some(tag) = AllowedTag::parse(name) else {
            if DROP_CONTENT_TAGS.contains(&name) {
                return Ok(());
            }
            // Demotion: the tag disappears, its visible text survives as a
            // plain text node. Child markup is lost with the tag.
            let mut text = String::new();
            collect_text(element, &mut text, depth)?;
            push_escaped_text(out, &text);
            return Ok(());
        };

        if tag == AllowedTag::A {
            self.emit_anchor(element, out, depth)?;
            return Ok(());
        }

        out.push('<');
        out.push_str(tag.name());
        for (attr_name, attr_value) in element.value().attrs() {
            if tag.allowed_attrs().contains(&attr_name) {
                push_attr(out, attr_name, attr_value);
            }
        }
        out.push('>');

        if tag.is_void() {
            return Ok(());
        }
        self.emit_children(element, out, depth)?;
        out.push_str("</");
        out.push_str(tag.name());
        out.push('>');
        Ok(())
    }

    fn emit_anchor(
        &self,
        element: ElementRef<'_>,
        out: &mut String,
        depth: usize,
    ) -> Result<(), SanitizeFault> {
        let value = element.value();
        let mut class_tokens: Vec<String> = value
            .attr("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let mut title = value.attr("title").map(str::to_string);
        let mut target = value.attr("target").map(str::to_string);
        let mut rel = value.attr("rel").map(str::to_string);

        let mut href = match value.attr("href") {
            Some(h) if !h.trim().is_empty() => h.to_string(),
            _ => "#".to_string(),
        };

        if !href.starts_with('#') {
            let candidate = if self.scheme_re.is_match(&href) {
                href.clone()
            } else {
                format!("https://{href}")
            };
            if is_valid_link_url(&candidate) {
                href = candidate;
            } else {
                // Inert, visibly marked, never silently dropped.
                href = "#".to_string();
                title = Some("Invalid URL".to_string());
                add_class(&mut class_tokens, "invalid-link");
            }
        }

        if href.starts_with("http") {
            target = Some("_blank".to_string());
            rel = Some("noopener noreferrer".to_string());
            add_class(&mut class_tokens, "external-link");
        }

        let mut text = String::new();
        collect_text(element, &mut text, depth)?;
        let text_lower = text.to_lowercase();
        if IMPORTANT_KEYWORDS.iter().any(|k| text_lower.contains(k)) {
            add_class(&mut class_tokens, "important-link");
        }

        out.push_str("<a");
        push_attr(out, "href", &href);
        if let Some(target) = &target {
            push_attr(out, "target", target);
        }
        if let Some(rel) = &rel {
            push_attr(out, "rel", rel);
        }
        if !class_tokens.is_empty() {
            push_attr(out, "class", &class_tokens.join(" "));
        }
        if let Some(title) = &title {
            push_attr(out, "title", title);
        }
        push_attr(out, "style", LINK_STYLE);
        out.push('>');
        self.emit_children(element, out, depth)?;
        out.push_str("</a>");
        Ok(())
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks whether a link target looks like a real, public web URL: http(s)
/// only, and a host that is either a non-private non-loopback IPv4 literal
/// or a dot-separated domain with an alphabetic top-level label.
pub fn is_valid_link_url(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw) else {
        return false;
    };
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }
    match url.host() {
        Some(Host::Ipv4(addr)) => is_public_ipv4(addr),
        Some(Host::Ipv6(_)) => false,
        Some(Host::Domain(domain)) => domain_shape_ok(domain),
        None => false,
    }
}

fn is_public_ipv4(addr: Ipv4Addr) -> bool {
    !(addr.is_loopback()
        || addr.is_private()
        || addr.is_link_local()
        || addr.is_unspecified()
        || addr.is_broadcast())
}

fn domain_shape_ok(domain: &str) -> bool {
    let trimmed = domain.trim_end_matches('.');
    let labels: Vec<&str> = trimmed.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let Some(tld) = labels.last() else {
        return false;
    };
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    labels.iter().all(|label| DOMAIN_LABEL_RE.is_match(label))
}

fn add_class(tokens: &mut Vec<String>, class: &str) {
    if !tokens.iter().any(|t| t == class) {
        tokens.push(class.to_string());
    }
}

/// Visible text of an element, skipping non-rendered subtrees.
fn collect_text(
    element: ElementRef<'_>,
    out: &mut String,
    depth: usize,
) -> Result<(), SanitizeFault> {
    if depth > MAX_DEPTH {
        return Err(SanitizeFault::TooDeep);
    }
    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            if !DROP_CONTENT_TAGS.contains(&el.value().name()) {
                collect_text(el, out, depth + 1)?;
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
    Ok(())
}

fn push_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitizer() -> HtmlSanitizer {
        HtmlSanitizer::new()
    }

    #[test]
    fn test_bare_anchor_gets_hash_href() {
        let out = sanitizer().sanitize("<a>Click</a>");
        assert!(out.starts_with(r##"<a href="#""##));
        assert!(out.contains(">Click</a>"));
        assert!(!out.contains("invalid-link"));
        assert!(!out.contains("target="));
    }

    #[test]
    fn test_script_is_dropped_with_content() {
        let out = sanitizer().sanitize("<script>x</script>hello");
        assert_eq!(out, "hello");
    }

    #[test]
    fn test_disallowed_tag_demoted_to_text() {
        let out = sanitizer().sanitize("<marquee>sale ends</marquee>");
        assert_eq!(out, "sale ends");
    }

    #[test]
    fn test_demoted_tag_loses_child_markup() {
        let out = sanitizer().sanitize("<div>Hello <b>world</b></div>");
        assert_eq!(out, "Hello world");
    }

    #[test]
    fn test_event_handler_attributes_stripped() {
        let out = sanitizer().sanitize(r#"<p onclick="evil()">hi</p>"#);
        assert_eq!(out, "<p>hi</p>");
        let out = sanitizer().sanitize(r#"<span onerror="evil()" class="x">hi</span>"#);
        assert_eq!(out, r#"<span class="x">hi</span>"#);
    }

    #[test]
    fn test_button_keeps_type_class_style() {
        let out = sanitizer().sanitize(r#"<button type="button" class="cta" data-x="1">Go</button>"#);
        assert_eq!(out, r#"<button type="button" class="cta">Go</button>"#);
    }

    #[test]
    fn test_invalid_href_forced_inert() {
        let out = sanitizer().sanitize(r#"<a href="evil">text</a>"#);
        assert!(out.contains(r##"href="#""##));
        assert!(out.contains("invalid-link"));
        assert!(out.contains(r#"title="Invalid URL""#));
        assert!(out.contains(">text</a>"));
    }

    #[test]
    fn test_external_link_markers() {
        let out = sanitizer().sanitize(r#"<a href="https://example.com">text</a>"#);
        assert!(out.contains(r#"href="https://example.com""#));
        assert!(out.contains(r#"target="_blank""#));
        assert!(out.contains(r#"rel="noopener noreferrer""#));
        assert!(out.contains("external-link"));
    }

    #[test]
    fn test_schemeless_domain_gets_https() {
        let out = sanitizer().sanitize(r#"<a href="example.com/page">docs</a>"#);
        assert!(out.contains(r#"href="https://example.com/page""#));
        assert!(out.contains("external-link"));
    }

    #[test]
    fn test_important_keyword_in_text() {
        let out = sanitizer().sanitize(r#"<a href="not a url">Deadline Friday</a>"#);
        assert!(out.contains("invalid-link"));
        assert!(out.contains("important-link"));

        let out = sanitizer().sanitize(r#"<a href="https://example.com">URGENT: read this</a>"#);
        assert!(out.contains("important-link"));
        assert!(out.contains("external-link"));
    }

    #[test]
    fn test_fragment_href_untouched() {
        let out = sanitizer().sanitize(r##"<a href="#section">jump</a>"##);
        assert!(out.contains(r##"href="#section""##));
        assert!(!out.contains("target="));
        assert!(!out.contains("invalid-link"));
    }

    #[test]
    fn test_javascript_scheme_neutralized() {
        let out = sanitizer().sanitize(r#"<a href="javascript:alert(1)">x</a>"#);
        assert!(out.contains(r##"href="#""##));
        assert!(out.contains("invalid-link"));
        assert!(!out.contains("javascript:"));
    }

    #[test]
    fn test_anchor_style_applied() {
        let out = sanitizer().sanitize(r#"<a href="https://example.com">x</a>"#);
        assert!(out.contains(r#"style=""#));
        assert!(out.contains("text-decoration:none"));
    }

    #[test]
    fn test_nested_allowed_structure_survives() {
        let input = r#"<ul><li><strong>Exam</strong> on <em>Friday</em></li></ul>"#;
        assert_eq!(sanitizer().sanitize(input), input);
    }

    #[test]
    fn test_br_is_void() {
        let out = sanitizer().sanitize("line<br>break");
        assert_eq!(out, "line<br>break");
    }

    #[test]
    fn test_text_is_escaped() {
        let out = sanitizer().sanitize("<p>tuition &amp; fees: 1 < 2</p>");
        assert_eq!(out, "<p>tuition &amp; fees: 1 &lt; 2</p>");
    }

    #[test]
    fn test_idempotence() {
        let s = sanitizer();
        let inputs = [
            "<a>Click</a>",
            r#"<a href="evil">Deadline</a>"#,
            r#"<a href="https://example.com?a=1&b=2">link</a>"#,
            r##"<a href="#top" class="nav">up</a>"##,
            "<script>x</script>hello",
            "<div>Hello <b>world</b></div>",
            r#"<p class="lead">a <span style="color:red">b</span> &amp; c</p>"#,
            "<ul><li>one</li><li>two</li></ul>",
            r#"<button type="submit" onclick="pwn()">Send</button>"#,
            "plain text, no markup",
        ];
        for input in inputs {
            let once = s.sanitize(input);
            let twice = s.sanitize(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_no_disallowed_markup_survives() {
        let s = sanitizer();
        let nasty = [
            r#"<img src=x onerror="alert(1)">"#,
            r#"<svg onload="alert(1)"></svg>"#,
            r#"<iframe src="https://evil.example"></iframe>"#,
            r#"<p onclick="alert(1)"><script>alert(2)</script>safe</p>"#,
            r#"<a href="https://example.com" onmouseover="alert(1)">x</a>"#,
            r#"<style>body{display:none}</style>keep"#,
        ];
        for input in nasty {
            let out = s.sanitize(input);
            assert!(!out.contains("<script"), "script in {out:?}");
            assert!(!out.contains("<style"), "style in {out:?}");
            assert!(!out.contains("<iframe"), "iframe in {out:?}");
            assert!(!out.contains("onerror"), "onerror in {out:?}");
            assert!(!out.contains("onclick"), "onclick in {out:?}");
            assert!(!out.contains("onload"), "onload in {out:?}");
            assert!(!out.contains("onmouseover"), "onmouseover in {out:?}");
        }
    }

    #[test]
    fn test_pathological_nesting_falls_back_to_stripping() {
        let mut input = String::new();
        for _ in 0..100 {
            input.push_str("<span>");
        }
        input.push_str("deep");
        for _ in 0..100 {
            input.push_str("</span>");
        }
        let out = sanitizer().sanitize(&input);
        assert_eq!(out, "deep");
    }

    #[test]
    fn test_strip_tags_fallback() {
        let s = sanitizer();
        assert_eq!(s.strip_tags("<b>bold</b> and <i>italic</i>"), "bold and italic");
        assert_eq!(s.strip_tags("no markup"), "no markup");
    }

    #[test]
    fn test_url_validation_accepts_domains() {
        assert!(is_valid_link_url("https://example.com"));
        assert!(is_valid_link_url("http://sub.example.co.uk/path?q=1"));
        assert!(is_valid_link_url("https://example.com:8443/x"));
    }

    #[test]
    fn test_url_validation_rejects_shapes() {
        assert!(!is_valid_link_url("https://evil"));
        assert!(!is_valid_link_url("https://example.c"));
        assert!(!is_valid_link_url("https://exa_mple.com"));
        assert!(!is_valid_link_url("ftp://example.com"));
        assert!(!is_valid_link_url("not a url"));
    }

    #[test]
    fn test_url_validation_rejects_private_ipv4() {
        assert!(!is_valid_link_url("http://127.0.0.1/"));
        assert!(!is_valid_link_url("http://10.0.0.5/"));
        assert!(!is_valid_link_url("http://192.168.1.1/"));
        assert!(!is_valid_link_url("http://172.16.0.1/"));
        assert!(!is_valid_link_url("http://169.254.1.1/"));
        assert!(!is_valid_link_url("http://0.0.0.0/"));
        assert!(is_valid_link_url("http://8.8.8.8/"));
    }
}
