use std::fmt::Write as _;

use cartsaver_core::config::{NudgeDefinition, Policy};

pub const DEFAULT_HEADLINE: &str = "Wait! Don't leave yet.";
pub const DEFAULT_BODY: &str = "We have a special offer just for you.";
pub const DEFAULT_CTA: &str = "Claim My Offer";
pub const DEFAULT_ARIA_LABEL: &str = "Special Offer";
pub const COPY_LABEL: &str = "Copy";
pub const COPIED_LABEL: &str = "Copied!";
pub const BRANDING_LINE: &str = "Powered by CartSaver";

/// Everything the surface needs to draw one overlay. Text fields are raw;
/// [`to_html`](Self::to_html) does the escaping.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayView {
    pub aria_label: String,
    pub headline: String,
    pub body: String,
    pub cta: String,
    pub coupon_code: Option<String>,
    pub show_branding: bool,
    pub custom_css: Option<String>,
    pub stylesheet_href: Option<String>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

impl OverlayView {
    pub fn from_nudge(nudge: &NudgeDefinition, coupon_code: Option<&str>, policy: &Policy) -> Self {
        let headline = non_empty(nudge.headline.as_ref());
        Self {
            aria_label: headline.unwrap_or(DEFAULT_ARIA_LABEL).to_string(),
            headline: headline.unwrap_or(DEFAULT_HEADLINE).to_string(),
            body: non_empty(nudge.body_text.as_ref())
                .unwrap_or(DEFAULT_BODY)
                .to_string(),
            cta: non_empty(nudge.cta_text.as_ref())
                .unwrap_or(DEFAULT_CTA)
                .to_string(),
            coupon_code: coupon_code
                .filter(|code| !code.is_empty())
                .map(str::to_string),
            show_branding: policy.show_branding,
            custom_css: policy.custom_css().map(str::to_string),
            stylesheet_href: None,
        }
    }

    /// Link the shared overlay stylesheet served by the backend at `host`.
    pub fn with_stylesheet_from(mut self, host: &str) -> Self {
        self.stylesheet_href = Some(format!(
            "{}/storefront/cartsaver.css",
            host.trim_end_matches('/')
        ));
        self
    }

    pub fn to_html(&self) -> String {
        let mut html = String::with_capacity(1024);
        if let Some(href) = &self.stylesheet_href {
            let _ = writeln!(
                html,
                r#"<link id="cartsaver-styles" rel="stylesheet" href="{}">"#,
                escape_html(href)
            );
        }
        if let Some(css) = &self.custom_css {
            let _ = writeln!(
                html,
                r#"<style id="cartsaver-custom-css">{}</style>"#,
                css.replace("</", "<\\/")
            );
        }
        let _ = writeln!(
            html,
            r#"<div id="cartsaver-overlay" role="dialog" aria-modal="true" aria-label="{}">"#,
            escape_html(&self.aria_label)
        );
        html.push_str("  <div id=\"cartsaver-backdrop\"></div>\n");
        html.push_str("  <div id=\"cartsaver-modal\">\n");
        html.push_str("    <button id=\"cartsaver-close\" aria-label=\"Close\">&times;</button>\n");
        html.push_str("    <div id=\"cartsaver-icon\">\u{1F6D2}</div>\n");
        let _ = writeln!(
            html,
            r#"    <h2 id="cartsaver-headline">{}</h2>"#,
            escape_html(&self.headline)
        );
        let _ = writeln!(
            html,
            r#"    <p id="cartsaver-body">{}</p>"#,
            escape_html(&self.body)
        );
        if let Some(code) = &self.coupon_code {
            html.push_str("    <div id=\"cartsaver-coupon\">\n");
            html.push_str("      <span id=\"cartsaver-coupon-label\">Use code:</span>\n");
            let _ = writeln!(
                html,
                r#"      <span id="cartsaver-coupon-code">{}</span>"#,
                escape_html(code)
            );
            let _ = writeln!(html, r#"      <button id="cartsaver-copy-btn">{COPY_LABEL}</button>"#);
            html.push_str("    </div>\n");
        }
        let _ = writeln!(
            html,
            r#"    <button id="cartsaver-cta">{}</button>"#,
            escape_html(&self.cta)
        );
        if self.show_branding {
            let _ = writeln!(html, r#"    <p id="cartsaver-branding">{BRANDING_LINE}</p>"#);
        }
        html.push_str("  </div>\n</div>\n");
        html
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
