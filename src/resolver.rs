//! DOM resolution
//!
//! Locates the latest assistant message and the reply controls by probing
//! the page with an injected script. The probe returns plain JSON facts;
//! everything downstream (classification, dedup, response) is decided in
//! Rust from the returned snapshot.

use serde::Deserialize;
use serde_json::Value;

use crate::dom::ScriptHost;
use crate::streaming::TYPING_INDICATOR_SELECTORS;
use crate::Result;

/// Ordered DOM query patterns, most specific first. Later entries are
/// broad catch-alls kept for interface drift.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub message_selectors: Vec<String>,
    pub input_selectors: Vec<String>,
    pub send_selectors: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            message_selectors: [
                "div[data-message-author-role=\"assistant\"]",
                "div.text-message",
                "div[class*=\"markdown\"]",
                "div[class*=\"prose\"]",
                "div[class*=\"text-base\"]",
                "div[class*=\"whitespace-pre-wrap\"]",
                "div[class*=\"message\"]",
                "div[class*=\"response\"]",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            input_selectors: [
                "div#prompt-textarea[contenteditable=\"true\"]",
                "div[data-testid=\"text-input\"]",
                "div.text-input[contenteditable=\"true\"]",
                "div[role=\"textbox\"]",
                "textarea[placeholder*=\"Message\"]",
                "textarea[data-id=\"root\"]",
                "textarea[placeholder*=\"Ask anything\"]",
                "div[contenteditable=\"true\"]",
                "textarea",
                "input[type=\"text\"]",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            send_selectors: [
                "button[data-testid=\"send-button\"]",
                "button[aria-label*=\"Send\"]",
                "button[aria-label*=\"send\"]",
                "button[type=\"submit\"]",
                "button.send-button",
                "button[class*=\"send\"]",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Facts about the latest assistant message, as observed by one probe.
#[derive(Debug, Clone)]
pub struct MessageSnapshot {
    pub text: String,
    /// Milliseconds since the epoch. Taken from the page's own timestamp
    /// markup when present, otherwise the wall clock at probe time.
    pub timestamp_ms: i64,
    pub class_name: String,
    pub has_streaming_descendant: bool,
    /// Which message selector matched, for diagnostics.
    pub matched_by: Option<String>,
    /// True when the message came from the loose text-scan fallback.
    pub via_fallback: bool,
}

/// What kind of input element the probe found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// A `<textarea>` or `<input>` carrying a `value`.
    TextEntry,
    /// A contenteditable element carrying `textContent`.
    RichText,
}

/// A located input or send control.
#[derive(Debug, Clone)]
pub struct Control {
    pub kind: ControlKind,
    pub matched_by: String,
    pub disabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessageProbe {
    found: bool,
    #[serde(default)]
    text: String,
    #[serde(default)]
    timestamp_ms: Option<i64>,
    #[serde(default)]
    class_name: String,
    #[serde(default)]
    has_streaming_descendant: bool,
    #[serde(default)]
    matched_by: Option<String>,
    #[serde(default)]
    via_fallback: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawControlProbe {
    found: bool,
    #[serde(default)]
    tag: String,
    #[serde(default)]
    matched_by: String,
    #[serde(default)]
    disabled: bool,
}

/// Builds and runs the page probes for one session.
#[derive(Debug, Clone)]
pub struct SelectorResolver {
    selectors: SelectorConfig,
}

impl SelectorResolver {
    pub fn new(selectors: SelectorConfig) -> Self {
        Self { selectors }
    }

    pub fn selectors(&self) -> &SelectorConfig {
        &self.selectors
    }

    /// Probe for the newest visible assistant message.
    ///
    /// Returns `Ok(None)` when the page holds no plausible message. The
    /// timestamp falls back to the current wall clock when the page offers
    /// no timestamp markup, so a brand-new message still advances the
    /// processing cursor.
    pub async fn find_latest_assistant_message<H: ScriptHost>(
        &self,
        host: &H,
    ) -> Result<Option<MessageSnapshot>> {
        let script = self.message_probe_script()?;
        let value = host.eval_json(&script).await?;
        let raw: RawMessageProbe = serde_json::from_value(normalize(value))?;

        if !raw.found {
            return Ok(None);
        }
        let timestamp_ms = raw
            .timestamp_ms
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
        Ok(Some(MessageSnapshot {
            text: raw.text,
            timestamp_ms,
            class_name: raw.class_name,
            has_streaming_descendant: raw.has_streaming_descendant,
            matched_by: raw.matched_by,
            via_fallback: raw.via_fallback,
        }))
    }

    /// Probe for a visible input control.
    pub async fn find_input_control<H: ScriptHost>(&self, host: &H) -> Result<Option<Control>> {
        let script = control_probe_script(&self.selectors.input_selectors, false)?;
        self.run_control_probe(host, &script).await
    }

    /// Probe for an enabled, visible send button.
    pub async fn find_send_control<H: ScriptHost>(&self, host: &H) -> Result<Option<Control>> {
        let script = control_probe_script(&self.selectors.send_selectors, true)?;
        self.run_control_probe(host, &script).await
    }

    async fn run_control_probe<H: ScriptHost>(
        &self,
        host: &H,
        script: &str,
    ) -> Result<Option<Control>> {
        let value = host.eval_json(script).await?;
        let raw: RawControlProbe = serde_json::from_value(normalize(value))?;
        if !raw.found {
            return Ok(None);
        }
        let kind = match raw.tag.as_str() {
            "TEXTAREA" | "INPUT" => ControlKind::TextEntry,
            _ => ControlKind::RichText,
        };
        Ok(Some(Control {
            kind,
            matched_by: raw.matched_by,
            disabled: raw.disabled,
        }))
    }

    /// The message probe walks the selector list in priority order, keeps
    /// only visible matches, and takes the last one (newest in document
    /// order). When nothing matches it falls back to a reverse scan of all
    /// divs for something that reads like an assistant reply.
    fn message_probe_script(&self) -> Result<String> {
        let message_selectors = serde_json::to_string(&self.selectors.message_selectors)?;
        let typing_selectors = serde_json::to_string(TYPING_INDICATOR_SELECTORS)?;
        Ok(format!(
            r#"(() => {{
    const messageSelectors = {message_selectors};
    const typingSelectors = {typing_selectors};
    const isVisible = (el) => {{
        const rect = el.getBoundingClientRect();
        if (rect.width <= 0 || rect.height <= 0) return false;
        const style = window.getComputedStyle(el);
        return style.display !== 'none' && style.visibility !== 'hidden';
    }};
    const describe = (el, matchedBy, viaFallback) => {{
        let timestampMs = null;
        const tsEl = el.querySelector('time') ||
                     el.querySelector('[data-timestamp]') ||
                     el.closest('[data-timestamp]');
        if (tsEl) {{
            const raw = tsEl.getAttribute('datetime') || tsEl.getAttribute('data-timestamp');
            if (raw) {{
                const parsed = new Date(raw).getTime();
                if (!Number.isNaN(parsed)) timestampMs = parsed;
            }}
        }}
        const hasStreamingDescendant = typingSelectors.some((s) => {{
            try {{ return el.querySelector(s) !== null; }} catch (_) {{ return false; }}
        }});
        return {{
            found: true,
            text: el.textContent || el.innerText || '',
            timestampMs,
            className: typeof el.className === 'string' ? el.className : '',
            hasStreamingDescendant,
            matchedBy,
            viaFallback,
        }};
    }};
    for (const selector of messageSelectors) {{
        let matches;
        try {{ matches = document.querySelectorAll(selector); }} catch (_) {{ continue; }}
        const visible = Array.from(matches).filter(isVisible);
        if (visible.length > 0) {{
            return describe(visible[visible.length - 1], selector, false);
        }}
    }}
    const allDivs = document.querySelectorAll('div');
    for (let i = allDivs.length - 1; i >= 0; i--) {{
        const div = allDivs[i];
        const text = div.textContent || div.innerText || '';
        if (text.length > 10 && text.length < 2000 && isVisible(div)) {{
            if ((text.includes('Hello') || text.includes('How') ||
                 text.includes('?') || text.includes('!')) &&
                !text.includes('You:') && !text.includes('User:') &&
                !text.includes('Human:')) {{
                return describe(div, null, true);
            }}
        }}
    }}
    return {{ found: false }};
}})()"#
        ))
    }
}

fn control_probe_script(selectors: &[String], require_enabled: bool) -> Result<String> {
    let selectors = serde_json::to_string(selectors)?;
    Ok(format!(
        r#"(() => {{
    const selectors = {selectors};
    const requireEnabled = {require_enabled};
    const isVisible = (el) => {{
        const rect = el.getBoundingClientRect();
        if (rect.width <= 0 || rect.height <= 0) return false;
        const style = window.getComputedStyle(el);
        return style.display !== 'none' && style.visibility !== 'hidden';
    }};
    for (const selector of selectors) {{
        let el;
        try {{ el = document.querySelector(selector); }} catch (_) {{ continue; }}
        if (!el || !isVisible(el)) continue;
        if (requireEnabled && el.disabled) continue;
        return {{
            found: true,
            tag: el.tagName,
            matchedBy: selector,
            disabled: !!el.disabled,
        }};
    }}
    return {{ found: false }};
}})()"#
    ))
}

/// Probe results arrive as JSON values from the page. A null (page returned
/// undefined) is treated as "nothing found" rather than a parse error.
fn normalize(value: Value) -> Value {
    if value.is_null() {
        serde_json::json!({ "found": false })
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_selector_priority() {
        let config = SelectorConfig::default();
        assert_eq!(
            config.message_selectors[0],
            "div[data-message-author-role=\"assistant\"]"
        );
        assert_eq!(
            config.input_selectors[0],
            "div#prompt-textarea[contenteditable=\"true\"]"
        );
        assert_eq!(config.send_selectors[0], "button[data-testid=\"send-button\"]");
    }

    #[test]
    fn test_message_probe_embeds_selectors() {
        let resolver = SelectorResolver::new(SelectorConfig::default());
        let script = resolver.message_probe_script().unwrap();
        for selector in &resolver.selectors().message_selectors {
            assert!(script.contains(&serde_json::to_string(selector).unwrap()));
        }
        for selector in TYPING_INDICATOR_SELECTORS {
            assert!(script.contains(&serde_json::to_string(selector).unwrap()));
        }
    }

    #[test]
    fn test_control_probe_enabled_flag() {
        let send = control_probe_script(&["button".to_string()], true).unwrap();
        assert!(send.contains("const requireEnabled = true"));
        let input = control_probe_script(&["textarea".to_string()], false).unwrap();
        assert!(input.contains("const requireEnabled = false"));
    }

    #[test]
    fn test_parse_message_probe_json() {
        let raw: RawMessageProbe = serde_json::from_value(serde_json::json!({
            "found": true,
            "text": "Should I continue?",
            "timestampMs": 1_700_000_000_000i64,
            "className": "markdown prose",
            "hasStreamingDescendant": false,
            "matchedBy": "div[class*=\"markdown\"]",
            "viaFallback": false,
        }))
        .unwrap();
        assert!(raw.found);
        assert_eq!(raw.text, "Should I continue?");
        assert_eq!(raw.timestamp_ms, Some(1_700_000_000_000));
        assert_eq!(raw.matched_by.as_deref(), Some("div[class*=\"markdown\"]"));
    }

    #[test]
    fn test_parse_not_found_and_null() {
        let raw: RawMessageProbe =
            serde_json::from_value(normalize(serde_json::json!({ "found": false }))).unwrap();
        assert!(!raw.found);
        let raw: RawMessageProbe = serde_json::from_value(normalize(Value::Null)).unwrap();
        assert!(!raw.found);
    }

    #[test]
    fn test_control_kind_from_tag() {
        let from_tag = |tag: &str| match tag {
            "TEXTAREA" | "INPUT" => ControlKind::TextEntry,
            _ => ControlKind::RichText,
        };
        assert_eq!(from_tag("TEXTAREA"), ControlKind::TextEntry);
        assert_eq!(from_tag("INPUT"), ControlKind::TextEntry);
        assert_eq!(from_tag("DIV"), ControlKind::RichText);
    }
}
