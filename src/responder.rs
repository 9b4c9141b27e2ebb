//! Reply submission
//!
//! Writes the reply text into the chat input and submits it. Best-effort
//! throughout: a page that has no usable input or send control costs a log
//! line, never an error, and the message stays marked as processed.

use std::time::Duration;

use crate::dom::ScriptHost;
use crate::resolver::{ControlKind, SelectorResolver};
use crate::Result;

/// Pause between the first write and the confirming re-write, giving the
/// page's own handlers time to react to the focus and input events.
const INPUT_SETTLE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Default)]
pub struct AutoResponder;

impl AutoResponder {
    pub fn new() -> Self {
        Self
    }

    /// Type `text` into the chat input and submit it.
    ///
    /// Framework-driven inputs sometimes reset the value on focus, so the
    /// text is written, the input is focused, and after a short settle the
    /// value is cleared and written again before submitting.
    pub async fn respond<H: ScriptHost>(
        &self,
        host: &H,
        resolver: &SelectorResolver,
        text: &str,
    ) -> Result<()> {
        let Some(input) = resolver.find_input_control(host).await? else {
            tracing::warn!("No visible input control, skipping reply");
            return Ok(());
        };
        tracing::debug!(matched_by = %input.matched_by, "Writing reply into input");

        let write = write_script(resolver, text, input.kind)?;
        host.eval_json(&write).await?;
        tokio::time::sleep(INPUT_SETTLE_DELAY).await;
        let rewrite = rewrite_script(resolver, text, input.kind)?;
        host.eval_json(&rewrite).await?;

        match resolver.find_send_control(host).await? {
            Some(send) => {
                tracing::debug!(matched_by = %send.matched_by, "Clicking send button");
                host.eval_json(&click_send_script(resolver)?).await?;
            }
            None => {
                tracing::debug!("No send button, falling back to Enter key");
                host.eval_json(ENTER_FALLBACK_SCRIPT).await?;
            }
        }
        Ok(())
    }
}

fn find_input_js(resolver: &SelectorResolver) -> Result<String> {
    let selectors = serde_json::to_string(&resolver.selectors().input_selectors)?;
    Ok(format!(
        r#"const selectors = {selectors};
    const isVisible = (el) => {{
        const rect = el.getBoundingClientRect();
        if (rect.width <= 0 || rect.height <= 0) return false;
        const style = window.getComputedStyle(el);
        return style.display !== 'none' && style.visibility !== 'hidden';
    }};
    let input = null;
    for (const selector of selectors) {{
        let el;
        try {{ el = document.querySelector(selector); }} catch (_) {{ continue; }}
        if (el && isVisible(el)) {{ input = el; break; }}
    }}"#
    ))
}

fn set_value_js(kind: ControlKind, value_literal: &str) -> String {
    match kind {
        ControlKind::TextEntry => format!(
            r#"input.value = {value_literal};
    input.dispatchEvent(new Event('input', {{ bubbles: true }}));
    input.dispatchEvent(new Event('change', {{ bubbles: true }}));"#
        ),
        ControlKind::RichText => format!(
            r#"input.textContent = {value_literal};
    input.dispatchEvent(new Event('input', {{ bubbles: true }}));
    input.dispatchEvent(new Event('change', {{ bubbles: true }}));"#
        ),
    }
}

fn write_script(resolver: &SelectorResolver, text: &str, kind: ControlKind) -> Result<String> {
    let find = find_input_js(resolver)?;
    let literal = serde_json::to_string(text)?;
    let set = set_value_js(kind, &literal);
    Ok(format!(
        r#"(() => {{
    {find}
    if (!input) return false;
    {set}
    input.focus();
    input.click();
    return true;
}})()"#
    ))
}

fn rewrite_script(resolver: &SelectorResolver, text: &str, kind: ControlKind) -> Result<String> {
    let find = find_input_js(resolver)?;
    let literal = serde_json::to_string(text)?;
    let clear = set_value_js(kind, "''");
    let set = set_value_js(kind, &literal);
    Ok(format!(
        r#"(() => {{
    {find}
    if (!input) return false;
    {clear}
    {set}
    return true;
}})()"#
    ))
}

fn click_send_script(resolver: &SelectorResolver) -> Result<String> {
    let selectors = serde_json::to_string(&resolver.selectors().send_selectors)?;
    Ok(format!(
        r#"(() => {{
    const selectors = {selectors};
    const isVisible = (el) => {{
        const rect = el.getBoundingClientRect();
        if (rect.width <= 0 || rect.height <= 0) return false;
        const style = window.getComputedStyle(el);
        return style.display !== 'none' && style.visibility !== 'hidden';
    }};
    for (const selector of selectors) {{
        let el;
        try {{ el = document.querySelector(selector); }} catch (_) {{ continue; }}
        if (el && isVisible(el) && !el.disabled) {{
            el.click();
            return true;
        }}
    }}
    return false;
}})()"#
    ))
}

/// Pressing Enter is only meaningful when the focused element is the chat
/// input itself, so the check stays on the page side.
const ENTER_FALLBACK_SCRIPT: &str = r#"(() => {
    const el = document.activeElement;
    if (!el) return false;
    if (el.tagName !== 'TEXTAREA' && el.contentEditable !== 'true') return false;
    el.dispatchEvent(new KeyboardEvent('keydown', {
        key: 'Enter',
        code: 'Enter',
        keyCode: 13,
        which: 13,
        bubbles: true,
    }));
    return true;
})()"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::SelectorConfig;

    fn resolver() -> SelectorResolver {
        SelectorResolver::new(SelectorConfig::default())
    }

    #[test]
    fn test_write_script_embeds_text_as_json_literal() {
        let script = write_script(&resolver(), "Yes", ControlKind::TextEntry).unwrap();
        assert!(script.contains("input.value = \"Yes\""));
        assert!(script.contains("input.focus()"));
    }

    #[test]
    fn test_write_script_escapes_text() {
        let script =
            write_script(&resolver(), "it's \"fine\"\nreally", ControlKind::RichText).unwrap();
        assert!(script.contains(r#"input.textContent = "it's \"fine\"\nreally""#));
    }

    #[test]
    fn test_rewrite_clears_before_setting() {
        let script = rewrite_script(&resolver(), "Yes", ControlKind::TextEntry).unwrap();
        let clear_pos = script.find("input.value = ''").unwrap();
        let set_pos = script.find("input.value = \"Yes\"").unwrap();
        assert!(clear_pos < set_pos);
    }

    #[test]
    fn test_rich_text_uses_text_content() {
        let script = write_script(&resolver(), "Yes", ControlKind::RichText).unwrap();
        assert!(script.contains("input.textContent = \"Yes\""));
        assert!(!script.contains("input.value ="));
    }

    #[test]
    fn test_enter_fallback_targets_active_element_only() {
        assert!(ENTER_FALLBACK_SCRIPT.contains("document.activeElement"));
        assert!(ENTER_FALLBACK_SCRIPT.contains("contentEditable"));
    }
}
