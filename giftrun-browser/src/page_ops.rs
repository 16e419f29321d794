//! Page interaction helpers
//!
//! Small operations the checkout and redemption flows are composed from:
//! text-based clicks, text reads, input fill, visibility checks and
//! frame-scoped reads/clicks for the embedded payment provider.

use crate::{BrowserError, Result};
use chromiumoxide::Page;
use serde::de::DeserializeOwned;

/// Evaluates a script on the page and decodes its result.
pub async fn eval<T: DeserializeOwned>(page: &Page, script: String) -> Result<T> {
    page.evaluate(script)
        .await?
        .into_value::<T>()
        .map_err(|e| BrowserError::Script(format!("failed to decode JS result: {e}")))
}

fn js_string(value: &str) -> String {
    // serde_json string encoding is valid JS string literal syntax
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Clicks the last element whose visible text contains `text`.
/// Returns false when no such element exists.
pub async fn click_by_text(page: &Page, text: &str) -> Result<bool> {
    let needle = js_string(text);
    let script = format!(
        r#"(() => {{
            const needle = {needle};
            const literal = needle.includes('"') ? "'" + needle + "'" : '"' + needle + '"';
            const xp = '//*[contains(text(), ' + literal + ')]';
            const res = document.evaluate(xp, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
            if (res.snapshotLength === 0) return false;
            res.snapshotItem(res.snapshotLength - 1).click();
            return true;
        }})()"#
    );
    eval(page, script).await
}

/// True when the page body text contains `needle`.
pub async fn body_contains(page: &Page, needle: &str) -> Result<bool> {
    let needle = js_string(needle);
    let script = format!(
        "(() => (document.body && document.body.textContent || '').includes({needle}))()"
    );
    eval(page, script).await
}

/// Reads the text content of the first element matching `css`.
/// None when the element is absent.
pub async fn text_of(page: &Page, css: &str) -> Result<Option<String>> {
    let css = js_string(css);
    let script = format!(
        r#"(() => {{
            const el = document.querySelector({css});
            return el ? el.textContent : null;
        }})()"#
    );
    eval(page, script).await
}

/// True when an element matching `css` exists and takes part in layout.
pub async fn is_visible(page: &Page, css: &str) -> Result<bool> {
    let css = js_string(css);
    let script = format!(
        r#"(() => {{
            const el = document.querySelector({css});
            return !!(el && el.offsetParent !== null);
        }})()"#
    );
    eval(page, script).await
}

/// Fills the input matching `css` with `value`, replacing prior content.
pub async fn fill(page: &Page, css: &str, value: &str) -> Result<()> {
    let element = page.find_element(css).await?;
    element.click().await?;
    // type_str appends, so the field is emptied first.
    eval::<bool>(page, clear_script(css)).await?;
    element.type_str(value).await?;
    Ok(())
}

fn clear_script(css: &str) -> String {
    let css = js_string(css);
    format!(
        r#"(() => {{
            const el = document.querySelector({css});
            if (!el) return false;
            el.value = '';
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            return true;
        }})()"#
    )
}

/// Reads text from an element inside an embedded frame.
/// None when the frame or the element is absent.
pub async fn frame_text(page: &Page, frame_css: &str, inner_css: &str) -> Result<Option<String>> {
    let frame_css = js_string(frame_css);
    let inner_css = js_string(inner_css);
    let script = format!(
        r#"(() => {{
            const frame = document.querySelector({frame_css});
            if (!frame || !frame.contentDocument) return null;
            const el = frame.contentDocument.querySelector({inner_css});
            return el ? el.textContent : null;
        }})()"#
    );
    eval(page, script).await
}

/// True when an element inside the frame exists and takes part in layout.
pub async fn frame_visible(page: &Page, frame_css: &str, inner_css: &str) -> Result<bool> {
    let frame_css = js_string(frame_css);
    let inner_css = js_string(inner_css);
    let script = format!(
        r#"(() => {{
            const frame = document.querySelector({frame_css});
            if (!frame || !frame.contentDocument) return false;
            const el = frame.contentDocument.querySelector({inner_css});
            return !!(el && el.offsetParent !== null);
        }})()"#
    );
    eval(page, script).await
}

/// Clicks an element inside an embedded frame.
/// Returns false when the frame or the element is absent.
pub async fn frame_click(page: &Page, frame_css: &str, inner_css: &str) -> Result<bool> {
    let frame_css = js_string(frame_css);
    let inner_css = js_string(inner_css);
    let script = format!(
        r#"(() => {{
            const frame = document.querySelector({frame_css});
            if (!frame || !frame.contentDocument) return false;
            const el = frame.contentDocument.querySelector({inner_css});
            if (!el) return false;
            el.click();
            return true;
        }})()"#
    );
    eval(page, script).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string("plain"), "\"plain\"");
        assert_eq!(js_string("with \"quotes\""), "\"with \\\"quotes\\\"\"");
    }

    #[test]
    fn test_clear_script_empties_value_and_fires_input() {
        let script = clear_script("#code");
        assert!(script.contains("el.value = ''"));
        assert!(script.contains("new Event('input'"));
        assert!(script.contains("\"#code\""));
    }
}
