//! In-page JavaScript used by the engine
//!
//! Every script the engine evaluates lives here. Constants named `*_BODY`
//! are function bodies run against a node (`elem` in scope); the rest are
//! page-context expressions. Caller-supplied values are embedded exclusively
//! through [`js_string`], never by hand-rolled escaping.

/// Encode a string as a JavaScript string literal.
///
/// Produces a JSON string literal, which is valid JavaScript source and
/// neutralizes quotes, backslashes, control characters, and line/paragraph
/// separators. This is the only escaping path into generated scripts.
pub(crate) fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| String::from("\"\""))
}

/// Full scroll extent of the page, maxing the body and document element
/// measurements so partially-scrolled layouts report their true height.
pub(crate) const PAGE_HEIGHT: &str = r#"Math.max(
    document.body.scrollHeight,
    document.body.offsetHeight,
    document.documentElement.clientHeight,
    document.documentElement.scrollHeight,
    document.documentElement.offsetHeight
)"#;

/// Serialized HTML of the whole document
pub(crate) const OUTER_HTML: &str = "document.documentElement.outerHTML";

/// Visibility check: computed display not `none` and nonzero rendered height
pub(crate) const IS_VISIBLE_BODY: &str = r#"return window.getComputedStyle(elem).getPropertyValue('display') !== 'none' && elem.offsetHeight > 0;"#;

/// Script-level click, for elements a pointer click cannot reach
pub(crate) const SCRIPT_CLICK_BODY: &str = "elem.click();";

/// Remove input focus
pub(crate) const BLUR_BODY: &str = "elem.blur();";

/// Custom data attributes as a plain object
pub(crate) const DATASET_BODY: &str = "return Object.assign({}, elem.dataset);";

/// Map of option value to visible label for a selection element
pub(crate) const OPTION_MAP_BODY: &str = r#"const map = {};
for (const option of elem.querySelectorAll('option')) {
    map[option.value] = option.innerText;
}
return map;"#;

/// Assign an already-JSON-encoded value to the element's value property
pub(crate) fn set_value_body(encoded: &str) -> String {
    format!("elem.value = {};", encoded)
}

/// Query one level into the element's shadow root
pub(crate) fn shadow_query_body(selector: &str) -> String {
    format!(
        "return elem.shadowRoot.querySelector({});",
        js_string(selector)
    )
}

/// Fetch `url` from page context and resolve with a data-URI of the body.
///
/// Same-origin by construction: the caller decides which page issues the
/// fetch. The bridge awaits the returned promise.
pub(crate) fn fetch_data_uri(url: &str) -> String {
    format!(
        r#"(() => {{
    const url = {};
    return new Promise((resolve, reject) => {{
        fetch(url)
            .then((response) => response.blob())
            .then((blob) => {{
                const reader = new FileReader();
                reader.onload = () => resolve(reader.result);
                reader.onerror = () => reject(new Error('read failed'));
                reader.readAsDataURL(blob);
            }})
            .catch((err) => reject(err));
    }});
}})()"#,
        js_string(url)
    )
}
