//! Client asset generator for HOP 'N POP 16.
//!
//! [`generate`] turns a validated schema into `hnp-protocol.js` (plus the
//! optional GPIO debugger files) and, when asked, rewrites the PICO-8
//! HTML shell to embed, import or remove them. Generation is pure: the
//! result depends only on the schema and the options, and nothing touches
//! the filesystem until [`GeneratedAssets::write_to`].

mod assets;
mod error;
mod html;
mod js;
mod options;

pub use assets::GeneratedAssets;
pub use error::GenerationError;
pub use options::{GenerateOptions, HtmlAction, HtmlDocument};

use std::collections::BTreeMap;

use hnp_schema::ValidatedSchema;

use html::{insert_block, strip_block, DEBUGGER_BLOCK, PROTOCOL_BLOCK};

pub const PROTOCOL_JS: &str = "hnp-protocol.js";
pub const DEBUG_JS: &str = "hnp-debug.js";
pub const DEBUG_CSS: &str = "hnp-debug.css";

const DEBUG_JS_SOURCE: &str = include_str!("../assets/hnp-debug.js");
const DEBUG_CSS_SOURCE: &str = include_str!("../assets/hnp-debug.css");

/// Generates client assets for `schema`.
///
/// Option conflicts are reported before any output is produced.
pub fn generate(
    schema: &ValidatedSchema,
    options: &GenerateOptions,
) -> Result<GeneratedAssets, GenerationError> {
    let action = options.html_action()?;

    let mut files = BTreeMap::new();
    let protocol = js::protocol_js(schema)?;
    files.insert(PROTOCOL_JS.to_string(), protocol.clone());
    if options.with_debugger {
        files.insert(DEBUG_JS.to_string(), DEBUG_JS_SOURCE.to_string());
        files.insert(DEBUG_CSS.to_string(), DEBUG_CSS_SOURCE.to_string());
    }

    let html = match (action, &options.html) {
        (Some(action), Some(doc)) => Some(HtmlDocument {
            name: doc.name.clone(),
            content: rewrite_html(&doc.content, action, options, &protocol)?,
        }),
        _ => None,
    };

    tracing::debug!(
        files = files.len(),
        html = ?action,
        fingerprint = schema.fingerprint(),
        "generated client assets"
    );
    Ok(GeneratedAssets::new(files, html))
}

fn rewrite_html(
    content: &str,
    action: HtmlAction,
    options: &GenerateOptions,
    protocol: &str,
) -> Result<String, GenerationError> {
    if action == HtmlAction::RemoveDebugger {
        return strip_block(content, DEBUGGER_BLOCK);
    }

    let stripped = strip_block(&strip_block(content, PROTOCOL_BLOCK)?, DEBUGGER_BLOCK)?;
    let prefix = &options.asset_prefix;

    let html = match action {
        HtmlAction::Embed => {
            let html = insert_block(
                &stripped,
                PROTOCOL_BLOCK,
                &format!("<script>\n{protocol}</script>"),
            );
            if options.with_debugger {
                insert_block(
                    &html,
                    DEBUGGER_BLOCK,
                    &format!(
                        "<style>\n{DEBUG_CSS_SOURCE}</style>\n<script>\n{DEBUG_JS_SOURCE}</script>"
                    ),
                )
            } else {
                html
            }
        }
        HtmlAction::Import => {
            let html = insert_block(
                &stripped,
                PROTOCOL_BLOCK,
                &format!("<script src=\"{prefix}{PROTOCOL_JS}\"></script>"),
            );
            if options.with_debugger {
                insert_block(
                    &html,
                    DEBUGGER_BLOCK,
                    &format!(
                        "<link rel=\"stylesheet\" href=\"{prefix}{DEBUG_CSS}\">\n\
                         <script src=\"{prefix}{DEBUG_JS}\"></script>"
                    ),
                )
            } else {
                html
            }
        }
        HtmlAction::Remove | HtmlAction::RemoveDebugger => stripped,
    };
    Ok(html)
}
