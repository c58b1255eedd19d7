//! Generator options and how they combine.

use crate::GenerationError;

/// What to do with the HTML shell document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlAction {
    /// Inline the generated scripts.
    Embed,
    /// Reference the generated files with `<script src>` tags.
    Import,
    /// Strip every managed block.
    Remove,
    /// Strip only the debugger block.
    RemoveDebugger,
}

/// The HTML shell exported by PICO-8, to be rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlDocument {
    /// File name used by [`GeneratedAssets::write_to`](crate::GeneratedAssets::write_to).
    pub name: String,
    pub content: String,
}

impl HtmlDocument {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Options for [`generate`](crate::generate).
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub with_debugger: bool,
    pub embed: bool,
    pub import: bool,
    pub remove: bool,
    pub remove_debugger: bool,
    pub html: Option<HtmlDocument>,
    /// Prepended to file names in `<script src>` and `<link href>` tags.
    pub asset_prefix: String,
}

impl GenerateOptions {
    /// Resolves the flags into a single HTML action.
    ///
    /// Fails on any incompatible combination, before anything is produced.
    pub fn html_action(&self) -> Result<Option<HtmlAction>, GenerationError> {
        let mut set = Vec::new();
        if self.embed {
            set.push("embed");
        }
        if self.import {
            set.push("import");
        }
        if self.remove {
            set.push("remove");
        }
        if set.len() > 1 {
            return Err(GenerationError::ConflictingOptions(set));
        }
        if self.with_debugger && self.remove_debugger {
            return Err(GenerationError::ConflictingOptions(vec![
                "with-debugger",
                "remove-debugger",
            ]));
        }

        let action = match (self.embed, self.import, self.remove, self.remove_debugger) {
            (true, ..) => Some(HtmlAction::Embed),
            (_, true, ..) => Some(HtmlAction::Import),
            (_, _, true, _) => Some(HtmlAction::Remove),
            (_, _, _, true) => Some(HtmlAction::RemoveDebugger),
            _ => None,
        };

        if let Some(action) = action {
            if self.html.is_none() {
                return Err(GenerationError::MissingHtml(action.flag()));
            }
        }
        Ok(action)
    }
}

impl HtmlAction {
    fn flag(self) -> &'static str {
        match self {
            Self::Embed => "embed",
            Self::Import => "import",
            Self::Remove => "remove",
            Self::RemoveDebugger => "remove-debugger",
        }
    }
}
