//! Language descriptors.
//!
//! A descriptor tells the scanner how comments look in a file so task
//! markers can be found inside them. Markdown is special: the whole file is
//! task text and `<!-- -->` is only used for metadata blocks.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Name used for the markdown/plain-text descriptor
pub const MARKDOWN: &str = "markdown";

/// Block comment tokens for a language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockComment {
    pub start: String,
    pub end: String,
    /// Leading decoration on continuation lines (the `*` of `/** ... */`)
    #[serde(default)]
    pub ignore: String,
}

impl BlockComment {
    fn new(start: &str, end: &str, ignore: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
            ignore: ignore.to_string(),
        }
    }
}

/// Comment syntax of one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lang {
    #[serde(default)]
    pub name: String,
    /// Line comment symbol; empty when the language has none
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub block: Option<BlockComment>,
}

impl Lang {
    pub fn new(name: &str, symbol: &str, block: Option<BlockComment>) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            block,
        }
    }

    pub fn markdown() -> Self {
        Self::new(MARKDOWN, "", Some(BlockComment::new("<!--", "-->", "")))
    }

    pub fn is_markdown(&self) -> bool {
        self.name == MARKDOWN
    }

    pub fn block_start(&self) -> Option<&str> {
        self.block.as_ref().map(|b| b.start.as_str())
    }

    pub fn block_end(&self) -> Option<&str> {
        self.block.as_ref().map(|b| b.end.as_str())
    }

    /// Ignore token, if the language has a non-empty one
    pub fn block_ignore(&self) -> Option<&str> {
        self.block
            .as_ref()
            .map(|b| b.ignore.as_str())
            .filter(|ignore| !ignore.is_empty())
    }
}

fn c_style(name: &str) -> Lang {
    Lang::new(name, "//", Some(BlockComment::new("/*", "*/", "*")))
}

fn hash_style(name: &str) -> Lang {
    Lang::new(name, "#", None)
}

/// Built-in extension table
pub fn builtin(extension: &str) -> Option<Lang> {
    let lang = match extension {
        "md" | "markdown" | "mdown" | "txt" => Lang::markdown(),
        "rs" => c_style("rust"),
        "js" | "mjs" | "cjs" | "jsx" => c_style("javascript"),
        "ts" | "tsx" => c_style("typescript"),
        "java" => c_style("java"),
        "c" | "h" => c_style("c"),
        "cc" | "cpp" | "cxx" | "hpp" => c_style("cpp"),
        "cs" => c_style("csharp"),
        "go" => c_style("go"),
        "swift" => c_style("swift"),
        "kt" | "kts" => c_style("kotlin"),
        "scala" => c_style("scala"),
        "dart" => c_style("dart"),
        "php" => c_style("php"),
        "css" | "scss" | "less" => Lang::new("css", "", Some(BlockComment::new("/*", "*/", "*"))),
        "py" => hash_style("python"),
        "rb" => Lang::new("ruby", "#", Some(BlockComment::new("=begin", "=end", ""))),
        "sh" | "bash" | "zsh" => hash_style("shell"),
        "yml" | "yaml" => hash_style("yaml"),
        "toml" => hash_style("toml"),
        "pl" => hash_style("perl"),
        "r" => hash_style("r"),
        "ex" | "exs" => hash_style("elixir"),
        "sql" => Lang::new("sql", "--", Some(BlockComment::new("/*", "*/", "*"))),
        "lua" => Lang::new("lua", "--", Some(BlockComment::new("--[[", "]]", ""))),
        "hs" => Lang::new("haskell", "--", Some(BlockComment::new("{-", "-}", ""))),
        "html" | "htm" | "xml" | "vue" | "svelte" => {
            Lang::new("html", "", Some(BlockComment::new("<!--", "-->", "")))
        }
        _ => return None,
    };
    Some(lang)
}

/// Look up the descriptor for a path, consulting overrides first
pub fn for_path(path: &Path, overrides: &BTreeMap<String, Lang>) -> Option<Lang> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    if let Some(lang) = overrides.get(&extension) {
        let mut lang = lang.clone();
        if lang.name.is_empty() {
            lang.name = extension.clone();
        }
        return Some(lang);
    }
    builtin(&extension)
}
