//! Language Domain Module
//!
//! Source languages whose comments depviz knows how to scan for metadata.

use std::path::Path;

/// Supported source languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    Java,
    C,
    Cpp,
    Rust,
}

/// How a language embeds metadata blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `/** ... */` block comments ahead of the declaration.
    Block,
    /// Docstrings inside the function body.
    Docstring,
    /// `///` doc comments, read through the parsed AST.
    DocAttribute,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Python,
        Language::Java,
        Language::C,
        Language::Cpp,
        Language::Rust,
    ];

    /// Parse language from string (config / CLI input).
    pub fn from_str(s: &str) -> Option<Language> {
        match s.to_lowercase().as_str() {
            "python" | "py" => Some(Language::Python),
            "java" => Some(Language::Java),
            "c" => Some(Language::C),
            "cpp" | "c++" | "cxx" => Some(Language::Cpp),
            "rust" | "rs" => Some(Language::Rust),
            _ => None,
        }
    }

    /// Infer language from file extension.
    pub fn from_extension(ext: &str) -> Option<Language> {
        let ext = ext.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.extensions().contains(&ext.as_str()))
    }

    /// Infer language from a file path.
    pub fn from_path(path: &Path) -> Option<Language> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Get the display name of the language.
    pub fn name(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::Java => "Java",
            Language::C => "C",
            Language::Cpp => "C++",
            Language::Rust => "Rust",
        }
    }

    /// Get the file extensions for this language.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["py"],
            Language::Java => &["java"],
            Language::C => &["c", "h"],
            Language::Cpp => &["cpp", "cc", "cxx", "hpp", "hh"],
            Language::Rust => &["rs"],
        }
    }

    pub fn comment_style(&self) -> CommentStyle {
        match self {
            Language::Python => CommentStyle::Docstring,
            Language::Java | Language::C | Language::Cpp => CommentStyle::Block,
            Language::Rust => CommentStyle::DocAttribute,
        }
    }

    /// Resolve the configured language names, ignoring unknown ones.
    pub fn parse_list(names: &[String]) -> Vec<Language> {
        let mut langs: Vec<Language> = names.iter().filter_map(|n| Self::from_str(n)).collect();
        langs.dedup();
        langs
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!(Language::from_str("python"), Some(Language::Python));
        assert_eq!(Language::from_str("PY"), Some(Language::Python));
        assert_eq!(Language::from_str("cpp"), Some(Language::Cpp));
        assert_eq!(Language::from_str("c++"), Some(Language::Cpp));
        assert_eq!(Language::from_str("rust"), Some(Language::Rust));
        assert_eq!(Language::from_str("cobol"), None);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Language::from_path(Path::new("sample_code.java")), Some(Language::Java));
        assert_eq!(Language::from_path(Path::new("lib/util.H")), Some(Language::C));
        assert_eq!(Language::from_path(Path::new("src/main.rs")), Some(Language::Rust));
        assert_eq!(Language::from_path(Path::new("index.js")), None);
        assert_eq!(Language::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_comment_styles() {
        assert_eq!(Language::C.comment_style(), CommentStyle::Block);
        assert_eq!(Language::Python.comment_style(), CommentStyle::Docstring);
        assert_eq!(Language::Rust.comment_style(), CommentStyle::DocAttribute);
    }

    #[test]
    fn test_parse_list_skips_unknown() {
        let names = vec!["python".to_string(), "go".to_string(), "c".to_string()];
        assert_eq!(Language::parse_list(&names), vec![Language::Python, Language::C]);
    }
}
