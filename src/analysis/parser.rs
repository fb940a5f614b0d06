//! Parsing of free-text completion responses.
//!
//! The parser is total: any input produces a result, malformed input only
//! degrades it (default language, empty code, empty explanation).

use std::sync::LazyLock;

use regex::Regex;

use crate::error::AnalysisError;

/// Language reported when the response names none.
pub const DEFAULT_LANGUAGE: &str = "text";

/// Extension used for unknown languages.
pub const DEFAULT_EXTENSION: &str = ".txt";

/// Explanation substituted when the completion service fails.
pub const DEGRADED_EXPLANATION: &str = "Unable to analyze commit";

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static LANGUAGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Language:\s*([A-Za-z0-9_+#]+)").unwrap());

// A fence opens with an optional word-like tag and a line break, so backticks
// quoted in prose are not mistaken for a block.
#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static FIRST_CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[\w+#.-]*[ \t]*\r?\n(.*?)```").unwrap());

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static ANY_CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[\w+#.-]*[ \t]*\r?\n.*?```").unwrap());

/// Structured verdict for one changed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    /// Lowercased language name, `"text"` when none was detected.
    pub detected_language: String,
    /// Inner text of the first fenced code block, possibly empty.
    pub corrected_code: String,
    /// Response prose with code blocks removed.
    pub explanation: String,
    /// Extension derived from the language, `".txt"` when unknown.
    pub extension: String,
}

impl AnalysisResult {
    /// Fallback result used when the completion service fails.
    pub fn degraded() -> Self {
        Self {
            detected_language: DEFAULT_LANGUAGE.to_string(),
            corrected_code: String::new(),
            explanation: DEGRADED_EXPLANATION.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Parses a successful response or degrades a failed one.
    pub fn from_outcome(outcome: Result<String, AnalysisError>) -> Self {
        match outcome {
            Ok(raw) => parse_response(&raw),
            Err(_) => Self::degraded(),
        }
    }
}

/// Maps a language name to a file extension.
pub fn extension_for_language(language: &str) -> &'static str {
    match language.to_ascii_lowercase().as_str() {
        "javascript" => ".js",
        "python" => ".py",
        "java" => ".java",
        "c++" => ".cpp",
        "typescript" => ".ts",
        "html" => ".html",
        "css" => ".css",
        _ => DEFAULT_EXTENSION,
    }
}

/// Extracts language, corrected code and explanation from a response.
pub fn parse_response(raw: &str) -> AnalysisResult {
    let detected_language = LANGUAGE_PATTERN
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map_or_else(
            || DEFAULT_LANGUAGE.to_string(),
            |m| m.as_str().to_ascii_lowercase(),
        );

    let corrected_code = FIRST_CODE_BLOCK
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let explanation = ANY_CODE_BLOCK.replace_all(raw, "").trim().to_string();

    AnalysisResult {
        extension: extension_for_language(&detected_language).to_string(),
        detected_language,
        corrected_code,
        explanation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn python_response_with_code_block() {
        let raw = "Language: Python\n\nThe loop is off by one.\n\n```python\nfor i in range(len(xs)):\n    print(xs[i])\n```\n\nUse range(len(xs)).";
        let result = parse_response(raw);

        assert_eq!(result.detected_language, "python");
        assert_eq!(result.extension, ".py");
        assert_eq!(
            result.corrected_code,
            "for i in range(len(xs)):\n    print(xs[i])\n"
        );
        assert_eq!(
            result.explanation,
            "Language: Python\n\nThe loop is off by one.\n\n\n\nUse range(len(xs))."
        );
    }

    #[test]
    fn no_code_block_keeps_full_text_as_explanation() {
        let raw = "  \nLooks good to me, nothing to change.\n\n";
        let result = parse_response(raw);

        assert_eq!(result.corrected_code, "");
        assert_eq!(result.explanation, "Looks good to me, nothing to change.");
        assert_eq!(result.detected_language, "text");
        assert_eq!(result.extension, ".txt");
    }

    #[test]
    fn only_first_block_is_code_but_all_blocks_are_removed() {
        let raw = "language: javascript\n```js\nconst a = 1;\n```\nand\n```\nconst b = 2;\n```\ndone";
        let result = parse_response(raw);

        assert_eq!(result.extension, ".js");
        assert_eq!(result.corrected_code, "const a = 1;\n");
        assert_eq!(result.explanation, "language: javascript\n\nand\n\ndone");
    }

    #[test]
    fn cpp_is_recognised() {
        let result = parse_response("Language: C++\n```cpp\nint main() {}\n```");
        assert_eq!(result.detected_language, "c++");
        assert_eq!(result.extension, ".cpp");
    }

    #[test]
    fn unknown_language_falls_back_to_txt() {
        let result = parse_response("Language: Rust\nfine");
        assert_eq!(result.detected_language, "rust");
        assert_eq!(result.extension, ".txt");
    }

    #[test]
    fn unterminated_fence_is_not_code() {
        let result = parse_response("```python\nprint(1)\n");
        assert_eq!(result.corrected_code, "");
        assert_eq!(result.explanation, "```python\nprint(1)");
    }

    #[test]
    fn backticks_in_prose_do_not_open_a_block() {
        let raw = "Language: Python\nWrap code in ``` fences.\n```python\nprint(1)\n```\n";
        let result = parse_response(raw);

        assert_eq!(result.corrected_code, "print(1)\n");
        assert_eq!(result.extension, ".py");
        assert_eq!(result.explanation, "Language: Python\nWrap code in ``` fences.");
    }

    #[test]
    fn crlf_fence_is_recognised() {
        let result = parse_response("```js\r\nlet a;\r\n```");
        assert_eq!(result.corrected_code, "let a;\r\n");
        assert_eq!(result.explanation, "");
    }

    #[test]
    fn extension_table() {
        for (language, ext) in [
            ("javascript", ".js"),
            ("Python", ".py"),
            ("JAVA", ".java"),
            ("c++", ".cpp"),
            ("typescript", ".ts"),
            ("html", ".html"),
            ("css", ".css"),
            ("go", ".txt"),
            ("", ".txt"),
        ] {
            assert_eq!(extension_for_language(language), ext, "{language}");
        }
    }

    #[test]
    fn failed_outcome_degrades() {
        let result =
            AnalysisResult::from_outcome(Err(AnalysisError::Request("HTTP 500".to_string())));
        assert_eq!(result.explanation, "Unable to analyze commit");
        assert_eq!(result.extension, ".txt");
        assert_eq!(result.corrected_code, "");
        assert_eq!(result, AnalysisResult::degraded());
    }

    proptest! {
        #[test]
        fn parser_is_total(raw in ".*") {
            let result = parse_response(&raw);
            prop_assert!(!result.extension.is_empty());
            prop_assert!(!result.detected_language.is_empty());
            prop_assert_eq!(result.explanation.trim(), result.explanation.as_str());
        }

        #[test]
        fn text_without_fences_is_its_own_explanation(raw in "[^`]*") {
            let result = parse_response(&raw);
            prop_assert_eq!(result.corrected_code, "");
            prop_assert_eq!(result.explanation, raw.trim());
        }
    }
}
