//! Text key-value parser
//!
//! Handles the brace-delimited manifest format:
//!
//! ```text
//! "AppState"
//! {
//!     "appid"     "440"
//!     "name"      "Team Fortress 2"
//! }
//! ```
//!
//! The files are user-editable, so the parser never fails. Lines that are
//! neither a brace nor one or more quoted tokens are skipped.

/// A parsed value: either a plain string or a nested section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextValue {
    Str(String),
    Section(TextSection),
}

impl TextValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TextValue::Str(s) => Some(s),
            TextValue::Section(_) => None,
        }
    }

    pub fn as_section(&self) -> Option<&TextSection> {
        match self {
            TextValue::Section(s) => Some(s),
            TextValue::Str(_) => None,
        }
    }
}

/// Ordered key/value section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSection {
    entries: Vec<(String, TextValue)>,
}

impl TextSection {
    /// Assign `key`. A repeated key overwrites the earlier value but keeps
    /// its position.
    pub fn insert(&mut self, key: String, value: TextValue) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// ASCII case-insensitive lookup
    pub fn get(&self, key: &str) -> Option<&TextValue> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(TextValue::as_str)
    }

    pub fn get_section(&self, key: &str) -> Option<&TextSection> {
        self.get(key).and_then(TextValue::as_section)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TextValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a text key-value document into its root section
pub fn parse(input: &str) -> TextSection {
    let mut stack: Vec<(TextSection, String)> = Vec::new();
    let mut current = TextSection::default();
    let mut pending: Option<String> = None;

    for (lineno, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        if line == "{" {
            let key = pending.take().unwrap_or_default();
            stack.push((std::mem::take(&mut current), key));
            continue;
        }

        if line == "}" {
            match stack.pop() {
                Some((parent, key)) => {
                    let child = std::mem::replace(&mut current, parent);
                    current.insert(key, TextValue::Section(child));
                }
                None => tracing::trace!("line {}: unbalanced closing brace", lineno + 1),
            }
            pending = None;
            continue;
        }

        let tokens = quoted_tokens(line);
        match tokens.as_slice() {
            [] => {
                tracing::trace!("line {}: no quoted tokens, skipped", lineno + 1);
            }
            [key] => {
                current.insert(key.clone(), TextValue::Str(String::new()));
                if line.ends_with('{') {
                    stack.push((std::mem::take(&mut current), key.clone()));
                    pending = None;
                } else {
                    pending = Some(key.clone());
                }
            }
            [key, value, ..] => {
                current.insert(key.clone(), TextValue::Str(value.clone()));
                // A brace after a key/value line reopens that key as a section.
                pending = Some(key.clone());
            }
        }
    }

    // Attach sections left open by a truncated file.
    while let Some((parent, key)) = stack.pop() {
        let child = std::mem::replace(&mut current, parent);
        current.insert(key, TextValue::Section(child));
    }

    current
}

/// Extract the double-quoted tokens of a line, honouring `\\` and `\"`.
/// An unterminated trailing token is dropped.
fn quoted_tokens(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        if c == '/' && chars.as_str().starts_with('/') {
            break;
        }
        if c != '"' {
            continue;
        }

        let mut token = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
            match c {
                '"' => {
                    closed = true;
                    break;
                }
                '\\' => match chars.next() {
                    Some('n') => token.push('\n'),
                    Some('t') => token.push('\t'),
                    Some(other) => token.push(other),
                    None => break,
                },
                other => token.push(other),
            }
        }
        if !closed {
            break;
        }
        tokens.push(token);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_MANIFEST: &str = r#"
"AppState"
{
	"appid"		"440"
	"Universe"		"1"
	"name"		"Team Fortress 2"
	"installdir"		"Team Fortress 2"
	"SizeOnDisk"		"26623479808"
	"InstalledDepots"
	{
		"441"
		{
			"manifest"		"7707612755106451303"
		}
	}
}
"#;

    #[test]
    fn test_parse_app_manifest() {
        let root = parse(APP_MANIFEST);
        let state = root.get_section("AppState").unwrap();
        assert_eq!(state.get_str("appid"), Some("440"));
        assert_eq!(state.get_str("name"), Some("Team Fortress 2"));
        assert_eq!(state.get_str("SIZEONDISK"), Some("26623479808"));

        let depot = state
            .get_section("InstalledDepots")
            .and_then(|d| d.get_section("441"))
            .unwrap();
        assert_eq!(depot.get_str("manifest"), Some("7707612755106451303"));
    }

    #[test]
    fn test_comments_and_garbage_lines_skipped() {
        let input = r#"
// header comment
"root"
{
	this line is garbage
	"good"	"value"
	"broken	value
	"also"	"fine"	// trailing comment
}
"#;
        let root = parse(input);
        let section = root.get_section("root").unwrap();
        assert_eq!(section.get_str("good"), Some("value"));
        assert_eq!(section.get_str("also"), Some("fine"));
        assert_eq!(section.len(), 2);
    }

    #[test]
    fn test_escaped_backslashes_in_paths() {
        let input = r#""libraryfolders"
{
	"0"
	{
		"path"		"C:\\Program Files (x86)\\Steam"
	}
}"#;
        let root = parse(input);
        let path = root
            .get_section("libraryfolders")
            .and_then(|s| s.get_section("0"))
            .and_then(|s| s.get_str("path"));
        assert_eq!(path, Some(r"C:\Program Files (x86)\Steam"));
    }

    #[test]
    fn test_unbalanced_braces_tolerated() {
        let input = "}\n\"a\"\n{\n\"b\" \"c\"\n";
        let root = parse(input);
        assert_eq!(
            root.get_section("a").and_then(|s| s.get_str("b")),
            Some("c")
        );
    }

    #[test]
    fn test_key_with_inline_brace() {
        let input = "\"outer\" {\n\"k\" \"v\"\n}\n";
        let root = parse(input);
        assert_eq!(root.get_section("outer").and_then(|s| s.get_str("k")), Some("v"));
    }

    #[test]
    fn test_key_without_section_keeps_empty_value() {
        let root = parse("\"lonely\"\n\"next\" \"1\"\n");
        assert_eq!(root.get_str("lonely"), Some(""));
        assert_eq!(root.get_str("next"), Some("1"));
    }

    #[test]
    fn test_quoted_tokens() {
        assert_eq!(quoted_tokens(r#""a" "b""#), vec!["a", "b"]);
        assert_eq!(quoted_tokens(r#""a\"q" "b""#), vec!["a\"q", "b"]);
        assert_eq!(quoted_tokens(r#""a" "unterminated"#), vec!["a"]);
        assert!(quoted_tokens("no quotes").is_empty());
    }
}
