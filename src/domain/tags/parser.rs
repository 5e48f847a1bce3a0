//! Inline tag parser.
//!
//! Splits a message into tag tokens and plain text. Lines are classified
//! by their first non-whitespace character: a line beginning with `#` is
//! a tag line, everything else is plain text. Within a tag line, tokens
//! are scanned as `#<name> <value>` where the value extends until the
//! next ` #` followed by a lowercase letter. The lowercase requirement
//! keeps references like `#123` inside values while still terminating at
//! the next real tag; text that legitimately contains ` #` plus a
//! lowercase letter inside a value is a known limitation of this
//! grammar.

use super::registry;

/// One `#key value` token extracted from a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTag {
    pub key: String,
    pub value: String,
}

/// Outcome of parsing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Registered tags in the order they appeared.
    pub tags: Vec<ParsedTag>,
    /// The message minus its tag lines, original line breaks preserved,
    /// trimmed at both ends.
    pub plain_text: String,
}

/// Parses a message into tags and plain text.
pub fn parse(text: &str) -> ParsedMessage {
    let mut tags = Vec::new();
    let mut plain_lines = Vec::new();

    for line in text.split('\n') {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            scan_tag_line(trimmed, &mut tags);
        } else {
            plain_lines.push(line);
        }
    }

    ParsedMessage {
        tags,
        plain_text: plain_lines.join("\n").trim().to_string(),
    }
}

/// Scans one tag line for `#<name> <value>` tokens.
///
/// Tokens with unregistered names are discarded silently, value
/// included.
fn scan_tag_line(line: &str, tags: &mut Vec<ParsedTag>) {
    // Invariant: `rest` always starts with '#'.
    let mut rest = line;

    loop {
        let after_hash = &rest[1..];
        let name_len = after_hash
            .bytes()
            .take_while(|b| b.is_ascii_lowercase() || *b == b'_')
            .count();
        let name = &after_hash[..name_len];
        let after_name = &after_hash[name_len..];

        let value_end = find_value_end(after_name);
        let value = after_name[..value_end].trim();

        if registry::is_registered(name) {
            tags.push(ParsedTag {
                key: name.to_string(),
                value: value.to_string(),
            });
        }

        if value_end >= after_name.len() {
            break;
        }
        // Skip the separating space; the next byte is the '#' of the
        // following token.
        rest = &after_name[value_end + 1..];
    }
}

/// Index where the current value ends: the position of a space followed
/// by `#` and a lowercase letter, or the end of the string.
fn find_value_end(s: &str) -> usize {
    let bytes = s.as_bytes();
    if bytes.len() >= 3 {
        for i in 0..bytes.len() - 2 {
            if bytes[i] == b' ' && bytes[i + 1] == b'#' && bytes[i + 2].is_ascii_lowercase() {
                return i;
            }
        }
    }
    s.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(key: &str, value: &str) -> ParsedTag {
        ParsedTag {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn single_tag_with_value() {
        let parsed = parse("#task Implement OAuth");
        assert_eq!(parsed.tags, vec![tag("task", "Implement OAuth")]);
        assert_eq!(parsed.plain_text, "");
    }

    #[test]
    fn two_tags_on_one_line() {
        let parsed = parse("#status Done #assignee @alex");
        assert_eq!(
            parsed.tags,
            vec![tag("status", "Done"), tag("assignee", "@alex")]
        );
    }

    #[test]
    fn tag_lines_between_plain_text_lines() {
        let parsed = parse("Finished work\n#status Done #assignee @alex\nmore text");
        assert_eq!(parsed.plain_text, "Finished work\nmore text");
        assert_eq!(
            parsed.tags,
            vec![tag("status", "Done"), tag("assignee", "@alex")]
        );
    }

    #[test]
    fn numeric_references_stay_inside_values() {
        let parsed = parse("#task Fix crash in #123 handler");
        assert_eq!(parsed.tags, vec![tag("task", "Fix crash in #123 handler")]);
    }

    #[test]
    fn value_stops_at_next_lowercase_tag() {
        let parsed = parse("#task Fix the parser #priority High");
        assert_eq!(
            parsed.tags,
            vec![tag("task", "Fix the parser"), tag("priority", "High")]
        );
    }

    #[test]
    fn tag_without_value_yields_empty_value() {
        let parsed = parse("#assignee");
        assert_eq!(parsed.tags, vec![tag("assignee", "")]);
    }

    #[test]
    fn unknown_tags_are_discarded_silently() {
        let parsed = parse("#label backend #status Done");
        assert_eq!(parsed.tags, vec![tag("status", "Done")]);
    }

    #[test]
    fn unknown_tag_line_leaves_no_plain_text() {
        let parsed = parse("#label backend");
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.plain_text, "");
    }

    #[test]
    fn leading_whitespace_on_tag_lines_is_ignored() {
        let parsed = parse("   #status Done");
        assert_eq!(parsed.tags, vec![tag("status", "Done")]);
    }

    #[test]
    fn plain_text_preserves_inner_breaks_and_trims_ends() {
        let parsed = parse("\nfirst line\n\nsecond line\n");
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.plain_text, "first line\n\nsecond line");
    }

    #[test]
    fn hash_inside_plain_text_is_not_a_tag() {
        let parsed = parse("see ticket #42 for details");
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.plain_text, "see ticket #42 for details");
    }

    #[test]
    fn tag_order_is_preserved_across_lines() {
        let parsed = parse("#task Build it\n#priority High\n#due 2026-03-01");
        let keys: Vec<&str> = parsed.tags.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["task", "priority", "due"]);
    }

    #[test]
    fn round_trip_of_tag_lines_plus_plain_text() {
        let input = "#task Ship the release #priority High\nnotes for later";
        let parsed = parse(input);
        assert_eq!(
            parsed.tags,
            vec![tag("task", "Ship the release"), tag("priority", "High")]
        );
        assert_eq!(parsed.plain_text, "notes for later");
    }
}
