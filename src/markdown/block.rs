use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Heading1,
    Heading2,
    Heading3,
    Paragraph,
    Checkbox,
    UnorderedList,
    OrderedList,
    Table,
}

impl BlockKind {
    /// Class suffix used by the renderer (`md-h1`, `md-list`, ...).
    pub fn class_name(&self) -> &'static str {
        match self {
            BlockKind::Heading1 => "md-h1",
            BlockKind::Heading2 => "md-h2",
            BlockKind::Heading3 => "md-h3",
            BlockKind::Paragraph => "md-paragraph",
            BlockKind::Checkbox => "md-checkbox",
            BlockKind::UnorderedList => "md-list",
            BlockKind::OrderedList => "md-orderedList",
            BlockKind::Table => "md-table",
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(
            self,
            BlockKind::Checkbox | BlockKind::UnorderedList | BlockKind::OrderedList
        )
    }
}

/// One line of the buffer split into its structural marker and the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockToken {
    pub kind: BlockKind,
    pub prefix: String,
    pub content: String,
}

// Order matters: the first pattern that matches wins.
static BLOCK_PATTERNS: LazyLock<Vec<(BlockKind, Regex)>> = LazyLock::new(|| {
    vec![
        (BlockKind::Table, Regex::new(r"^()(\|.*)$").unwrap()),
        (BlockKind::Heading3, Regex::new(r"^(### )(.*)").unwrap()),
        (BlockKind::Heading2, Regex::new(r"^(## )(.*)").unwrap()),
        (BlockKind::Heading1, Regex::new(r"^(# )(.*)").unwrap()),
        (
            BlockKind::Checkbox,
            Regex::new(r"^(\s*[-*] \[(?:x| )\] )(.*)").unwrap(),
        ),
        (BlockKind::OrderedList, Regex::new(r"^(\s*\d+\. )(.*)").unwrap()),
        (BlockKind::UnorderedList, Regex::new(r"^(\s*[-*] )(.*)").unwrap()),
    ]
});

pub fn parse_block_line(line: &str) -> BlockToken {
    for (kind, pattern) in BLOCK_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(line) {
            let prefix = caps.get(1).map_or("", |m| m.as_str());
            let content = caps.get(2).map_or("", |m| m.as_str());
            return BlockToken {
                kind: *kind,
                prefix: prefix.to_string(),
                content: content.to_string(),
            };
        }
    }
    BlockToken {
        kind: BlockKind::Paragraph,
        prefix: String::new(),
        content: line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings_most_specific_first() {
        let token = parse_block_line("### Title");
        assert_eq!(token.kind, BlockKind::Heading3);
        assert_eq!(token.prefix, "### ");
        assert_eq!(token.content, "Title");

        assert_eq!(parse_block_line("## Sub").kind, BlockKind::Heading2);
        assert_eq!(parse_block_line("# Top").kind, BlockKind::Heading1);
        assert_eq!(parse_block_line("#NoSpace").kind, BlockKind::Paragraph);
    }

    #[test]
    fn test_checkbox_before_bullet() {
        let token = parse_block_line("    - [x] done");
        assert_eq!(token.kind, BlockKind::Checkbox);
        assert_eq!(token.prefix, "    - [x] ");
        assert_eq!(token.content, "done");

        let bullet = parse_block_line("- [] not a checkbox");
        assert_eq!(bullet.kind, BlockKind::UnorderedList);
        assert_eq!(bullet.content, "[] not a checkbox");
    }

    #[test]
    fn test_ordered_and_table() {
        let ordered = parse_block_line("12. twelve");
        assert_eq!(ordered.kind, BlockKind::OrderedList);
        assert_eq!(ordered.prefix, "12. ");

        let table = parse_block_line("| a | b |");
        assert_eq!(table.kind, BlockKind::Table);
        assert_eq!(table.prefix, "");
        assert_eq!(table.content, "| a | b |");
    }

    #[test]
    fn test_parse_block_line_is_total() {
        for line in ["", " ", "    ", "\t", "-", "1.", "|", "#", "\u{200B}", "- ", "1. "] {
            let token = parse_block_line(line);
            assert_eq!(format!("{}{}", token.prefix, token.content), line);
        }
        assert_eq!(parse_block_line("").kind, BlockKind::Paragraph);
        assert_eq!(parse_block_line("- ").kind, BlockKind::UnorderedList);
    }
}
