// Attaches source comments to declarations the way protoc does.
//
// The main grammar skips comments, so they are collected by a second pass
// (`Rule::comment_scan`) and matched against the token positions of the
// parse tree. Between two tokens, comments form blocks: consecutive `//`
// lines merge, each `/* */` stands alone. A block right after a `;` or `{`
// is the trailing comment of that declaration when it shares its line, or
// sits on the next line and is followed by a blank line or a `}`. The block
// ending just above a declaration is its leading comment, anything earlier
// in the gap is detached.

use pest::Parser as _;
use pest::iterators::Pair;

use crate::{Comments, ParseError, ProtoParser, Rule};

#[derive(Debug)]
struct RawComment {
    start: usize,
    end: usize,
    block: bool,
    text: String,
}

#[derive(Debug)]
struct Block {
    start_line: usize,
    end_line: usize,
    text: String,
}

pub(crate) struct CommentIndex<'s> {
    source: &'s str,
    line_starts: Vec<usize>,
    comments: Vec<RawComment>,
    token_starts: Vec<usize>,
    token_ends: Vec<usize>,
}

impl<'s> CommentIndex<'s> {
    pub(crate) fn new(source: &'s str, root: &Pair<'s, Rule>) -> Result<Self, ParseError> {
        let mut comments = Vec::new();
        for pair in ProtoParser::parse(Rule::comment_scan, source)?.flatten() {
            let block = match pair.as_rule() {
                Rule::line_comment => false,
                Rule::block_comment => true,
                _ => continue,
            };
            let span = pair.as_span();
            comments.push(RawComment {
                start: span.start(),
                end: span.end(),
                block,
                text: normalize(pair.as_str(), block),
            });
        }

        let mut token_starts = Vec::new();
        let mut token_ends = Vec::new();
        for pair in root.clone().into_inner().flatten() {
            if pair.as_rule() == Rule::EOI {
                continue;
            }
            let span = pair.as_span();
            token_starts.push(span.start());
            token_ends.push(span.end());
        }
        token_starts.sort_unstable();
        token_starts.dedup();
        token_ends.sort_unstable();
        token_ends.dedup();

        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Ok(Self {
            source,
            line_starts,
            comments,
            token_starts,
            token_ends,
        })
    }

    /// Comments for the declaration spanned by `pair`. Its header ends at the
    /// first `{` inside it, or at the end of the statement.
    pub(crate) fn attach_to(&self, pair: &Pair<'_, Rule>) -> Comments {
        let span = pair.as_span();
        let header_end = pair
            .clone()
            .into_inner()
            .flatten()
            .find(|p| p.as_rule() == Rule::open_brace)
            .map(|p| p.as_span().end())
            .unwrap_or(span.end());
        self.attach(span.start(), header_end)
    }

    fn attach(&self, start: usize, header_end: usize) -> Comments {
        let mut comments = Comments::default();

        let prev = self.prev_token_end(start);
        let mut before = self.blocks_between(prev.unwrap_or(0), start, prev);
        if let Some(p) = prev {
            let taken = self.trailing_len(p, &before, start);
            before.drain(..taken);
        }
        let start_line = self.line_of(start);
        if before.last().is_some_and(|b| b.end_line + 1 >= start_line)
            && let Some(leading) = before.pop()
        {
            comments.leading = leading.text;
        }
        comments.detached = before.into_iter().map(|b| b.text).collect();

        let next = self.next_token_start(header_end);
        let mut after = self.blocks_between(header_end, next, Some(header_end));
        if self.trailing_len(header_end, &after, next) == 1 {
            comments.trailing = after.swap_remove(0).text;
        }
        comments
    }

    /// Number of leading blocks (0 or 1) that trail the token ending at `anchor`.
    fn trailing_len(&self, anchor: usize, blocks: &[Block], next: usize) -> usize {
        if !self.ends_declaration(anchor) {
            return 0;
        }
        let Some(first) = blocks.first() else {
            return 0;
        };
        let anchor_line = self.line_of(anchor);
        if first.start_line == anchor_line {
            return 1;
        }
        if first.start_line != anchor_line + 1 {
            return 0;
        }
        let closes_scope = blocks.len() == 1
            && (next >= self.source.len() || self.source[next..].starts_with('}'));
        let next_line = match blocks.get(1) {
            Some(b) => b.start_line,
            None => self.line_of(next),
        };
        if closes_scope || next_line > first.end_line + 1 {
            1
        } else {
            0
        }
    }

    fn ends_declaration(&self, pos: usize) -> bool {
        let head = &self.source[..pos];
        head.ends_with(';') || head.ends_with('{')
    }

    fn prev_token_end(&self, pos: usize) -> Option<usize> {
        let i = self.token_ends.partition_point(|&e| e <= pos);
        i.checked_sub(1).map(|i| self.token_ends[i])
    }

    fn next_token_start(&self, pos: usize) -> usize {
        let i = self.token_starts.partition_point(|&s| s < pos);
        self.token_starts
            .get(i)
            .copied()
            .unwrap_or(self.source.len())
    }

    fn blocks_between(&self, from: usize, to: usize, anchor: Option<usize>) -> Vec<Block> {
        let anchor_line = anchor.map(|a| self.line_of(a));
        let mut blocks: Vec<Block> = Vec::new();
        let mut last_was_line = false;
        for c in self
            .comments
            .iter()
            .filter(|c| c.start >= from && c.end <= to)
        {
            let start_line = self.line_of(c.start);
            let end_line = self.line_of(c.end.saturating_sub(1));
            if let Some(prev) = blocks.last_mut()
                && last_was_line
                && !c.block
                && start_line == prev.end_line + 1
                && Some(prev.start_line) != anchor_line
            {
                prev.text.push('\n');
                prev.text.push_str(&c.text);
                prev.end_line = end_line;
                continue;
            }
            blocks.push(Block {
                start_line,
                end_line,
                text: c.text.clone(),
            });
            last_was_line = !c.block;
        }
        blocks
    }

    fn line_of(&self, pos: usize) -> usize {
        self.line_starts.partition_point(|&s| s <= pos) - 1
    }
}

/// Strips comment markers. `//` text keeps its leading space; block comments
/// lose the `*` gutter, trailing blanks on every line and their empty
/// first/last lines.
fn normalize(raw: &str, block: bool) -> String {
    if !block {
        let text = raw.strip_prefix("//").unwrap_or(raw);
        return text.trim_end_matches('\r').to_string();
    }
    let inner = raw
        .strip_prefix("/*")
        .and_then(|s| s.strip_suffix("*/"))
        .unwrap_or(raw);
    let mut lines: Vec<&str> = inner
        .split('\n')
        .enumerate()
        .map(|(i, line)| {
            let line = line.trim_end();
            if i == 0 {
                return line;
            }
            let trimmed = line.trim_start();
            trimmed.strip_prefix('*').unwrap_or(trimmed)
        })
        .collect();
    if lines.len() > 1 && lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    if lines.len() > 1 && lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use crate::parse_proto_str;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalizes_line_and_block_comments() {
        assert_eq!(super::normalize("// hello", false), " hello");
        assert_eq!(super::normalize("/* one */", true), " one");
        assert_eq!(
            super::normalize("/*  padded  \n * gutter   \n */", true),
            "  padded\n gutter"
        );
        assert_eq!(
            super::normalize("/*\n * first\n * second\n */", true),
            " first\n second"
        );
    }

    #[test]
    fn attaches_leading_trailing_and_detached() {
        let source = r#"
syntax = "proto3";

// Detached one.

/* Detached two. */

// Leading for Foo,
// second line.
message Foo {
  int32 a = 1; // Trailing for a.
  // Leading for b.
  int32 b = 2;
  int32 c = 3;
  // Trailing for c.

  int32 d = 4;
  // Trailing for d, before the brace.
}
"#;
        let file = parse_proto_str("a.proto", source).expect("parse failed");
        let foo = &file.messages[0];
        assert_eq!(
            foo.comments.detached,
            vec![" Detached one.".to_string(), " Detached two.".to_string()]
        );
        assert_eq!(foo.comments.leading, " Leading for Foo,\n second line.");
        assert_eq!(foo.comments.trailing, "");

        let field = |n: &str| foo.fields.iter().find(|f| f.name == n).unwrap();
        assert_eq!(field("a").comments.trailing, " Trailing for a.");
        assert_eq!(field("a").comments.leading, "");
        assert_eq!(field("b").comments.leading, " Leading for b.");
        assert_eq!(field("c").comments.trailing, " Trailing for c.");
        assert!(field("d").comments.leading.is_empty());
        assert!(field("d").comments.detached.is_empty());
        assert_eq!(field("d").comments.trailing, " Trailing for d, before the brace.");
    }

    #[test]
    fn block_trailing_after_open_brace_belongs_to_block() {
        let source = "enum E { // about E\n  A = 0; /* zero */\n  B = 1;\n}\n";
        let file = parse_proto_str("e.proto", source).expect("parse failed");
        let e = &file.enums[0];
        assert_eq!(e.comments.trailing, " about E");
        assert_eq!(e.values[0].comments.trailing, " zero");
        assert!(e.values[1].comments.is_empty());
    }

    #[test]
    fn comment_markers_inside_strings_are_ignored() {
        let source = "syntax = \"proto3\";\noption java_package = \"a//b/*c\";\nmessage M {}\n";
        let file = parse_proto_str("s.proto", source).expect("parse failed");
        assert!(file.messages[0].comments.is_empty());
    }

    #[test]
    fn syntax_and_package_comments() {
        let source = "// About syntax.\nsyntax = \"proto3\";\n\n// About package.\npackage p; // inline\n";
        let file = parse_proto_str("p.proto", source).expect("parse failed");
        assert_eq!(file.syntax_comments.leading, " About syntax.");
        assert_eq!(file.package_comments.leading, " About package.");
        assert_eq!(file.package_comments.trailing, " inline");
    }
}
