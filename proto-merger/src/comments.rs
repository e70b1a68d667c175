use std::borrow::Cow;

use parser::Comments;

/// Prefixes every non-empty line with `width` spaces.
pub(crate) fn indent(s: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    s.split('\n')
        .map(|line| {
            if line.is_empty() {
                Cow::Borrowed(line)
            } else {
                Cow::Owned(format!("{pad}{line}"))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wraps a rendered declaration with its comments.
///
/// `decl` is already indented by `width`. Detached blocks come first, each
/// followed by a blank line, then the leading block; a trailing comment
/// replaces the final newline of `decl`.
pub(crate) fn with_comments(decl: &str, comments: &Comments, width: usize) -> String {
    let mut out = String::new();
    for block in &comments.detached {
        out.push_str(&indent(
            &format!("/*\n{}\n  */\n\n", indent(&escape(block), 2)),
            width,
        ));
    }
    if !comments.leading.is_empty() {
        out.push_str(&indent(
            &format!("\n/*\n{}\n  */\n", indent(&escape(&comments.leading), 2)),
            width,
        ));
    }
    out.push_str(decl.strip_suffix('\n').unwrap_or(decl));
    let trailing = comments.trailing.trim();
    if trailing.is_empty() {
        out.push('\n');
    } else {
        out.push_str(&format!(" /* {} */\n", escape(trailing)));
    }
    out
}

// A `*/` inside the text would close the emitted comment early.
fn escape(text: &str) -> Cow<'_, str> {
    if text.contains("*/") {
        Cow::Owned(text.replace("*/", "* /"))
    } else {
        Cow::Borrowed(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn indent_skips_empty_lines() {
        assert_eq!(indent("a\n\nb\n", 4), "    a\n\n    b\n");
    }

    #[test]
    fn declaration_without_comments_is_unchanged() {
        let out = with_comments("    int32 a = 1;\n", &Comments::default(), 4);
        assert_eq!(out, "    int32 a = 1;\n");
    }

    #[test]
    fn renders_detached_leading_and_trailing() {
        let comments = Comments {
            detached: vec![" first".into(), " second".into()],
            leading: " about a\n more".into(),
            trailing: " after a ".into(),
        };
        let out = with_comments("    int32 a = 1;\n", &comments, 4);
        let expected = concat!(
            "    /*\n",
            "       first\n",
            "      */\n",
            "\n",
            "    /*\n",
            "       second\n",
            "      */\n",
            "\n",
            "\n",
            "    /*\n",
            "       about a\n",
            "       more\n",
            "      */\n",
            "    int32 a = 1; /* after a */\n",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn trailing_goes_on_the_last_line_of_a_block() {
        let comments = Comments {
            trailing: " done".into(),
            ..Default::default()
        };
        let out = with_comments("message A {\n}\n", &comments, 0);
        assert_eq!(out, "message A {\n} /* done */\n");
    }

    #[test]
    fn comment_terminators_are_broken_up() {
        let comments = Comments {
            leading: " see a*/b".into(),
            ..Default::default()
        };
        let out = with_comments("enum E {\n}\n", &comments, 0);
        assert_eq!(out, "\n/*\n   see a* /b\n  */\nenum E {\n}\n");
    }
}
