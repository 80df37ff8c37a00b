//! Lexical helpers shared by the preprocessor stages.
//!
//! Directives are `@name` followed, for most of them, by a parenthesised
//! argument list. Blocks opened by `@property`, `@foreach` and `@piece` are
//! closed by `@end` and may nest.

use crate::errors::TemplateError;

const OPENERS: [&str; 3] = ["property", "foreach", "piece"];
const BLOCK_KEYWORDS: [&str; 5] = ["property", "foreach", "piece", "else", "end"];

#[inline]
pub(super) fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Returns whether `s` is a non-empty identifier.
pub(super) fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_ident_byte)
}

/// One `@keyword` occurrence.
#[derive(Debug, Clone, Copy)]
pub(super) struct Directive<'k> {
    pub keyword: &'k str,
    /// Offset of the `@`.
    pub start: usize,
    /// Offset right after the keyword.
    pub name_end: usize,
}

/// Finds the next directive at or after `from` whose full name is one of `keywords`.
pub(super) fn find_directive<'k>(
    text: &str,
    from: usize,
    keywords: &[&'k str],
) -> Option<Directive<'k>> {
    let bytes = text.as_bytes();
    let mut pos = from;
    while let Some(rel) = text[pos..].find('@') {
        let at = pos + rel;
        let mut end = at + 1;
        while end < bytes.len() && is_ident_byte(bytes[end]) {
            end += 1;
        }
        let ident = &text[at + 1..end];
        if let Some(&keyword) = keywords.iter().find(|&&k| k == ident) {
            return Some(Directive {
                keyword,
                start: at,
                name_end: end,
            });
        }
        pos = at + 1;
    }
    None
}

/// Counts every directive named in `keywords`.
pub(super) fn count_directives(text: &str, keywords: &[&str]) -> usize {
    let mut count = 0;
    let mut pos = 0;
    while let Some(d) = find_directive(text, pos, keywords) {
        count += 1;
        pos = d.name_end;
    }
    count
}

/// The parenthesised argument list of a directive.
#[derive(Debug, Clone, Copy)]
pub(super) struct Args<'a> {
    /// Text between the parentheses.
    pub inner: &'a str,
    /// Offset right after the closing parenthesis.
    pub end: usize,
}

impl<'a> Args<'a> {
    /// Comma separated, trimmed arguments.
    pub fn split(&self) -> Vec<&'a str> {
        if self.inner.trim().is_empty() {
            return Vec::new();
        }
        self.inner.split(',').map(str::trim).collect()
    }
}

fn opens_paren(text: &str, after_name: usize) -> bool {
    text[after_name..]
        .trim_start_matches([' ', '\t'])
        .starts_with('(')
}

/// Parses `( ... )` right after a directive name, honouring nested parentheses.
pub(super) fn parse_args<'a>(
    text: &'a str,
    after_name: usize,
    directive: &'static str,
) -> Result<Args<'a>, TemplateError> {
    let bytes = text.as_bytes();
    let mut open = after_name;
    while open < bytes.len() && (bytes[open] == b' ' || bytes[open] == b'\t') {
        open += 1;
    }
    if open >= bytes.len() || bytes[open] != b'(' {
        return Err(syntax(directive, "expected '('", text, after_name));
    }

    let mut depth = 0usize;
    for (i, &b) in bytes[open..].iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    let close = open + i;
                    return Ok(Args {
                        inner: &text[open + 1..close],
                        end: close + 1,
                    });
                }
            }
            _ => {}
        }
    }
    Err(syntax(directive, "unbalanced parentheses", text, open))
}

/// Parses an argument list that must hold exactly one identifier.
pub(super) fn parse_single_name<'a>(
    text: &'a str,
    after_name: usize,
    directive: &'static str,
) -> Result<(&'a str, usize), TemplateError> {
    let args = parse_args(text, after_name, directive)?;
    let name = args.inner.trim();
    if !is_identifier(name) {
        return Err(syntax(directive, "expected a single name", text, after_name));
    }
    Ok((name, args.end))
}

/// Location of the `@end` (and optional `@else`) closing a block.
#[derive(Debug, Clone, Copy)]
pub(super) struct Block {
    /// Offset of the `@else` or `@end` ending the first branch.
    pub body_end: usize,
    /// `(start, end)` of a top-level `@else`, if any.
    pub else_at: Option<(usize, usize)>,
    /// Offset right after `@end`.
    pub end: usize,
}

impl Block {
    /// Offset where the first branch stops.
    #[inline]
    pub fn then_end(&self) -> usize {
        self.else_at.map_or(self.body_end, |(start, _)| start)
    }
}

/// Finds the `@end` matching a block whose body starts at `from`.
pub(super) fn find_block_end(
    text: &str,
    from: usize,
    directive: &'static str,
    open_at: usize,
) -> Result<Block, TemplateError> {
    let mut depth = 0usize;
    let mut else_at = None;
    let mut pos = from;

    while let Some(d) = find_directive(text, pos, &BLOCK_KEYWORDS) {
        match d.keyword {
            "end" => {
                if depth == 0 {
                    return Ok(Block {
                        body_end: d.start,
                        else_at,
                        end: d.name_end,
                    });
                }
                depth -= 1;
            }
            "else" if depth == 0 => {
                if else_at.is_some() {
                    return Err(syntax(directive, "duplicate @else", text, d.start));
                }
                else_at = Some((d.start, d.name_end));
            }
            "else" => {}
            opener => {
                debug_assert!(OPENERS.contains(&opener));
                if opens_paren(text, d.name_end) {
                    depth += 1;
                }
            }
        }
        pos = d.name_end;
    }

    Err(syntax(directive, "missing @end", text, open_at))
}

/// Builds a syntax error with a short excerpt of `text` starting at `at`.
pub(super) fn syntax(
    directive: &'static str,
    reason: impl Into<String>,
    text: &str,
    at: usize,
) -> TemplateError {
    let at = at.min(text.len());
    let excerpt = text
        .get(at..)
        .unwrap_or_default()
        .chars()
        .take(40)
        .collect::<String>();
    TemplateError::Syntax {
        directive,
        reason: reason.into(),
        excerpt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_whole_keywords_only() {
        let text = "@insertpiece( a ) @piece( b )";
        let d = find_directive(text, 0, &["piece"]).unwrap();
        assert_eq!(d.start, 18);
        assert_eq!(&text[d.start..d.name_end], "@piece");
    }

    #[test]
    fn args_honour_nesting() {
        let text = "@property( (a && b) || c ) x";
        let args = parse_args(text, 9, "property").unwrap();
        assert_eq!(args.inner, " (a && b) || c ");
        assert_eq!(&text[args.end..], " x");
    }

    #[test]
    fn unbalanced_args_are_errors() {
        assert!(parse_args("@pset( a, 1", 5, "pset").is_err());
        assert!(parse_args("@pset a, 1)", 5, "pset").is_err());
    }

    #[test]
    fn block_end_skips_nested_blocks() {
        let text = "@property( a ) x @property( b ) y @end z @else w @end tail";
        let args = parse_args(text, 9, "property").unwrap();
        let block = find_block_end(text, args.end, "property", 0).unwrap();
        assert_eq!(&text[args.end..block.then_end()], " x @property( b ) y @end z ");
        let (_, else_end) = block.else_at.unwrap();
        assert_eq!(&text[else_end..block.body_end], " w ");
        assert_eq!(&text[block.end..], " tail");
    }

    #[test]
    fn missing_end_is_error() {
        let err = find_block_end(" body", 0, "foreach", 0).unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { directive: "foreach", .. }));
    }
}
