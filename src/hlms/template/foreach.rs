//! `@foreach( count, var [, start] ) ... @end` unrolling.
//!
//! The body is emitted once per `i` in `start..count` with every `@var`
//! replaced by `i`. Outer loops substitute before inner loops are unrolled,
//! so an inner loop may use the outer variable as its count.

use std::fmt::Write as _;

use crate::errors::TemplateError;
use crate::hlms::property::PropertySet;

use super::scan::{find_block_end, find_directive, is_ident_byte, is_identifier, parse_args, syntax};

/// Upper bound on the iterations of a single loop.
const MAX_ITERATIONS: i32 = 4096;
/// Upper bound on the unrolled text of one loop, nested loops included.
const MAX_UNROLLED_BYTES: usize = 16 << 20;

fn count_value(arg: &str, props: &PropertySet) -> i32 {
    arg.parse::<i32>().unwrap_or_else(|_| props.get(arg))
}

/// Replaces every `@var` that is not the prefix of a longer name.
fn substitute(body: &str, var: &str, value: i32) -> String {
    let bytes = body.as_bytes();
    let mut out = String::with_capacity(body.len());
    let mut pos = 0;

    while let Some(rel) = body[pos..].find('@') {
        let at = pos + rel;
        let name_end = at + 1 + var.len();
        let matches = body[at + 1..].starts_with(var)
            && bytes.get(name_end).is_none_or(|&b| !is_ident_byte(b));
        if matches {
            out.push_str(&body[pos..at]);
            let _ = write!(out, "{value}");
            pos = name_end;
        } else {
            out.push_str(&body[pos..=at]);
            pos = at + 1;
        }
    }

    out.push_str(&body[pos..]);
    out
}

pub(super) fn parse_foreach(input: &str, props: &PropertySet) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;

    while let Some(d) = find_directive(input, pos, &["foreach"]) {
        out.push_str(&input[pos..d.start]);

        let args = parse_args(input, d.name_end, "foreach")?;
        let (count, var, start) = match args.split().as_slice() {
            [count, var] => (count_value(count, props), *var, 0),
            [count, var, start] => (count_value(count, props), *var, count_value(start, props)),
            _ => return Err(syntax("foreach", "expects 2 or 3 arguments", input, d.start)),
        };
        if !is_identifier(var) {
            return Err(syntax("foreach", "loop variable must be a name", input, d.start));
        }

        let block = find_block_end(input, args.end, "foreach", d.start)?;
        if block.else_at.is_some() {
            return Err(syntax("foreach", "@else is only valid inside @property", input, d.start));
        }

        let iterations = count.saturating_sub(start);
        if iterations > MAX_ITERATIONS {
            return Err(syntax(
                "foreach",
                format!("{iterations} iterations exceed the limit of {MAX_ITERATIONS}"),
                input,
                d.start,
            ));
        }

        let body = &input[args.end..block.body_end];
        let loop_start = out.len();
        for i in start..count {
            let unrolled = substitute(body, var, i);
            out.push_str(&parse_foreach(&unrolled, props)?);
            if out.len() - loop_start > MAX_UNROLLED_BYTES {
                return Err(syntax("foreach", "unrolled text is too large", input, d.start));
            }
        }

        pos = block.end;
    }

    out.push_str(&input[pos..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrolls_with_index() {
        let props = PropertySet::new();
        let out = parse_foreach("@foreach( 3, n )[@n]@end", &props).unwrap();
        assert_eq!(out, "[0][1][2]");
    }

    #[test]
    fn count_and_start_from_properties() {
        let props: PropertySet = [("num_slots", 4), ("first", 2)].into_iter().collect();
        let out = parse_foreach("@foreach( num_slots, i, first )t@i @end", &props).unwrap();
        assert_eq!(out, "t2 t3 ");
    }

    #[test]
    fn longer_names_are_not_substituted() {
        let props = PropertySet::new();
        let out = parse_foreach("@foreach( 1, n )@n @nope @n_x@end", &props).unwrap();
        assert_eq!(out, "0 @nope @n_x");
    }

    #[test]
    fn nested_loops_see_outer_variable() {
        let props = PropertySet::new();
        let out = parse_foreach("@foreach( 2, i )@foreach( 2, j )@i@j,@end@end", &props).unwrap();
        assert_eq!(out, "00,01,10,11,");
    }

    #[test]
    fn nested_property_blocks_are_preserved() {
        let props = PropertySet::new();
        let out = parse_foreach("@foreach( 2, i )@property( a )x@end@end", &props).unwrap();
        assert_eq!(out, "@property( a )x@end@property( a )x@end");
    }

    #[test]
    fn zero_or_negative_count_emits_nothing() {
        let props: PropertySet = [("neg", -3)].into_iter().collect();
        assert_eq!(parse_foreach("a@foreach( neg, i )x@end|b", &props).unwrap(), "a|b");
        assert_eq!(parse_foreach("a@foreach( 0, i )x@end|b", &props).unwrap(), "a|b");
    }

    #[test]
    fn iteration_limit() {
        let props: PropertySet = [("huge", i32::MAX)].into_iter().collect();
        let err = parse_foreach("@foreach( huge, i )x@end", &props).unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { directive: "foreach", .. }));

        let at_limit = format!("@foreach( {MAX_ITERATIONS}, i )x@end");
        assert_eq!(parse_foreach(&at_limit, &props).unwrap().len(), MAX_ITERATIONS as usize);
    }

    #[test]
    fn nested_loops_are_bounded_by_size() {
        let props = PropertySet::new();
        let src = format!(
            "@foreach( {m}, a )@foreach( {m}, b )0123456789@end@end",
            m = MAX_ITERATIONS
        );
        assert!(parse_foreach(&src, &props).is_err());
    }
}
