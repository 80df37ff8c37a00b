//! `@property( expr ) ... [@else ...] @end` conditional blocks.

use crate::errors::TemplateError;
use crate::hlms::property::PropertySet;

use super::expr;
use super::scan::{find_block_end, find_directive, parse_args, syntax};

pub(super) fn parse_properties(input: &str, props: &PropertySet) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;

    while let Some(d) = find_directive(input, pos, &["property"]) {
        out.push_str(&input[pos..d.start]);

        let args = parse_args(input, d.name_end, "property")?;
        let condition = expr::evaluate(args.inner, props)
            .map_err(|reason| syntax("property", reason, input, d.start))?;
        let block = find_block_end(input, args.end, "property", d.start)?;

        let taken = match (condition, block.else_at) {
            (true, _) => &input[args.end..block.then_end()],
            (false, Some((_, else_end))) => &input[else_end..block.body_end],
            (false, None) => "",
        };
        out.push_str(&parse_properties(taken, props)?);

        pos = block.end;
    }

    out.push_str(&input[pos..]);
    Ok(out)
}
