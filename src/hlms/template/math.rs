//! Property arithmetic and counters.
//!
//! Two stages share the same operations:
//!
//! - the **math** stage runs first and understands `@pset`, `@padd`, `@psub`,
//!   `@pmul`, `@pdiv`, `@pmod`, `@pmin` and `@pmax`;
//! - the **counter** stage runs last and understands `@set`, `@add`, ...,
//!   plus `@counter( p )` (emit then increment) and `@value( p )` (emit).
//!
//! `@add( p, a )` means `p = p + a`; `@add( p, a, b )` means `p = a + b`.
//! Arguments are integer literals or property names.

use crate::errors::TemplateError;
use crate::hlms::property::PropertySet;

use super::scan::{find_directive, is_identifier, parse_args, syntax};

const MATH_KEYWORDS: [&str; 8] = [
    "pset", "padd", "psub", "pmul", "pdiv", "pmod", "pmin", "pmax",
];

const COUNTER_KEYWORDS: [&str; 10] = [
    "counter", "value", "set", "add", "sub", "mul", "div", "mod", "min", "max",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MathOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Min,
    Max,
}

impl MathOp {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "set" => Self::Set,
            "add" => Self::Add,
            "sub" => Self::Sub,
            "mul" => Self::Mul,
            "div" => Self::Div,
            "mod" => Self::Mod,
            "min" => Self::Min,
            "max" => Self::Max,
            _ => return None,
        })
    }
}

fn arg_value(arg: &str, props: &PropertySet) -> i32 {
    arg.parse::<i32>().unwrap_or_else(|_| props.get(arg))
}

fn apply(
    op: MathOp,
    directive: &'static str,
    args: &[&str],
    props: &mut PropertySet,
    text: &str,
    at: usize,
) -> Result<(), TemplateError> {
    let Some(&dst) = args.first().filter(|dst| is_identifier(dst)) else {
        return Err(syntax(directive, "first argument must be a property name", text, at));
    };

    let (lhs, rhs) = match (op, args) {
        (MathOp::Set, [_, value]) => {
            let value = arg_value(value, props);
            props.set(dst, value);
            return Ok(());
        }
        (MathOp::Set, _) => return Err(syntax(directive, "expects 2 arguments", text, at)),
        (_, [_, rhs]) => (props.get(dst), arg_value(rhs, props)),
        (_, [_, lhs, rhs]) => (arg_value(lhs, props), arg_value(rhs, props)),
        _ => return Err(syntax(directive, "expects 2 or 3 arguments", text, at)),
    };

    let value = match op {
        MathOp::Add => lhs.wrapping_add(rhs),
        MathOp::Sub => lhs.wrapping_sub(rhs),
        MathOp::Mul => lhs.wrapping_mul(rhs),
        MathOp::Div | MathOp::Mod if rhs == 0 => {
            return Err(syntax(directive, "division by zero", text, at));
        }
        MathOp::Div => lhs.wrapping_div(rhs),
        MathOp::Mod => lhs.wrapping_rem(rhs),
        MathOp::Min => lhs.min(rhs),
        MathOp::Max => lhs.max(rhs),
        MathOp::Set => unreachable!("handled above"),
    };
    props.set(dst, value);
    Ok(())
}

/// Math stage: applies `@p*` operations to `props` and strips them from the text.
pub(super) fn parse_math(input: &str, props: &mut PropertySet) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;

    while let Some(d) = find_directive(input, pos, &MATH_KEYWORDS) {
        out.push_str(&input[pos..d.start]);
        let args = parse_args(input, d.name_end, d.keyword)?;
        let op = MathOp::from_name(&d.keyword[1..])
            .ok_or_else(|| syntax(d.keyword, "unknown operation", input, d.start))?;
        apply(op, d.keyword, &args.split(), props, input, d.start)?;
        pos = args.end;
    }

    out.push_str(&input[pos..]);
    Ok(out)
}

/// Counter stage: `@counter`, `@value` and the unprefixed math operations.
pub(super) fn parse_counter(input: &str, props: &mut PropertySet) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;

    while let Some(d) = find_directive(input, pos, &COUNTER_KEYWORDS) {
        out.push_str(&input[pos..d.start]);
        let args = parse_args(input, d.name_end, d.keyword)?;
        let parts = args.split();

        match d.keyword {
            "counter" | "value" => {
                let [name] = parts.as_slice() else {
                    return Err(syntax(d.keyword, "expects 1 argument", input, d.start));
                };
                let value = arg_value(name, props);
                out.push_str(&value.to_string());
                if d.keyword == "counter" {
                    if !is_identifier(name) {
                        return Err(syntax(d.keyword, "expects a property name", input, d.start));
                    }
                    props.set(*name, value.wrapping_add(1));
                }
            }
            name => {
                let op = MathOp::from_name(name)
                    .ok_or_else(|| syntax(d.keyword, "unknown operation", input, d.start))?;
                apply(op, d.keyword, &parts, props, input, d.start)?;
            }
        }
        pos = args.end;
    }

    out.push_str(&input[pos..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn math_mutates_properties_and_emits_nothing() {
        let mut props = PropertySet::new();
        let out = parse_math(
            "a@pset( x, 4 )b@padd( x, 2 )@pmul( y, x, 3 )@pmax( z, y, 100 )c",
            &mut props,
        )
        .unwrap();
        assert_eq!(out, "abc");
        assert_eq!(props.get("x"), 6);
        assert_eq!(props.get("y"), 18);
        assert_eq!(props.get("z"), 100);
    }

    #[test]
    fn math_leaves_counter_directives_alone() {
        let mut props = PropertySet::new();
        let out = parse_math("@set( x, 1 ) @value( x )", &mut props).unwrap();
        assert_eq!(out, "@set( x, 1 ) @value( x )");
        assert!(!props.contains("x"));
    }

    #[test]
    fn division_by_zero_is_syntax_error() {
        let mut props = PropertySet::new();
        assert!(parse_math("@pdiv( x, 0 )", &mut props).is_err());
        assert!(parse_counter("@mod( x, 1, 0 )", &mut props).is_err());
    }

    #[test]
    fn counter_emits_then_increments() {
        let mut props = PropertySet::new();
        props.set("slot", 2);
        let out = parse_counter(
            "b@counter( slot ) b@counter( slot ) v@value( slot ) @add( slot, 10 )@value( slot )",
            &mut props,
        )
        .unwrap();
        assert_eq!(out, "b2 b3 v4 14");
    }

    #[test]
    fn bad_arity_is_syntax_error() {
        let mut props = PropertySet::new();
        assert!(parse_math("@pset( x )", &mut props).is_err());
        assert!(parse_math("@padd( x, 1, 2, 3 )", &mut props).is_err());
        assert!(parse_counter("@value()", &mut props).is_err());
        assert!(parse_counter("@counter( 5 )", &mut props).is_err());
    }
}
