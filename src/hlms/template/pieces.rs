//! Piece collection (`@piece`, `@undefpiece`) and insertion (`@insertpiece`).

use rustc_hash::FxHashMap;

use crate::errors::TemplateError;
use crate::utils::IdString;

use super::scan::{count_directives, find_block_end, find_directive, parse_single_name, syntax};

/// Collected pieces, by name.
pub(super) type PieceMap = FxHashMap<IdString, String>;

const MARKERS: [&str; 2] = ["piece", "insertpiece"];

/// Number of piece markers still waiting to be collected or inserted.
pub(super) fn count_markers(text: &str) -> usize {
    count_directives(text, &MARKERS)
}

/// Moves every `@piece( name ) ... @end` body into `pieces`.
///
/// Defining a piece twice is an error.
pub(super) fn collect_pieces(input: &str, pieces: &mut PieceMap) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;

    while let Some(d) = find_directive(input, pos, &["piece", "undefpiece"]) {
        out.push_str(&input[pos..d.start]);
        let (name, args_end) = parse_single_name(input, d.name_end, d.keyword)?;
        let id = IdString::new(name);

        if d.keyword == "undefpiece" {
            pieces.remove(&id);
            pos = args_end;
            continue;
        }

        let block = find_block_end(input, args_end, "piece", d.start)?;
        if block.else_at.is_some() {
            return Err(syntax("piece", "@else is only valid inside @property", input, d.start));
        }
        if pieces.contains_key(&id) {
            return Err(syntax("piece", format!("piece '{name}' already defined"), input, d.start));
        }
        pieces.insert(id, input[args_end..block.body_end].to_string());

        pos = block.end;
    }

    out.push_str(&input[pos..]);
    Ok(out)
}

fn insert_into(
    out: &mut String,
    input: &str,
    pieces: &mut PieceMap,
    expanding: &mut Vec<IdString>,
) -> Result<(), TemplateError> {
    let mut pos = 0;

    while let Some(d) = find_directive(input, pos, &["insertpiece"]) {
        out.push_str(&input[pos..d.start]);
        let (name, args_end) = parse_single_name(input, d.name_end, "insertpiece")?;

        if let Some((id, text)) =
            IdString::lookup(name).and_then(|id| pieces.get(&id).map(|text| (id, text.clone())))
        {
            if expanding.contains(&id) {
                return Err(syntax(
                    "insertpiece",
                    format!("piece '{name}' inserts itself"),
                    input,
                    d.start,
                ));
            }
            // Definitions inside the body become visible to the body itself
            // and to everything after it.
            let body = collect_pieces(&text, pieces)?;
            expanding.push(id);
            insert_into(out, &body, pieces, expanding)?;
            expanding.pop();
        }

        pos = args_end;
    }

    out.push_str(&input[pos..]);
    Ok(())
}

/// Replaces every `@insertpiece( name )`, expanding insertions inside pieces.
///
/// Pieces defined inside an inserted body are collected before that body is
/// expanded. Unknown pieces insert nothing.
pub(super) fn insert_pieces(input: &str, pieces: &mut PieceMap) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(input.len());
    insert_into(&mut out, input, pieces, &mut Vec::new())?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_then_insert() {
        let mut pieces = PieceMap::default();
        let rest = collect_pieces("a@piece( Body )x = 1;@endb", &mut pieces);
        // `@endb` is not `@end`.
        assert!(rest.is_err());

        let rest = collect_pieces("a@piece( Body )x = 1;@end|b", &mut pieces).unwrap();
        assert_eq!(rest, "a|b");
        assert_eq!(
            insert_pieces("{@insertpiece( Body )}{@insertpiece( Missing )}", &mut pieces).unwrap(),
            "{x = 1;}{}"
        );
    }

    #[test]
    fn insertion_is_recursive() {
        let mut pieces = PieceMap::default();
        collect_pieces(
            "@piece( Outer )<@insertpiece( Inner )@insertpiece( Inner )>@end\
             @piece( Inner )i@end",
            &mut pieces,
        )
        .unwrap();
        assert_eq!(insert_pieces("@insertpiece( Outer )", &mut pieces).unwrap(), "<ii>");
    }

    #[test]
    fn self_insertion_is_error() {
        let mut pieces = PieceMap::default();
        collect_pieces("@piece( Loop )@insertpiece( Loop )@end", &mut pieces).unwrap();
        assert!(insert_pieces("@insertpiece( Loop )", &mut pieces).is_err());
    }

    #[test]
    fn redefinition_and_undef() {
        let mut pieces = PieceMap::default();
        collect_pieces("@piece( P )1@end", &mut pieces).unwrap();
        assert!(collect_pieces("@piece( P )2@end", &mut pieces).is_err());

        collect_pieces("@undefpiece( P )@piece( P )2@end", &mut pieces).unwrap();
        assert_eq!(insert_pieces("@insertpiece( P )", &mut pieces).unwrap(), "2");
    }

    #[test]
    fn body_can_insert_a_piece_it_defines() {
        let mut pieces = PieceMap::default();
        collect_pieces("@piece( A )@piece( B )b@end[@insertpiece( B )]@end", &mut pieces).unwrap();
        assert_eq!(insert_pieces("@insertpiece( A )", &mut pieces).unwrap(), "[b]");
        assert!(pieces.contains_key(&IdString::new("B")));
    }

    #[test]
    fn marker_count() {
        assert_eq!(count_markers("@piece( a )@end @insertpiece( a ) @undefpiece( a )"), 2);
    }
}
