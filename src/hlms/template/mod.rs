//! Shader Template Preprocessor
//!
//! Expands compute shader templates written in the HLMS directive language.
//! Stages run in a fixed order over the whole text:
//!
//! 1. **math**: `@pset`, `@padd`, ... mutate the property set
//! 2. **foreach**: `@foreach( count, var [, start] )` blocks are unrolled
//! 3. **properties**: `@property( expr )` blocks keep or drop their branches
//! 4. **pieces**: `@piece` bodies are collected and `@insertpiece` expanded,
//!    repeated until no markers are left
//! 5. **counter**: `@counter`, `@value`, `@set`, `@add`, ...
//!
//! Piece files go through all five stages, but only their pieces and property
//! mutations are kept. The pieces stay available to every template expanded
//! afterwards, until [`ShaderTemplateCompiler::clear_pieces`].

mod expr;
mod foreach;
mod math;
mod pieces;
mod properties;
mod scan;

use crate::errors::TemplateError;
use crate::hlms::property::PropertySet;
use crate::utils::IdString;

use pieces::PieceMap;

/// Stateful template expander: owns the pieces collected so far.
#[derive(Debug, Default, Clone)]
pub struct ShaderTemplateCompiler {
    pieces: PieceMap,
}

impl ShaderTemplateCompiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every collected piece.
    pub fn clear_pieces(&mut self) {
        self.pieces.clear();
    }

    /// Returns the body of a collected piece.
    #[must_use]
    pub fn piece(&self, name: &str) -> Option<&str> {
        IdString::lookup(name)
            .and_then(|id| self.pieces.get(&id))
            .map(String::as_str)
    }

    #[must_use]
    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Runs a piece file through every stage.
    ///
    /// The remaining text is discarded; only the pieces and the property
    /// mutations (including top-level `@set`, `@counter`, ...) survive.
    pub fn process_piece_file(
        &mut self,
        text: &str,
        props: &mut PropertySet,
    ) -> Result<(), TemplateError> {
        let text = math::parse_math(text, props)?;
        let text = foreach::parse_foreach(&text, props)?;
        let text = properties::parse_properties(&text, props)?;
        let rest = pieces::collect_pieces(&text, &mut self.pieces)?;
        math::parse_counter(&rest, props)?;
        Ok(())
    }

    /// Expands a full template into shader source.
    ///
    /// `props` is mutated by math and counter directives.
    pub fn expand(&mut self, source: &str, props: &mut PropertySet) -> Result<String, TemplateError> {
        let text = math::parse_math(source, props)?;
        let text = foreach::parse_foreach(&text, props)?;
        let mut text = properties::parse_properties(&text, props)?;

        let mut remaining = pieces::count_markers(&text);
        while remaining > 0 {
            let collected = pieces::collect_pieces(&text, &mut self.pieces)?;
            text = pieces::insert_pieces(&collected, &mut self.pieces)?;

            let now = pieces::count_markers(&text);
            if now >= remaining {
                return Err(TemplateError::UnresolvedPieces { remaining: now });
            }
            remaining = now;
        }

        math::parse_counter(&text, props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_run_in_order() {
        let mut compiler = ShaderTemplateCompiler::new();
        let mut props = PropertySet::new();
        props.set("use_tex", 1);

        let src = "@pset( n, 2 )\
                   @foreach( n, i )t@i;@end\
                   @property( use_tex )T@else N@end\
                   @piece( P )p@end[@insertpiece( P )]\
                   @counter( slot )@counter( slot )";
        let out = compiler.expand(src, &mut props).unwrap();
        assert_eq!(out, "t0;t1;T[p]01");
        assert_eq!(props.get("slot"), 2);
        assert_eq!(props.get("n"), 2);
    }

    #[test]
    fn pieces_from_piece_files_persist() {
        let mut compiler = ShaderTemplateCompiler::new();
        let mut props = PropertySet::new();
        props.set("wide", 1);

        compiler
            .process_piece_file(
                "junk @property( wide )@piece( Width )128@end@else @piece( Width )64@end@end",
                &mut props,
            )
            .unwrap();
        assert_eq!(compiler.piece("Width"), Some("128"));

        let out = compiler.expand("w=@insertpiece( Width )", &mut props).unwrap();
        assert_eq!(out, "w=128");

        compiler.clear_pieces();
        assert_eq!(compiler.piece_count(), 0);
    }

    #[test]
    fn piece_defined_inside_inserted_piece() {
        let mut compiler = ShaderTemplateCompiler::new();
        let mut props = PropertySet::new();
        compiler
            .process_piece_file("@piece( Outer )@piece( Inner )i@end<o>@end", &mut props)
            .unwrap();

        // Inner is only defined once Outer has been inserted.
        let out = compiler
            .expand("@insertpiece( Inner )@insertpiece( Outer )", &mut props)
            .unwrap();
        assert_eq!(out, "<o>");
        assert_eq!(compiler.piece("Inner"), Some("i"));
    }

    #[test]
    fn piece_file_counters_reach_the_template() {
        let mut compiler = ShaderTemplateCompiler::new();
        let mut props = PropertySet::new();
        compiler
            .process_piece_file("@set( flag, 7 )@piece( X )x@end", &mut props)
            .unwrap();
        assert_eq!(props.get("flag"), 7);

        let out = compiler.expand("@value( flag )@insertpiece( X )", &mut props).unwrap();
        assert_eq!(out, "7x");
    }

    #[test]
    fn self_referencing_piece_fails() {
        let mut compiler = ShaderTemplateCompiler::new();
        let mut props = PropertySet::new();
        let err = compiler
            .expand("@piece( A )@insertpiece( A )@end@insertpiece( A )", &mut props)
            .unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { directive: "insertpiece", .. }));
    }
}
