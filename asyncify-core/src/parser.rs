//! TypeScript and JavaScript parser using SWC
//!
//! Global invariants enforced:
//! - A file that does not parse cleanly is never transformed
//! - Byte offsets of the parsed tree map back onto the original text

use anyhow::Result;
use swc_common::{sync::Lrc, BytePos, FileName, SourceFile, SourceMap, Spanned};
use swc_ecma_ast::{EsVersion, Module};
use swc_ecma_parser::{lexer::Lexer, Parser, StringInput, Syntax};

/// A parsed module together with the source file it was read from
pub struct ParsedSource {
    pub module: Module,
    pub source_file: Lrc<SourceFile>,
}

impl ParsedSource {
    /// Convert an absolute SWC position into a byte offset into the original text
    pub fn offset(&self, pos: BytePos) -> usize {
        offset_in(&self.source_file, pos)
    }
}

/// Byte offset of `pos` within `file`'s text
pub fn offset_in(file: &SourceFile, pos: BytePos) -> usize {
    (pos.0 - file.start_pos.0) as usize
}

/// Determine the appropriate syntax configuration based on file extension
fn syntax_for_file(filename: &str) -> Syntax {
    if filename.ends_with(".tsx") || filename.ends_with(".mtsx") || filename.ends_with(".ctsx") {
        Syntax::Typescript(swc_ecma_parser::TsSyntax {
            tsx: true,
            decorators: true,
            dts: false,
            ..Default::default()
        })
    } else if filename.ends_with(".ts") || filename.ends_with(".mts") || filename.ends_with(".cts") {
        Syntax::Typescript(swc_ecma_parser::TsSyntax {
            tsx: false,
            decorators: true,
            dts: filename.ends_with(".d.ts"),
            ..Default::default()
        })
    } else {
        // JavaScript of any flavor, JSX included
        Syntax::Es(swc_ecma_parser::EsSyntax {
            jsx: true,
            decorators: true,
            ..Default::default()
        })
    }
}

/// Parse TypeScript, JavaScript, JSX, or TSX source code as an ES module
///
/// Supported file types:
/// - `.ts`, `.mts`, `.cts` - TypeScript
/// - `.tsx`, `.mtsx`, `.ctsx` - TypeScript with JSX
/// - `.js`, `.mjs`, `.cjs`, `.jsx` and anything else - JavaScript with JSX
///
/// Returns an error on a fatal parse error and also when the parser recovered
/// from errors.
pub fn parse_source(src: &str, source_map: &Lrc<SourceMap>, filename: &str) -> Result<ParsedSource> {
    let syntax = syntax_for_file(filename);

    let source_file: Lrc<SourceFile> = source_map.new_source_file(
        FileName::Custom(filename.into()).into(),
        src.to_string(),
    );

    let input = StringInput::from(&*source_file);
    let lexer = Lexer::new(syntax, EsVersion::EsNext, input, None);
    let mut parser = Parser::new_from(lexer);

    let module = parser.parse_module().map_err(|e| {
        let loc = source_map.lookup_char_pos(e.span().lo);
        anyhow::anyhow!("Parse error at {}:{}: {}", loc.line, loc.col.0, e.kind().msg())
            .context(format!("Failed to parse source file: {}", filename))
    })?;

    if let Some(e) = parser.take_errors().into_iter().next() {
        let loc = source_map.lookup_char_pos(e.span().lo);
        return Err(
            anyhow::anyhow!("Parse error at {}:{}: {}", loc.line, loc.col.0, e.kind().msg())
                .context(format!("Failed to parse source file: {}", filename)),
        );
    }

    Ok(ParsedSource { module, source_file })
}
