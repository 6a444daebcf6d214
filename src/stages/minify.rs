//! Script and stylesheet checks and minification.
//!
//! oxc for JavaScript, lightningcss for CSS. Syntax errors are reported with
//! the parser's first diagnostic.

use anyhow::{Result, anyhow};
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

/// Parse `source` as an ES module, failing on the first syntax error.
pub fn check_js(source: &str) -> Result<()> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
    match ret.errors.first() {
        Some(error) => Err(anyhow!("syntax error: {error}")),
        None => Ok(()),
    }
}

/// Mangle, compress and print `source` without comments.
pub fn minify_js(source: &str) -> Result<String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if let Some(error) = ret.errors.first() {
        return Err(anyhow!("syntax error: {error}"));
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    Ok(Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code)
}

/// Parse and re-print a stylesheet, minified when `minify` is set.
pub fn process_css(source: &str, minify: bool) -> Result<String> {
    let stylesheet = StyleSheet::parse(source, ParserOptions::default())
        .map_err(|err| anyhow!("syntax error: {err}"))?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify,
            ..PrinterOptions::default()
        })
        .map_err(|err| anyhow!("failed to print stylesheet: {err}"))?;
    Ok(result.code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_js() {
        assert!(check_js("export const a = 1;").is_ok());
        let err = check_js("const = ;").unwrap_err();
        assert!(err.to_string().starts_with("syntax error"));
    }

    #[test]
    fn test_minify_js_drops_comments() {
        let out = minify_js("// greeting\nconst message = 'hi';\nconsole.log(message);\n").unwrap();
        assert!(!out.contains("greeting"));
        assert!(out.contains("console.log"));
        assert!(out.len() < 60);
    }

    #[test]
    fn test_process_css() {
        let source = "body {\n  color: #ff0000;\n}\n";
        let minified = process_css(source, true).unwrap();
        assert_eq!(minified, "body{color:red}");
        assert!(process_css(source, false).unwrap().contains('\n'));
    }
}
