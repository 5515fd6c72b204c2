//! Thread-local pool for tree-sitter parser instances.
//!
//! Each worker thread keeps one lazily initialized parser, so parallel
//! scans reuse parsers across files without locking.

use anyhow::Result;
use std::cell::RefCell;

thread_local! {
    static PYTHON_PARSER: RefCell<Option<tree_sitter::Parser>> = const { RefCell::new(None) };
}

/// Run `f` with this thread's Python parser, initializing it on first use.
pub fn with_python_parser<F, R>(f: F) -> Result<R>
where
    F: FnOnce(&mut tree_sitter::Parser) -> R,
{
    PYTHON_PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            let mut parser = tree_sitter::Parser::new();
            parser.set_language(&tree_sitter_python::language())?;
            *slot = Some(parser);
        }
        let parser = slot
            .as_mut()
            .expect("parser initialized by the branch above");
        Ok(f(parser))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_is_reused_within_a_thread() {
        let addr1 = with_python_parser(|p| p as *const _ as usize).unwrap();
        let addr2 = with_python_parser(|p| p as *const _ as usize).unwrap();
        assert_eq!(addr1, addr2);
    }

    #[test]
    fn parses_simple_source() {
        let parsed = with_python_parser(|parser| {
            parser
                .parse(b"def hello():\n    return 1\n".as_slice(), None)
                .is_some()
        })
        .unwrap();
        assert!(parsed);
    }
}
