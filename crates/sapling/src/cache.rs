//! The `.sapped` parse-tree cache.
//!
//! A parsed program serialises to a compact binary sidecar and reloads
//! without reparsing. The encoding round-trips exactly, positions included:
//! `deserialize(serialize(parse(src))) == parse(src)`.

use crate::ast::Code;
use crate::error::{Error, Result};
use crate::token::Pos;

pub const EXTENSION: &str = "sapped";

pub fn serialize(code: &Code) -> Result<Vec<u8>> {
    postcard::to_allocvec(code)
        .map_err(|e| Error::decode(format!("Cannot encode parse tree: {e}"), Pos::default()))
}

pub fn deserialize(bytes: &[u8]) -> Result<Code> {
    postcard::from_bytes(bytes)
        .map_err(|e| Error::decode(format!("Cannot decode parse tree: {e}"), Pos::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trip_preserves_the_tree_and_positions() {
        let src = "const float pi = 3.14\n\
                   struct P { int x int y }\n\
                   func P.mag(scale = 1) { return self.x * scale }\n\
                   arr = {1, 'two', {3: 'three'}}\n\
                   if pi > 3.0 { print(arr) } else { print({x : x in arr}) }\n\
                   import \"a\", \"b\" from \"lib\"";
        let code = parse(src).unwrap();
        let bytes = serialize(&code).unwrap();
        let reloaded = deserialize(&bytes).unwrap();
        assert_eq!(reloaded, code);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = deserialize(&[0xff, 0x00, 0x13, 0x37]).unwrap_err();
        assert!(err.to_string().starts_with("DecodeError:"));
    }
}
