//! The string-prefix value-expression grammar.
//!
//! Manifest strings may encode computed values instead of literals. The four
//! recognized prefixes are parsed into an explicit enumeration once per
//! resolution call; anything else is an opaque literal.

/// A parsed value expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueExpr<'a> {
    /// `ether:<amount>`: decimal token amount, converted to 18-decimal base units.
    Ether(&'a str),
    /// `config:<key>`: indirection through the manifest's config table.
    Config(&'a str),
    /// `keccak:<data>`: keccak-256 of the UTF-8 bytes of `<data>`.
    Keccak(&'a str),
    /// `address:<name>`: the deployed address of another manifest entry.
    Address(&'a str),
    /// Anything else, returned verbatim.
    Literal(&'a str),
}

impl<'a> ValueExpr<'a> {
    pub fn parse(input: &'a str) -> Self {
        if let Some(rest) = input.strip_prefix("ether:") {
            Self::Ether(rest)
        } else if let Some(rest) = input.strip_prefix("config:") {
            Self::Config(rest)
        } else if let Some(rest) = input.strip_prefix("keccak:") {
            Self::Keccak(rest)
        } else if let Some(rest) = input.strip_prefix("address:") {
            Self::Address(rest)
        } else {
            Self::Literal(input)
        }
    }
}
