use bytes::Bytes;

use crate::error::{Error, Result};
use crate::record::Record;

/// Number of comma-separated columns in a data line.
pub const FIELD_COUNT: usize = 5;

/// Turns one text line into a [`Record`].
///
/// Columns are `id,title,description,completed,ownerId`, split on every
/// literal comma with no quoting, so a comma inside a field shifts the count
/// and the line is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineTokenizer;

impl LineTokenizer {
    pub fn parse(line: &str) -> Result<Record> {
        let tokens: Vec<&str> = line.split(',').map(str::trim).collect();
        if tokens.len() != FIELD_COUNT {
            return Err(Error::malformed(format!(
                "expected {FIELD_COUNT} fields, found {}",
                tokens.len()
            )));
        }

        Ok(Record {
            id: tokens[0].to_owned(),
            title: tokens[1].to_owned(),
            description: tokens[2].to_owned(),
            completed: parse_bool(tokens[3]),
            owner_id: tokens[4].to_owned(),
        })
    }

    /// Parse and serialize in one step, yielding the message body.
    pub fn tokenize(line: &str) -> Result<Bytes> {
        Self::parse(line)?.encode()
    }
}

/// Case-insensitive `true`; every other token is `false`.
fn parse_bool(token: &str) -> bool {
    token.eq_ignore_ascii_case("true")
}
