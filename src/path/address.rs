//! Address parsing
//!
//! Grammar: `segment ("." segment)*` where
//! `segment = identifier ("[" ["-"] digits "]")?`.

use super::PathError;
use std::fmt;

/// One step of an address: a key, optionally indexing into an array at that key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub key: String,
    pub index: Option<i64>,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{}]", self.key, index),
            None => write!(f, "{}", self.key),
        }
    }
}

/// A parsed address. Never persisted; parsed again on every navigation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathAddress {
    segments: Vec<Segment>,
}

impl PathAddress {
    /// Parse an address string
    pub fn parse(address: &str) -> Result<Self, PathError> {
        let mut segments = Vec::new();
        for raw in address.split('.') {
            segments.push(parse_segment(address, raw)?);
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Split into the parent segments and the terminal one
    pub fn split_last(&self) -> (&[Segment], &Segment) {
        // parse() always yields at least one segment
        let (last, parents) = self
            .segments
            .split_last()
            .unwrap_or_else(|| unreachable!("address without segments"));
        (parents, last)
    }
}

impl fmt::Display for PathAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

fn parse_segment(address: &str, raw: &str) -> Result<Segment, PathError> {
    if raw.is_empty() {
        return Err(PathError::EmptySegment(address.to_string()));
    }

    let Some(open) = raw.find('[') else {
        if raw.contains(']') {
            return Err(PathError::Unbalanced(address.to_string()));
        }
        return Ok(Segment {
            key: raw.to_string(),
            index: None,
        });
    };

    let key = &raw[..open];
    let rest = &raw[open + 1..];
    let Some(inner) = rest.strip_suffix(']') else {
        return Err(PathError::Unbalanced(address.to_string()));
    };
    if key.is_empty() {
        return Err(PathError::EmptySegment(address.to_string()));
    }
    if inner.contains('[') || inner.contains(']') {
        return Err(PathError::Unbalanced(address.to_string()));
    }

    let digits = inner.strip_prefix('-').unwrap_or(inner);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PathError::InvalidIndex {
            address: address.to_string(),
            index: inner.to_string(),
        });
    }
    let index = inner.parse::<i64>().map_err(|_| PathError::InvalidIndex {
        address: address.to_string(),
        index: inner.to_string(),
    })?;

    Ok(Segment {
        key: key.to_string(),
        index: Some(index),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_keys() {
        let address = PathAddress::parse("a.b.c").unwrap();
        let keys: Vec<_> = address.segments().iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert!(address.segments().iter().all(|s| s.index.is_none()));
    }

    #[test]
    fn parse_indices() {
        let address = PathAddress::parse("list[2].items[-1]").unwrap();
        assert_eq!(address.segments()[0].index, Some(2));
        assert_eq!(address.segments()[1].key, "items");
        assert_eq!(address.segments()[1].index, Some(-1));
        assert_eq!(address.to_string(), "list[2].items[-1]");
    }

    #[test]
    fn rejects_malformed_brackets() {
        for bad in ["a[", "a]", "a[1", "a[x]", "a[]", "a[-]", "a[1]b", "a[1][2]", "[0]"] {
            assert!(PathAddress::parse(bad).is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(matches!(
            PathAddress::parse("a..b"),
            Err(PathError::EmptySegment(_))
        ));
        assert!(PathAddress::parse("").is_err());
        assert!(PathAddress::parse("a.").is_err());
    }

    #[test]
    fn split_last_returns_terminal() {
        let address = PathAddress::parse("a.b[0].c").unwrap();
        let (parents, last) = address.split_last();
        assert_eq!(parents.len(), 2);
        assert_eq!(last.key, "c");
    }
}
