//! Text command protocol
//!
//! One command per line. Unlike a free token stream, a command may not
//! span lines and a line never carries more than one command:
//!
//! ```text
//! INIT_HEAP <hex base> <class count> <bytes per class> <type>
//! MALLOC <size>
//! FREE <hex address>
//! READ <hex address> <length>
//! WRITE <hex address> "<text>" <length>
//! DUMP_MEMORY
//! DESTROY_HEAP
//! ```

use crate::error::{Error, Result};
use std::str::SplitWhitespace;

/// A parsed protocol command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Init {
        base: usize,
        class_count: usize,
        bytes_per_class: usize,
        heap_type: i64,
    },
    Malloc {
        size: usize,
    },
    Free {
        address: usize,
    },
    Read {
        address: usize,
        length: usize,
    },
    Write {
        address: usize,
        data: Vec<u8>,
        declared_length: usize,
    },
    Dump,
    Destroy,
}

impl Command {
    /// Parse one protocol line; blank lines give `None`
    ///
    /// The line is raw bytes: everything up to the first double quote must
    /// be text, while a `WRITE` payload is taken byte for byte.
    pub fn parse(line: &[u8]) -> Result<Option<Command>> {
        let (head, tail) = match line.iter().position(|&b| b == b'"') {
            Some(quote) => (&line[..quote], Some(&line[quote..])),
            None => (line, None),
        };
        let head =
            std::str::from_utf8(head).map_err(|_| parse_error(line, "command is not text"))?;

        let mut tokens = Tokens::new(line, head);
        let keyword = match tokens.next_token() {
            Some(keyword) => keyword,
            None if tail.is_none() => return Ok(None),
            None => return Err(parse_error(line, "missing command")),
        };

        let command = match keyword {
            "INIT_HEAP" => Command::Init {
                base: tokens.hex("base address")?,
                class_count: tokens.number("class count")?,
                bytes_per_class: tokens.number("bytes per class")?,
                heap_type: tokens.number("heap type")?,
            },
            "MALLOC" => Command::Malloc {
                size: tokens.number("size")?,
            },
            "FREE" => Command::Free {
                address: tokens.hex("address")?,
            },
            "READ" => Command::Read {
                address: tokens.hex("address")?,
                length: tokens.number("length")?,
            },
            "WRITE" => {
                let address = tokens.hex("address")?;
                let (data, rest) = tail
                    .and_then(quoted)
                    .ok_or_else(|| parse_error(line, "missing quoted text"))?;
                let declared_length = std::str::from_utf8(rest)
                    .ok()
                    .and_then(|rest| rest.trim().parse().ok())
                    .ok_or_else(|| parse_error(line, "invalid length"))?;
                return Ok(Some(Command::Write {
                    address,
                    data: data.to_vec(),
                    declared_length,
                }));
            }
            "DUMP_MEMORY" => Command::Dump,
            "DESTROY_HEAP" => Command::Destroy,
            other => return Err(parse_error(line, &format!("unknown command {}", other))),
        };

        if tokens.next_token().is_some() || tail.is_some() {
            return Err(parse_error(line, "unexpected trailing arguments"));
        }
        Ok(Some(command))
    }

    /// Protocol keyword of this command
    pub fn name(&self) -> &'static str {
        match self {
            Command::Init { .. } => "INIT_HEAP",
            Command::Malloc { .. } => "MALLOC",
            Command::Free { .. } => "FREE",
            Command::Read { .. } => "READ",
            Command::Write { .. } => "WRITE",
            Command::Dump => "DUMP_MEMORY",
            Command::Destroy => "DESTROY_HEAP",
        }
    }
}

struct Tokens<'a> {
    line: &'a [u8],
    inner: SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(line: &'a [u8], head: &'a str) -> Self {
        Self {
            line,
            inner: head.split_whitespace(),
        }
    }

    fn next_token(&mut self) -> Option<&'a str> {
        self.inner.next()
    }

    fn expect(&mut self, what: &str) -> Result<&'a str> {
        self.next_token()
            .ok_or_else(|| parse_error(self.line, &format!("missing {}", what)))
    }

    fn number<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self.expect(what)?;
        token
            .parse()
            .map_err(|_| parse_error(self.line, &format!("invalid {}: {}", what, token)))
    }

    /// Hexadecimal with an optional `0x` prefix
    fn hex(&mut self, what: &str) -> Result<usize> {
        let token = self.expect(what)?;
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        usize::from_str_radix(digits, 16)
            .map_err(|_| parse_error(self.line, &format!("invalid {}: {}", what, token)))
    }
}

/// Bytes between the first and last double quote, and whatever follows them
fn quoted(line: &[u8]) -> Option<(&[u8], &[u8])> {
    let start = line.iter().position(|&b| b == b'"')?;
    let stop = line.iter().rposition(|&b| b == b'"')?;
    if stop == start {
        return None;
    }
    Some((&line[start + 1..stop], &line[stop + 1..]))
}

fn parse_error(line: &[u8], reason: &str) -> Error {
    Error::Parse {
        line: String::from_utf8_lossy(line).trim().to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        Command::parse(line.as_bytes())
            .expect("line parses")
            .expect("line is not blank")
    }

    #[test]
    fn test_parse_init() {
        assert_eq!(
            parse("INIT_HEAP 0x1 4 256 0"),
            Command::Init {
                base: 1,
                class_count: 4,
                bytes_per_class: 256,
                heap_type: 0,
            }
        );
        assert_eq!(
            parse("INIT_HEAP ff 1 64 1"),
            Command::Init {
                base: 0xff,
                class_count: 1,
                bytes_per_class: 64,
                heap_type: 1,
            }
        );
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse("MALLOC 20"), Command::Malloc { size: 20 });
        assert_eq!(parse("  FREE 0X1A  "), Command::Free { address: 0x1a });
        assert_eq!(parse("READ 0x10 5"), Command::Read { address: 0x10, length: 5 });
        assert_eq!(parse("DUMP_MEMORY"), Command::Dump);
        assert_eq!(parse("DESTROY_HEAP"), Command::Destroy);
    }

    #[test]
    fn test_parse_write_keeps_inner_quotes_and_spaces() {
        assert_eq!(
            parse(r#"WRITE 0x8 "say "hi" there" 12"#),
            Command::Write {
                address: 8,
                data: br#"say "hi" there"#.to_vec(),
                declared_length: 12,
            }
        );
    }

    #[test]
    fn test_blank_line() -> Result<()> {
        assert_eq!(Command::parse(b"   ")?, None);
        Ok(())
    }

    #[test]
    fn test_malformed_lines() {
        for line in [
            "MALLOC",
            "MALLOC -4",
            "FREE zz",
            "READ 0x10",
            "WRITE 0x10 \"unterminated 3",
            "WRITE 0x10 \"text\"",
            "DUMP_MEMORY now",
            "DUMP_MEMORY \"x\"",
            "MALLOC 8 MALLOC 8",
            "malloc 8",
            "COMPACT",
        ] {
            assert!(
                matches!(Command::parse(line.as_bytes()), Err(Error::Parse { .. })),
                "{} should not parse",
                line
            );
        }
    }

    #[test]
    fn test_write_payload_is_raw_bytes() -> Result<()> {
        let line = b"WRITE 0x0 \"\xff\x00\xfe\" 3";
        assert_eq!(
            Command::parse(line)?,
            Some(Command::Write {
                address: 0,
                data: vec![0xff, 0x00, 0xfe],
                declared_length: 3,
            })
        );
        Ok(())
    }

    #[test]
    fn test_non_text_command_is_a_parse_error() {
        for line in [
            &b"MALLOC \xff"[..],
            &b"\xc3( 8"[..],
            &b"WRITE 0x0 \"ok\" \xff"[..],
        ] {
            assert!(matches!(Command::parse(line), Err(Error::Parse { .. })));
        }
    }

    #[test]
    fn test_command_names() {
        assert_eq!(parse("MALLOC 1").name(), "MALLOC");
        assert_eq!(parse("DUMP_MEMORY").name(), "DUMP_MEMORY");
    }
}
