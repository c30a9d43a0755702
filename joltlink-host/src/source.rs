//! Text command source
//!
//! One command per line:
//!
//! ```text
//! [.##.] (3) (1,3) (2) (2,3) (0,2) (0,1) {3,5,4,7}
//! ```
//!
//! - `[...]` indicator pattern, optional and ignored
//! - `(...)` one button per group, listing the counters it increments
//! - `{...}` target value per counter, at most [`MACHINE_COUNT`]
//!
//! Blank lines are skipped.

use std::io::{self, BufRead};
use std::iter::Peekable;
use std::str::CharIndices;

use joltlink_protocol::{button_mask, Command, FrameError, MACHINE_COUNT};
use thiserror::Error;

/// Errors produced while reading commands
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}, column {column}: unexpected {found:?}")]
    Unexpected {
        line: usize,
        column: usize,
        found: char,
    },
    #[error("line {line}: missing closing {close:?}")]
    Unterminated { line: usize, close: char },
    #[error("line {line}: counter {counter} out of range (0-{})", MACHINE_COUNT - 1)]
    CounterOutOfRange { line: usize, counter: String },
    #[error("line {line}: target {value} does not fit in 16 bits")]
    TargetOverflow { line: usize, value: String },
    #[error("line {line}: no target list")]
    MissingTargets { line: usize },
    #[error("line {line}: {source}")]
    Frame {
        line: usize,
        #[source]
        source: FrameError,
    },
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
}

/// Parse one non-blank input line (`line_no` is 1-based, for errors)
pub fn parse_line(text: &str, line_no: usize) -> Result<Command, ParseError> {
    let mut cursor = Cursor::new(text, line_no);

    cursor.skip_whitespace();
    if cursor.eat('[') {
        cursor.skip_until(']')?;
    }

    let mut buttons = Vec::new();
    loop {
        cursor.skip_whitespace();
        match cursor.peek() {
            Some('(') => {
                cursor.bump();
                let counters = cursor.number_list(')')?;
                buttons.push(button_from(&counters, line_no)?);
            }
            Some('{') => break,
            Some(_) => return Err(cursor.unexpected()),
            None => return Err(ParseError::MissingTargets { line: line_no }),
        }
    }

    cursor.bump();
    let targets = cursor
        .number_list('}')?
        .into_iter()
        .map(|value| {
            value
                .parse::<u16>()
                .map_err(|_| ParseError::TargetOverflow { line: line_no, value })
        })
        .collect::<Result<Vec<_>, _>>()?;

    cursor.skip_whitespace();
    if cursor.peek().is_some() {
        return Err(cursor.unexpected());
    }

    Command::new(&buttons, &targets).map_err(|source| ParseError::Frame {
        line: line_no,
        source,
    })
}

fn button_from(counters: &[String], line: usize) -> Result<u16, ParseError> {
    let mut digits = Vec::with_capacity(counters.len());
    for counter in counters {
        match counter.parse::<u8>() {
            Ok(digit) if (digit as usize) < MACHINE_COUNT => digits.push(digit),
            _ => {
                return Err(ParseError::CounterOutOfRange {
                    line,
                    counter: counter.clone(),
                })
            }
        }
    }
    // Every digit was range-checked above
    Ok(button_mask(&digits).unwrap_or_default())
}

struct Cursor<'a> {
    chars: Peekable<CharIndices<'a>>,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str, line: usize) -> Self {
        Self {
            chars: text.char_indices().peekable(),
            line,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn bump(&mut self) -> Option<char> {
        self.chars.next().map(|(_, c)| c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn skip_until(&mut self, close: char) -> Result<(), ParseError> {
        loop {
            match self.bump() {
                Some(c) if c == close => return Ok(()),
                Some(_) => {}
                None => {
                    return Err(ParseError::Unterminated {
                        line: self.line,
                        close,
                    })
                }
            }
        }
    }

    /// Error for the character under the cursor
    fn unexpected(&mut self) -> ParseError {
        match self.chars.peek() {
            Some(&(offset, found)) => ParseError::Unexpected {
                line: self.line,
                column: offset + 1,
                found,
            },
            None => ParseError::Unterminated {
                line: self.line,
                close: '}',
            },
        }
    }

    /// Comma-separated decimal numbers up to `close`, which is consumed
    ///
    /// An empty list is allowed; an empty item is not.
    fn number_list(&mut self, close: char) -> Result<Vec<String>, ParseError> {
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.eat(close) {
            return Ok(items);
        }

        loop {
            self.skip_whitespace();
            let mut number = String::new();
            while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                number.push(c);
                self.bump();
            }
            if number.is_empty() {
                return Err(self.unexpected_or_unterminated(close));
            }
            items.push(number);

            self.skip_whitespace();
            if self.eat(',') {
                continue;
            }
            if self.eat(close) {
                return Ok(items);
            }
            return Err(self.unexpected_or_unterminated(close));
        }
    }

    fn unexpected_or_unterminated(&mut self, close: char) -> ParseError {
        if self.peek().is_none() {
            ParseError::Unterminated {
                line: self.line,
                close,
            }
        } else {
            self.unexpected()
        }
    }
}

/// Lazily parses commands from a line-oriented reader
pub struct CommandSource<R> {
    lines: io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> CommandSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for CommandSource<R> {
    type Item = Result<Command, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Some(parse_line(&line, self.line_no));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor as IoCursor;

    #[test]
    fn test_parse_typical_line() {
        let cmd = parse_line("[.##.] (3) (1,3) (2) (2,3) (0,2) (0,1) {3,5,4,7}", 1).unwrap();
        assert_eq!(cmd.buttons(), &[0b1000, 0b1010, 0b0100, 0b1100, 0b0101, 0b0011]);
        assert_eq!(cmd.targets(), &[3, 5, 4, 7]);
    }

    #[test]
    fn test_parse_without_indicator() {
        let cmd = parse_line("(0, 9) {65535}", 1).unwrap();
        assert_eq!(cmd.buttons(), &[0b10_0000_0001]);
        assert_eq!(cmd.targets(), &[u16::MAX]);
    }

    #[test]
    fn test_parse_empty_groups() {
        let cmd = parse_line("[#] () {}", 1).unwrap();
        assert_eq!(cmd.buttons(), &[0]);
        assert!(cmd.targets().is_empty());
    }

    #[test]
    fn test_missing_targets() {
        assert!(matches!(
            parse_line("[..] (1) (2)", 4),
            Err(ParseError::MissingTargets { line: 4 })
        ));
    }

    #[test]
    fn test_counter_out_of_range() {
        assert!(matches!(
            parse_line("(10) {1}", 2),
            Err(ParseError::CounterOutOfRange { line: 2, counter }) if counter == "10"
        ));
    }

    #[test]
    fn test_target_overflow() {
        assert!(matches!(
            parse_line("(1) {65536}", 1),
            Err(ParseError::TargetOverflow { value, .. }) if value == "65536"
        ));
    }

    #[test]
    fn test_too_many_targets() {
        assert!(matches!(
            parse_line("(1) {1,2,3,4,5,6,7,8,9,10,11}", 3),
            Err(ParseError::Frame {
                line: 3,
                source: FrameError::TooManyTargets
            })
        ));
    }

    #[test]
    fn test_unexpected_character() {
        assert!(matches!(
            parse_line("(1) x {1}", 1),
            Err(ParseError::Unexpected {
                column: 5,
                found: 'x',
                ..
            })
        ));
        assert!(matches!(
            parse_line("(1) {1} trailing", 1),
            Err(ParseError::Unexpected { found: 't', .. })
        ));
        assert!(matches!(
            parse_line("(1,) {1}", 1),
            Err(ParseError::Unexpected { found: ')', .. })
        ));
    }

    #[test]
    fn test_unterminated() {
        assert!(matches!(
            parse_line("[.## (1) {1}", 1),
            Err(ParseError::Unterminated { close: ']', .. })
        ));
        assert!(matches!(
            parse_line("(1,2", 1),
            Err(ParseError::Unterminated { close: ')', .. })
        ));
        assert!(matches!(
            parse_line("(1) {1,2", 1),
            Err(ParseError::Unterminated { close: '}', .. })
        ));
    }

    #[test]
    fn test_source_skips_blank_lines_and_counts_lines() {
        let input = "(0) {1}\n\n   \n(1) {2}\n(bad) {3}\n";
        let mut source = CommandSource::from_reader(IoCursor::new(input));

        assert_eq!(source.next().unwrap().unwrap().targets(), &[1]);
        assert_eq!(source.next().unwrap().unwrap().targets(), &[2]);
        assert!(matches!(
            source.next(),
            Some(Err(ParseError::Unexpected { line: 5, .. }))
        ));
        assert!(source.next().is_none());
    }

    fn render(buttons: &[Vec<u8>], targets: &[u16]) -> String {
        let groups: Vec<String> = buttons
            .iter()
            .map(|digits| {
                let digits: Vec<String> = digits.iter().map(u8::to_string).collect();
                format!("({})", digits.join(","))
            })
            .collect();
        let targets: Vec<String> = targets.iter().map(u16::to_string).collect();
        format!("[.#] {} {{{}}}", groups.join(" "), targets.join(","))
    }

    proptest! {
        #[test]
        fn prop_rendered_line_parses_back(
            buttons in proptest::collection::vec(
                proptest::collection::vec(0u8..10, 0..=4),
                0..=12,
            ),
            targets in proptest::collection::vec(any::<u16>(), 0..=MACHINE_COUNT),
        ) {
            let cmd = parse_line(&render(&buttons, &targets), 1).unwrap();

            let masks: Vec<u16> = buttons.iter().map(|d| button_mask(d).unwrap()).collect();
            prop_assert_eq!(cmd.buttons(), &masks[..]);
            prop_assert_eq!(cmd.targets(), &targets[..]);
        }
    }
}
