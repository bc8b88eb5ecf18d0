//! Shell Word Splitting
//!
//! Splits a resolved command line into an argument vector following POSIX
//! shell rules, without any expansion:
//!
//! - Unquoted whitespace separates words
//! - Single quotes preserve everything literally
//! - Double quotes preserve everything except `\` before `$`, `` ` ``, `"`, `\` or newline
//! - An unquoted backslash escapes the next character; backslash-newline is removed
//! - Adjacent quoted and unquoted parts join into one word; `''` is an empty word

use crate::error::ShellSplitError;

#[derive(Clone, Copy, PartialEq)]
enum State {
    /// Between words
    Delimiter,
    /// Inside an unquoted part of a word
    Unquoted,
    SingleQuoted,
    DoubleQuoted,
}

/// Splits `input` into words.
///
/// # Example
///
/// ```
/// use toolflow::execution::shell::split_words;
///
/// let argv = split_words(r#"image convert "my photo.jpg" out\ file.png"#).unwrap();
/// assert_eq!(argv, vec!["image", "convert", "my photo.jpg", "out file.png"]);
/// ```
pub fn split_words(input: &str) -> Result<Vec<String>, ShellSplitError> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut state = State::Delimiter;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        state = match state {
            State::Delimiter | State::Unquoted => match c {
                '\'' => State::SingleQuoted,
                '"' => State::DoubleQuoted,
                '\\' => match chars.next() {
                    Some('\n') => state,
                    Some(escaped) => {
                        word.push(escaped);
                        State::Unquoted
                    }
                    None => return Err(ShellSplitError::TrailingEscape),
                },
                c if c.is_whitespace() => {
                    if state == State::Unquoted {
                        words.push(std::mem::take(&mut word));
                    }
                    State::Delimiter
                }
                c => {
                    word.push(c);
                    State::Unquoted
                }
            },
            State::SingleQuoted => match c {
                '\'' => State::Unquoted,
                c => {
                    word.push(c);
                    State::SingleQuoted
                }
            },
            State::DoubleQuoted => match c {
                '"' => State::Unquoted,
                '\\' => {
                    match chars.next() {
                        Some('\n') => {}
                        Some(escaped @ ('$' | '`' | '"' | '\\')) => word.push(escaped),
                        Some(other) => {
                            word.push('\\');
                            word.push(other);
                        }
                        None => return Err(ShellSplitError::UnterminatedQuote('"')),
                    }
                    State::DoubleQuoted
                }
                c => {
                    word.push(c);
                    State::DoubleQuoted
                }
            },
        };
    }

    match state {
        State::SingleQuoted => Err(ShellSplitError::UnterminatedQuote('\'')),
        State::DoubleQuoted => Err(ShellSplitError::UnterminatedQuote('"')),
        State::Unquoted => {
            words.push(word);
            Ok(words)
        }
        State::Delimiter => Ok(words),
    }
}
