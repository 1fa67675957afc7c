use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, line_ending, space0, space1},
    combinator::opt,
    multi::many0,
    IResult,
};

/// A parsed Postfix main.cf, in file order.
///
/// Only used for inspection. Rewrites operate on raw lines so that
/// everything not explicitly removed is written back byte-for-byte.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub entries: Vec<ConfigLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigLine {
    /// A key = value pair, with continuation lines folded into the value
    KeyValue { key: String, value: String },
    /// A comment line (including the # prefix)
    Comment(String),
    /// An empty/blank line
    Blank,
}

/// Raw line shapes produced by the nom layer before continuations are folded.
enum RawLine {
    Line(ConfigLine),
    Continuation(String),
}

impl ConfigFile {
    /// Return all values for a given key (for keys that appear multiple times).
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|line| {
                if let ConfigLine::KeyValue { key: k, value: v } = line {
                    if k == key {
                        return Some(v.as_str());
                    }
                }
                None
            })
            .collect()
    }

    /// Every key = value pair whose key starts with `prefix`, in file order.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.entries.iter().filter_map(move |line| match line {
            ConfigLine::KeyValue { key, value } if key.starts_with(prefix) => {
                Some((key.as_str(), value.as_str()))
            }
            _ => None,
        })
    }
}

// nom parsers

fn is_not_newline(c: char) -> bool {
    c != '\n' && c != '\r'
}

fn comment_line(input: &str) -> IResult<&str, RawLine> {
    let (input, _) = space0(input)?;
    let (input, _) = char('#')(input)?;
    let (input, rest) = take_while(is_not_newline)(input)?;
    let (input, _) = opt(line_ending)(input)?;
    Ok((input, RawLine::Line(ConfigLine::Comment(format!("#{}", rest)))))
}

fn blank_line(input: &str) -> IResult<&str, RawLine> {
    let (input, _) = space0(input)?;
    let (input, _) = line_ending(input)?;
    Ok((input, RawLine::Line(ConfigLine::Blank)))
}

// Postfix: a line starting with whitespace continues the previous logical line.
fn continuation_line(input: &str) -> IResult<&str, RawLine> {
    let (input, _) = space1(input)?;
    let (input, text) = take_while1(is_not_newline)(input)?;
    let (input, _) = opt(line_ending)(input)?;
    Ok((input, RawLine::Continuation(text.trim_end().to_string())))
}

fn key_chars(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')(input)
}

fn key_value_line(input: &str) -> IResult<&str, RawLine> {
    let (input, key) = key_chars(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = char('=')(input)?;
    let (input, _) = space0(input)?;
    let (input, val) = take_while(is_not_newline)(input)?;
    let (input, _) = opt(line_ending)(input)?;
    Ok((
        input,
        RawLine::Line(ConfigLine::KeyValue {
            key: key.to_string(),
            value: val.trim_end().to_string(),
        }),
    ))
}

fn config_line(input: &str) -> IResult<&str, RawLine> {
    alt((comment_line, blank_line, continuation_line, key_value_line))(input)
}

pub fn parse_config(input: &str) -> Result<ConfigFile, String> {
    let (remaining, raw) =
        many0(config_line)(input).map_err(|e| format!("Parse error: {}", e))?;

    // Handle any remaining non-empty content
    if !remaining.trim().is_empty() {
        return Err(format!(
            "Unparsed content remaining: {:?}",
            remaining.chars().take(100).collect::<String>()
        ));
    }

    let mut entries: Vec<ConfigLine> = Vec::with_capacity(raw.len());
    for line in raw {
        match line {
            RawLine::Line(l) => entries.push(l),
            RawLine::Continuation(text) => match entries.last_mut() {
                Some(ConfigLine::KeyValue { value, .. }) => {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(&text);
                }
                _ => {
                    return Err(format!(
                        "Continuation line without a preceding parameter: {:?}",
                        text
                    ))
                }
            },
        }
    }

    Ok(ConfigFile { entries })
}
