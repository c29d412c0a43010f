//! Splitting `-name=value` style argument lists.

use crate::codec::{self, DecodeError};
use crate::ParamValue;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static OPTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^--?(\w(?:[\w.:-]*\w)?)(?:=(.*))?$").expect("Invalid regex pattern")
});

/// Named options and the remaining positional arguments, in order.
pub type ParsedArgs = (BTreeMap<String, String>, Vec<String>);

/// Split a token sequence into named options and positional arguments.
///
/// - `-name=value` / `--name=value` set `name` to `value`.
/// - A bare `-name` / `--name` takes the next token verbatim as its value,
///   whatever that token looks like. At the end of the input it gets `""`.
/// - Everything else is positional.
///
/// Later occurrences of an option win. The input is only borrowed, so the
/// same slice can be parsed any number of times.
pub fn parse<S: AsRef<str>>(tokens: &[S]) -> ParsedArgs {
    let mut options = BTreeMap::new();
    let mut positionals = Vec::new();

    let mut iter = tokens.iter().map(|token| token.as_ref());
    while let Some(token) = iter.next() {
        match OPTION_REGEX.captures(token) {
            Some(caps) => {
                let name = caps[1].to_string();
                let value = match caps.get(2) {
                    Some(value) => value.as_str().to_string(),
                    None => iter.next().unwrap_or_default().to_string(),
                };
                options.insert(name, value);
            }
            None => positionals.push(token.to_string()),
        }
    }

    (options, positionals)
}

/// Like [`parse`], with each option value decoded into a parameter.
pub fn parse_params<S: AsRef<str>>(
    tokens: &[S],
) -> Result<(BTreeMap<String, ParamValue>, Vec<String>), DecodeError> {
    let (options, positionals) = parse(tokens);
    let params = options
        .into_iter()
        .map(|(name, raw)| Ok((name, codec::decode(&raw)?)))
        .collect::<Result<BTreeMap<_, _>, DecodeError>>()?;
    Ok((params, positionals))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_parse_mixed_tokens() {
        let (options, positionals) = parse(&["--foo=bar", "-x", "baz", "plain"]);
        assert_eq!(options, opts(&[("foo", "bar"), ("x", "baz")]));
        assert_eq!(positionals, vec!["plain"]);
    }

    #[test]
    fn test_bare_option_consumes_next_token_verbatim() {
        let (options, positionals) = parse(&["-input_id", "--not-an-option", "-flag", "-5", "tail"]);
        assert_eq!(options, opts(&[("input_id", "--not-an-option"), ("flag", "-5")]));
        assert_eq!(positionals, vec!["tail"]);
    }

    #[test]
    fn test_values_may_contain_equals_and_newlines() {
        let (options, _) = parse(&["-cmd=a=b", "--script=line1\nline2"]);
        assert_eq!(options["cmd"], "a=b");
        assert_eq!(options["script"], "line1\nline2");
    }

    #[test]
    fn test_lone_dashes_and_trailing_bare_option() {
        let (options, positionals) = parse(&["-", "--", "first", "--last"]);
        assert_eq!(positionals, vec!["-", "--", "first"]);
        assert_eq!(options, opts(&[("last", "")]));
    }

    #[test]
    fn test_parse_is_repeatable() {
        let tokens = vec!["-a".to_string(), "1".to_string(), "pos".to_string()];
        let first = parse(tokens.as_slice());
        let second = parse(tokens.as_slice());
        assert_eq!(first, second);
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_later_option_wins() {
        let (options, _) = parse(&["-a=1", "--a=2"]);
        assert_eq!(options["a"], "2");
    }

    #[test]
    fn test_parse_params_decodes_values() {
        let (params, positionals) =
            parse_params(&["-size=12", r#"-names=["x","y"]"#, "-label=hello", "out.txt"]).unwrap();
        assert_eq!(params["size"], ParamValue::Int(12));
        assert_eq!(params["names"], ParamValue::from(vec!["x", "y"]));
        assert_eq!(params["label"], ParamValue::from("hello"));
        assert_eq!(positionals, vec!["out.txt"]);

        assert!(parse_params(&["-broken=[1,"]).is_err());
    }

    #[test]
    fn test_parse_params_keeps_version_like_values_verbatim() {
        let (params, _) = parse_params(&["--version=1.10", "--run=12345678901234567890"]).unwrap();
        assert_eq!(params["version"], ParamValue::from("1.10"));
        assert_eq!(params["run"], ParamValue::from("12345678901234567890"));
    }

    #[test]
    fn test_dashed_names_and_empty_values_are_options() {
        let (options, positionals) = parse(&["--dry-run=1", "-a=", "--log.level", "debug", "-trailing-", "-x-=1"]);
        assert_eq!(options, opts(&[("dry-run", "1"), ("a", ""), ("log.level", "debug")]));
        assert_eq!(positionals, vec!["-trailing-", "-x-=1"]);
    }
}
