//! Interactive function selection.

use std::io::{self, BufRead, Write};

use crate::domain::metadata::FunctionName;

/// Outcome of one line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Quit,
    Functions(Vec<FunctionName>),
    /// Nothing usable; ask again.
    Invalid,
}

/// Interpret a reply against the numbered `functions` menu (1-based).
/// Out-of-range numbers are ignored; any non-number makes the reply invalid.
pub fn parse_selection(input: &str, functions: &[FunctionName]) -> Selection {
    let choice = input.trim().to_lowercase();
    match choice.as_str() {
        "q" => return Selection::Quit,
        "a" => return Selection::All,
        _ => {}
    }

    let mut selected = Vec::new();
    for token in choice.split_whitespace() {
        let Ok(n) = token.parse::<usize>() else {
            return Selection::Invalid;
        };
        if let Some(func) = n.checked_sub(1).and_then(|i| functions.get(i)) {
            if !selected.contains(func) {
                selected.push(func.clone());
            }
        }
    }

    if selected.is_empty() {
        Selection::Invalid
    } else {
        Selection::Functions(selected)
    }
}

/// Show the menu and read replies until one is usable. `None` means the user
/// quit or input ended.
pub fn prompt_selection<R: BufRead, W: Write>(
    functions: &[FunctionName],
    input: &mut R,
    out: &mut W,
) -> io::Result<Option<Vec<FunctionName>>> {
    writeln!(out, "\nAvailable functions:")?;
    for (i, func) in functions.iter().enumerate() {
        writeln!(out, "{:2}. {}", i + 1, func)?;
    }
    writeln!(out, "\nEnter numbers (e.g. 1 2 3), 'a' for all, or 'q' to quit.")?;

    let mut line = String::new();
    loop {
        write!(out, "\nYour selection: ")?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        match parse_selection(&line, functions) {
            Selection::All => return Ok(Some(functions.to_vec())),
            Selection::Quit => return Ok(None),
            Selection::Functions(selected) => return Ok(Some(selected)),
            Selection::Invalid => writeln!(out, "No valid functions selected. Please try again.")?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn names() -> Vec<FunctionName> {
        vec!["helper".to_string(), "main".to_string(), "util".to_string()]
    }

    #[test]
    fn test_parse_selection() {
        let functions = names();
        assert_eq!(parse_selection("A\n", &functions), Selection::All);
        assert_eq!(parse_selection(" q ", &functions), Selection::Quit);
        assert_eq!(
            parse_selection("3 1 3 9", &functions),
            Selection::Functions(vec!["util".to_string(), "helper".to_string()])
        );
        assert_eq!(parse_selection("0", &functions), Selection::Invalid);
        assert_eq!(parse_selection("two", &functions), Selection::Invalid);
        assert_eq!(parse_selection("", &functions), Selection::Invalid);
    }

    #[test]
    fn test_prompt_retries_then_selects() {
        let functions = names();
        let mut input = Cursor::new("x\n2\n");
        let mut out = Vec::new();
        let selected = prompt_selection(&functions, &mut input, &mut out).unwrap();
        assert_eq!(selected, Some(vec!["main".to_string()]));
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains(" 2. main"));
        assert!(shown.contains("Please try again"));
    }

    #[test]
    fn test_prompt_eof_cancels() {
        let functions = names();
        let mut input = Cursor::new("");
        let mut out = Vec::new();
        assert_eq!(prompt_selection(&functions, &mut input, &mut out).unwrap(), None);
    }
}
