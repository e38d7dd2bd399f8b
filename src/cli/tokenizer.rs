//! Command-line tokenizer for the interactive client
//!
//! Splits a typed command line into fields on spaces, honoring double
//! quotes and backslash escapes inside them. A quote only opens at the
//! start of a field and only closes at the end of one; a quote character
//! in the middle of a word is literal. If the line ends with a quote still
//! open, the tail from the opening quote is replayed as whitespace-split
//! fields, so a forgotten closing quote degrades instead of swallowing the
//! rest of the line.

/// Tokenize one command line into argument fields
pub fn tokenize_command_line(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut ret = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut quote_idx = None;
    let mut escape_next = false;

    for (i, &c) in chars.iter().enumerate() {
        if escape_next {
            current.push(c);
            escape_next = false;
            continue;
        }

        if c == '\\' && in_quote {
            escape_next = true;
            continue;
        }

        if c == '"' {
            // Start of a quoted block
            if !in_quote && (i == 0 || chars[i - 1] == ' ') {
                in_quote = true;
                quote_idx = Some(i);
                continue;
            }
            // End of a quoted block
            if in_quote && (i == chars.len() - 1 || chars[i + 1] == ' ') {
                in_quote = false;
                quote_idx = None;
                continue;
            }
            // Literal quote inside a word
            current.push(c);
        } else if c == ' ' && !in_quote {
            if !current.is_empty() {
                ret.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }

    if in_quote {
        // The quote was never closed: treat the start-quote as literal and
        // re-split everything from it on whitespace.
        if let Some(idx) = quote_idx {
            let tail: String = chars[idx..].iter().collect();
            ret.extend(tail.split_whitespace().map(str::to_string));
        }
    } else if !current.is_empty() {
        ret.push(current);
    }

    ret
}
