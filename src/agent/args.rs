use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
    #[error("unclosed quote in argument template")]
    UnterminatedQuote,

    #[error("trailing escape in argument template")]
    TrailingEscape,
}

/// Splits a shell-like argument template into tokens.
///
/// Supports single quotes (literal), double quotes (backslash escapes the next
/// character) and bare backslash escapes. No variable expansion or globbing.
pub fn tokenize(input: &str) -> Result<Vec<String>, ArgsError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for ch in input.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }

        if in_single {
            if ch == '\'' {
                in_single = false;
            } else {
                current.push(ch);
            }
            continue;
        }

        if in_double {
            match ch {
                '\\' => escaped = true,
                '"' => in_double = false,
                _ => current.push(ch),
            }
            continue;
        }

        match ch {
            ' ' | '\t' | '\n' | '\r' => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '\'' => {
                in_single = true;
                in_token = true;
            }
            '"' => {
                in_double = true;
                in_token = true;
            }
            '\\' => {
                escaped = true;
                in_token = true;
            }
            _ => {
                current.push(ch);
                in_token = true;
            }
        }
    }

    if escaped {
        return Err(ArgsError::TrailingEscape);
    }
    if in_single || in_double {
        return Err(ArgsError::UnterminatedQuote);
    }
    if in_token {
        args.push(current);
    }

    Ok(args)
}
