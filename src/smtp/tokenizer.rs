//! Argument splitting and address extraction shared by every command
//! handler in [`crate::smtp::session`].

/// Splits a command's argument text on runs of spaces and colons,
/// discarding empty runs. `"FROM:<a@b> SIZE=10"` becomes
/// `["FROM", "<a@b>", "SIZE=10"]` — callers that need just the address
/// use [`find_email_in_line`] on the raw line instead.
pub fn arg_split(s: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut curr = String::new();
    for c in s.chars() {
        if c == ' ' || c == ':' {
            if !curr.is_empty() {
                args.push(std::mem::take(&mut curr));
            }
        } else {
            curr.push(c);
        }
    }
    if !curr.is_empty() {
        args.push(curr);
    }
    args
}

/// Finds the first `<...>`-bracketed address in `line` and validates it
/// loosely as `local@domain` (no whitespace, exactly the shape
/// `[^\s@]+@[^\s@]+`). Returns `None` if no bracket pair is found, the
/// brackets are out of order, or the enclosed text doesn't look like an
/// address.
///
/// The closing bracket is the *last* `>` in the line and the opening
/// bracket is the *first* `<`, so trailing parameters after the
/// address (e.g. `SIZE=...`) don't confuse the match.
pub fn find_email_in_line(line: &str) -> Option<String> {
    let mut lt: Option<usize> = None;
    let mut gt: Option<usize> = None;
    for (i, c) in line.char_indices() {
        if c == '>' {
            gt = Some(i);
        } else if c == '<' && lt.is_none() {
            lt = Some(i);
        }
    }
    let (lt, gt) = match (lt, gt) {
        (Some(lt), Some(gt)) if lt < gt => (lt, gt),
        _ => return None,
    };
    let email = &line[lt + 1..gt];
    if is_addr_shaped(email) {
        Some(email.to_string())
    } else {
        None
    }
}

/// `^[^\s@]+@[^\s@]+$`: at least one non-space non-`@` char, a single
/// `@`, then at least one more non-space non-`@` char.
fn is_addr_shaped(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !local.contains('@')
                && !domain.contains('@')
                && !local.chars().any(char::is_whitespace)
                && !domain.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arg_split_on_space_and_colon() {
        assert_eq!(arg_split("RCPT TO:<a@b.com>"), vec!["RCPT", "TO", "<a@b.com>"]);
    }

    #[test]
    fn arg_split_collapses_runs() {
        assert_eq!(arg_split("MAIL  FROM:  <a@b.com>"), vec!["MAIL", "FROM", "<a@b.com>"]);
    }

    #[test]
    fn arg_split_empty_string() {
        assert!(arg_split("").is_empty());
    }

    #[test]
    fn find_email_basic() {
        assert_eq!(
            find_email_in_line("MAIL FROM:<user@example.com>"),
            Some("user@example.com".to_string())
        );
    }

    #[test]
    fn find_email_rejects_trailing_params_without_matching_shape() {
        // the last '>' in the line is used as the closing bracket, so a
        // trailing bracketed parameter after the address breaks the
        // simple local@domain shape and the match is rejected.
        assert_eq!(find_email_in_line("RCPT TO:<user@example.com> SIZE=<10000>"), None);
    }

    #[test]
    fn find_email_missing_brackets() {
        assert_eq!(find_email_in_line("MAIL FROM:user@example.com"), None);
    }

    #[test]
    fn find_email_reversed_brackets() {
        assert_eq!(find_email_in_line(">user@example.com<"), None);
    }

    #[test]
    fn find_email_rejects_no_at_sign() {
        assert_eq!(find_email_in_line("<notanaddress>"), None);
    }

    #[test]
    fn find_email_rejects_embedded_space() {
        assert_eq!(find_email_in_line("<user @example.com>"), None);
    }
}
