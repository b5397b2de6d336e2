//! Sibling ordering: labels compared with embedded numbers read as numbers

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::CharIndices;

/// Compare two labels treating every maximal run of ASCII digits as a number.
///
/// Everything else compares case-sensitively by character. Labels that only
/// differ in leading zeros fall back to a plain string compare so the order
/// stays total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.char_indices().peekable();
    let mut right = b.char_indices().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some((_, l)), Some((_, r))) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_run = digit_run(a, &mut left);
                let r_run = digit_run(b, &mut right);
                match numeric_cmp(l_run, r_run) {
                    Ordering::Equal => continue,
                    unequal => return unequal,
                }
            }
            (Some((_, l)), Some((_, r))) => {
                if l != r {
                    return l.cmp(&r);
                }
                left.next();
                right.next();
            }
        }
    }
}

fn digit_run<'a>(text: &'a str, chars: &mut Peekable<CharIndices<'a>>) -> &'a str {
    let start = match chars.peek() {
        Some(&(i, _)) => i,
        None => return "",
    };
    let mut end = start;
    while let Some(&(i, c)) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        end = i + c.len_utf8();
        chars.next();
    }
    &text[start..end]
}

// digit runs of arbitrary length, no integer overflow
fn numeric_cmp(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
