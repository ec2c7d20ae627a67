//! Bounded text helpers for outbound messages.
//!
//! Discord enforces its message length limit in UTF-16 code units, not
//! Unicode codepoints or bytes, so everything here measures UTF-16.

/// Discord's maximum message length, in UTF-16 code units.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

const ELLIPSIS: &str = "...";

/// UTF-16 length of a string.
pub fn len_utf16(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Bound `s` to at most `maxlen` UTF-16 code units, appending `...` when
/// truncation happens. Returns `s` unchanged when it already fits.
pub fn bound_str(s: &str, maxlen: usize) -> String {
    bound_str_with(s, maxlen, true)
}

/// Like [`bound_str`], with the ellipsis optional.
pub fn bound_str_with(s: &str, maxlen: usize, ellipsis: bool) -> String {
    if len_utf16(s) <= maxlen {
        return s.to_string();
    }
    if !ellipsis {
        return prefix_within(s, maxlen).to_string();
    }
    let ellipsis_len = len_utf16(ELLIPSIS);
    if maxlen < ellipsis_len {
        // No room for even the ellipsis; degrade to as many dots as fit.
        return ELLIPSIS[..maxlen].to_string();
    }
    let mut out = prefix_within(s, maxlen - ellipsis_len).to_string();
    out.push_str(ELLIPSIS);
    out
}

/// Longest char-boundary prefix of `s` whose UTF-16 length is at most
/// `maxlen`, found by bisecting over char counts. A naive `maxlen`-char
/// slice overshoots when the text contains surrogate pairs.
fn prefix_within(s: &str, maxlen: usize) -> &str {
    let chars: Vec<usize> = s.char_indices().map(|(i, _)| i).collect();
    let byte_end = |count: usize| chars.get(count).copied().unwrap_or(s.len());

    // Invariant: the first `lo` chars always fit; the first `hi + 1` never do.
    let mut lo = 0usize;
    let mut hi = chars.len();
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if len_utf16(&s[..byte_end(mid)]) <= maxlen {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    &s[..byte_end(lo)]
}

/// Substitute `args` into `{}` placeholders in `template`, then bound the
/// whole rendering to `max_total_len` UTF-16 code units (if given).
///
/// Surplus placeholders are left verbatim; surplus args are ignored.
pub fn format_maxlen<S: AsRef<str>>(
    template: &str,
    args: &[S],
    max_total_len: Option<usize>,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut parts = template.split("{}");
    if let Some(first) = parts.next() {
        out.push_str(first);
    }
    let mut args = args.iter();
    for part in parts {
        out.push_str(args.next().map(S::as_ref).unwrap_or("{}"));
        out.push_str(part);
    }
    match max_total_len {
        Some(max) => bound_str(&out, max),
        None => out,
    }
}

/// Single-line rendering of user-supplied text for log records.
pub fn sanitize_inline(s: &str) -> String {
    s.replace("\r\n", " ").replace(['\n', '\r'], " ")
}
