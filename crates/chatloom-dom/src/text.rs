//! Text normalization shared by capture and fingerprinting.

/// Collapse whitespace runs to single spaces and trim the ends.
///
/// Turn identity and fingerprint signatures both hash normalized text, so the
/// same function must be used everywhere a host string is compared.
pub fn normalize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_space = true;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}
