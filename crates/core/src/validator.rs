/// Longest accepted domain in presentation form.
pub const MAX_DOMAIN_LEN: usize = 253;
/// Longest accepted single label.
pub const MAX_LABEL_LEN: usize = 63;
/// Shortest accepted top-level domain.
pub const MIN_TLD_LEN: usize = 2;

/// Returns `true` when `input` is a syntactically valid domain name.
///
/// The accepted grammar is `label ("." label)+`. Every label except the last
/// holds 1 to 63 ASCII letters, digits or hyphens and neither starts nor ends
/// with a hyphen. The last label (the TLD) is purely alphabetic and at least
/// two characters long. Matching is case-insensitive and never panics.
pub fn is_valid_domain(input: &str) -> bool {
    if input.is_empty() || input.len() > MAX_DOMAIN_LEN {
        return false;
    }

    let Some((host, tld)) = input.rsplit_once('.') else {
        return false;
    };

    is_valid_tld(tld) && host.split('.').all(is_valid_label)
}

fn is_valid_tld(tld: &str) -> bool {
    (MIN_TLD_LEN..=MAX_LABEL_LEN).contains(&tld.len())
        && tld.bytes().all(|b| b.is_ascii_alphabetic())
}

fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return false;
    }
    if label.starts_with('-') || label.ends_with('-') {
        return false;
    }
    label
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-')
}
