//! Zero-cost local email classification.
//!
//! Two checks that never touch the verification provider (and therefore
//! consume no quota): RFC-5322-style syntax validation, and exact membership
//! of the domain in a curated disposable-provider list. Anything that passes
//! both is `None` — undecidable locally, queued for remote verification.

use std::sync::OnceLock;

use regex::Regex;

use crate::db::types::{STATUS_DISPOSABLE, STATUS_INVALID};

/// Pragmatic RFC-5322 subset (the WHATWG email pattern, with a dotted domain
/// required). Intentionally stricter than the full grammar: quoted local
/// parts and domain literals are not deliverable addresses for this pipeline.
fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            ^[A-Za-z0-9.!\#$%&'*+/=?^_`{|}~-]+
            @
            [A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?
            (?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
        )
        .expect("email regex")
    })
}

/// Known disposable-email providers. Matched exactly and case-insensitively:
/// a subdomain of a listed domain is NOT blocked, only the exact domain is.
const DISPOSABLE_DOMAINS: &[&str] = &[
    "10minutemail.com",
    "20minutemail.com",
    "33mail.com",
    "anonbox.net",
    "burnermail.io",
    "byom.de",
    "discard.email",
    "dispostable.com",
    "emailondeck.com",
    "fakeinbox.com",
    "getairmail.com",
    "getnada.com",
    "guerrillamail.com",
    "guerrillamail.net",
    "guerrillamail.org",
    "harakirimail.com",
    "inboxkitten.com",
    "incognitomail.org",
    "jetable.org",
    "mail-temporaire.fr",
    "mail7.io",
    "mailcatch.com",
    "maildrop.cc",
    "maildu.de",
    "mailexpire.com",
    "mailinator.com",
    "mailnesia.com",
    "mailsac.com",
    "mailslurp.com",
    "mintemail.com",
    "moakt.com",
    "mohmal.com",
    "mytemp.email",
    "nada.email",
    "owlymail.com",
    "sharklasers.com",
    "spam4.me",
    "spamgourmet.com",
    "tafmail.com",
    "temp-mail.io",
    "temp-mail.org",
    "tempail.com",
    "tempinbox.com",
    "tempmail.dev",
    "tempmailo.com",
    "tempr.email",
    "throwawaymail.com",
    "trash-mail.com",
    "trashmail.com",
    "trashmail.de",
    "wegwerfmail.de",
    "yopmail.com",
    "yopmail.fr",
    "zmail.info",
];

/// Classify an email without touching the remote provider.
///
/// Returns `Some("invalid")` for syntactically bad addresses,
/// `Some("disposable")` for exact disposable-domain matches, and `None`
/// when the address can only be decided remotely. Pure and side-effect-free.
pub fn classify_local(email: &str) -> Option<&'static str> {
    if !email_regex().is_match(email) {
        return Some(STATUS_INVALID);
    }

    // Domain = substring after the last '@' (the regex admits '@' only as
    // the local/domain separator, so rfind is exact here).
    let domain = match email.rfind('@') {
        Some(idx) => email[idx + 1..].to_lowercase(),
        None => return Some(STATUS_INVALID),
    };

    if DISPOSABLE_DOMAINS.contains(&domain.as_str()) {
        return Some(STATUS_DISPOSABLE);
    }

    None
}
