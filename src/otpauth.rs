// otpauth.rs
// Parser for `otpauth://totp/{label}?secret=...` provisioning URIs (the QR
// payload handed out by identity providers) and the matching export builder.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::totp::{
    Algorithm, DEFAULT_DIGITS, DEFAULT_PERIOD, MAX_DIGITS, TotpError, decode_secret,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    #[error("not an otpauth URI")]
    NotOtpauth,
    #[error("invalid label encoding")]
    InvalidLabel,
    #[error("missing secret")]
    MissingSecret,
    #[error("invalid secret")]
    InvalidSecret,
    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("invalid digits")]
    InvalidDigits,
    #[error("invalid period")]
    InvalidPeriod,
}

/// Fields recovered from an otpauth URI, ready to be stored as an entry.
/// `secret` is returned exactly as it appeared in the URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAuthenticator {
    pub secret: String,
    pub issuer: Option<String>,
    pub account_name: Option<String>,
    pub algorithm: Algorithm,
    pub digits: u32,
    pub period: u64,
}

pub fn parse_uri(raw: &str) -> Result<ParsedAuthenticator, UriError> {
    let url = Url::parse(raw.trim()).map_err(|_| UriError::NotOtpauth)?;
    if !url.scheme().eq_ignore_ascii_case("otpauth") {
        return Err(UriError::NotOtpauth);
    }
    match url.host_str() {
        Some(kind) if kind.eq_ignore_ascii_case("totp") => {}
        _ => return Err(UriError::NotOtpauth),
    }

    let path = url.path().strip_prefix('/').unwrap_or(url.path());
    let label = urlencoding::decode(path).map_err(|_| UriError::InvalidLabel)?;
    let (label_issuer, account_name) = match label.split_once(':') {
        Some((issuer, account)) => (non_empty(issuer), non_empty(account)),
        None => (None, non_empty(&label)),
    };

    let mut secret = None;
    let mut query_issuer = None;
    let mut algorithm = None;
    let mut digits = None;
    let mut period = None;
    // first occurrence of each key wins
    for (key, value) in url.query_pairs() {
        match key.to_ascii_lowercase().as_str() {
            "secret" if secret.is_none() => secret = Some(value.into_owned()),
            "issuer" if query_issuer.is_none() => query_issuer = Some(value.into_owned()),
            "algorithm" if algorithm.is_none() => algorithm = Some(value.into_owned()),
            "digits" if digits.is_none() => digits = Some(value.into_owned()),
            "period" if period.is_none() => period = Some(value.into_owned()),
            _ => {}
        }
    }

    let secret = secret.ok_or(UriError::MissingSecret)?;
    check_secret(&secret)?;

    let algorithm = match algorithm.as_deref().map(str::trim) {
        None | Some("") => Algorithm::default(),
        Some(value) => value
            .parse::<Algorithm>()
            .map_err(|_| UriError::UnsupportedAlgorithm)?,
    };
    let digits = match digits.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_DIGITS,
        Some(value) => match value.parse::<u32>() {
            Ok(d) if (1..=MAX_DIGITS).contains(&d) => d,
            _ => return Err(UriError::InvalidDigits),
        },
    };
    let period = match period.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_PERIOD,
        Some(value) => match value.parse::<u64>() {
            Ok(p) if p > 0 => p,
            _ => return Err(UriError::InvalidPeriod),
        },
    };

    Ok(ParsedAuthenticator {
        secret,
        issuer: query_issuer.as_deref().and_then(non_empty).or(label_issuer),
        account_name,
        algorithm,
        digits,
        period,
    })
}

/// Inverse of [`parse_uri`]: the otpauth URI an authenticator app can enroll.
pub fn build_uri(parsed: &ParsedAuthenticator) -> Result<String, TotpError> {
    let secret = decode_secret(&parsed.secret)?;
    let algorithm = match parsed.algorithm {
        Algorithm::Sha1 => totp_rs::Algorithm::SHA1,
        Algorithm::Sha256 => totp_rs::Algorithm::SHA256,
        Algorithm::Sha512 => totp_rs::Algorithm::SHA512,
    };
    let totp = totp_rs::TOTP::new_unchecked(
        algorithm,
        parsed.digits as usize,
        0,
        parsed.period,
        secret,
        parsed.issuer.clone(),
        parsed.account_name.clone().unwrap_or_default(),
    );
    Ok(totp.get_url())
}

// Separators a provider may insert for readability; only emptiness is checked
// here, the canonical form is produced when the entry is saved.
fn check_secret(secret: &str) -> Result<(), UriError> {
    let stripped: String = secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    if stripped.trim_end_matches('=').is_empty() {
        return Err(UriError::MissingSecret);
    }
    decode_secret(&stripped).map_err(|_| UriError::InvalidSecret)?;
    Ok(())
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_uri_round_trip() {
        let parsed = parse_uri(
            "otpauth://totp/Issuer:Account?secret=JBSWY3DPEHPK3PXP&algorithm=SHA256&digits=8&period=60",
        )
        .unwrap();
        assert_eq!(parsed.issuer.as_deref(), Some("Issuer"));
        assert_eq!(parsed.account_name.as_deref(), Some("Account"));
        assert_eq!(parsed.algorithm, Algorithm::Sha256);
        assert_eq!(parsed.algorithm.as_str(), "SHA256");
        assert_eq!(parsed.digits, 8);
        assert_eq!(parsed.period, 60);
        assert_eq!(parsed.secret, "JBSWY3DPEHPK3PXP");
    }

    #[test]
    fn defaults_apply_when_absent() {
        let parsed = parse_uri("otpauth://totp/Account?secret=ABCD").unwrap();
        assert_eq!(parsed.algorithm, Algorithm::Sha1);
        assert_eq!(parsed.digits, 6);
        assert_eq!(parsed.period, 30);
        assert_eq!(parsed.issuer, None);
        assert_eq!(parsed.account_name.as_deref(), Some("Account"));
    }

    #[test]
    fn label_is_url_decoded_and_split_on_first_colon() {
        let parsed = parse_uri(
            "otpauth://totp/Google%20Ads:foo%40bar.com:extra?secret=JBSWY3DPEHPK3PXP",
        )
        .unwrap();
        assert_eq!(parsed.issuer.as_deref(), Some("Google Ads"));
        assert_eq!(parsed.account_name.as_deref(), Some("foo@bar.com:extra"));

        let plain = parse_uri("otpauth://totp/alice@example.com?secret=JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(plain.account_name.as_deref(), Some("alice@example.com"));
        assert_eq!(plain.issuer, None);
    }

    #[test]
    fn query_issuer_wins_over_label() {
        let parsed = parse_uri(
            "otpauth://totp/Label%20Co:bob?secret=JBSWY3DPEHPK3PXP&issuer=Query+Co",
        )
        .unwrap();
        assert_eq!(parsed.issuer.as_deref(), Some("Query Co"));
        assert_eq!(parsed.account_name.as_deref(), Some("bob"));

        let only_query = parse_uri("otpauth://totp/bob?secret=JBSWY3DPEHPK3PXP&issuer=Meta").unwrap();
        assert_eq!(only_query.issuer.as_deref(), Some("Meta"));

        let empty_query = parse_uri("otpauth://totp/TikTok:bob?secret=JBSWY3DPEHPK3PXP&issuer=").unwrap();
        assert_eq!(empty_query.issuer.as_deref(), Some("TikTok"));
    }

    #[test]
    fn algorithm_is_case_insensitive() {
        let parsed = parse_uri("otpauth://totp/a?secret=JBSWY3DPEHPK3PXP&algorithm=sha512").unwrap();
        assert_eq!(parsed.algorithm, Algorithm::Sha512);
    }

    #[test]
    fn secret_is_returned_verbatim() {
        let parsed = parse_uri("otpauth://totp/a?secret=jbsw%20y3dp%20ehpk%203pxp").unwrap();
        assert_eq!(parsed.secret, "jbsw y3dp ehpk 3pxp");
    }

    #[test]
    fn scheme_and_type_are_enforced() {
        for raw in [
            "https://example.com/totp/a?secret=JBSWY3DPEHPK3PXP",
            "otpauth://hotp/a?secret=JBSWY3DPEHPK3PXP&counter=1",
            "JBSWY3DPEHPK3PXP",
            "",
            "otpauth:/totp/a?secret=JBSWY3DPEHPK3PXP",
        ] {
            assert_eq!(parse_uri(raw), Err(UriError::NotOtpauth), "{raw}");
        }
        assert!(parse_uri("OTPAUTH://TOTP/a?secret=JBSWY3DPEHPK3PXP").is_ok());
    }

    #[test]
    fn missing_or_blank_secret_is_rejected() {
        assert_eq!(parse_uri("otpauth://totp/a"), Err(UriError::MissingSecret));
        assert_eq!(parse_uri("otpauth://totp/a?issuer=X"), Err(UriError::MissingSecret));
        assert_eq!(parse_uri("otpauth://totp/a?secret="), Err(UriError::MissingSecret));
        assert_eq!(parse_uri("otpauth://totp/a?secret=%20-%20"), Err(UriError::MissingSecret));
    }

    #[test]
    fn malformed_values_fail_instead_of_defaulting() {
        assert_eq!(
            parse_uri("otpauth://totp/a?secret=JBSWY3DPEHPK3PX1"),
            Err(UriError::InvalidSecret)
        );
        assert_eq!(
            parse_uri("otpauth://totp/a?secret=JBSWY3DPEHPK3PXP&algorithm=MD5"),
            Err(UriError::UnsupportedAlgorithm)
        );
        for digits in ["0", "-6", "six", "65"] {
            assert_eq!(
                parse_uri(&format!("otpauth://totp/a?secret=JBSWY3DPEHPK3PXP&digits={digits}")),
                Err(UriError::InvalidDigits),
                "{digits}"
            );
        }
        for period in ["0", "-30", "1.5"] {
            assert_eq!(
                parse_uri(&format!("otpauth://totp/a?secret=JBSWY3DPEHPK3PXP&period={period}")),
                Err(UriError::InvalidPeriod),
                "{period}"
            );
        }
    }

    #[test]
    fn long_digit_counts_are_accepted() {
        let parsed =
            parse_uri("otpauth://totp/a?secret=JBSWY3DPEHPK3PXP&digits=12").unwrap();
        assert_eq!(parsed.digits, 12);
        let widest = format!("otpauth://totp/a?secret=JBSWY3DPEHPK3PXP&digits={MAX_DIGITS}");
        assert_eq!(parse_uri(&widest).unwrap().digits, MAX_DIGITS);
    }

    #[test]
    fn error_messages_match_user_facing_taxonomy() {
        assert_eq!(UriError::NotOtpauth.to_string(), "not an otpauth URI");
        assert_eq!(UriError::MissingSecret.to_string(), "missing secret");
        assert_eq!(UriError::UnsupportedAlgorithm.to_string(), "unsupported algorithm");
    }

    #[test]
    fn exported_uri_parses_back() {
        let original = ParsedAuthenticator {
            secret: "JBSWY3DPEHPK3PXP".to_string(),
            issuer: Some("Google Ads".to_string()),
            account_name: Some("foo@bar.com".to_string()),
            algorithm: Algorithm::Sha512,
            digits: 8,
            period: 60,
        };
        let uri = build_uri(&original).unwrap();
        assert!(uri.starts_with("otpauth://totp/"));
        assert_eq!(parse_uri(&uri).unwrap(), original);
    }
}
