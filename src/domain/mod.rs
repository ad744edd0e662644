//! Input normalization: IDN to ASCII, then reduction to the registrable
//! domain (public suffix plus one label).

mod error;

pub use error::DomainError;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

/// A domain ready to be checked: ASCII, lower-case, registrable.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDomain {
    pub input: String,
    pub ascii: String,
    /// Public suffix the domain is delegated from (`com`, `co.uk`, ...).
    pub registry: String,
    /// Whether the suffix is part of the ICANN section of the list.
    pub icann: bool,
}

impl NormalizedDomain {
    /// Wrap a name that was already normalized by the caller.
    ///
    /// The name is still label-checked and its registry suffix is derived,
    /// but it is not reduced further.
    pub fn new(ascii: impl Into<String>) -> Result<Self, DomainError> {
        let input = ascii.into();
        let ascii = strip_root(input.trim()).to_ascii_lowercase();
        if ascii.is_empty() {
            return Err(DomainError::EmptyDomain);
        }
        check_labels(&ascii)?;
        let (registry, icann) = registry_of(&ascii);
        if registry == ascii {
            return Err(DomainError::not_registrable(ascii));
        }
        Ok(Self {
            input,
            ascii,
            registry,
            icann,
        })
    }
}

/// Normalize free-form user input: `"www.Exämple.co.uk."` becomes
/// `"xn--exmple-cua.co.uk"` with registry `co.uk`.
pub fn normalize_domain(input: &str) -> Result<NormalizedDomain, DomainError> {
    let trimmed = strip_root(input.trim());
    if trimmed.is_empty() {
        return Err(DomainError::EmptyDomain);
    }
    let ascii = idna::domain_to_ascii(trimmed).map_err(DomainError::idna)?;
    if ascii.is_empty() {
        return Err(DomainError::EmptyDomain);
    }
    check_labels(&ascii)?;

    let registrable = psl::domain_str(&ascii)
        .ok_or_else(|| DomainError::not_registrable(ascii.as_str()))?
        .to_string();
    let (registry, icann) = registry_of(&registrable);

    Ok(NormalizedDomain {
        input: input.to_string(),
        ascii: registrable,
        registry,
        icann,
    })
}

fn strip_root(domain: &str) -> &str {
    domain.strip_suffix('.').unwrap_or(domain)
}

fn registry_of(ascii: &str) -> (String, bool) {
    match psl::suffix(ascii.as_bytes()) {
        Some(suffix) => {
            let registry = String::from_utf8_lossy(suffix.as_bytes()).into_owned();
            let icann = suffix.typ() == Some(psl::Type::Icann);
            (registry, icann)
        }
        None => {
            // pas de suffixe connu: on prend le dernier label
            let last = ascii.rsplit('.').next().unwrap_or(ascii);
            (last.to_string(), false)
        }
    }
}

fn check_labels(ascii: &str) -> Result<(), DomainError> {
    for label in ascii.split('.') {
        let valid = !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(DomainError::invalid_label(label));
        }
    }
    if ascii.len() > 253 {
        return Err(DomainError::invalid_label(ascii));
    }
    Ok(())
}
