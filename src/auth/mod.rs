use lazy_static::lazy_static;
use regex::Regex;

pub(crate) mod extractors;
pub mod jwt;
pub mod password;

pub use extractors::AuthUser;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}
