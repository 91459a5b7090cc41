use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{
    error::BoxDynError,
    postgres::{PgTypeInfo, PgValueRef},
    Decode, Postgres, Type,
};
use std::fmt::{self, Display, Formatter};
use validator::validate_email;

pub const MAX_EMAIL_LENGTH: usize = 254;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$")
        .expect("Email pattern is a valid regex")
});

/// A trimmed, lowercased email address that passed syntax checks.
#[derive(Clone, Debug, PartialEq)]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    pub fn parse(s: String) -> Result<SubscriberEmail, String> {
        let normalized = s.trim().to_lowercase();

        match normalized {
            _ if normalized.is_empty() => Err("Email is empty".into()),
            _ if normalized.len() > MAX_EMAIL_LENGTH => Err(format!(
                "Email is longer than {MAX_EMAIL_LENGTH} characters"
            )),
            _ if !validate_email(&normalized) || !EMAIL_PATTERN.is_match(&normalized) => {
                Err(format!("`{normalized}` email has invalid format"))
            }
            _ => Ok(Self(normalized)),
        }
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for SubscriberEmail {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Type<Postgres> for SubscriberEmail {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for SubscriberEmail {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let email = <String as Decode<Postgres>>::decode(value)?;
        Self::parse(email).map_err(|e| e.into())
    }
}
