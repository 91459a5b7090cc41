use once_cell::sync::Lazy;
use rand::{thread_rng, Rng};
use regex::Regex;
use secrecy::{ExposeSecret, Secret};
use sqlx::{
    error::BoxDynError,
    postgres::{PgTypeInfo, PgValueRef},
    Decode, Postgres, Type,
};
use std::ops::RangeInclusive;
use subtle::ConstantTimeEq;

pub const OTP_LENGTH: usize = 6;
const OTP_RANGE: RangeInclusive<u32> = 100_000..=999_999;

pub fn otp_regex() -> String {
    format!(r"[0-9]{{{OTP_LENGTH}}}")
}

/// A six digit one-time passcode.
#[derive(Clone, Debug)]
pub struct OtpCode(Secret<String>);

impl OtpCode {
    pub fn generate() -> Self {
        Self::generate_with_rng(&mut thread_rng())
    }

    fn generate_with_rng(rng: &mut impl Rng) -> Self {
        let code = rng.gen_range(OTP_RANGE);
        Self(Secret::new(code.to_string()))
    }

    pub fn parse(s: String) -> Result<Self, String> {
        static RE: Lazy<Regex> = Lazy::new(|| {
            Regex::new(&format!("^{}$", otp_regex())).expect("OTP pattern is a valid regex")
        });

        let code = s.trim();
        if RE.is_match(code) {
            Ok(Self(Secret::new(code.to_owned())))
        } else {
            Err(format!("OTP must be {OTP_LENGTH} digits"))
        }
    }

    /// Compares both codes without short-circuiting on the first differing byte.
    pub fn matches(&self, other: &OtpCode) -> bool {
        self.expose_secret()
            .as_bytes()
            .ct_eq(other.expose_secret().as_bytes())
            .into()
    }
}

impl ExposeSecret<String> for OtpCode {
    fn expose_secret(&self) -> &String {
        self.0.expose_secret()
    }
}

impl Type<Postgres> for OtpCode {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for OtpCode {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let code = <String as Decode<Postgres>>::decode(value)?;
        Self::parse(code).map_err(|e| e.into())
    }
}
