//! Shared-secret authentication for admin requests.

use axum::http::{HeaderMap, HeaderName};
use subtle::ConstantTimeEq;

use crate::{AdminError, AuthError};

/// Header name the admin secret travels in unless configured otherwise.
pub const DEFAULT_ADMIN_HEADER: &str = "HOPNPOP16_ADMIN";

/// Secret accepted unless configured otherwise.
pub const DEFAULT_ADMIN_SECRET: &str = "bloodisthickerthanwater";

/// Checks the admin secret carried in a request header.
#[derive(Clone)]
pub struct AdminAuth {
    header: HeaderName,
    secret: Vec<u8>,
}

impl AdminAuth {
    pub fn new(header: &str, secret: impl Into<String>) -> Result<Self, AdminError> {
        let header = HeaderName::try_from(header)
            .map_err(|_| AdminError::InvalidHeader(header.to_string()))?;
        Ok(Self {
            header,
            secret: secret.into().into_bytes(),
        })
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Verifies the request headers. The secret comparison runs in
    /// constant time.
    pub fn check(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let Some(value) = headers.get(&self.header) else {
            return Err(AuthError::Unauthorized);
        };
        if value.as_bytes().ct_eq(self.secret.as_slice()).into() {
            Ok(())
        } else {
            Err(AuthError::Unauthorized)
        }
    }
}

impl std::fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuth")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(name: &str, value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(
            HeaderName::try_from(name).unwrap(),
            value.parse().unwrap(),
        );
        map
    }

    #[test]
    fn test_accepts_right_secret() {
        let auth = AdminAuth::new(DEFAULT_ADMIN_HEADER, DEFAULT_ADMIN_SECRET).unwrap();
        assert_eq!(auth.check(&headers("hopnpop16_admin", DEFAULT_ADMIN_SECRET)), Ok(()));
    }

    #[test]
    fn test_rejects_wrong_or_missing_secret() {
        let auth = AdminAuth::new(DEFAULT_ADMIN_HEADER, DEFAULT_ADMIN_SECRET).unwrap();
        assert_eq!(
            auth.check(&headers(DEFAULT_ADMIN_HEADER, "bloodisthickerthanwate")),
            Err(AuthError::Unauthorized)
        );
        assert_eq!(
            auth.check(&headers("x-other", DEFAULT_ADMIN_SECRET)),
            Err(AuthError::Unauthorized)
        );
        assert_eq!(auth.check(&HeaderMap::new()), Err(AuthError::Unauthorized));
    }

    #[test]
    fn test_invalid_header_name() {
        assert!(matches!(
            AdminAuth::new("bad header", "x"),
            Err(AdminError::InvalidHeader(_))
        ));
    }
}
