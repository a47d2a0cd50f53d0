//! Signed-cookie session scoped to the router's mount path.
//!
//! The browser carries two short-lived cookies, both signed with a key
//! derived from the configured session secret:
//! - the flow cookie, one per provider, binds an in-flight `state` token
//!   to this browser
//! - the failure cookie points the failure endpoint at the parked error

use std::time::Duration;

use sha2::{Digest, Sha512};
use socialgate_core::auth::{mount_path, Provider};
use tower_cookies::{cookie::SameSite, Cookie, Cookies, Key};
use url::Url;

use crate::error::ConfigError;

/// Shortest accepted session secret.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Clone)]
pub(crate) struct SessionSettings {
    key: Key,
    cookie_name: String,
    failure_cookie: String,
    path: String,
    secure: bool,
    max_age: time::Duration,
}

impl SessionSettings {
    /// # Errors
    ///
    /// Fails when the secret is missing or shorter than [`MIN_SECRET_LEN`].
    pub fn new(
        secret: Option<&str>,
        cookie_name: &str,
        base_url: &Url,
        ttl: Duration,
    ) -> Result<Self, ConfigError> {
        let secret = secret
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSessionSecret)?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSessionSecret(MIN_SECRET_LEN));
        }

        // cookie's Key wants exactly 64 bytes of key material.
        let key = Key::from(Sha512::digest(secret.as_bytes()).as_slice());

        let path = match mount_path(base_url) {
            p if p.is_empty() => "/".to_string(),
            p => p,
        };

        Ok(Self {
            key,
            cookie_name: cookie_name.to_string(),
            failure_cookie: format!("{cookie_name}_failure"),
            path,
            secure: base_url.scheme() == "https",
            max_age: time::Duration::seconds(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)),
        })
    }

    fn flow_cookie(&self, provider: Provider) -> String {
        format!("{}_{provider}", self.cookie_name)
    }

    pub fn set_flow(&self, cookies: &Cookies, provider: Provider, state: &str) {
        cookies
            .signed(&self.key)
            .add(self.build(self.flow_cookie(provider), state.to_string()));
    }

    /// Reads and clears `provider`'s flow cookie.
    pub fn take_flow(&self, cookies: &Cookies, provider: Provider) -> Option<String> {
        self.take(cookies, &self.flow_cookie(provider))
    }

    pub fn set_failure(&self, cookies: &Cookies, id: &str) {
        cookies
            .signed(&self.key)
            .add(self.build(self.failure_cookie.clone(), id.to_string()));
    }

    /// Reads and clears the failure cookie.
    pub fn take_failure(&self, cookies: &Cookies) -> Option<String> {
        self.take(cookies, &self.failure_cookie)
    }

    fn take(&self, cookies: &Cookies, name: &str) -> Option<String> {
        let signed = cookies.signed(&self.key);
        let value = signed.get(name).map(|c| c.value().to_string());
        if cookies.get(name).is_some() {
            signed.remove(self.build(name.to_string(), String::new()));
        }
        value
    }

    fn build(&self, name: String, value: String) -> Cookie<'static> {
        // Apple posts the callback cross-site, which browsers only send
        // SameSite=None cookies along with, and those must be Secure.
        let same_site = if self.secure {
            SameSite::None
        } else {
            SameSite::Lax
        };

        Cookie::build((name, value))
            .path(self.path.clone())
            .http_only(true)
            .secure(self.secure)
            .same_site(same_site)
            .max_age(self.max_age)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let result = SessionSettings::new(None, "flow", &url("https://x/auth"), Duration::from_secs(60));
        assert!(matches!(result, Err(ConfigError::MissingSessionSecret)));

        let result =
            SessionSettings::new(Some(""), "flow", &url("https://x/auth"), Duration::from_secs(60));
        assert!(matches!(result, Err(ConfigError::MissingSessionSecret)));
    }

    #[test]
    fn test_short_secret_is_rejected() {
        let result = SessionSettings::new(
            Some("oauth_secret"),
            "flow",
            &url("https://x/auth"),
            Duration::from_secs(60),
        );
        assert!(matches!(result, Err(ConfigError::WeakSessionSecret(32))));
    }

    #[test]
    fn test_cookie_scoped_to_mount_path() {
        let settings =
            SessionSettings::new(Some(SECRET), "flow", &url("https://x/auth/"), Duration::from_secs(600))
                .unwrap();
        let cookie = settings.build("flow".to_string(), "v".to_string());

        assert_eq!(cookie.path(), Some("/auth"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(600)));
    }

    #[test]
    fn test_flow_cookie_is_named_per_provider() {
        let settings =
            SessionSettings::new(Some(SECRET), "flow", &url("https://x/auth"), Duration::from_secs(60))
                .unwrap();

        assert_eq!(settings.flow_cookie(Provider::Google), "flow_google");
        assert_eq!(settings.flow_cookie(Provider::Apple), "flow_apple");
        assert_eq!(settings.failure_cookie, "flow_failure");
    }

    #[test]
    fn test_huge_ttl_keeps_max_age_positive() {
        let settings =
            SessionSettings::new(Some(SECRET), "flow", &url("https://x/auth"), Duration::from_secs(u64::MAX))
                .unwrap();
        let cookie = settings.build("flow".to_string(), "v".to_string());

        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(i64::MAX)));
    }

    #[test]
    fn test_plain_http_uses_lax_cookies_at_root() {
        let settings =
            SessionSettings::new(Some(SECRET), "flow", &url("http://localhost:3000"), Duration::from_secs(60))
                .unwrap();
        let cookie = settings.build("flow".to_string(), "v".to_string());

        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }
}
