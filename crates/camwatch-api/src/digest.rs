//! HTTP Digest authentication (RFC 7616 / RFC 2617, MD5 family).
//!
//! Cameras answer an unauthenticated request with `401` and a
//! `WWW-Authenticate: Digest ...` challenge. [`DigestChallenge::parse`]
//! reads that header and [`DigestChallenge::authorization`] produces the
//! matching `Authorization` value for a retry.

use md5::{Digest, Md5};
use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Username and password for one camera.
#[derive(Debug, Clone)]
pub struct DigestCredentials {
    pub username: String,
    pub password: SecretString,
}

impl DigestCredentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

/// Hash variant announced by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Md5,
    Md5Sess,
}

impl DigestAlgorithm {
    fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Md5Sess => "MD5-sess",
        }
    }
}

/// A parsed `WWW-Authenticate: Digest` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub algorithm: DigestAlgorithm,
    /// `true` when the server offered `qop=auth`. Without it we fall back
    /// to the RFC 2069 response form.
    pub qop_auth: bool,
}

impl DigestChallenge {
    /// Pick the first Digest challenge out of a response's headers.
    ///
    /// Cameras commonly send a Basic challenge alongside the Digest one.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, Error> {
        headers
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| is_digest_scheme(value))
            .ok_or_else(|| Error::DigestChallenge("no Digest challenge in response".into()))
            .and_then(Self::parse)
    }

    /// Parse a single `Digest realm="...", nonce="...", ...` header value.
    pub fn parse(header: &str) -> Result<Self, Error> {
        let header = header.trim();
        if !is_digest_scheme(header) {
            return Err(Error::DigestChallenge(format!(
                "not a Digest challenge: {header}"
            )));
        }
        let params = parse_params(header.get(6..).unwrap_or_default());

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut algorithm = DigestAlgorithm::Md5;
        let mut qop = None;

        for (key, value) in params {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "opaque" => opaque = Some(value),
                "qop" => qop = Some(value),
                "algorithm" => {
                    algorithm = match value.to_ascii_uppercase().as_str() {
                        "MD5" => DigestAlgorithm::Md5,
                        "MD5-SESS" => DigestAlgorithm::Md5Sess,
                        other => {
                            return Err(Error::DigestChallenge(format!(
                                "unsupported algorithm {other}"
                            )));
                        }
                    };
                }
                _ => {}
            }
        }

        let qop_auth = match qop {
            None => false,
            Some(list) => {
                if list.split(',').any(|q| q.trim().eq_ignore_ascii_case("auth")) {
                    true
                } else {
                    return Err(Error::DigestChallenge(format!("unsupported qop {list}")));
                }
            }
        };

        Ok(Self {
            realm: realm.ok_or_else(|| Error::DigestChallenge("missing realm".into()))?,
            nonce: nonce.ok_or_else(|| Error::DigestChallenge("missing nonce".into()))?,
            opaque,
            algorithm,
            qop_auth,
        })
    }

    /// Build the `Authorization` header value answering this challenge.
    ///
    /// `uri` is the request-target exactly as sent (path plus query).
    pub fn authorization(
        &self,
        credentials: &DigestCredentials,
        method: &str,
        uri: &str,
        nc: u32,
        cnonce: &str,
    ) -> String {
        let nc = format!("{nc:08x}");

        let mut ha1 = md5_hex(&format!(
            "{}:{}:{}",
            credentials.username,
            self.realm,
            credentials.password.expose_secret()
        ));
        if self.algorithm == DigestAlgorithm::Md5Sess {
            ha1 = md5_hex(&format!("{ha1}:{}:{cnonce}", self.nonce));
        }
        let ha2 = md5_hex(&format!("{method}:{uri}"));

        let response = if self.qop_auth {
            md5_hex(&format!("{ha1}:{}:{nc}:{cnonce}:auth:{ha2}", self.nonce))
        } else {
            md5_hex(&format!("{ha1}:{}:{ha2}", self.nonce))
        };

        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{uri}\", algorithm={}, response=\"{response}\"",
            credentials.username,
            self.realm,
            self.nonce,
            self.algorithm.as_str(),
        );
        if self.qop_auth {
            header.push_str(&format!(", qop=auth, nc={nc}, cnonce=\"{cnonce}\""));
        }
        if let Some(ref opaque) = self.opaque {
            header.push_str(&format!(", opaque=\"{opaque}\""));
        }
        header
    }
}

/// Generate a fresh client nonce.
pub fn new_cnonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn is_digest_scheme(value: &str) -> bool {
    value
        .get(..6)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("digest"))
        && value[6..].starts_with(char::is_whitespace)
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

/// Split `k1="v1", k2=v2, ...` honouring quoted strings and `\` escapes.
fn parse_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ',' {
                break;
            }
            key.push(c);
            chars.next();
        }
        let key = key.trim().to_owned();
        if key.is_empty() && chars.peek().is_none() {
            break;
        }

        let mut value = String::new();
        if chars.peek() == Some(&'=') {
            chars.next();
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            if chars.peek() == Some(&'"') {
                chars.next();
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        '"' => break,
                        _ => value.push(c),
                    }
                }
            } else {
                while let Some(&c) = chars.peek() {
                    if c == ',' {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
                value = value.trim().to_owned();
            }
        }

        if !key.is_empty() {
            params.push((key, value));
        }
    }

    params
}
