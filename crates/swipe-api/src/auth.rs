use axum::http::HeaderMap;

use crate::error::AppError;

/// Identity of an authenticated trigger caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub name: &'static str,
}

/// Resolves trigger bearer tokens to a [`Caller`].
#[derive(Clone)]
pub struct TriggerAuthority {
    token: String,
}

impl TriggerAuthority {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn resolve(&self, token: &str) -> Result<Caller, AppError> {
        if constant_time_eq(token.as_bytes(), self.token.as_bytes()) {
            Ok(Caller { name: "scheduler" })
        } else {
            Err(AppError::unauthorized("Trigger token is not recognised"))
        }
    }
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not valid UTF-8"))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AppError::unauthorized("Authorization header must be `Bearer <token>`"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized(
            "Authorization scheme must be `Bearer`",
        ));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::unauthorized("Bearer token is empty"));
    }

    Ok(token)
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right)
        .fold(0_u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}
