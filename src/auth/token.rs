//! JSON web tokens and the extractors that read them from the `Authorization` header.

use std::fmt::Debug;

use axum::{
    RequestPartsExt,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{Error, Role, UserID};

/// How long a token is valid for after logging in.
pub const DEFAULT_TOKEN_DURATION: Duration = Duration::days(1);

/// The keys used to sign and verify tokens, derived from the server secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    /// Create HMAC signing keys from `secret`.
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtKeys { .. }")
    }
}

/// The contents of a JSON Web Token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The ID of the user the token was issued to.
    pub sub: i64,
    /// The user's role when the token was issued.
    pub role: Role,
    /// The expiry time of the token as a unix timestamp.
    pub exp: i64,
    /// The time the token was issued as a unix timestamp.
    pub iat: i64,
}

/// Create a token for `user_id` that expires `duration` from now.
///
/// # Errors
/// Returns [Error::TokenCreation] if the token could not be signed.
pub fn encode_token(
    user_id: UserID,
    role: Role,
    duration: Duration,
    keys: &JwtKeys,
) -> Result<String, Error> {
    let now = OffsetDateTime::now_utc();
    let claims = Claims {
        sub: user_id.as_i64(),
        role,
        exp: (now + duration).unix_timestamp(),
        iat: now.unix_timestamp(),
    };

    encode(&Header::default(), &claims, &keys.encoding)
        .map_err(|error| Error::TokenCreation(error.to_string()))
}

/// Verify `token` and return its claims.
///
/// # Errors
/// Returns [Error::InvalidToken] if the signature does not match or the token has expired.
pub fn decode_token(token: &str, keys: &JwtKeys) -> Result<Claims, Error> {
    decode::<Claims>(token, &keys.decoding, &Validation::default())
        .map(|token_data| token_data.claims)
        .map_err(|error| {
            tracing::debug!("rejected bearer token: {error}");
            Error::InvalidToken
        })
}

/// The user making a request, read from a valid bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    /// The ID of the logged in user.
    pub id: UserID,
    /// The role the user had when they logged in.
    pub role: Role,
}

impl<S> FromRequestParts<S> for AuthUser
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|rejection| {
                if rejection.is_missing() {
                    Error::MissingToken
                } else {
                    Error::InvalidToken
                }
            })?;

        let keys = JwtKeys::from_ref(state);
        let claims = decode_token(bearer.token(), &keys)?;

        Ok(AuthUser {
            id: UserID::new(claims.sub),
            role: claims.role,
        })
    }
}

/// A logged in user with the [Role::Admin] role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        match user.role {
            Role::Admin => Ok(AdminUser(user)),
            Role::User => {
                tracing::warn!("User {} tried to access an admin route", user.id);
                Err(Error::Forbidden)
            }
        }
    }
}


#[cfg(test)]
mod extractor_tests {
    use axum::{Json, Router, routing::get};
    use axum_test::TestServer;
    use serde_json::{Value, json};
    use time::Duration;

    use crate::{
        Role, UserID,
        auth::token::{AdminUser, AuthUser, JwtKeys, encode_token},
    };

    async fn whoami(user: AuthUser) -> Json<Value> {
        Json(json!({ "id": user.id.as_i64() }))
    }

    async fn admin_only(_admin: AdminUser) -> &'static str {
        "ok"
    }

    fn get_server(keys: JwtKeys) -> TestServer {
        let app = Router::new()
            .route("/whoami", get(whoami))
            .route("/admin", get(admin_only))
            .with_state(keys);

        TestServer::new(app)
    }

    #[tokio::test]
    async fn valid_token_identifies_user() {
        let keys = JwtKeys::new("foobar");
        let token = encode_token(UserID::new(7), Role::User, Duration::days(1), &keys).unwrap();
        let server = get_server(keys);

        let response = server.get("/whoami").authorization_bearer(token).await;

        response.assert_status_ok();
        response.assert_json(&json!({ "id": 7 }));
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let server = get_server(JwtKeys::new("foobar"));

        let response = server.get("/whoami").await;

        response.assert_status_unauthorized();
        assert_eq!(response.json::<Value>()["message"], "missing bearer token");
    }

    #[tokio::test]
    async fn bad_token_is_unauthorized() {
        let server = get_server(JwtKeys::new("foobar"));

        server
            .get("/whoami")
            .authorization_bearer("not.a.jwt")
            .await
            .assert_status_unauthorized();
    }

    #[tokio::test]
    async fn admin_route_rejects_regular_user() {
        let keys = JwtKeys::new("foobar");
        let user_token = encode_token(UserID::new(1), Role::User, Duration::days(1), &keys).unwrap();
        let admin_token =
            encode_token(UserID::new(2), Role::Admin, Duration::days(1), &keys).unwrap();
        let server = get_server(keys);

        server
            .get("/admin")
            .authorization_bearer(user_token)
            .await
            .assert_status_forbidden();
        server
            .get("/admin")
            .authorization_bearer(admin_token)
            .await
            .assert_status_ok();
    }
}
