//! OAuth2 / OIDC HTTP endpoints.
//!
//! - Authorization endpoint (`GET /oauth2/authorize`)
//! - Token endpoint (`POST /oauth2/token`)
//! - UserInfo (`GET|POST /oauth2/userinfo`)
//! - Discovery document (`GET /.well-known/openid-configuration`)

use axum::{
    Form, Json, Router,
    extract::{Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::error::OAuth2Error;
use crate::oauth2::codes::IssueCodeParams;
use crate::oauth2::state::OAuth2State;
use crate::oidc::claims;

/// Header a fronting authentication layer uses to assert the logged-in
/// subject. User authentication itself is out of scope for this server.
pub const SUBJECT_HEADER: &str = "x-authenticated-subject";

/// Request extension carrying the authenticated subject identifier.
#[derive(Debug, Clone)]
pub struct AuthenticatedSubject(pub String);

pub fn router(state: OAuth2State) -> Router {
    let authorize_routes = Router::new()
        .route("/oauth2/authorize", get(authorize))
        .route_layer(middleware::from_fn(require_subject));

    authorize_routes
        .route("/oauth2/token", post(token))
        .route("/oauth2/userinfo", get(userinfo).post(userinfo_post))
        .route("/.well-known/openid-configuration", get(openid_configuration))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Authorization request parameters.
#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    /// Must be "code" for the Authorization Code flow
    pub response_type: String,
    pub client_id: String,
    /// Must match a registered URI exactly
    pub redirect_uri: Option<String>,
    /// Space-separated list of requested scopes
    pub scope: Option<String>,
    /// Opaque value for CSRF protection, echoed back on the redirect
    pub state: Option<String>,
    /// PKCE code challenge (base64url-encoded)
    pub code_challenge: Option<String>,
    /// PKCE method: "S256" or "plain"
    pub code_challenge_method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub code_verifier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserInfoBody {
    pub access_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OpenIdConfiguration {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub claims_supported: Vec<String>,
}

// =============================================================================
// Middleware
// =============================================================================

/// Reject authorization requests that carry no authenticated subject.
pub async fn require_subject(mut request: Request, next: Next) -> Response {
    let subject = request
        .headers()
        .get(SUBJECT_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_owned);

    match subject {
        Some(subject) => {
            request
                .extensions_mut()
                .insert(AuthenticatedSubject(subject));
            next.run(request).await
        }
        None => error_response(
            StatusCode::UNAUTHORIZED,
            "access_denied",
            Some("authentication required"),
        ),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Authorization endpoint. Validates the client and redirect binding, then
/// issues a single-use authorization code and redirects back to the client.
#[tracing::instrument(skip(state, subject, params), fields(client_id = %params.client_id))]
pub async fn authorize(
    State(state): State<OAuth2State>,
    axum::Extension(subject): axum::Extension<AuthenticatedSubject>,
    Query(params): Query<AuthorizeRequest>,
) -> Response {
    // Client and redirect URI first. Until both check out, errors must not
    // be sent to the redirect URI.
    let client = match state.registry.find(&params.client_id).await {
        Ok(Some(client)) => client,
        Ok(None) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_client",
                Some("unknown client"),
            );
        }
        Err(err) => return oauth_error_response(&err),
    };

    let Some(redirect_uri) = params.redirect_uri.as_deref() else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            Some("redirect_uri is required"),
        );
    };
    if !client.is_redirect_uri_allowed(redirect_uri) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            Some("redirect_uri is not registered for this client"),
        );
    }

    // From here on the redirect URI is trusted and receives errors.
    if params.response_type != "code" {
        return error_redirect(
            Some(redirect_uri),
            params.state.as_deref(),
            "unsupported_response_type",
            Some("only response_type=code is supported"),
        );
    }

    let scope = params.scope.as_deref().unwrap_or("openid");
    let issued = state
        .codes
        .issue(IssueCodeParams {
            client_id: &params.client_id,
            redirect_uri,
            user_id: &subject.0,
            scope,
            code_challenge: params.code_challenge.as_deref(),
            code_challenge_method: params.code_challenge_method.as_deref(),
        })
        .await;

    let code = match issued {
        Ok(code) => code,
        Err(OAuth2Error::Pkce(err)) => {
            return error_redirect(
                Some(redirect_uri),
                params.state.as_deref(),
                "invalid_request",
                Some(&err.to_string()),
            );
        }
        Err(err) => return oauth_error_response(&err),
    };

    let mut location = match url::Url::parse(redirect_uri) {
        Ok(url) => url,
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                Some("redirect_uri is not a valid URL"),
            );
        }
    };
    location.query_pairs_mut().append_pair("code", &code);
    if let Some(req_state) = params.state.as_deref() {
        location.query_pairs_mut().append_pair("state", req_state);
    }

    Redirect::to(location.as_str()).into_response()
}

/// Token endpoint. Authenticates the client, then dispatches on grant type.
#[tracing::instrument(skip(state, headers, params))]
pub async fn token(
    State(state): State<OAuth2State>,
    headers: HeaderMap,
    Form(params): Form<TokenRequest>,
) -> Response {
    let (client_id, client_secret) = extract_client_credentials(&headers, &params);

    let Some(client_id) = client_id else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            Some("client_id is required"),
        );
    };
    let authenticated = match client_secret {
        Some(secret) => state.registry.validate(&client_id, &secret).await,
        None => false,
    };
    if !authenticated {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "invalid_client",
            Some("client authentication failed"),
        );
    }

    match params.grant_type.as_str() {
        "authorization_code" => handle_authorization_code_grant(&state, &client_id, &params).await,
        "refresh_token" => handle_refresh_token_grant(&state, &client_id, &params).await,
        other => {
            tracing::debug!(grant_type = other, "Unsupported grant type");
            error_response(
                StatusCode::BAD_REQUEST,
                "unsupported_grant_type",
                Some("supported grant types: authorization_code, refresh_token"),
            )
        }
    }
}

async fn handle_authorization_code_grant(
    state: &OAuth2State,
    client_id: &str,
    params: &TokenRequest,
) -> Response {
    let (Some(code), Some(redirect_uri)) = (params.code.as_deref(), params.redirect_uri.as_deref())
    else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            Some("code and redirect_uri are required"),
        );
    };

    let redeemed = match state
        .codes
        .redeem(code, client_id, redirect_uri, params.code_verifier.as_deref())
        .await
    {
        Ok(redeemed) => redeemed,
        Err(err) => return oauth_error_response(&err),
    };

    let access = match state
        .tokens
        .generate_access_token(&redeemed.user_id, &redeemed.client_id, &redeemed.scope, None)
        .await
    {
        Ok(access) => access,
        Err(err) => return oauth_error_response(&err),
    };
    let refresh_token = match state
        .tokens
        .generate_refresh_token(&redeemed.user_id, &redeemed.client_id)
        .await
    {
        Ok(token) => token,
        Err(err) => return oauth_error_response(&err),
    };

    let id_token = if redeemed.has_scope("openid") {
        let full_claims = state
            .claims
            .claims_for(&redeemed.user_id)
            .await
            .unwrap_or_default();
        let mut user_info = claims::project(&full_claims, &redeemed.scope);
        user_info.insert("sub".to_owned(), json!(redeemed.user_id));

        match state.id_tokens.generate(
            &user_info,
            &redeemed.client_id,
            &state.issuer_url,
            None,
            serde_json::Map::new(),
        ) {
            Ok(token) => Some(token),
            Err(err) => return oauth_error_response(&OAuth2Error::IdToken(err)),
        }
    } else {
        None
    };

    Json(TokenResponse {
        access_token: access.access_token,
        token_type: access.token_type.to_owned(),
        expires_in: access.expires_in,
        refresh_token: Some(refresh_token),
        id_token,
    })
    .into_response()
}

async fn handle_refresh_token_grant(
    state: &OAuth2State,
    client_id: &str,
    params: &TokenRequest,
) -> Response {
    let Some(refresh_token) = params.refresh_token.as_deref() else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            Some("refresh_token is required"),
        );
    };

    match state.tokens.refresh_access_token(refresh_token, client_id).await {
        Ok(grant) => Json(TokenResponse {
            access_token: grant.access_token,
            token_type: grant.token_type.to_owned(),
            expires_in: grant.expires_in,
            refresh_token: Some(grant.refresh_token),
            id_token: None,
        })
        .into_response(),
        Err(err) => oauth_error_response(&err),
    }
}

/// UserInfo endpoint (GET, Bearer header).
pub async fn userinfo(State(state): State<OAuth2State>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "invalid_token",
            Some("missing bearer token"),
        );
    };
    userinfo_response(&state, &token).await
}

/// UserInfo endpoint (POST). The token may come from the Authorization
/// header or the form body; the header wins when both are present.
pub async fn userinfo_post(
    State(state): State<OAuth2State>,
    headers: HeaderMap,
    Form(body): Form<UserInfoBody>,
) -> Response {
    let token = bearer_token(&headers).or(body.access_token);
    let Some(token) = token else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "invalid_token",
            Some("missing bearer token"),
        );
    };
    userinfo_response(&state, &token).await
}

async fn userinfo_response(state: &OAuth2State, token: &str) -> Response {
    let info = match state.tokens.validate_access_token(token).await {
        Ok(info) => info,
        Err(err) => return oauth_error_response(&err),
    };
    if !info.has_scope("openid") {
        return oauth_error_response(&OAuth2Error::InsufficientScope("openid".to_owned()));
    }

    let full_claims = state
        .claims
        .claims_for(&info.user_id)
        .await
        .unwrap_or_default();
    let mut response = claims::project(&full_claims, &info.scope);
    response.insert("sub".to_owned(), json!(info.user_id));

    Json(response).into_response()
}

pub async fn openid_configuration(State(state): State<OAuth2State>) -> Json<OpenIdConfiguration> {
    let issuer = state.issuer_url.trim_end_matches('/').to_owned();
    Json(OpenIdConfiguration {
        authorization_endpoint: format!("{issuer}/oauth2/authorize"),
        token_endpoint: format!("{issuer}/oauth2/token"),
        userinfo_endpoint: format!("{issuer}/oauth2/userinfo"),
        issuer,
        response_types_supported: vec!["code".to_owned()],
        grant_types_supported: vec!["authorization_code".to_owned(), "refresh_token".to_owned()],
        subject_types_supported: vec!["public".to_owned()],
        scopes_supported: vec![
            "openid".to_owned(),
            "profile".to_owned(),
            "email".to_owned(),
            "address".to_owned(),
            "phone".to_owned(),
        ],
        token_endpoint_auth_methods_supported: vec![
            "client_secret_basic".to_owned(),
            "client_secret_post".to_owned(),
        ],
        code_challenge_methods_supported: vec!["S256".to_owned(), "plain".to_owned()],
        id_token_signing_alg_values_supported: vec!["HS256".to_owned()],
        claims_supported: vec![
            "sub".to_owned(),
            "name".to_owned(),
            "preferred_username".to_owned(),
            "email".to_owned(),
            "email_verified".to_owned(),
        ],
    })
}

// =============================================================================
// Helpers
// =============================================================================

fn extract_client_credentials(
    headers: &HeaderMap,
    params: &TokenRequest,
) -> (Option<String>, Option<String>) {
    // Try Basic auth first
    if let Some(auth) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        && let Ok(decoded) =
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, auth)
        && let Ok(creds) = String::from_utf8(decoded)
        && let Some((id, secret)) = creds.split_once(':')
    {
        return (Some(id.to_string()), Some(secret.to_string()));
    }

    // Fall back to form body
    (params.client_id.clone(), params.client_secret.clone())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

/// Map a protocol error to its wire form.
fn oauth_error_response(err: &OAuth2Error) -> Response {
    match err {
        OAuth2Error::DuplicateClient(_) => {
            error_response(StatusCode::BAD_REQUEST, "invalid_request", Some(&err.to_string()))
        }
        OAuth2Error::InvalidClient => error_response(
            StatusCode::UNAUTHORIZED,
            "invalid_client",
            Some("client authentication failed"),
        ),
        OAuth2Error::InvalidGrant => error_response(
            StatusCode::BAD_REQUEST,
            "invalid_grant",
            Some("the provided grant is invalid, expired, or already used"),
        ),
        OAuth2Error::Pkce(pkce) => {
            error_response(StatusCode::BAD_REQUEST, "invalid_request", Some(&pkce.to_string()))
        }
        OAuth2Error::InvalidToken => error_response(
            StatusCode::UNAUTHORIZED,
            "invalid_token",
            Some("the access token is missing, unknown, or expired"),
        ),
        OAuth2Error::InsufficientScope(scope) => error_response(
            StatusCode::FORBIDDEN,
            "insufficient_scope",
            Some(&format!("the '{scope}' scope is required")),
        ),
        OAuth2Error::IdToken(_) | OAuth2Error::Storage(_) => {
            tracing::error!(error = %err, "Internal error while handling OAuth2 request");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "server_error", None)
        }
    }
}

fn error_response(status: StatusCode, error: &str, description: Option<&str>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_owned(),
            error_description: description.map(String::from),
        }),
    )
        .into_response()
}

/// Redirect-based error delivery for the authorization endpoint, used only
/// once the redirect URI itself has been validated.
fn error_redirect(
    redirect_uri: Option<&str>,
    state: Option<&str>,
    error: &str,
    description: Option<&str>,
) -> Response {
    match redirect_uri {
        Some(uri) => {
            let mut redirect_url = match url::Url::parse(uri) {
                Ok(u) => u,
                Err(_) => return error_response(StatusCode::BAD_REQUEST, error, description),
            };

            redirect_url.query_pairs_mut().append_pair("error", error);
            if let Some(desc) = description {
                redirect_url
                    .query_pairs_mut()
                    .append_pair("error_description", desc);
            }
            if let Some(s) = state {
                redirect_url.query_pairs_mut().append_pair("state", s);
            }

            Redirect::to(redirect_url.as_str()).into_response()
        }
        None => error_response(StatusCode::BAD_REQUEST, error, description),
    }
}
