//! Scope-based claims filtering for ID tokens and the UserInfo response.

use serde_json::{Map, Value};

/// Standard OIDC scope to claim mapping. Unknown scopes contribute nothing.
const SCOPE_CLAIMS: &[(&str, &[&str])] = &[
    ("openid", &["sub"]),
    (
        "profile",
        &[
            "name",
            "preferred_username",
            "given_name",
            "family_name",
            "picture",
            "updated_at",
        ],
    ),
    ("email", &["email", "email_verified"]),
    ("address", &["address"]),
    ("phone", &["phone_number", "phone_number_verified"]),
];

/// Project the subject's full claim set down to what the granted scope
/// allows. Claims the subject does not have are omitted, never emitted as
/// null.
pub fn project(full_claims: &Map<String, Value>, granted_scope: &str) -> Map<String, Value> {
    let mut projected = Map::new();
    for scope in granted_scope.split_whitespace() {
        let Some((_, claims)) = SCOPE_CLAIMS.iter().find(|(name, _)| *name == scope) else {
            continue;
        };
        for claim in *claims {
            if let Some(value) = full_claims.get(*claim) {
                projected.insert((*claim).to_owned(), value.clone());
            }
        }
    }
    projected
}
