use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{LoginRequest, RegisterRequest},
    jwt::JwtKeys,
    password::{hash_password, verify_decoy, verify_password},
    repo_types::{NewUser, User},
};
use crate::{error::AppError, store::RecordStore};

pub const MIN_PASSWORD_LEN: usize = 6;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]{3,}$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Checks registration fields one by one, reporting the first failing field.
fn validate_registration(req: &RegisterRequest) -> Result<(String, String), AppError> {
    let username = req.username.trim().to_string();
    let email = normalize_email(&req.email);

    if username.is_empty() {
        return Err(AppError::validation(Some("username"), "Username is required"));
    }
    if !is_valid_username(&username) {
        return Err(AppError::validation(
            Some("username"),
            "Username must be at least 3 characters of letters, digits or underscores",
        ));
    }
    if email.is_empty() {
        return Err(AppError::validation(Some("email"), "Email is required"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::validation(Some("email"), "Invalid email"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            Some("password"),
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok((username, email))
}

pub async fn register(
    store: &dyn RecordStore,
    keys: &JwtKeys,
    req: RegisterRequest,
) -> Result<(String, User), AppError> {
    let (username, email) = validate_registration(&req)?;
    let password_hash = hash_password(&req.password)?;

    let user = store
        .insert_user(NewUser {
            username,
            email,
            password_hash,
        })
        .await
        .map_err(|e| {
            warn!(error = %e, "registration rejected by store");
            AppError::from(e)
        })?;

    let token = keys.sign(user.id, &user.email)?;
    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((token, user))
}

pub async fn login(
    store: &dyn RecordStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<(String, User), AppError> {
    const INVALID: AppError = AppError::Authentication("Invalid credentials");

    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::validation(None, "Email and password are required"));
    }

    let Some(user) = store.find_user_by_email(&email).await? else {
        verify_decoy(&req.password);
        warn!(email = %email, "login unknown email");
        return Err(INVALID);
    };

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(INVALID);
    }

    let token = keys.sign(user.id, &user.email)?;
    info!(user_id = %user.id, "user logged in");
    Ok((token, user))
}

pub async fn current_user(store: &dyn RecordStore, user_id: Uuid) -> Result<User, AppError> {
    store
        .find_user_by_id(user_id)
        .await?
        .ok_or(AppError::UserNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::JwtConfig, store::MemoryStore};

    fn keys() -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: "s".into(),
            issuer: "i".into(),
            audience: "a".into(),
            ttl_minutes: 60,
        })
    }

    fn register_req(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    fn field_of(err: AppError) -> Option<&'static str> {
        match err {
            AppError::Validation { field, .. } => field,
            AppError::Conflict { field, .. } => Some(field),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn email_and_username_rules() {
        assert!(is_valid_email("alice@x.com"));
        assert!(!is_valid_email("alice@x"));
        assert!(!is_valid_email("al ice@x.com"));
        assert!(is_valid_username("alice_01"));
        assert!(!is_valid_username("al"));
        assert!(!is_valid_username("alice!"));
    }

    #[test]
    fn registration_reports_failing_field() {
        let cases = [
            (register_req("", "a@x.com", "secret1"), "username"),
            (register_req("a-b", "a@x.com", "secret1"), "username"),
            (register_req("alice", "", "secret1"), "email"),
            (register_req("alice", "nope", "secret1"), "email"),
            (register_req("alice", "a@x.com", "12345"), "password"),
        ];
        for (req, field) in cases {
            let err = validate_registration(&req).unwrap_err();
            assert_eq!(field_of(err), Some(field));
        }
    }

    #[tokio::test]
    async fn register_normalizes_email_and_issues_token() {
        let store = MemoryStore::new();
        let keys = keys();
        let (token, user) = register(&store, &keys, register_req("alice", " Alice@X.com ", "secret1"))
            .await
            .unwrap();
        assert_eq!(user.email, "alice@x.com");
        assert_ne!(user.password_hash, "secret1");
        assert_eq!(keys.verify(&token).unwrap().sub, user.id);
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_conflict() {
        let store = MemoryStore::new();
        let keys = keys();
        register(&store, &keys, register_req("alice", "alice@x.com", "secret1"))
            .await
            .unwrap();
        let err = register(&store, &keys, register_req("alice2", "alice@x.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { field: "email", .. }));
    }

    #[tokio::test]
    async fn login_checks_password() {
        let store = MemoryStore::new();
        let keys = keys();
        register(&store, &keys, register_req("alice", "alice@x.com", "secret1"))
            .await
            .unwrap();

        let ok = login(
            &store,
            &keys,
            LoginRequest {
                email: "ALICE@x.com".into(),
                password: "secret1".into(),
            },
        )
        .await;
        assert!(ok.is_ok());

        let bad = login(
            &store,
            &keys,
            LoginRequest {
                email: "alice@x.com".into(),
                password: "secret2".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(bad, AppError::Authentication(_)));

        let unknown = login(
            &store,
            &keys,
            LoginRequest {
                email: "bob@x.com".into(),
                password: "secret1".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(unknown.to_string(), bad.to_string());
    }

    #[tokio::test]
    async fn current_user_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = current_user(&store, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::UserNotFound));
    }
}
