use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    dto::{AccessTokenResponse, PublicUser},
    repo_types::{NewUser, Role},
};
use crate::{config::AdminSeed, error::AppError, state::AppState};

/// RFC 5321 path limit.
const MAX_EMAIL_LEN: usize = 254;

pub(crate) fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN {
        return false;
    }
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Creates a `user`-role account. The email is matched case-insensitively.
pub async fn register(
    st: &AppState,
    name: &str,
    email: &str,
    password: &str,
) -> Result<PublicUser, AppError> {
    let email = normalize_email(email);

    if st.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::DuplicateEmail);
    }

    let password_hash = st.hasher.hash_blocking(password.to_owned()).await?;
    let user = st
        .users
        .create(NewUser {
            name: name.trim().to_owned(),
            email,
            password_hash,
            role: Role::User,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user.into())
}

/// Unknown email and wrong password both end in `InvalidCredentials`.
pub async fn login(
    st: &AppState,
    email: &str,
    password: &str,
) -> Result<AccessTokenResponse, AppError> {
    let email = normalize_email(email);

    let user = match st.users.find_by_email(&email).await? {
        Some(u) => u,
        None => {
            // spend comparable time so the two rejections can't be told apart
            let _ = st.hasher.hash_blocking(password.to_owned()).await;
            warn!(email = %email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        }
    };

    let ok = st
        .hasher
        .verify_blocking(password.to_owned(), user.password_hash.clone())
        .await?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let access_token = st.jwt.sign_access(user.id, user.role)?;
    info!(user_id = %user.id, role = %user.role, "user logged in");
    Ok(AccessTokenResponse { access_token })
}

/// Makes sure an admin account exists for `seed.email`, creating or
/// promoting it. The password of an existing account is left alone.
pub async fn ensure_admin(st: &AppState, seed: &AdminSeed) -> Result<PublicUser, AppError> {
    let email = normalize_email(&seed.email);
    if !is_valid_email(&email) {
        return Err(AppError::Validation("ADMIN_EMAIL is not a valid email".into()));
    }

    if let Some(existing) = st.users.find_by_email(&email).await? {
        if existing.role == Role::Admin {
            return Ok(existing.into());
        }
        let promoted = st
            .users
            .set_role(existing.id, Role::Admin)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} vanished", existing.id)))?;
        info!(user_id = %promoted.id, "user promoted to admin");
        return Ok(promoted.into());
    }

    let password_hash = st.hasher.hash_blocking(seed.password.clone()).await?;
    let admin = st
        .users
        .create(NewUser {
            name: seed.name.clone(),
            email,
            password_hash,
            role: Role::Admin,
        })
        .await?;
    info!(user_id = %admin.id, "admin account created");
    Ok(admin.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("alice@x.com"));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("alice@x"));
        assert!(!is_valid_email("al ice@x.com"));
    }

    #[test]
    fn overlong_email_is_invalid() {
        let at_limit = format!("{}@x.com", "a".repeat(MAX_EMAIL_LEN - 6));
        assert_eq!(at_limit.len(), MAX_EMAIL_LEN);
        assert!(is_valid_email(&at_limit));
        let too_long = format!("{}@x.com", "a".repeat(400));
        assert!(!is_valid_email(&too_long));
    }

    #[tokio::test]
    async fn register_strips_hash_and_lowercases_email() {
        let st = AppState::fake();
        let user = register(&st, "Alice", "  Alice@X.com ", "pw1-long-enough").await.unwrap();
        assert_eq!(user.email, "alice@x.com");
        assert_eq!(user.role, Role::User);

        let stored = st.users.find_by_id(user.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "pw1-long-enough");
        assert!(stored.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn duplicate_email_in_any_case() {
        let st = AppState::fake();
        register(&st, "Alice", "alice@x.com", "pw1-long-enough").await.unwrap();
        let err = register(&st, "Alice 2", "ALICE@x.COM", "other-password").await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let st = AppState::fake();
        register(&st, "Alice", "alice@x.com", "pw1-long-enough").await.unwrap();

        let wrong_pw = login(&st, "alice@x.com", "nope-nope-nope").await.unwrap_err();
        let unknown = login(&st, "ghost@x.com", "pw1-long-enough").await.unwrap_err();
        assert!(matches!(wrong_pw, AppError::InvalidCredentials));
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert_eq!(wrong_pw.to_string(), unknown.to_string());
        assert_eq!(wrong_pw.status(), unknown.status());
    }

    #[tokio::test]
    async fn login_issues_token_with_current_role() {
        let st = AppState::fake();
        let user = register(&st, "Alice", "alice@x.com", "pw1-long-enough").await.unwrap();

        let old = login(&st, "ALICE@x.com", "pw1-long-enough").await.unwrap().access_token;
        let claims = st.jwt.verify(&old).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::User);

        st.users.set_role(user.id, Role::Admin).await.unwrap();
        let new = login(&st, "alice@x.com", "pw1-long-enough").await.unwrap().access_token;
        assert_eq!(st.jwt.verify(&new).unwrap().role, Role::Admin);

        // no revocation: the earlier token still verifies with the role it was issued with
        assert_eq!(st.jwt.verify(&old).unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn ensure_admin_creates_then_is_idempotent() {
        let st = AppState::fake();
        let seed = AdminSeed {
            name: "Root".into(),
            email: "Root@X.com".into(),
            password: "admin-password".into(),
        };
        let first = ensure_admin(&st, &seed).await.unwrap();
        assert_eq!(first.role, Role::Admin);
        let second = ensure_admin(&st, &seed).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(st.users.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ensure_admin_promotes_existing_user() {
        let st = AppState::fake();
        let user = register(&st, "Bob", "bob@x.com", "pw2-long-enough").await.unwrap();
        let seed = AdminSeed {
            name: "ignored".into(),
            email: "bob@x.com".into(),
            password: "ignored-password".into(),
        };
        let admin = ensure_admin(&st, &seed).await.unwrap();
        assert_eq!(admin.id, user.id);
        assert_eq!(admin.role, Role::Admin);
        // existing password still works
        assert!(login(&st, "bob@x.com", "pw2-long-enough").await.is_ok());
    }
}
