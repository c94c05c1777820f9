//! Accounts: registration, password hashing and login.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::Deserialize;
use tracing::{debug, error, info, instrument};
use validator::Validate;

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::forms::{validate_form, FormErrors};
use crate::models::{NewUser, User};

pub const USER_EXISTS: &str = "user already exists";
pub const PASSWORDS_DIFFER: &str = "passwords do not match";

/// Sign-up form
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RegisterForm {
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub last_name: String,
    #[serde(default)]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 8, max = 20, message = "Password must be 8 to 20 characters long."))]
    pub password1: String,
    #[serde(default)]
    #[validate(length(min = 8, max = 20, message = "Password must be 8 to 20 characters long."))]
    pub password2: String,
}

impl RegisterForm {
    /// Field checks; a confirmation mismatch is reported on its own
    pub fn check(&self) -> Result<()> {
        if self.password1 != self.password2 {
            return Err(AppError::invalid("password2", PASSWORDS_DIFFER));
        }
        validate_form(self).into_result()
    }
}

/// Login form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Hashes a plain-text password using Argon2.
#[instrument(name = "accounts::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(AppError::invalid("password1", "Password cannot be empty."));
    }

    let salt = SaltString::generate(&mut OsRng);
    match Argon2::default().hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(argon_err) => {
            error!(error = %argon_err, "Argon2 password hashing failed");
            Err(AppError::Internal(format!("Password hashing failed: {}", argon_err)))
        }
    }
}

/// Verifies a plain-text password against a stored Argon2 hash.
#[instrument(name = "accounts::verify_password", skip_all, err(Display))]
pub fn verify_password(stored_hash: &str, password: &str) -> Result<bool> {
    if stored_hash.is_empty() || password.is_empty() {
        return Ok(false);
    }

    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        error!(error = %e, "Stored password hash is malformed");
        AppError::Internal(format!("Invalid stored password hash: {}", e))
    })?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => {
            debug!("Password mismatch");
            Ok(false)
        }
        Err(e) => Err(AppError::Internal(format!("Password verification failed: {}", e))),
    }
}

/// Create an account from the sign-up form.
///
/// A taken email is a validation error on the `email` field.
pub async fn register(store: &dyn Store, form: &RegisterForm) -> Result<User> {
    let form = RegisterForm {
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        email: form.email.trim().to_string(),
        ..form.clone()
    };
    form.check()?;

    let new_user = NewUser {
        email: form.email.clone(),
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        password_hash: hash_password(&form.password1)?,
        is_staff: false,
    };

    match store.create_user(new_user).await {
        Ok(user) => {
            info!(user_id = user.id, email = %user.email, "User registered");
            Ok(user)
        }
        Err(AppError::Conflict(_)) => Err(AppError::invalid("email", USER_EXISTS)),
        Err(e) => Err(e),
    }
}

/// The user with these credentials, if they match
pub async fn authenticate(store: &dyn Store, email: &str, password: &str) -> Result<Option<User>> {
    let Some(user) = store.find_user_by_email(email.trim()).await? else {
        return Ok(None);
    };
    if verify_password(&user.password_hash, password)? {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

/// Make sure the configured staff account exists and is flagged staff
pub async fn ensure_staff_account(store: &dyn Store, email: &str, password: &str) -> Result<User> {
    let user = match store.find_user_by_email(email).await? {
        Some(user) => user,
        None => {
            store
                .create_user(NewUser {
                    email: email.to_string(),
                    first_name: String::new(),
                    last_name: String::new(),
                    password_hash: hash_password(password)?,
                    is_staff: true,
                })
                .await?
        }
    };

    if !user.is_staff {
        store.set_staff(user.id, true).await?;
    }
    info!(email = %email, "Staff account ready");
    store.find_user(user.id).await?.ok_or(AppError::NotFound)
}

/// Errors the registration form shows inline
pub fn form_errors(err: &AppError) -> Option<FormErrors> {
    match err {
        AppError::Validation(errors) => Some(errors.clone()),
        _ => None,
    }
}
