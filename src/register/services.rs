use anyhow::Context;
use tracing::{debug, instrument};

use crate::{
    register::{
        dto::{RegistrationFields, RegistrationForm},
        error::RegisterError,
        repo::UserStore,
        repo_types::{NewUser, User},
    },
    storage::FileIntake,
};

pub const BCRYPT_COST: u32 = 10;

/// The only value of `terms-and-conditions` that counts as acceptance (checkbox default).
pub const TERMS_ACCEPTED: &str = "on";

/// Fields that passed validation. `password` is still plaintext here.
pub struct ValidRegistration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub gender: String,
    pub age: i32,
    pub bio: Option<String>,
    pub referrer: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, RegisterError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(RegisterError::Invalid(format!("{} is required", field))),
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub fn validate(fields: RegistrationFields) -> Result<ValidRegistration, RegisterError> {
    let name = required(fields.name, "name")?;
    let email = required(fields.email, "email")?;
    let password = required(fields.password, "password")?;
    let gender = required(fields.gender, "gender")?;
    let age = required(fields.age, "age")?;

    if fields.terms_and_conditions.as_deref() != Some(TERMS_ACCEPTED) {
        return Err(RegisterError::Invalid("terms and conditions not accepted".into()));
    }

    let age = age
        .trim()
        .parse::<i32>()
        .map_err(|_| RegisterError::Invalid("age must be a whole number".into()))?;

    Ok(ValidRegistration {
        name,
        email,
        password,
        gender,
        age,
        bio: optional(fields.bio),
        referrer: optional(fields.referrer),
    })
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    bcrypt::hash(plain, BCRYPT_COST).context("bcrypt hash")
}

#[cfg(test)]
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    bcrypt::verify(plain, hash).context("bcrypt verify")
}

/// Validates, rejects known emails, hashes, stores the optional file and inserts the user.
#[instrument(skip_all)]
pub async fn register_user(
    users: &dyn UserStore,
    files: &dyn FileIntake,
    form: RegistrationForm,
) -> Result<User, RegisterError> {
    let valid = validate(form.fields)?;

    if users.find_by_email(&valid.email).await?.is_some() {
        return Err(RegisterError::Conflict);
    }

    let plain = valid.password;
    let password = tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .context("password hashing task")??;

    let profile_picture = match form.file {
        Some(file) => {
            let original = file.file_name.clone();
            let reference = files
                .store(file)
                .await
                .with_context(|| format!("store upload {:?}", original))?;
            debug!(%reference, "profile picture stored");
            Some(reference)
        }
        None => None,
    };

    let user = users
        .insert(NewUser {
            name: valid.name,
            email: valid.email,
            password,
            gender: valid.gender,
            age: valid.age,
            bio: valid.bio,
            profile_picture,
            referrer: valid.referrer,
            terms_accepted: true,
        })
        .await?;
    Ok(user)
}
