use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header,
    Form, Json,
};
use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::{register::error::RegisterError, storage::UploadedFile};

/// Text fields of the registration form, exactly as submitted.
#[derive(Default, Deserialize)]
pub struct RegistrationFields {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub age: Option<String>,
    pub bio: Option<String>,
    pub referrer: Option<String>,
    #[serde(rename = "terms-and-conditions")]
    pub terms_and_conditions: Option<String>,
}

/// JSON clients send `age` as a number, form encodings as text.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    }))
}

impl RegistrationFields {
    fn set(&mut self, field: &str, value: String) {
        let slot = match field {
            "name" => &mut self.name,
            "email" => &mut self.email,
            "password" => &mut self.password,
            "gender" => &mut self.gender,
            "age" => &mut self.age,
            "bio" => &mut self.bio,
            "referrer" => &mut self.referrer,
            "terms-and-conditions" => &mut self.terms_and_conditions,
            _ => return,
        };
        *slot = Some(value);
    }
}

impl std::fmt::Debug for RegistrationFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationFields")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("gender", &self.gender)
            .field("age", &self.age)
            .field("bio", &self.bio)
            .field("referrer", &self.referrer)
            .field("terms_and_conditions", &self.terms_and_conditions)
            .finish()
    }
}

/// A registration submission: multipart (optionally carrying `file`), urlencoded or JSON.
#[derive(Debug, Default)]
pub struct RegistrationForm {
    pub fields: RegistrationFields,
    pub file: Option<UploadedFile>,
}

#[async_trait]
impl<S> FromRequest<S> for RegistrationForm
where
    S: Send + Sync,
{
    type Rejection = RegisterError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();

        if content_type.starts_with("application/json") {
            let Json(fields) = Json::<RegistrationFields>::from_request(req, state)
                .await
                .map_err(|e| malformed(e.body_text()))?;
            return Ok(Self { fields, file: None });
        }

        if !content_type.starts_with("multipart/form-data") {
            let Form(fields) = Form::<RegistrationFields>::from_request(req, state)
                .await
                .map_err(|e| malformed(e.body_text()))?;
            return Ok(Self { fields, file: None });
        }

        let mut mp = Multipart::from_request(req, state)
            .await
            .map_err(|e| malformed(e.body_text()))?;

        let mut form = Self::default();
        while let Some(field) = mp.next_field().await.map_err(|e| malformed(e.to_string()))? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if name == "file" {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let body = field.bytes().await.map_err(|e| malformed(e.to_string()))?;
                // An untouched <input type="file"> still sends an empty, nameless part.
                if (file_name.is_empty() && body.is_empty()) || form.file.is_some() {
                    continue;
                }
                form.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    body,
                });
            } else {
                let value = field.text().await.map_err(|e| malformed(e.to_string()))?;
                form.fields.set(&name, value);
            }
        }
        Ok(form)
    }
}

fn malformed(reason: String) -> RegisterError {
    warn!(%reason, "malformed registration body");
    RegisterError::Invalid(reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_password() {
        let mut fields = RegistrationFields::default();
        fields.set("email", "ann@x.com".into());
        fields.set("password", "secret1".into());
        fields.set("unknown", "ignored".into());

        let out = format!("{:?}", fields);
        assert!(out.contains("ann@x.com"));
        assert!(out.contains("<redacted>"));
        assert!(!out.contains("secret1"));
    }

    #[test]
    fn age_accepts_number_or_text() {
        let fields: RegistrationFields =
            serde_json::from_str(r#"{"age": 30, "terms-and-conditions": "on"}"#).unwrap();
        assert_eq!(fields.age.as_deref(), Some("30"));

        let fields: RegistrationFields = serde_json::from_str(r#"{"age": "31"}"#).unwrap();
        assert_eq!(fields.age.as_deref(), Some("31"));

        let fields: RegistrationFields = serde_json::from_str(r#"{"age": null}"#).unwrap();
        assert_eq!(fields.age, None);

        let fields: RegistrationFields = serde_json::from_str(r#"{"name": "Ann"}"#).unwrap();
        assert_eq!(fields.age, None);
    }

    #[test]
    fn boolean_terms_do_not_deserialize() {
        let parsed = serde_json::from_str::<RegistrationFields>(r#"{"terms-and-conditions": true}"#);
        assert!(parsed.is_err());
    }
}
