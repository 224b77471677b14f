use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    register::{dto::RegistrationForm, error::RegisterError, services::register_user},
    state::AppState,
};

pub fn register_routes() -> Router<AppState> {
    Router::new().route("/register", post(register))
}

#[instrument(skip(state, form))]
pub async fn register(
    State(state): State<AppState>,
    form: RegistrationForm,
) -> Result<Response, RegisterError> {
    match register_user(state.users.as_ref(), state.files.as_ref(), form).await {
        Ok(user) => {
            info!(user_id = %user.id, email = %user.email, "user registered");
            Ok((StatusCode::FOUND, [(header::LOCATION, "/success")]).into_response())
        }
        Err(e) => {
            match &e {
                RegisterError::Invalid(reason) => warn!(%reason, "a field is left empty or invalid"),
                RegisterError::Conflict => warn!("user already exists"),
                RegisterError::Internal(err) => error!(error = ?err, "registration failed"),
            }
            Err(e)
        }
    }
}
