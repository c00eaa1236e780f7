use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{AppState, database::Store, error::AppError, models::User};

/// The authenticated caller, inserted by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

pub async fn auth_middleware<S: Store>(
    State(state): State<AppState<S>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(AppError::Unauthorized)?;
    let user = state.auth.current_user(bearer.token()).await?;

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}
