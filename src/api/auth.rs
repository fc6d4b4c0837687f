use actix_web::{HttpRequest, HttpResponse, get, post, web};
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::jwt::{JwtUtils, REFRESH_ROLE, TokenVerifyResult, build_access_token_cookie, build_refresh_token_cookie};
use crate::entity::base_time::ActiveModelTimeBehavior;
use crate::entity::user::{self, Entity as UserEntity};
use crate::model::auth::{AuthResponse, AuthUser, LoginRequest, RegisterRequest, RoleUpdateRequest, UserResponse, UserRole};
use crate::model::global_error::{AppError, ErrorCode, ValidationFieldError};

pub const PASSWORD_MIN_CHARS: usize = 8;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    summary = "Register an end-user account",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid fields or duplicate email"),
    ),
    tag = "auth",
)]
#[post("/auth/register")]
pub async fn register(
    body: web::Json<RegisterRequest>,
    db: web::Data<DatabaseConnection>,
    jwt: web::Data<JwtUtils>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    validate_register_request(&body.name, &body.email, &body.password)?;
    let email = body.email.trim().to_lowercase();

    let txn = db.begin().await?;

    let existing_user = UserEntity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&txn)
        .await?;
    if existing_user.is_some() {
        txn.rollback().await.ok();
        return Err(AppError::new(ErrorCode::DuplicateAccountEmail));
    }

    let hashed_password = hash_password(body.password).await?;
    let now = Utc::now();
    let new_user = user::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        name: Set(body.name.trim().to_string()),
        email: Set(email),
        password: Set(hashed_password),
        role: Set(UserRole::User),
        created_at: Set(now),
        updated_at: Set(now),
    };
    let user = new_user.insert(&txn).await?;
    txn.commit().await?;

    info!(user_id = %user.id, "user registered");
    issue_tokens(HttpResponse::Created(), &jwt, user)
}

#[utoipa::path(
    post,
    path = "/auth/login",
    summary = "Exchange credentials for tokens",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Invalid credentials"),
    ),
    tag = "auth",
)]
#[post("/auth/login")]
pub async fn login(
    body: web::Json<LoginRequest>,
    db: web::Data<DatabaseConnection>,
    jwt: web::Data<JwtUtils>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    validate_login_request(&body.email, &body.password)?;

    let user = UserEntity::find()
        .filter(user::Column::Email.eq(body.email.trim().to_lowercase()))
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::InvalidEmailPwd))?;

    let hashed = user.password.clone();
    let is_valid = web::block(move || verify(body.password, &hashed))
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))??;
    if !is_valid {
        return Err(AppError::new(ErrorCode::InvalidEmailPwd));
    }

    issue_tokens(HttpResponse::Ok(), &jwt, user)
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    summary = "Issue a new access token from a refresh token",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = AuthResponse),
        (status = 400, description = "Missing or invalid refresh token"),
    ),
    tag = "auth",
)]
#[post("/auth/refresh")]
pub async fn refresh_token(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    db: web::Data<DatabaseConnection>,
    jwt: web::Data<JwtUtils>,
) -> Result<HttpResponse, AppError> {
    let token = body
        .and_then(|b| b.into_inner().refresh_token)
        .or_else(|| req.cookie("refreshToken").map(|c| c.value().to_string()))
        .ok_or_else(|| AppError::new(ErrorCode::InvalidRefreshToken))?;

    match jwt.verify_token(&token) {
        TokenVerifyResult::Valid(claims) => {
            if claims.role != REFRESH_ROLE {
                return Err(AppError::new(ErrorCode::NotRefreshToken));
            }

            let user = UserEntity::find_by_id(claims.sub)
                .one(db.get_ref())
                .await?
                .ok_or_else(|| AppError::new(ErrorCode::UserNotFound))?;

            issue_tokens(HttpResponse::Ok(), &jwt, user)
        }
        TokenVerifyResult::Expired | TokenVerifyResult::Invalid => {
            Err(AppError::new(ErrorCode::InvalidRefreshToken))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    summary = "Current user",
    responses(
        (status = 200, description = "The authenticated user", body = UserResponse),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer_auth" = [])),
    tag = "auth",
)]
#[get("/auth/me")]
pub async fn get_me(
    db: web::Data<DatabaseConnection>,
    auth_user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    let user = UserEntity::find_by_id(auth_user.id.clone())
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound))?;

    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/role",
    summary = "Change a user's role",
    params(("id", description = "User id")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, description = "Role updated", body = UserResponse),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "No such user"),
    ),
    security(("bearer_auth" = [])),
    tag = "auth",
)]
#[post("/users/{id}/role")]
pub async fn set_role(
    path: web::Path<String>,
    body: web::Json<RoleUpdateRequest>,
    db: web::Data<DatabaseConnection>,
    auth_user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, AppError> {
    if auth_user.role != UserRole::Admin {
        return Err(AppError::new(ErrorCode::NotEnoughPermission));
    }

    let user = UserEntity::find_by_id(path.into_inner())
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound))?;

    let mut active: user::ActiveModel = user.clone().into();
    active.role = Set(body.role);
    active.touch(&user, Utc::now());
    let user = active.update(db.get_ref()).await?;

    info!(user_id = %user.id, role = %user.role, changed_by = %auth_user.id, "role changed");
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// Creates an admin account at startup when none with that email exists.
/// A new account takes `id`, so notices addressed to the configured admin
/// recipient land in its inbox.
pub async fn ensure_admin(db: &DatabaseConnection, id: &str, email: &str, password: String) -> Result<(), AppError> {
    let email = email.trim().to_lowercase();
    let existing = UserEntity::find()
        .filter(user::Column::Email.eq(&email))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let now = Utc::now();
    let admin = user::ActiveModel {
        id: Set(id.to_string()),
        name: Set("Administrator".to_string()),
        email: Set(email),
        password: Set(hash_password(password).await?),
        role: Set(UserRole::Admin),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    info!(user_id = %admin.id, "bootstrap admin created");
    Ok(())
}

/// The account admin notices go to: `configured` when such a user exists,
/// otherwise the oldest admin. Falls back to `configured` on an empty
/// database.
pub async fn resolve_admin_recipient(db: &DatabaseConnection, configured: &str) -> Result<String, AppError> {
    if UserEntity::find_by_id(configured).one(db).await?.is_some() {
        return Ok(configured.to_string());
    }

    let oldest_admin = UserEntity::find()
        .filter(user::Column::Role.eq(UserRole::Admin))
        .order_by_asc(user::Column::CreatedAt)
        .one(db)
        .await?;
    match oldest_admin {
        Some(admin) => {
            info!(configured, user_id = %admin.id, "admin notices go to the oldest admin");
            Ok(admin.id)
        }
        None => {
            warn!(configured, "no admin account exists yet; admin notices are unreadable until one does");
            Ok(configured.to_string())
        }
    }
}

async fn hash_password(password: String) -> Result<String, AppError> {
    let hashed = web::block(move || hash(password, DEFAULT_COST))
        .await
        .map_err(|_| AppError::new(ErrorCode::InternalError))??;
    Ok(hashed)
}

fn issue_tokens(
    mut builder: actix_web::HttpResponseBuilder,
    jwt: &JwtUtils,
    user: user::Model,
) -> Result<HttpResponse, AppError> {
    let access_token = jwt.generate_token(&user.id, user.role.as_str())?;
    let refresh_token_str = jwt.generate_refresh_token(&user.id)?;

    Ok(builder
        .cookie(build_access_token_cookie(&access_token))
        .cookie(build_refresh_token_cookie(&refresh_token_str))
        .json(AuthResponse {
            token: access_token,
            refresh_token: refresh_token_str,
            user: UserResponse::from(user),
        }))
}

fn validate_login_request(email: &str, password: &str) -> Result<(), AppError> {
    let mut errors = Vec::new();

    if email.trim().is_empty() {
        errors.push(ValidationFieldError::new("email", "email is required"));
    }
    if password.is_empty() {
        errors.push(ValidationFieldError::new("password", "password is required"));
    }

    if errors.is_empty() { Ok(()) } else { Err(AppError::ValidationError(errors)) }
}

fn validate_register_request(name: &str, email: &str, password: &str) -> Result<(), AppError> {
    let mut errors = Vec::new();

    if name.trim().is_empty() {
        errors.push(ValidationFieldError::new("name", "name is required"));
    }

    if email.trim().is_empty() {
        errors.push(ValidationFieldError::new("email", "email is required"));
    } else if !email.contains('@') {
        errors.push(ValidationFieldError::new("email", "email is not valid"));
    }

    if password.chars().count() < PASSWORD_MIN_CHARS {
        errors.push(ValidationFieldError::new(
            "password",
            format!("password must be at least {PASSWORD_MIN_CHARS} characters"),
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(AppError::ValidationError(errors)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_validation_names_each_field() {
        let Err(AppError::ValidationError(errors)) = validate_register_request(" ", "nope", "short") else {
            panic!("expected validation errors");
        };
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["name", "email", "password"]);

        assert!(validate_register_request("Ada", "ada@example.com", "correct horse").is_ok());
    }
}
