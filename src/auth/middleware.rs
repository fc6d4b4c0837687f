use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    web,
};
use std::future::{Future, Ready, ready};
use std::pin::Pin;

use super::jwt::{JwtUtils, REFRESH_ROLE, TokenVerifyResult};
use crate::model::auth::{AuthUser, UserRole};
use crate::model::global_error::{AppError, ErrorCode};

pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService { service }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match authenticate(&req) {
            Ok(user) => {
                req.extensions_mut().insert(user);
                let fut = self.service.call(req);
                Box::pin(fut)
            }
            Err(e) => Box::pin(async move { Err(e.into()) }),
        }
    }
}

/// Bearer header first, then the `accessToken` cookie.
fn bearer_token(req: &ServiceRequest) -> Option<String> {
    let from_header = req
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);

    from_header.or_else(|| req.cookie("accessToken").map(|c| c.value().to_string()))
}

fn authenticate(req: &ServiceRequest) -> Result<AuthUser, AppError> {
    let jwt = req
        .app_data::<web::Data<JwtUtils>>()
        .ok_or_else(|| AppError::with_detail(ErrorCode::InternalError, "token verifier is not configured"))?;
    let token = bearer_token(req).ok_or_else(|| AppError::new(ErrorCode::AuthenticationFailed))?;

    match jwt.verify_token(&token) {
        TokenVerifyResult::Valid(claims) => {
            if claims.role == REFRESH_ROLE {
                return Err(AppError::with_detail(ErrorCode::InvalidAuthToken, "refresh tokens cannot access the api"));
            }
            let role: UserRole = claims
                .role
                .parse()
                .map_err(|_| AppError::new(ErrorCode::InvalidAuthToken))?;
            Ok(AuthUser::new(claims.sub, role))
        }
        TokenVerifyResult::Expired => Err(AppError::new(ErrorCode::ExpiredAuthToken)),
        TokenVerifyResult::Invalid => Err(AppError::new(ErrorCode::InvalidAuthToken)),
    }
}
