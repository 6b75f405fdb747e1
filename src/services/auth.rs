use crate::{config::Config, error::{AppError, Result}};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct AuthService {
    config: Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Advisor,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Student => "student",
            Role::Advisor => "advisor",
            Role::Admin => "admin",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,          // 用户ID（学生即学生记录ID）
    pub role: Role,           // 角色
    pub name: Option<String>, // 显示名称
    pub exp: i64,             // 过期时间
    pub iat: i64,             // 签发时间
}

/// 已认证的调用方身份
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub role: Role,
    pub name: Option<String>,
}

impl AuthUser {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            name: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_role(&self, role: Role) -> Result<()> {
        if self.role != role {
            return Err(AppError::Authorization(format!("Role '{}' required", role)));
        }
        Ok(())
    }
}

impl AuthService {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn verify_jwt(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.config.jwt_secret.as_ref());
        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                debug!("JWT token verified for user: {}", token_data.claims.sub);
                Ok(token_data.claims)
            }
            Err(e) => {
                warn!("JWT verification failed: {}", e);
                Err(AppError::Authentication("Invalid token".to_string()))
            }
        }
    }

    pub fn authenticate(&self, token: &str) -> Result<AuthUser> {
        let claims = self.verify_jwt(token)?;
        Ok(AuthUser {
            id: claims.sub,
            role: claims.role,
            name: claims.name,
        })
    }

    /// 签发令牌；账号密码校验由外部身份服务负责
    pub fn issue_token(&self, user: &AuthUser) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            role: user.role,
            name: user.name.clone(),
            exp: (now + Duration::hours(self.config.jwt_expiry_hours)).timestamp(),
            iat: now.timestamp(),
        };

        let encoding_key = EncodingKey::from_secret(self.config.jwt_secret.as_ref());
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &encoding_key)?)
    }
}

// 由 auth_middleware 写入请求扩展
#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Authentication("Missing or invalid credentials".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify_roundtrip() {
        let service = AuthService::new(&Config::default());
        let advisor = AuthUser::new("a1", Role::Advisor);

        let token = service.issue_token(&advisor).unwrap();
        let user = service.authenticate(&token).unwrap();

        assert_eq!(user.id, "a1");
        assert_eq!(user.role, Role::Advisor);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let mut other = Config::default();
        other.jwt_secret = "another-secret".to_string();
        let token = AuthService::new(&other)
            .issue_token(&AuthUser::new("s1", Role::Student))
            .unwrap();

        let result = AuthService::new(&Config::default()).authenticate(&token);
        assert!(matches!(result, Err(AppError::Authentication(_))));
    }

    #[test]
    fn test_require_role() {
        let student = AuthUser::new("s1", Role::Student);
        assert!(student.require_role(Role::Student).is_ok());
        assert!(matches!(student.require_role(Role::Advisor), Err(AppError::Authorization(_))));
    }
}
