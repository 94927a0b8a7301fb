//! Registration, login and logout.

use auth::{hash_password, verify_password, CodePurpose};
use axum::extract::State;
use axum::http::HeaderMap;
use database::validation;
use database::{DatabaseError, NewUser, User};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, Result};
use crate::extract::{bearer_token, ValidJson};
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default, rename = "type")]
    pub purpose: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSent {
    pub expires_in: u64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub code: String,
    pub nickname: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub login_type: String,
    pub code: Option<String>,
    pub password: Option<String>,
}

/// Tokens handed out on registration and login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub phone: String,
    pub nickname: String,
    pub token: String,
    pub refresh_token: String,
    /// Access token lifetime as configured, e.g. `30m`.
    pub expires_in: String,
}

fn phone_taken() -> ApiError {
    ApiError::bad_request("手机号已注册", "phone", "该手机号已被注册，请直接登录")
}

fn wrong_code() -> ApiError {
    ApiError::bad_request("验证码错误", "code", "验证码不正确或已过期")
}

fn validate_phone(phone: &str) -> Result<()> {
    validation::validate_phone(phone)
        .map_err(|_| ApiError::bad_request("手机号格式不正确", "phone", "请输入正确的手机号码"))
}

/// Runs bcrypt on the blocking pool.
async fn hash(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("password hashing task failed: {e}")))?
        .map_err(ApiError::from)
}

async fn check_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("password check task failed: {e}")))
}

async fn open_session(state: &AppState, user: User) -> Result<Session> {
    state.users.record_login(&user.id).await?;
    let pair = state.tokens.issue_pair(&user.id)?;

    Ok(Session {
        user_id: user.id,
        phone: user.phone,
        nickname: user.nickname,
        token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: state.runtime.access_ttl_label.clone(),
    })
}

/// POST /api/auth/send-code
pub async fn send_code(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<SendCodeRequest>,
) -> Result<ApiResponse<CodeSent>> {
    validate_phone(&body.phone)?;
    let purpose = CodePurpose::parse(&body.purpose).ok_or_else(|| {
        ApiError::bad_request(
            "验证码类型不正确",
            "type",
            "验证码类型必须是 register、login 或 reset 之一",
        )
    })?;

    let dispatch = state.codes.send(&body.phone, purpose).await?;
    info!(purpose = purpose.as_str(), "Verification code dispatched");

    Ok(ApiResponse::ok(
        "验证码发送成功",
        CodeSent {
            expires_in: dispatch.expires_in,
            message: format!("验证码已发送到您的手机，{}分钟内有效", dispatch.expires_in / 60),
        },
    ))
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RegisterRequest>,
) -> Result<ApiResponse<Session>> {
    validate_phone(&body.phone)?;
    validation::validate_code(&body.code)?;

    let nickname = match body.nickname.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(nickname) => validation::validate_nickname(nickname)?,
        None => format!("用户{}", &body.phone[body.phone.len() - 4..]),
    };

    let password = body.password.filter(|p| !p.is_empty());
    if let Some(password) = &password {
        validation::validate_password(password)?;
    }

    if !state.codes.verify(&body.phone, CodePurpose::Register, &body.code).await? {
        return Err(wrong_code());
    }

    if state.users.find_by_phone(&body.phone).await?.is_some() {
        return Err(phone_taken());
    }

    let password_hash = match password {
        Some(password) => Some(hash(password).await?),
        None => None,
    };

    let user = match state
        .users
        .create_user(&NewUser {
            phone: body.phone,
            nickname,
            password_hash,
        })
        .await
    {
        Ok(user) => user,
        Err(DatabaseError::AlreadyExists { .. }) => return Err(phone_taken()),
        Err(err) => return Err(err.into()),
    };

    info!(user_id = %user.id, "User registered");
    Ok(ApiResponse::ok("注册成功", open_session(&state, user).await?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginType {
    Code,
    Password,
}

/// POST /api/auth/login
///
/// Exactly one credential must match `loginType`; the other must be absent.
pub async fn login(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> Result<ApiResponse<Session>> {
    validate_phone(&body.phone)?;

    let login_type = match body.login_type.as_str() {
        "code" => LoginType::Code,
        "password" => LoginType::Password,
        _ => {
            return Err(ApiError::bad_request(
                "登录类型不正确",
                "loginType",
                "登录类型必须是 code 或 password",
            ))
        }
    };

    let code = body.code.filter(|c| !c.is_empty());
    let password = body.password.filter(|p| !p.is_empty());

    match login_type {
        LoginType::Code => {
            if password.is_some() {
                return Err(ApiError::invalid("password", "验证码登录时不能提供密码"));
            }
            match &code {
                Some(code) => validation::validate_code(code)?,
                None => return Err(ApiError::bad_request("验证码不能为空", "code", "请输入验证码")),
            }
        }
        LoginType::Password => {
            if code.is_some() {
                return Err(ApiError::invalid("code", "密码登录时不能提供验证码"));
            }
            if password.is_none() {
                return Err(ApiError::bad_request("密码不能为空", "password", "请输入密码"));
            }
        }
    }

    let user = state
        .users
        .find_by_phone(&body.phone)
        .await?
        .ok_or_else(|| ApiError::bad_request("用户不存在", "phone", "该手机号未注册，请先注册"))?;

    if !user.is_active {
        return Err(ApiError::forbidden("账户已被禁用", "account", "您的账户已被禁用，请联系管理员"));
    }

    match (code, password) {
        (Some(code), _) => {
            if !state.codes.verify(&user.phone, CodePurpose::Login, &code).await? {
                return Err(wrong_code());
            }
        }
        (None, Some(password)) => {
            let stored = user.password_hash.clone().ok_or_else(|| {
                ApiError::bad_request("该账户未设置密码", "password", "该账户未设置密码，请使用验证码登录")
            })?;
            if !check_password(password, stored).await? {
                return Err(ApiError::bad_request("密码错误", "password", "密码不正确"));
            }
        }
        (None, None) => return Err(ApiError::invalid("loginType", "缺少登录凭据")),
    }

    info!(user_id = %user.id, login_type = ?login_type, "User logged in");
    Ok(ApiResponse::ok("登录成功", open_session(&state, user).await?))
}

/// POST /api/auth/logout
///
/// A valid bearer access token is revoked until it would have expired.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse<()> {
    if let Some(token) = bearer_token(&headers) {
        match state.tokens.verify_access(token) {
            Ok(claims) => {
                state.revoked.revoke(&claims);
                info!(user_id = %claims.user_id, "Access token revoked");
            }
            Err(err) => tracing::debug!(error = %err, "Logout with unusable token"),
        }
    }

    ApiResponse::message("退出登录成功")
}
