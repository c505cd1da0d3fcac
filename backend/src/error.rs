use std::fmt;

use serde::{Deserialize, Serialize};
use tripfin_shared::protocol::ApiErrorBody;
use worker::wasm_bindgen::JsValue;

// =========================================================
// 错误状态枚举
// =========================================================

/// 错误状态枚举
/// 包含错误对应的语义（状态码）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketErrorStatus {
    /// 500: 底层存储或运行时错误
    Store,
    /// 404: 资源未找到
    NotFound,
    /// 400: 业务校验失败
    InvalidInput,
    /// 401: 未登录或会话失效
    Unauthorized,
    /// 403: 已登录但无权操作
    Forbidden,
    /// 400: JSON 解析或序列化错误
    Serialization,
    /// 409: 资源冲突 (如邮箱已注册、重复出价)
    Conflict,
    /// 400: 钱包余额不足，details 中带有差额
    InsufficientFunds,
}

impl MarketErrorStatus {
    pub fn status_code(&self) -> u16 {
        match self {
            MarketErrorStatus::InvalidInput
            | MarketErrorStatus::Serialization
            | MarketErrorStatus::InsufficientFunds => 400,
            MarketErrorStatus::Unauthorized => 401,
            MarketErrorStatus::Forbidden => 403,
            MarketErrorStatus::NotFound => 404,
            MarketErrorStatus::Conflict => 409,
            MarketErrorStatus::Store => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            MarketErrorStatus::InvalidInput => "INVALID_INPUT",
            MarketErrorStatus::Serialization => "JSON_PARSE_ERROR",
            MarketErrorStatus::Unauthorized => "UNAUTHORIZED",
            MarketErrorStatus::Forbidden => "FORBIDDEN",
            MarketErrorStatus::NotFound => "RESOURCE_NOT_FOUND",
            MarketErrorStatus::Conflict => "RESOURCE_CONFLICT",
            MarketErrorStatus::InsufficientFunds => "INSUFFICIENT_FUNDS",
            MarketErrorStatus::Store => "INTERNAL_STORE_ERROR",
        }
    }
}

// =========================================================
// 错误上下文追踪
// =========================================================

/// 结构化的错误追踪片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSpan {
    /// 操作名称，如 "storage.get", "ledger.escrow"
    pub operation: String,
    /// 额外的细节信息，如 key、trip id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorSpan {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            detail: None,
        }
    }

    pub fn with_detail(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            detail: Some(detail.into()),
        }
    }
}

// =========================================================
// 核心错误类型
// =========================================================

/// 市场业务错误
///
/// - status: 错误语义，决定 HTTP 状态码
/// - message: 返回给客户端的消息
/// - details: 可选的结构化数据 (如余额不足时的差额)
/// - source / spans: 排查用的错误链与操作追踪
#[derive(Debug)]
pub struct MarketError {
    pub status: MarketErrorStatus,
    pub message: String,
    details: Option<serde_json::Value>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
    spans: Vec<ErrorSpan>,
}

impl MarketError {
    pub fn new(status: MarketErrorStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
            source: None,
            spans: Vec::new(),
        }
    }

    // --- Convenience constructors ---

    pub fn store(message: impl Into<String>) -> Self {
        Self::new(MarketErrorStatus::Store, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(MarketErrorStatus::NotFound, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(MarketErrorStatus::InvalidInput, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(MarketErrorStatus::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(MarketErrorStatus::Forbidden, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(MarketErrorStatus::Serialization, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(MarketErrorStatus::Conflict, message)
    }

    /// 余额不足，附带 `{ required, available, shortfall }`
    pub fn insufficient_funds(
        message: impl Into<String>,
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    ) -> Self {
        Self::new(MarketErrorStatus::InsufficientFunds, message).with_details(serde_json::json!({
            "required": required.normalize(),
            "available": available.normalize(),
            "shortfall": (required - available).normalize(),
        }))
    }

    // --- Context builders ---

    /// 添加操作追踪（无额外细节）
    pub fn in_op(mut self, operation: impl Into<String>) -> Self {
        self.spans.push(ErrorSpan::new(operation));
        self
    }

    /// 添加操作追踪（带额外细节）
    pub fn in_op_with(mut self, operation: impl Into<String>, detail: impl Into<String>) -> Self {
        self.spans.push(ErrorSpan::with_detail(operation, detail));
        self
    }

    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    // --- Accessors ---

    pub fn status_code(&self) -> u16 {
        self.status.status_code()
    }

    pub fn error_code(&self) -> &'static str {
        self.status.error_code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&serde_json::Value> {
        self.details.as_ref()
    }

    pub fn spans(&self) -> &[ErrorSpan] {
        &self.spans
    }

    /// 对外的 JSON 错误体。5xx 不暴露内部消息。
    pub fn to_body(&self) -> ApiErrorBody {
        let message = if self.status_code() >= 500 {
            "Internal Server Error".to_string()
        } else {
            self.message.clone()
        };
        ApiErrorBody {
            error: message.clone(),
            code: self.error_code().to_string(),
            message,
            details: self.details.clone(),
        }
    }
}

// =========================================================
// Display & Error trait 实现
// =========================================================

impl fmt::Display for MarketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.error_code(), self.message)?;

        if !self.spans.is_empty() {
            write!(f, " | trace: ")?;
            for (i, span) in self.spans.iter().enumerate() {
                if i > 0 {
                    write!(f, " -> ")?;
                }
                write!(f, "{}", span.operation)?;
                if let Some(detail) = &span.detail {
                    write!(f, "({})", detail)?;
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for MarketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

pub type MarketResult<T> = std::result::Result<T, MarketError>;

// =========================================================
// 传输用错误类型
// =========================================================

/// 用于在 HTTP Header 中标识该 Response Body 是一个 ErrorResponse
pub const RPC_ERROR_HEADER: &str = "X-Rpc-Error";

/// Worker 与 Durable Object 之间传输的错误形态
///
/// Durable Object 把 MarketError 序列化后返回，Worker 端再还原，
/// 状态、消息、details 和追踪栈都不会丢失（source 除外）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: MarketErrorStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spans: Vec<ErrorSpan>,
}

impl ErrorResponse {
    pub fn status_code(&self) -> u16 {
        self.status.status_code()
    }
}

// =========================================================
// 类型转换实现
// =========================================================

impl From<MarketError> for ErrorResponse {
    fn from(e: MarketError) -> Self {
        Self {
            status: e.status,
            message: e.message,
            details: e.details,
            spans: e.spans,
        }
    }
}

impl From<ErrorResponse> for MarketError {
    fn from(e: ErrorResponse) -> Self {
        Self {
            status: e.status,
            message: e.message,
            details: e.details,
            source: None, // source 不可序列化，跨边界传输时丢失
            spans: e.spans,
        }
    }
}

impl From<worker::Error> for MarketError {
    fn from(e: worker::Error) -> Self {
        MarketError::store(e.to_string())
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(e: serde_json::Error) -> Self {
        MarketError::serialization(e.to_string()).with_source(e)
    }
}

impl From<JsValue> for MarketError {
    fn from(e: JsValue) -> Self {
        let msg = e.as_string().unwrap_or_else(|| format!("{:?}", e));
        MarketError::store(msg)
    }
}
