use crate::error::{ErrorResponse, MarketError, MarketResult, RPC_ERROR_HEADER};

use serde::{Deserialize, Serialize};
use std::future::Future;
use tripfin_shared::protocol::{ApiRequest, HttpMethod};
use worker::{Headers, Method, Request, RequestInit, Response, Stub, wasm_bindgen::JsValue};

/// Durable Object 内部路由用：原始 REST 方法
pub const RPC_METHOD_HEADER: &str = "X-Market-Method";

// =========================================================
// 调用信封
// =========================================================

/// Worker 转发给 Durable Object 的调用信封
///
/// 会话校验在 Durable Object 内完成，所以 token 原样携带。
/// 请求体中的路径参数字段是 `#[serde(skip)]` 的，因此单独放在 `target` 里。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authed<T> {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub target: String,
    pub body: T,
}

impl<T> Authed<T> {
    pub fn new(token: Option<String>, target: impl Into<String>, body: T) -> Self {
        Self {
            token,
            target: target.into(),
            body,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

fn parse_method(raw: &str) -> Option<HttpMethod> {
    match raw {
        "GET" => Some(HttpMethod::Get),
        "POST" => Some(HttpMethod::Post),
        "PUT" => Some(HttpMethod::Put),
        "DELETE" => Some(HttpMethod::Delete),
        _ => None,
    }
}

/// 从内部请求中取出 (REST 方法, 路由模板)，供 Durable Object 分发
pub fn route_of(req: &Request) -> (Option<HttpMethod>, String) {
    let method = req
        .headers()
        .get(RPC_METHOD_HEADER)
        .ok()
        .flatten()
        .and_then(|m| parse_method(&m));
    (method, req.path())
}

// =========================================================
// RPC Client: 发送请求
// =========================================================

pub struct RpcClient {
    stub: Stub,
    // e.g. "http://market"
    base_url: String,
}

impl RpcClient {
    pub fn new(stub: Stub, base_url: &str) -> Self {
        Self {
            stub,
            base_url: base_url.to_string(),
        }
    }

    /// 发送强类型请求并获取解析后的响应
    pub async fn send<T: ApiRequest>(&self, call: &Authed<T>) -> MarketResult<T::Response> {
        // 1. 序列化请求
        let body = serde_json::to_string(call)
            .map_err(|e| MarketError::from(e).in_op_with("rpc.serialize", T::PATH))?;

        // 2. 构造 Headers
        let headers = Headers::new();
        headers
            .set("Content-Type", "application/json")
            .map_err(|e| MarketError::from(e).in_op("rpc.headers"))?;
        headers
            .set(RPC_METHOD_HEADER, T::METHOD.as_str())
            .map_err(|e| MarketError::from(e).in_op("rpc.headers"))?;

        // 3. 构造 Request (内部调用一律 POST，原始方法放在 header 里)
        let mut init = RequestInit::new();
        init.with_method(Method::Post).with_headers(headers);
        init.with_body(Some(JsValue::from_str(&body)));

        let url = format!("{}{}", self.base_url, T::PATH);
        let request = Request::new_with_init(&url, &init)
            .map_err(|e| MarketError::from(e).in_op_with("rpc.request", T::PATH))?;

        // 4. 发送请求
        let mut response = self
            .stub
            .fetch_with_request(request)
            .await
            .map_err(|e| MarketError::from(e).in_op_with("rpc.fetch", T::PATH))?;

        // 5. 检查状态码
        if response.status_code() != 200 {
            let error_text = response.text().await.unwrap_or_default();

            // 只有带标记 Header 的响应才是我们自己生成的结构化错误
            let is_rpc_error = response
                .headers()
                .get(RPC_ERROR_HEADER)
                .ok()
                .flatten()
                .is_some();

            if is_rpc_error {
                if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_text) {
                    return Err(MarketError::from(error_response).in_op_with("rpc.call", T::PATH));
                }
            }

            return Err(MarketError::store(format!(
                "RPC Error [{}]: {}",
                response.status_code(),
                error_text
            ))
            .in_op_with("rpc.call", T::PATH));
        }

        // 6. 反序列化响应
        let text = response
            .text()
            .await
            .map_err(|e| MarketError::from(e).in_op_with("rpc.read", T::PATH))?;
        serde_json::from_str::<T::Response>(&text)
            .map_err(|e| MarketError::from(e).in_op_with("rpc.deserialize", T::PATH))
    }
}

// =========================================================
// RPC Handler: 处理请求
// =========================================================

pub struct RpcHandler;

impl RpcHandler {
    /// 统一的请求处理辅助函数
    /// 包含 Method 检查、JSON 解析、Handler 调用、错误映射
    pub async fn handle<T, F, Fut>(mut req: Request, handler: F) -> worker::Result<Response>
    where
        T: ApiRequest,
        F: FnOnce(Authed<T>) -> Fut,
        Fut: Future<Output = MarketResult<T::Response>>,
    {
        if req.method() != Method::Post {
            return Response::error("Method Not Allowed", 405);
        }

        let text = match req.text().await {
            Ok(t) => t,
            Err(e) => return Response::error(format!("Failed to read body: {}", e), 400),
        };

        let call: Authed<T> = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => return Self::error_response(MarketError::from(e).in_op("rpc.decode")),
        };

        match handler(call).await {
            Ok(result) => Response::from_json(&result),
            Err(e) => Self::error_response(e),
        }
    }

    /// 将错误转换为 ErrorResponse JSON，并设置标记 Header
    pub fn error_response(e: MarketError) -> worker::Result<Response> {
        let error_response: ErrorResponse = e.into();
        let status = error_response.status_code();

        match Response::from_json(&error_response) {
            Ok(mut resp) => {
                let _ = resp.headers_mut().set(RPC_ERROR_HEADER, "true");
                Ok(resp.with_status(status))
            }
            Err(serde_err) => {
                Response::error(format!("Failed to serialize error: {}", serde_err), 500)
            }
        }
    }
}
