//! fetch 封装
//!
//! 直接使用 `web_sys::fetch`，请求方法复用共享协议里的 [`HttpMethod`]。

use tripfin_shared::protocol::HttpMethod;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Headers, Request, RequestInit, Response};

#[derive(Debug, Clone)]
pub enum HttpError {
    /// 请求无法构建
    Build(String),
    /// 网络层失败 (CORS、断网、DNS)
    Network(String),
    /// 响应体读取失败
    Read(String),
}

impl core::fmt::Display for HttpError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HttpError::Build(msg) => write!(f, "Request error: {}", msg),
            HttpError::Network(msg) => write!(f, "Network error: {}", msg),
            HttpError::Read(msg) => write!(f, "Response error: {}", msg),
        }
    }
}

fn js_err(e: JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{:?}", e))
}

/// 已读完响应体的 HTTP 响应
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct HttpRequestBuilder {
    url: String,
    method: HttpMethod,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl HttpRequestBuilder {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self.header("Content-Type", "application/json")
    }

    pub async fn send(self) -> Result<HttpResponse, HttpError> {
        let headers = Headers::new().map_err(|e| HttpError::Build(js_err(e)))?;
        for (key, value) in &self.headers {
            headers
                .set(key, value)
                .map_err(|e| HttpError::Build(js_err(e)))?;
        }

        let opts = RequestInit::new();
        opts.set_method(self.method.as_str());
        opts.set_headers(&headers.into());
        if let Some(body) = &self.body {
            opts.set_body(&JsValue::from_str(body));
        }

        let request = Request::new_with_str_and_init(&self.url, &opts)
            .map_err(|e| HttpError::Build(js_err(e)))?;
        let window = web_sys::window().ok_or_else(|| HttpError::Network("no window".into()))?;

        let value = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(|e| HttpError::Network(js_err(e)))?;
        let response: Response = value.dyn_into().map_err(|e| HttpError::Read(js_err(e)))?;

        let status = response.status();
        let text = response.text().map_err(|e| HttpError::Read(js_err(e)))?;
        let body = JsFuture::from(text)
            .await
            .map_err(|e| HttpError::Read(js_err(e)))?
            .as_string()
            .unwrap_or_default();

        Ok(HttpResponse { status, body })
    }
}
