//! 认证模块
//!
//! 管理会话状态，与路由系统解耦。
//! 路由服务通过注入的认证信号来检查认证状态。

use crate::api::TripFinApi;
use crate::web::LocalStorage;
use leptos::prelude::*;
use leptos::task::spawn_local;
use tripfin_shared::protocol::{AuthResponse, SignupRequest};
use tripfin_shared::{User, Wallet};

const STORAGE_URL_KEY: &str = "tripfin_url";
const STORAGE_TOKEN_KEY: &str = "tripfin_token";

/// 认证状态
#[derive(Clone, Default)]
pub struct AuthState {
    /// 已认证时携带 token 的客户端
    pub api: Option<TripFinApi>,
    pub user: Option<User>,
    pub wallet: Option<Wallet>,
    pub is_authenticated: bool,
    /// 正在用已保存的 token 恢复会话
    pub is_loading: bool,
    /// 空字符串表示与前端同源
    pub backend_url: String,
}

impl AuthState {
    fn apply(&mut self, api: TripFinApi, user: User, wallet: Wallet) {
        self.api = Some(api);
        self.user = Some(user);
        self.wallet = Some(wallet);
        self.is_authenticated = true;
        self.is_loading = false;
    }

    fn clear(&mut self) {
        self.api = None;
        self.user = None;
        self.wallet = None;
        self.is_authenticated = false;
        self.is_loading = false;
    }
}

/// 认证上下文，通过 Context 在组件间共享
#[derive(Clone, Copy)]
pub struct AuthContext {
    pub state: ReadSignal<AuthState>,
    pub set_state: WriteSignal<AuthState>,
}

impl AuthContext {
    pub fn new() -> Self {
        let (state, set_state) = signal(AuthState::default());
        Self { state, set_state }
    }

    /// 供路由服务注入
    pub fn is_authenticated_signal(&self) -> Signal<bool> {
        let state = self.state;
        Signal::derive(move || state.get().is_authenticated)
    }

    pub fn api(&self) -> Option<TripFinApi> {
        self.state.with_untracked(|s| s.api.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.state.with(|s| s.user.clone())
    }

    pub fn set_wallet(&self, wallet: Wallet) {
        self.set_state.update(|s| s.wallet = Some(wallet));
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::new()
    }
}

pub fn use_auth() -> AuthContext {
    use_context::<AuthContext>().expect("AuthContext should be provided")
}

/// 读取保存的后端地址，若有 token 则尝试恢复会话
pub fn init_auth(ctx: &AuthContext) {
    let url = LocalStorage::get(STORAGE_URL_KEY).unwrap_or_default();
    let token = LocalStorage::get(STORAGE_TOKEN_KEY);

    ctx.set_state.update(|state| {
        state.backend_url = url.clone();
        state.is_loading = token.is_some();
    });

    let Some(token) = token else {
        return;
    };
    let set_state = ctx.set_state;
    spawn_local(async move {
        let api = TripFinApi::new(url).with_token(token);
        match api.me().await {
            Ok(profile) => set_state.update(|s| s.apply(api, profile.user, profile.wallet)),
            Err(e) => {
                web_sys::console::warn_1(&format!("[Auth] session restore failed: {}", e).into());
                LocalStorage::delete(STORAGE_TOKEN_KEY);
                set_state.update(AuthState::clear);
            }
        }
    });
}

fn establish(ctx: &AuthContext, url: String, auth: AuthResponse) {
    LocalStorage::set(STORAGE_URL_KEY, &url);
    LocalStorage::set(STORAGE_TOKEN_KEY, &auth.token);
    let api = TripFinApi::new(url.clone()).with_token(auth.token);
    ctx.set_state.update(|state| {
        state.backend_url = url;
        state.apply(api, auth.user, auth.wallet);
    });
}

pub async fn login(ctx: &AuthContext, url: String, email: String, password: String) -> Result<(), String> {
    let auth = TripFinApi::new(url.clone()).login(email, password).await?;
    establish(ctx, url, auth);
    Ok(())
}

pub async fn signup(ctx: &AuthContext, url: String, req: SignupRequest) -> Result<(), String> {
    let auth = TripFinApi::new(url.clone()).signup(req).await?;
    establish(ctx, url, auth);
    Ok(())
}

/// 重新拉取用户与钱包 (审批状态、余额可能已变化)
pub async fn refresh_profile(ctx: &AuthContext) -> Result<(), String> {
    let Some(api) = ctx.api() else {
        return Ok(());
    };
    let profile = api.me().await?;
    ctx.set_state.update(|s| {
        s.user = Some(profile.user);
        s.wallet = Some(profile.wallet);
    });
    Ok(())
}

/// 注销
///
/// 本地状态立即清除，服务端会话失效失败也不影响；导航由路由服务自动处理。
pub fn logout(ctx: &AuthContext) {
    if let Some(api) = ctx.api() {
        spawn_local(async move {
            let _ = api.logout().await;
        });
    }
    LocalStorage::delete(STORAGE_TOKEN_KEY);
    ctx.set_state.update(AuthState::clear);
}
