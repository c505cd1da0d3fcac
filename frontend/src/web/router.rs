//! History API 路由服务
//!
//! 所有对 window.history 的操作都集中在此模块：
//! 请求 -> 守卫 -> 写入 History -> 更新信号。

use leptos::prelude::*;
use wasm_bindgen::prelude::*;

use super::route::AppRoute;

fn current_path() -> String {
    web_sys::window()
        .and_then(|w| w.location().pathname().ok())
        .unwrap_or_else(|| "/".to_string())
}

fn write_history(path: &str, push: bool) {
    let Some(history) = web_sys::window().and_then(|w| w.history().ok()) else {
        return;
    };
    let _ = if push {
        history.push_state_with_url(&JsValue::NULL, "", Some(path))
    } else {
        history.replace_state_with_url(&JsValue::NULL, "", Some(path))
    };
}

fn log(msg: &str) {
    web_sys::console::log_1(&format!("[Router] {}", msg).into());
}

/// 守卫：根据认证状态决定最终落到哪个路由
fn guard(target: AppRoute, is_auth: bool) -> AppRoute {
    if target.requires_auth() && !is_auth {
        AppRoute::auth_failure_redirect()
    } else if target.is_public_entry() && is_auth {
        AppRoute::auth_success_redirect()
    } else {
        target
    }
}

#[derive(Clone, Copy)]
pub struct RouterService {
    current_route: ReadSignal<AppRoute>,
    set_route: WriteSignal<AppRoute>,
    /// 由 App 注入，路由不直接依赖 auth 模块
    is_authenticated: Signal<bool>,
}

impl RouterService {
    fn new(is_authenticated: Signal<bool>) -> Self {
        let (current_route, set_route) = signal(AppRoute::from_path(&current_path()));
        Self {
            current_route,
            set_route,
            is_authenticated,
        }
    }

    pub fn current_route(&self) -> ReadSignal<AppRoute> {
        self.current_route
    }

    pub fn navigate(&self, route: AppRoute) {
        self.go(route, true);
    }

    fn go(&self, target: AppRoute, push: bool) {
        let resolved = guard(target, self.is_authenticated.get_untracked());
        if resolved != target {
            log(&format!("{} -> {}", target, resolved));
        }
        write_history(resolved.to_path(), push);
        self.set_route.set(resolved);
    }

    /// 浏览器前进/后退同样经过守卫
    fn listen_popstate(&self) {
        let router = *self;
        let closure = Closure::<dyn Fn()>::new(move || {
            router.go(AppRoute::from_path(&current_path()), false);
        });
        if let Some(window) = web_sys::window() {
            let _ = window.add_event_listener_with_callback("popstate", closure.as_ref().unchecked_ref());
        }
        // 监听器与页面同寿命
        closure.forget();
    }

    /// 登录/登出后自动跳转
    fn follow_auth(&self) {
        let router = *self;
        Effect::new(move |_| {
            let is_auth = router.is_authenticated.get();
            let route = router.current_route.get_untracked();
            if guard(route, is_auth) != route {
                log(if is_auth { "logged in" } else { "logged out" });
                router.go(route, true);
            }
        });
    }
}

pub fn use_router() -> RouterService {
    use_context::<RouterService>().expect("RouterService must be provided by <Router>")
}

// ============================================================================
// UI 组件
// ============================================================================

#[component]
pub fn Router(is_authenticated: Signal<bool>, children: Children) -> impl IntoView {
    let router = RouterService::new(is_authenticated);
    router.listen_popstate();
    router.follow_auth();
    // 首次进入时校正地址栏
    router.go(router.current_route.get_untracked(), false);
    provide_context(router);

    children()
}

/// 根据当前路由渲染视图
#[component]
pub fn RouterOutlet(matcher: fn(AppRoute) -> AnyView) -> impl IntoView {
    let router = use_router();
    move || matcher(router.current_route().get())
}

/// 站内链接，不刷新页面
#[component]
pub fn Link(to: AppRoute, #[prop(optional, into)] class: String, children: Children) -> impl IntoView {
    let router = use_router();
    let on_click = move |ev: web_sys::MouseEvent| {
        ev.prevent_default();
        router.navigate(to);
    };
    view! {
        <a href=to.to_path() class=class on:click=on_click>
            {children()}
        </a>
    }
}
