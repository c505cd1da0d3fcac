//! 各工作台共用的 UI 小部件与格式化函数

use crate::web::Interval;
use leptos::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use tripfin_shared::finance::format_inr;
use tripfin_shared::maturity::Severity;
use tripfin_shared::{Timestamp, TripStatus};

/// 列表自动刷新间隔
pub const POLL_INTERVAL_MS: u32 = 15_000;

pub fn inr(amount: Decimal) -> String {
    format_inr(amount)
}

pub fn percent(rate: Decimal) -> String {
    format!("{}%", rate.normalize())
}

pub fn date(ts: Timestamp) -> String {
    ts.date_naive().to_string()
}

/// 输入框里的金额或利率；空串与非法值都返回 None
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim().replace(',', "");
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(&raw).ok()
}

pub fn status_badge_class(status: TripStatus) -> &'static str {
    match status {
        TripStatus::Pending => "badge badge-ghost",
        TripStatus::Escrowed => "badge badge-info",
        TripStatus::Funded => "badge badge-primary",
        TripStatus::InTransit => "badge badge-accent",
        TripStatus::Completed => "badge badge-warning",
        TripStatus::Repaid => "badge badge-success",
        TripStatus::Cancelled => "badge badge-error badge-outline",
    }
}

pub fn severity_badge_class(severity: Severity) -> &'static str {
    match severity {
        Severity::RecentlyOverdue => "badge badge-warning",
        Severity::Overdue => "badge badge-error",
        Severity::SeverelyOverdue => "badge badge-error badge-outline font-bold",
    }
}

#[component]
pub fn StatusBadge(status: TripStatus) -> impl IntoView {
    view! { <span class=status_badge_class(status)>{status.as_str().replace('_', " ")}</span> }
}

// ============================================================================
// Toast
// ============================================================================

/// 全局提示，(消息, 是否出错)
#[derive(Clone, Copy)]
pub struct Notice(RwSignal<Option<(String, bool)>>);

impl Notice {
    pub fn ok(&self, msg: impl Into<String>) {
        self.0.set(Some((msg.into(), false)));
    }

    pub fn err(&self, msg: impl Into<String>) {
        self.0.set(Some((msg.into(), true)));
    }

    /// 结果为 Err 时提示并返回 None
    pub fn check<T>(&self, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.err(e);
                None
            }
        }
    }
}

pub fn provide_notice() -> Notice {
    let notice = Notice(RwSignal::new(None));
    provide_context(notice);
    notice
}

pub fn use_notice() -> Notice {
    use_context::<Notice>().expect("Notice should be provided by the dashboard")
}

#[component]
pub fn Toast(notice: Notice) -> impl IntoView {
    let current = notice.0;
    // 3 秒后清除
    Effect::new(move |_| {
        if current.get().is_some() {
            set_timeout(move || current.set(None), std::time::Duration::from_secs(3));
        }
    });

    move || {
        current.get().map(|(msg, is_err)| {
            let class = if is_err {
                "alert alert-error shadow-lg"
            } else {
                "alert alert-success shadow-lg"
            };
            view! {
                <div class="toast toast-top toast-end z-50">
                    <div class=class><span>{msg}</span></div>
                </div>
            }
        })
    }
}

// ============================================================================
// 自动刷新
// ============================================================================

/// 每次计时器触发递增；依赖它的 Effect 会重新拉取数据
#[derive(Clone, Copy)]
pub struct RefreshTick(RwSignal<u64>);

impl RefreshTick {
    pub fn get(&self) -> u64 {
        self.0.get()
    }

    /// 写操作成功后立即刷新，不等下一次轮询
    pub fn bump(&self) {
        self.0.update(|t| *t += 1);
    }
}

/// 创建计时器；随所属组件一起销毁
pub fn provide_refresh_tick() -> RefreshTick {
    let tick = RefreshTick(RwSignal::new(0));
    let interval = Interval::new(POLL_INTERVAL_MS, move || tick.bump());
    StoredValue::new_local(interval);
    provide_context(tick);
    tick
}

pub fn use_refresh() -> RefreshTick {
    use_context::<RefreshTick>().expect("RefreshTick should be provided by the dashboard")
}

// ============================================================================
// 对话框
// ============================================================================

/// `<dialog>` 包装，由 `open` 信号控制显示
#[component]
pub fn Modal(open: RwSignal<bool>, #[prop(into)] title: String, children: Children) -> impl IntoView {
    let dialog_ref = NodeRef::<leptos::html::Dialog>::new();

    Effect::new(move |_| {
        if let Some(dialog) = dialog_ref.get() {
            if open.get() {
                if !dialog.open() {
                    let _ = dialog.show_modal();
                }
            } else if dialog.open() {
                dialog.close();
            }
        }
    });

    view! {
        <dialog node_ref=dialog_ref class="modal" on:close=move |_| open.set(false)>
            <div class="modal-box max-w-2xl">
                <h3 class="font-bold text-lg mb-4">{title}</h3>
                {children()}
            </div>
            <form method="dialog" class="modal-backdrop">
                <button>"close"</button>
            </form>
        </dialog>
    }
}

#[component]
pub fn StatCard(#[prop(into)] title: String, #[prop(into)] value: Signal<String>, #[prop(optional, into)] desc: String) -> impl IntoView {
    view! {
        <div class="stat">
            <div class="stat-title">{title}</div>
            <div class="stat-value text-2xl">{move || value.get()}</div>
            <div class="stat-desc">{desc}</div>
        </div>
    }
}
