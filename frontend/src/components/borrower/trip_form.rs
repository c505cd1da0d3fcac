//! 新建行程表单
//!
//! 输入框绑定字符串信号，提交时统一转换并校验为 [`CreateTripRequest`]。

use crate::components::common::{Modal, parse_decimal};
use leptos::prelude::*;
use rust_decimal::Decimal;
use tripfin_shared::finance::{self, DEFAULT_MATURITY_DAYS};
use tripfin_shared::protocol::CreateTripRequest;
use tripfin_shared::RiskLevel;

/// 表单原始输入
#[derive(Debug, Clone, Default)]
pub struct TripDraft {
    pub origin: String,
    pub destination: String,
    pub sender: String,
    pub receiver: String,
    pub transporter: String,
    pub eway_bill_number: String,
    pub load_type: String,
    pub weight: String,
    pub distance: String,
    pub amount: String,
    pub interest_rate: String,
    pub maturity_days: String,
    pub risk_level: String,
}

fn optional(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn required(raw: &str, name: &str) -> Result<String, String> {
    optional(raw).ok_or_else(|| format!("{} is required", name))
}

fn number_or_zero(raw: &str, name: &str) -> Result<Decimal, String> {
    if raw.trim().is_empty() {
        return Ok(Decimal::ZERO);
    }
    match parse_decimal(raw) {
        Some(v) if v >= Decimal::ZERO => Ok(v),
        _ => Err(format!("{} must be a non-negative number", name)),
    }
}

impl TripDraft {
    pub fn into_request(self) -> Result<CreateTripRequest, String> {
        let amount = parse_decimal(&self.amount).ok_or_else(|| "Loan amount is required".to_string())?;
        finance::validate_loan_amount(amount)?;
        let interest_rate =
            parse_decimal(&self.interest_rate).ok_or_else(|| "Interest rate is required".to_string())?;
        finance::validate_interest_rate(interest_rate)?;

        let maturity_days = match self.maturity_days.trim() {
            "" => DEFAULT_MATURITY_DAYS,
            raw => match raw.parse::<u32>() {
                Ok(d) if d > 0 => d,
                _ => return Err("Maturity must be a positive number of days".to_string()),
            },
        };
        let risk_level = match self.risk_level.as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        };

        Ok(CreateTripRequest {
            origin: required(&self.origin, "Pickup location")?,
            destination: required(&self.destination, "Destination")?,
            sender: optional(&self.sender),
            receiver: optional(&self.receiver),
            transporter: optional(&self.transporter),
            eway_bill_number: optional(&self.eway_bill_number),
            load_type: optional(&self.load_type).unwrap_or_else(|| "General".to_string()),
            weight: number_or_zero(&self.weight, "Weight")?,
            distance: number_or_zero(&self.distance, "Distance")?,
            amount,
            interest_rate,
            maturity_days: Some(maturity_days),
            risk_level,
        })
    }
}

/// 绑定到 `TripDraft` 某个字段的文本输入框
macro_rules! draft_input {
    ($draft:ident, $label:expr, $placeholder:expr, $field:ident) => {
        view! {
            <div class="form-control">
                <label class="label"><span class="label-text">{$label}</span></label>
                <input type="text" placeholder=$placeholder
                    class="input input-bordered w-full"
                    prop:value=move || $draft.with(|d| d.$field.clone())
                    on:input=move |ev| {
                        let value = event_target_value(&ev);
                        $draft.update(|d| d.$field = value);
                    }
                />
            </div>
        }
    };
}

#[component]
pub fn CreateTripDialog(open: RwSignal<bool>, #[prop(into)] on_create: Callback<CreateTripRequest>) -> impl IntoView {
    let draft = RwSignal::new(TripDraft::default());
    let (error, set_error) = signal(Option::<String>::None);

    let on_submit = move |ev: leptos::web_sys::SubmitEvent| {
        ev.prevent_default();
        match draft.get_untracked().into_request() {
            Ok(req) => {
                set_error.set(None);
                on_create.run(req);
                draft.set(TripDraft::default());
                open.set(false);
            }
            Err(e) => set_error.set(Some(e)),
        }
    };

    view! {
        <Modal open=open title="New trip">
            <form on:submit=on_submit class="space-y-2">
                {move || error.get().map(|msg| view! {
                    <div role="alert" class="alert alert-error text-sm py-2"><span>{msg}</span></div>
                })}
                <div class="grid grid-cols-2 gap-4">
                    {draft_input!(draft, "Pickup", "Andheri, Mumbai", origin)}
                    {draft_input!(draft, "Destination", "Pune", destination)}
                    {draft_input!(draft, "Sender", "", sender)}
                    {draft_input!(draft, "Receiver", "", receiver)}
                    {draft_input!(draft, "Transporter", "", transporter)}
                    {draft_input!(draft, "E-way bill no.", "", eway_bill_number)}
                    {draft_input!(draft, "Load type", "General", load_type)}
                    {draft_input!(draft, "Weight (kg)", "0", weight)}
                    {draft_input!(draft, "Distance (km)", "0", distance)}
                    {draft_input!(draft, "Loan amount (₹)", "20000 - 80000", amount)}
                    {draft_input!(draft, "Interest rate (%)", "8 - 18", interest_rate)}
                    {draft_input!(draft, "Maturity (days)", "30", maturity_days)}
                </div>
                <div class="form-control">
                    <label class="label"><span class="label-text">"Risk level"</span></label>
                    <select class="select select-bordered w-full"
                        on:change=move |ev| {
                            let value = event_target_value(&ev);
                            draft.update(|d| d.risk_level = value);
                        }
                    >
                        <option value="">"Default (low)"</option>
                        <option value="low">"Low"</option>
                        <option value="medium">"Medium"</option>
                        <option value="high">"High"</option>
                    </select>
                </div>
                <div class="modal-action">
                    <button type="button" class="btn btn-ghost" on:click=move |_| open.set(false)>"Cancel"</button>
                    <button type="submit" class="btn btn-primary">"Post trip"</button>
                </div>
            </form>
        </Modal>
    }
}
