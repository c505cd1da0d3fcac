//! CSV 批量上传：本地解析预览，确认后一次性提交

use crate::components::common::{Modal, inr};
use crate::web::file;
use leptos::prelude::*;
use leptos::task::spawn_local;
use tripfin_shared::bulk_csv::{self, BulkParseReport};
use tripfin_shared::protocol::{BulkCreateReport, CreateTripRequest};

/// 提交后的汇总文案
fn summary(report: &BulkCreateReport) -> String {
    match (report.created, report.failed) {
        (0, _) => "No trips were created".to_string(),
        (n, 0) => format!("{} trip(s) created", n),
        (n, f) => format!("{} trip(s) created, {} rejected", n, f),
    }
}

#[component]
pub fn BulkUploadDialog(
    open: RwSignal<bool>,
    #[prop(into)] on_submit: Callback<Vec<CreateTripRequest>>,
    result: ReadSignal<Option<BulkCreateReport>>,
) -> impl IntoView {
    let parsed = RwSignal::new(Option::<BulkParseReport>::None);
    let (read_error, set_read_error) = signal(Option::<String>::None);

    let on_file = move |ev: leptos::web_sys::Event| {
        let Some(selected) = file::first_file(&ev) else {
            return;
        };
        spawn_local(async move {
            match file::read_text(&selected).await {
                Ok(text) => {
                    set_read_error.set(None);
                    parsed.set(Some(bulk_csv::parse(&text)));
                }
                Err(e) => set_read_error.set(Some(e)),
            }
        });
    };

    let submit = move |_| {
        let Some(report) = parsed.get_untracked() else {
            return;
        };
        if report.drafts.is_empty() {
            set_read_error.set(Some("No valid rows to upload".to_string()));
            return;
        }
        on_submit.run(report.drafts);
        parsed.set(None);
    };

    view! {
        <Modal open=open title="Bulk upload trips">
            <div class="space-y-4">
                <div class="text-sm">
                    <p>"Upload a CSV with this header:"</p>
                    <code class="block bg-base-200 p-2 rounded text-xs overflow-x-auto">{bulk_csv::template_header()}</code>
                </div>
                <input type="file" accept=".csv,text/csv" class="file-input file-input-bordered w-full" on:change=on_file />

                {move || read_error.get().map(|msg| view! {
                    <div role="alert" class="alert alert-error text-sm py-2"><span>{msg}</span></div>
                })}

                {move || parsed.get().map(|report| {
                    let total: rust_decimal::Decimal = report.drafts.iter().map(|d| d.amount).sum();
                    view! {
                        <div class="stats shadow w-full">
                            <div class="stat">
                                <div class="stat-title">"Rows"</div>
                                <div class="stat-value text-xl">{report.total_rows}</div>
                            </div>
                            <div class="stat">
                                <div class="stat-title">"Valid"</div>
                                <div class="stat-value text-xl text-success">{report.drafts.len()}</div>
                                <div class="stat-desc">{inr(total)}</div>
                            </div>
                            <div class="stat">
                                <div class="stat-title">"Invalid"</div>
                                <div class="stat-value text-xl text-error">{report.error_count()}</div>
                            </div>
                        </div>
                        <ul class="text-sm text-error max-h-40 overflow-y-auto">
                            {report.errors.into_iter().map(|e| view! {
                                <li>{format!("Line {}: {}", e.line, e.reason)}</li>
                            }).collect_view()}
                        </ul>
                    }
                })}

                {move || result.get().map(|report| view! {
                    <div class="bg-base-200 rounded p-3 text-sm space-y-1">
                        <div class="font-semibold">{summary(&report)}</div>
                        {report.errors.into_iter().map(|e| view! {
                            <div class="text-error">{format!("Row {}: {}", e.index + 1, e.error)}</div>
                        }).collect_view()}
                    </div>
                })}

                <div class="modal-action">
                    <button type="button" class="btn btn-ghost" on:click=move |_| open.set(false)>"Close"</button>
                    <button type="button" class="btn btn-primary"
                        disabled=move || parsed.with(|p| p.as_ref().is_none_or(|r| r.drafts.is_empty()))
                        on:click=submit
                    >"Upload valid rows"</button>
                </div>
            </div>
        </Modal>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_reflects_partial_success() {
        let mut report = BulkCreateReport::default();
        assert_eq!(summary(&report), "No trips were created");
        report.created = 3;
        assert_eq!(summary(&report), "3 trip(s) created");
        report.failed = 1;
        assert_eq!(summary(&report), "3 trip(s) created, 1 rejected");
    }
}
