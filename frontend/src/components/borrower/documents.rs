//! 行程单据上传与查看
//!
//! 发车前需要 Bilty 与 E-Way Bill，结案前需要 POD 与最终发票。

use crate::auth::use_auth;
use crate::components::common::{Modal, date};
use crate::web::file;
use leptos::prelude::*;
use leptos::task::spawn_local;
use tripfin_shared::{DocumentContent, DocumentType, MAX_DOCUMENT_BYTES, Trip};

/// base64 后体积约为原文件的 4/3
const MAX_FILE_BYTES: usize = MAX_DOCUMENT_BYTES / 4 * 3;

fn too_large(bytes: usize) -> String {
    format!(
        "File is too large ({} KiB, limit {} KiB)",
        bytes.div_ceil(1024),
        MAX_FILE_BYTES / 1024
    )
}

/// 读取前先按原始大小拦一次，读完再按 data URL 长度确认
fn check_file_size(bytes: f64) -> Result<(), String> {
    let bytes = bytes.max(0.0) as usize;
    if bytes > MAX_FILE_BYTES {
        Err(too_large(bytes))
    } else {
        Ok(())
    }
}

fn download_name(trip_id: &str, doc: &DocumentContent) -> String {
    let ext = doc
        .content_type
        .rsplit('/')
        .next()
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin");
    format!("{}-{}.{}", trip_id, doc.document_type.as_str(), ext)
}

#[component]
pub fn DocumentsDialog(
    open: RwSignal<bool>,
    trip: RwSignal<Option<Trip>>,
    #[prop(into)] on_upload: Callback<(String, DocumentType, String)>,
) -> impl IntoView {
    let kind = RwSignal::new(DocumentType::Bilty);
    let (reading, set_reading) = signal(false);
    let (error, set_error) = signal(Option::<String>::None);

    let viewing = RwSignal::new(Option::<(String, DocumentContent)>::None);
    let auth = use_auth();

    let on_file = move |ev: leptos::web_sys::Event| {
        let (Some(selected), Some(t)) = (file::first_file(&ev), trip.get_untracked()) else {
            return;
        };
        if let Err(msg) = check_file_size(selected.size()) {
            set_error.set(Some(msg));
            return;
        }
        set_reading.set(true);
        spawn_local(async move {
            match file::read_data_url(&selected).await {
                Ok(data) if data.len() > MAX_DOCUMENT_BYTES => {
                    set_error.set(Some(too_large(data.len() / 4 * 3)));
                }
                Ok(data) => {
                    set_error.set(None);
                    on_upload.run((t.id, kind.get_untracked(), data));
                }
                Err(e) => set_error.set(Some(e)),
            }
            set_reading.set(false);
        });
    };

    let on_view = move |trip_id: String, k: DocumentType| {
        let Some(api) = auth.api() else {
            return;
        };
        spawn_local(async move {
            match api.document(&trip_id, k).await {
                Ok(doc) => {
                    set_error.set(None);
                    viewing.set(Some((trip_id, doc)));
                }
                Err(e) => set_error.set(Some(e)),
            }
        });
    };

    view! {
        <Modal open=open title="Trip documents">
            <div class="space-y-4">
                {move || error.get().map(|msg| view! {
                    <div role="alert" class="alert alert-error text-sm py-2"><span>{msg}</span></div>
                })}
                {move || trip.get().map(|t| view! {
                    <ul class="space-y-1">
                        {DocumentType::ALL.into_iter().map(|k| {
                            let uploaded = t.document(k).map(|d| date(d.uploaded_at));
                            let required = DocumentType::DISPATCH.contains(&k) || DocumentType::DELIVERY.contains(&k);
                            let trip_id = t.id.clone();
                            view! {
                                <li class="flex justify-between items-center text-sm">
                                    <span>{k.label()} {required.then_some(" *")}</span>
                                    {match uploaded {
                                        Some(on) => view! {
                                            <span class="flex gap-2 items-center">
                                                <span class="badge badge-success">{format!("uploaded {}", on)}</span>
                                                <button type="button" class="btn btn-xs btn-ghost"
                                                    on:click=move |_| on_view(trip_id.clone(), k)
                                                >"View"</button>
                                            </span>
                                        }.into_any(),
                                        None => view! { <span class="badge badge-ghost">"missing"</span> }.into_any(),
                                    }}
                                </li>
                            }
                        }).collect_view()}
                    </ul>
                })}
                {move || viewing.get().filter(|(id, _)| trip.with(|t| t.as_ref().is_some_and(|t| &t.id == id))).map(|(trip_id, doc)| {
                    let name = download_name(&trip_id, &doc);
                    view! {
                        <div class="alert text-sm py-2">
                            <span>{format!("{} ({})", doc.document_type.label(), doc.content_type)}</span>
                            <a class="link link-primary" href=doc.document_data download=name target="_blank">"Download"</a>
                        </div>
                    }
                })}
                <div class="join w-full">
                    <select class="select select-bordered join-item"
                        on:change=move |ev| {
                            if let Some(k) = DocumentType::from_str_opt(&event_target_value(&ev)) {
                                kind.set(k);
                            }
                        }
                    >
                        {DocumentType::ALL.into_iter().map(|k| view! {
                            <option value=k.as_str()>{k.label()}</option>
                        }).collect_view()}
                    </select>
                    <input type="file" class="file-input file-input-bordered join-item w-full"
                        disabled=move || reading.get()
                        on:change=on_file
                    />
                </div>
                <p class="text-xs opacity-60">"* Bilty and E-Way Bill are needed to start transit; POD and Final Invoice to complete."</p>
            </div>
            <div class="modal-action">
                <button type="button" class="btn btn-ghost" on:click=move |_| open.set(false)>"Close"</button>
            </div>
        </Modal>
    }
}
