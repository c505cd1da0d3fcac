//! 读取 `<input type="file">` 选中的文件

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{File, FileReader, HtmlInputElement};

fn js_err(e: JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{:?}", e))
}

/// 事件源 input 的第一个文件
pub fn first_file(ev: &web_sys::Event) -> Option<File> {
    let input: HtmlInputElement = ev.target()?.dyn_into().ok()?;
    input.files()?.get(0)
}

/// 以文本读取 (CSV)
pub async fn read_text(file: &File) -> Result<String, String> {
    JsFuture::from(file.text())
        .await
        .map_err(js_err)?
        .as_string()
        .ok_or_else(|| "File is not text".to_string())
}

/// 以 data URL 读取 (单据上传)
pub async fn read_data_url(file: &File) -> Result<String, String> {
    let reader = FileReader::new().map_err(js_err)?;
    let promise = js_sys::Promise::new(&mut |resolve, reject| {
        let source = reader.clone();
        let onload = Closure::once_into_js(move || {
            let result = source.result().unwrap_or(JsValue::NULL);
            let _ = resolve.call1(&JsValue::NULL, &result);
        });
        let onerror = Closure::once_into_js(move || {
            let _ = reject.call1(&JsValue::NULL, &JsValue::from_str("Failed to read file"));
        });
        reader.set_onload(Some(onload.unchecked_ref()));
        reader.set_onerror(Some(onerror.unchecked_ref()));
    });
    reader.read_as_data_url(file).map_err(js_err)?;

    JsFuture::from(promise)
        .await
        .map_err(js_err)?
        .as_string()
        .ok_or_else(|| "File could not be encoded".to_string())
}
