//! Web Storage 封装
//!
//! `LocalStorage` 跨会话保留 (token、后端地址)，`SessionStorage` 只在当前标签页有效。

fn window() -> Option<web_sys::Window> {
    web_sys::window()
}

macro_rules! storage_area {
    ($name:ident, $getter:ident) => {
        pub struct $name;

        impl $name {
            fn area() -> Option<web_sys::Storage> {
                window()?.$getter().ok()?
            }

            pub fn get(key: &str) -> Option<String> {
                Self::area()?.get_item(key).ok()?
            }

            pub fn set(key: &str, value: &str) -> bool {
                Self::area()
                    .and_then(|s| s.set_item(key, value).ok())
                    .is_some()
            }

            pub fn delete(key: &str) -> bool {
                Self::area()
                    .and_then(|s| s.remove_item(key).ok())
                    .is_some()
            }
        }
    };
}

storage_area!(LocalStorage, local_storage);
storage_area!(SessionStorage, session_storage);
