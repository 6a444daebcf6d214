//! Embedded static resources.
//!
//! - `build`: HTML shell, bundle preludes, service worker
//! - `serve`: dev server pages and the live-reload client
//!
//! ```ignore
//! use embed::serve::{HOTRELOAD_JS, HotreloadVars};
//!
//! let js = HOTRELOAD_JS.render(&HotreloadVars { ws_port: 35729 });
//! ```

mod template;

pub use template::{Template, TemplateVars};

/// Escape text for use inside HTML element content or a quoted attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub mod build {
    use super::{Template, TemplateVars, escape_html};

    /// Variables for the built-in HTML shell.
    pub struct ShellVars<'a> {
        pub title: &'a str,
        pub description: &'a str,
        pub theme_color: &'a str,
    }

    impl TemplateVars for ShellVars<'_> {
        fn apply(&self, content: &str) -> String {
            content
                .replace("__TITLE__", &escape_html(self.title))
                .replace("__DESCRIPTION__", &escape_html(self.description))
                .replace("__THEME_COLOR__", &escape_html(self.theme_color))
        }
    }

    /// Default HTML shell, used when `[build] template` is unset.
    pub const SHELL_HTML: Template<ShellVars<'static>> =
        Template::new(include_str!("build/shell.html"));

    /// Variables for the service worker registration snippet.
    pub struct SwRegisterVars<'a> {
        pub url: &'a str,
        pub scope: &'a str,
    }

    impl TemplateVars for SwRegisterVars<'_> {
        fn apply(&self, content: &str) -> String {
            content
                .replace("__SW_URL__", self.url)
                .replace("__SW_SCOPE__", self.scope)
        }
    }

    pub const SW_REGISTER_JS: Template<SwRegisterVars<'static>> =
        Template::new(include_str!("build/sw-register.js"));

    /// Prepended by the hot loader: keeps the scroll position across reloads.
    pub const HOT_PRELUDE_JS: &str = include_str!("build/hot-prelude.js");

    /// Prepended by the app loader in debug builds.
    pub const DEBUG_PRELUDE_JS: &str = include_str!("build/debug-prelude.js");

    /// Variables for the generated service worker.
    pub struct ServiceWorkerVars<'a> {
        pub cache_id: &'a str,
        /// JSON array of `{url, revision}`.
        pub precache: &'a str,
        /// JSON array of runtime caching routes.
        pub runtime: &'a str,
        pub navigate_fallback: &'a str,
    }

    impl TemplateVars for ServiceWorkerVars<'_> {
        fn apply(&self, content: &str) -> String {
            content
                .replace("__CACHE_ID__", self.cache_id)
                .replace("__PRECACHE__", self.precache)
                .replace("__RUNTIME__", self.runtime)
                .replace("__NAVIGATE_FALLBACK__", self.navigate_fallback)
        }
    }

    pub const SERVICE_WORKER_JS: Template<ServiceWorkerVars<'static>> =
        Template::new(include_str!("build/service-worker.js"));
}

pub mod serve {
    use super::{Template, TemplateVars, escape_html};

    /// Variables for hotreload.js.
    pub struct HotreloadVars {
        pub ws_port: u16,
    }

    impl TemplateVars for HotreloadVars {
        fn apply(&self, content: &str) -> String {
            content.replace("__WS_PORT__", &self.ws_port.to_string())
        }
    }

    /// Live-reload client with the error overlay, injected into HTML responses.
    pub const HOTRELOAD_JS: Template<HotreloadVars> =
        Template::new(include_str!("serve/hotreload.js"));

    /// Variables for loading.html.
    pub struct LoadingVars<'a> {
        pub title: &'a str,
    }

    impl TemplateVars for LoadingVars<'_> {
        fn apply(&self, content: &str) -> String {
            content.replace("__TITLE__", &escape_html(self.title))
        }
    }

    /// Auto-refreshing page served until the first build succeeds.
    pub const LOADING_HTML: Template<LoadingVars<'static>> =
        Template::new(include_str!("serve/loading.html"));
}
