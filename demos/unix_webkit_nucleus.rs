//! GTK/WebKit2 nucleus library
//!
//! Build with `--example audience_unix_webkit --features webkit` and place
//! the resulting `libaudience_unix_webkit.so` next to the application.

audience::export_nucleus!(
    audience::backend::webkit::WebkitToolkit,
    audience::backend::webkit::WebkitToolkit::new
);
