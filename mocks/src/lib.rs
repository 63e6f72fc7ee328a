use httptest::{matchers::*, responders::*, Expectation, Server};

pub use httptest;

/// Create a mock vault server whose `POST /api/upload` answers every request
/// with `status`. `times` is the exact number of uploads the test expects;
/// the server verifies it when dropped.
pub fn upload_server(status: u16, times: usize) -> Server {
    let server = Server::run();
    expect_uploads(&server, status, times);
    server
}

/// Register an expectation for `times` multipart uploads answered with `status`.
pub fn expect_uploads(server: &Server, status: u16, times: usize) {
    server.expect(
        Expectation::matching(request::method_path("POST", "/api/upload"))
            .times(times)
            .respond_with(status_code(status)),
    );
}

/// Expect uploads whose file part is named `file_name`.
pub fn expect_named_upload(server: &Server, file_name: &str, status: u16) {
    let needle = format!("filename=\"{}\"", file_name);
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/api/upload"),
            request::body(matches(regex_escape(&needle))),
        ])
        .respond_with(status_code(status)),
    );
}

/// Base URL of a running mock server, without a trailing slash.
pub fn base_url(server: &Server) -> String {
    server.url_str("").trim_end_matches('/').to_string()
}

fn regex_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
