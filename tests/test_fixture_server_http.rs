use fixture_server::http::request_response::body_error::BodyError;
use fixture_server::multipart::multipart_decoder::decode_request;
use fixture_server::{FixtureResponse, FixtureServer, MultipartField, Scheme, ServerConfig};
use flate2::read::GzDecoder;
use http_body_util::StreamBody;
use http_body_util::combinators::BoxBody;
use hyper::StatusCode;
use hyper::body::{Bytes, Frame};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Duration, timeout};

// End-to-end tests against a fixture server bound to an ephemeral port.
//
// Requests are written as raw HTTP/1.1 over a TcpStream so the exact status
// line, headers and body bytes on the wire are what gets asserted.

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

struct RawResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl RawResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn parse_response(raw: &[u8]) -> RawResponse {
    let split = raw.windows(4).position(|window| window == b"\r\n\r\n").expect("response has no header terminator");
    let head = String::from_utf8_lossy(&raw[..split]).into_owned();
    let mut lines = head.split("\r\n");

    let status_line = lines.next().expect("missing status line");
    let status = status_line.split_whitespace().nth(1).expect("missing status code").parse().expect("status is not a number");

    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect();

    RawResponse {
        status,
        headers,
        body: raw[split + 4..].to_vec(),
    }
}

// Joins the chunks of a `Transfer-Encoding: chunked` body
fn dechunk(body: &[u8]) -> Vec<u8> {
    let mut decoded = Vec::new();
    let mut rest = body;
    loop {
        let line_end = rest.windows(2).position(|window| window == b"\r\n").expect("chunk size line");
        let size_field = String::from_utf8_lossy(&rest[..line_end]).into_owned();
        let size = usize::from_str_radix(size_field.split(';').next().unwrap().trim(), 16).expect("hex chunk size");
        rest = &rest[line_end + 2..];
        if size == 0 {
            return decoded;
        }
        decoded.extend_from_slice(&rest[..size]);
        rest = &rest[size + 2..];
    }
}

fn server_addr(server: &FixtureServer) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], server.port()))
}

/// Send a raw request on a fresh connection and read until the server closes it.
async fn send_raw_http_request(addr: SocketAddr, request: &str) -> RawResponse {
    timeout(TEST_TIMEOUT, async {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        stream.write_all(request.as_bytes()).await.expect("write request");
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.expect("read response");
        parse_response(&raw)
    })
    .await
    .expect("request timed out")
}

async fn get(server: &FixtureServer, path: &str) -> RawResponse {
    get_with_headers(server, path, &[]).await
}

async fn get_with_headers(server: &FixtureServer, path: &str, headers: &[(&str, &str)]) -> RawResponse {
    let mut request = format!("GET {} HTTP/1.1\r\nHost: localhost:{}\r\nConnection: close\r\n", path, server.port());
    for (name, value) in headers {
        request.push_str(&format!("{}: {}\r\n", name, value));
    }
    request.push_str("\r\n");
    send_raw_http_request(server_addr(server), &request).await
}

async fn start_server() -> FixtureServer {
    FixtureServer::create_http(0).await.expect("server starts")
}

#[tokio::test]
async fn test_server_identity_urls() {
    let server = start_server().await;
    let port = server.port();

    assert_ne!(port, 0);
    assert_eq!(server.scheme(), Scheme::Http);
    assert_eq!(server.prefix(), format!("http://localhost:{}", port));
    assert_eq!(server.cross_process_prefix(), format!("http://127.0.0.1:{}", port));
    assert_eq!(server.empty_page(), format!("http://localhost:{}/empty.html", port));
    assert_eq!(server.url("/title.html"), format!("http://localhost:{}/title.html", port));
}

#[tokio::test]
async fn test_static_index_and_empty_page() {
    let server = start_server().await;

    let response = get(&server, "/").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("text/html"));
    assert!(response.body_text().contains("Fixture index"));

    let response = get(&server, "/empty.html").await;
    assert_eq!(response.status, 200);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_mime_types_follow_extension() {
    let server = start_server().await;

    let response = get(&server, "/simple.json").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(response.body_text(), std::fs::read_to_string(server_resource("simple.json")).unwrap());

    let response = get(&server, "/file-to-upload.xyz123").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("application/octet-stream"));

    let response = get(&server, "/one-style.css").await;
    assert_eq!(response.header("content-type"), Some("text/css"));
}

#[tokio::test]
async fn test_missing_resource_is_404_plain_text() {
    let server = start_server().await;

    let response = get(&server, "/does-not-exist.html").await;
    assert_eq!(response.status, 404);
    assert_eq!(response.header("content-type"), Some("text/plain"));
    assert_eq!(response.body_text(), "File not found: /does-not-exist.html");

    let response = get(&server, "/../Cargo.toml").await;
    assert_eq!(response.status, 404);

    let response = get(&server, "/frames").await;
    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn test_route_override_then_reset_falls_back_to_404() {
    let server = start_server().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let handler_calls = calls.clone();
    server.set_route("/foo", move |request| {
        handler_calls.fetch_add(1, Ordering::SeqCst);
        FixtureResponse::text(StatusCode::OK, format!("handled {}", request.path())).with_header("X-Handler", "foo")
    });

    let response = get(&server, "/foo?q=1").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), "handled /foo");
    assert_eq!(response.header("x-handler"), Some("foo"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    server.reset();

    let response = get(&server, "/foo").await;
    assert_eq!(response.status, 404);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_route_can_shadow_static_resource() {
    let server = start_server().await;
    server.set_route("/title.html", |_| FixtureResponse::new(StatusCode::NO_CONTENT));

    let response = get(&server, "/title.html").await;
    assert_eq!(response.status, 204);

    assert!(server.unset_route("/title.html"));
    let response = get(&server, "/title.html").await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_async_route_runs_on_the_server() {
    let server = start_server().await;
    server.set_async_route("/slow", |request| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        FixtureResponse::text(StatusCode::OK, request.body_text())
    });

    let request = format!("POST /slow HTTP/1.1\r\nHost: localhost:{}\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello", server.port());
    let response = send_raw_http_request(server_addr(&server), &request).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), "hello");
}

#[tokio::test]
async fn test_redirect_is_idempotent() {
    let server = start_server().await;
    server.set_redirect("/from", "/empty.html");
    server.set_redirect("/from", "/title.html");

    for _ in 0..3 {
        let response = get(&server, "/from").await;
        assert_eq!(response.status, 302);
        assert_eq!(response.header("location"), Some("/title.html"));
        assert!(response.body.is_empty());
    }
}

#[tokio::test]
async fn test_unset_redirect_falls_back_to_static() {
    let server = start_server().await;
    server.set_redirect("/title.html", "/empty.html");
    server.set_redirect("/gone.html", "/empty.html");

    assert_eq!(get(&server, "/title.html").await.status, 302);
    assert_eq!(get(&server, "/gone.html").await.status, 302);

    assert!(server.unset_route("/title.html"));
    assert!(server.unset_route("/gone.html"));
    assert!(!server.unset_route("/gone.html"));

    let response = get(&server, "/title.html").await;
    assert_eq!(response.status, 200);
    assert!(response.header("location").is_none());
    assert_eq!(get(&server, "/gone.html").await.status, 404);
}

#[tokio::test]
async fn test_streaming_route_body_is_sent_chunked() {
    let server = start_server().await;
    server.set_route("/stream", |_| {
        let frames = vec![Ok::<_, BodyError>(Frame::data(Bytes::from("chunk one "))), Ok(Frame::data(Bytes::from("chunk two")))];
        FixtureResponse::ok().with_header("Content-Type", "text/plain").with_streaming_body(BoxBody::new(StreamBody::new(futures::stream::iter(frames))))
    });

    let response = get(&server, "/stream").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("text/plain"));
    assert_eq!(response.header("transfer-encoding"), Some("chunked"));
    assert!(response.header("content-length").is_none());
    assert_eq!(dechunk(&response.body), b"chunk one chunk two");
}

#[tokio::test]
async fn test_basic_auth() {
    let server = start_server().await;
    server.set_auth("/empty.html", "user", "pass");

    let response = get(&server, "/empty.html").await;
    assert_eq!(response.status, 401);
    assert_eq!(response.header("www-authenticate"), Some("Basic realm=\"Secure Area\""));
    assert_eq!(response.body_text(), "HTTP Error 401 Unauthorized: Access is denied");

    // user:wrong
    let response = get_with_headers(&server, "/empty.html", &[("Authorization", "Basic dXNlcjp3cm9uZw==")]).await;
    assert_eq!(response.status, 401);

    let response = get_with_headers(&server, "/empty.html", &[("Authorization", "Bearer dXNlcjpwYXNz")]).await;
    assert_eq!(response.status, 401);

    // user:pass
    let response = get_with_headers(&server, "/empty.html", &[("Authorization", "Basic dXNlcjpwYXNz")]).await;
    assert_eq!(response.status, 200);

    // Other paths stay open
    let response = get(&server, "/title.html").await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_csp_header_only_on_registered_path() {
    let server = start_server().await;
    server.set_csp("/csp.html", "script-src 'none'");

    let response = get(&server, "/csp.html").await;
    assert_eq!(response.header("content-security-policy"), Some("script-src 'none'"));

    let response = get(&server, "/title.html").await;
    assert_eq!(response.header("content-security-policy"), None);
}

#[tokio::test]
async fn test_gzip_round_trip() {
    let server = start_server().await;
    server.enable_gzip("/one-style.html");

    let response = get(&server, "/one-style.html").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-encoding"), Some("gzip"));
    assert_eq!(response.header("content-type"), Some("text/html"));

    let mut decoded = Vec::new();
    GzDecoder::new(&response.body[..]).read_to_end(&mut decoded).unwrap();
    assert_eq!(decoded, std::fs::read(server_resource("one-style.html")).unwrap());

    let response = get(&server, "/title.html").await;
    assert_eq!(response.header("content-encoding"), None);
}

#[tokio::test]
async fn test_future_request_captures_snapshot() {
    let server = start_server().await;
    let waiter = server.future_request("/empty.html");

    let port = server.port();
    let addr = server_addr(&server);
    let client = tokio::spawn(async move {
        let request = format!("GET /empty.html?a=b HTTP/1.1\r\nHost: localhost:{}\r\nX-Test: 1\r\nX-Multi: a\r\nX-Multi: b\r\nConnection: close\r\n\r\n", port);
        send_raw_http_request(addr, &request).await
    });

    let captured = timeout(TEST_TIMEOUT, waiter).await.expect("await timed out").expect("await resolved");
    assert_eq!(captured.method(), "GET");
    assert_eq!(captured.url(), format!("http://localhost:{}/empty.html?a=b", port));
    assert_eq!(captured.header("x-test"), Some("1"));
    assert_eq!(captured.header_values("X-Multi"), vec!["a", "b"]);
    assert!(captured.body().is_empty());

    let response = client.await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(server.registry().pending_subscriptions(), 0);
}

#[tokio::test]
async fn test_future_request_for_same_path_shares_one_request() {
    let server = start_server().await;
    let first = server.future_request("/title.html");
    let second = server.future_request("/title.html");
    assert_eq!(server.registry().pending_subscriptions(), 1);

    let request = format!("POST /title.html HTTP/1.1\r\nHost: localhost:{}\r\nContent-Length: 3\r\nConnection: close\r\n\r\none", server.port());
    send_raw_http_request(server_addr(&server), &request).await;

    let (first, second) = timeout(TEST_TIMEOUT, async { (first.await, second.await) }).await.unwrap();
    assert_eq!(first.unwrap().body_text(), "one");
    assert_eq!(second.unwrap().body_text(), "one");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_future_request_blocking_wait_from_test_thread() {
    let server = start_server().await;
    let waiter = server.future_request("/simple.json");

    let blocked = tokio::task::spawn_blocking(move || waiter.wait());
    let response = get_with_headers(&server, "/simple.json", &[("X-Test", "blocking")]).await;
    assert_eq!(response.status, 200);

    let captured = timeout(TEST_TIMEOUT, blocked).await.unwrap().unwrap().unwrap();
    assert_eq!(captured.header("x-test"), Some("blocking"));
}

#[tokio::test]
async fn test_reset_isolation() {
    let server = start_server().await;
    server.set_route("/title.html", |_| FixtureResponse::new(StatusCode::IM_A_TEAPOT));
    server.set_auth("/empty.html", "user", "pass");
    server.set_csp("/csp.html", "default-src 'none'");
    server.enable_gzip("/simple.json");
    let waiter = server.future_request("/one-style.html");

    server.reset();

    assert_eq!(get(&server, "/title.html").await.status, 200);
    assert_eq!(get(&server, "/empty.html").await.status, 200);
    assert_eq!(get(&server, "/csp.html").await.header("content-security-policy"), None);
    assert_eq!(get(&server, "/simple.json").await.header("content-encoding"), None);

    let error = timeout(TEST_TIMEOUT, waiter).await.unwrap().unwrap_err();
    assert!(error.is_await_cancelled());
}

#[tokio::test]
async fn test_multipart_upload_through_route() {
    let server = start_server().await;
    let uploads: Arc<std::sync::Mutex<Vec<MultipartField>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = uploads.clone();
    server.set_route("/upload", move |request| match decode_request(request) {
        Ok(fields) => {
            let count = fields.len();
            sink.lock().unwrap().extend(fields);
            FixtureResponse::text(StatusCode::OK, format!("{} fields", count))
        }
        Err(e) => FixtureResponse::text(StatusCode::BAD_REQUEST, e.to_string()),
    });

    let body = "--XyZ\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nJohn\r\n--XyZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\nContent-Type: text/plain\r\n\r\nfile body\r\n--XyZ--\r\n";
    let request = format!(
        "POST /upload HTTP/1.1\r\nHost: localhost:{}\r\nContent-Type: multipart/form-data; boundary=XyZ\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        server.port(),
        body.len(),
        body
    );
    let response = send_raw_http_request(server_addr(&server), &request).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), "2 fields");

    let uploads = uploads.lock().unwrap();
    assert_eq!(uploads[0].content, "John");
    assert_eq!(uploads[1].filename.as_deref(), Some("a.txt"));
    assert_eq!(uploads[1].content, "file body");

    let request = format!("POST /upload HTTP/1.1\r\nHost: localhost:{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", server.port());
    let response = send_raw_http_request(server_addr(&server), &request).await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_custom_resource_root() {
    let root = std::env::temp_dir().join(format!("fixture-server-root-{}", std::process::id()));
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("only-here.txt"), "custom root").unwrap();

    let server = FixtureServer::start(ServerConfig::http(0).with_resource_root(&root)).await.unwrap();
    let response = get(&server, "/only-here.txt").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("text/plain"));
    assert_eq!(response.body_text(), "custom root");

    assert_eq!(get(&server, "/index.html").await.status, 404);

    drop(server);
    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn test_equivalent_path_spellings_share_auth_csp_and_gzip() {
    let server = start_server().await;
    server.set_auth("/title.html", "user", "pass");
    server.set_csp("/csp.html", "default-src 'none'");
    server.enable_gzip("/csp.html");

    for path in ["/title.html", "/title%2Ehtml", "//title.html", "/title%2ehtml?x=1"] {
        let response = get(&server, path).await;
        assert_eq!(response.status, 401, "{} skipped auth", path);
    }

    let expected = std::fs::read(server_resource("csp.html")).unwrap();
    for path in ["/csp%2Ehtml", "//csp.html"] {
        let response = get_with_headers(&server, path, &[("Accept-Encoding", "gzip")]).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.header("content-security-policy"), Some("default-src 'none'"), "{} lost its CSP", path);
        assert_eq!(response.header("content-encoding"), Some("gzip"), "{} was not compressed", path);

        let mut decoded = Vec::new();
        GzDecoder::new(&response.body[..]).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, expected);
    }
}

// /proc/self/mem reports as a regular file but reading it from offset 0 fails
#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_unreadable_resource_is_500_plain_text() {
    let root = std::env::temp_dir().join(format!("fixture-server-unreadable-{}", std::process::id()));
    std::fs::create_dir_all(&root).unwrap();
    let link = root.join("broken.bin");
    let _ = std::fs::remove_file(&link);
    std::os::unix::fs::symlink("/proc/self/mem", &link).unwrap();

    let server = FixtureServer::start(ServerConfig::http(0).with_resource_root(&root)).await.unwrap();
    let response = get(&server, "/broken.bin").await;
    assert_eq!(response.status, 500);
    assert_eq!(response.header("content-type"), Some("text/plain"));
    assert!(!response.body.is_empty());

    drop(server);
    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn test_stop_cancels_awaits_and_closes_listener() {
    let server = start_server().await;
    let addr = server_addr(&server);
    let waiter = server.future_request("/never");

    server.stop();
    assert!(server.is_stopped());

    let error = timeout(TEST_TIMEOUT, waiter).await.unwrap().unwrap_err();
    assert!(error.is_await_cancelled());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(TcpStream::connect(addr).await.is_err());

    // Stopping twice is harmless
    server.stop();
}

#[tokio::test]
async fn test_port_in_use_is_a_bind_error() {
    let first = start_server().await;
    let error = match FixtureServer::create_http(first.port()).await {
        Ok(_) => panic!("second bind on the same port must fail"),
        Err(e) => e,
    };
    assert!(matches!(error.kind, fixture_server::FixtureServerErrorKind::Bind(_)));
}

fn server_resource(name: &str) -> std::path::PathBuf {
    fixture_server::file::static_resources::StaticResources::bundled_root().join(name)
}
