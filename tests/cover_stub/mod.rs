use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum StubResponse {
    /// `len` bytes with the given content type and an exact Content-Length.
    Image {
        content_type: &'static str,
        len: usize,
    },
    Html {
        len: usize,
    },
    Status(u16),
    /// Image body sent with chunked transfer encoding (no Content-Length).
    Chunked {
        len: usize,
    },
    /// Declares `declared` bytes but only sends `actual`.
    Truncated {
        declared: usize,
        actual: usize,
    },
    /// Waits `delay` before answering with a large JPEG.
    Stall {
        delay: Duration,
    },
}

/// Serves canned cover responses keyed by request path (query included) and
/// records every path it was asked for. Unknown paths get a 404.
pub struct CoverStub {
    pub base_url: String,
    hits: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CoverStub {
    pub fn spawn(routes: Vec<(&str, StubResponse)>) -> Self {
        let routes: HashMap<String, StubResponse> = routes
            .into_iter()
            .map(|(path, response)| (path.to_owned(), response))
            .collect();

        let server = tiny_http::Server::http("127.0.0.1:0").expect("start cover stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let hits = Arc::new(Mutex::new(Vec::new()));
        let server_hits = Arc::clone(&hits);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                server_hits.lock().expect("lock hits").push(path.clone());

                if let Some(StubResponse::Stall { delay }) = routes.get(&path) {
                    let delay = *delay;
                    thread::spawn(move || {
                        thread::sleep(delay);
                        let _ = request.respond(build_response(&StubResponse::Image {
                            content_type: "image/jpeg",
                            len: 5_000,
                        }));
                    });
                    continue;
                }

                let response = match routes.get(&path) {
                    Some(response) => build_response(response),
                    None => tiny_http::Response::from_data(b"not found".to_vec())
                        .with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            hits,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    #[allow(dead_code)]
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().expect("lock hits").clone()
    }
}

impl Drop for CoverStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn content_type(value: &str) -> tiny_http::Header {
    tiny_http::Header::from_bytes(&b"Content-Type"[..], value.as_bytes()).expect("build header")
}

fn build_response(response: &StubResponse) -> tiny_http::Response<Cursor<Vec<u8>>> {
    match *response {
        StubResponse::Image { content_type: ct, len } => {
            tiny_http::Response::from_data(vec![0xA5; len]).with_header(content_type(ct))
        }
        StubResponse::Html { len } => tiny_http::Response::from_data(vec![b'x'; len])
            .with_header(content_type("text/html; charset=utf-8")),
        StubResponse::Status(code) => {
            tiny_http::Response::from_data(b"error".to_vec()).with_status_code(code)
        }
        StubResponse::Chunked { len } => tiny_http::Response::new(
            tiny_http::StatusCode(200),
            vec![content_type("image/png")],
            Cursor::new(vec![0xA5; len]),
            None,
            None,
        ),
        StubResponse::Truncated { declared, actual } => tiny_http::Response::new(
            tiny_http::StatusCode(200),
            vec![content_type("image/jpeg")],
            Cursor::new(vec![0xA5; actual]),
            Some(declared),
            None,
        ),
        StubResponse::Stall { .. } => unreachable!("stalled routes respond from their own thread"),
    }
}
