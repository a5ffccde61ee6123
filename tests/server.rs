//! End-to-end tests: a real server on a loopback port, a raw HTTP/1.1 client.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use hitch::{
    BoxedHandler, Chain, Error, Flusher, Logger, ResponseWriter, Server, encode_json, middleware,
};
use http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Running {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), Error>>,
}

impl Running {
    async fn shutdown(self) {
        let _ = self.stop.send(());
        let result = tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("server did not stop")
            .expect("server task panicked");
        assert!(result.is_ok());
    }
}

async fn start(handler: BoxedHandler) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        Server::from_listener(listener)
            .serve_with_shutdown(handler, async {
                let _ = stopped.await;
            })
            .await
    });

    Running { addr, stop, task }
}

/// Sends one request and returns the raw response text.
///
/// Reads until the server closes the connection. A reset still returns
/// whatever arrived before it.
async fn send(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    let mut chunk = [0; 4096];
    loop {
        let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut chunk))
            .await
            .expect("response timed out");
        match read {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn get(addr: SocketAddr, path: &str) -> String {
    send(addr, &format!("GET {path} HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\r\n")).await
}

fn status_line(response: &str) -> &str {
    response.lines().next().unwrap_or_default()
}

#[tokio::test(flavor = "multi_thread")]
async fn serves_chain_output() {
    let app = Chain::new([middleware::trace()]).then_func(|req, w| {
        w.headers_mut().insert("x-path", req.path().parse().unwrap());
        w.write_header(StatusCode::CREATED);
        w.write_all(b"made it")?;
        Ok(())
    });

    let server = start(app).await;
    let response = get(server.addr, "/things").await;

    assert_eq!(status_line(&response), "HTTP/1.1 201 Created");
    assert!(response.contains("x-path: /things"));
    assert!(response.contains("made it"));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn recovered_panic_becomes_500() {
    let messages = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&messages);
    let logger: Arc<dyn Logger> = Arc::new(move |msg: &str| sink.lock().unwrap().push(msg.to_owned()));

    let app = Chain::new([middleware::recovery(Some(logger))])
        .then_func(|_req, _w| panic!("errors are values"));

    let server = start(app).await;
    let response = get(server.addr, "/").await;

    assert_eq!(status_line(&response), "HTTP/1.1 500 Internal Server Error");
    assert!(response.contains("Internal Server Error\n"));
    assert!(!response.contains("errors are values"));
    assert_eq!(*messages.lock().unwrap(), ["errors are values"]);

    // The server is still up.
    let again = get(server.addr, "/").await;
    assert_eq!(status_line(&again), "HTTP/1.1 500 Internal Server Error");

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unrecovered_panic_still_answers() {
    let app = Chain::default().then_func(|_req, _w| panic!("nobody catches this"));

    let server = start(app).await;
    let response = get(server.addr, "/").await;

    assert_eq!(status_line(&response), "HTTP/1.1 500 Internal Server Error");

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_handler_is_500() {
    let app = Chain::new([middleware::trace()]).then(None);

    let server = start(app).await;
    let response = get(server.addr, "/").await;

    assert_eq!(status_line(&response), "HTTP/1.1 500 Internal Server Error");

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn panic_after_head_aborts_body() {
    let app = Chain::default().then_func(|_req, w| {
        w.write_header(StatusCode::OK);
        w.write_all(b"partial")?;
        if let Some(flusher) = w.flusher() {
            flusher.flush()?;
        }
        // Let the connection put the head and first chunk on the wire.
        thread::sleep(Duration::from_millis(200));
        panic!("gave up halfway")
    });

    let server = start(app).await;
    let response = get(server.addr, "/").await;

    assert_eq!(status_line(&response), "HTTP/1.1 200 OK");
    assert!(response.contains("partial"));
    // No terminating zero-length chunk: the body is visibly broken.
    assert!(!response.ends_with("0\r\n\r\n"));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn handler_error_drops_stale_content_length() {
    let app = Chain::default().then_func(|_req, w| {
        w.headers_mut().insert("content-length", "100".parse().unwrap());
        Err(Error::handler("failed before writing"))
    });

    let server = start(app).await;
    let response = get(server.addr, "/").await;

    assert_eq!(status_line(&response), "HTTP/1.1 500 Internal Server Error");
    assert!(!response.contains("content-length: 100"));
    assert!(response.contains("Internal Server Error\n"));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn recovered_panic_drops_stale_content_length() {
    let app = Chain::new([middleware::recovery(None)]).then_func(|_req, w| {
        w.headers_mut().insert("content-length", "100".parse().unwrap());
        panic!("failed before writing")
    });

    let server = start(app).await;
    let response = get(server.addr, "/").await;

    assert_eq!(status_line(&response), "HTTP/1.1 500 Internal Server Error");
    assert!(!response.contains("content-length: 100"));
    assert!(response.contains("Internal Server Error\n"));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn handler_error_after_write_keeps_response() {
    let app = Chain::default().then_func(|_req, w| {
        w.write_header(StatusCode::ACCEPTED);
        w.write_all(b"partial")?;
        Err(Error::handler("late failure"))
    });

    let server = start(app).await;
    let response = get(server.addr, "/").await;

    assert_eq!(status_line(&response), "HTTP/1.1 202 Accepted");
    assert!(response.contains("partial"));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn streams_flushed_chunks() {
    let app = Chain::default().then_func(|_req, w| {
        for i in 0..3 {
            w.write_all(format!("event {i}\n").as_bytes())?;
            if let Some(flusher) = w.flusher() {
                flusher.flush()?;
            }
        }
        Ok(())
    });

    let server = start(app).await;
    let response = get(server.addr, "/events").await;

    assert_eq!(status_line(&response), "HTTP/1.1 200 OK");
    for i in 0..3 {
        assert!(response.contains(&format!("event {i}")));
    }

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn json_round_trip_and_client_ip() {
    #[derive(serde::Deserialize, serde::Serialize)]
    struct Echo {
        name: String,
        ip: Option<String>,
    }

    let app = Chain::default().then_func(|req, w| {
        let mut echo: Echo = req.decode_json()?;
        echo.ip = req.client_ip().map(|ip| ip.to_string());
        encode_json(w, &echo)
    });

    let server = start(app).await;
    let body = r#"{"name":"alice","ip":null}"#;
    let response = send(
        server.addr,
        &format!(
            "POST / HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\
             x-forwarded-for: 192.0.2.1, 10.0.0.1\r\n\
             content-length: {}\r\n\r\n{body}",
            body.len(),
        ),
    )
    .await;

    assert_eq!(status_line(&response), "HTTP/1.1 200 OK");
    assert!(response.contains("content-type: application/json"));
    assert!(response.contains(r#"{"name":"alice","ip":"192.0.2.1"}"#));

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn bad_json_is_reported_as_500() {
    let app = Chain::default().then_func(|req, _w| {
        let _: serde_json::Value = req.decode_json()?;
        Ok(())
    });

    let server = start(app).await;
    let response = send(
        server.addr,
        "POST / HTTP/1.1\r\nhost: test\r\nconnection: close\r\ncontent-length: 1\r\n\r\n{",
    )
    .await;

    assert_eq!(status_line(&response), "HTTP/1.1 500 Internal Server Error");

    server.shutdown().await;
}
