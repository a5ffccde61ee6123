//! Minimal hitch example: a middleware chain in front of a few endpoints.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/ip -H 'x-forwarded-for: 203.0.113.9'
//!   curl -X POST http://localhost:3000/echo \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -N http://localhost:3000/ticks
//!   curl -i http://localhost:3000/panic

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hitch::{
    Chain, Error, Flusher, Handler, Request, ResponseWriter, Server, TracingLogger, encode_json,
    handler_fn, http_error, middleware, middleware_fn, status_text,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Deserialize)]
struct Greeting {
    name: String,
}

#[derive(Serialize)]
struct Reply<'a> {
    hello: &'a str,
    secure: bool,
    xhr: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Adds a header to every response; runs inside recovery and trace.
    let powered_by = middleware_fn(|next| {
        handler_fn(move |req, w| {
            w.headers_mut().insert("x-powered-by", http::HeaderValue::from_static("hitch"));
            next.serve(req, w)
        })
    });

    let app = Chain::new([
        middleware::recovery(Some(Arc::new(TracingLogger))),
        middleware::trace(),
        powered_by,
    ])
    .then_func(route);

    Server::bind("0.0.0.0:3000").serve(app).await
}

fn route(req: &Request, w: &mut dyn ResponseWriter) -> Result<(), Error> {
    match req.path() {
        "/ip" => encode_json(w, &req.client_ip().map(|ip| ip.to_string())),
        "/echo" => {
            let greeting: Greeting = req.decode_json()?;
            encode_json(
                w,
                &Reply {
                    hello: &greeting.name,
                    secure: req.is_secure(),
                    xhr: req.is_xml_http_request(),
                },
            )
        }
        "/ticks" => ticks(w),
        "/panic" => panic!("the demo asked for it"),
        _ => {
            http_error(w, status_text(StatusCode::NOT_FOUND), StatusCode::NOT_FOUND)?;
            Ok(())
        }
    }
}

// Streams one line per tick; each flush reaches the client right away.
fn ticks(w: &mut dyn ResponseWriter) -> Result<(), Error> {
    w.headers_mut().insert("content-type", http::HeaderValue::from_static("text/plain"));
    w.write_header(StatusCode::OK);

    for i in 1..=5 {
        w.write_all(format!("tick {i}\n").as_bytes())?;
        if let Some(flusher) = w.flusher() {
            flusher.flush()?;
        }
        thread::sleep(Duration::from_millis(500));
    }
    Ok(())
}
