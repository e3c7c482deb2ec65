use anyhow::Context;
use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tiny_http::{Header, Request, Response, Server};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use docrag_core::config::Config;
use docrag_pipeline::Rag;
use docrag_server::{handle, ApiResponse};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let settings = config.into_settings();

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let rag = Arc::new(runtime.block_on(Rag::from_settings(&settings))?);

    let server = Arc::new(Server::http(&settings.server.bind).map_err(|e| anyhow::anyhow!("bind {}: {e}", settings.server.bind))?);
    info!(bind = %settings.server.bind, workers = settings.server.workers, backend = rag.store_backend(), "docrag server listening");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let server = server.clone();
        let shutdown = shutdown.clone();
        let workers = settings.server.workers;
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
                shutdown.store(true, Ordering::SeqCst);
                for _ in 0..workers {
                    server.unblock();
                }
            }
        });
    }

    let max_body = settings.server.max_body_bytes;
    let mut handles = Vec::with_capacity(settings.server.workers);
    for n in 0..settings.server.workers {
        let server = server.clone();
        let shutdown = shutdown.clone();
        let rag = rag.clone();
        let rt = runtime.handle().clone();
        let handle = thread::Builder::new()
            .name(format!("docrag-worker-{n}"))
            .spawn(move || {
                while !shutdown.load(Ordering::SeqCst) {
                    match server.recv() {
                        Ok(request) => serve(&rt, &rag, request, max_body),
                        Err(e) if shutdown.load(Ordering::SeqCst) => {
                            info!(error = %e, "worker stopping");
                        }
                        Err(e) => warn!(error = %e, "failed to receive request"),
                    }
                }
            })
            .context("spawn worker thread")?;
        handles.push(handle);
    }

    for h in handles {
        if h.join().is_err() {
            error!("worker thread panicked");
        }
    }
    info!("docrag server stopped");
    Ok(())
}

fn serve(rt: &tokio::runtime::Handle, rag: &Rag, mut request: Request, max_body: usize) {
    let started = Instant::now();
    let method = request.method().to_string();
    let url = request.url().to_string();

    let response = match read_body(&mut request, max_body) {
        Ok(Some(body)) => catch_unwind(AssertUnwindSafe(|| rt.block_on(handle(rag, &method, &url, &body)))).unwrap_or_else(|_| {
            error!(%method, %url, "request handler panicked");
            ApiResponse::error_body(500, "internal_error", "request handler panicked")
        }),
        Ok(None) => ApiResponse::payload_too_large(max_body),
        Err(e) => ApiResponse::error_body(400, "validation_error", &format!("failed to read body: {e}")),
    };

    let status = response.status;
    let mut out = Response::from_data(response.body.unwrap_or_default()).with_status_code(status);
    if status != 204 {
        if let Ok(h) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
            out = out.with_header(h);
        }
    }
    if let Err(e) = request.respond(out) {
        warn!(error = %e, "failed to write response");
    }
    info!(%method, %url, status, elapsed_ms = started.elapsed().as_millis() as u64, "request");
}

/// `Ok(None)` when the body exceeds `limit`.
fn read_body(request: &mut Request, limit: usize) -> std::io::Result<Option<Vec<u8>>> {
    if request.body_length().is_some_and(|len| len > limit) {
        return Ok(None);
    }
    let mut body = Vec::new();
    request.as_reader().take(limit as u64 + 1).read_to_end(&mut body)?;
    Ok((body.len() <= limit).then_some(body))
}
