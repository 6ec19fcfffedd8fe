//! HTTP engine: a worker-pool TCP server, no async runtime (§10.6). An
//! acceptor thread hands sockets to a bounded pool of worker threads through
//! a mutex+condvar queue; each worker parses and serves requests on one
//! connection until it closes or a non-keep-alive response is sent.

mod handlers;
mod request;
mod response;
mod router;

use std::collections::VecDeque;
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use tracing::{error, info, warn};

use crate::cache::TranscodeCache;
use crate::config::Paths;

use request::{read_request, ReadError};
use response::ResponseWriter;

pub struct AppState {
    pub db_path: PathBuf,
    pub paths: Arc<Paths>,
    pub cache: TranscodeCache,
    /// unix timestamp of the most recent completed scan; drives conditional GET.
    pub latest_mod_time: Mutex<i64>,
}

impl AppState {
    pub fn new(paths: Arc<Paths>, max_cache: usize, initial_mod_time: i64) -> Self {
        Self {
            db_path: paths.db_path(),
            paths,
            cache: TranscodeCache::new(max_cache),
            latest_mod_time: Mutex::new(initial_mod_time),
        }
    }

    pub fn note_scan_completed(&self, at: i64) {
        *self.latest_mod_time.lock() = at;
    }
}

/// FIFO mutex+condvar queue (§5 "Queue discipline"): the acceptor enqueues at
/// the back, workers dequeue from the front, so connections are served in
/// arrival order instead of a LIFO stack starving the oldest socket.
struct Queue {
    sockets: Mutex<VecDeque<TcpStream>>,
    ready: Condvar,
}

/// Run the server on `port` until the process is killed. Blocking: intended
/// to be called from `main` directly, no async runtime involved.
pub fn run(port: u16, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    info!(port, "listening");

    let queue = Arc::new(Queue {
        sockets: Mutex::new(VecDeque::new()),
        ready: Condvar::new(),
    });

    let worker_count = worker_count();
    info!(worker_count, "spawning worker pool");
    for id in 0..worker_count {
        let queue = queue.clone();
        let state = state.clone();
        thread::Builder::new()
            .name(format!("surf-worker-{id}"))
            .spawn(move || worker_loop(queue, state))
            .expect("spawning worker thread");
    }

    for stream in listener.incoming() {
        match stream {
            Ok(socket) => {
                let mut sockets = queue.sockets.lock();
                sockets.push_back(socket);
                queue.ready.notify_one();
            }
            Err(err) => warn!(error = %err, "accept failed"),
        }
    }

    Ok(())
}

/// `floor(hardware_concurrency * 8 / 5)`, the pool sizing rule the original
/// uses to keep threads blocked-on-disk-IO from starving the CPU.
fn worker_count() -> usize {
    (num_cpus::get() * 8 / 5).max(1)
}

fn worker_loop(queue: Arc<Queue>, state: Arc<AppState>) {
    loop {
        let socket = {
            let mut sockets = queue.sockets.lock();
            loop {
                if let Some(socket) = sockets.pop_front() {
                    break socket;
                }
                queue.ready.wait(&mut sockets);
            }
        };
        serve_connection(socket, &state);
    }
}

fn serve_connection(mut stream: TcpStream, state: &Arc<AppState>) {
    let keep_going = AtomicBool::new(true);
    while keep_going.load(Ordering::Relaxed) {
        let request = match read_request(&mut stream) {
            Ok(req) => req,
            Err(ReadError::ConnectionClosed) => return,
            Err(ReadError::TooLarge) => {
                let mut writer = ResponseWriter::new(&mut stream);
                let _ = writer.send_empty(400);
                return;
            }
            Err(ReadError::Malformed) | Err(ReadError::Io(_)) => return,
        };

        let should_close = request
            .header("connection")
            .map(|v| v.eq_ignore_ascii_case("close"))
            .unwrap_or(false);

        match router::dispatch(&request, state, &mut stream) {
            Ok(true) => {}
            // The stream handler handed the socket off to a detached
            // transcode thread (§4.5) — stop touching it from here. Dropping
            // our end is safe: the detached thread holds an independent
            // duplicated file descriptor over the same connection.
            Ok(false) => return,
            Err(err) => {
                error!(error = %err, "error serving request");
                let mut writer = ResponseWriter::new(&mut stream);
                let _ = writer.send_empty(500);
            }
        }

        if should_close {
            keep_going.store(false, Ordering::Relaxed);
        }
    }
}
