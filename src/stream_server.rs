use log::{debug, error, info, log_enabled, trace, warn, Level};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{ErrorKind, Read};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::config::{PushMode, ServerConfig, StreamTarget};
use crate::error::{Error, Result};
use crate::grid::PixelGrid;
use crate::pixel::PixelRecord;
use crate::status::{StatusReporter, StatusSink};
use crate::transport::LedTransport;

/// Pending connections beyond the active one
const LISTEN_BACKLOG: i32 = 1;

/// How often a non-blocking accept re-checks the running flag
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Read timeout on client sockets, so shutdown and idle limits are noticed
const READ_POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Why a client session ended
#[derive(Debug)]
pub enum SessionEnd {
    /// Peer closed the connection (zero-length read)
    Closed,
    /// Nothing received within the configured idle timeout
    IdleTimeout,
    /// Server is shutting down
    Shutdown,
    /// Socket failure mid-session
    Error(std::io::Error),
}

/// Accounting for one accepted client
#[derive(Debug, Clone)]
pub struct StreamSession {
    bytes_forwarded: u64,
    chunk_count: u64,
    frames_completed: u64,
    reports: u32,
    last_throughput: Option<f64>,
    window_start: Instant,
    window_chunks: u32,
    last_activity: Instant,
    /// Next write position within the grid's frame buffer
    cursor: usize,
}

impl StreamSession {
    fn new(now: Instant) -> Self {
        StreamSession {
            bytes_forwarded: 0,
            chunk_count: 0,
            frames_completed: 0,
            reports: 0,
            last_throughput: None,
            window_start: now,
            window_chunks: 0,
            last_activity: now,
            cursor: 0,
        }
    }

    pub fn bytes_forwarded(&self) -> u64 {
        self.bytes_forwarded
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    /// Number of times the write cursor wrapped at the end of the frame buffer
    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }

    /// Number of throughput figures reported so far
    pub fn reports(&self) -> u32 {
        self.reports
    }

    /// Most recent throughput figure, in chunks per second
    pub fn last_throughput(&self) -> Option<f64> {
        self.last_throughput
    }

    /// Count a forwarded chunk. Returns chunks/sec when a window of `report_every` closes.
    fn record_chunk(&mut self, len: usize, now: Instant, report_every: u32) -> Option<f64> {
        self.bytes_forwarded += len as u64;
        self.chunk_count += 1;
        self.window_chunks += 1;
        self.last_activity = now;

        if self.window_chunks < report_every {
            return None;
        }

        let elapsed = now.duration_since(self.window_start).as_secs_f64().max(1e-3);
        let rate = f64::from(self.window_chunks) / elapsed;

        self.window_start = now;
        self.window_chunks = 0;
        self.reports += 1;
        self.last_throughput = Some(rate);

        Some(rate)
    }
}

/// Serves one streaming client at a time, forwarding its bytes to the LED chain
pub struct StreamServer<T: LedTransport, S: StatusSink, C: Clock> {
    settings: ServerConfig,
    address: Ipv4Addr,
    grid: PixelGrid,
    transport: T,
    status: StatusReporter<S>,
    clock: C,
    running: Arc<AtomicBool>,
}

impl<T: LedTransport, S: StatusSink, C: Clock> StreamServer<T, S, C> {
    /// `address` is the resolved network address, used for status display only
    pub fn new(
        settings: ServerConfig,
        address: Ipv4Addr,
        grid: PixelGrid,
        transport: T,
        status: StatusReporter<S>,
        clock: C,
    ) -> Self {
        StreamServer {
            settings,
            address,
            grid,
            transport,
            status,
            clock,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get a clone of the running flag for signal handlers
    pub fn get_running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    /// Bind the listening socket on the wildcard address
    pub fn bind(&self) -> Result<TcpListener> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.settings.port));
        let bind_error = |source| Error::ListenerBind { addr, source };

        let socket =
            Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).map_err(bind_error)?;
        socket.set_reuse_address(true).map_err(bind_error)?;
        socket.bind(&addr.into()).map_err(bind_error)?;
        socket.listen(LISTEN_BACKLOG).map_err(bind_error)?;

        Ok(socket.into())
    }

    /// Bind and serve until the running flag is cleared
    pub fn run(&mut self) -> Result<()> {
        let listener = self.bind()?;
        self.serve(listener)
    }

    /// Accept and stream clients one at a time.
    ///
    /// The listener is owned here and closed when this returns, on every path.
    pub fn serve(&mut self, listener: TcpListener) -> Result<()> {
        // Nonblocking so accept() can check the running flag periodically
        listener.set_nonblocking(true)?;

        info!(
            "Listening on {} (reachable at {}:{})",
            listener.local_addr()?,
            self.address,
            self.settings.port
        );

        while self.running.load(Ordering::Relaxed) {
            self.status.ready(self.address, self.settings.port);
            info!("Ready to accept connection on port {}", self.settings.port);

            let Some((stream, peer)) = self.accept(&listener) else {
                break;
            };
            self.handle_client(stream, peer);
        }

        info!("Stream server stopped");
        Ok(())
    }

    /// Blank the chain
    pub fn shutdown(&mut self) {
        info!("Turning off LEDs...");
        self.grid.fill(PixelRecord::OFF);
        self.push_frame();
    }

    fn accept(&self, listener: &TcpListener) -> Option<(TcpStream, SocketAddr)> {
        while self.running.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok(accepted) => return Some(accepted),
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                    self.clock.sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    self.clock.sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }
        None
    }

    fn handle_client(&mut self, mut stream: TcpStream, peer: SocketAddr) {
        info!("Client connected from {}", peer);
        self.status.connected(peer.ip());

        if let Err(e) = stream.set_nonblocking(false) {
            warn!("Failed to make client socket blocking: {}", e);
        }
        if let Err(e) = stream.set_read_timeout(Some(READ_POLL_TIMEOUT)) {
            warn!("Failed to set read timeout: {}", e);
        }

        let (session, end) = self.serve_session(&mut stream);

        match end {
            SessionEnd::Closed => info!("Client {} disconnected", peer),
            SessionEnd::IdleTimeout => warn!("Client {} idle too long, dropping", peer),
            SessionEnd::Shutdown => info!("Closing client {} for shutdown", peer),
            SessionEnd::Error(e) => error!("Error handling client {}: {}", peer, e),
        }
        debug!(
            "Session {}: {} bytes in {} chunks, {} frames",
            peer,
            session.bytes_forwarded(),
            session.chunk_count(),
            session.frames_completed()
        );

        let _ = stream.shutdown(Shutdown::Both);
    }

    /// Forward everything `reader` produces until it closes, fails, idles out or we stop
    pub fn serve_session<R: Read>(&mut self, reader: &mut R) -> (StreamSession, SessionEnd) {
        let mut session = StreamSession::new(self.clock.now());
        let mut chunk = vec![0u8; self.settings.chunk_size];
        let idle_timeout = self.settings.idle_timeout();

        let end = loop {
            if !self.running.load(Ordering::Relaxed) {
                break SessionEnd::Shutdown;
            }

            match reader.read(&mut chunk) {
                Ok(0) => break SessionEnd::Closed,
                Ok(n) => {
                    let data = &chunk[..n];
                    if log_enabled!(Level::Trace) {
                        let hex: String = data
                            .iter()
                            .take(30)
                            .map(|b| format!("{:02x}", b))
                            .collect::<Vec<_>>()
                            .join(" ");
                        trace!("Received {} bytes, first 30: {}", n, hex);
                    }

                    self.forward(&mut session, data);

                    let now = self.clock.now();
                    if let Some(rate) = session.record_chunk(n, now, self.settings.report_every) {
                        debug!("Throughput: {:.1} chunks/sec", rate);
                        self.status.throughput(rate);
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                    if let Some(limit) = idle_timeout {
                        if self.clock.now().duration_since(session.last_activity) >= limit {
                            break SessionEnd::IdleTimeout;
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => break SessionEnd::Error(e),
            }
        };

        (session, end)
    }

    fn forward(&mut self, session: &mut StreamSession, data: &[u8]) {
        if self.settings.target == StreamTarget::Display {
            self.status.bitmap(data);
            return;
        }

        if self.settings.push == PushMode::Passthrough {
            if let Err(e) = self.transport.write(data) {
                warn!("LED transport write failed: {}", e);
            }
        }

        // Chunks are laid end to end over the frame buffer; crossing its end
        // completes a frame and the rest of the chunk starts the next one.
        let mut remaining = data;
        while !remaining.is_empty() {
            let written = self.grid.write_raw_at(session.cursor, remaining);
            session.cursor += written;
            remaining = &remaining[written..];

            if session.cursor >= self.grid.frame_len() {
                session.cursor = 0;
                session.frames_completed += 1;
                if self.settings.push == PushMode::Frame {
                    self.push_frame();
                }
            }
        }
    }

    fn push_frame(&mut self) {
        let frame = self.grid.encoded_frame();
        if let Err(e) = self.transport.show(&frame) {
            warn!("LED transport show failed: {}", e);
        }
    }
}
