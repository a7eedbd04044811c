//! ScreenWire: UDP receiver for streamed screen frames
//!
//! Windows/desktop-side receiver for a phone or tablet streaming its screen
//! as length-prefixed frames over UDP.
//!
//! Usage: screenwire [OPTIONS]
//!   --port <PORT>    UDP port to listen on (default: 5120)
//!   --raw            Expect raw BGRA pixels instead of encoded images
//!   --dump-dir <DIR> Write every received frame into this directory
//!   --debug          Enable debug logging

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Instant;

use clap::Parser;
use log::{debug, error, info};

use screenwire::payload::{DecodedPayload, PayloadConvention};
use screenwire::pixel::{PixelFormat, PixelGeometry, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use screenwire::server::{start_server, ServerConfig, ServerEvent, DEFAULT_PORT};

/// ScreenWire: UDP receiver for streamed screen frames
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// UDP port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Treat payloads as raw BGRA pixels instead of encoded images
    #[arg(short, long)]
    raw: bool,

    /// Frame width for the raw pixel convention
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: u32,

    /// Frame height for the raw pixel convention
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    height: u32,

    /// Write every received frame into this directory
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Consumer-side state, owned by the main thread
struct App {
    client_count: u32,
    frames_received: u64,
    dump_dir: Option<PathBuf>,
    start_time: Instant,
}

impl App {
    fn new(dump_dir: Option<PathBuf>) -> Self {
        Self {
            client_count: 0,
            frames_received: 0,
            dump_dir,
            start_time: Instant::now(),
        }
    }

    fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::ClientConnected { id, peer } => {
                self.client_count += 1;
                info!(
                    "🔗 Client {} connected from {} ({} active)",
                    id, peer, self.client_count
                );
            }
            ServerEvent::ClientDisconnected { id } => {
                self.client_count = self.client_count.saturating_sub(1);
                info!("🔌 Client {} disconnected ({} active)", id, self.client_count);
            }
            ServerEvent::Frame { id, payload } => {
                self.frames_received += 1;
                match &payload {
                    DecodedPayload::Image(image) => {
                        debug!(
                            "🎨 Frame {} from client {}: {:?}, {} bytes",
                            self.frames_received,
                            id,
                            image.format,
                            image.data.len()
                        );
                    }
                    DecodedPayload::Pixels(pixels) => {
                        debug!(
                            "🎨 Frame {} from client {}: {}x{} raw, {} bytes",
                            self.frames_received,
                            id,
                            pixels.width(),
                            pixels.height(),
                            pixels.as_bytes().len()
                        );
                    }
                }
                self.dump(&payload);

                if self.frames_received % 100 == 0 {
                    let elapsed = self.start_time.elapsed().as_secs_f32();
                    if elapsed > 0.0 {
                        info!(
                            "📈 {} frames received ({:.1} fps average)",
                            self.frames_received,
                            self.frames_received as f32 / elapsed
                        );
                    }
                }
            }
        }
    }

    fn dump(&self, payload: &DecodedPayload) {
        if let Some(dir) = &self.dump_dir {
            let (ext, data): (&str, &[u8]) = match payload {
                DecodedPayload::Image(image) => (image.format.extension(), &image.data),
                DecodedPayload::Pixels(pixels) => ("raw", pixels.as_bytes()),
            };
            let path = dir.join(format!("frame-{:06}.{}", self.frames_received, ext));
            if let Err(e) = fs::write(&path, data) {
                error!("❌ Failed to write {}: {}", path.display(), e);
            }
        }
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    if args.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    println!();
    println!("  ╔═══════════════════════════════════════════════════╗");
    println!("  ║       📺 ScreenWire: UDP Frame Receiver           ║");
    println!("  ║       Reassembles length-prefixed screen frames   ║");
    println!("  ╚═══════════════════════════════════════════════════╝");
    println!();

    info!("🚀 Starting ScreenWire receiver");
    info!("📡 UDP listening on 0.0.0.0:{}", args.port);

    let convention = if args.raw {
        info!(
            "🖼️ Raw pixel mode: {}x{} BGRA ({} bytes per frame)",
            args.width,
            args.height,
            PixelGeometry::new(args.width, args.height, PixelFormat::Bgra8888).byte_len()
        );
        PayloadConvention::RawPixels(PixelGeometry::new(
            args.width,
            args.height,
            PixelFormat::Bgra8888,
        ))
    } else {
        info!("🖼️ Encoded image mode (JPEG, PNG, ...)");
        PayloadConvention::EncodedImage
    };

    if let Some(dir) = &args.dump_dir {
        fs::create_dir_all(dir)?;
        info!("💾 Dumping frames to {}", dir.display());
    }

    let config = ServerConfig {
        bind_addr: SocketAddr::from(([0, 0, 0, 0], args.port)),
        convention,
        ..ServerConfig::default()
    };

    // Bind on the main thread so a failed bind exits instead of logging
    // from a background thread nobody joins
    let rt = tokio::runtime::Runtime::new()?;
    let mut handle = match rt.block_on(start_server(config)) {
        Ok(handle) => handle,
        Err(e) => {
            error!("❌ Failed to start listener: {}", e);
            return Err(e.into());
        }
    };
    info!("✅ UDP listener started");

    // Forward events from the runtime to the main thread
    let (tx, rx) = std_mpsc::channel();
    thread::spawn(move || {
        rt.block_on(async move {
            while let Some(event) = handle.events.recv().await {
                if tx.send(event).is_err() {
                    break;
                }
            }
        });
    });

    let mut app = App::new(args.dump_dir);
    while let Ok(event) = rx.recv() {
        app.handle_event(event);
    }

    info!("👋 Listener stopped");
    Ok(())
}
