//! Device Emulator Server
//!
//! Accepts connections and serves each on its own thread against one
//! shared `JbodDevice`.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::config::Config;
use crate::device::{DiskImage, JbodDevice};
use crate::error::{JbodError, Result};
use super::Session;

/// TCP server exposing an emulated device
pub struct DeviceServer {
    listener: TcpListener,
    device: Arc<Mutex<JbodDevice>>,
    image_path: Option<PathBuf>,
    shutdown: Arc<AtomicBool>,
}

impl DeviceServer {
    /// Bind to `config.listen_addr`
    ///
    /// If `config.image_path` names an existing file, the device starts
    /// from that image.
    pub fn bind(config: &Config) -> Result<Self> {
        let mut device = JbodDevice::new();
        if let Some(path) = &config.image_path {
            if path.exists() {
                device.load_image(&DiskImage::load(path)?)?;
                tracing::info!("Restored disks from {}", path.display());
            }
        }
        Self::with_device(config, device)
    }

    /// Bind with a caller-supplied device
    pub fn with_device(config: &Config, device: JbodDevice) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        tracing::info!("Device emulator listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            device: Arc::new(Mutex::new(device)),
            image_path: config.image_path.clone(),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared handle to the emulated device
    pub fn device(&self) -> Arc<Mutex<JbodDevice>> {
        Arc::clone(&self.device)
    }

    /// Accept connections until shutdown is signalled (blocking)
    pub fn run(&self) -> Result<()> {
        for stream in self.listener.incoming() {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    continue;
                }
            };

            let device = Arc::clone(&self.device);
            let image_path = self.image_path.clone();
            thread::spawn(move || match Session::new(stream, device, image_path) {
                Ok(mut session) => {
                    if let Err(e) = session.handle() {
                        tracing::warn!("Session {} ended with error: {}", session.peer_addr(), e);
                    }
                }
                Err(e) => tracing::warn!("Failed to set up session: {}", e),
            });
        }

        tracing::info!("Device emulator stopped");
        Ok(())
    }

    /// Run the accept loop on a background thread
    pub fn spawn(self) -> Result<ServerHandle> {
        let addr = self.local_addr()?;
        let device = self.device();
        let shutdown = Arc::clone(&self.shutdown);
        let thread = thread::Builder::new()
            .name("jbod-emulator".to_string())
            .spawn(move || self.run())?;

        Ok(ServerHandle {
            addr,
            device,
            shutdown,
            thread: Some(thread),
        })
    }
}

/// Handle to a server running on a background thread
pub struct ServerHandle {
    addr: SocketAddr,
    device: Arc<Mutex<JbodDevice>>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<()>>>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn device(&self) -> Arc<Mutex<JbodDevice>> {
        Arc::clone(&self.device)
    }

    /// Signal the server to stop and wait for the accept loop to exit
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        self.shutdown.store(true, Ordering::Release);
        // Wake the blocking accept
        let _ = TcpStream::connect(self.addr);

        thread
            .join()
            .map_err(|_| JbodError::Protocol("emulator thread panicked".to_string()))?
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!("Emulator shutdown failed: {}", e);
        }
    }
}
