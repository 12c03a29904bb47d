//! Live network video stream driver (multipart MJPEG over HTTP).
//!
//! The HTTP body is consumed on a dedicated reader thread which splits it
//! into JPEG images and hands decoded frames to the owner over a bounded
//! channel of two.  [`Camera::capture`] waits at most the configured read
//! timeout, so a stalled stream surfaces as a failed read rather than a
//! blocked pipeline.  The reader itself gives up once the socket has been
//! silent for the stall bound, which closes the connection even when no
//! frame ever arrives after the owner is dropped.

use std::io::Read;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use proxisafe_types::SafetyError;
use reqwest::blocking::{Client, Response};
use tracing::debug;

use crate::camera::{Camera, CameraFrame, decode_image};

/// How long [`MjpegStream::capture`] waits for the next frame.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

const SOURCE_NAME: &str = "stream";
const READ_CHUNK: usize = 16 * 1024;
/// Discard buffered bytes beyond this size when no complete image is found.
const MAX_PENDING_BYTES: usize = 8 * 1024 * 1024;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// An opened MJPEG stream.
pub struct MjpegStream {
    url: String,
    frames: Receiver<Result<CameraFrame, SafetyError>>,
    read_timeout: Duration,
}

impl MjpegStream {
    /// Connect to `url` and start the reader thread.
    ///
    /// The larger of the two timeouts bounds the wait for the response head
    /// and every later socket read.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::Capture`] when the endpoint cannot be reached
    /// within `connect_timeout`, stays silent past the stall bound, or
    /// answers with a non-success status.
    pub fn open(
        url: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, SafetyError> {
        let capture_err = |details: String| SafetyError::Capture {
            source_name: SOURCE_NAME.to_string(),
            details,
        };
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(stall_bound(connect_timeout, read_timeout))
            .build()
            .map_err(|e| SafetyError::Config(format!("stream client: {e}")))?;
        let response = client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| capture_err(format!("GET {url}: {e}")))?;

        let (tx, rx) = bounded(2);
        thread::Builder::new()
            .name("mjpeg-reader".into())
            .spawn(move || read_loop(response, tx))
            .map_err(|e| capture_err(format!("spawning reader: {e}")))?;

        Ok(Self {
            url: url.to_string(),
            frames: rx,
            read_timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Camera for MjpegStream {
    fn id(&self) -> &str {
        SOURCE_NAME
    }

    fn capture(&mut self) -> Result<CameraFrame, SafetyError> {
        match self.frames.recv_timeout(self.read_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(SafetyError::Capture {
                source_name: SOURCE_NAME.to_string(),
                details: format!("no frame within {:?}", self.read_timeout),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(SafetyError::Capture {
                source_name: SOURCE_NAME.to_string(),
                details: "reader stopped".to_string(),
            }),
        }
    }
}

fn stall_bound(connect_timeout: Duration, read_timeout: Duration) -> Duration {
    connect_timeout.max(read_timeout)
}

/// Reader thread body. Exits when the body ends, a read fails or stalls, or
/// the owning [`MjpegStream`] has been dropped.
fn read_loop(mut response: Response, tx: Sender<Result<CameraFrame, SafetyError>>) {
    let mut pending = Vec::with_capacity(READ_CHUNK * 4);
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = match response.read(&mut chunk) {
            Ok(0) => {
                let _ = tx.send(Err(SafetyError::Capture {
                    source_name: SOURCE_NAME.to_string(),
                    details: "stream ended".to_string(),
                }));
                return;
            }
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, "stream reader stopping");
                let _ = tx.send(Err(SafetyError::Capture {
                    source_name: SOURCE_NAME.to_string(),
                    details: format!("read failed: {e}"),
                }));
                return;
            }
        };
        pending.extend_from_slice(&chunk[..n]);

        while let Some(jpeg) = extract_jpeg(&mut pending) {
            let decoded = decode_image(SOURCE_NAME, &jpeg);
            if let Err(e) = &decoded {
                debug!(error = %e, "dropping undecodable stream frame");
            }
            if tx.send(decoded).is_err() {
                return;
            }
        }
        if pending.len() > MAX_PENDING_BYTES {
            pending.clear();
        }
    }
}

/// Pop the first complete JPEG image (SOI…EOI) out of `buf`.
///
/// Bytes before the image (multipart headers, boundaries) are discarded.
/// Returns `None` and leaves any partial image in place when no complete
/// image is buffered yet.
pub(crate) fn extract_jpeg(buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    let start = find(buf, &SOI, 0)?;
    let end = find(buf, &EOI, start + SOI.len())? + EOI.len();
    let image = buf[start..end].to_vec();
    buf.drain(..end);
    Some(image)
}

fn find(haystack: &[u8], needle: &[u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(2)
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::time::Instant;

    /// Loopback endpoint that reads the request, optionally writes `head`,
    /// then goes silent.  The returned thread reports whether the client
    /// closed the connection within `wait`.
    fn silent_server(head: Option<&'static [u8]>, wait: Duration) -> (String, thread::JoinHandle<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/video", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.set_read_timeout(Some(wait)).unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request);
            if let Some(head) = head {
                socket.write_all(head).unwrap();
            }
            closed_by_peer(&mut socket)
        });
        (url, handle)
    }

    fn closed_by_peer(socket: &mut TcpStream) -> bool {
        let mut buf = [0u8; 64];
        loop {
            match socket.read(&mut buf) {
                Ok(0) => return true,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => return true,
                Err(_) => return false,
            }
        }
    }

    #[test]
    fn extracts_image_between_markers() {
        let mut buf = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        buf.extend_from_slice(&[0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9]);
        buf.extend_from_slice(b"\r\n--frame");

        let image = extract_jpeg(&mut buf).unwrap();
        assert_eq!(image, vec![0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9]);
        assert_eq!(buf, b"\r\n--frame".to_vec());
    }

    #[test]
    fn partial_image_is_kept_for_next_read() {
        let mut buf = vec![b'x', 0xFF, 0xD8, 7, 7];
        assert!(extract_jpeg(&mut buf).is_none());
        assert_eq!(buf.len(), 5);

        buf.extend_from_slice(&[0xFF, 0xD9]);
        assert_eq!(extract_jpeg(&mut buf).unwrap(), vec![0xFF, 0xD8, 7, 7, 0xFF, 0xD9]);
        assert!(buf.is_empty());
    }

    #[test]
    fn back_to_back_images_come_out_in_order() {
        let mut buf = vec![0xFF, 0xD8, 1, 0xFF, 0xD9, 0xFF, 0xD8, 2, 0xFF, 0xD9];
        assert_eq!(extract_jpeg(&mut buf).unwrap()[2], 1);
        assert_eq!(extract_jpeg(&mut buf).unwrap()[2], 2);
        assert!(extract_jpeg(&mut buf).is_none());
    }

    #[test]
    fn open_fails_for_unreachable_stream() {
        let result = MjpegStream::open(
            "http://127.0.0.1:9/video",
            Duration::from_millis(500),
            DEFAULT_READ_TIMEOUT,
        );
        assert!(matches!(result, Err(SafetyError::Capture { .. })));
    }

    #[test]
    fn open_gives_up_on_endpoint_that_never_answers() {
        let (url, server) = silent_server(None, Duration::from_secs(5));
        let start = Instant::now();
        let result = MjpegStream::open(&url, Duration::from_millis(300), Duration::from_millis(200));
        assert!(matches!(result, Err(SafetyError::Capture { .. })));
        assert!(start.elapsed() < Duration::from_secs(3));
        assert!(server.join().unwrap(), "connection must be closed");
    }

    #[test]
    fn stalled_stream_fails_reads_and_releases_socket() {
        let head: &'static [u8] = b"HTTP/1.1 200 OK\r\n\
            Content-Type: multipart/x-mixed-replace; boundary=frame\r\n\r\n";
        let (url, server) = silent_server(Some(head), Duration::from_secs(5));
        let mut stream =
            MjpegStream::open(&url, Duration::from_millis(300), Duration::from_millis(200)).unwrap();

        let start = Instant::now();
        assert!(stream.capture().is_err());
        assert!(start.elapsed() < Duration::from_secs(2));
        drop(stream);

        assert!(server.join().unwrap(), "stalled stream must close its socket");
    }
}
