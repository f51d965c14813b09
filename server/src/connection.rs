//! Per-connection plumbing. Each accepted socket is split into a reader
//! task and a writer task: the reader feeds raw bytes through the frame
//! decoder and dispatches every completed request in arrival order, the
//! writer drains the outbound queue tolerating partial writes. Responses
//! for one connection therefore leave in the order their requests came in,
//! while different connections proceed independently.

use crate::dispatcher::{Dispatcher, Services};
use log::{debug, info, warn};
use shared::protocol::{self, Packet};
use shared::TransportError;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

/// FIFO of encoded outbound frames plus a cursor into the head frame.
/// A frame is popped only once every one of its bytes has been written,
/// so a short write simply resumes on the next drain step.
pub struct WriteQueue {
    frames: VecDeque<Vec<u8>>,
    cursor: usize,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
            cursor: 0,
        }
    }

    pub fn push(&mut self, frame: Vec<u8>) {
        self.frames.push_back(frame);
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Unwritten remainder of the head frame, if any.
    pub fn pending(&self) -> Option<&[u8]> {
        self.frames.front().map(|frame| &frame[self.cursor..])
    }

    /// Records `written` more bytes of the head frame as sent.
    pub fn advance(&mut self, written: usize) {
        self.cursor += written;
        if let Some(frame) = self.frames.front() {
            if self.cursor >= frame.len() {
                self.frames.pop_front();
                self.cursor = 0;
            }
        }
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives one accepted connection to completion: spawns the writer,
/// runs the read-dispatch loop inline, and releases the connection's
/// login when the peer goes away, with or without a clean logout.
pub async fn run_connection(
    stream: TcpStream,
    peer: SocketAddr,
    services: Services,
    mut shutdown: watch::Receiver<bool>,
) {
    let (reader, writer) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(async move {
        if let Err(e) = write_loop(writer, outbound_rx).await {
            debug!("writer for {} ended: {}", peer, e);
        }
    });

    let mut dispatcher = Dispatcher::new(services);
    match read_loop(reader, peer, &mut dispatcher, &outbound_tx, &mut shutdown).await {
        Ok(()) => info!("connection from {} closed", peer),
        Err(e) => warn!("connection from {} failed: {}", peer, e),
    }
    dispatcher.handle_disconnect().await;

    // Dropping the sender lets the writer finish flushing queued
    // responses before it exits.
    drop(outbound_tx);
    let _ = writer_task.await;
}

/// Reads until EOF, error or shutdown. Completed frames are decoded and
/// dispatched one at a time; a decodable-but-wrong payload earns the peer
/// an error response, while a desynchronized stream closes the connection.
async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    peer: SocketAddr,
    dispatcher: &mut Dispatcher,
    outbound: &UnboundedSender<Packet>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), TransportError> {
    let mut decoder = protocol::FrameDecoder::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = tokio::select! {
            read = reader.read(&mut buf) => read?,
            _ = shutdown.changed() => return Ok(()),
        };
        if n == 0 {
            return Ok(());
        }

        let frames = match decoder.feed(&buf[..n]) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("closing {} after framing error: {}", peer, e);
                let _ = outbound.send(Packet::ErrorResponse {
                    message: format!("[ERROR] {}", e),
                });
                return Ok(());
            }
        };

        for (tag, payload) in frames {
            let response = match protocol::decode(tag, &payload) {
                Ok(packet) => dispatcher.handle(packet).await,
                Err(e) => {
                    warn!("protocol error from {}: {}", peer, e);
                    Packet::ErrorResponse {
                        message: format!("[ERROR] {}", e),
                    }
                }
            };
            if outbound.send(response).is_err() {
                // Writer is gone; nothing left to respond on.
                return Ok(());
            }
        }
    }
}

/// Encodes queued responses and drains them through the socket, resuming
/// partial writes until each frame is fully out. Ends when the inbound
/// side hangs up and the queue is flushed.
async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut outbound: UnboundedReceiver<Packet>,
) -> Result<(), TransportError> {
    let mut queue = WriteQueue::new();

    loop {
        if queue.is_empty() {
            match outbound.recv().await {
                Some(packet) => enqueue(&mut queue, &packet),
                None => return Ok(()),
            }
        }
        // Pick up everything else already waiting before touching the
        // socket again.
        while let Ok(packet) = outbound.try_recv() {
            enqueue(&mut queue, &packet);
        }

        while !queue.is_empty() {
            let written = match queue.pending() {
                Some(chunk) => writer.write(chunk).await?,
                None => break,
            };
            if written == 0 {
                return Err(TransportError::Io(io::ErrorKind::WriteZero.into()));
            }
            queue.advance(written);
        }
    }
}

fn enqueue(queue: &mut WriteQueue, packet: &Packet) {
    match protocol::encode_frame(packet) {
        Ok(frame) => queue.push(frame),
        Err(e) => warn!("dropping unencodable response: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::Storage;
    use crate::registry::{HotelRegistry, ReviewRegistry, UserRegistry};
    use crate::session::SessionRegistry;
    use shared::model::User;
    use std::sync::Arc;

    #[test]
    fn write_queue_pops_only_complete_frames() {
        let mut queue = WriteQueue::new();
        queue.push(vec![1, 2, 3, 4, 5]);
        queue.push(vec![6, 7]);

        assert_eq!(queue.pending().unwrap(), &[1, 2, 3, 4, 5]);

        // Partial write: the head frame stays, shortened.
        queue.advance(2);
        assert_eq!(queue.pending().unwrap(), &[3, 4, 5]);

        // Finishing the head frame exposes the next one.
        queue.advance(3);
        assert_eq!(queue.pending().unwrap(), &[6, 7]);

        queue.advance(2);
        assert!(queue.is_empty());
        assert!(queue.pending().is_none());
    }

    #[test]
    fn write_queue_resumes_byte_by_byte() {
        let mut queue = WriteQueue::new();
        let frame = vec![9, 8, 7, 6];
        queue.push(frame.clone());

        let mut sent = Vec::new();
        while let Some(chunk) = queue.pending().map(|c| c.to_vec()) {
            sent.push(chunk[0]);
            queue.advance(1);
        }
        assert_eq!(sent, frame);
    }

    fn test_services() -> (Services, tempfile::TempDir) {
        let data_dir = tempfile::tempdir().unwrap();
        let services = Services {
            hotels: Arc::new(HotelRegistry::new(vec![])),
            users: Arc::new(UserRegistry::new(vec![User::new("anna", "secret")])),
            reviews: Arc::new(ReviewRegistry::new(vec![])),
            sessions: Arc::new(SessionRegistry::new()),
            storage: Arc::new(Storage::new(data_dir.path())),
        };
        (services, data_dir)
    }

    /// Feeds a byte stream through the real read loop and collects the
    /// dispatched responses, without a socket.
    async fn drive_read_loop(input: Vec<u8>) -> Vec<Packet> {
        let (services, _dir) = test_services();
        let mut dispatcher = Dispatcher::new(services);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();
        read_loop(
            input.as_slice(),
            peer,
            &mut dispatcher,
            &tx,
            &mut shutdown_rx,
        )
        .await
        .unwrap();

        let mut responses = Vec::new();
        while let Ok(packet) = rx.try_recv() {
            responses.push(packet);
        }
        responses
    }

    #[tokio::test]
    async fn read_loop_answers_every_request_in_order() {
        let mut input = Vec::new();
        input.extend(
            protocol::encode_frame(&Packet::LoginRequest {
                username: "anna".to_string(),
                password: "secret".to_string(),
            })
            .unwrap(),
        );
        input.extend(protocol::encode_frame(&Packet::BadgeRequest).unwrap());
        input.extend(protocol::encode_frame(&Packet::LogoutRequest).unwrap());

        let responses = drive_read_loop(input).await;
        assert_eq!(responses.len(), 3);
        assert!(matches!(responses[0], Packet::LoginResponse { .. }));
        assert!(matches!(responses[1], Packet::BadgeResponse { .. }));
        assert!(matches!(responses[2], Packet::LogoutResponse { .. }));
    }

    #[tokio::test]
    async fn undecodable_frame_earns_an_error_response() {
        // A syntactically valid frame whose payload is garbage.
        let mut input = Vec::new();
        input.extend_from_slice(&3u32.to_be_bytes());
        input.extend_from_slice(&0u32.to_be_bytes());
        input.extend_from_slice(&[0xFF, 0xFF, 0xFF]);
        // The connection survives and still answers the next request.
        input.extend(protocol::encode_frame(&Packet::LogoutRequest).unwrap());

        let responses = drive_read_loop(input).await;
        assert_eq!(responses.len(), 2);
        assert!(matches!(responses[0], Packet::ErrorResponse { .. }));
        // Not logged in, but the point is the request was processed.
        assert!(matches!(responses[1], Packet::ErrorResponse { .. }));
    }

    #[tokio::test]
    async fn write_loop_emits_whole_frames() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Packet::LogoutRequest).unwrap();
        tx.send(Packet::BadgeRequest).unwrap();
        drop(tx);

        let mut sink = Vec::new();
        write_loop(&mut sink, rx).await.unwrap();

        let mut decoder = protocol::FrameDecoder::new();
        let frames = decoder.feed(&sink).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0, Packet::LogoutRequest.tag());
        assert_eq!(frames[1].0, Packet::BadgeRequest.tag());
    }
}
