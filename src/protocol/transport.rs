use std::{
    fmt,
    future::Future,
    io::{self, Read, Write},
    net::TcpStream,
    pin::Pin,
    task::{Context, Poll},
};

use log::debug;
use thiserror::Error;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    runtime::{Handle, TryCurrentError},
    task::{JoinError, JoinHandle},
};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("no tokio runtime available: {0}")]
    Runtime(#[from] TryCurrentError),
    #[error("exchange task failed: {0}")]
    Task(#[from] JoinError),
}

/// Server address a request is sent to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Blocking request/answer exchange.
///
/// Every call opens its own connection, writes the whole packet, reads
/// until the server closes its side and releases the connection before
/// returning.
pub trait Transport {
    fn exchange(&mut self, endpoint: &Endpoint, packet: &[u8]) -> Result<Vec<u8>, TransportError>;
}

/// Suspending counterpart of [`Transport`].
pub trait AsyncTransport {
    fn exchange(
        &mut self,
        endpoint: &Endpoint,
        packet: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}

/// [`Transport`] over `std::net`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpTransport;

impl Transport for TcpTransport {
    fn exchange(&mut self, endpoint: &Endpoint, packet: &[u8]) -> Result<Vec<u8>, TransportError> {
        let addr = endpoint.to_string();
        debug!("sending {} bytes to {addr}", packet.len());

        let mut stream = TcpStream::connect(&addr).map_err(|source| TransportError::Connect {
            addr: addr.clone(),
            source,
        })?;
        stream.write_all(packet)?;
        stream.flush()?;

        let mut answer = Vec::new();
        stream.read_to_end(&mut answer)?;
        debug!("received {} bytes from {addr}", answer.len());
        Ok(answer)
    }
}

/// [`AsyncTransport`] running each exchange as a task on a tokio runtime.
///
/// The runtime is given explicitly; dropping the returned future aborts
/// the task, which closes the socket.
#[derive(Debug, Clone)]
pub struct TokioTransport {
    handle: Handle,
}

impl TokioTransport {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Transport bound to the runtime the caller is running on.
    pub fn current() -> Result<Self, TransportError> {
        Ok(Self::new(Handle::try_current()?))
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl AsyncTransport for TokioTransport {
    fn exchange(
        &mut self,
        endpoint: &Endpoint,
        packet: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send {
        let handle = self.handle.clone();
        let addr = endpoint.to_string();
        async move { AbortOnDrop(handle.spawn(exchange_async(addr, packet))).await? }
    }
}

async fn exchange_async(addr: String, packet: Vec<u8>) -> Result<Vec<u8>, TransportError> {
    debug!("sending {} bytes to {addr}", packet.len());

    let mut stream = tokio::net::TcpStream::connect(&addr)
        .await
        .map_err(|source| TransportError::Connect {
            addr: addr.clone(),
            source,
        })?;
    stream.write_all(&packet).await?;
    stream.flush().await?;

    let mut answer = Vec::new();
    stream.read_to_end(&mut answer).await?;
    debug!("received {} bytes from {addr}", answer.len());
    Ok(answer)
}

struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

/// In-memory transport answering from a script, for session tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use super::*;
    use crate::encoding::decode_ansi;

    #[derive(Debug, Default)]
    pub(crate) struct ScriptedTransport {
        pub sent: Vec<Vec<u8>>,
        replies: VecDeque<Vec<u8>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn reply(mut self, answer: Vec<u8>) -> Self {
            self.replies.push_back(answer);
            self
        }

        /// Body lines of the `index`-th packet, length prefix excluded.
        pub(crate) fn sent_lines(&self, index: usize) -> Vec<String> {
            let packet = &self.sent[index];
            let start = packet.iter().position(|&b| b == b'\n').map_or(0, |p| p + 1);
            let mut lines: Vec<String> = packet[start..].split(|&b| b == b'\n').map(decode_ansi).collect();
            lines.pop();
            lines
        }

        /// Command code of every packet sent so far.
        pub(crate) fn commands(&self) -> Vec<String> {
            (0..self.sent.len())
                .map(|i| self.sent_lines(i).into_iter().next().unwrap_or_default())
                .collect()
        }

        fn next_reply(&mut self, packet: Vec<u8>) -> Result<Vec<u8>, TransportError> {
            self.sent.push(packet);
            self.replies.pop_front().ok_or_else(|| {
                TransportError::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "no scripted reply"))
            })
        }
    }

    impl Transport for ScriptedTransport {
        fn exchange(&mut self, _endpoint: &Endpoint, packet: &[u8]) -> Result<Vec<u8>, TransportError> {
            self.next_reply(packet.to_vec())
        }
    }

    impl AsyncTransport for ScriptedTransport {
        fn exchange(
            &mut self,
            _endpoint: &Endpoint,
            packet: Vec<u8>,
        ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send {
            std::future::ready(self.next_reply(packet))
        }
    }

    /// Raw answer bytes: preamble for `command`, then `payload` as is.
    pub(crate) fn answer_bytes(command: &str, payload: &[u8]) -> Vec<u8> {
        let mut data = format!("{command}\r\n123456\r\n1\r\n0\r\n64.2018.1\r\n\r\n\r\n\r\n\r\n\r\n").into_bytes();
        data.extend_from_slice(payload);
        data
    }

    /// Answer whose payload lines are UTF-8 joined with `\r\n`.
    pub(crate) fn answer(command: &str, lines: &[&str]) -> Vec<u8> {
        let mut payload = lines.join("\r\n");
        payload.push_str("\r\n");
        answer_bytes(command, payload.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use std::{net::TcpListener, thread, time::Duration};

    use super::*;

    const PACKET: &[u8] = b"11\nN\nC\nN\n1\n2\n\n";
    const ANSWER: &[u8] = b"N\r\n1\r\n2\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n0\r\n";

    #[test]
    fn tcp_exchange_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = vec![0; PACKET.len()];
            stream.read_exact(&mut request).unwrap();
            stream.write_all(ANSWER).unwrap();
            request
        });

        let answer = TcpTransport
            .exchange(&Endpoint::new("127.0.0.1", port), PACKET)
            .unwrap();

        assert_eq!(answer, ANSWER);
        assert_eq!(server.join().unwrap(), PACKET);
    }

    #[test]
    fn refused_connection_names_the_address() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = TcpTransport
            .exchange(&Endpoint::new("127.0.0.1", port), PACKET)
            .unwrap_err();
        assert!(matches!(err, TransportError::Connect { ref addr, .. } if addr.ends_with(&port.to_string())));
    }

    #[tokio::test]
    async fn tokio_exchange_round_trip() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = vec![0; PACKET.len()];
            stream.read_exact(&mut request).await.unwrap();
            stream.write_all(ANSWER).await.unwrap();
            request
        });

        let mut transport = TokioTransport::current().unwrap();
        let answer = transport
            .exchange(&Endpoint::new("127.0.0.1", port), PACKET.to_vec())
            .await
            .unwrap();

        assert_eq!(answer, ANSWER);
        assert_eq!(server.await.unwrap(), PACKET);
    }

    #[tokio::test]
    async fn dropped_exchange_closes_the_connection() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // reads the request, never answers and reports whether the client hung up
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = vec![0; PACKET.len()];
            stream.read_exact(&mut request).await.unwrap();
            let mut rest = Vec::new();
            stream.read_to_end(&mut rest).await.unwrap();
            rest.is_empty()
        });

        let mut transport = TokioTransport::current().unwrap();
        let endpoint = Endpoint::new("127.0.0.1", port);
        let pending = transport.exchange(&endpoint, PACKET.to_vec());
        assert!(tokio::time::timeout(Duration::from_millis(200), pending).await.is_err());

        let hung_up = tokio::time::timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
        assert!(hung_up);
    }

    #[test]
    fn current_outside_runtime_fails() {
        assert!(matches!(TokioTransport::current(), Err(TransportError::Runtime(_))));
    }

    #[test]
    fn scripted_transport_records_packets() {
        let mut transport = testing::ScriptedTransport::new().reply(testing::answer("N", &["0"]));
        let endpoint = Endpoint::new("localhost", 6666);

        let answer = Transport::exchange(&mut transport, &endpoint, PACKET).unwrap();
        assert!(answer.ends_with(b"0\r\n"));
        assert_eq!(transport.commands(), vec!["N"]);
        assert_eq!(transport.sent_lines(0)[1], "C");
        assert!(Transport::exchange(&mut transport, &endpoint, PACKET).is_err());
    }
}
