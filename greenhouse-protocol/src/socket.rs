//! Line-oriented TCP sockets.

use std::io::{BufRead, BufReader, BufWriter, Read};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::messages::write_line;
use crate::{Message, ProtocolError, MAX_LINE_LEN};

/// A listener that accepts line connections
pub struct LineListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl LineListener {
    /// Bind to an address and start listening
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(addr)?;
        let addr = listener.local_addr()?;
        Ok(LineListener { listener, addr })
    }

    /// Accept a new connection (blocking)
    pub fn accept(&self) -> Result<LineConnection, std::io::Error> {
        let (stream, _) = self.listener.accept()?;
        LineConnection::from_tcp(stream)
    }

    /// Get the address this listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Closes a connection from another thread.
///
/// Shutting the socket down makes a `recv_line` blocked on it return, which is
/// how read loops are stopped.
#[derive(Debug)]
pub struct ConnectionCloser {
    stream: TcpStream,
}

impl ConnectionCloser {
    pub fn close(&self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            if e.kind() != std::io::ErrorKind::NotConnected {
                log::debug!("shutdown failed: {}", e);
            }
        }
    }
}

/// A connection to a remote peer
pub struct LineConnection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    peer: SocketAddr,
}

impl LineConnection {
    fn from_tcp(stream: TcpStream) -> Result<Self, std::io::Error> {
        // Disable Nagle's algorithm, lines are small and latency matters
        let _ = stream.set_nodelay(true);
        let peer = stream.peer_addr()?;
        let reader = BufReader::new(stream.try_clone()?);
        let writer = BufWriter::new(stream);
        Ok(LineConnection {
            reader,
            writer,
            peer,
        })
    }

    /// Connect to an address
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, std::io::Error> {
        Self::from_tcp(TcpStream::connect(addr)?)
    }

    /// Connect with timeout, trying every address the name resolves to
    pub fn connect_timeout(addr: &str, timeout: Duration) -> Result<Self, std::io::Error> {
        let mut last_err = None;
        for socket_addr in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&socket_addr, timeout) {
                Ok(stream) => return Self::from_tcp(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} did not resolve to any address", addr),
            )
        }))
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Set read timeout
    pub fn set_read_timeout(&self, dur: Option<Duration>) -> Result<(), std::io::Error> {
        self.reader.get_ref().set_read_timeout(dur)
    }

    /// Handle that can shut this connection down from another thread
    pub fn closer(&self) -> Result<ConnectionCloser, std::io::Error> {
        Ok(ConnectionCloser {
            stream: self.writer.get_ref().try_clone()?,
        })
    }

    /// Send a message
    pub fn send(&mut self, msg: &Message) -> Result<(), ProtocolError> {
        msg.write_to(&mut self.writer)
    }

    /// Send a raw line (a newline is appended)
    pub fn send_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        write_line(&mut self.writer, line)
    }

    /// Receive a raw line (blocking)
    pub fn recv_line(&mut self) -> Result<String, ProtocolError> {
        read_line(&mut self.reader)
    }

    /// Receive and decode a message (blocking)
    pub fn recv(&mut self) -> Result<Message, ProtocolError> {
        Message::decode(&self.recv_line()?)
    }

    /// Split into separate reader and writer halves
    pub fn split(self) -> (LineReader, LineWriter) {
        (
            LineReader {
                reader: self.reader,
            },
            LineWriter {
                writer: self.writer,
            },
        )
    }
}

/// Reader half of a split connection
pub struct LineReader {
    reader: BufReader<TcpStream>,
}

impl LineReader {
    /// Receive a raw line (blocking)
    pub fn recv_line(&mut self) -> Result<String, ProtocolError> {
        read_line(&mut self.reader)
    }

    /// Receive and decode a message (blocking)
    pub fn recv(&mut self) -> Result<Message, ProtocolError> {
        Message::decode(&self.recv_line()?)
    }

    /// Set read timeout
    pub fn set_read_timeout(&self, dur: Option<Duration>) -> Result<(), std::io::Error> {
        self.reader.get_ref().set_read_timeout(dur)
    }
}

/// Writer half of a split connection
pub struct LineWriter {
    writer: BufWriter<TcpStream>,
}

impl LineWriter {
    /// Send a message
    pub fn send(&mut self, msg: &Message) -> Result<(), ProtocolError> {
        msg.write_to(&mut self.writer)
    }

    /// Send a raw line (a newline is appended)
    pub fn send_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        write_line(&mut self.writer, line)
    }

    /// Set write timeout
    pub fn set_write_timeout(&self, dur: Option<Duration>) -> Result<(), std::io::Error> {
        self.writer.get_ref().set_write_timeout(dur)
    }
}

/// Read one line of at most [`MAX_LINE_LEN`] bytes, without its line terminator.
///
/// An oversized line is consumed up to its newline and reported as
/// [`ProtocolError::LineTooLong`], leaving the reader at the next line.
pub fn read_line<R: BufRead>(reader: &mut R) -> Result<String, ProtocolError> {
    let mut buf = Vec::new();
    let n = reader
        .by_ref()
        .take(MAX_LINE_LEN as u64 + 1)
        .read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > MAX_LINE_LEN {
        discard_line(reader)?;
        return Err(ProtocolError::LineTooLong(MAX_LINE_LEN));
    }

    String::from_utf8(buf)
        .map_err(|_| ProtocolError::InvalidFormat("line is not valid UTF-8".to_string()))
}

fn discard_line<R: BufRead>(reader: &mut R) -> Result<(), std::io::Error> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(());
        }
        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            reader.consume(pos + 1);
            return Ok(());
        }
        let len = buf.len();
        reader.consume(len);
    }
}
