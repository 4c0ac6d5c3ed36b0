//! Raw byte observation.
//!
//! An optional [`PacketObserver`] sees every byte read from and written to
//! the transport. It is a passive tee: it cannot alter or delay traffic.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Sink for raw transport bytes.
///
/// Both callbacks default to no-ops. They run inline on the I/O path and
/// must not block.
pub trait PacketObserver: Send + Sync {
    /// Bytes received from the peer.
    fn on_read(&self, bytes: &[u8]) {
        let _ = bytes;
    }

    /// Bytes written to the peer.
    fn on_write(&self, bytes: &[u8]) {
        let _ = bytes;
    }
}

pin_project! {
    /// Transport wrapper that reports traffic to an optional observer.
    pub struct ObservedIo<T> {
        #[pin]
        inner: T,
        observer: Option<Arc<dyn PacketObserver>>,
    }
}

impl<T> ObservedIo<T> {
    /// Wrap a transport without an observer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            observer: None,
        }
    }

    /// Wrap a transport, reporting traffic to `observer`.
    pub fn with_observer(inner: T, observer: Arc<dyn PacketObserver>) -> Self {
        Self {
            inner,
            observer: Some(observer),
        }
    }

    /// Get a reference to the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the wrapper and return the underlying transport.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservedIo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedIo")
            .field("inner", &self.inner)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl<T: AsyncRead> AsyncRead for ObservedIo<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        let before = buf.filled().len();
        ready!(this.inner.poll_read(cx, buf))?;

        if let Some(observer) = this.observer {
            let read = &buf.filled()[before..];
            if !read.is_empty() {
                observer.on_read(read);
            }
        }
        Poll::Ready(Ok(()))
    }
}

impl<T: AsyncWrite> AsyncWrite for ObservedIo<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.project();
        let written = ready!(this.inner.poll_write(cx, buf))?;

        if let Some(observer) = this.observer {
            if written > 0 {
                observer.on_write(&buf[..written]);
            }
        }
        Poll::Ready(Ok(written))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[derive(Default)]
    struct Capture {
        read: Mutex<Vec<u8>>,
        written: Mutex<Vec<u8>>,
    }

    impl PacketObserver for Capture {
        fn on_read(&self, bytes: &[u8]) {
            self.read.lock().unwrap().extend_from_slice(bytes);
        }

        fn on_write(&self, bytes: &[u8]) {
            self.written.lock().unwrap().extend_from_slice(bytes);
        }
    }

    #[tokio::test]
    async fn test_observer_sees_traffic() {
        let capture = Arc::new(Capture::default());
        let mock = tokio_test::io::Builder::new()
            .read(b"\x01\x00\x00\x00\x0a")
            .write(b"\x00\x00\x00\x01")
            .build();
        let mut io = ObservedIo::with_observer(mock, capture.clone());

        let mut buf = [0u8; 5];
        io.read_exact(&mut buf).await.unwrap();
        io.write_all(b"\x00\x00\x00\x01").await.unwrap();

        assert_eq!(&capture.read.lock().unwrap()[..], b"\x01\x00\x00\x00\x0a");
        assert_eq!(&capture.written.lock().unwrap()[..], b"\x00\x00\x00\x01");
    }

    #[tokio::test]
    async fn test_unobserved_passthrough() {
        let mut io = ObservedIo::new(&b"abc"[..]);
        let mut out = String::new();
        io.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "abc");
    }
}
