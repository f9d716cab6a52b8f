use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// In-memory stand-in for the serial port.
///
/// Replays a canned byte sequence and then either reports end-of-stream
/// (link closed) or stays silent forever, which lets timeout handling be
/// exercised without hardware. Written command bytes are discarded.
pub(crate) struct FakeBuffer {
    data: Vec<u8>,
    pos: usize,
    silent: bool,
}

impl FakeBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            silent: false,
        }
    }

    pub fn silent(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            silent: true,
        }
    }
}

impl AsyncRead for FakeBuffer {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.pos < this.data.len() {
            let n = std::cmp::min(buf.remaining(), this.data.len() - this.pos);
            buf.put_slice(&this.data[this.pos..this.pos + n]);
            this.pos += n;
            Poll::Ready(Ok(()))
        } else if this.silent {
            // No waker registered on purpose; the caller's timeout fires
            // first.
            Poll::Pending
        } else {
            Poll::Ready(Ok(()))
        }
    }
}

impl AsyncWrite for FakeBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
