use bytes::{Buf, BytesMut};
use std::{
    fmt::Write,
    io::{self},
};
use tokio_util::codec::{Decoder, Encoder};

use super::command::Command;

/// Framing for the balance's read-out protocol.
///
/// The balance transmits one reading per line, terminated by CR (data
/// transfer mode `rE CR`). Other firmware revisions append LF, so both
/// bytes end a frame and zero-length frames between them are swallowed.
#[derive(Default)]
pub struct LineCodec;

impl Decoder for LineCodec {
    type Item = String;
    // We use io::Error here beacause for the low level framing, garbage
    // bytes inside a frame are totally fine, the decoding is successful.
    // Deciding if the frame is an interpretable reading is up to a
    // higher level.
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(pos) = src.iter().position(|b| *b == b'\r' || *b == b'\n') {
            let frame = src.split_to(pos);
            src.advance(1);
            if frame.is_empty() {
                continue;
            }
            return Ok(Some(String::from_utf8_lossy(&frame).into_owned()));
        }
        Ok(None)
    }
}

impl Encoder<Command> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.write_fmt(format_args!("{}\r", item.token()))
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}
