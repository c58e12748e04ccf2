//! Frame codec
//!
//! Commands arrive as newline-separated fields. How many fields make up one
//! command depends on the verb, so the decoder collects complete lines until
//! the verb's arity is satisfied (or, for SEND, until the `.` terminator).

use crate::error::{MailError, Result};
use crate::protocol::response::Response;
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

/// Field that ends a SEND body
pub const BODY_TERMINATOR: &str = ".";

/// One decoded command, split into fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    fields: Vec<String>,
}

impl Frame {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    pub fn verb(&self) -> &str {
        self.fields.first().map(String::as_str).unwrap_or_default()
    }

    /// Fields after the verb
    pub fn args(&self) -> &[String] {
        self.fields.get(1..).unwrap_or_default()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    fn is_complete(&self) -> bool {
        match self.verb() {
            "LOGIN" => self.fields.len() >= 3,
            "READ" | "DEL" => self.fields.len() >= 2,
            "SEND" => {
                self.fields.len() > 1
                    && self.fields.last().map(String::as_str) == Some(BODY_TERMINATOR)
            }
            _ => true,
        }
    }
}

/// Decodes [`Frame`]s and encodes [`Response`]s
#[derive(Debug)]
pub struct FrameCodec {
    max_frame_bytes: usize,
    /// Fields of the frame being assembled
    pending: Frame,
    /// Bytes consumed for the pending frame
    pending_bytes: usize,
    /// Where to resume searching for '\n'
    next_index: usize,
}

impl FrameCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            pending: Frame::new(Vec::new()),
            pending_bytes: 0,
            next_index: 0,
        }
    }

    fn field(bytes: &[u8]) -> String {
        let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        String::from_utf8_lossy(bytes).into_owned()
    }

    fn take_frame(&mut self) -> Frame {
        self.pending_bytes = 0;
        std::mem::replace(&mut self.pending, Frame::new(Vec::new()))
    }

    fn check_size(&self, len: usize) -> Result<()> {
        if len > self.max_frame_bytes {
            return Err(MailError::FrameTooLarge(self.max_frame_bytes));
        }
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = MailError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>> {
        loop {
            let Some(offset) = buf[self.next_index..].iter().position(|b| *b == b'\n') else {
                // Only an unterminated field is left in the buffer
                self.next_index = buf.len();
                self.check_size(self.pending_bytes + buf.len())?;
                return Ok(None);
            };

            let line = buf.split_to(self.next_index + offset + 1);
            self.next_index = 0;
            self.pending_bytes += line.len();
            self.check_size(self.pending_bytes)?;

            let field = Self::field(&line);

            // Blank lines between commands carry nothing
            if self.pending.fields.is_empty() && field.is_empty() {
                trace!("Skipping blank line");
                self.pending_bytes = 0;
                continue;
            }

            self.pending.fields.push(field);

            if self.pending.is_complete() {
                return Ok(Some(self.take_frame()));
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }

        if !buf.is_empty() {
            let rest = buf.split_to(buf.len());
            self.next_index = 0;

            let field = Self::field(&rest);
            if !field.is_empty() {
                self.pending.fields.push(field);
            }
        }

        if self.pending.fields.is_empty() {
            return Ok(None);
        }

        Ok(Some(self.take_frame()))
    }
}

impl Encoder<Response> for FrameCodec {
    type Error = MailError;

    fn encode(&mut self, item: Response, buf: &mut BytesMut) -> Result<()> {
        let rendered = item.to_string();
        buf.reserve(rendered.len());
        buf.extend_from_slice(rendered.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut FrameCodec, input: &str) -> Vec<Frame> {
        let mut buf = BytesMut::from(input);
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode(&mut buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    fn fields(frame: &Frame) -> Vec<&str> {
        frame.fields().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_login_needs_three_fields() {
        let mut codec = FrameCodec::new(1024);
        let mut buf = BytesMut::from("LOGIN\nalice\n");

        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"secret\n");
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(fields(&frame), vec!["LOGIN", "alice", "secret"]);
        assert_eq!(frame.verb(), "LOGIN");
        assert_eq!(frame.args(), ["alice", "secret"]);
    }

    #[test]
    fn test_pipelined_commands() {
        let mut codec = FrameCodec::new(1024);
        let frames = decode_all(&mut codec, "LIST\nREAD\n0\nDEL\n1\nQUIT\n");

        let verbs: Vec<&str> = frames.iter().map(Frame::verb).collect();
        assert_eq!(verbs, vec!["LIST", "READ", "DEL", "QUIT"]);
        assert_eq!(frames[1].args(), ["0"]);
    }

    #[test]
    fn test_send_ends_at_terminator() {
        let mut codec = FrameCodec::new(1024);
        let frames = decode_all(&mut codec, "SEND\nbob\nHello\nline1\n\nline3\n.\nLIST\n");

        assert_eq!(frames.len(), 2);
        assert_eq!(
            fields(&frames[0]),
            vec!["SEND", "bob", "Hello", "line1", "", "line3", "."]
        );
        assert_eq!(frames[1].verb(), "LIST");
    }

    #[test]
    fn test_crlf_is_accepted() {
        let mut codec = FrameCodec::new(1024);
        let frames = decode_all(&mut codec, "READ\r\n3\r\n");
        assert_eq!(fields(&frames[0]), vec!["READ", "3"]);
    }

    #[test]
    fn test_blank_lines_between_commands() {
        let mut codec = FrameCodec::new(1024);
        let frames = decode_all(&mut codec, "\n\nLIST\n\r\nQUIT\n");

        let verbs: Vec<&str> = frames.iter().map(Frame::verb).collect();
        assert_eq!(verbs, vec!["LIST", "QUIT"]);
    }

    #[test]
    fn test_unknown_verb_is_one_field() {
        let mut codec = FrameCodec::new(1024);
        let frames = decode_all(&mut codec, "HELLO\nLIST\n");
        assert_eq!(frames[0].verb(), "HELLO");
        assert_eq!(frames[1].verb(), "LIST");
    }

    #[test]
    fn test_eof_keeps_trailing_field() {
        let mut codec = FrameCodec::new(1024);
        let mut buf = BytesMut::from("LOGIN\nalice\nsecret");

        assert!(codec.decode(&mut buf).unwrap().is_none());

        let frame = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(fields(&frame), vec!["LOGIN", "alice", "secret"]);
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_eof_flushes_incomplete_frame() {
        let mut codec = FrameCodec::new(1024);
        let mut buf = BytesMut::from("SEND\nbob\nsubject\nbody\n");

        let frame = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(fields(&frame), vec!["SEND", "bob", "subject", "body"]);
    }

    #[test]
    fn test_oversized_frame() {
        let mut codec = FrameCodec::new(16);

        let mut buf = BytesMut::from("SEND\nbob\nsubject\nthis body is too long\n");
        assert!(matches!(
            codec.decode(&mut buf),
            Err(MailError::FrameTooLarge(16))
        ));

        // An unterminated field counts as well
        let mut codec = FrameCodec::new(16);
        let mut buf = BytesMut::from("LOGIN\naaaaaaaaaaaaaaaaaaaa");
        assert!(matches!(
            codec.decode(&mut buf),
            Err(MailError::FrameTooLarge(16))
        ));
    }

    #[test]
    fn test_limit_applies_per_frame() {
        let mut codec = FrameCodec::new(12);
        let frames = decode_all(&mut codec, "READ\n0\nREAD\n1\nREAD\n2\n");
        assert_eq!(frames.len(), 3);
    }

    #[test]
    fn test_encode_response() {
        let mut codec = FrameCodec::new(1024);
        let mut buf = BytesMut::new();

        codec.encode(Response::Ok, &mut buf).unwrap();
        codec.encode(Response::Quit, &mut buf).unwrap();

        assert_eq!(&buf[..], b"OK\nquit");
    }
}
