//! Accumulates the raw bytes of a message body across DATA-phase
//! packets until the `<CRLF>.<CRLF>` terminator is seen.

/// The five-byte sequence that ends a DATA transaction.
pub const TERMINATOR: &str = "\r\n.\r\n";

/// Outcome of appending a packet to the body accumulator.
pub enum BodyAppend {
    /// The terminator hasn't arrived yet; keep reading.
    Incomplete,
    /// The running total exceeded `max_msg_size`. The accumulator is
    /// left in a finished state; the caller should not append further.
    TooBig,
    /// The terminator arrived. Carries the dot-unstuffed body with the
    /// terminator itself stripped.
    Complete(Vec<u8>),
}

/// Accumulates body packets, checking the size cap incrementally
/// rather than only after the terminator arrives, so an oversized
/// message is rejected as soon as it's known to be oversized.
#[derive(Debug, Default)]
pub struct BodyAccumulator {
    buf: Vec<u8>,
}

impl BodyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `packet` to the accumulated body and checks both the
    /// terminator and the size cap.
    pub fn append(&mut self, packet: &[u8], max_msg_size: usize) -> BodyAppend {
        self.buf.extend_from_slice(packet);
        if self.buf.len() > max_msg_size {
            return BodyAppend::TooBig;
        }
        if self.buf.ends_with(TERMINATOR.as_bytes()) {
            let body_len = self.buf.len() - TERMINATOR.len();
            let body = unstuff_dots(&self.buf[..body_len]);
            return BodyAppend::Complete(body);
        }
        BodyAppend::Incomplete
    }
}

/// Reverses RFC 5321 §4.5.2 dot-stuffing: a line beginning with two
/// dots is transmitted as one extra leading dot to keep the real
/// terminator unambiguous. This strips that one extra dot from every
/// line that starts with `.`, so a body line that legitimately starts
/// with a dot doesn't leak the transport-layer escaping into the
/// delivered message.
fn unstuff_dots(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut at_line_start = true;
    let mut i = 0;
    while i < body.len() {
        if at_line_start && body[i] == b'.' {
            i += 1;
            at_line_start = false;
            continue;
        }
        let b = body[i];
        out.push(b);
        at_line_start = b == b'\n';
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_without_terminator() {
        let mut acc = BodyAccumulator::new();
        assert!(matches!(acc.append(b"Subject: hi\r\n", 1000), BodyAppend::Incomplete));
    }

    #[test]
    fn complete_on_terminator() {
        let mut acc = BodyAccumulator::new();
        let result = acc.append(b"hello\r\n.\r\n", 1000);
        match result {
            BodyAppend::Complete(body) => assert_eq!(body, b"hello"),
            _ => panic!("expected Complete"),
        }
    }

    #[test]
    fn multi_packet_accumulates_across_calls() {
        let mut acc = BodyAccumulator::new();
        assert!(matches!(acc.append(b"line one\r\n", 1000), BodyAppend::Incomplete));
        match acc.append(b"line two\r\n.\r\n", 1000) {
            BodyAppend::Complete(body) => assert_eq!(body, b"line one\r\nline two"),
            _ => panic!("expected Complete"),
        }
    }

    #[test]
    fn too_big_short_circuits_before_terminator() {
        let mut acc = BodyAccumulator::new();
        assert!(matches!(acc.append(b"way too much data here", 5), BodyAppend::TooBig));
    }

    #[test]
    fn dot_unstuffing_removes_one_leading_dot_per_line() {
        let mut acc = BodyAccumulator::new();
        match acc.append(b"..leading dot\r\nnormal line\r\n.\r\n", 1000) {
            BodyAppend::Complete(body) => assert_eq!(body, b".leading dot\r\nnormal line"),
            _ => panic!("expected Complete"),
        }
    }
}
