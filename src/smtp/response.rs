//! The canonical table of protocol replies.
//!
//! No handler builds a reply ad hoc; every reply in the dispatcher and
//! connection driver comes from one of the functions below, optionally
//! customized with [`Response::with_msg`] / [`Response::with_ext_msgs`]
//! so dynamic content (the HELO echo, an address) can be inlined while
//! the status code and flags stay fixed.

/// One SMTP reply: a status code, primary text, optional continuation
/// lines, and the three flags the connection driver acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status_code: u16,
    pub msg: String,
    pub ext_msgs: Vec<String>,
    /// Whether the driver should write this reply at all. `res_blank`
    /// is the only response with this false — mid-DATA packets that
    /// haven't hit the terminator yet get no reply.
    pub respond: bool,
    /// Whether the connection stays open after this reply.
    pub keep_alive: bool,
    /// Whether the driver should perform a TLS handshake after sending
    /// this reply.
    pub upgrade_to_tls: bool,
}

impl Response {
    fn new(status_code: u16, keep_alive: bool, upgrade_to_tls: bool) -> Self {
        Response {
            status_code,
            msg: String::new(),
            ext_msgs: Vec::new(),
            respond: true,
            keep_alive,
            upgrade_to_tls,
        }
    }

    /// Returns a copy of this response with `msg` replaced.
    pub fn with_msg(&self, msg: impl Into<String>) -> Self {
        let mut r = self.clone();
        r.msg = msg.into();
        r
    }

    /// Returns a copy of this response with `ext_msgs` replaced.
    pub fn with_ext_msgs(&self, ext_msgs: Vec<String>) -> Self {
        let mut r = self.clone();
        r.ext_msgs = ext_msgs;
        r
    }

    /// Renders this response as the wire bytes the client expects:
    /// `NNN-text\r\n` for every line but the last, `NNN text\r\n` for
    /// the last.
    pub fn render(&self) -> String {
        if self.ext_msgs.is_empty() {
            return format!("{} {}\r\n", self.status_code, self.msg);
        }
        let mut lines = Vec::with_capacity(1 + self.ext_msgs.len());
        lines.push(self.msg.as_str());
        lines.extend(self.ext_msgs.iter().map(String::as_str));
        let last = lines.len() - 1;
        let mut out = String::new();
        for (i, line) in lines.iter().enumerate() {
            if i == last {
                out.push_str(&format!("{} {}\r\n", self.status_code, line));
            } else {
                out.push_str(&format!("{}-{}\r\n", self.status_code, line));
            }
        }
        out
    }
}

pub const CODE_READY: u16 = 220;
pub const CODE_BYE: u16 = 221;
pub const CODE_OK: u16 = 250;
pub const CODE_START_MAIL: u16 = 354;
pub const CODE_ACTION_ABORTED: u16 = 451;
pub const CODE_SYNTAX_ERR: u16 = 500;
pub const CODE_ARG_SYNTAX_ERR: u16 = 501;
pub const CODE_NOT_IMPLEMENTED: u16 = 502;
pub const CODE_AUTH_FAILURE: u16 = 535;
pub const CODE_NOT_LOCAL: u16 = 550;
pub const CODE_ACTION_NOT_TAKEN: u16 = 550;
pub const CODE_MSG_TOO_BIG: u16 = 552;

pub fn res_greeting() -> Response {
    Response::new(CODE_READY, true, false).with_msg("ESMTP Service Ready")
}

pub fn res_hello() -> Response {
    Response::new(CODE_OK, true, false).with_msg("Hello")
}

pub fn res_invalid_crlf() -> Response {
    Response::new(CODE_SYNTAX_ERR, true, false)
        .with_msg("Syntax error: invalid crlf")
        .with_ext_msgs(vec!["Crlf must only occur once at end of each request".into()])
}

pub fn res_unknown_cmd() -> Response {
    Response::new(CODE_SYNTAX_ERR, true, false).with_msg("Syntax error: unknown command")
}

pub fn res_invalid_arg_num() -> Response {
    Response::new(CODE_SYNTAX_ERR, true, false).with_msg("Syntax error: invalid number of arguments")
}

pub fn res_cmd_obsolete() -> Response {
    Response::new(CODE_NOT_IMPLEMENTED, true, false).with_msg("Command not implemented: command obsolete")
}

pub fn res_cmd_disabled() -> Response {
    Response::new(CODE_NOT_IMPLEMENTED, true, false).with_msg("Command not implemented: command disabled")
}

pub fn res_cant_parse_addr() -> Response {
    Response::new(CODE_SYNTAX_ERR, true, false)
        .with_msg("Syntax error: unable to parse valid email address from message")
}

pub fn res_noop() -> Response {
    Response::new(CODE_OK, true, false).with_msg("No operation")
}

pub fn res_pkt_too_big() -> Response {
    Response::new(CODE_SYNTAX_ERR, true, false).with_msg("Syntax error: packet too big")
}

pub fn res_bye() -> Response {
    Response::new(CODE_BYE, false, false).with_msg("Goodbye")
}

pub fn res_reset() -> Response {
    Response::new(CODE_OK, true, false).with_msg("Session reset")
}

/// Carries status code 250 (OK), not the 503 a strict reading of RFC
/// 5321 might suggest — callers rely on this exact code for an
/// out-of-sequence command.
pub fn res_invalid_sequence() -> Response {
    Response::new(CODE_OK, true, false).with_msg("Invalid command sequence")
}

pub fn res_accepting_mail_from() -> Response {
    Response::new(CODE_OK, true, false).with_msg("Accepting mail")
}

pub fn res_rcpt_added() -> Response {
    Response::new(CODE_OK, true, false).with_msg("Added recipient")
}

pub fn res_mail_accepted() -> Response {
    Response::new(CODE_OK, true, false).with_msg("Mail accepted")
}

pub fn res_start_mail() -> Response {
    Response::new(CODE_START_MAIL, true, false).with_msg("Start mail")
}

/// Sentinel for "send nothing, keep reading" — mid-DATA packets that
/// haven't reached the `<CRLF>.<CRLF>` terminator yet.
pub fn res_blank() -> Response {
    Response {
        status_code: 0,
        msg: String::new(),
        ext_msgs: Vec::new(),
        respond: false,
        keep_alive: true,
        upgrade_to_tls: false,
    }
}

pub fn res_spf_err() -> Response {
    Response::new(CODE_ACTION_ABORTED, true, false).with_msg("Spf check error")
}

pub fn res_spf_fail() -> Response {
    Response::new(CODE_ACTION_NOT_TAKEN, true, false).with_msg("Spf check failed")
}

pub fn res_conn_upgrade() -> Response {
    Response::new(CODE_READY, true, true).with_msg("Ready for tls upgrade")
}

pub fn res_no_tls() -> Response {
    Response::new(CODE_NOT_IMPLEMENTED, true, false).with_msg("Command not implemented: tls not available")
}

pub fn res_failed_tls() -> Response {
    Response::new(CODE_AUTH_FAILURE, true, false).with_msg("Tls handshake failed")
}

pub fn res_msg_too_big() -> Response {
    Response::new(CODE_MSG_TOO_BIG, true, false).with_msg("Message too big")
}

pub fn res_not_local() -> Response {
    Response::new(CODE_NOT_LOCAL, true, false).with_msg("User not local")
}

/// Reserved for when real DKIM verification replaces the stub; see
/// [`crate::smtp::body`].
pub fn res_dkim_failed() -> Response {
    Response::new(CODE_ACTION_NOT_TAKEN, true, false).with_msg("Dkim authentication failed")
}
