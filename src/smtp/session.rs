//! Per-connection SMTP conversation state and the command dispatcher.
//!
//! Since SMTP requests arrive as a series of packets rather than all at
//! once, this is a struct tracking an in-progress conversation plus the
//! logic that advances it one packet at a time.

use std::net::{IpAddr, SocketAddr};

use crate::smtp::body::{BodyAccumulator, BodyAppend};
use crate::smtp::log_handler::LogLevel;
use crate::smtp::mail::Mail;
use crate::smtp::response::{self, Response};
use crate::smtp::spf::SpfResult;
use crate::smtp::tokenizer::{arg_split, find_email_in_line};
use crate::smtp::ListenConfig;

const CRLF: &str = "\r\n";

pub struct Session {
    sender_ip: IpAddr,
    sender_addr: SocketAddr,
    said_hello: bool,
    extended: bool,
    hello_from: String,
    mail_from: String,
    recipients: Vec<String>,
    body_started: bool,
    body_completed: bool,
    body: BodyAccumulator,
    spf_result: SpfResult,
}

impl Session {
    pub fn new(sender_addr: SocketAddr) -> Self {
        Session {
            sender_ip: sender_addr.ip(),
            sender_addr,
            said_hello: false,
            extended: false,
            hello_from: String::new(),
            mail_from: String::new(),
            recipients: Vec::new(),
            body_started: false,
            body_completed: false,
            body: BodyAccumulator::new(),
            spf_result: SpfResult::None,
        }
    }

    /// Resets every field back to its starting value except the
    /// connection's remote address, which doesn't change across a
    /// RSET or a STARTTLS re-greet.
    pub fn reset(&mut self) {
        self.said_hello = false;
        self.extended = false;
        self.hello_from.clear();
        self.mail_from.clear();
        self.recipients.clear();
        self.body_started = false;
        self.body_completed = false;
        self.body = BodyAccumulator::new();
        self.spf_result = SpfResult::None;
    }

    /// Advances the conversation by one packet, returning the reply to
    /// send (or [`response::res_blank`] if none should be sent yet).
    pub async fn handle_req(&mut self, packet: &[u8], cfg: &ListenConfig) -> Response {
        if self.body_started && !self.body_completed {
            return self.handle_body(packet, cfg).await;
        }

        let req = String::from_utf8_lossy(packet);

        // Command-phase packets must contain exactly one CRLF, at the
        // end. A body-phase packet is handled above, before this gate,
        // since a full multi-line body legitimately contains many.
        match req.find(CRLF) {
            Some(idx) if idx == req.len() - 2 => {}
            _ => return response::res_invalid_crlf(),
        }

        let trimmed = req.trim_end_matches(CRLF);
        let args = arg_split(trimmed);
        if args.is_empty() {
            return response::res_noop();
        }

        let cmd = args[0].to_uppercase();
        if cmd == "MAIL" && args.len() > 1 && args[1].to_uppercase() == "FROM" {
            return self.handle_mail_from(trimmed, &args, cfg).await;
        }
        if cmd == "RCPT" && args.len() > 1 && args[1].to_uppercase() == "TO" {
            return self.handle_rcpt_to(trimmed, &args, cfg);
        }

        match cmd.as_str() {
            "EHLO" => self.handle_ehlo(&args, cfg),
            "HELO" => self.handle_helo(&args),
            "DATA" => self.handle_data(),
            "QUIT" => response::res_bye(),
            "RSET" => {
                self.reset();
                response::res_reset()
            }
            "VRFY" | "EXPN" | "HELP" | "AUTH" => response::res_cmd_disabled(),
            "NOOP" => response::res_noop(),
            "TURN" | "SEND" | "SAML" | "RELAY" | "SOML" | "TLS" | "STARTSSL" => {
                response::res_cmd_obsolete()
            }
            "STARTTLS" => response::res_conn_upgrade(),
            _ => response::res_unknown_cmd(),
        }
    }

    fn handle_helo(&mut self, args: &[String]) -> Response {
        if self.said_hello {
            return response::res_invalid_sequence();
        }
        if args.len() != 2 || args[1].is_empty() {
            return response::res_invalid_arg_num();
        }
        self.hello_from = args[1].trim().to_string();
        self.said_hello = true;
        response::res_hello().with_msg(format!("Hello {}", self.hello_from))
    }

    fn handle_ehlo(&mut self, args: &[String], cfg: &ListenConfig) -> Response {
        self.extended = true;
        if self.said_hello {
            return response::res_invalid_sequence();
        }
        if args.len() != 2 || args[1].is_empty() {
            return response::res_invalid_arg_num();
        }
        self.hello_from = args[1].trim().to_string();
        self.said_hello = true;
        response::res_hello()
            .with_msg(format!("Hello {}", self.hello_from))
            .with_ext_msgs(vec!["STARTTLS".into(), format!("SIZE {}", cfg.max_msg_size)])
    }

    async fn handle_mail_from(&mut self, req: &str, args: &[String], cfg: &ListenConfig) -> Response {
        if !self.said_hello || !self.mail_from.is_empty() {
            return response::res_invalid_sequence();
        }
        if args.len() < 3 {
            return response::res_invalid_arg_num();
        }
        let email = match find_email_in_line(req) {
            Some(email) => email,
            None => return response::res_cant_parse_addr(),
        };
        let sender_domain = match email.split_once('@') {
            Some((_, domain)) => domain,
            None => return response::res_cant_parse_addr(),
        };
        match cfg.spf_checker.check_host(self.sender_ip, sender_domain).await {
            Ok(result) => self.spf_result = result,
            Err(e) => {
                cfg.log_handler.log(LogLevel::Error, &format!("failed to check spf: {e}"));
                return response::res_spf_err();
            }
        }
        if self.spf_result == SpfResult::Fail {
            return response::res_spf_fail();
        }
        self.mail_from = email;
        response::res_accepting_mail_from().with_msg(format!("Accepting mail from {}", self.mail_from))
    }

    fn handle_rcpt_to(&mut self, req: &str, args: &[String], cfg: &ListenConfig) -> Response {
        if !self.said_hello || self.mail_from.is_empty() {
            return response::res_invalid_sequence();
        }
        if args.len() < 3 {
            return response::res_invalid_arg_num();
        }
        let email = match find_email_in_line(req) {
            Some(email) => email,
            None => return response::res_cant_parse_addr(),
        };
        if let Some(domains) = &cfg.domains {
            let domain = match email.split_once('@') {
                Some((_, domain)) => domain,
                None => return response::res_cant_parse_addr(),
            };
            if !domains.iter().any(|d| d == domain) {
                return response::res_not_local();
            }
        }
        self.recipients.push(email.clone());
        response::res_rcpt_added().with_msg(format!("Added recipient {email}"))
    }

    fn handle_data(&mut self) -> Response {
        if self.body_started || self.recipients.is_empty() || self.mail_from.is_empty() || !self.said_hello {
            return response::res_invalid_sequence();
        }
        self.body_started = true;
        response::res_start_mail()
    }

    async fn handle_body(&mut self, packet: &[u8], cfg: &ListenConfig) -> Response {
        match self.body.append(packet, cfg.max_msg_size) {
            BodyAppend::Incomplete => response::res_blank(),
            BodyAppend::TooBig => {
                self.body_completed = true;
                response::res_msg_too_big()
            }
            BodyAppend::Complete(raw) => {
                self.body_completed = true;
                let mail = Mail {
                    sender_addr: self.sender_addr,
                    mail_from: self.mail_from.clone(),
                    recipients: self.recipients.clone(),
                    raw,
                    spf_result: self.spf_result,
                };
                cfg.mail_handler.handle_mail(mail).await;
                response::res_mail_accepted()
            }
        }
    }
}
