use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use super::error::ProbeError;
use super::options::SmtpProbeOptions;
use super::types::{ProbeStage, SmtpReply};

/// RFC 5321 limit for one reply line, CRLF included.
const MAX_REPLY_LINE: usize = 512;

/// A stream whose blocking reads and writes can be bounded.
pub(crate) trait TimedStream: Read + Write {
    fn set_io_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl TimedStream for TcpStream {
    fn set_io_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))?;
        self.set_write_timeout(Some(timeout))
    }
}

/// One control-channel conversation. The stream is owned, so the socket is
/// closed whenever the session is dropped.
pub(crate) struct SmtpSession<S> {
    reader: BufReader<S>,
    command_timeout: Duration,
    deadline: Instant,
}

impl SmtpSession<TcpStream> {
    pub(crate) fn connect(
        host: &str,
        addrs: &[SocketAddr],
        options: &SmtpProbeOptions,
        deadline: Instant,
    ) -> Result<Self, ProbeError> {
        let mut last_err = None;
        for addr in addrs {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ProbeError::Timeout {
                    stage: ProbeStage::Connect,
                });
            }
            match TcpStream::connect_timeout(addr, options.connect_timeout.min(remaining)) {
                Ok(stream) => return Ok(Self::new(stream, options.command_timeout, deadline)),
                Err(err) => last_err = Some(err),
            }
        }
        Err(ProbeError::Connect {
            host: host.to_string(),
            source: last_err.unwrap_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    "no socket address available",
                )
            }),
        })
    }
}

impl<S: TimedStream> SmtpSession<S> {
    pub(crate) fn new(stream: S, command_timeout: Duration, deadline: Instant) -> Self {
        Self {
            reader: BufReader::new(stream),
            command_timeout,
            deadline,
        }
    }

    /// Greeting, HELO, MAIL FROM, RCPT TO. `Ok(())` only when RCPT is
    /// answered with exactly 250; the session is left open for [`quit`].
    ///
    /// [`quit`]: SmtpSession::quit
    pub(crate) fn probe(
        &mut self,
        options: &SmtpProbeOptions,
        recipient: &str,
    ) -> Result<(), ProbeError> {
        let greeting = self.read_reply(ProbeStage::Greeting)?;
        expect_positive(ProbeStage::Greeting, greeting)?;

        let helo = self.command(&options.helo_command(), ProbeStage::Helo)?;
        expect_positive(ProbeStage::Helo, helo)?;

        let mail = self.command(&options.mail_from_command(), ProbeStage::MailFrom)?;
        expect_positive(ProbeStage::MailFrom, mail)?;

        let rcpt = self.command(&format!("RCPT TO:<{recipient}>"), ProbeStage::RcptTo)?;
        if rcpt.code == 250 {
            Ok(())
        } else {
            Err(rejected(ProbeStage::RcptTo, rcpt))
        }
    }

    /// Best effort; the connection is going away either way.
    pub(crate) fn quit(&mut self) {
        if self.send_line("QUIT", ProbeStage::Quit).is_ok() {
            let _ = self.read_reply(ProbeStage::Quit);
        }
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> S {
        self.reader.into_inner()
    }

    fn command(&mut self, command: &str, stage: ProbeStage) -> Result<SmtpReply, ProbeError> {
        self.send_line(command, stage)?;
        self.read_reply(stage)
    }

    /// Bounds the next blocking operation by the smaller of the command
    /// timeout and what is left of the session budget.
    fn arm(&mut self, stage: ProbeStage) -> Result<(), ProbeError> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ProbeError::Timeout { stage });
        }
        let timeout = self
            .command_timeout
            .min(remaining)
            .max(Duration::from_millis(1));
        self.reader
            .get_mut()
            .set_io_timeout(timeout)
            .map_err(|err| ProbeError::io(stage, err))
    }

    fn send_line(&mut self, command: &str, stage: ProbeStage) -> Result<(), ProbeError> {
        self.arm(stage)?;
        let mut line = command.as_bytes().to_vec();
        line.extend_from_slice(b"\r\n");
        let stream = self.reader.get_mut();
        stream
            .write_all(&line)
            .and_then(|()| stream.flush())
            .map_err(|err| ProbeError::io(stage, err))
    }

    /// Reads one CRLF-terminated line, re-arming the timeout before every
    /// fill so a trickling peer cannot outlive the session deadline.
    fn read_line(&mut self, stage: ProbeStage) -> Result<String, ProbeError> {
        let mut line = Vec::new();
        loop {
            self.arm(stage)?;
            let available = self
                .reader
                .fill_buf()
                .map_err(|err| ProbeError::io(stage, err))?;
            if available.is_empty() {
                return Err(ProbeError::Disconnected { stage });
            }
            let (used, done) = match available.iter().position(|&b| b == b'\n') {
                Some(pos) => (pos + 1, true),
                None => (available.len(), false),
            };
            if line.len() + used > MAX_REPLY_LINE {
                return Err(ProbeError::Protocol(format!(
                    "reply line longer than {MAX_REPLY_LINE} octets"
                )));
            }
            line.extend_from_slice(&available[..used]);
            self.reader.consume(used);
            if done {
                break;
            }
        }
        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        String::from_utf8(line)
            .map_err(|_| ProbeError::Protocol("reply is not valid UTF-8".to_string()))
    }

    fn read_reply(&mut self, stage: ProbeStage) -> Result<SmtpReply, ProbeError> {
        let mut code = None;
        let mut message_lines = Vec::new();
        loop {
            let raw = self.read_line(stage)?;

            let code_part = raw
                .get(..3)
                .ok_or_else(|| ProbeError::Protocol(format!("invalid SMTP reply: '{raw}'")))?;
            let parsed_code = code_part.parse::<u16>().map_err(|_| {
                ProbeError::Protocol(format!("invalid SMTP status code: '{code_part}'"))
            })?;
            if let Some(existing) = code {
                if existing != parsed_code {
                    return Err(ProbeError::Protocol(format!(
                        "inconsistent SMTP reply codes: {existing} vs {parsed_code}"
                    )));
                }
            } else {
                code = Some(parsed_code);
            }
            let continuation = raw.as_bytes().get(3).copied() == Some(b'-');
            message_lines.push(raw.get(4..).unwrap_or_default().to_string());
            if !continuation {
                break;
            }
        }
        Ok(SmtpReply {
            code: code.ok_or_else(|| ProbeError::Protocol("SMTP reply missing status code".into()))?,
            message: message_lines.join("\n"),
        })
    }
}

fn expect_positive(stage: ProbeStage, reply: SmtpReply) -> Result<(), ProbeError> {
    if reply.is_positive_completion() {
        Ok(())
    } else {
        Err(rejected(stage, reply))
    }
}

fn rejected(stage: ProbeStage, reply: SmtpReply) -> ProbeError {
    ProbeError::Rejected {
        stage,
        code: reply.code,
        message: reply.message,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;
    use std::thread;

    /// Replays canned server output and records everything the client writes.
    pub(crate) struct ScriptedStream {
        replies: Cursor<Vec<u8>>,
        pub(crate) written: Vec<u8>,
    }

    impl ScriptedStream {
        pub(crate) fn new(replies: &str) -> Self {
            Self {
                replies: Cursor::new(replies.as_bytes().to_vec()),
                written: Vec::new(),
            }
        }

        pub(crate) fn commands(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.written)
                .split("\r\n")
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.replies.read(buf)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl TimedStream for ScriptedStream {
        fn set_io_timeout(&mut self, _: Duration) -> io::Result<()> {
            Ok(())
        }
    }

    /// Endless server output that never completes a line.
    struct Trickle {
        pause: Duration,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            thread::sleep(self.pause);
            let n = self.chunk.min(buf.len());
            buf[..n].fill(b'2');
            Ok(n)
        }
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl TimedStream for Trickle {
        fn set_io_timeout(&mut self, _: Duration) -> io::Result<()> {
            Ok(())
        }
    }

    fn options() -> SmtpProbeOptions {
        SmtpProbeOptions {
            helo_domain: "localhost".to_string(),
            ..SmtpProbeOptions::default()
        }
    }

    fn session<S: TimedStream>(stream: S, budget: Duration) -> SmtpSession<S> {
        SmtpSession::new(stream, Duration::from_secs(15), Instant::now() + budget)
    }

    fn run(replies: &str) -> (Result<(), ProbeError>, Vec<String>) {
        let mut session = session(ScriptedStream::new(replies), Duration::from_secs(5));
        let result = session.probe(&options(), "user@example.com");
        session.quit();
        (result, session.into_inner().commands())
    }

    #[test]
    fn accepted_recipient_never_reaches_data() {
        let (result, commands) = run("220 mx.example ESMTP\r\n\
             250 mx.example\r\n\
             250 2.1.0 Ok\r\n\
             250 2.1.5 Ok\r\n\
             221 2.0.0 Bye\r\n");
        assert!(result.is_ok(), "{result:?}");
        assert_eq!(
            commands,
            [
                "HELO localhost",
                "MAIL FROM:<test@example.com>",
                "RCPT TO:<user@example.com>",
                "QUIT",
            ]
        );
        assert!(!commands.iter().any(|c| c.starts_with("DATA")));
    }

    #[test]
    fn rejected_recipient_still_quits() {
        let (result, commands) = run("220 mx.example ESMTP\r\n\
             250 mx.example\r\n\
             250 2.1.0 Ok\r\n\
             550 5.1.1 User unknown\r\n\
             221 2.0.0 Bye\r\n");
        match result {
            Err(ProbeError::Rejected { stage, code, .. }) => {
                assert_eq!(stage, ProbeStage::RcptTo);
                assert_eq!(code, 550);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(commands.last().map(String::as_str), Some("QUIT"));
        assert!(!commands.iter().any(|c| c.starts_with("DATA")));
    }

    #[test]
    fn only_exact_250_counts() {
        let (result, _) = run("220 mx\r\n250 mx\r\n250 Ok\r\n251 User not local\r\n");
        assert!(matches!(
            result,
            Err(ProbeError::Rejected { code: 251, .. })
        ));
    }

    #[test]
    fn multiline_replies_are_folded() {
        let (result, _) = run("220-mx.example\r\n220 welcome\r\n\
             250-mx.example\r\n250-PIPELINING\r\n250 8BITMIME\r\n\
             250 Ok\r\n250 Ok\r\n");
        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn disconnect_mid_dialogue() {
        let (result, commands) = run("220 mx.example ESMTP\r\n250 mx.example\r\n");
        assert!(matches!(
            result,
            Err(ProbeError::Disconnected {
                stage: ProbeStage::MailFrom
            })
        ));
        assert!(!commands.iter().any(|c| c.starts_with("RCPT")));
    }

    #[test]
    fn refused_greeting_stops_early() {
        let (result, commands) = run("554 no service\r\n");
        assert!(matches!(
            result,
            Err(ProbeError::Rejected {
                stage: ProbeStage::Greeting,
                code: 554,
                ..
            })
        ));
        assert_eq!(commands, ["QUIT"]);
    }

    #[test]
    fn garbage_reply_is_protocol_error() {
        let (result, _) = run("hello there\r\n");
        assert!(matches!(result, Err(ProbeError::Protocol(_))));
    }

    #[test]
    fn expired_deadline_times_out() {
        let mut session = SmtpSession::new(
            ScriptedStream::new("220 mx\r\n"),
            Duration::from_secs(15),
            Instant::now(),
        );
        let result = session.probe(&options(), "user@example.com");
        assert!(matches!(
            result,
            Err(ProbeError::Timeout {
                stage: ProbeStage::Greeting
            })
        ));
    }

    #[test]
    fn trickling_server_hits_session_deadline() {
        let budget = Duration::from_millis(100);
        let trickle = Trickle {
            pause: Duration::from_millis(20),
            chunk: 1,
        };
        let mut session = session(trickle, budget);
        let start = Instant::now();
        let result = session.probe(&options(), "user@example.com");
        assert!(
            matches!(
                result,
                Err(ProbeError::Timeout {
                    stage: ProbeStage::Greeting
                })
            ),
            "{result:?}"
        );
        assert!(start.elapsed() < Duration::from_secs(1), "{:?}", start.elapsed());
    }

    #[test]
    fn unterminated_reply_line_is_capped() {
        let flood = Trickle {
            pause: Duration::ZERO,
            chunk: 64,
        };
        let mut session = session(flood, Duration::from_secs(5));
        let result = session.probe(&options(), "user@example.com");
        assert!(matches!(result, Err(ProbeError::Protocol(_))), "{result:?}");
    }
}
