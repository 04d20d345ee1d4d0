use std::fmt;
use std::time::Duration;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(4_000);

// The closed set of modem operations the tracker issues.
// `Display` renders the exact wire text (without the line break). The
// vendor command set is an external contract: the engine sends this text
// verbatim and does not interpret the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtCommand {
    Attention,
    // `AT+QIACT=<context>`, `0` tears every PDP context down.
    ActivateContext(u8),
    AttachPacketService(bool),
    SetFunctionality { level: u8, reset: bool },
    ConfigureContext { context: u8, protocol: u8 },
    HttpConfig(HttpSetting),
    // `AT+QHTTPPUT=<length>,<input timeout s>,<response timeout s>`
    HttpPut {
        length: usize,
        input_timeout_secs: u16,
        response_timeout_secs: u16,
    },
    // Request body sent after the modem asked for `CONNECT` input.
    Body(String),
    // Operator supplied text, sent as-is.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpSetting {
    SslContextId(u8),
    Url(String),
    ContextId(u8),
    ResponseHeader(bool),
    ResponseOutputAuto(bool),
    RequestHeader(String),
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtCommand::Attention => f.write_str("AT"),
            AtCommand::ActivateContext(context) => write!(f, "AT+QIACT={context}"),
            AtCommand::AttachPacketService(attach) => write!(f, "AT+CGATT={}", u8::from(*attach)),
            AtCommand::SetFunctionality { level, reset } => {
                write!(f, "AT+CFUN={},{}", level, u8::from(*reset))
            }
            AtCommand::ConfigureContext { context, protocol } => {
                write!(f, "AT+QICSGP={context},{protocol}")
            }
            AtCommand::HttpConfig(setting) => write!(f, "AT+QHTTPCFG={setting}"),
            AtCommand::HttpPut {
                length,
                input_timeout_secs,
                response_timeout_secs,
            } => write!(
                f,
                "AT+QHTTPPUT={length},{input_timeout_secs},{response_timeout_secs}"
            ),
            AtCommand::Body(text) | AtCommand::Raw(text) => f.write_str(text),
        }
    }
}

impl fmt::Display for HttpSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpSetting::SslContextId(id) => write!(f, "\"sslctxid\",{id}"),
            HttpSetting::Url(url) => write!(f, "\"url\",\"{url}\""),
            HttpSetting::ContextId(id) => write!(f, "\"contextid\",{id}"),
            HttpSetting::ResponseHeader(on) => write!(f, "\"responseheader\",{}", u8::from(*on)),
            HttpSetting::ResponseOutputAuto(on) => write!(f, "\"rspout/auto\",{}", u8::from(*on)),
            HttpSetting::RequestHeader(header) => write!(f, "\"header\",\"{header}\""),
        }
    }
}

// One exchange: what to send and how long to listen.
// With `fill_buffer` set the exchange ignores `timeout` entirely and keeps
// listening until the engine's optional fill-wait ceiling, or forever when
// none is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    at: AtCommand,
    timeout: Duration,
    fill_buffer: bool,
}

impl Command {
    pub fn new(at: AtCommand) -> Self {
        Self {
            at,
            timeout: DEFAULT_COMMAND_TIMEOUT,
            fill_buffer: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn filling_buffer(mut self) -> Self {
        self.fill_buffer = true;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn fills_buffer(&self) -> bool {
        self.fill_buffer
    }

    pub fn text(&self) -> String {
        self.at.to_string()
    }
}

impl From<AtCommand> for Command {
    fn from(at: AtCommand) -> Self {
        Command::new(at)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.at.fmt(f)
    }
}
