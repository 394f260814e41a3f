/// An IRC protocol message per RFC 2812.
///
/// Wire format: `[:prefix] COMMAND [params...] [:trailing]\r\n`
///
/// Examples as a client sees them:
///   `:alice!alice@host JOIN #general\r\n`
///   `:irc.example.com 475 alice #secret :Cannot join channel (+k)\r\n`
///   `PING :irc.example.com\r\n`
#[derive(Debug, Clone, PartialEq)]
pub struct IrcMessage {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    /// Build a client command (no prefix).
    pub fn command(command: &str, params: Vec<String>) -> Self {
        IrcMessage {
            prefix: None,
            command: command.to_string(),
            params,
        }
    }

    /// Parse a single IRC line (without the trailing \r\n).
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);

        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut remaining = line;
        let mut prefix = None;

        if let Some(rest) = remaining.strip_prefix(':') {
            match rest.find(' ') {
                Some(idx) => {
                    prefix = Some(rest[..idx].to_string());
                    remaining = rest[idx..].trim_start();
                }
                None => return Err(ParseError::MissingCommand),
            }
        }

        let command = match remaining.find(' ') {
            Some(idx) => {
                let command = remaining[..idx].to_uppercase();
                remaining = remaining[idx..].trim_start();
                command
            }
            None => {
                let command = remaining.to_uppercase();
                remaining = "";
                command
            }
        };

        if command.is_empty() {
            return Err(ParseError::MissingCommand);
        }

        let mut params = Vec::new();
        while !remaining.is_empty() {
            if let Some(trailing) = remaining.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }

            match remaining.find(' ') {
                Some(idx) => {
                    params.push(remaining[..idx].to_string());
                    remaining = remaining[idx..].trim_start();
                }
                None => {
                    params.push(remaining.to_string());
                    break;
                }
            }
        }

        Ok(IrcMessage {
            prefix,
            command,
            params,
        })
    }

    /// Format this message back to IRC wire format (without trailing \r\n).
    pub fn format(&self) -> String {
        let mut out = String::with_capacity(512);

        if let Some(ref prefix) = self.prefix {
            out.push(':');
            out.push_str(prefix);
            out.push(' ');
        }

        out.push_str(&self.command);

        for (i, param) in self.params.iter().enumerate() {
            out.push(' ');
            // No CR/LF in params, or user text could smuggle extra commands.
            let param = param.replace(['\r', '\n'], " ");
            let last = i == self.params.len() - 1;
            if last && (param.is_empty() || param.contains(' ') || param.starts_with(':')) {
                out.push(':');
            }
            out.push_str(&param);
        }

        out
    }

    /// Nickname part of a `nick!user@host` prefix.
    pub fn source_nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        prefix.split(['!', '@']).next().filter(|n| !n.is_empty())
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}

#[derive(Debug, PartialEq)]
pub enum ParseError {
    Empty,
    MissingCommand,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty message"),
            ParseError::MissingCommand => write!(f, "missing command"),
        }
    }
}

impl std::error::Error for ParseError {}
