// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Control channel line framing (`spec` §4.4): the tagged text frames the
radio sends, and the two outgoing command frame shapes.
*/

use crate::errors::Error;

/// One decoded line from the control channel.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Frame {
    /// `V` — API version.
    Version {
        /// Major version.
        major: u32,
        /// Minor version.
        minor: u32,
        /// Build number.
        build: u32,
        /// Sub-build number.
        sub: u32,
    },
    /// `H` — session handle.
    Handle(u32),
    /// `S` — status broadcast.
    Status {
        /// Session handle the status applies to.
        handle: u32,
        /// Raw, un-tokenized status body.
        body: String,
    },
    /// `M` — log message, forwarded verbatim to the log sink.
    Log(String),
    /// `R` — final response to a command.
    Response {
        /// Sequence number this responds to.
        sequence: u32,
        /// Response code, parsed as hex (`spec` §9).
        code: u32,
        /// Human-readable message.
        message: String,
    },
    /// `Q` — queued acknowledgement of a command.
    QueuedAck {
        /// Sequence number this responds to.
        sequence: u32,
        /// Response code, parsed as hex (`spec` §9).
        code: u32,
        /// Human-readable message.
        message: String,
    },
    /// `C` — radio-originated command.
    Command {
        /// Sequence number the radio assigned this command.
        sequence: u32,
        /// Raw, un-tokenized command body.
        body: String,
    },
}

fn malformed(line: &str) -> Error {
    Error::MalformedFrame(line.to_string())
}

/// Splits `<seq>|<code-hex>|<message>` into its three parts.
fn split_response_body(line: &str, rest: &str) -> Result<(u32, u32, String), Error> {
    let mut parts = rest.splitn(3, '|');
    let sequence: u32 = parts
        .next()
        .ok_or_else(|| malformed(line))?
        .parse()
        .map_err(|_| malformed(line))?;
    let code = u32::from_str_radix(parts.next().ok_or_else(|| malformed(line))?, 16)
        .map_err(|_| malformed(line))?;
    let message = parts.next().unwrap_or_default().to_string();
    Ok((sequence, code, message))
}

/// Parses one LF/CRLF-terminated line (terminator already stripped) from
/// the control channel.
pub fn parse_line(line: &str) -> Result<Frame, Error> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Err(malformed(line));
    }
    let tag = &line[0..1];
    let rest = &line[1..];
    match tag {
        "V" => {
            let mut fields = rest.splitn(4, '.');
            let mut next = || fields.next().ok_or_else(|| malformed(line))?.parse::<u32>().map_err(|_| malformed(line));
            Ok(Frame::Version {
                major: next()?,
                minor: next()?,
                build: next()?,
                sub: next()?,
            })
        }
        "H" => Ok(Frame::Handle(
            u32::from_str_radix(rest, 16).map_err(|_| malformed(line))?,
        )),
        "S" => {
            let (handle, body) = rest.split_once('|').ok_or_else(|| malformed(line))?;
            Ok(Frame::Status {
                handle: u32::from_str_radix(handle, 16).map_err(|_| malformed(line))?,
                body: body.to_string(),
            })
        }
        "M" => Ok(Frame::Log(rest.to_string())),
        "R" => {
            let (sequence, code, message) = split_response_body(line, rest)?;
            Ok(Frame::Response { sequence, code, message })
        }
        "Q" => {
            let (sequence, code, message) = split_response_body(line, rest)?;
            Ok(Frame::QueuedAck { sequence, code, message })
        }
        "C" => {
            let (sequence, body) = rest.split_once('|').ok_or_else(|| malformed(line))?;
            Ok(Frame::Command {
                sequence: sequence.parse().map_err(|_| malformed(line))?,
                body: body.to_string(),
            })
        }
        _ => Err(malformed(line)),
    }
}

/// Formats an immediate command frame: `C<seq>|<command>\n`.
pub fn format_command(sequence: u32, command: &str) -> String {
    format!("C{sequence}|{command}\n")
}

/// Formats a time-scheduled command frame:
/// `C<seq>|@<secs>.<usecs>|<command>\n`.
pub fn format_timed_command(sequence: u32, secs: u64, usecs: u32, command: &str) -> String {
    format!("C{sequence}|@{secs}.{usecs}|{command}\n")
}

/// Formats the hex response code sent back for a radio-originated
/// command: `0` for success, `hex(status + 0x50000000)` otherwise
/// (`spec` §4.5, S6).
pub fn ack_code(status: i32) -> u32 {
    if status == 0 {
        0
    } else {
        (status as u32).wrapping_add(0x5000_0000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_version() {
        assert_eq!(
            parse_line("V1.2.3.4\n").unwrap(),
            Frame::Version { major: 1, minor: 2, build: 3, sub: 4 }
        );
    }

    #[test]
    fn parses_handle() {
        assert_eq!(parse_line("H0000ABCD\n").unwrap(), Frame::Handle(0x0000ABCD));
    }

    #[test]
    fn parses_response_with_hex_code() {
        assert_eq!(
            parse_line("R0|00000000|ok\n").unwrap(),
            Frame::Response { sequence: 0, code: 0, message: "ok".to_string() }
        );
    }

    #[test]
    fn parses_radio_originated_command() {
        assert_eq!(
            parse_line("C99|slice 1 set mode=USB\n").unwrap(),
            Frame::Command { sequence: 99, body: "slice 1 set mode=USB".to_string() }
        );
    }

    #[test]
    fn parses_status() {
        assert_eq!(
            parse_line("S12345678|slice 1 mode=JUNK\n").unwrap(),
            Frame::Status { handle: 0x12345678, body: "slice 1 mode=JUNK".to_string() }
        );
    }

    #[test]
    fn format_command_matches_wire_grammar() {
        assert_eq!(format_command(0, "filt 0 100 3000"), "C0|filt 0 100 3000\n");
    }

    #[test]
    fn ack_code_matches_scenario_s6() {
        assert_eq!(ack_code(0), 0);
        assert_eq!(ack_code(7), 0x5000_0007);
    }

    #[test]
    fn unknown_tag_is_malformed() {
        assert!(parse_line("Zgarbage\n").is_err());
    }
}
