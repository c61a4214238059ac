// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Shell-like tokenization of status/command bodies (`spec` §4.4): space
separated tokens, double- and single-quoted strings handled the way a
POSIX shell would, plus `key=value` lookup helpers.
*/

use crate::errors::Error;

/// Splits a status or command body into shell-like tokens.
pub fn tokenize(body: &str) -> Result<Vec<String>, Error> {
    shell_words::split(body).map_err(|e| Error::MalformedFrame(format!("{body:?}: {e}")))
}

/// Returns the value of the first `key=value` token matching `key`, or
/// `"absent"` if none matches (`spec` §4.4).
pub fn find_kwarg<'a>(argv: &'a [String], key: &str) -> &'a str {
    for tok in argv {
        if let Some((k, v)) = tok.split_once('=') {
            if k == key {
                return v;
            }
        }
    }
    "absent"
}

/// Like [`find_kwarg`], but additionally parses the value as an unsigned
/// integer in decimal or hex (`0x` prefix). Returns `None` if the key is
/// absent or the value doesn't parse.
pub fn find_kwarg_as_int(argv: &[String], key: &str) -> Option<u64> {
    let value = find_kwarg(argv, key);
    if value == "absent" {
        return None;
    }
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    }
}
