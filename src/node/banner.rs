//! Startup banner scraping
//!
//! The node announces its funded dev accounts on stdout before it starts
//! listening. Matching is line-oriented and isolated behind [`BannerMatcher`]
//! because the format belongs to the external tool, not to us.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::{AsyncBufRead, Lines};

/// A recognized banner line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BannerLine {
    PrivateKey(String),
    Address(String),
    Ready,
}

/// Turns one output line into a banner event
pub trait BannerMatcher: Send + Sync {
    fn match_line(&self, line: &str) -> Option<BannerLine>;
}

/// Anvil's banner: `(0) 0x<address> (<balance> ETH)`, `(0) 0x<key>`, `Listening on <addr>`
#[derive(Debug, Clone, Copy, Default)]
pub struct AnvilBanner;

fn key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(0\)\s+(0x[a-fA-F0-9]{64})\b").expect("static regex"))
}

fn address_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(0\)\s+(0x[a-fA-F0-9]{40})\s+\(").expect("static regex"))
}

impl BannerMatcher for AnvilBanner {
    fn match_line(&self, line: &str) -> Option<BannerLine> {
        if line.contains("Listening on") {
            return Some(BannerLine::Ready);
        }
        if let Some(c) = key_re().captures(line) {
            return Some(BannerLine::PrivateKey(c[1].to_string()));
        }
        address_re()
            .captures(line)
            .map(|c| BannerLine::Address(c[1].to_string()))
    }
}

/// What the banner gave us
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub private_key: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Ready(Banner),
    /// Both streams closed without a key; carries stderr
    Closed { errors: Vec<String> },
    /// Deadline passed without a key
    TimedOut,
}

/// Read stdout and stderr until a key has been captured.
///
/// The ready line ends the scan early. Otherwise a captured key is enough once
/// both streams close or `deadline` passes. First match wins for key and address.
pub async fn scan<M, O, E>(
    matcher: &M,
    stdout: &mut Lines<O>,
    stderr: &mut Lines<E>,
    deadline: Duration,
) -> ScanOutcome
where
    M: BannerMatcher + ?Sized,
    O: AsyncBufRead + Unpin,
    E: AsyncBufRead + Unpin,
{
    let mut private_key: Option<String> = None;
    let mut address: Option<String> = None;
    let mut errors = Vec::new();
    let (mut out_open, mut err_open) = (true, true);

    let timer = tokio::time::sleep(deadline);
    tokio::pin!(timer);

    loop {
        if !out_open && !err_open {
            return match private_key {
                Some(private_key) => ScanOutcome::Ready(Banner { private_key, address }),
                None => ScanOutcome::Closed { errors },
            };
        }

        let line = tokio::select! {
            line = stdout.next_line(), if out_open => match line {
                Ok(Some(line)) => line,
                _ => { out_open = false; continue; }
            },
            line = stderr.next_line(), if err_open => match line {
                Ok(Some(line)) => { errors.push(line.clone()); line }
                _ => { err_open = false; continue; }
            },
            _ = &mut timer => {
                return match private_key {
                    Some(private_key) => {
                        tracing::debug!("No ready line before the deadline, using captured key");
                        ScanOutcome::Ready(Banner { private_key, address })
                    }
                    None => ScanOutcome::TimedOut,
                };
            }
        };
        tracing::trace!(target: "crybro::node", "{}", line);

        match matcher.match_line(&line) {
            Some(BannerLine::PrivateKey(key)) if private_key.is_none() => private_key = Some(key),
            Some(BannerLine::Address(addr)) if address.is_none() => address = Some(addr),
            Some(BannerLine::Ready) => {
                if let Some(private_key) = private_key.take() {
                    return ScanOutcome::Ready(Banner { private_key, address });
                }
                tracing::warn!("Node reported ready before printing a private key");
            }
            _ => {}
        }
    }
}

/// Whether the node's error output points at a port conflict
pub fn mentions_port_in_use(errors: &[String]) -> bool {
    errors.iter().any(|l| l.to_ascii_lowercase().contains("in use"))
}

/// Keep reading node output after startup so the node never blocks on a full pipe.
pub async fn drain<O, E>(mut stdout: Lines<O>, mut stderr: Lines<E>)
where
    O: AsyncBufRead + Unpin,
    E: AsyncBufRead + Unpin,
{
    let (mut out_open, mut err_open) = (true, true);
    loop {
        tokio::select! {
            line = stdout.next_line(), if out_open => match line {
                Ok(Some(line)) => tracing::debug!(target: "crybro::node", "{}", line),
                _ => out_open = false,
            },
            line = stderr.next_line(), if err_open => match line {
                Ok(Some(line)) => tracing::debug!(target: "crybro::node", "stderr: {}", line),
                _ => err_open = false,
            },
            else => break,
        }
    }
}
