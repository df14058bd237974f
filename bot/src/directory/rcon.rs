//! Minecraft RCON backend.
//!
//! Packets are `length | request id | type | payload | 0 0`, all integers
//! little-endian `i32`, where `length` counts everything after itself.

use super::DirectoryBackend;
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use whitelist_core::directory::DirectoryError;
use whitelist_core::request::GameAccount;

const PACKET_AUTH: i32 = 3;
const PACKET_COMMAND: i32 = 2;
const PACKET_AUTH_RESPONSE: i32 = 2;
const MAX_PAYLOAD: usize = 4096;

/// Where and how to reach the RCON listener.
#[derive(Clone)]
pub struct RconConfig {
    /// `host:port`
    pub address: String,
    /// `rcon.password` from `server.properties`
    pub password: String,
    /// Connect, read and write timeout
    pub timeout: Duration,
}

impl fmt::Debug for RconConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RconConfig")
            .field("address", &self.address)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

struct Packet {
    id: i32,
    kind: i32,
    payload: String,
}

/// Blocking RCON client; connects on first use and again after I/O errors.
#[derive(Debug)]
pub struct RconBackend {
    config: RconConfig,
    stream: Option<TcpStream>,
    next_id: i32,
}

impl RconBackend {
    /// Create a backend; no connection is made yet.
    #[must_use]
    pub const fn new(config: RconConfig) -> Self {
        Self { config, stream: None, next_id: 1 }
    }

    fn next_id(&mut self) -> i32 {
        self.next_id = self.next_id.checked_add(1).unwrap_or(1);
        self.next_id
    }

    fn connect(&mut self) -> Result<TcpStream, DirectoryError> {
        let address = self
            .config
            .address
            .to_socket_addrs()
            .map_err(connection)?
            .next()
            .ok_or_else(|| DirectoryError::Connection(format!("cannot resolve {}", self.config.address)))?;
        let mut stream = TcpStream::connect_timeout(&address, self.config.timeout).map_err(connection)?;
        stream.set_read_timeout(Some(self.config.timeout)).map_err(connection)?;
        stream.set_write_timeout(Some(self.config.timeout)).map_err(connection)?;

        let id = self.next_id();
        write_packet(&mut stream, id, PACKET_AUTH, &self.config.password).map_err(connection)?;
        // Some servers send an empty value packet before the auth response
        loop {
            let reply = read_packet(&mut stream).map_err(connection)?;
            if reply.kind != PACKET_AUTH_RESPONSE {
                continue;
            }
            if reply.id == -1 {
                return Err(DirectoryError::Authentication);
            }
            tracing::debug!(address = %self.config.address, "RCON session authenticated");
            return Ok(stream);
        }
    }

    fn exchange(&mut self, command: &str) -> Result<String, DirectoryError> {
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => self.connect()?,
        };
        let id = self.next_id();
        write_packet(&mut stream, id, PACKET_COMMAND, command).map_err(connection)?;
        let reply = read_packet(&mut stream).map_err(connection)?;
        if reply.id != id {
            return Err(DirectoryError::Protocol(format!("reply id {} for request {id}", reply.id)));
        }
        self.stream = Some(stream);
        Ok(reply.payload)
    }

    /// Run `command`, reconnecting once if the session has gone stale.
    fn run(&mut self, command: &str) -> Result<String, DirectoryError> {
        match self.exchange(command) {
            Err(DirectoryError::Connection(error)) => {
                tracing::debug!(%error, "RCON session lost, reconnecting");
                self.exchange(command)
            },
            other => other,
        }
    }
}

impl DirectoryBackend for RconBackend {
    fn is_member(&mut self, name: &str) -> Result<bool, DirectoryError> {
        let account = validated(name)?;
        let listing = self.run("whitelist list")?;
        Ok(parse_whitelist(&listing).iter().any(|member| account.matches(member)))
    }

    fn set_member(&mut self, name: &str, member: bool) -> Result<(), DirectoryError> {
        let account = validated(name)?;
        let verb = if member { "add" } else { "remove" };
        let reply = self.run(&format!("whitelist {verb} {account}"))?;
        let lowered = reply.to_ascii_lowercase();
        if lowered.contains("does not exist") || lowered.contains("unknown") || lowered.contains("incorrect") {
            return Err(DirectoryError::Protocol(reply));
        }
        Ok(())
    }
}

/// Names listed by `whitelist list`.
///
/// Accepts `There are N whitelisted player(s): a, b` and `There are no whitelisted players`.
fn parse_whitelist(reply: &str) -> Vec<&str> {
    reply
        .split_once(':')
        .map(|(_, names)| names.split(',').map(str::trim).filter(|n| !n.is_empty()).collect())
        .unwrap_or_default()
}

/// Only well-formed account names reach the server console.
fn validated(name: &str) -> Result<GameAccount, DirectoryError> {
    GameAccount::parse(name).map_err(|error| DirectoryError::Protocol(error.to_string()))
}

#[allow(clippy::needless_pass_by_value)] // Used with map_err
fn connection(error: io::Error) -> DirectoryError {
    DirectoryError::Connection(error.to_string())
}

fn write_packet(stream: &mut impl Write, id: i32, kind: i32, payload: &str) -> io::Result<()> {
    let body = payload.as_bytes();
    let length = i32::try_from(body.len() + 10)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "payload too large"))?;
    let mut frame = Vec::with_capacity(body.len() + 14);
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&id.to_le_bytes());
    frame.extend_from_slice(&kind.to_le_bytes());
    frame.extend_from_slice(body);
    frame.extend_from_slice(&[0, 0]);
    stream.write_all(&frame)?;
    stream.flush()
}

fn read_i32(stream: &mut impl Read) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_packet(stream: &mut impl Read) -> io::Result<Packet> {
    let length = usize::try_from(read_i32(stream)?)
        .ok()
        .filter(|len| (10..=MAX_PAYLOAD + 10).contains(len))
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad packet length"))?;
    let id = read_i32(stream)?;
    let kind = read_i32(stream)?;
    let mut body = vec![0u8; length - 8];
    stream.read_exact(&mut body)?;
    body.truncate(body.len() - 2);
    let payload = String::from_utf8_lossy(&body).into_owned();
    Ok(Packet { id, kind, payload })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

    use super::*;
    use std::collections::BTreeSet;
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::thread;

    /// Tiny RCON server holding a whitelist. Drops each connection after
    /// `commands_per_connection` commands.
    fn fake_server(password: &'static str, commands_per_connection: usize) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let log = Arc::new(Mutex::new(Vec::new()));
        let seen = log.clone();

        thread::spawn(move || {
            let mut whitelist = BTreeSet::<String>::new();
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { return };
                let auth = read_packet(&mut stream).unwrap();
                assert_eq!(auth.kind, PACKET_AUTH);
                write_packet(&mut stream, auth.id, 0, "").unwrap();
                if auth.payload != password {
                    write_packet(&mut stream, -1, PACKET_AUTH_RESPONSE, "").unwrap();
                    continue;
                }
                write_packet(&mut stream, auth.id, PACKET_AUTH_RESPONSE, "").unwrap();

                for _ in 0..commands_per_connection {
                    let Ok(command) = read_packet(&mut stream) else { break };
                    seen.lock().unwrap().push(command.payload.clone());
                    let words: Vec<&str> = command.payload.split(' ').collect();
                    let reply = match words.as_slice() {
                        ["whitelist", "list"] if whitelist.is_empty() => "There are no whitelisted players".to_string(),
                        ["whitelist", "list"] => format!(
                            "There are {} whitelisted player(s): {}",
                            whitelist.len(),
                            whitelist.iter().cloned().collect::<Vec<_>>().join(", ")
                        ),
                        ["whitelist", "add", name] => {
                            whitelist.insert((*name).to_string());
                            format!("Added {name} to the whitelist")
                        },
                        ["whitelist", "remove", name] => {
                            whitelist.remove(*name);
                            format!("Removed {name} from the whitelist")
                        },
                        _ => "Unknown or incomplete command".to_string(),
                    };
                    write_packet(&mut stream, command.id, 0, &reply).unwrap();
                }
            }
        });
        (address, log)
    }

    fn backend(address: String, password: &str) -> RconBackend {
        RconBackend::new(RconConfig { address, password: password.into(), timeout: Duration::from_secs(2) })
    }

    #[test]
    fn add_list_and_remove() {
        let (address, log) = fake_server("secret", usize::MAX);
        let mut rcon = backend(address, "secret");

        assert!(!rcon.is_member("Steve").unwrap());
        rcon.set_member("Steve", true).unwrap();
        rcon.set_member("Alex", true).unwrap();
        assert!(rcon.is_member("steve").unwrap());
        rcon.set_member("Steve", false).unwrap();
        assert!(!rcon.is_member("Steve").unwrap());
        assert!(rcon.is_member("ALEX").unwrap());

        assert_eq!(log.lock().unwrap()[1], "whitelist add Steve");
    }

    #[test]
    fn wrong_password_is_an_authentication_error() {
        let (address, log) = fake_server("secret", usize::MAX);
        let mut rcon = backend(address, "guess");
        assert_eq!(rcon.set_member("Steve", true), Err(DirectoryError::Authentication));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn dropped_session_is_reopened() {
        let (address, log) = fake_server("secret", 1);
        let mut rcon = backend(address, "secret");

        rcon.set_member("Steve", true).unwrap();
        // The server hung up after one command; the next call reconnects
        assert!(rcon.is_member("Steve").unwrap());
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn malformed_names_never_reach_the_console() {
        let (address, log) = fake_server("secret", usize::MAX);
        let mut rcon = backend(address, "secret");
        assert!(matches!(rcon.set_member("Steve; stop", true), Err(DirectoryError::Protocol(_))));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn unreachable_server_is_a_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);
        let mut rcon = backend(address, "secret");
        assert!(matches!(rcon.is_member("Steve"), Err(DirectoryError::Connection(_))));
    }

    #[test]
    fn whitelist_listing_parses_both_forms() {
        assert!(parse_whitelist("There are no whitelisted players").is_empty());
        assert_eq!(parse_whitelist("There are 2 whitelisted player(s): Steve, Alex"), vec!["Steve", "Alex"]);
    }
}
