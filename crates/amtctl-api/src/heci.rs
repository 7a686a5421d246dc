//! PTHI client over the Intel MEI host interface.
//!
//! The MEI driver exposes the management engine as a character device.
//! Once the descriptor is connected to the AMT PTHI firmware client, each
//! `write` carries one request and each `read` returns one whole response.
//! Only the local system account query is implemented here; everything
//! else goes through WS-Management.
//!
//! ```rust,ignore
//! let mut pthi = heci::open_pthi(Path::new(DEFAULT_MEI_DEVICE))?;
//! let account = pthi.local_system_account()?;
//! ```

use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use secrecy::SecretString;
use tracing::{debug, trace};

use crate::error::Error;

pub const DEFAULT_MEI_DEVICE: &str = "/dev/mei0";

/// `12f80028-b4b7-4b2d-aca8-46e0ff65814c` in the driver's `uuid_le` layout.
pub const PTHI_CLIENT_GUID: [u8; 16] = [
    0x28, 0x00, 0xf8, 0x12, 0xb7, 0xb4, 0x2d, 0x4b, 0xac, 0xa8, 0x46, 0xe0, 0xff, 0x65, 0x81, 0x4c,
];

const GET_LOCAL_SYSTEM_ACCOUNT_REQUEST: u32 = 0x0400_0067;
const GET_LOCAL_SYSTEM_ACCOUNT_RESPONSE: u32 = 0x0480_0067;

const HEADER_LEN: usize = 12;
const STATUS_LEN: usize = 4;
const REQUEST_RESERVED_LEN: usize = 40;
/// Username and password are each a NUL-terminated 32 byte string.
const ACCOUNT_FIELD_LEN: usize = 33;
const ACCOUNT_RESPONSE_LEN: usize = HEADER_LEN + STATUS_LEN + 2 * ACCOUNT_FIELD_LEN;

const STATUS_SUCCESS: u32 = 0;

// ── Account ──────────────────────────────────────────────────────────

/// The account the firmware reserves for software running on the host.
pub struct LocalSystemAccount {
    pub username: String,
    pub password: SecretString,
}

impl fmt::Debug for LocalSystemAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSystemAccount")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

// ── Codec ────────────────────────────────────────────────────────────

fn header(command: u32, length: usize) -> [u8; HEADER_LEN] {
    let length = u32::try_from(length).unwrap_or(u32::MAX);
    let mut out = [0u8; HEADER_LEN];
    out[0] = 1; // major
    out[1] = 1; // minor
    out[4..8].copy_from_slice(&command.to_le_bytes());
    out[8..12].copy_from_slice(&length.to_le_bytes());
    out
}

/// `GetLocalSystemAccount` request: header plus 40 reserved zero bytes.
pub fn encode_local_system_account_request() -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + REQUEST_RESERVED_LEN);
    out.extend_from_slice(&header(GET_LOCAL_SYSTEM_ACCOUNT_REQUEST, REQUEST_RESERVED_LEN));
    out.resize(HEADER_LEN + REQUEST_RESERVED_LEN, 0);
    out
}

fn read_u32(frame: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&frame[at..at + 4]);
    u32::from_le_bytes(word)
}

/// A fixed-width field up to its first NUL.
fn c_string(field: &[u8], name: &str) -> Result<String, Error> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8(field[..end].to_vec()).map_err(|_| Error::Pthi {
        message: format!("{name} is not valid UTF-8"),
    })
}

/// Parse a `GetLocalSystemAccount` response.
pub fn decode_local_system_account(frame: &[u8]) -> Result<LocalSystemAccount, Error> {
    if frame.len() < HEADER_LEN + STATUS_LEN {
        return Err(Error::Pthi {
            message: format!("{} byte response is shorter than its header", frame.len()),
        });
    }
    let command = read_u32(frame, 4);
    if command != GET_LOCAL_SYSTEM_ACCOUNT_RESPONSE {
        return Err(Error::Pthi {
            message: format!("unexpected command {command:#010x} in response"),
        });
    }
    let status = read_u32(frame, HEADER_LEN);
    if status != STATUS_SUCCESS {
        return Err(Error::PthiStatus { status });
    }
    if frame.len() < ACCOUNT_RESPONSE_LEN {
        return Err(Error::Pthi {
            message: format!("account response truncated at {} bytes", frame.len()),
        });
    }

    let fields = &frame[HEADER_LEN + STATUS_LEN..ACCOUNT_RESPONSE_LEN];
    let (user, pass) = fields.split_at(ACCOUNT_FIELD_LEN);
    let username = c_string(user, "username")?;
    if username.is_empty() {
        return Err(Error::Pthi {
            message: "firmware returned an empty system account".into(),
        });
    }
    Ok(LocalSystemAccount {
        username,
        password: SecretString::from(c_string(pass, "password")?),
    })
}

// ── Client ───────────────────────────────────────────────────────────

/// A host interface handle connected to the PTHI client.
pub struct PthiClient<T> {
    transport: T,
    max_message_len: usize,
}

impl<T: Read + Write> PthiClient<T> {
    /// `max_message_len` is what the driver reported when connecting.
    pub fn new(transport: T, max_message_len: usize) -> Self {
        Self {
            transport,
            max_message_len,
        }
    }

    fn call(&mut self, request: &[u8]) -> Result<Vec<u8>, Error> {
        trace!(bytes = request.len(), "PTHI request");
        self.transport.write_all(request).map_err(Error::HostInterface)?;
        let mut buf = vec![0u8; self.max_message_len.max(ACCOUNT_RESPONSE_LEN)];
        let n = self.transport.read(&mut buf).map_err(Error::HostInterface)?;
        buf.truncate(n);
        trace!(bytes = n, "PTHI response");
        Ok(buf)
    }

    /// Ask the firmware for the local system account.
    pub fn local_system_account(&mut self) -> Result<LocalSystemAccount, Error> {
        let response = self.call(&encode_local_system_account_request())?;
        let account = decode_local_system_account(&response)?;
        debug!(username = %account.username, "received local system account");
        Ok(account)
    }
}

/// Open `device` and connect it to the PTHI client.
#[cfg(target_os = "linux")]
pub fn open_pthi(device: &Path) -> Result<PthiClient<File>, Error> {
    let mei = |source| Error::Mei {
        device: device.display().to_string(),
        source,
    };
    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(device)
        .map_err(mei)?;
    let max_message_len = sys::connect_client(&file, &PTHI_CLIENT_GUID).map_err(mei)?;
    debug!(device = %device.display(), max_message_len, "connected to PTHI client");
    let max_message_len = usize::try_from(max_message_len).unwrap_or(ACCOUNT_RESPONSE_LEN);
    Ok(PthiClient::new(file, max_message_len))
}

#[cfg(not(target_os = "linux"))]
pub fn open_pthi(_device: &Path) -> Result<PthiClient<File>, Error> {
    Err(Error::Unsupported("the AMT host interface on this platform"))
}

#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
mod sys {
    use std::fs::File;
    use std::io;
    use std::os::fd::AsRawFd;

    /// `struct mei_connect_client_data`: the client GUID going in, the
    /// client properties coming out.
    #[repr(C)]
    pub struct ConnectClientData {
        data: [u8; 16],
    }

    nix::ioctl_readwrite!(mei_connect_client, b'H', 0x01, ConnectClientData);

    /// Bind `file` to firmware client `guid`; returns its maximum message length.
    pub fn connect_client(file: &File, guid: &[u8; 16]) -> io::Result<u32> {
        let mut data = ConnectClientData { data: *guid };
        // SAFETY: `data` is a live repr(C) buffer of the size the ioctl encodes,
        // and the descriptor stays open for the duration of the call.
        unsafe { mei_connect_client(file.as_raw_fd(), &mut data) }.map_err(io::Error::from)?;
        let [a, b, c, d, ..] = data.data;
        Ok(u32::from_ne_bytes([a, b, c, d]))
    }
}
