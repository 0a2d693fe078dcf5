//! Connection and statement configuration.

use crate::error::{Error, Result};
use crate::protocol::constants::*;
use base64::Engine;
use rand::RngCore;
use std::time::Duration;
use zeroize::Zeroize;

/// Replace characters that would break the bracketed connect-string
/// syntax.
pub(crate) fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '(' | ')' | '=' => '?',
            other => other,
        })
        .collect()
}

/// The service to connect to: a service name or a system identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceId {
    /// SERVICE_NAME entry.
    ServiceName(String),
    /// SID entry.
    Sid(String),
}

impl ServiceId {
    /// The raw service string.
    pub fn as_str(&self) -> &str {
        match self {
            ServiceId::ServiceName(s) | ServiceId::Sid(s) => s,
        }
    }

    fn connect_data_entry(&self) -> String {
        match self {
            ServiceId::ServiceName(s) => format!("(SERVICE_NAME={})", s),
            ServiceId::Sid(s) => format!("(SID={})", s),
        }
    }
}

/// Authorization mode flags for administrative sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Ordinary session.
    #[default]
    Default,
    /// SYSDBA role.
    SysDba,
    /// SYSOPER role.
    SysOper,
    /// SYSASM role.
    SysAsm,
    /// SYSBACKUP role.
    SysBkp,
    /// SYSDG role.
    SysDgd,
    /// SYSKM role.
    SysKmt,
    /// SYSRAC role.
    SysRac,
}

impl AuthMode {
    /// The TTC authentication mode bits for this role.
    pub fn mode_bits(&self) -> u32 {
        match self {
            AuthMode::Default => 0,
            AuthMode::SysDba => TNS_AUTH_MODE_SYSDBA,
            AuthMode::SysOper => TNS_AUTH_MODE_SYSOPER,
            AuthMode::SysAsm => TNS_AUTH_MODE_SYSASM,
            AuthMode::SysBkp => TNS_AUTH_MODE_SYSBKP,
            AuthMode::SysDgd => TNS_AUTH_MODE_SYSDGD,
            AuthMode::SysKmt => TNS_AUTH_MODE_SYSKMT,
            AuthMode::SysRac => TNS_AUTH_MODE_SYSRAC,
        }
    }
}

/// DRCP session purity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Purity {
    /// Let the server decide.
    #[default]
    Default,
    /// A brand-new session is required.
    New,
    /// A pooled session may be reused.
    SelfPurity,
}

impl Purity {
    /// The wire value, or `None` when the default needs no mention.
    pub fn wire_value(&self) -> Option<u32> {
        match self {
            Purity::Default => None,
            Purity::New => Some(1),
            Purity::SelfPurity => Some(2),
        }
    }
}

/// Credentials and session role for authentication.
#[derive(Clone)]
pub struct AuthParams {
    /// Username.
    pub username: String,
    /// Password or token secret.
    pub password: String,
    /// Replacement password, requesting a password change at logon.
    pub new_password: Option<String>,
    /// Administrative role.
    pub mode: AuthMode,
    /// DRCP purity.
    pub purity: Purity,
}

impl AuthParams {
    /// Create username/password credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            new_password: None,
            mode: AuthMode::Default,
            purity: Purity::Default,
        }
    }

    /// Request a password change at logon.
    pub fn with_new_password(mut self, new_password: impl Into<String>) -> Self {
        self.new_password = Some(new_password.into());
        self
    }

    /// Select an administrative role.
    pub fn with_mode(mut self, mode: AuthMode) -> Self {
        self.mode = mode;
        self
    }

    /// Select a DRCP purity.
    pub fn with_purity(mut self, purity: Purity) -> Self {
        self.purity = purity;
        self
    }

    /// Wipe held secrets once the handshake is done. The plaintext is
    /// zeroed in place, not just dropped.
    pub(crate) fn clear_secrets(&mut self) {
        self.password.zeroize();
        if let Some(np) = self.new_password.as_mut() {
            np.zeroize();
        }
    }
}

impl std::fmt::Debug for AuthParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthParams")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("new_password", &self.new_password.as_ref().map(|_| "<redacted>"))
            .field("mode", &self.mode)
            .field("purity", &self.purity)
            .finish()
    }
}

/// Connection parameters.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// Host address.
    pub host: String,
    /// Port number.
    pub port: u16,
    /// Service name or SID.
    pub service: ServiceId,
    /// SDU (Session Data Unit) size to request.
    pub sdu: u32,
    /// TCP connection timeout.
    pub connect_timeout: Duration,
    /// Connect attempts after the first failure.
    pub retry_count: u32,
    /// Delay between connect attempts.
    pub retry_delay: Duration,
    /// Optional prefix for the generated connection id.
    pub connection_id_prefix: Option<String>,
    /// Program name reported in the CID.
    pub program: String,
    /// Machine name reported in the CID.
    pub machine: String,
    /// OS username reported in the CID.
    pub osuser: String,
    /// Process id reported during authentication.
    pub pid: u32,
    /// Session timezone override (e.g. "+02:00"); local offset otherwise.
    pub timezone: Option<String>,
    /// Whether the address uses TLS (`tcps`). Wrapping the stream is the
    /// caller's concern; this only changes the connect string.
    pub use_tls: bool,
}

impl ConnectParams {
    /// Create new connection parameters for a service name.
    pub fn new(host: impl Into<String>, port: u16, service_name: impl Into<String>) -> Self {
        let machine = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "localhost".to_string());
        Self {
            host: host.into(),
            port,
            service: ServiceId::ServiceName(service_name.into()),
            sdu: TNS_SDU_DEFAULT,
            connect_timeout: Duration::from_secs(10),
            retry_count: 0,
            retry_delay: Duration::from_secs(1),
            connection_id_prefix: None,
            program: sanitize("orathin"),
            machine: sanitize(&machine),
            osuser: sanitize(&whoami::username()),
            pid: std::process::id(),
            timezone: None,
            use_tls: false,
        }
    }

    /// Use a SID instead of a service name.
    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.service = ServiceId::Sid(sid.into());
        self
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set connect retries and the delay between them.
    pub fn with_retries(mut self, count: u32, delay: Duration) -> Self {
        self.retry_count = count;
        self.retry_delay = delay;
        self
    }

    /// Set a prefix for the generated connection id.
    pub fn with_connection_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.connection_id_prefix = Some(sanitize(&prefix.into()));
        self
    }

    /// Set the program name reported to the server.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = sanitize(&program.into());
        self
    }

    /// Set the session timezone (e.g. "+02:00").
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// Parse a connection string like "host:port/service_name".
    pub fn parse(conn_str: &str) -> Result<Self> {
        let (addr_part, service_name) =
            conn_str
                .split_once('/')
                .ok_or_else(|| Error::InvalidConnectString {
                    message: "Expected format: host:port/service_name".to_string(),
                })?;

        let (host, port) = if let Some((h, p)) = addr_part.split_once(':') {
            let port = p.parse::<u16>().map_err(|_| Error::InvalidConnectString {
                message: format!("Invalid port: {}", p),
            })?;
            (h.to_string(), port)
        } else {
            (addr_part.to_string(), 1521)
        };

        Ok(Self::new(host, port, service_name))
    }

    /// Build the connect descriptor string.
    pub fn build_connect_string(&self) -> String {
        let mut connection_id_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut connection_id_bytes);
        let mut connection_id =
            base64::engine::general_purpose::STANDARD.encode(connection_id_bytes);
        if let Some(prefix) = &self.connection_id_prefix {
            connection_id = format!("{}{}", prefix, connection_id);
        }

        let protocol = if self.use_tls { "tcps" } else { "tcp" };

        format!(
            "(DESCRIPTION=(ADDRESS=(PROTOCOL={})(HOST={})(PORT={}))(CONNECT_DATA={}(CID=(PROGRAM={})(HOST={})(USER={}))(CONNECTION_ID={})))",
            protocol,
            self.host,
            self.port,
            self.service.connect_data_entry(),
            self.program,
            self.machine,
            self.osuser,
            connection_id
        )
    }
}

/// Per-statement execution options.
#[derive(Debug, Clone)]
pub struct StatementOptions {
    /// Commit automatically after each DML execution.
    pub auto_commit: bool,
    /// Request per-statement row counts for batch DML.
    pub array_dml_row_counts: bool,
    /// Collect per-row errors from a batch instead of failing it.
    pub batch_errors: bool,
    /// Rows returned with the execute response.
    pub prefetch_rows: u32,
    /// Rows per subsequent fetch round trip.
    pub array_size: u32,
    /// Fetch LOB columns as locators instead of inline bytes.
    pub fetch_lobs: bool,
}

impl Default for StatementOptions {
    fn default() -> Self {
        Self {
            auto_commit: false,
            array_dml_row_counts: false,
            batch_errors: false,
            prefetch_rows: 2,
            array_size: 50,
            fetch_lobs: false,
        }
    }
}

impl StatementOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prefetch row count. Using `array_size + 1` avoids the
    /// trailing round trip when the result size is known and bounded.
    pub fn with_prefetch_rows(mut self, rows: u32) -> Self {
        self.prefetch_rows = rows;
        self
    }

    /// Set the fetch array size.
    pub fn with_array_size(mut self, size: u32) -> Self {
        self.array_size = size;
        self
    }

    /// Enable auto-commit.
    pub fn with_auto_commit(mut self, on: bool) -> Self {
        self.auto_commit = on;
        self
    }

    /// Request per-statement DML row counts for batches.
    pub fn with_array_dml_row_counts(mut self, on: bool) -> Self {
        self.array_dml_row_counts = on;
        self
    }

    /// Collect per-row batch errors instead of failing the batch.
    pub fn with_batch_errors(mut self, on: bool) -> Self {
        self.batch_errors = on;
        self
    }

    /// Fetch LOBs as locators rather than inline bytes.
    pub fn with_fetch_lobs(mut self, on: bool) -> Self {
        self.fetch_lobs = on;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_params_parse() {
        let params = ConnectParams::parse("localhost:1521/FREEPDB1").unwrap();
        assert_eq!(params.host, "localhost");
        assert_eq!(params.port, 1521);
        assert_eq!(params.service.as_str(), "FREEPDB1");

        let params = ConnectParams::parse("localhost/ORCL").unwrap();
        assert_eq!(params.port, 1521);
    }

    #[test]
    fn test_connect_string_build() {
        let params = ConnectParams::new("myhost", 1521, "MYSERVICE");
        let cs = params.build_connect_string();
        assert!(cs.contains("(PROTOCOL=tcp)"));
        assert!(cs.contains("HOST=myhost"));
        assert!(cs.contains("PORT=1521"));
        assert!(cs.contains("SERVICE_NAME=MYSERVICE"));
        assert!(cs.contains("CONNECTION_ID="));
    }

    #[test]
    fn test_connect_string_sid() {
        let params = ConnectParams::new("myhost", 1521, "ignored").with_sid("XE");
        let cs = params.build_connect_string();
        assert!(cs.contains("(SID=XE)"));
        assert!(!cs.contains("SERVICE_NAME"));
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a(b)c=d"), "a?b?c?d");
        assert_eq!(sanitize("plain"), "plain");
    }

    #[test]
    fn test_connection_id_prefix_sanitized() {
        let params = ConnectParams::new("h", 1521, "S").with_connection_id_prefix("p=(x)");
        assert_eq!(params.connection_id_prefix.as_deref(), Some("p???x?"));
    }

    #[test]
    fn test_auth_params_redacts_password() {
        let auth = AuthParams::new("scott", "tiger");
        let debug = format!("{:?}", auth);
        assert!(!debug.contains("tiger"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_auth_params_clear_secrets() {
        let mut auth = AuthParams::new("scott", "tiger").with_new_password("lion");
        auth.clear_secrets();
        assert!(auth.password.is_empty());
        assert_eq!(auth.new_password.as_deref(), Some(""));
    }

    #[test]
    fn test_statement_options_defaults() {
        let opts = StatementOptions::default();
        assert!(!opts.auto_commit);
        assert!(!opts.array_dml_row_counts);
        assert!(!opts.batch_errors);
        assert_eq!(opts.prefetch_rows, 2);
        assert_eq!(opts.array_size, 50);
        assert!(!opts.fetch_lobs);
    }

    #[test]
    fn test_auth_mode_bits() {
        assert_eq!(AuthMode::Default.mode_bits(), 0);
        assert_eq!(AuthMode::SysDba.mode_bits(), TNS_AUTH_MODE_SYSDBA);
        assert_eq!(AuthMode::SysRac.mode_bits(), TNS_AUTH_MODE_SYSRAC);
    }

    #[test]
    fn test_purity_wire_values() {
        assert_eq!(Purity::Default.wire_value(), None);
        assert_eq!(Purity::New.wire_value(), Some(1));
        assert_eq!(Purity::SelfPurity.wire_value(), Some(2));
    }
}
