//! Test server management.
//!
//! Spawns and manages dropoffd instances for integration testing.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// A running dropoffd instance.
pub struct TestServer {
    child: Child,
    port: u16,
    _data_dir: TempDir,
}

impl TestServer {
    /// Spawn dropoffd trusting `issuer`, with one grant for subject `abc`.
    pub async fn spawn(issuer: &str) -> anyhow::Result<Self> {
        let port = free_port()?;
        let data_dir = tempfile::tempdir()?;
        let config_path = write_config(data_dir.path(), port, issuer)?;

        let child = Command::new(env!("CARGO_BIN_EXE_dropoffd"))
            .arg(&config_path)
            .env("RUST_LOG", "warn")
            .env_remove("DROPOFF_AUTH_ISSUER")
            .env_remove("DROPOFF_AUTH_AUDIENCE")
            .stdout(Stdio::null())
            .spawn()?;

        let server = Self {
            child,
            port,
            _data_dir: data_dir,
        };
        server.wait_until_ready().await?;
        Ok(server)
    }

    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port))
                .await
                .is_ok()
            {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Server failed to start within 5 seconds")
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Write a minimal config into `dir` and return its path.
pub fn write_config(dir: &Path, port: u16, issuer: &str) -> anyhow::Result<PathBuf> {
    let config_path = dir.join("config.toml");
    let content = format!(
        r#"
[server]
name = "dropoffd-test"
metrics_port = 0

[listen]
address = "127.0.0.1:{port}"

[database]
path = "{db}"

[auth]
issuer = "{issuer}"
audience = "{audience}"
jwks_retry_backoff_ms = 10

[[seed.grants]]
subject = "abc"
name = "Fidalgo"
point = "DETI"
"#,
        db = dir.join("dropoff.db").display(),
        audience = super::idp::AUDIENCE,
    );
    std::fs::write(&config_path, content)?;
    Ok(config_path)
}
