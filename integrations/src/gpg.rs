use offsite_core::{CommandLine, Passphrase, Result, Runner};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Ciphertext name for a staged plaintext file.
pub fn encrypted_name(name: &str) -> String {
    format!("{}.gpg", name)
}

/// Symmetric encryption through `gpg`.
pub struct Encryptor {
    runner: Arc<dyn Runner>,
    program: String,
    passphrase: Passphrase,
}

impl Encryptor {
    pub fn new(runner: Arc<dyn Runner>, program: impl Into<String>, passphrase: Passphrase) -> Self {
        Self {
            runner,
            program: program.into(),
            passphrase,
        }
    }

    pub fn command(&self, dir: &Path, src: &str, dest: &str) -> CommandLine {
        CommandLine::new(&self.program)
            .args(["--batch", "--yes", "--pinentry-mode", "loopback", "--passphrase"])
            .secret_arg(self.passphrase.expose())
            .args(["--output", dest, "--symmetric", src])
            .current_dir(dir)
    }

    /// Encrypts `src` into `dest`, both relative to `dir`.
    pub async fn encrypt(&self, dir: &Path, src: &str, dest: &str) -> Result<()> {
        info!("Encrypting {} into {}", src, dest);
        self.runner
            .run(&self.command(dir, src, dest))
            .await?
            .check(&self.program)?;
        Ok(())
    }
}
