use std::sync::Arc;

use crate::error::codes;
use crate::{Binary, IpcError, IpcEvent, IpcResult, OneShotRunner, ProcessLauncher, ProcessRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub public_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptOptions {
    ToPublicKey(String),
    Password(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMethod {
    PublicKey,
    Password,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptResult {
    pub encrypted_path: String,
    pub original_path: String,
    pub hash: String,
    pub method: EncryptionMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptOptions {
    SecretKey(String),
    Password(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptResult {
    pub decrypted_path: String,
    pub original_path: String,
    pub hash: String,
}

/// File encryption operations backed by the `zenc` binary. Secrets are always
/// handed over on stdin, never as arguments.
#[derive(Clone)]
pub struct ZencService {
    runner: OneShotRunner,
}

impl ZencService {
    pub fn new(launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self {
            runner: OneShotRunner::new(launcher),
        }
    }

    pub async fn generate_keypair(&self) -> IpcResult<KeyPair> {
        let event = self
            .runner
            .first_of_type(ProcessRequest::new(Binary::Zenc, ["keygen"]), "keygen")
            .await?;
        match event {
            IpcEvent::Keygen {
                public_key,
                secret_key,
            } => Ok(KeyPair {
                public_key,
                secret_key,
            }),
            other => Err(IpcError::execution(
                Binary::Zenc,
                codes::MISSING_EVENT,
                format!("Unexpected '{}' event in output", other.kind()),
            )),
        }
    }

    pub async fn encrypt_file(
        &self,
        file_path: &str,
        options: &EncryptOptions,
    ) -> IpcResult<EncryptResult> {
        let mut request = ProcessRequest::new(Binary::Zenc, ["encrypt", file_path]);
        let method = match options {
            EncryptOptions::ToPublicKey(public_key) if !public_key.is_empty() => {
                request.args.push("--to".to_owned());
                request.args.push(public_key.clone());
                EncryptionMethod::PublicKey
            }
            EncryptOptions::Password(password) if !password.is_empty() => {
                request.args.push("--password".to_owned());
                request = request.with_stdin(password.clone());
                EncryptionMethod::Password
            }
            _ => {
                return Err(IpcError::execution(
                    Binary::Zenc,
                    codes::MISSING_OPTION,
                    "Either toPublicKey or password must be provided",
                ))
            }
        };

        let (output, hash) = done_fields(self.runner.terminal(request).await?);
        Ok(EncryptResult {
            encrypted_path: output,
            original_path: file_path.to_owned(),
            hash,
            method,
        })
    }

    pub async fn decrypt_file(
        &self,
        file_path: &str,
        options: &DecryptOptions,
    ) -> IpcResult<DecryptResult> {
        let secret = match options {
            DecryptOptions::SecretKey(secret) | DecryptOptions::Password(secret) => secret,
        };
        if secret.is_empty() {
            return Err(IpcError::execution(
                Binary::Zenc,
                codes::MISSING_OPTION,
                "Either secretKey or password must be provided",
            ));
        }

        let request =
            ProcessRequest::new(Binary::Zenc, ["decrypt", file_path]).with_stdin(secret.clone());
        let (output, hash) = done_fields(self.runner.terminal(request).await?);
        Ok(DecryptResult {
            decrypted_path: output,
            original_path: file_path.to_owned(),
            hash,
        })
    }
}

fn done_fields(event: IpcEvent) -> (String, String) {
    match event {
        IpcEvent::Done { output, hash } => (output, hash),
        _ => (String::new(), String::new()),
    }
}
