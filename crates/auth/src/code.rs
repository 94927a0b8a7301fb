//! SMS verification codes.
//!
//! Delivery is behind the [`CodeSender`] trait. Two senders ship with the
//! crate: [`StaticCodeSender`] accepts one fixed development code, and
//! [`MemoryCodeSender`] issues random single-use codes that it logs instead
//! of texting.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// How long an issued code stays valid.
pub const CODE_TTL: Duration = Duration::from_secs(300);

/// Development code accepted by [`StaticCodeSender::default`].
pub const DEFAULT_STATIC_CODE: &str = "123456";

/// What a code will be used for. Codes only verify for the purpose they were sent for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodePurpose {
    Register,
    Login,
    Reset,
}

impl CodePurpose {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "register" => Some(CodePurpose::Register),
            "login" => Some(CodePurpose::Login),
            "reset" => Some(CodePurpose::Reset),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CodePurpose::Register => "register",
            CodePurpose::Login => "login",
            CodePurpose::Reset => "reset",
        }
    }
}

/// Receipt for a dispatched code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeDispatch {
    /// Seconds until the code expires.
    pub expires_in: u64,
}

/// Sends and checks verification codes.
#[async_trait]
pub trait CodeSender: Send + Sync {
    /// Dispatch a code to `phone`.
    async fn send(&self, phone: &str, purpose: CodePurpose) -> Result<CodeDispatch>;

    /// Check a code. A successful check may consume it.
    async fn verify(&self, phone: &str, purpose: CodePurpose, code: &str) -> Result<bool>;

    /// Sender name, for logs.
    fn name(&self) -> &str;
}

/// Accepts a single fixed code for every phone and purpose.
#[derive(Debug, Clone)]
pub struct StaticCodeSender {
    code: String,
}

impl StaticCodeSender {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

impl Default for StaticCodeSender {
    fn default() -> Self {
        Self::new(DEFAULT_STATIC_CODE)
    }
}

#[async_trait]
impl CodeSender for StaticCodeSender {
    async fn send(&self, phone: &str, purpose: CodePurpose) -> Result<CodeDispatch> {
        info!(phone, purpose = purpose.as_str(), "Static verification code in use, nothing sent");
        Ok(CodeDispatch {
            expires_in: CODE_TTL.as_secs(),
        })
    }

    async fn verify(&self, _phone: &str, _purpose: CodePurpose, code: &str) -> Result<bool> {
        Ok(code == self.code)
    }

    fn name(&self) -> &str {
        "StaticCodeSender"
    }
}

/// Random six-digit codes held in memory, single use, expiring after a TTL.
#[derive(Debug)]
pub struct MemoryCodeSender {
    ttl: Duration,
    codes: Mutex<HashMap<(String, CodePurpose), (String, Instant)>>,
}

impl MemoryCodeSender {
    pub fn new() -> Self {
        Self::with_ttl(CODE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            codes: Mutex::new(HashMap::new()),
        }
    }

    /// The code currently pending for a phone, if any.
    pub fn pending_code(&self, phone: &str, purpose: CodePurpose) -> Option<String> {
        let codes = self.codes.lock().unwrap_or_else(|e| e.into_inner());
        codes
            .get(&(phone.to_string(), purpose))
            .filter(|(_, issued)| issued.elapsed() < self.ttl)
            .map(|(code, _)| code.clone())
    }
}

impl Default for MemoryCodeSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CodeSender for MemoryCodeSender {
    async fn send(&self, phone: &str, purpose: CodePurpose) -> Result<CodeDispatch> {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));

        {
            let mut codes = self.codes.lock().unwrap_or_else(|e| e.into_inner());
            let ttl = self.ttl;
            codes.retain(|_, (_, issued)| issued.elapsed() < ttl);
            codes.insert((phone.to_string(), purpose), (code.clone(), Instant::now()));
        }

        info!(phone, purpose = purpose.as_str(), code = %code, "Simulated SMS delivery");
        Ok(CodeDispatch {
            expires_in: self.ttl.as_secs(),
        })
    }

    async fn verify(&self, phone: &str, purpose: CodePurpose, code: &str) -> Result<bool> {
        let mut codes = self.codes.lock().unwrap_or_else(|e| e.into_inner());
        let key = (phone.to_string(), purpose);

        let matches = codes
            .get(&key)
            .is_some_and(|(expected, issued)| issued.elapsed() < self.ttl && expected == code);

        if matches {
            codes.remove(&key);
        }

        Ok(matches)
    }

    fn name(&self) -> &str {
        "MemoryCodeSender"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_sender() {
        let sender = StaticCodeSender::default();
        let dispatch = sender.send("13800138000", CodePurpose::Register).await.unwrap();
        assert_eq!(dispatch.expires_in, 300);

        assert!(sender.verify("13800138000", CodePurpose::Login, "123456").await.unwrap());
        // Static codes can be reused.
        assert!(sender.verify("13800138000", CodePurpose::Login, "123456").await.unwrap());
        assert!(!sender.verify("13800138000", CodePurpose::Login, "654321").await.unwrap());
        assert_eq!(sender.name(), "StaticCodeSender");
    }

    #[tokio::test]
    async fn test_memory_sender_single_use() {
        let sender = MemoryCodeSender::new();
        sender.send("13800138000", CodePurpose::Login).await.unwrap();
        let code = sender.pending_code("13800138000", CodePurpose::Login).unwrap();
        assert_eq!(code.len(), 6);

        // Wrong purpose and wrong phone do not consume the code.
        assert!(!sender.verify("13800138000", CodePurpose::Register, &code).await.unwrap());
        assert!(!sender.verify("13900139000", CodePurpose::Login, &code).await.unwrap());

        assert!(sender.verify("13800138000", CodePurpose::Login, &code).await.unwrap());
        assert!(!sender.verify("13800138000", CodePurpose::Login, &code).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_sender_expiry() {
        let sender = MemoryCodeSender::with_ttl(Duration::from_millis(20));
        sender.send("13800138000", CodePurpose::Reset).await.unwrap();
        let code = sender.pending_code("13800138000", CodePurpose::Reset).unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(sender.pending_code("13800138000", CodePurpose::Reset).is_none());
        assert!(!sender.verify("13800138000", CodePurpose::Reset, &code).await.unwrap());
    }

    #[tokio::test]
    async fn test_resend_replaces_code() {
        let sender = MemoryCodeSender::new();
        sender.send("13800138000", CodePurpose::Login).await.unwrap();
        let first = sender.pending_code("13800138000", CodePurpose::Login).unwrap();
        sender.send("13800138000", CodePurpose::Login).await.unwrap();
        let second = sender.pending_code("13800138000", CodePurpose::Login).unwrap();

        if first != second {
            assert!(!sender.verify("13800138000", CodePurpose::Login, &first).await.unwrap());
        }
        assert!(sender.verify("13800138000", CodePurpose::Login, &second).await.unwrap());
    }

    #[test]
    fn test_purpose_parse() {
        assert_eq!(CodePurpose::parse("register"), Some(CodePurpose::Register));
        assert_eq!(CodePurpose::parse("RESET"), None);
        assert_eq!(CodePurpose::Login.as_str(), "login");
    }
}
