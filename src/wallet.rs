//! Wallet management module
//!
//! Loads the master keypair, generates the ephemeral trading wallets, and
//! persists their keys so an interrupted run can still be gathered.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Wallet manager for the master keypair.
pub struct WalletManager {
    keypair: Arc<Keypair>,
}

impl WalletManager {
    /// Create a new wallet manager from a keypair file.
    ///
    /// Accepts the raw 64-byte format or the JSON byte-array format.
    pub fn from_file(path: &str) -> Result<Self> {
        let keypair_bytes =
            std::fs::read(path).with_context(|| format!("Failed to read keypair file: {}", path))?;

        let keypair = if keypair_bytes.len() == 64 {
            // Raw bytes format - validate before conversion
            if keypair_bytes.iter().all(|&b| b == 0) {
                anyhow::bail!("Invalid keypair: all-zero key rejected");
            }
            Keypair::try_from(keypair_bytes.as_slice()).context("Invalid keypair bytes")?
        } else {
            // JSON format
            let json: Vec<u8> = serde_json::from_slice(&keypair_bytes)
                .context("Failed to parse keypair JSON")?;
            if json.len() != 64 {
                anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", json.len());
            }
            if json.iter().all(|&b| b == 0) {
                anyhow::bail!("Invalid keypair: all-zero key rejected");
            }
            Keypair::try_from(json.as_slice()).context("Invalid keypair from JSON")?
        };

        Ok(Self {
            keypair: Arc::new(keypair),
        })
    }

    /// Create a new wallet manager from a keypair.
    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    /// Get the public key.
    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Get an Arc reference to the keypair for signing.
    pub fn keypair_arc(&self) -> Arc<Keypair> {
        Arc::clone(&self.keypair)
    }
}

impl Clone for WalletManager {
    fn clone(&self) -> Self {
        Self {
            keypair: Arc::clone(&self.keypair),
        }
    }
}

/// Generate `count` fresh ephemeral wallets.
pub fn generate_wallets(count: usize) -> Vec<Arc<Keypair>> {
    (0..count).map(|_| Arc::new(Keypair::new())).collect()
}

/// Serialized form of one generated wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredWallet {
    /// Base58-encoded 64-byte secret key
    pub secret_key: String,
    /// Base58 public key, for eyeballing the file
    pub pubkey: String,
}

/// JSON file the generated wallets are persisted to before any funds move,
/// so a crash between distribution and gathering loses no keys.
pub struct Keystore {
    path: PathBuf,
}

impl Keystore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Persist the wallets, replacing any previous file contents.
    pub fn save(&self, wallets: &[Arc<Keypair>]) -> Result<()> {
        let stored: Vec<StoredWallet> = wallets
            .iter()
            .map(|kp| StoredWallet {
                secret_key: bs58::encode(kp.to_bytes()).into_string(),
                pubkey: kp.pubkey().to_string(),
            })
            .collect();

        let json = serde_json::to_string_pretty(&stored)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write keystore: {}", self.path.display()))?;
        Ok(())
    }

    /// Load previously persisted wallets.
    pub fn load(&self) -> Result<Vec<Arc<Keypair>>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read keystore: {}", self.path.display()))?;
        let stored: Vec<StoredWallet> =
            serde_json::from_str(&content).context("Failed to parse keystore JSON")?;

        stored
            .into_iter()
            .map(|wallet| {
                let bytes = bs58::decode(&wallet.secret_key)
                    .into_vec()
                    .with_context(|| format!("Invalid base58 secret for {}", wallet.pubkey))?;
                let keypair = Keypair::try_from(bytes.as_slice())
                    .with_context(|| format!("Invalid keypair for {}", wallet.pubkey))?;
                Ok(Arc::new(keypair))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keystore_round_trips_generated_wallets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("wallets.json");
        let keystore = Keystore::new(&path);

        let wallets = generate_wallets(3);
        keystore.save(&wallets).expect("save");

        let loaded = keystore.load().expect("load");
        assert_eq!(loaded.len(), 3);
        for (original, restored) in wallets.iter().zip(&loaded) {
            assert_eq!(original.pubkey(), restored.pubkey());
        }
    }

    #[test]
    fn manager_loads_json_byte_array_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("id.json");

        let keypair = Keypair::new();
        let bytes: Vec<u8> = keypair.to_bytes().to_vec();
        std::fs::write(&path, serde_json::to_string(&bytes).unwrap()).unwrap();

        let manager = WalletManager::from_file(path.to_str().unwrap()).expect("loads");
        assert_eq!(manager.pubkey(), keypair.pubkey());
    }

    #[test]
    fn manager_rejects_all_zero_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("zero.json");
        std::fs::write(&path, serde_json::to_string(&vec![0u8; 64]).unwrap()).unwrap();

        assert!(WalletManager::from_file(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn generated_wallets_are_distinct() {
        let wallets = generate_wallets(8);
        for (i, a) in wallets.iter().enumerate() {
            for b in &wallets[i + 1..] {
                assert_ne!(a.pubkey(), b.pubkey());
            }
        }
    }
}
