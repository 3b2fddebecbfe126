//! Creator resolution for a traded mint
//!
//! The exchange routes part of every fee into a vault derived from the token
//! creator's key, so building a trade requires knowing who the creator is.
//! There are three sources of that fact, in decreasing order of trust:
//!
//! 1. on-chain token metadata (verified creator, first listed creator, or
//!    update authority),
//! 2. an external indexer, when one is configured,
//! 3. the first signer of the oldest transaction touching the mint.
//!
//! The order is a data structure ([`RESOLUTION_ORDER`]), evaluated in a
//! loop; the first tier producing an answer wins. If no tier answers, the
//! trade must be abandoned: a guessed creator yields a well-formed but wrong
//! vault address, and the program rejects the transaction only after a full
//! confirmation round-trip.

use crate::pda::derive_metadata;
use crate::rpc::{LedgerError, LedgerQuery};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Where a creator identity came from. Variants are declared from most to
/// least trusted, and `Ord` follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CreatorSource {
    MetadataVerifiedCreator,
    MetadataFirstCreator,
    MetadataUpdateAuthority,
    Indexer,
    OldestTransactionSigner,
}

/// A resolved creator identity. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatorRecord {
    pub creator: Pubkey,
    pub source: CreatorSource,
}

/// The lookup strategies, in the order they are consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    Metadata,
    Indexer,
    TransactionHistory,
}

/// Trust order of the resolution tiers.
pub const RESOLUTION_ORDER: [ResolutionTier; 3] = [
    ResolutionTier::Metadata,
    ResolutionTier::Indexer,
    ResolutionTier::TransactionHistory,
];

#[derive(Debug, Error)]
pub enum CreatorError {
    /// Every tier was consulted and none produced an answer.
    #[error("creator unresolvable for mint {mint}")]
    Unresolvable { mint: Pubkey },
}

/// Resolves the canonical creator of a mint through the ordered tiers.
pub struct CreatorResolver {
    ledger: Arc<dyn LedgerQuery>,
    http: reqwest::Client,
    indexer_endpoint: Option<String>,
    page_limit: usize,
}

impl CreatorResolver {
    pub fn new(
        ledger: Arc<dyn LedgerQuery>,
        indexer_endpoint: Option<String>,
        page_limit: usize,
    ) -> Self {
        Self {
            ledger,
            http: reqwest::Client::new(),
            indexer_endpoint,
            page_limit: page_limit.max(1),
        }
    }

    /// Resolve the creator, trying tiers strictly in trust order.
    ///
    /// A tier that errors is logged and treated as a miss; only exhausting
    /// every tier fails the resolution.
    pub async fn resolve(&self, mint: &Pubkey) -> Result<CreatorRecord, CreatorError> {
        for tier in RESOLUTION_ORDER {
            let answer = match tier {
                ResolutionTier::Metadata => self.resolve_via_metadata(mint).await,
                ResolutionTier::Indexer => Ok(self.resolve_via_indexer(mint).await),
                ResolutionTier::TransactionHistory => self.resolve_via_history(mint).await,
            };

            match answer {
                Ok(Some(record)) => {
                    debug!(mint = %mint, creator = %record.creator, source = ?record.source,
                        "resolved token creator");
                    return Ok(record);
                }
                Ok(None) => continue,
                Err(err) => {
                    warn!(mint = %mint, tier = ?tier, error = %err,
                        "creator lookup tier failed, falling through");
                }
            }
        }

        Err(CreatorError::Unresolvable { mint: *mint })
    }

    /// Tier 1: decode the token metadata account.
    async fn resolve_via_metadata(
        &self,
        mint: &Pubkey,
    ) -> Result<Option<CreatorRecord>, LedgerError> {
        let metadata = derive_metadata(mint);
        let Some(data) = self.ledger.get_account_info(&metadata.key()).await? else {
            return Ok(None);
        };

        let Some(prefix) = MetadataPrefix::decode(&data) else {
            warn!(mint = %mint, account = %metadata, "metadata account did not decode");
            return Ok(None);
        };

        if let Some(creators) = prefix.creators.as_ref().filter(|c| !c.is_empty()) {
            if let Some(verified) = creators.iter().find(|c| c.verified) {
                return Ok(Some(CreatorRecord {
                    creator: Pubkey::new_from_array(verified.address),
                    source: CreatorSource::MetadataVerifiedCreator,
                }));
            }
            return Ok(Some(CreatorRecord {
                creator: Pubkey::new_from_array(creators[0].address),
                source: CreatorSource::MetadataFirstCreator,
            }));
        }

        Ok(Some(CreatorRecord {
            creator: Pubkey::new_from_array(prefix.update_authority),
            source: CreatorSource::MetadataUpdateAuthority,
        }))
    }

    /// Tier 2: one indexer lookup. No endpoint, a non-success status, or an
    /// unparseable body all mean "no answer", never an error.
    async fn resolve_via_indexer(&self, mint: &Pubkey) -> Option<CreatorRecord> {
        let endpoint = self.indexer_endpoint.as_deref()?;

        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": "creator-lookup",
            "method": "getAsset",
            "params": { "id": mint.to_string() },
        });

        let response = self.http.post(endpoint).json(&body).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let reply: IndexerReply = response.json().await.ok()?;
        let asset = reply.result?;

        let creator = asset
            .creators
            .iter()
            .find(|c| c.verified)
            .or_else(|| asset.creators.first())
            .and_then(|c| Pubkey::from_str(&c.address).ok())
            .or_else(|| {
                asset
                    .authorities
                    .first()
                    .and_then(|a| Pubkey::from_str(&a.address).ok())
            })?;

        Some(CreatorRecord {
            creator,
            source: CreatorSource::Indexer,
        })
    }

    /// Tier 3: walk the mint's signature history to its oldest page and take
    /// the first signer of the oldest transaction.
    ///
    /// Pagination continues until a page comes back shorter than the page
    /// limit, which marks the true end of history.
    async fn resolve_via_history(
        &self,
        mint: &Pubkey,
    ) -> Result<Option<CreatorRecord>, LedgerError> {
        let mut before = None;
        let mut oldest = None;

        loop {
            let page = self
                .ledger
                .get_signatures_for_address(mint, before, self.page_limit)
                .await?;

            let Some(last) = page.last() else { break };
            oldest = Some(last.signature);

            if page.len() < self.page_limit {
                break;
            }
            before = oldest;
        }

        let Some(oldest) = oldest else {
            return Ok(None);
        };

        let signers = self.ledger.get_transaction_signers(&oldest).await?;
        Ok(signers.first().map(|signer| CreatorRecord {
            creator: *signer,
            source: CreatorSource::OldestTransactionSigner,
        }))
    }
}

/// Prefix of the token metadata account layout, up to the creators vec.
/// Trailing fields are ignored, so this decodes with a plain prefix read
/// rather than an exact-length deserialization.
#[derive(Debug, BorshSerialize, BorshDeserialize)]
struct MetadataPrefix {
    key: u8,
    update_authority: [u8; 32],
    mint: [u8; 32],
    name: String,
    symbol: String,
    uri: String,
    seller_fee_basis_points: u16,
    creators: Option<Vec<MetadataCreator>>,
}

#[derive(Debug, BorshSerialize, BorshDeserialize)]
struct MetadataCreator {
    address: [u8; 32],
    verified: bool,
    share: u8,
}

impl MetadataPrefix {
    fn decode(data: &[u8]) -> Option<Self> {
        let mut slice = data;
        Self::deserialize(&mut slice).ok()
    }
}

#[derive(Debug, Deserialize)]
struct IndexerReply {
    #[serde(default)]
    result: Option<IndexerAsset>,
}

#[derive(Debug, Deserialize)]
struct IndexerAsset {
    #[serde(default)]
    creators: Vec<IndexerCreator>,
    #[serde(default)]
    authorities: Vec<IndexerAuthority>,
}

#[derive(Debug, Deserialize)]
struct IndexerCreator {
    address: String,
    #[serde(default)]
    verified: bool,
}

#[derive(Debug, Deserialize)]
struct IndexerAuthority {
    address: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{SignatureRecord, TokenBalance};
    use async_trait::async_trait;
    use solana_sdk::{hash::Hash, signature::Signature};
    use std::collections::HashMap;

    /// Ledger stub: a metadata account map plus a canned signature history.
    #[derive(Default)]
    struct StubLedger {
        accounts: HashMap<Pubkey, Vec<u8>>,
        history_pages: Vec<Vec<SignatureRecord>>,
        oldest_signers: HashMap<Signature, Vec<Pubkey>>,
    }

    #[async_trait]
    impl LedgerQuery for StubLedger {
        async fn get_account_info(
            &self,
            address: &Pubkey,
        ) -> Result<Option<Vec<u8>>, LedgerError> {
            Ok(self.accounts.get(address).cloned())
        }

        async fn get_balance(&self, _address: &Pubkey) -> Result<u64, LedgerError> {
            Ok(0)
        }

        async fn get_token_account_balance(
            &self,
            address: &Pubkey,
        ) -> Result<TokenBalance, LedgerError> {
            Err(LedgerError::AccountNotFound(*address))
        }

        async fn get_latest_blockhash(&self) -> Result<Hash, LedgerError> {
            Ok(Hash::default())
        }

        async fn get_signatures_for_address(
            &self,
            _address: &Pubkey,
            before: Option<Signature>,
            _limit: usize,
        ) -> Result<Vec<SignatureRecord>, LedgerError> {
            // Page index equals how many page-tails we have already handed out.
            let index = match before {
                None => 0,
                Some(sig) => {
                    self.history_pages
                        .iter()
                        .position(|page| page.last().map(|r| r.signature) == Some(sig))
                        .map(|i| i + 1)
                        .unwrap_or(self.history_pages.len())
                }
            };
            Ok(self.history_pages.get(index).cloned().unwrap_or_default())
        }

        async fn get_transaction_signers(
            &self,
            signature: &Signature,
        ) -> Result<Vec<Pubkey>, LedgerError> {
            Ok(self.oldest_signers.get(signature).cloned().unwrap_or_default())
        }
    }

    fn metadata_bytes(
        update_authority: Pubkey,
        creators: Option<Vec<(Pubkey, bool)>>,
    ) -> Vec<u8> {
        let prefix = MetadataPrefix {
            key: 4,
            update_authority: update_authority.to_bytes(),
            mint: Pubkey::new_unique().to_bytes(),
            name: "Example".to_string(),
            symbol: "EXM".to_string(),
            uri: "https://example.invalid/meta.json".to_string(),
            seller_fee_basis_points: 0,
            creators: creators.map(|list| {
                list.into_iter()
                    .map(|(address, verified)| MetadataCreator {
                        address: address.to_bytes(),
                        verified,
                        share: 100,
                    })
                    .collect()
            }),
        };
        let mut bytes = borsh::to_vec(&prefix).expect("serialize");
        // Trailing fields of the real account that the prefix decode ignores.
        bytes.extend_from_slice(&[1, 0, 255, 7]);
        bytes
    }

    fn resolver(ledger: StubLedger, indexer: Option<String>) -> CreatorResolver {
        CreatorResolver::new(Arc::new(ledger), indexer, 3)
    }

    #[test]
    fn source_ranking_follows_trust_order() {
        assert!(CreatorSource::MetadataVerifiedCreator < CreatorSource::MetadataFirstCreator);
        assert!(CreatorSource::MetadataFirstCreator < CreatorSource::MetadataUpdateAuthority);
        assert!(CreatorSource::MetadataUpdateAuthority < CreatorSource::Indexer);
        assert!(CreatorSource::Indexer < CreatorSource::OldestTransactionSigner);
    }

    #[tokio::test]
    async fn verified_creator_beats_first_listed() {
        let mint = Pubkey::new_unique();
        let first = Pubkey::new_unique();
        let verified = Pubkey::new_unique();

        let mut ledger = StubLedger::default();
        ledger.accounts.insert(
            derive_metadata(&mint).key(),
            metadata_bytes(
                Pubkey::new_unique(),
                Some(vec![(first, false), (verified, true)]),
            ),
        );

        let record = resolver(ledger, None).resolve(&mint).await.expect("resolves");
        assert_eq!(record.creator, verified);
        assert_eq!(record.source, CreatorSource::MetadataVerifiedCreator);
    }

    #[tokio::test]
    async fn update_authority_backstops_empty_creator_list() {
        let mint = Pubkey::new_unique();
        let authority = Pubkey::new_unique();

        let mut ledger = StubLedger::default();
        ledger.accounts.insert(
            derive_metadata(&mint).key(),
            metadata_bytes(authority, None),
        );

        let record = resolver(ledger, None).resolve(&mint).await.expect("resolves");
        assert_eq!(record.creator, authority);
        assert_eq!(record.source, CreatorSource::MetadataUpdateAuthority);
    }

    #[tokio::test]
    async fn indexer_answers_when_metadata_is_absent() {
        let mint = Pubkey::new_unique();
        let creator = Pubkey::new_unique();

        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": "creator-lookup",
            "result": {
                "creators": [{ "address": creator.to_string(), "verified": true }],
                "authorities": [{ "address": Pubkey::new_unique().to_string() }],
            },
        });
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let record = resolver(StubLedger::default(), Some(server.url()))
            .resolve(&mint)
            .await
            .expect("resolves");

        // Metadata was absent, so the answer must carry the indexer tier,
        // never the lower-ranked history tier.
        assert_eq!(record.creator, creator);
        assert_eq!(record.source, CreatorSource::Indexer);
    }

    #[tokio::test]
    async fn indexer_error_status_falls_through_to_history() {
        let mint = Pubkey::new_unique();
        let signer = Pubkey::new_unique();
        let oldest = Signature::from([7u8; 64]);

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(500)
            .create_async()
            .await;

        let mut ledger = StubLedger::default();
        ledger.history_pages = vec![vec![SignatureRecord {
            signature: oldest,
            slot: 10,
        }]];
        ledger.oldest_signers.insert(oldest, vec![signer]);

        let record = resolver(ledger, Some(server.url()))
            .resolve(&mint)
            .await
            .expect("resolves");
        assert_eq!(record.creator, signer);
        assert_eq!(record.source, CreatorSource::OldestTransactionSigner);
    }

    #[tokio::test]
    async fn history_paginates_to_the_short_page() {
        let mint = Pubkey::new_unique();
        let signer = Pubkey::new_unique();

        // Two full pages of three, then a short page; the short page's last
        // signature is the oldest transaction.
        let sig = |n: u8| Signature::from([n; 64]);
        let page = |nums: &[u8]| {
            nums.iter()
                .map(|n| SignatureRecord {
                    signature: sig(*n),
                    slot: *n as u64,
                })
                .collect::<Vec<_>>()
        };

        let mut ledger = StubLedger::default();
        ledger.history_pages = vec![page(&[9, 8, 7]), page(&[6, 5, 4]), page(&[3, 2])];
        ledger.oldest_signers.insert(sig(2), vec![signer]);

        let record = resolver(ledger, None).resolve(&mint).await.expect("resolves");
        assert_eq!(record.creator, signer);
        assert_eq!(record.source, CreatorSource::OldestTransactionSigner);
    }

    #[tokio::test]
    async fn exhausted_tiers_fail_explicitly() {
        let mint = Pubkey::new_unique();
        let err = resolver(StubLedger::default(), None)
            .resolve(&mint)
            .await
            .expect_err("no tier can answer");
        assert!(matches!(err, CreatorError::Unresolvable { .. }));
    }
}
