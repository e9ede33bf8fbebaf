use ethers_core::types::Bytes;
use ethers_core::types::TransactionRequest;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::transaction::eip712::TypedData;
use tracing::debug;
use tracing::error;
use tracing::instrument;
use tracing::warn;
use warden_auth::Action;
use warden_core::Address;
use warden_core::Algorithm;
use warden_core::Context;
use warden_core::EthAccount;
use warden_core::keccak256;
use warden_errors::Error;
use warden_errors::Result;

use super::EthConnector;
use super::encoding::PrivateArgs;
use super::encoding::eea_payload_hash;
use super::encoding::encode_signed_eea;
use super::encoding::hash_message;
use super::encoding::private_sighash;
use super::encoding::typed_data_hash;
use super::op;
use super::recovery::LEGACY_V_OFFSET;
use super::recovery::is_high_s;
use super::recovery::legacy_recovery_id;
use super::recovery::recover_address;
use super::recovery::recovery_id;
use super::recovery::split_signature;
use super::recovery::to_signature;

/// `V` offset of Quorum private transactions.
const PRIVATE_V_OFFSET: u64 = 37;

/// EIP-155 `V = recid + 35 + 2 * chain_id`.
fn eip155_v(recovery_id: u8, chain_id: u64) -> Result<u64> {
    chain_id
        .checked_mul(2)
        .and_then(|v| v.checked_add(35 + u64::from(recovery_id)))
        .ok_or_else(|| Error::invalid_parameter(format!("chain id {chain_id} is out of range")))
}

impl EthConnector {
    /// Live, enabled account allowed to sign.
    async fn signing_account(&self, ctx: &Context, address: Address) -> Result<EthAccount> {
        self.auth.check(op(Action::Sign))?;
        let account = self.db.get(ctx, address).await?;
        if account.is_disabled() {
            warn!("refusing to sign with disabled account");
            return Err(Error::status_conflict(format!("account {address:?} is disabled")));
        }
        Ok(account)
    }

    /// Signs `digest` with the account key: `R || S || recid`, low-S.
    ///
    /// Vault signatures carry no recovery id and may be malleable. A high-S
    /// signature is discarded and the vault asked again, up to
    /// `signing.max_attempts` calls.
    async fn sign_digest(&self, ctx: &Context, account: &EthAccount, digest: &[u8; 32]) -> Result<[u8; 65]> {
        let max_attempts = self.config.signing.max_attempts;
        for attempt in 1..=max_attempts {
            let signature = self
                .store
                .sign(ctx, &account.key_id, digest, &Algorithm::ethereum())
                .await
                .inspect_err(|e| error!(error = %e, "vault failed to sign digest"))?;
            if signature.len() != 64 {
                error!(len = signature.len(), "vault returned a malformed ECDSA signature");
                return Err(Error::dependency_failure(format!(
                    "vault returned a {}-byte ECDSA signature, expected 64",
                    signature.len()
                )));
            }
            if is_high_s(&signature) {
                debug!(attempt, max_attempts, "vault returned a malleable signature, retrying");
                continue;
            }

            let recovery_id = recovery_id(digest, &signature, &account.public_key)
                .inspect_err(|e| error!(error = %e, "cannot determine recovery id"))?;
            let mut out = [0u8; 65];
            out[..64].copy_from_slice(&signature);
            out[64] = recovery_id;
            return Ok(out);
        }

        warn!(max_attempts, "vault kept returning malleable signatures");
        Err(Error::dependency_failure(format!(
            "no non-malleable signature after {max_attempts} attempts"
        )))
    }

    /// Signs `keccak256(data)`; the recovery byte is 0 or 1.
    #[instrument(skip_all, fields(address = ?address))]
    pub async fn sign(&self, ctx: &Context, address: Address, data: &[u8]) -> Result<Vec<u8>> {
        let account = self.signing_account(ctx, address).await?;
        let signature = self.sign_digest(ctx, &account, &keccak256(data)).await?;
        debug!("payload signed successfully");
        Ok(signature.to_vec())
    }

    /// EIP-191 personal message signature; the recovery byte is 27 or 28.
    #[instrument(skip_all, fields(address = ?address))]
    pub async fn sign_message(&self, ctx: &Context, address: Address, message: &[u8]) -> Result<Vec<u8>> {
        let account = self.signing_account(ctx, address).await?;
        let mut signature = self.sign_digest(ctx, &account, &hash_message(message)).await?;
        signature[64] += LEGACY_V_OFFSET;
        debug!("message signed successfully");
        Ok(signature.to_vec())
    }

    /// EIP-712 typed data signature; the recovery byte is 27 or 28.
    #[instrument(skip_all, fields(address = ?address, primary_type = %typed_data.primary_type))]
    pub async fn sign_typed_data(&self, ctx: &Context, address: Address, typed_data: &TypedData) -> Result<Vec<u8>> {
        let account = self.signing_account(ctx, address).await?;
        let digest = typed_data_hash(typed_data)?;
        let mut signature = self.sign_digest(ctx, &account, &digest).await?;
        signature[64] += LEGACY_V_OFFSET;
        debug!("typed data signed successfully");
        Ok(signature.to_vec())
    }

    /// Signs `tx` for `chain_id` and returns the raw signed transaction.
    ///
    /// Legacy transactions use EIP-155 replay protection; typed (EIP-2930,
    /// EIP-1559) transactions carry the bare recovery id.
    #[instrument(skip_all, fields(address = ?address, chain_id = chain_id))]
    pub async fn sign_transaction(
        &self,
        ctx: &Context,
        address: Address,
        chain_id: u64,
        tx: &TypedTransaction,
    ) -> Result<Bytes> {
        let account = self.signing_account(ctx, address).await?;

        let mut tx = tx.clone();
        tx.set_chain_id(chain_id);
        tx.set_from(address);
        let signature = self.sign_digest(ctx, &account, &tx.sighash().0).await?;

        let recovery_id = signature[64];
        let v = match &tx {
            TypedTransaction::Legacy(_) => eip155_v(recovery_id, chain_id)?,
            _ => u64::from(recovery_id),
        };
        let raw = tx.rlp_signed(&to_signature(&signature, v));
        debug!(len = raw.len(), "transaction signed successfully");
        Ok(raw)
    }

    /// Quorum private transaction: no chain id in the payload, `V = recid + 37`.
    #[instrument(skip_all, fields(address = ?address))]
    pub async fn sign_private(&self, ctx: &Context, address: Address, tx: &TransactionRequest) -> Result<Bytes> {
        let account = self.signing_account(ctx, address).await?;

        let mut tx = tx.clone();
        tx.chain_id = None;
        tx.from = Some(address);
        let signature = self.sign_digest(ctx, &account, &private_sighash(&tx)).await?;

        let v = u64::from(signature[64]) + PRIVATE_V_OFFSET;
        let raw = tx.rlp_signed(&to_signature(&signature, v));
        debug!(len = raw.len(), "private transaction signed successfully");
        Ok(raw)
    }

    /// EEA private transaction for Besu-style privacy managers.
    #[instrument(skip_all, fields(address = ?address, chain_id = chain_id))]
    pub async fn sign_eea(
        &self,
        ctx: &Context,
        address: Address,
        chain_id: u64,
        tx: &TransactionRequest,
        args: &PrivateArgs,
    ) -> Result<Bytes> {
        let account = self.signing_account(ctx, address).await?;

        let digest = eea_payload_hash(tx, chain_id, args)?;
        let signature = self.sign_digest(ctx, &account, &digest).await?;
        let v = eip155_v(signature[64], chain_id)?;
        let raw = encode_signed_eea(tx, args, &to_signature(&signature, v))?;
        debug!(len = raw.len(), "eea transaction signed successfully");
        Ok(raw)
    }

    /// Address that produced an EIP-191 signature of `data`. Accepts
    /// recovery bytes 0/1 and 27/28.
    pub fn ec_recover(&self, data: &[u8], signature: &[u8]) -> Result<Address> {
        let (rs, v) = split_signature(signature)?;
        let recovery_id = match v {
            0 | 1 => v,
            _ => legacy_recovery_id(v)?,
        };
        recover_address(&hash_message(data), rs, recovery_id)
    }

    /// Checks a signature produced by [`EthConnector::sign`].
    pub fn verify(&self, address: Address, data: &[u8], signature: &[u8]) -> Result<()> {
        let (rs, v) = split_signature(signature)?;
        if v > 1 {
            return Err(Error::invalid_parameter(format!("invalid recovery byte {v}, expected 0 or 1")));
        }
        expect_signer(address, recover_address(&keccak256(data), rs, v)?)
    }

    pub fn verify_message(&self, address: Address, message: &[u8], signature: &[u8]) -> Result<()> {
        let (rs, v) = split_signature(signature)?;
        expect_signer(address, recover_address(&hash_message(message), rs, legacy_recovery_id(v)?)?)
    }

    pub fn verify_typed_data(&self, address: Address, typed_data: &TypedData, signature: &[u8]) -> Result<()> {
        let (rs, v) = split_signature(signature)?;
        let digest = typed_data_hash(typed_data)?;
        expect_signer(address, recover_address(&digest, rs, legacy_recovery_id(v)?)?)
    }

    #[instrument(skip_all, fields(address = ?address))]
    pub async fn encrypt(&self, ctx: &Context, address: Address, data: &[u8]) -> Result<Vec<u8>> {
        self.auth.check(op(Action::Encrypt))?;
        let account = self.db.get(ctx, address).await?;
        self.store
            .encrypt(ctx, &account.key_id, data)
            .await
            .inspect_err(|e| error!(error = %e, "failed to encrypt payload"))
    }

    #[instrument(skip_all, fields(address = ?address))]
    pub async fn decrypt(&self, ctx: &Context, address: Address, data: &[u8]) -> Result<Vec<u8>> {
        self.auth.check(op(Action::Encrypt))?;
        let account = self.db.get(ctx, address).await?;
        self.store
            .decrypt(ctx, &account.key_id, data)
            .await
            .inspect_err(|e| error!(error = %e, "failed to decrypt payload"))
    }
}

fn expect_signer(expected: Address, recovered: Address) -> Result<()> {
    if recovered != expected {
        return Err(Error::invalid_parameter(format!(
            "signature was produced by {recovered:?}, not {expected:?}"
        )));
    }
    Ok(())
}
